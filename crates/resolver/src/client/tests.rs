use std::sync::Arc;
use std::time::Duration;

use crosslink_primitives::{CacheKey, IdKind, Identifier, Target};
use crosslink_worker::EpochClock;

use super::*;
use crate::cache::{MemoryStore, TieredCache};
use crate::transport::{FixtureTransport, TransportError, WireTarget};

fn wire(kind: IdKind, pathname: &str) -> WireTarget {
	WireTarget {
		kind,
		pathname: pathname.to_owned(),
	}
}

fn client_with(transport: &FixtureTransport, config: ResolverConfig) -> ResolverClient {
	let cache = TieredCache::new(Arc::new(MemoryStore::new()));
	ResolverClient::with_config(Arc::new(transport.clone()), cache, config)
}

fn client(transport: &FixtureTransport) -> ResolverClient {
	client_with(transport, ResolverConfig::default())
}

#[tokio::test]
async fn test_resolution_is_cached_and_second_call_is_local() {
	let transport = FixtureTransport::from_entries([("abc".to_owned(), wire(IdKind::Video, "/x/abc"))]);
	let mut client = client(&transport);
	let clock = EpochClock::new();
	let id = Identifier::video("abc");

	let first = client.resolve(&[id.clone()], &clock.guard()).await.unwrap();
	assert_eq!(first[&id], Resolution::Found(Target::resolved(IdKind::Video, "/x/abc")));
	assert_eq!(transport.call_count(), 1);

	let second = client.resolve(&[id.clone()], &clock.guard()).await.unwrap();
	assert_eq!(second[&id].target().map(|t| t.pathname.as_str()), Some("/x/abc"));
	assert_eq!(transport.call_count(), 1);
	assert!(client.cache().peek(&[id.url_key()]).is_some());
}

#[tokio::test]
async fn test_duplicates_are_sent_once() {
	let transport = FixtureTransport::new();
	let mut client = client(&transport);
	let clock = EpochClock::new();

	let ids = [Identifier::video("a"), Identifier::video("a"), Identifier::video("b")];
	let resolutions = client.resolve(&ids, &clock.guard()).await.unwrap();

	assert_eq!(resolutions.len(), 2);
	assert_eq!(transport.calls(), vec![vec![WireId::from(&ids[0]), WireId::from(&ids[2])]]);
}

#[tokio::test]
async fn test_cached_ids_are_not_sent() {
	let transport = FixtureTransport::from_entries([
		("a".to_owned(), wire(IdKind::Video, "/a")),
		("b".to_owned(), wire(IdKind::Video, "/b")),
	]);
	let mut client = client(&transport);
	let clock = EpochClock::new();

	client.resolve(&[Identifier::video("a")], &clock.guard()).await.unwrap();
	client.resolve(&[Identifier::video("a"), Identifier::video("b")], &clock.guard()).await.unwrap();

	let calls = transport.calls();
	assert_eq!(calls.len(), 2);
	assert_eq!(calls[1], vec![WireId::from(&Identifier::video("b"))]);
}

#[tokio::test]
async fn test_known_absent_is_cached() {
	let transport = FixtureTransport::new();
	let mut client = client(&transport);
	let clock = EpochClock::new();
	let id = Identifier::channel("UCmissing");

	let first = client.resolve(&[id.clone()], &clock.guard()).await.unwrap();
	assert_eq!(first[&id], Resolution::Absent);

	let second = client.resolve(&[id.clone()], &clock.guard()).await.unwrap();
	assert_eq!(second[&id], Resolution::Absent);
	assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_unavailable_latches_until_reset() {
	let transport = FixtureTransport::new();
	transport.set_failure(Some(TransportError::Unavailable));
	let mut client = client(&transport);
	let clock = EpochClock::new();

	let first = client.resolve(&[Identifier::video("a")], &clock.guard()).await.unwrap();
	assert_eq!(first[&Identifier::video("a")], Resolution::Unresolved);
	assert!(client.is_unavailable());

	transport.set_failure(None);
	let second = client.resolve(&[Identifier::video("b")], &clock.guard()).await.unwrap();
	assert_eq!(second[&Identifier::video("b")], Resolution::Unresolved);
	assert_eq!(transport.call_count(), 1);

	client.reset_availability();
	client.resolve(&[Identifier::video("b")], &clock.guard()).await.unwrap();
	assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_unavailable_mid_batch_skips_remaining_chunks() {
	let transport = FixtureTransport::new();
	transport.set_failure(Some(TransportError::Unavailable));
	let mut client = client_with(
		&transport,
		ResolverConfig {
			max_batch: 1,
			..ResolverConfig::default()
		},
	);
	let clock = EpochClock::new();

	let ids = [Identifier::video("a"), Identifier::video("b"), Identifier::video("c")];
	let resolutions = client.resolve(&ids, &clock.guard()).await.unwrap();

	assert_eq!(transport.call_count(), 1);
	assert!(resolutions.values().all(|r| *r == Resolution::Unresolved));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_a_miss_and_not_cached() {
	let transport = FixtureTransport::from_entries([("a".to_owned(), wire(IdKind::Video, "/a"))]);
	transport.set_latency(Duration::from_secs(5));
	let mut client = client(&transport);
	let clock = EpochClock::new();
	let id = Identifier::video("a");

	let first = client.resolve(&[id.clone()], &clock.guard()).await.unwrap();
	assert_eq!(first[&id], Resolution::Unresolved);
	assert!(!client.is_unavailable());
	assert!(client.cache().peek(&id.key_forms()).is_none());

	transport.set_latency(Duration::ZERO);
	let second = client.resolve(&[id.clone()], &clock.guard()).await.unwrap();
	assert!(matches!(second[&id], Resolution::Found(_)));
	assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_network_error_is_retried_next_call() {
	let transport = FixtureTransport::new();
	transport.set_failure(Some(TransportError::Network("502".into())));
	let mut client = client(&transport);
	let clock = EpochClock::new();
	let id = Identifier::video("a");

	let first = client.resolve(&[id.clone()], &clock.guard()).await.unwrap();
	assert_eq!(first[&id], Resolution::Unresolved);

	transport.set_failure(None);
	client.resolve(&[id.clone()], &clock.guard()).await.unwrap();
	assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_bump_mid_batch_discards_result() {
	let transport = FixtureTransport::from_entries([("abc".to_owned(), wire(IdKind::Video, "/x/abc"))]);
	let clock = EpochClock::new();
	let host_clock = clock.clone();
	transport.on_send(move |_| {
		host_clock.bump();
	});
	let mut client = client(&transport);
	let id = Identifier::video("abc");

	let err = client.resolve(&[id.clone()], &clock.guard()).await.unwrap_err();
	assert_eq!(err.current, clock.current());
	assert!(client.cache().peek(&id.key_forms()).is_none());
	assert_eq!(client.cache().bounded_len(), 0);
}

#[tokio::test]
async fn test_batches_are_chunked() {
	let transport = FixtureTransport::new();
	let mut client = client_with(
		&transport,
		ResolverConfig {
			max_batch: 2,
			..ResolverConfig::default()
		},
	);
	let clock = EpochClock::new();
	let ids: Vec<_> = (0..5).map(|i| Identifier::video(format!("v{i}"))).collect();

	client.resolve(&ids, &clock.guard()).await.unwrap();
	let sizes: Vec<_> = transport.calls().iter().map(Vec::len).collect();
	assert_eq!(sizes, vec![2, 2, 1]);
	assert_eq!(client.keys_sent(), 5);
}

#[tokio::test]
async fn test_alias_keys_are_populated() {
	let transport = FixtureTransport::from_entries([("UC1".to_owned(), wire(IdKind::Channel, "/@creator:1"))]);
	let mut client = client(&transport);
	let clock = EpochClock::new();

	let request = LookupRequest::from(Identifier::channel("UC1")).with_alias(CacheKey::handle("@Creator"));
	client.resolve_requests(&[request], &clock.guard()).await.unwrap();

	let by_handle = Identifier::channel("@creator");
	let resolutions = client.resolve(&[by_handle.clone()], &clock.guard()).await.unwrap();
	assert_eq!(resolutions[&by_handle].target().map(|t| t.pathname.as_str()), Some("/@creator:1"));
	assert_eq!(transport.call_count(), 1);
}
