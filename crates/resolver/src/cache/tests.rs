use std::sync::Arc;

use crosslink_primitives::{IdKind, Identifier, Target};
use crosslink_worker::EpochClock;
use proptest::prelude::*;

use super::*;

fn video_target(path: &str) -> Target {
	Target::resolved(IdKind::Video, path)
}

async fn settle() {
	for _ in 0..8 {
		tokio::task::yield_now().await;
	}
}

#[tokio::test]
async fn test_persistent_hit_promotes_to_faster_tiers() {
	let store = MemoryStore::new();
	let id = Identifier::video("abc");
	store.put(id.cache_key(), Some(video_target("/x/abc"))).await.unwrap();

	let clock = EpochClock::new();
	let mut cache = TieredCache::new(Arc::new(store.clone()));
	let keys = id.key_forms();

	let first = cache.lookup(&keys, &clock.guard()).await.unwrap();
	assert_eq!(
		first,
		CacheLookup::Hit {
			tier: Tier::Persistent,
			value: Some(video_target("/x/abc")),
		}
	);

	let second = cache.lookup(&keys, &clock.guard()).await.unwrap();
	assert!(matches!(second, CacheLookup::Hit { tier: Tier::Volatile, .. }));
	assert_eq!(cache.bounded_len(), 2);
}

#[tokio::test]
async fn test_bounded_tier_survives_volatile_clear() {
	let clock = EpochClock::new();
	let mut cache = TieredCache::new(Arc::new(MemoryStore::new()));
	let keys = Identifier::video("abc").key_forms();

	cache.insert_resolved(&keys, Some(video_target("/x/abc")), &clock.guard()).unwrap();
	clock.bump();
	cache.clear_volatile();
	assert_eq!(cache.volatile_len(), 0);

	let hit = cache.lookup(&keys, &clock.guard()).await.unwrap();
	assert!(matches!(hit, CacheLookup::Hit { tier: Tier::Bounded, .. }));
	assert_eq!(cache.volatile_len(), 2);
}

#[tokio::test]
async fn test_known_absent_is_a_hit() {
	let clock = EpochClock::new();
	let mut cache = TieredCache::new(Arc::new(MemoryStore::new()));
	let keys = Identifier::channel("UCnone").key_forms();

	cache.insert_resolved(&keys, None, &clock.guard()).unwrap();
	let lookup = cache.lookup(&keys, &clock.guard()).await.unwrap();
	assert_eq!(
		lookup,
		CacheLookup::Hit {
			tier: Tier::Volatile,
			value: None,
		}
	);
}

#[tokio::test]
async fn test_write_through_reaches_store_under_every_key() {
	let clock = EpochClock::new();
	let store = MemoryStore::new();
	let mut cache = TieredCache::new(Arc::new(store.clone()));
	let id = Identifier::channel("UC1");
	let mut keys = id.key_forms().to_vec();
	keys.push(CacheKey::handle("@creator"));

	cache.insert_resolved(&keys, Some(Target::resolved(IdKind::Channel, "/@creator:1")), &clock.guard()).unwrap();
	settle().await;

	assert_eq!(store.writes(), 3);
	assert!(store.contains(&CacheKey::handle("Creator")));
}

#[tokio::test]
async fn test_failed_persistent_write_does_not_reach_caller() {
	let clock = EpochClock::new();
	let store = MemoryStore::new();
	store.set_fail_writes(true);
	let mut cache = TieredCache::new(Arc::new(store.clone()));
	let keys = Identifier::video("abc").key_forms();

	cache.insert_resolved(&keys, Some(video_target("/x/abc")), &clock.guard()).unwrap();
	settle().await;

	assert_eq!(cache.dropped_writes(), 2);
	assert!(store.is_empty());
	assert!(cache.peek(&keys).is_some());
}

#[tokio::test]
async fn test_superseded_guard_blocks_writes() {
	let clock = EpochClock::new();
	let store = MemoryStore::new();
	let mut cache = TieredCache::new(Arc::new(store.clone()));
	let guard = clock.guard();
	clock.bump();

	let keys = Identifier::video("abc").key_forms();
	assert!(cache.insert_resolved(&keys, Some(video_target("/x/abc")), &guard).is_err());
	settle().await;

	assert_eq!(cache.volatile_len(), 0);
	assert_eq!(cache.bounded_len(), 0);
	assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_stale_persistent_hit_is_not_promoted() {
	let clock = EpochClock::new();
	let store = MemoryStore::new();
	let id = Identifier::video("abc");
	store.put(id.cache_key(), Some(video_target("/x/abc"))).await.unwrap();
	let mut cache = TieredCache::new(Arc::new(store));

	let guard = clock.guard();
	clock.bump();
	assert!(cache.lookup(&id.key_forms(), &guard).await.is_err());
	assert_eq!(cache.volatile_len(), 0);
}

#[test]
fn test_bounded_trim_keeps_newest() {
	let mut tier = BoundedTier::new(4, 2);
	for i in 0..5 {
		tier.insert(CacheKey::from_raw(format!("video:{i}")), None);
	}
	let keys: Vec<_> = tier.keys().map(|k| k.as_str().to_owned()).collect();
	assert_eq!(keys, vec!["video:3", "video:4"]);
}

#[test]
fn test_bounded_reinsert_refreshes_position() {
	let mut tier = BoundedTier::new(3, 1);
	tier.insert(CacheKey::from_raw("a"), None);
	tier.insert(CacheKey::from_raw("b"), None);
	tier.insert(CacheKey::from_raw("a"), None);
	tier.insert(CacheKey::from_raw("c"), None);
	tier.insert(CacheKey::from_raw("d"), None);
	let keys: Vec<_> = tier.keys().map(|k| k.as_str().to_owned()).collect();
	assert_eq!(keys, vec!["d"]);
}

#[test]
fn test_json_store_persists_across_open() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("cache.json");
	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

	runtime.block_on(async {
		let store = JsonFileStore::open(&path).unwrap();
		assert!(store.is_empty());
		store.put(CacheKey::from_raw("video:abc"), Some(video_target("/x/abc"))).await.unwrap();
		store.put(CacheKey::from_raw("video:gone"), None).await.unwrap();
	});

	let reopened = JsonFileStore::open(&path).unwrap();
	assert_eq!(reopened.len(), 2);
	let lookup = runtime.block_on(reopened.get(&CacheKey::from_raw("video:gone"))).unwrap();
	assert_eq!(lookup, StoreLookup::Found(None));
}

#[test]
fn test_json_store_discards_corrupt_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("cache.json");
	std::fs::write(&path, b"{not json").unwrap();

	let store = JsonFileStore::open(&path).unwrap();
	assert!(store.is_empty());
}

proptest! {
	#[test]
	fn bounded_tier_stays_within_capacity(count in 0usize..400, capacity in 1usize..120, keep_ratio in 0.0f64..1.0) {
		let keep = ((capacity as f64) * keep_ratio) as usize;
		let mut tier = BoundedTier::new(capacity, keep);
		for i in 0..count {
			tier.insert(CacheKey::from_raw(format!("video:{i}")), None);
			prop_assert!(tier.len() <= capacity);
		}

		let retained = count.min(keep.clamp(1, capacity));
		for i in count.saturating_sub(retained)..count {
			let key = CacheKey::from_raw(format!("video:{i}"));
			prop_assert!(tier.get(&key).is_some());
		}
	}
}
