use super::*;

#[test]
fn handle_is_short_form_and_upgrades() {
	let id = Identifier::channel("@SomeCreator");
	assert!(id.is_short_form());

	let upgraded = id.upgraded("UC1234");
	assert!(!upgraded.is_short_form());
	assert_eq!(upgraded, Identifier::channel("UC1234"));
}

#[test]
fn canonical_ids_ignore_upgrade() {
	let id = Identifier::video("abc");
	assert_eq!(id.clone().upgraded("other"), id);
}

#[test]
fn key_forms_cover_canonical_and_url() {
	let [primary, url] = Identifier::video("abc").key_forms();
	assert_eq!(primary.as_str(), "video:abc");
	assert_eq!(url.as_str(), "url:https://www.youtube.com/watch?v=abc");

	let [primary, url] = Identifier::channel("UC1").key_forms();
	assert_eq!(primary.as_str(), "channel:UC1");
	assert_eq!(url.as_str(), "url:https://www.youtube.com/channel/UC1");
}

#[test]
fn handle_keys_are_case_insensitive() {
	assert_eq!(Identifier::channel("@Foo").cache_key(), CacheKey::handle("foo"));
	assert_eq!(Identifier::channel("@FOO").url_key(), Identifier::channel("@foo").url_key());
}

#[test]
fn logical_id_roundtrips_kind() {
	let logical = Identifier::channel("UC9").logical_id();
	assert_eq!(logical.as_str(), "channel:UC9");
	assert_eq!(logical.kind(), Some(IdKind::Channel));
}
