use crosslink_config::Settings;
use crosslink_primitives::{CacheKey, Identifier};
use pretty_assertions::assert_eq;

use super::*;
use crate::host::{ItemHints, ItemPattern, ItemSpec, MemoryDocument};

fn canonical(link: &str) -> Option<Identifier> {
	match parse_href(link)?.link {
		LinkRef::Canonical(id) => Some(id),
		_ => None,
	}
}

#[test]
fn test_parse_video_forms() {
	assert_eq!(canonical("/watch?v=abc123"), Some(Identifier::video("abc123")));
	assert_eq!(canonical("https://www.youtube.com/watch?list=PL1&v=abc123"), Some(Identifier::video("abc123")));
	assert_eq!(canonical("/shorts/short_1"), Some(Identifier::video("short_1")));
	assert_eq!(canonical("https://youtu.be/abc-123"), Some(Identifier::video("abc-123")));
	assert_eq!(canonical("https://m.youtube.com/live/xyz"), Some(Identifier::video("xyz")));
}

#[test]
fn test_parse_channel_forms() {
	assert_eq!(canonical("/channel/UCabc"), Some(Identifier::channel("UCabc")));
	assert_eq!(parse_href("/@Creator/videos").map(|p| p.link), Some(LinkRef::Handle("@creator".to_owned())));
	assert_eq!(parse_href("/c/OldName").map(|p| p.link), Some(LinkRef::Legacy("oldname".to_owned())));
	assert_eq!(parse_href("/user/someone").map(|p| p.link), Some(LinkRef::Legacy("someone".to_owned())));
}

#[test]
fn test_parse_rejects_unrelated_links() {
	assert_eq!(parse_href("/feed/subscriptions"), None);
	assert_eq!(parse_href("/watch?list=PL1"), None);
	assert_eq!(parse_href("https://example.com/watch?v=abc"), None);
	assert_eq!(parse_href("/watch?v=bad%20id"), None);
	assert_eq!(parse_href("/@"), None);
}

#[test]
fn test_timestamps() {
	assert_eq!(parse_href("/watch?v=abc&t=90").and_then(|p| p.timestamp), Some(90));
	assert_eq!(parse_href("https://youtu.be/abc?t=1m30s").and_then(|p| p.timestamp), Some(90));
	assert_eq!(parse_timestamp("1h2m3s"), Some(3723));
	assert_eq!(parse_timestamp("45s"), Some(45));
	assert_eq!(parse_timestamp("1x"), None);
	assert_eq!(parse_timestamp("12m5"), None);
	assert_eq!(parse_timestamp(""), None);
}

#[test]
fn test_handle_upgrades_from_page_hint() {
	let mut aliases = AliasBook::default();
	let parsed = parse_href("/@Creator").unwrap();
	let hints = ItemHints {
		canonical_channel: Some("UC1".to_owned()),
		handle: None,
	};

	let request = normalize(&parsed, &hints, &mut aliases).unwrap();
	assert_eq!(request.id, Identifier::channel("UC1"));
	assert!(request.keys().contains(&CacheKey::handle("@creator")));

	// A later item without hints upgrades through the alias book.
	let request = normalize(&parsed, &ItemHints::default(), &mut aliases).unwrap();
	assert_eq!(request.id, Identifier::channel("UC1"));
}

#[test]
fn test_unknown_handle_stays_short_form() {
	let mut aliases = AliasBook::default();
	let parsed = parse_href("/@nobody").unwrap();
	let request = normalize(&parsed, &ItemHints::default(), &mut aliases).unwrap();
	assert!(request.id.is_short_form());
	assert_eq!(request.id.logical_id().as_str(), "channel:@nobody");
}

#[test]
fn test_legacy_name_needs_hint() {
	let mut aliases = AliasBook::default();
	let parsed = parse_href("/c/OldName").unwrap();
	assert_eq!(normalize(&parsed, &ItemHints::default(), &mut aliases), None);

	let hints = ItemHints {
		canonical_channel: Some("UC9".to_owned()),
		handle: Some("newname".to_owned()),
	};
	let request = normalize(&parsed, &hints, &mut aliases).unwrap();
	assert_eq!(request.id, Identifier::channel("UC9"));
	assert_eq!(aliases.canonical_for("@NewName"), Some("UC9"));
}

#[test]
fn test_collect_keeps_best_claim_per_logical_id() {
	let doc = MemoryDocument::new();
	let grid = doc.append_container(doc.root(), true);
	let compact = doc.append_item(grid, ItemSpec::new(ItemPattern::CompactVideo, "/watch?v=a"));
	let best = doc.append_item(grid, ItemSpec::new(ItemPattern::GridVideo, "/watch?v=a&t=5"));
	doc.append_item(grid, ItemSpec::new(ItemPattern::GridVideo, "/watch?v=b"));
	doc.append_item(grid, ItemSpec::new(ItemPattern::GridVideo, "/feed/trending"));

	let outcome = collect(&doc, &Settings::default(), &mut AliasBook::default());
	assert_eq!(outcome.items.len(), 2);
	assert_eq!(outcome.skipped, 1);
	assert_eq!(outcome.shadowed, 1);
	assert_eq!(outcome.items[0].candidate.item, best.item);
	assert_ne!(outcome.items[0].candidate.item, compact.item);
	assert_eq!(outcome.items[0].timestamp, Some(5));
	assert_eq!(outcome.items[1].logical_id.as_str(), "video:b");
}

#[test]
fn test_collect_skips_kinds_disabled_by_settings() {
	let doc = MemoryDocument::new();
	let grid = doc.append_container(doc.root(), true);
	doc.append_item(grid, ItemSpec::new(ItemPattern::GridVideo, "/watch?v=a"));
	doc.append_item(grid, ItemSpec::new(ItemPattern::ChannelLink, "/channel/UC1"));

	let settings = Settings {
		enable_overlay: false,
		..Settings::default()
	};
	let outcome = collect(&doc, &settings, &mut AliasBook::default());
	assert_eq!(outcome.items.len(), 1);
	assert_eq!(outcome.items[0].id(), &Identifier::channel("UC1"));
	assert_eq!(outcome.skipped, 1);
}
