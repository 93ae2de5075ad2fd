//! Identifier extraction and normalization.
//!
//! A scan turns raw host items into [`ScannedItem`]s: hrefs are parsed into
//! identifiers, short-form channel handles are upgraded to canonical ids
//! wherever the page or earlier scans already know the mapping, and duplicate
//! claims on one logical id collapse onto the best-scoring item.

use crosslink_config::Settings;
use crosslink_primitives::{CacheKey, Identifier, LogicalId};
use crosslink_resolver::LookupRequest;
use rustc_hash::FxHashMap;
use url::Url;

use crate::host::{HostDocument, ItemCandidate};

#[cfg(test)]
mod tests;

const HOST_ORIGIN: &str = "https://www.youtube.com/";

/// Score bonus for items the user can currently see.
const VISIBLE_BONUS: u32 = 50;

/// What an href points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRef {
	/// Canonical video or channel id.
	Canonical(Identifier),
	/// `@handle` form, lowercased.
	Handle(String),
	/// Legacy `/c/` or `/user/` vanity name. Only usable with a page hint.
	Legacy(String),
}

/// Parsed href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
	pub link: LinkRef,
	/// `t=` start offset in seconds.
	pub timestamp: Option<u32>,
}

/// Parses a host href, relative or absolute.
pub fn parse_href(href: &str) -> Option<ParsedLink> {
	let base = Url::parse(HOST_ORIGIN).ok()?;
	let url = base.join(href.trim()).ok()?;
	let timestamp = url.query_pairs().find(|(key, _)| key == "t").and_then(|(_, value)| parse_timestamp(&value));
	let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
	let mut segments = url.path_segments()?.filter(|segment| !segment.is_empty());

	let link = match host {
		"youtu.be" => LinkRef::Canonical(Identifier::video(valid_token(segments.next()?)?)),
		"youtube.com" | "music.youtube.com" => match segments.next()? {
			"watch" => {
				let (_, id) = url.query_pairs().find(|(key, _)| key == "v")?;
				LinkRef::Canonical(Identifier::video(valid_token(&id)?))
			}
			"shorts" | "live" | "embed" => LinkRef::Canonical(Identifier::video(valid_token(segments.next()?)?)),
			"channel" => LinkRef::Canonical(Identifier::channel(valid_token(segments.next()?)?)),
			"c" | "user" => LinkRef::Legacy(valid_token(segments.next()?)?.to_ascii_lowercase()),
			segment if segment.starts_with('@') && segment.len() > 1 => LinkRef::Handle(segment.to_ascii_lowercase()),
			_ => return None,
		},
		_ => return None,
	};
	Some(ParsedLink { link, timestamp })
}

fn valid_token(token: &str) -> Option<&str> {
	let ok = !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
	ok.then_some(token)
}

/// Parses `90`, `90s`, `1m30s` or `1h2m3s` into seconds.
pub fn parse_timestamp(raw: &str) -> Option<u32> {
	let raw = raw.trim();
	if raw.is_empty() {
		return None;
	}
	if let Ok(seconds) = raw.parse::<u32>() {
		return Some(seconds);
	}
	let mut total: u32 = 0;
	let mut digits = String::new();
	for c in raw.chars() {
		if c.is_ascii_digit() {
			digits.push(c);
			continue;
		}
		let unit = match c {
			'h' => 3600,
			'm' => 60,
			's' => 1,
			_ => return None,
		};
		let value: u32 = digits.parse().ok()?;
		total = total.checked_add(value.checked_mul(unit)?)?;
		digits.clear();
	}
	if !digits.is_empty() {
		return None;
	}
	Some(total)
}

/// Handle and vanity-name to canonical channel mappings learned from the page.
///
/// Lives for the whole session: a handle's canonical id does not depend on the
/// navigation context.
#[derive(Debug, Default)]
pub struct AliasBook {
	canonical: FxHashMap<String, String>,
}

impl AliasBook {
	pub fn learn(&mut self, alias: &str, canonical: &str) {
		let alias = alias.to_ascii_lowercase();
		if self.canonical.get(&alias).is_some_and(|known| known == canonical) {
			return;
		}
		tracing::trace!(alias = %alias, canonical, "scan.alias.learn");
		self.canonical.insert(alias, canonical.to_owned());
	}

	pub fn canonical_for(&self, alias: &str) -> Option<&str> {
		self.canonical.get(&alias.to_ascii_lowercase()).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.canonical.len()
	}

	pub fn is_empty(&self) -> bool {
		self.canonical.is_empty()
	}
}

/// Normalized item ready for resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedItem {
	pub logical_id: LogicalId,
	pub request: LookupRequest,
	pub candidate: ItemCandidate,
	pub timestamp: Option<u32>,
	pub score: u32,
}

impl ScannedItem {
	pub fn id(&self) -> &Identifier {
		&self.request.id
	}
}

/// Result of one scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
	/// One entry per logical id, in document order of the winning item.
	pub items: Vec<ScannedItem>,
	/// Items with no usable identifier or disabled by settings.
	pub skipped: usize,
	/// Items that lost a duplicate claim to a better-scoring item.
	pub shadowed: usize,
}

/// Turns one href (plus page hints) into a lookup request.
pub fn normalize(parsed: &ParsedLink, candidate_hints: &crate::host::ItemHints, aliases: &mut AliasBook) -> Option<LookupRequest> {
	let hinted_handle = candidate_hints.handle.as_deref().map(|handle| {
		let handle = handle.to_ascii_lowercase();
		if handle.starts_with('@') { handle } else { format!("@{handle}") }
	});
	if let Some(canonical) = candidate_hints.canonical_channel.as_deref() {
		if let Some(handle) = &hinted_handle {
			aliases.learn(handle, canonical);
		}
		match &parsed.link {
			LinkRef::Handle(alias) | LinkRef::Legacy(alias) => aliases.learn(alias, canonical),
			LinkRef::Canonical(_) => {}
		}
	}

	match &parsed.link {
		LinkRef::Canonical(id) => Some(LookupRequest::from(id.clone())),
		LinkRef::Handle(handle) => {
			let short = Identifier::channel(handle.clone());
			match aliases.canonical_for(handle) {
				Some(canonical) => {
					let canonical = canonical.to_owned();
					let [handle_key, url_key] = short.key_forms();
					Some(LookupRequest::from(short.upgraded(canonical)).with_alias(handle_key).with_alias(url_key))
				}
				None => Some(LookupRequest::from(short)),
			}
		}
		LinkRef::Legacy(name) => {
			let canonical = aliases.canonical_for(name)?.to_owned();
			Some(LookupRequest::from(Identifier::channel(canonical)).with_alias(CacheKey::from_raw(format!("legacy:{name}"))))
		}
	}
}

/// Scans `doc`, normalizes every item and collapses duplicate claims.
pub fn collect(doc: &dyn HostDocument, settings: &Settings, aliases: &mut AliasBook) -> ScanOutcome {
	let mut outcome = ScanOutcome::default();
	let mut index: FxHashMap<LogicalId, usize> = FxHashMap::default();

	for candidate in doc.scan_items() {
		let Some(parsed) = parse_href(&candidate.href) else {
			outcome.skipped += 1;
			continue;
		};
		let Some(request) = normalize(&parsed, &candidate.hints, aliases) else {
			outcome.skipped += 1;
			continue;
		};
		if !settings.allows(request.id.kind()) {
			outcome.skipped += 1;
			continue;
		}

		let mut score = candidate.pattern.score();
		if doc.is_visible(candidate.item) {
			score += VISIBLE_BONUS;
		}
		let item = ScannedItem {
			logical_id: request.id.logical_id(),
			request,
			candidate,
			timestamp: parsed.timestamp,
			score,
		};

		match index.get(&item.logical_id) {
			Some(&slot) => {
				outcome.shadowed += 1;
				if item.score > outcome.items[slot].score {
					outcome.items[slot] = item;
				}
			}
			None => {
				index.insert(item.logical_id.clone(), outcome.items.len());
				outcome.items.push(item);
			}
		}
	}

	tracing::trace!(
		items = outcome.items.len(),
		skipped = outcome.skipped,
		shadowed = outcome.shadowed,
		aliases = aliases.len(),
		"scan.collect"
	);
	outcome
}
