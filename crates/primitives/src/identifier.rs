use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

const SOURCE_ORIGIN: &str = "https://www.youtube.com";

/// What an identifier names on the source platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
	Video,
	Channel,
}

impl IdKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Video => "video",
			Self::Channel => "channel",
		}
	}
}

impl fmt::Display for IdKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Source-platform identifier extracted from a host item.
///
/// Equality and hashing cover `(kind, value)`. A channel identifier may be in
/// short form (an `@handle`) until it is upgraded to the canonical channel id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier {
	kind: IdKind,
	value: String,
}

impl Identifier {
	pub fn new(kind: IdKind, value: impl Into<String>) -> Self {
		Self { kind, value: value.into() }
	}

	pub fn video(value: impl Into<String>) -> Self {
		Self::new(IdKind::Video, value)
	}

	pub fn channel(value: impl Into<String>) -> Self {
		Self::new(IdKind::Channel, value)
	}

	pub const fn kind(&self) -> IdKind {
		self.kind
	}

	pub fn value(&self) -> &str {
		&self.value
	}

	/// Returns true for `@handle` channel references.
	pub fn is_short_form(&self) -> bool {
		self.kind == IdKind::Channel && self.value.starts_with('@')
	}

	/// Returns the canonical form of this identifier, keeping the kind.
	///
	/// Only short-form identifiers are upgraded; canonical ones are returned
	/// unchanged.
	pub fn upgraded(self, canonical: impl Into<String>) -> Self {
		if !self.is_short_form() {
			return self;
		}
		Self {
			kind: self.kind,
			value: canonical.into(),
		}
	}

	pub fn logical_id(&self) -> LogicalId {
		LogicalId(format!("{}:{}", self.kind.as_str(), self.value))
	}

	/// Primary cache key (`video:<id>`, `channel:<id>`, or `handle:@name`).
	pub fn cache_key(&self) -> CacheKey {
		if self.is_short_form() {
			CacheKey::handle(&self.value)
		} else {
			CacheKey(format!("{}:{}", self.kind.as_str(), self.value))
		}
	}

	/// Source-platform URL shaped key for this identifier.
	pub fn url_key(&self) -> CacheKey {
		let url = match (self.kind, self.is_short_form()) {
			(IdKind::Video, _) => format!("{SOURCE_ORIGIN}/watch?v={}", self.value),
			(IdKind::Channel, true) => format!("{SOURCE_ORIGIN}/{}", self.value.to_ascii_lowercase()),
			(IdKind::Channel, false) => format!("{SOURCE_ORIGIN}/channel/{}", self.value),
		};
		CacheKey(format!("url:{url}"))
	}

	/// Every key form under which a resolution for this identifier is stored.
	pub fn key_forms(&self) -> [CacheKey; 2] {
		[self.cache_key(), self.url_key()]
	}
}

impl fmt::Display for Identifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind, self.value)
	}
}

/// Normalized identity of an item, independent of which host element shows it.
///
/// Used as the registry and dedup key. At most one live annotation exists per
/// logical id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn kind(&self) -> Option<IdKind> {
		match self.0.split_once(':')?.0 {
			"video" => Some(IdKind::Video),
			"channel" => Some(IdKind::Channel),
			_ => None,
		}
	}
}

impl fmt::Display for LogicalId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Key into any cache tier.
///
/// Canonical, handle and URL forms of the same item all map to one target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
	/// Handle-keyed entry. Handles are case-insensitive on the source platform.
	pub fn handle(handle: &str) -> Self {
		let handle = handle.trim_start_matches('@').to_ascii_lowercase();
		Self(format!("handle:@{handle}"))
	}

	/// Wraps an already-formatted key, e.g. one read back from a store.
	pub fn from_raw(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
