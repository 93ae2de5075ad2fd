use std::fmt;

use serde::{Deserialize, Serialize};

/// Navigation generation.
///
/// Strictly increasing for the lifetime of a page. Work captures the epoch it
/// started under and compares it against the live clock before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(u64);

impl Epoch {
	/// Epoch of a freshly loaded page, before the first navigation.
	pub const INITIAL: Self = Self(0);

	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	pub const fn get(self) -> u64 {
		self.0
	}

	/// Returns the following epoch.
	pub const fn next(self) -> Self {
		Self(self.0.wrapping_add(1))
	}
}

impl fmt::Display for Epoch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "e{}", self.0)
	}
}
