use serde::{Deserialize, Serialize};

use crate::identifier::IdKind;

/// Where a [`Target`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOrigin {
	/// Produced by the resolver, directly or through a cache tier.
	#[default]
	Resolved,
	/// Deep-link-by-name built locally after resolution failed.
	Fallback,
}

/// Resolved destination on the target platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
	pub kind: IdKind,
	/// Path on the target platform, always starting with `/`.
	pub pathname: String,
	/// Playback offset in seconds carried over from the source link.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<u32>,
	#[serde(default)]
	pub origin: TargetOrigin,
}

impl Target {
	pub fn resolved(kind: IdKind, pathname: impl Into<String>) -> Self {
		Self {
			kind,
			pathname: normalize_pathname(pathname.into()),
			timestamp: None,
			origin: TargetOrigin::Resolved,
		}
	}

	pub fn fallback(kind: IdKind, pathname: impl Into<String>) -> Self {
		Self {
			origin: TargetOrigin::Fallback,
			..Self::resolved(kind, pathname)
		}
	}

	pub fn with_timestamp(mut self, timestamp: Option<u32>) -> Self {
		self.timestamp = timestamp;
		self
	}

	pub fn is_fallback(&self) -> bool {
		self.origin == TargetOrigin::Fallback
	}
}

fn normalize_pathname(pathname: String) -> String {
	if pathname.starts_with('/') { pathname } else { format!("/{pathname}") }
}
