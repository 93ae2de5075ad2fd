//! Wire contract of the remote resolver.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use crosslink_primitives::{IdKind, Identifier, Target};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod fixture;

pub use fixture::FixtureTransport;

/// One identifier as sent to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireId {
	pub id: String,
	pub kind: IdKind,
}

impl From<&Identifier> for WireId {
	fn from(identifier: &Identifier) -> Self {
		Self {
			id: identifier.value().to_owned(),
			kind: identifier.kind(),
		}
	}
}

/// Resolver answer for one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTarget {
	pub kind: IdKind,
	pub pathname: String,
}

impl From<WireTarget> for Target {
	fn from(wire: WireTarget) -> Self {
		Target::resolved(wire.kind, wire.pathname)
	}
}

/// Batch response keyed by the request `id`.
///
/// `None` means the resolver knows the item has no target. Ids missing from
/// the map were not answered.
pub type WireResponse = HashMap<String, Option<WireTarget>>;

/// Transport-level failure of a batch call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// The channel to the resolver is gone (e.g. the host runtime reloaded).
	#[error("resolver transport unavailable")]
	Unavailable,
	/// The call reached the transport but failed.
	#[error("resolver call failed: {0}")]
	Network(String),
	/// No answer within the per-call deadline.
	#[error("resolver call timed out after {0:?}")]
	Timeout(Duration),
}

/// Sends identifier batches to the remote resolver.
///
/// Implementations must turn a vanished host channel into
/// [`TransportError::Unavailable`] rather than panicking.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send_batch(&self, ids: &[WireId]) -> Result<WireResponse, TransportError>;
}
