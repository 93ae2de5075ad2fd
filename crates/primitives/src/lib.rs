//! Core value types shared by every crosslink crate: identifiers, resolved
//! targets, epochs and screen geometry.

/// Navigation epoch values.
pub mod epoch;
/// Screen geometry used by placement.
pub mod geometry;
/// Item identifiers, logical ids and cache keys.
pub mod identifier;
/// Resolved targets on the destination platform.
pub mod target;

pub use epoch::Epoch;
pub use geometry::{Point, Rect};
pub use identifier::{CacheKey, IdKind, Identifier, LogicalId};
pub use target::{Target, TargetOrigin};
