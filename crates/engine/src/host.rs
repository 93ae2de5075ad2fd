//! Seam between the engine and the externally rendered document.
//!
//! The engine never owns host elements. It holds opaque [`ElementId`] handles
//! that may go stale at any moment, and every method here tolerates a handle
//! whose element has been detached or replaced. Methods take `&self`: a real
//! host mutates underneath the engine, so implementations use interior
//! mutability and the engine re-validates instead of assuming.

use crosslink_primitives::{IdKind, LogicalId, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod memory;


pub use memory::{ContainerFixture, ItemHandles, ItemSpec, MemoryDocument, PageFixture};

/// Opaque handle onto a host element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

/// Handle for a mutation subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObserverId(pub u64);

/// Structural pattern that matched a host item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemPattern {
	GridVideo,
	CompactVideo,
	PlaylistVideo,
	ShortsLockup,
	ChannelHeader,
	WatchOwner,
	ChannelLink,
}

impl ItemPattern {
	/// Discovery score for the pattern; when several items claim the same
	/// logical id the highest-scoring one gets the annotation.
	pub const fn score(self) -> u32 {
		match self {
			Self::ChannelHeader => 40,
			Self::WatchOwner => 35,
			Self::GridVideo => 30,
			Self::CompactVideo => 25,
			Self::PlaylistVideo | Self::ShortsLockup => 20,
			Self::ChannelLink => 10,
		}
	}
}

/// Identity hints the host exposes next to the link itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ItemHints {
	/// Canonical channel id the page already knows for this item.
	pub canonical_channel: Option<String>,
	/// `@handle` shown alongside the item.
	pub handle: Option<String>,
}

/// One item found by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCandidate {
	/// Root element of the item.
	pub item: ElementId,
	/// Element carrying the link.
	pub link: ElementId,
	pub href: String,
	pub pattern: ItemPattern,
	pub hints: ItemHints,
}

/// Role an element plays as a possible annotation anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorRole {
	Thumbnail,
	ImageContainer,
	ChannelHeader,
	ItemRoot,
	Link,
}

/// Element an annotation may attach to, with its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorCandidate {
	pub element: ElementId,
	pub role: AnchorRole,
}

/// What an annotation displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationView {
	pub logical_id: LogicalId,
	pub kind: IdKind,
	pub href: String,
	/// The link points at a search, not a resolved target.
	pub fallback: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
	#[error("element {0:?} is not attached")]
	Detached(ElementId),
	#[error("element {0:?} is not an annotation")]
	NotAnnotation(ElementId),
	#[error("host rejected the operation: {0}")]
	Rejected(String),
}

/// Operations the engine needs from the host document.
pub trait HostDocument: Send + Sync {
	/// Every item currently in the document, in document order.
	fn scan_items(&self) -> Vec<ItemCandidate>;

	/// Possible anchors inside `item`. Empty when `item` is detached.
	fn anchor_candidates(&self, item: ElementId) -> Vec<AnchorCandidate>;

	/// Nearest ancestor of `item` that survives re-renders of its children.
	fn stable_container(&self, item: ElementId) -> Option<ElementId>;

	fn is_attached(&self, element: ElementId) -> bool;

	/// Whether `element` is `ancestor` or lies inside it.
	fn contains(&self, ancestor: ElementId, element: ElementId) -> bool;

	/// Screen box of an attached element.
	fn bounding_box(&self, element: ElementId) -> Option<Rect>;

	fn is_visible(&self, element: ElementId) -> bool {
		self.bounding_box(element).is_some_and(|rect| !rect.is_empty())
	}

	/// Subscribes to child-list changes under `container`.
	fn observe(&self, container: ElementId) -> Result<ObserverId, HostError>;

	fn disconnect(&self, observer: ObserverId);

	fn insert_annotation(&self, anchor: ElementId, view: &AnnotationView) -> Result<ElementId, HostError>;

	fn update_annotation(&self, annotation: ElementId, view: &AnnotationView) -> Result<(), HostError>;

	fn move_annotation(&self, annotation: ElementId, anchor: ElementId) -> Result<(), HostError>;

	fn remove_annotation(&self, annotation: ElementId);

	/// Attached annotations carrying `logical_id`, wherever they are.
	fn find_annotations(&self, logical_id: &LogicalId) -> Vec<ElementId>;

	/// Moves `annotation` under the document root, out of any item subtree.
	fn reparent_to_root(&self, annotation: ElementId) -> Result<(), HostError>;

	/// Fixes the annotation's screen box, or releases it with `None`.
	fn set_fixed_geometry(&self, annotation: ElementId, rect: Option<Rect>) -> Result<(), HostError>;

	/// Enables or disables the host's own hover behavior for `item`.
	fn set_hover_suppressed(&self, item: ElementId, suppressed: bool);
}
