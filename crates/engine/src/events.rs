//! Events delivered by the host side.

use crosslink_primitives::{Point, Rect};

use crate::host::{ElementId, ObserverId};

/// Something happened in the host document or its runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
	/// Fresh page load: new epoch and the resolver may be retried.
	PageLoaded,
	/// In-page navigation to a new context.
	Navigated { url: Option<String> },
	/// A watched container changed.
	Mutated { observer: ObserverId },
	Scrolled,
	/// New items were appended (infinite scroll, lazy rendering).
	Grew,
	/// The pointer entered an annotation.
	PointerEnter { annotation: ElementId },
	/// The pointer left an annotation.
	PointerLeave { annotation: ElementId, at: Point },
	PointerMove { at: Point },
	/// The pointer is over a host item; the host is about to run its preview.
	HoverItem { item: ElementId, region: Rect },
	HoverEnd { item: ElementId },
	SettingsChanged,
}

/// Whether a hover notification may continue to the host's own handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverDisposition {
	Pass,
	/// The annotation is pinned; the host must not start its preview.
	Halt,
}

/// Answer to a [`HostEvent::HoverItem`] that arrived through the session's
/// run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverReply {
	pub item: ElementId,
	pub disposition: HoverDisposition,
}
