//! Interaction-time placement.
//!
//! While unpinned, an annotation's geometry follows its host anchor. Pointer
//! entry pins it: the screen box is captured once, the element is moved under
//! the document root with that box fixed, and the host item's own hover
//! behavior is suppressed so the preview cannot resize or move anything under
//! the pointer.
//!
//! # Leaving
//!
//! Pointer-leave only arms a deadline. When the deadline passes the session
//! calls [`settle`], which re-checks whether the last known pointer position
//! is still inside the frozen box (plus a margin) before unpinning. A cursor
//! that slips out and straight back in never causes a layout jump.

use crosslink_primitives::{Point, Rect};
use tokio::time::{Duration, Instant};

use crate::events::HoverDisposition;
use crate::host::{ElementId, HostDocument, HostError};
use crate::registry::AnnotationRecord;


/// Placement state of one annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
	/// Geometry follows the anchor, or a frozen box while the item is hovered.
	Unpinned { float: Option<Rect> },
	/// Geometry is frozen and the element lives under the document root.
	Pinned {
		frozen: Rect,
		item: ElementId,
		leave_deadline: Option<Instant>,
	},
}

impl Default for Placement {
	fn default() -> Self {
		Self::Unpinned { float: None }
	}
}

/// Result of a leave re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
	/// Not pinned, or no leave armed.
	Idle,
	/// Deadline not reached yet.
	Pending(Instant),
	/// Pointer was back inside the frozen box.
	Stayed,
	/// Unpinned and back in the host anchor.
	Unpinned,
	/// Unpinned, but the host anchor is gone; the record needs healing.
	Orphaned,
}

/// Current screen box of the annotation.
pub fn geometry(doc: &dyn HostDocument, record: &AnnotationRecord) -> Option<Rect> {
	match record.placement {
		Placement::Pinned { frozen, .. } => Some(frozen),
		Placement::Unpinned { float: Some(rect) } => Some(rect),
		Placement::Unpinned { float: None } => doc.bounding_box(record.element),
	}
}

pub fn hover_disposition(record: &AnnotationRecord) -> HoverDisposition {
	if record.is_pinned() { HoverDisposition::Halt } else { HoverDisposition::Pass }
}

/// Pins the annotation at its current box. Re-entering a pinned annotation
/// only disarms a pending leave.
pub fn pin(doc: &dyn HostDocument, record: &mut AnnotationRecord) -> Result<(), HostError> {
	if let Placement::Pinned { leave_deadline, .. } = &mut record.placement {
		*leave_deadline = None;
		return Ok(());
	}
	let frozen = geometry(doc, record).ok_or(HostError::Detached(record.element))?;
	doc.reparent_to_root(record.element)?;
	doc.set_fixed_geometry(record.element, Some(frozen))?;
	doc.set_hover_suppressed(record.item, true);
	record.placement = Placement::Pinned {
		frozen,
		item: record.item,
		leave_deadline: None,
	};
	tracing::debug!(id = %record.logical_id, x = frozen.x, y = frozen.y, "placement.pin");
	Ok(())
}

/// Arms the leave deadline. Returns it when the annotation is pinned.
pub fn arm_leave(record: &mut AnnotationRecord, now: Instant, grace: Duration) -> Option<Instant> {
	let Placement::Pinned { leave_deadline, .. } = &mut record.placement else {
		return None;
	};
	let deadline = now + grace;
	*leave_deadline = Some(deadline);
	Some(deadline)
}

/// Resolves an armed leave once its deadline has passed.
pub fn settle(doc: &dyn HostDocument, record: &mut AnnotationRecord, pointer: Option<Point>, now: Instant, margin: f64) -> Result<Settle, HostError> {
	let Placement::Pinned { frozen, leave_deadline, .. } = &mut record.placement else {
		return Ok(Settle::Idle);
	};
	let Some(deadline) = *leave_deadline else {
		return Ok(Settle::Idle);
	};
	if now < deadline {
		return Ok(Settle::Pending(deadline));
	}
	if pointer.is_some_and(|point| frozen.inflate(margin).contains(point)) {
		*leave_deadline = None;
		tracing::trace!(id = %record.logical_id, "placement.leave.stayed");
		return Ok(Settle::Stayed);
	}
	unpin(doc, record)
}

/// Releases a pin and returns the element to its host anchor when possible.
pub fn unpin(doc: &dyn HostDocument, record: &mut AnnotationRecord) -> Result<Settle, HostError> {
	let Placement::Pinned { item, .. } = record.placement else {
		return Ok(Settle::Idle);
	};
	record.placement = Placement::default();
	doc.set_hover_suppressed(item, false);
	doc.set_fixed_geometry(record.element, None)?;
	if !doc.is_attached(record.host_anchor) {
		tracing::debug!(id = %record.logical_id, "placement.unpin.orphaned");
		return Ok(Settle::Orphaned);
	}
	doc.move_annotation(record.element, record.host_anchor)?;
	tracing::debug!(id = %record.logical_id, "placement.unpin");
	Ok(Settle::Unpinned)
}

/// Freezes an unpinned annotation at its current box while the item is hovered.
pub fn float(doc: &dyn HostDocument, record: &mut AnnotationRecord) -> Result<(), HostError> {
	if !matches!(record.placement, Placement::Unpinned { float: None }) {
		return Ok(());
	}
	let rect = doc.bounding_box(record.element).ok_or(HostError::Detached(record.element))?;
	doc.set_fixed_geometry(record.element, Some(rect))?;
	record.placement = Placement::Unpinned { float: Some(rect) };
	Ok(())
}

pub fn unfloat(doc: &dyn HostDocument, record: &mut AnnotationRecord) -> Result<(), HostError> {
	if !matches!(record.placement, Placement::Unpinned { float: Some(_) }) {
		return Ok(());
	}
	record.placement = Placement::default();
	doc.set_fixed_geometry(record.element, None)
}

/// Drops any interaction state ahead of removal. Errors are irrelevant here:
/// the element is about to go away.
pub fn teardown(doc: &dyn HostDocument, record: &mut AnnotationRecord) {
	match record.placement {
		Placement::Pinned { item, .. } => {
			doc.set_hover_suppressed(item, false);
			let _ = doc.set_fixed_geometry(record.element, None);
		}
		Placement::Unpinned { float: Some(_) } => {
			let _ = doc.set_fixed_geometry(record.element, None);
		}
		Placement::Unpinned { float: None } => {}
	}
	record.placement = Placement::default();
}
