use std::sync::Arc;

use crosslink_config::Settings;
use crosslink_primitives::{IdKind, LogicalId, Target};
use crosslink_resolver::Resolution;
use crosslink_worker::{EpochGuard, Superseded};
use tokio::time::Instant;

use super::{PassReport, PlaceError, Reconciler};
use crate::anchor;
use crate::host::{AnnotationView, ElementId, ObserverId};
use crate::placement::Placement;
use crate::registry::AnnotationRecord;
use crate::scan::ScannedItem;

impl Reconciler {
	/// Turns one scanned item plus its resolution into an annotation.
	pub(super) fn place_item(
		&mut self,
		item: &ScannedItem,
		resolution: Option<&Resolution>,
		settings: &Settings,
		guard: &EpochGuard,
		now: Instant,
		report: &mut PassReport,
	) -> Result<(), PlaceError> {
		let id = &item.logical_id;
		let target = match resolution {
			Some(Resolution::Found(target)) => {
				if self.memory.mark_found(id) {
					report.newly_settled += 1;
				}
				report.resolved += 1;
				target.clone().with_timestamp(item.timestamp)
			}
			Some(Resolution::Absent) => {
				if self.memory.mark_absent(id) {
					report.newly_settled += 1;
				}
				report.absent += 1;
				match fallback_target(item, settings) {
					Some(target) => target,
					None => {
						if self.registry.contains(id) {
							guard.check()?;
							self.remove_record(id);
							report.retired += 1;
						}
						return Ok(());
					}
				}
			}
			Some(Resolution::Unresolved) => {
				if self.memory.note_unresolved(id, self.config.max_resolve_attempts) {
					tracing::info!(id = %id, attempts = self.config.max_resolve_attempts, "giving up on unresolved item for this page");
					report.abandoned += 1;
				} else {
					report.unresolved += 1;
				}
				match fallback_target(item, settings) {
					Some(target) => target,
					None => {
						if self.registry.contains(id) {
							report.reused += 1;
						}
						return Ok(());
					}
				}
			}
			None => {
				// Settled earlier this epoch: keep whatever is there.
				if self.registry.contains(id) {
					report.reused += 1;
					return Ok(());
				}
				match fallback_target(item, settings) {
					Some(target) => target,
					None => return Ok(()),
				}
			}
		};

		let view = AnnotationView {
			logical_id: id.clone(),
			kind: item.id().kind(),
			href: settings.target_platform.link(&target),
			fallback: target.is_fallback(),
		};

		if self.registry.contains(id) {
			return self.refresh(item, target, view, guard, report);
		}
		self.create(item, target, view, guard, now, report)
	}

	/// Keeps an existing record current, relocating it when its anchor is gone.
	fn refresh(&mut self, item: &ScannedItem, target: Target, view: AnnotationView, guard: &EpochGuard, report: &mut PassReport) -> Result<(), PlaceError> {
		let doc = Arc::clone(&self.doc);
		let id = &item.logical_id;
		let Some(record) = self.registry.get_mut(id) else {
			return Ok(());
		};

		if record.view != view {
			guard.check()?;
			doc.update_annotation(record.element, &view)?;
			record.view = view.clone();
		}
		record.target = target;
		record.epoch = guard.epoch();

		if record.is_pinned() {
			report.reused += 1;
			return Ok(());
		}
		if record.is_anchored(&*doc) && doc.contains(item.candidate.item, record.host_anchor) {
			record.item = item.candidate.item;
			report.reused += 1;
			return Ok(());
		}

		let Some(anchor) = anchor::select(&*doc, item.candidate.item) else {
			self.note_anchor_miss(id, report);
			return Ok(());
		};

		guard.check()?;
		let element = if doc.is_attached(record.element) {
			doc.move_annotation(record.element, anchor.element)?;
			record.element
		} else {
			doc.insert_annotation(anchor.element, &view)?
		};
		record.element = element;
		record.host_anchor = anchor.element;
		record.item = item.candidate.item;
		self.memory.clear_anchor_misses(id);
		tracing::trace!(id = %id, role = ?anchor.role, "reconcile.relocate");
		report.moved += 1;

		// Subscribe to the new container before releasing the old one so a
		// shared observer is never dropped and re-created.
		let observer = self.observe_item(item.candidate.item);
		let previous = self.registry.get_mut(id).and_then(|record| std::mem::replace(&mut record.observer, observer));
		if let Some(previous) = previous {
			self.registry.unwatch(&*doc, previous);
		}
		Ok(())
	}

	/// Creates a record, reusing a stray annotation element when one exists.
	fn create(&mut self, item: &ScannedItem, target: Target, view: AnnotationView, guard: &EpochGuard, now: Instant, report: &mut PassReport) -> Result<(), PlaceError> {
		let id = &item.logical_id;
		if self.memory.anchor_exhausted(id, self.config.max_anchor_attempts) {
			return Ok(());
		}
		let doc = Arc::clone(&self.doc);
		let Some(anchor) = anchor::select(&*doc, item.candidate.item) else {
			self.note_anchor_miss(id, report);
			return Ok(());
		};
		self.memory.clear_anchor_misses(id);

		let existing = doc.find_annotations(id);
		let reusable = existing.iter().copied().find(|element| doc.is_visible(*element));

		guard.check()?;
		let element = match reusable {
			Some(element) => {
				doc.move_annotation(element, anchor.element)?;
				doc.update_annotation(element, &view)?;
				report.moved += 1;
				element
			}
			None => {
				let element = doc.insert_annotation(anchor.element, &view)?;
				report.created += 1;
				element
			}
		};
		report.deduped += self.remove_strays(&existing, element, guard)?;

		let observer = self.observe_item(item.candidate.item);
		self.registry.insert(AnnotationRecord {
			logical_id: id.clone(),
			element,
			host_anchor: anchor.element,
			item: item.candidate.item,
			epoch: guard.epoch(),
			last_seen_at: now,
			observer,
			target,
			view,
			placement: Placement::default(),
		});
		tracing::trace!(id = %id, role = ?anchor.role, element = element.0, "reconcile.create");
		Ok(())
	}

	/// Removes every element in `found` except `keep`.
	pub(super) fn remove_strays(&self, found: &[ElementId], keep: ElementId, guard: &EpochGuard) -> Result<usize, Superseded> {
		let mut removed = 0;
		for &element in found.iter().filter(|element| **element != keep) {
			guard.check()?;
			self.doc.remove_annotation(element);
			removed += 1;
		}
		Ok(removed)
	}

	fn observe_item(&mut self, item: ElementId) -> Option<ObserverId> {
		let container = self.doc.stable_container(item)?;
		match self.registry.watch(&*self.doc, container) {
			Ok(observer) => Some(observer),
			Err(error) => {
				tracing::debug!(container = container.0, %error, "reconcile.observe_failed");
				None
			}
		}
	}

	fn note_anchor_miss(&mut self, id: &LogicalId, report: &mut PassReport) {
		report.anchor_missing += 1;
		if self.memory.note_anchor_miss(id, self.config.max_anchor_attempts) {
			tracing::trace!(id = %id, "reconcile.anchor.exhausted");
		}
	}
}

/// Search-by-name link for a channel that did not resolve.
fn fallback_target(item: &ScannedItem, settings: &Settings) -> Option<Target> {
	if !settings.search_fallback || item.id().kind() != IdKind::Channel {
		return None;
	}
	let name = item
		.candidate
		.hints
		.handle
		.as_deref()
		.or_else(|| item.id().is_short_form().then(|| item.id().value()))?
		.trim_start_matches('@');
	if name.is_empty() {
		return None;
	}
	Some(Target::fallback(IdKind::Channel, format!("/$/search?q={name}")))
}
