use std::sync::Arc;

use crosslink_primitives::LogicalId;
use crosslink_worker::{EpochGuard, Superseded};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::time::Instant;

use super::{HealReport, Reconciler};
use crate::anchor;
use crate::host::{ElementId, ObserverId};
use crate::scan::ScanOutcome;

impl Reconciler {
	/// Revalidates every record watched by `observer` after a change
	/// notification.
	pub fn heal(&mut self, observer: ObserverId, guard: &EpochGuard) -> Result<HealReport, Superseded> {
		let ids = self.registry.by_observer(observer);
		self.heal_ids(&ids, guard)
	}

	/// Revalidates a single record, e.g. one left orphaned by an unpin.
	pub fn heal_one(&mut self, id: &LogicalId, guard: &EpochGuard) -> Result<HealReport, Superseded> {
		self.heal_ids(std::slice::from_ref(id), guard)
	}

	fn heal_ids(&mut self, ids: &[LogicalId], guard: &EpochGuard) -> Result<HealReport, Superseded> {
		let doc = Arc::clone(&self.doc);
		let mut report = HealReport::default();
		for id in ids {
			let Some(record) = self.registry.get_mut(id) else {
				continue;
			};
			if record.is_pinned() || record.is_anchored(&*doc) {
				continue;
			}
			if !doc.is_attached(record.item) {
				report.lost += 1;
				continue;
			}
			let Some(anchor) = anchor::select(&*doc, record.item) else {
				report.lost += 1;
				continue;
			};

			guard.check()?;
			let placed = if doc.is_attached(record.element) {
				doc.move_annotation(record.element, anchor.element).map(|()| record.element)
			} else {
				doc.insert_annotation(anchor.element, &record.view)
			};
			match placed {
				Ok(element) => {
					record.element = element;
					record.host_anchor = anchor.element;
					report.healed += 1;
					tracing::trace!(id = %id, role = ?anchor.role, "reconcile.heal");
				}
				Err(error) => {
					tracing::warn!(id = %id, %error, "annotation heal failed");
					report.failed += 1;
				}
			}
		}
		if report.healed > 0 || report.lost > 0 {
			tracing::debug!(healed = report.healed, lost = report.lost, failed = report.failed, "reconcile.heal.done");
		}
		Ok(report)
	}

	/// Removes annotation elements that duplicate a live record.
	pub(super) fn dedup_sweep(&mut self, guard: &EpochGuard) -> Result<usize, Superseded> {
		let mut removed = 0;
		let live: Vec<(LogicalId, ElementId)> = self.registry.iter().map(|record| (record.logical_id.clone(), record.element)).collect();
		for (id, element) in live {
			let found = self.doc.find_annotations(&id);
			removed += self.remove_strays(&found, element, guard)?;
		}
		if removed > 0 {
			tracing::debug!(removed, "reconcile.dedup");
		}
		Ok(removed)
	}

	/// Drops records whose host item now carries a different logical id.
	///
	/// Hosts recycle item elements for new content. A record whose own id was
	/// not seen in this scan but whose item was claimed by another id is stale
	/// right away; the unseen grace window does not apply to it.
	pub(super) fn retire_recycled(&mut self, outcome: &ScanOutcome, guard: &EpochGuard) -> Result<usize, Superseded> {
		let scanned: FxHashSet<&LogicalId> = outcome.items.iter().map(|item| &item.logical_id).collect();
		let claims: FxHashMap<ElementId, &LogicalId> = outcome.items.iter().map(|item| (item.candidate.item, &item.logical_id)).collect();
		let doomed: Vec<LogicalId> = self
			.registry
			.iter()
			.filter(|record| !scanned.contains(&record.logical_id))
			.filter(|record| claims.get(&record.item).is_some_and(|owner| **owner != record.logical_id))
			.map(|record| record.logical_id.clone())
			.collect();
		for id in &doomed {
			guard.check()?;
			self.remove_record(id);
		}
		if !doomed.is_empty() {
			tracing::debug!(retired = doomed.len(), "reconcile.recycled");
		}
		Ok(doomed.len())
	}

	/// Drops records from other epochs, records whose element left the
	/// document, and unpinned records unseen for longer than the grace window.
	pub(super) fn prune(&mut self, now: Instant, guard: &EpochGuard) -> Result<usize, Superseded> {
		let epoch = guard.epoch();
		let grace = self.config.unseen_grace;
		let doomed: Vec<LogicalId> = self
			.registry
			.iter()
			.filter(|record| {
				record.epoch != epoch
					|| !self.doc.is_attached(record.element)
					|| (!record.is_pinned() && now.saturating_duration_since(record.last_seen_at) > grace)
			})
			.map(|record| record.logical_id.clone())
			.collect();
		for id in &doomed {
			guard.check()?;
			self.remove_record(id);
		}
		if !doomed.is_empty() {
			tracing::debug!(pruned = doomed.len(), "reconcile.prune");
		}
		Ok(doomed.len())
	}
}
