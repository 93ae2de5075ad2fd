use serde::Serialize;

/// Counters for one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
	/// Distinct logical ids found by the scan.
	pub scanned: usize,
	/// Items without a usable identifier or disabled by settings.
	pub skipped: usize,
	/// Lower-scoring duplicate claims on a logical id.
	pub shadowed: usize,
	/// Ids with a target, whether fresh or already known this epoch.
	pub resolved: usize,
	pub absent: usize,
	/// Ids that went from unknown or unresolved to found or absent.
	pub newly_settled: usize,
	/// Unresolved this pass and still eligible for a retry.
	pub unresolved: usize,
	/// Unresolved for the last allowed time this epoch.
	pub abandoned: usize,
	pub created: usize,
	pub moved: usize,
	pub reused: usize,
	pub anchor_missing: usize,
	/// Duplicate annotation elements removed.
	pub deduped: usize,
	/// Records removed because their target went away or their kind was disabled.
	pub retired: usize,
	pub pruned: usize,
	/// Per-item host failures.
	pub failed: usize,
	/// The pass stopped early because the epoch moved on.
	pub superseded: bool,
}

impl PassReport {
	/// Whether anything was newly settled or placed. Repeated cache hits on
	/// ids already annotated do not count.
	pub fn made_progress(&self) -> bool {
		self.newly_settled > 0 || self.created > 0 || self.moved > 0
	}
}

/// Counters for one heal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealReport {
	/// Records re-anchored inside their item.
	pub healed: usize,
	/// Records whose item is gone; a rescan is needed.
	pub lost: usize,
	pub failed: usize,
}

impl HealReport {
	pub fn needs_rescan(&self) -> bool {
		self.lost > 0
	}
}
