use crosslink_primitives::LogicalId;
use rustc_hash::{FxHashMap, FxHashSet};

/// Per-epoch retry bookkeeping. Reset on every bump.
#[derive(Debug, Default)]
pub struct EpochMemory {
	found: FxHashSet<LogicalId>,
	absent: FxHashSet<LogicalId>,
	attempts: FxHashMap<LogicalId, u32>,
	abandoned: FxHashSet<LogicalId>,
	anchor_misses: FxHashMap<LogicalId, u32>,
}

impl EpochMemory {
	pub fn reset(&mut self) {
		self.found.clear();
		self.absent.clear();
		self.attempts.clear();
		self.abandoned.clear();
		self.anchor_misses.clear();
	}

	/// Whether the id should not be looked up again in this epoch.
	pub fn is_settled(&self, id: &LogicalId) -> bool {
		self.absent.contains(id) || self.abandoned.contains(id)
	}

	pub fn is_absent(&self, id: &LogicalId) -> bool {
		self.absent.contains(id)
	}

	pub fn is_abandoned(&self, id: &LogicalId) -> bool {
		self.abandoned.contains(id)
	}

	/// Returns true the first time `id` is known absent in this epoch.
	pub fn mark_absent(&mut self, id: &LogicalId) -> bool {
		self.attempts.remove(id);
		self.found.remove(id);
		self.absent.insert(id.clone())
	}

	/// Returns true the first time `id` is found in this epoch. Later cache
	/// hits for the same id are not news.
	pub fn mark_found(&mut self, id: &LogicalId) -> bool {
		self.attempts.remove(id);
		self.found.insert(id.clone())
	}

	/// Counts an unresolved lookup. Returns true once `max` is reached, at
	/// which point the id is abandoned for the epoch.
	pub fn note_unresolved(&mut self, id: &LogicalId, max: u32) -> bool {
		let attempts = self.attempts.entry(id.clone()).or_default();
		*attempts += 1;
		if *attempts < max {
			return false;
		}
		self.attempts.remove(id);
		self.abandoned.insert(id.clone());
		true
	}

	pub fn attempts(&self, id: &LogicalId) -> u32 {
		self.attempts.get(id).copied().unwrap_or(0)
	}

	/// Counts a pass that found no anchor. Returns true once `max` is reached.
	pub fn note_anchor_miss(&mut self, id: &LogicalId, max: u32) -> bool {
		let misses = self.anchor_misses.entry(id.clone()).or_default();
		*misses += 1;
		*misses >= max
	}

	pub fn anchor_exhausted(&self, id: &LogicalId, max: u32) -> bool {
		self.anchor_misses.get(id).is_some_and(|misses| *misses >= max)
	}

	pub fn clear_anchor_misses(&mut self, id: &LogicalId) {
		self.anchor_misses.remove(id);
	}
}
