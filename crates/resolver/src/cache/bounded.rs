use crosslink_primitives::{CacheKey, Target};
use indexmap::IndexMap;

/// Default capacity of the page-scoped tier.
pub const BOUNDED_CAPACITY: usize = 100;

/// Entries kept when the page-scoped tier overflows.
pub const BOUNDED_KEEP: usize = 50;

/// Insertion-ordered tier with bulk trimming.
///
/// Exceeding `capacity` drops everything except the `keep` most recently
/// inserted entries. Lookups do not refresh recency; re-inserting a key does.
#[derive(Debug, Clone)]
pub struct BoundedTier {
	entries: IndexMap<CacheKey, Option<Target>>,
	capacity: usize,
	keep: usize,
}

impl Default for BoundedTier {
	fn default() -> Self {
		Self::new(BOUNDED_CAPACITY, BOUNDED_KEEP)
	}
}

impl BoundedTier {
	pub fn new(capacity: usize, keep: usize) -> Self {
		let capacity = capacity.max(1);
		Self {
			entries: IndexMap::with_capacity(capacity + 1),
			capacity,
			keep: keep.clamp(1, capacity),
		}
	}

	pub fn get(&self, key: &CacheKey) -> Option<&Option<Target>> {
		self.entries.get(key)
	}

	pub fn insert(&mut self, key: CacheKey, value: Option<Target>) {
		self.entries.shift_remove(&key);
		self.entries.insert(key, value);
		if self.entries.len() > self.capacity {
			let drop = self.entries.len() - self.keep;
			self.entries.drain(..drop);
			tracing::trace!(dropped = drop, kept = self.entries.len(), "cache.bounded.trim");
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Keys from oldest to newest insertion.
	pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
		self.entries.keys()
	}
}
