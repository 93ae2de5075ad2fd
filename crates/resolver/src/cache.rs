//! Three-tier resolution cache.
//!
//! # Tiers
//!
//! 1. **Volatile**: plain map for the current epoch, cleared on every bump.
//! 2. **Bounded**: page-scoped, survives bumps so repeated navigations to
//!    similar result sets stay warm. Trimmed in bulk on overflow, see
//!    [`BoundedTier`].
//! 3. **Persistent**: a [`PersistentStore`] shared across sessions. Reads are
//!    awaited and any error reads as a miss. Writes are spawned and never
//!    awaited by the caller; a failed write is logged and forgotten.
//!
//! Lookups walk the tiers in that order and promote a hit into the faster
//! tiers. Network resolutions are written through into all three tiers under
//! every key form known for the item. Every write is gated on the caller's
//! [`EpochGuard`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crosslink_primitives::{CacheKey, Target};
use crosslink_worker::{EpochGuard, Superseded, TaskClass, spawn};
use rustc_hash::FxHashMap;

mod bounded;
mod json_store;
mod store;

#[cfg(test)]
mod tests;

pub use bounded::{BOUNDED_CAPACITY, BOUNDED_KEEP, BoundedTier};
pub use json_store::JsonFileStore;
pub use store::{MemoryStore, PersistentStore, StoreError, StoreLookup};

/// Cache tier that served a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
	Volatile,
	Bounded,
	Persistent,
}

/// Outcome of a tiered lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
	/// Cached value; `None` is a cached known-absent.
	Hit { tier: Tier, value: Option<Target> },
	Miss,
}

impl CacheLookup {
	pub fn is_hit(&self) -> bool {
		matches!(self, Self::Hit { .. })
	}
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
	pub volatile_hits: u64,
	pub bounded_hits: u64,
	pub persistent_hits: u64,
	pub misses: u64,
	pub store_read_errors: u64,
}

/// Volatile, bounded and persistent tiers consulted in order.
pub struct TieredCache {
	volatile: FxHashMap<CacheKey, Option<Target>>,
	bounded: BoundedTier,
	store: Arc<dyn PersistentStore>,
	stats: CacheStats,
	dropped_writes: Arc<AtomicU64>,
}

impl std::fmt::Debug for TieredCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TieredCache")
			.field("volatile", &self.volatile.len())
			.field("bounded", &self.bounded.len())
			.field("stats", &self.stats)
			.finish()
	}
}

impl TieredCache {
	pub fn new(store: Arc<dyn PersistentStore>) -> Self {
		Self::with_bounded(store, BoundedTier::default())
	}

	pub fn with_bounded(store: Arc<dyn PersistentStore>, bounded: BoundedTier) -> Self {
		Self {
			volatile: FxHashMap::default(),
			bounded,
			store,
			stats: CacheStats::default(),
			dropped_writes: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Looks `keys` up tier by tier; every key form is tried in a tier before
	/// moving to the next one.
	pub async fn lookup(&mut self, keys: &[CacheKey], guard: &EpochGuard) -> Result<CacheLookup, Superseded> {
		if let Some(value) = keys.iter().find_map(|key| self.volatile.get(key)) {
			self.stats.volatile_hits += 1;
			return Ok(CacheLookup::Hit {
				tier: Tier::Volatile,
				value: value.clone(),
			});
		}

		if let Some(value) = keys.iter().find_map(|key| self.bounded.get(key)).cloned() {
			guard.check()?;
			self.stats.bounded_hits += 1;
			for key in keys {
				self.volatile.insert(key.clone(), value.clone());
			}
			return Ok(CacheLookup::Hit { tier: Tier::Bounded, value });
		}

		for key in keys {
			let value = match self.store.get(key).await {
				Ok(StoreLookup::Found(value)) => value,
				Ok(StoreLookup::Miss) => continue,
				Err(error) => {
					self.stats.store_read_errors += 1;
					tracing::debug!(key = %key, %error, "cache.persistent.read_failed");
					continue;
				}
			};
			guard.check()?;
			self.stats.persistent_hits += 1;
			for key in keys {
				self.volatile.insert(key.clone(), value.clone());
				self.bounded.insert(key.clone(), value.clone());
			}
			return Ok(CacheLookup::Hit {
				tier: Tier::Persistent,
				value,
			});
		}

		self.stats.misses += 1;
		Ok(CacheLookup::Miss)
	}

	/// Synchronous lookup limited to the in-memory tiers. Does not promote.
	pub fn peek(&self, keys: &[CacheKey]) -> Option<(Tier, Option<Target>)> {
		if let Some(value) = keys.iter().find_map(|key| self.volatile.get(key)) {
			return Some((Tier::Volatile, value.clone()));
		}
		keys.iter()
			.find_map(|key| self.bounded.get(key))
			.map(|value| (Tier::Bounded, value.clone()))
	}

	/// Writes a network resolution through every tier under every key.
	///
	/// The persistent write is spawned; its failure never reaches the caller.
	pub fn insert_resolved(&mut self, keys: &[CacheKey], value: Option<Target>, guard: &EpochGuard) -> Result<(), Superseded> {
		guard.check()?;
		for key in keys {
			self.volatile.insert(key.clone(), value.clone());
			self.bounded.insert(key.clone(), value.clone());
		}

		let store = Arc::clone(&self.store);
		let dropped = Arc::clone(&self.dropped_writes);
		let keys = keys.to_vec();
		spawn(TaskClass::Background, "cache.persist", async move {
			for key in keys {
				if let Err(error) = store.put(key.clone(), value.clone()).await {
					dropped.fetch_add(1, Ordering::AcqRel);
					tracing::debug!(key = %key, %error, "cache.persistent.write_dropped");
				}
			}
		});
		Ok(())
	}

	/// Drops the per-epoch tier. Called on every epoch bump.
	pub fn clear_volatile(&mut self) {
		let cleared = self.volatile.len();
		self.volatile.clear();
		tracing::trace!(cleared, "cache.volatile.clear");
	}

	pub fn volatile_len(&self) -> usize {
		self.volatile.len()
	}

	pub fn bounded_len(&self) -> usize {
		self.bounded.len()
	}

	pub fn bounded(&self) -> &BoundedTier {
		&self.bounded
	}

	pub fn stats(&self) -> CacheStats {
		self.stats
	}

	/// Persistent writes that failed and were discarded.
	pub fn dropped_writes(&self) -> u64 {
		self.dropped_writes.load(Ordering::Acquire)
	}
}
