use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use crosslink_primitives::{CacheKey, Target};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Result of a persistent read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLookup {
	/// Stored value; `None` is a stored known-absent.
	Found(Option<Target>),
	Miss,
}

/// Persistent store failures. Callers treat all of them as best-effort misses.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("I/O error on {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },
	#[error("store encoding error: {0}")]
	Codec(#[from] serde_json::Error),
	/// The store (or its background writer) is gone.
	#[error("store closed: {0}")]
	Closed(String),
}

/// Durable key-value storage for resolutions, shared across sessions.
#[async_trait]
pub trait PersistentStore: Send + Sync + 'static {
	async fn get(&self, key: &CacheKey) -> Result<StoreLookup, StoreError>;

	async fn put(&self, key: CacheKey, value: Option<Target>) -> Result<(), StoreError>;
}

/// Process-lifetime store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
	inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
	entries: Mutex<FxHashMap<CacheKey, Option<Target>>>,
	reads: AtomicUsize,
	writes: AtomicUsize,
	fail_writes: AtomicBool,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every following write fail with [`StoreError::Closed`].
	pub fn set_fail_writes(&self, fail: bool) {
		self.inner.fail_writes.store(fail, Ordering::Release);
	}

	pub fn contains(&self, key: &CacheKey) -> bool {
		self.inner.entries.lock().contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.inner.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn reads(&self) -> usize {
		self.inner.reads.load(Ordering::Acquire)
	}

	pub fn writes(&self) -> usize {
		self.inner.writes.load(Ordering::Acquire)
	}
}

#[async_trait]
impl PersistentStore for MemoryStore {
	async fn get(&self, key: &CacheKey) -> Result<StoreLookup, StoreError> {
		self.inner.reads.fetch_add(1, Ordering::AcqRel);
		Ok(match self.inner.entries.lock().get(key) {
			Some(value) => StoreLookup::Found(value.clone()),
			None => StoreLookup::Miss,
		})
	}

	async fn put(&self, key: CacheKey, value: Option<Target>) -> Result<(), StoreError> {
		if self.inner.fail_writes.load(Ordering::Acquire) {
			return Err(StoreError::Closed("writes disabled".into()));
		}
		self.inner.writes.fetch_add(1, Ordering::AcqRel);
		self.inner.entries.lock().insert(key, value);
		Ok(())
	}
}
