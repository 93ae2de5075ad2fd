use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use crosslink_primitives::{CacheKey, Target};
use crosslink_worker::{TaskClass, spawn_blocking};
use parking_lot::Mutex;

use super::store::{PersistentStore, StoreError, StoreLookup};

type Entries = BTreeMap<CacheKey, Option<Target>>;

/// Store backed by a single JSON file.
///
/// The file is read once on open and rewritten in full after every put. A
/// missing file is an empty store; an unreadable one is logged and replaced.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
	path: Arc<PathBuf>,
	entries: Arc<Mutex<Entries>>,
	/// Serializes file rewrites so an older snapshot never lands last.
	write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl JsonFileStore {
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();
		let entries = match std::fs::read(&path) {
			Ok(bytes) => serde_json::from_slice::<Entries>(&bytes).unwrap_or_else(|error| {
				tracing::warn!(path = %path.display(), %error, "discarding unreadable cache file");
				Entries::new()
			}),
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => Entries::new(),
			Err(error) => return Err(StoreError::Io { path, error }),
		};
		tracing::debug!(path = %path.display(), entries = entries.len(), "cache.store.open");

		Ok(Self {
			path: Arc::new(path),
			entries: Arc::new(Mutex::new(entries)),
			write_lock: Arc::new(tokio::sync::Mutex::new(())),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
	let tmp = path.with_extension("json.tmp");
	std::fs::write(&tmp, bytes).map_err(|error| StoreError::Io { path: tmp.clone(), error })?;
	std::fs::rename(&tmp, path).map_err(|error| StoreError::Io {
		path: path.to_path_buf(),
		error,
	})
}

#[async_trait]
impl PersistentStore for JsonFileStore {
	async fn get(&self, key: &CacheKey) -> Result<StoreLookup, StoreError> {
		Ok(match self.entries.lock().get(key) {
			Some(value) => StoreLookup::Found(value.clone()),
			None => StoreLookup::Miss,
		})
	}

	async fn put(&self, key: CacheKey, value: Option<Target>) -> Result<(), StoreError> {
		let _writer = self.write_lock.lock().await;
		let bytes = {
			let mut entries = self.entries.lock();
			entries.insert(key, value);
			serde_json::to_vec_pretty(&*entries)?
		};

		let path = Arc::clone(&self.path);
		spawn_blocking(TaskClass::IoBlocking, "cache.store.write", move || write_atomically(&path, &bytes))
			.await
			.map_err(|error| StoreError::Closed(error.to_string()))?
	}
}
