//! Live annotation records and the observers that watch over them.

use crosslink_primitives::{Epoch, LogicalId, Target};
use rustc_hash::FxHashMap;
use tokio::time::Instant;

use crate::host::{AnnotationView, ElementId, HostDocument, HostError, ObserverId};
use crate::placement::Placement;

/// Engine-side record of one annotation in the host document.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
	pub logical_id: LogicalId,
	/// The annotation element itself.
	pub element: ElementId,
	/// Element the annotation is attached to while unpinned.
	pub host_anchor: ElementId,
	/// Root of the host item the annotation belongs to.
	pub item: ElementId,
	pub epoch: Epoch,
	pub last_seen_at: Instant,
	pub observer: Option<ObserverId>,
	pub target: Target,
	pub view: AnnotationView,
	pub placement: Placement,
}

impl AnnotationRecord {
	pub fn is_pinned(&self) -> bool {
		matches!(self.placement, Placement::Pinned { .. })
	}

	/// Whether the element is still attached inside its host anchor.
	pub fn is_anchored(&self, doc: &dyn HostDocument) -> bool {
		doc.is_attached(self.element) && doc.is_attached(self.host_anchor) && doc.contains(self.host_anchor, self.element)
	}
}

#[derive(Debug, Clone, Copy)]
struct Watch {
	observer: ObserverId,
	refs: usize,
}

/// One record per logical id, plus refcounted container observers.
#[derive(Debug, Default)]
pub struct AnnotationRegistry {
	records: FxHashMap<LogicalId, AnnotationRecord>,
	watches: FxHashMap<ElementId, Watch>,
}

impl AnnotationRegistry {
	pub fn get(&self, logical_id: &LogicalId) -> Option<&AnnotationRecord> {
		self.records.get(logical_id)
	}

	pub fn get_mut(&mut self, logical_id: &LogicalId) -> Option<&mut AnnotationRecord> {
		self.records.get_mut(logical_id)
	}

	pub fn contains(&self, logical_id: &LogicalId) -> bool {
		self.records.contains_key(logical_id)
	}

	/// Stores `record`, returning the one it replaced.
	pub fn insert(&mut self, record: AnnotationRecord) -> Option<AnnotationRecord> {
		self.records.insert(record.logical_id.clone(), record)
	}

	pub fn remove(&mut self, logical_id: &LogicalId) -> Option<AnnotationRecord> {
		self.records.remove(logical_id)
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &AnnotationRecord> {
		self.records.values()
	}

	pub fn logical_ids(&self) -> Vec<LogicalId> {
		self.records.keys().cloned().collect()
	}

	pub fn by_element(&self, element: ElementId) -> Option<&LogicalId> {
		self.records.values().find(|record| record.element == element).map(|record| &record.logical_id)
	}

	pub fn by_item(&self, item: ElementId) -> Option<&LogicalId> {
		self.records.values().find(|record| record.item == item).map(|record| &record.logical_id)
	}

	/// Records watched by `observer`.
	pub fn by_observer(&self, observer: ObserverId) -> Vec<LogicalId> {
		self.records
			.values()
			.filter(|record| record.observer == Some(observer))
			.map(|record| record.logical_id.clone())
			.collect()
	}

	/// Returns the observer on `container`, subscribing on first use.
	pub fn watch(&mut self, doc: &dyn HostDocument, container: ElementId) -> Result<ObserverId, HostError> {
		if let Some(watch) = self.watches.get_mut(&container) {
			watch.refs += 1;
			return Ok(watch.observer);
		}
		let observer = doc.observe(container)?;
		tracing::trace!(container = container.0, observer = observer.0, "registry.observe");
		self.watches.insert(container, Watch { observer, refs: 1 });
		Ok(observer)
	}

	/// Drops one reference to `observer`, disconnecting it at zero.
	pub fn unwatch(&mut self, doc: &dyn HostDocument, observer: ObserverId) {
		let Some((&container, watch)) = self.watches.iter_mut().find(|(_, watch)| watch.observer == observer) else {
			return;
		};
		watch.refs = watch.refs.saturating_sub(1);
		if watch.refs == 0 {
			self.watches.remove(&container);
			doc.disconnect(observer);
			tracing::trace!(container = container.0, observer = observer.0, "registry.disconnect");
		}
	}

	/// Disconnects every observer and forgets the subscriptions.
	pub fn disconnect_all(&mut self, doc: &dyn HostDocument) -> usize {
		let count = self.watches.len();
		for (_, watch) in self.watches.drain() {
			doc.disconnect(watch.observer);
		}
		for record in self.records.values_mut() {
			record.observer = None;
		}
		count
	}

	pub fn observer_count(&self) -> usize {
		self.watches.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::host::MemoryDocument;

	#[test]
	fn test_observers_are_shared_per_container() {
		let doc = MemoryDocument::new();
		let grid = doc.append_container(doc.root(), true);
		let mut registry = AnnotationRegistry::default();

		let first = registry.watch(&doc, grid).unwrap();
		let second = registry.watch(&doc, grid).unwrap();
		assert_eq!(first, second);
		assert_eq!(doc.observer_count(), 1);

		registry.unwatch(&doc, first);
		assert_eq!(doc.observer_count(), 1);
		registry.unwatch(&doc, first);
		assert_eq!(doc.observer_count(), 0);
		assert_eq!(registry.observer_count(), 0);
	}

	#[test]
	fn test_disconnect_all() {
		let doc = MemoryDocument::new();
		let left = doc.append_container(doc.root(), true);
		let right = doc.append_container(doc.root(), true);
		let mut registry = AnnotationRegistry::default();
		registry.watch(&doc, left).unwrap();
		registry.watch(&doc, right).unwrap();

		assert_eq!(registry.disconnect_all(&doc), 2);
		assert_eq!(doc.observer_count(), 0);
	}
}
