//! In-memory host document.
//!
//! Backs the CLI and the tests. Host-side mutations (appending, replacing and
//! detaching items, cloning annotations) notify every observer whose container
//! encloses the change, the way a mutation observer would. Engine-side
//! annotation writes do not notify, so the engine never reacts to itself.

use crosslink_primitives::{LogicalId, Rect};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use super::{AnchorCandidate, AnchorRole, AnnotationView, ElementId, HostDocument, HostError, ItemCandidate, ItemHints, ItemPattern, ObserverId};
use crate::events::HostEvent;

/// Side length of an annotation badge.
const BADGE_SIZE: f64 = 24.0;
const BADGE_INSET: f64 = 4.0;

/// Declarative description of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ItemSpec {
	pub pattern: ItemPattern,
	pub href: String,
	#[serde(default)]
	pub hints: ItemHints,
	#[serde(default = "default_item_rect")]
	pub rect: Rect,
	/// Anchor elements inside the item besides the root and the link.
	#[serde(default = "default_anchors")]
	pub anchors: Vec<AnchorRole>,
}

impl ItemSpec {
	pub fn new(pattern: ItemPattern, href: impl Into<String>) -> Self {
		Self {
			pattern,
			href: href.into(),
			hints: ItemHints::default(),
			rect: default_item_rect(),
			anchors: default_anchors(),
		}
	}

	pub fn with_hints(mut self, hints: ItemHints) -> Self {
		self.hints = hints;
		self
	}

	pub fn with_rect(mut self, rect: Rect) -> Self {
		self.rect = rect;
		self
	}

	pub fn with_anchors(mut self, anchors: impl IntoIterator<Item = AnchorRole>) -> Self {
		self.anchors = anchors.into_iter().collect();
		self
	}
}

fn default_item_rect() -> Rect {
	Rect::new(0.0, 0.0, 320.0, 180.0)
}

fn default_anchors() -> Vec<AnchorRole> {
	vec![AnchorRole::Thumbnail]
}

fn default_stable() -> bool {
	true
}

/// A container full of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerFixture {
	#[serde(default = "default_stable")]
	pub stable: bool,
	#[serde(default)]
	pub items: Vec<ItemSpec>,
}

/// Page layout loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFixture {
	#[serde(default)]
	pub containers: Vec<ContainerFixture>,
}

/// Elements created for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemHandles {
	pub item: ElementId,
	pub link: ElementId,
	pub anchors: Vec<(AnchorRole, ElementId)>,
}

impl ItemHandles {
	pub fn anchor(&self, role: AnchorRole) -> Option<ElementId> {
		self.anchors.iter().find(|(r, _)| *r == role).map(|(_, id)| *id)
	}
}

#[derive(Debug, Clone)]
enum NodeKind {
	Root,
	Container { stable: bool },
	Item { pattern: ItemPattern, href: String, hints: ItemHints },
	Anchor(AnchorRole),
	Link,
	Annotation(AnnotationView),
}

#[derive(Debug, Clone)]
struct Node {
	parent: Option<ElementId>,
	children: Vec<ElementId>,
	kind: NodeKind,
	rect: Rect,
	fixed: Option<Rect>,
	hover_suppressed: bool,
}

#[derive(Debug)]
struct Tree {
	nodes: Vec<Node>,
	observers: Vec<(ObserverId, ElementId)>,
	next_observer: u64,
}

const ROOT: ElementId = ElementId(0);

impl Tree {
	fn new() -> Self {
		Self {
			nodes: vec![Node {
				parent: None,
				children: Vec::new(),
				kind: NodeKind::Root,
				rect: Rect::new(0.0, 0.0, 1280.0, 720.0),
				fixed: None,
				hover_suppressed: false,
			}],
			observers: Vec::new(),
			next_observer: 0,
		}
	}

	fn node(&self, id: ElementId) -> Option<&Node> {
		self.nodes.get(id.0 as usize)
	}

	fn node_mut(&mut self, id: ElementId) -> Option<&mut Node> {
		self.nodes.get_mut(id.0 as usize)
	}

	fn push(&mut self, parent: ElementId, kind: NodeKind, rect: Rect) -> ElementId {
		let id = ElementId(self.nodes.len() as u64);
		self.nodes.push(Node {
			parent: Some(parent),
			children: Vec::new(),
			kind,
			rect,
			fixed: None,
			hover_suppressed: false,
		});
		if let Some(parent) = self.node_mut(parent) {
			parent.children.push(id);
		}
		id
	}

	fn is_attached(&self, mut id: ElementId) -> bool {
		loop {
			if id == ROOT {
				return true;
			}
			match self.node(id).and_then(|node| node.parent) {
				Some(parent) => id = parent,
				None => return false,
			}
		}
	}

	fn contains(&self, ancestor: ElementId, element: ElementId) -> bool {
		let mut cursor = Some(element);
		while let Some(id) = cursor {
			if id == ancestor {
				return true;
			}
			cursor = self.node(id).and_then(|node| node.parent);
		}
		false
	}

	fn detach(&mut self, id: ElementId) {
		let Some(parent) = self.node_mut(id).and_then(|node| node.parent.take()) else {
			return;
		};
		if let Some(parent) = self.node_mut(parent) {
			parent.children.retain(|child| *child != id);
		}
	}

	fn append(&mut self, parent: ElementId, id: ElementId) {
		self.detach(id);
		if let Some(node) = self.node_mut(id) {
			node.parent = Some(parent);
		}
		if let Some(parent) = self.node_mut(parent) {
			parent.children.push(id);
		}
	}

	fn descendants(&self, root: ElementId) -> Vec<ElementId> {
		let mut out = Vec::new();
		let mut stack = vec![root];
		while let Some(id) = stack.pop() {
			out.push(id);
			if let Some(node) = self.node(id) {
				stack.extend(node.children.iter().rev().copied());
			}
		}
		out
	}

	fn bounding_box(&self, id: ElementId) -> Option<Rect> {
		if !self.is_attached(id) {
			return None;
		}
		let node = self.node(id)?;
		if let Some(fixed) = node.fixed {
			return Some(fixed);
		}
		match node.kind {
			NodeKind::Annotation(_) => {
				let parent = self.bounding_box(node.parent?)?;
				Some(Rect::new(parent.right() - BADGE_SIZE - BADGE_INSET, parent.top() + BADGE_INSET, BADGE_SIZE, BADGE_SIZE))
			}
			_ => Some(node.rect),
		}
	}

	fn annotation_mut(&mut self, id: ElementId) -> Result<&mut Node, HostError> {
		match self.node_mut(id) {
			Some(node) if matches!(node.kind, NodeKind::Annotation(_)) => Ok(node),
			_ => Err(HostError::NotAnnotation(id)),
		}
	}

	fn require_attached(&self, id: ElementId) -> Result<(), HostError> {
		if self.is_attached(id) { Ok(()) } else { Err(HostError::Detached(id)) }
	}

	fn build_item(&mut self, parent: ElementId, spec: &ItemSpec) -> ItemHandles {
		let item = self.push(
			parent,
			NodeKind::Item {
				pattern: spec.pattern,
				href: spec.href.clone(),
				hints: spec.hints.clone(),
			},
			spec.rect,
		);
		let anchors = spec
			.anchors
			.iter()
			.filter(|role| !matches!(role, AnchorRole::ItemRoot | AnchorRole::Link))
			.map(|role| (*role, self.push(item, NodeKind::Anchor(*role), spec.rect)))
			.collect();
		let link = self.push(item, NodeKind::Link, spec.rect);
		ItemHandles { item, link, anchors }
	}

	/// Observers whose container encloses `element` right now.
	fn watchers_of(&self, element: ElementId) -> Vec<ObserverId> {
		self.observers
			.iter()
			.filter(|(_, container)| self.contains(*container, element))
			.map(|(observer, _)| *observer)
			.collect()
	}
}

/// Mutable in-memory document tree.
pub struct MemoryDocument {
	tree: Mutex<Tree>,
	notifier: Mutex<Option<UnboundedSender<HostEvent>>>,
}

impl Default for MemoryDocument {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for MemoryDocument {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let tree = self.tree.lock();
		f.debug_struct("MemoryDocument")
			.field("nodes", &tree.nodes.len())
			.field("observers", &tree.observers.len())
			.finish()
	}
}

impl MemoryDocument {
	pub fn new() -> Self {
		Self {
			tree: Mutex::new(Tree::new()),
			notifier: Mutex::new(None),
		}
	}

	/// Builds a document from a fixture: one container per entry under the root.
	pub fn from_fixture(fixture: &PageFixture) -> Self {
		let doc = Self::new();
		for container in &fixture.containers {
			let id = doc.append_container(ROOT, container.stable);
			for spec in &container.items {
				doc.append_item(id, spec.clone());
			}
		}
		doc
	}

	/// Routes observer notifications into `sender`.
	pub fn set_notifier(&self, sender: UnboundedSender<HostEvent>) {
		*self.notifier.lock() = Some(sender);
	}

	/// Stops routing observer notifications.
	pub fn clear_notifier(&self) {
		self.notifier.lock().take();
	}

	pub fn root(&self) -> ElementId {
		ROOT
	}

	pub fn append_container(&self, parent: ElementId, stable: bool) -> ElementId {
		let mut tree = self.tree.lock();
		let rect = tree.node(parent).map(|node| node.rect).unwrap_or_default();
		let id = tree.push(parent, NodeKind::Container { stable }, rect);
		self.notify(&tree, id);
		id
	}

	pub fn append_item(&self, parent: ElementId, spec: ItemSpec) -> ItemHandles {
		let mut tree = self.tree.lock();
		let handles = tree.build_item(parent, &spec);
		self.notify(&tree, handles.item);
		handles
	}

	/// Swaps `old` for a freshly built item in the same position, the way a
	/// host re-render does. The old subtree is detached with everything in it.
	pub fn replace_item(&self, old: ElementId, spec: ItemSpec) -> Option<ItemHandles> {
		let mut tree = self.tree.lock();
		let parent = tree.node(old)?.parent?;
		let position = tree.node(parent)?.children.iter().position(|child| *child == old)?;
		let handles = tree.build_item(parent, &spec);
		if let Some(parent_node) = tree.node_mut(parent) {
			parent_node.children.pop();
			parent_node.children.insert(position, handles.item);
		}
		let watchers = tree.watchers_of(old);
		tree.detach(old);
		self.send(watchers);
		Some(handles)
	}

	/// Re-renders the anchor subtree of an item: every anchor and the link are
	/// replaced by fresh elements with the same roles. Annotations attached to
	/// the old anchors leave the document with them.
	pub fn rerender_item(&self, item: ElementId) -> Option<ItemHandles> {
		let mut tree = self.tree.lock();
		let node = tree.node(item)?.clone();
		let NodeKind::Item { .. } = node.kind else {
			return None;
		};
		let watchers = tree.watchers_of(item);
		let mut anchors = Vec::new();
		let mut link = None;
		for child in node.children {
			let Some(kind) = tree.node(child).map(|n| n.kind.clone()) else {
				continue;
			};
			match kind {
				NodeKind::Anchor(role) => {
					tree.detach(child);
					anchors.push((role, tree.push(item, NodeKind::Anchor(role), node.rect)));
				}
				NodeKind::Link => {
					tree.detach(child);
					link = Some(tree.push(item, NodeKind::Link, node.rect));
				}
				_ => {}
			}
		}
		self.send(watchers);
		Some(ItemHandles {
			item,
			link: link.unwrap_or(item),
			anchors,
		})
	}

	/// Points an existing item at different content, as virtualized lists do
	/// when they recycle item elements.
	pub fn set_href(&self, item: ElementId, href: impl Into<String>) {
		let mut tree = self.tree.lock();
		let Some(node) = tree.node_mut(item) else {
			return;
		};
		if let NodeKind::Item { href: current, .. } = &mut node.kind {
			*current = href.into();
		}
		self.notify(&tree, item);
	}

	/// Removes `element` and its subtree from the document.
	pub fn detach(&self, element: ElementId) {
		let mut tree = self.tree.lock();
		let watchers = tree.watchers_of(element);
		tree.detach(element);
		self.send(watchers);
	}

	/// Copies an annotation under `parent`, as a host cloning a subtree would.
	pub fn clone_annotation(&self, annotation: ElementId, parent: ElementId) -> Option<ElementId> {
		let mut tree = self.tree.lock();
		let node = tree.node(annotation)?;
		let NodeKind::Annotation(view) = node.kind.clone() else {
			return None;
		};
		let rect = node.rect;
		let id = tree.push(parent, NodeKind::Annotation(view), rect);
		self.notify(&tree, id);
		Some(id)
	}

	pub fn set_rect(&self, element: ElementId, rect: Rect) {
		let mut tree = self.tree.lock();
		for id in tree.descendants(element) {
			if let Some(node) = tree.node_mut(id)
				&& !matches!(node.kind, NodeKind::Annotation(_))
			{
				node.rect = rect;
			}
		}
	}

	pub fn annotation_view(&self, annotation: ElementId) -> Option<AnnotationView> {
		match &self.tree.lock().node(annotation)?.kind {
			NodeKind::Annotation(view) => Some(view.clone()),
			_ => None,
		}
	}

	pub fn parent_of(&self, element: ElementId) -> Option<ElementId> {
		self.tree.lock().node(element)?.parent
	}

	pub fn is_hover_suppressed(&self, item: ElementId) -> bool {
		self.tree.lock().node(item).is_some_and(|node| node.hover_suppressed)
	}

	pub fn fixed_geometry(&self, annotation: ElementId) -> Option<Rect> {
		self.tree.lock().node(annotation)?.fixed
	}

	/// Every attached annotation, in document order.
	pub fn annotations(&self) -> Vec<(ElementId, AnnotationView)> {
		let tree = self.tree.lock();
		tree.descendants(ROOT)
			.into_iter()
			.filter_map(|id| match &tree.node(id)?.kind {
				NodeKind::Annotation(view) => Some((id, view.clone())),
				_ => None,
			})
			.collect()
	}

	pub fn observer_count(&self) -> usize {
		self.tree.lock().observers.len()
	}

	fn notify(&self, tree: &Tree, element: ElementId) {
		self.send(tree.watchers_of(element));
	}

	fn send(&self, observers: Vec<ObserverId>) {
		if observers.is_empty() {
			return;
		}
		let notifier = self.notifier.lock();
		let Some(sender) = notifier.as_ref() else {
			return;
		};
		for observer in observers {
			// A closed receiver means the session is gone.
			let _ = sender.send(HostEvent::Mutated { observer });
		}
	}
}

impl HostDocument for MemoryDocument {
	fn scan_items(&self) -> Vec<ItemCandidate> {
		let tree = self.tree.lock();
		tree.descendants(ROOT)
			.into_iter()
			.filter_map(|id| {
				let NodeKind::Item { pattern, href, hints } = &tree.node(id)?.kind else {
					return None;
				};
				let link = tree
					.descendants(id)
					.into_iter()
					.find(|child| matches!(tree.node(*child).map(|n| &n.kind), Some(NodeKind::Link)))
					.unwrap_or(id);
				Some(ItemCandidate {
					item: id,
					link,
					href: href.clone(),
					pattern: *pattern,
					hints: hints.clone(),
				})
			})
			.collect()
	}

	fn anchor_candidates(&self, item: ElementId) -> Vec<AnchorCandidate> {
		let tree = self.tree.lock();
		if !tree.is_attached(item) {
			return Vec::new();
		}
		let mut out = Vec::new();
		for id in tree.descendants(item) {
			let role = match tree.node(id).map(|n| &n.kind) {
				Some(NodeKind::Item { .. }) if id == item => AnchorRole::ItemRoot,
				Some(NodeKind::Anchor(role)) => *role,
				Some(NodeKind::Link) => AnchorRole::Link,
				_ => continue,
			};
			out.push(AnchorCandidate { element: id, role });
		}
		out
	}

	fn stable_container(&self, item: ElementId) -> Option<ElementId> {
		let tree = self.tree.lock();
		if !tree.is_attached(item) {
			return None;
		}
		let mut cursor = tree.node(item)?.parent;
		while let Some(id) = cursor {
			let node = tree.node(id)?;
			if matches!(node.kind, NodeKind::Container { stable: true } | NodeKind::Root) {
				return Some(id);
			}
			cursor = node.parent;
		}
		None
	}

	fn is_attached(&self, element: ElementId) -> bool {
		self.tree.lock().is_attached(element)
	}

	fn contains(&self, ancestor: ElementId, element: ElementId) -> bool {
		self.tree.lock().contains(ancestor, element)
	}

	fn bounding_box(&self, element: ElementId) -> Option<Rect> {
		self.tree.lock().bounding_box(element)
	}

	fn observe(&self, container: ElementId) -> Result<ObserverId, HostError> {
		let mut tree = self.tree.lock();
		tree.require_attached(container)?;
		let observer = ObserverId(tree.next_observer);
		tree.next_observer += 1;
		tree.observers.push((observer, container));
		Ok(observer)
	}

	fn disconnect(&self, observer: ObserverId) {
		self.tree.lock().observers.retain(|(id, _)| *id != observer);
	}

	fn insert_annotation(&self, anchor: ElementId, view: &AnnotationView) -> Result<ElementId, HostError> {
		let mut tree = self.tree.lock();
		tree.require_attached(anchor)?;
		Ok(tree.push(anchor, NodeKind::Annotation(view.clone()), Rect::default()))
	}

	fn update_annotation(&self, annotation: ElementId, view: &AnnotationView) -> Result<(), HostError> {
		let mut tree = self.tree.lock();
		tree.annotation_mut(annotation)?.kind = NodeKind::Annotation(view.clone());
		Ok(())
	}

	fn move_annotation(&self, annotation: ElementId, anchor: ElementId) -> Result<(), HostError> {
		let mut tree = self.tree.lock();
		tree.annotation_mut(annotation)?;
		tree.require_attached(anchor)?;
		tree.append(anchor, annotation);
		Ok(())
	}

	fn remove_annotation(&self, annotation: ElementId) {
		let mut tree = self.tree.lock();
		if tree.annotation_mut(annotation).is_ok() {
			tree.detach(annotation);
		}
	}

	fn find_annotations(&self, logical_id: &LogicalId) -> Vec<ElementId> {
		let tree = self.tree.lock();
		tree.descendants(ROOT)
			.into_iter()
			.filter(|id| matches!(tree.node(*id).map(|n| &n.kind), Some(NodeKind::Annotation(view)) if view.logical_id == *logical_id))
			.collect()
	}

	fn reparent_to_root(&self, annotation: ElementId) -> Result<(), HostError> {
		let mut tree = self.tree.lock();
		tree.annotation_mut(annotation)?;
		tree.append(ROOT, annotation);
		Ok(())
	}

	fn set_fixed_geometry(&self, annotation: ElementId, rect: Option<Rect>) -> Result<(), HostError> {
		self.tree.lock().annotation_mut(annotation)?.fixed = rect;
		Ok(())
	}

	fn set_hover_suppressed(&self, item: ElementId, suppressed: bool) {
		if let Some(node) = self.tree.lock().node_mut(item) {
			node.hover_suppressed = suppressed;
		}
	}
}
