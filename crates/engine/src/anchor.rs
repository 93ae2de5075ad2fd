//! Anchor ranking.

use crate::host::{AnchorCandidate, AnchorRole, ElementId, HostDocument};

/// Preference of `role` as an anchor; higher wins.
pub const fn rank(role: AnchorRole) -> u8 {
	match role {
		AnchorRole::Thumbnail => 5,
		AnchorRole::ImageContainer => 4,
		AnchorRole::ChannelHeader => 3,
		AnchorRole::ItemRoot => 2,
		AnchorRole::Link => 1,
	}
}

/// Best attached anchor inside `item`, or `None` when nothing usable exists.
///
/// Visible candidates beat invisible ones of any role: a lazily rendered
/// thumbnail with an empty box would hide the annotation.
pub fn select(doc: &dyn HostDocument, item: ElementId) -> Option<AnchorCandidate> {
	doc.anchor_candidates(item)
		.into_iter()
		.filter(|candidate| doc.is_attached(candidate.element))
		.max_by_key(|candidate| (doc.is_visible(candidate.element), rank(candidate.role)))
}

#[cfg(test)]
mod tests {
	use crosslink_primitives::Rect;

	use super::*;
	use crate::host::{ItemPattern, ItemSpec, MemoryDocument};

	#[test]
	fn test_thumbnail_beats_everything_for_videos() {
		let doc = MemoryDocument::new();
		let spec = ItemSpec::new(ItemPattern::GridVideo, "/watch?v=a").with_anchors([AnchorRole::ImageContainer, AnchorRole::Thumbnail]);
		let handles = doc.append_item(doc.root(), spec);

		let chosen = select(&doc, handles.item).unwrap();
		assert_eq!(chosen.role, AnchorRole::Thumbnail);
		assert_eq!(Some(chosen.element), handles.anchor(AnchorRole::Thumbnail));
	}

	#[test]
	fn test_channel_header_beats_item_root() {
		let doc = MemoryDocument::new();
		let spec = ItemSpec::new(ItemPattern::ChannelHeader, "/channel/UC1").with_anchors([AnchorRole::ChannelHeader]);
		let handles = doc.append_item(doc.root(), spec);

		assert_eq!(select(&doc, handles.item).map(|c| c.role), Some(AnchorRole::ChannelHeader));
	}

	#[test]
	fn test_falls_back_to_item_root_then_link() {
		let doc = MemoryDocument::new();
		let handles = doc.append_item(doc.root(), ItemSpec::new(ItemPattern::ChannelLink, "/@a").with_anchors([]));
		assert_eq!(select(&doc, handles.item).map(|c| c.role), Some(AnchorRole::ItemRoot));
	}

	#[test]
	fn test_invisible_thumbnail_loses_to_visible_root() {
		let doc = MemoryDocument::new();
		let handles = doc.append_item(doc.root(), ItemSpec::new(ItemPattern::GridVideo, "/watch?v=a"));
		let thumb = handles.anchor(AnchorRole::Thumbnail).unwrap();
		doc.set_rect(thumb, Rect::new(0.0, 0.0, 0.0, 0.0));

		assert_eq!(select(&doc, handles.item).map(|c| c.role), Some(AnchorRole::ItemRoot));
	}

	#[test]
	fn test_detached_item_has_no_anchor() {
		let doc = MemoryDocument::new();
		let handles = doc.append_item(doc.root(), ItemSpec::new(ItemPattern::GridVideo, "/watch?v=a"));
		doc.detach(handles.item);
		assert_eq!(select(&doc, handles.item), None);
	}
}
