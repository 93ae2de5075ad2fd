//! Engine tunables.

use std::time::Duration;

/// Timing and sizing knobs for the reconciler and session.
///
/// Defaults match interactive browsing: passes are spaced far enough apart to
/// absorb mutation bursts and close enough to keep up with infinite scroll.
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Items placed between voluntary yields.
	pub batch_size: usize,
	/// How long a record survives without being seen in a scan.
	pub unseen_grace: Duration,
	/// Unresolved lookups per item and epoch before the item is abandoned.
	pub max_resolve_attempts: u32,
	/// Anchor misses per item and epoch before the item is skipped silently.
	pub max_anchor_attempts: u32,
	/// Delay between a scroll/growth event and the pass it triggers.
	pub scan_debounce: Duration,
	/// Minimum spacing between reconcile passes.
	pub min_pass_interval: Duration,
	/// Delay before a rescan requested by a heal that lost its item.
	pub heal_debounce: Duration,
	/// Grace delay between pointer-leave and the unpin check.
	pub unpin_grace: Duration,
	/// Slack around a frozen box when re-checking pointer containment.
	pub pin_margin: f64,
	pub retry_base: Duration,
	pub retry_max: Duration,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			batch_size: 24,
			unseen_grace: Duration::from_secs(90),
			max_resolve_attempts: 3,
			max_anchor_attempts: 3,
			scan_debounce: Duration::from_millis(120),
			min_pass_interval: Duration::from_millis(250),
			heal_debounce: Duration::from_millis(60),
			unpin_grace: Duration::from_millis(250),
			pin_margin: 4.0,
			retry_base: Duration::from_millis(500),
			retry_max: Duration::from_secs(8),
		}
	}
}
