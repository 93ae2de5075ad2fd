use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crosslink_primitives::Epoch;
use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

/// Monotonic navigation clock shared between the host side and the engine.
///
/// Cloning yields another handle onto the same counter, so a navigation
/// observed on the host side is visible to work suspended in the engine.
#[derive(Debug, Clone)]
pub struct EpochClock {
	inner: Arc<ClockInner>,
}

#[derive(Debug)]
struct ClockInner {
	current: AtomicU64,
	bumped_at: Mutex<Instant>,
}

impl Default for EpochClock {
	fn default() -> Self {
		Self::new()
	}
}

impl EpochClock {
	/// Creates a clock at [`Epoch::INITIAL`].
	pub fn new() -> Self {
		Self {
			inner: Arc::new(ClockInner {
				current: AtomicU64::new(Epoch::INITIAL.get()),
				bumped_at: Mutex::new(Instant::now()),
			}),
		}
	}

	/// Returns the active epoch.
	pub fn current(&self) -> Epoch {
		Epoch::new(self.inner.current.load(Ordering::Acquire))
	}

	/// Advances to the next epoch and records when it happened.
	pub fn bump(&self) -> Epoch {
		let next = Epoch::new(self.inner.current.fetch_add(1, Ordering::AcqRel).wrapping_add(1));
		*self.inner.bumped_at.lock() = Instant::now();
		tracing::debug!(epoch = next.get(), "epoch.bump");
		next
	}

	/// When the active epoch began.
	pub fn bumped_at(&self) -> Instant {
		*self.inner.bumped_at.lock()
	}

	/// Time spent in the active epoch.
	pub fn age(&self) -> Duration {
		self.bumped_at().elapsed()
	}

	/// Captures the active epoch for later re-validation.
	pub fn guard(&self) -> EpochGuard {
		EpochGuard {
			captured: self.current(),
			clock: self.clone(),
		}
	}
}

/// Epoch captured at the start of a unit of asynchronous work.
///
/// Check it immediately before every observable side effect; once the clock
/// has moved on the work must exit without writing.
#[derive(Debug, Clone)]
pub struct EpochGuard {
	captured: Epoch,
	clock: EpochClock,
}

impl EpochGuard {
	pub fn epoch(&self) -> Epoch {
		self.captured
	}

	pub fn is_current(&self) -> bool {
		self.clock.current() == self.captured
	}

	/// Returns [`Superseded`] when a navigation happened since capture.
	pub fn check(&self) -> Result<(), Superseded> {
		let current = self.clock.current();
		if current == self.captured {
			Ok(())
		} else {
			Err(Superseded {
				captured: self.captured,
				current,
			})
		}
	}
}

/// Work captured under an older epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("work from {captured} superseded by {current}")]
pub struct Superseded {
	pub captured: Epoch,
	pub current: Epoch,
}
