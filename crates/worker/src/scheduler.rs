//! Named, replaceable, rate-limited deferred execution slots.
//!
//! # Design
//!
//! Every task lives in a slot keyed by name. Scheduling into a slot that
//! already has a pending timer cancels that timer and replaces it, so a burst
//! of triggers collapses into a single deferred run. A slot may carry a
//! minimum interval measured from its last completion:
//!
//! ```text
//! effective_delay = max(requested_delay, min_interval - since_last_completion)
//! ```
//!
//! A task that has started running is never aborted by a replacement; only the
//! pending timer is. If the timer fires while the previous run of the same slot
//! is still executing, the new run waits for it.
//!
//! Slots are independent of each other. There is no ordering between names.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::{TaskClass, spawn};

#[cfg(test)]
mod tests;

/// Poll interval while waiting for a busy slot to finish its current run.
const BUSY_RETRY: Duration = Duration::from_millis(10);

/// Deferred-task scheduler with replace-not-queue semantics per name.
///
/// Cheap to clone; clones share slots.
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
	inner: Arc<Mutex<SchedulerState>>,
}

#[derive(Debug, Default)]
struct SchedulerState {
	slots: FxHashMap<String, Slot>,
	/// Parent of every pending timer's token; replaced on [`TaskScheduler::clear`].
	root: CancellationToken,
	next_seq: u64,
	scheduled_total: u64,
	replaced_total: u64,
	executed_total: u64,
}

#[derive(Debug, Default)]
struct Slot {
	pending: Option<PendingRun>,
	running: bool,
	last_run_at: Option<Instant>,
	min_interval: Duration,
}

#[derive(Debug)]
struct PendingRun {
	seq: u64,
	cancel: CancellationToken,
	due_at: Instant,
}

impl Slot {
	fn effective_delay(&self, requested: Duration, now: Instant) -> Duration {
		let Some(last) = self.last_run_at else {
			return requested;
		};
		let floor = self.min_interval.saturating_sub(now.saturating_duration_since(last));
		requested.max(floor)
	}
}

enum RunStart {
	Run,
	Busy,
	Stale,
}

impl TaskScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the minimum spacing between completions of `name`.
	pub fn set_min_interval(&self, name: &str, interval: Duration) {
		let mut state = self.inner.lock();
		state.slots.entry(name.to_owned()).or_default().min_interval = interval;
	}

	/// Schedules `task` to run under `name` after `delay`.
	///
	/// Replaces any pending run of the same name. Returns the instant the task
	/// is due, after applying the slot's minimum interval.
	pub fn schedule<F>(&self, name: &str, delay: Duration, task: F) -> Instant
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let now = Instant::now();
		let mut state = self.inner.lock();
		state.next_seq += 1;
		state.scheduled_total += 1;
		let seq = state.next_seq;
		let cancel = state.root.child_token();

		let slot = state.slots.entry(name.to_owned()).or_default();
		let delay = slot.effective_delay(delay, now);
		let due_at = now + delay;
		let replaced = slot.pending.replace(PendingRun {
			seq,
			cancel: cancel.clone(),
			due_at,
		});
		if let Some(previous) = replaced {
			previous.cancel.cancel();
			state.replaced_total += 1;
			tracing::trace!(task = name, replaced_total = state.replaced_total, "scheduler.replace");
		}
		drop(state);

		tracing::trace!(task = name, delay_ms = delay.as_millis() as u64, "scheduler.schedule");

		let inner = Arc::clone(&self.inner);
		let name = name.to_owned();
		spawn(TaskClass::Interactive, "scheduler.slot", async move {
			tokio::select! {
				_ = cancel.cancelled() => return,
				_ = tokio::time::sleep_until(due_at) => {}
			}

			loop {
				match Self::begin_run(&inner, &name, seq) {
					RunStart::Run => break,
					RunStart::Stale => return,
					RunStart::Busy => {
						tokio::select! {
							_ = cancel.cancelled() => return,
							_ = tokio::time::sleep(BUSY_RETRY) => {}
						}
					}
				}
			}

			let _finish = RunGuard {
				inner: Arc::clone(&inner),
				name: name.clone(),
			};
			task.await;
		});

		due_at
	}

	/// Cancels the pending run of `name`, if any.
	pub fn cancel(&self, name: &str) -> bool {
		let mut state = self.inner.lock();
		let Some(pending) = state.slots.get_mut(name).and_then(|slot| slot.pending.take()) else {
			return false;
		};
		pending.cancel.cancel();
		tracing::trace!(task = name, "scheduler.cancel");
		true
	}

	/// Cancels every pending run. Running tasks finish normally.
	pub fn clear(&self) -> usize {
		let mut state = self.inner.lock();
		state.root.cancel();
		state.root = CancellationToken::new();
		let mut cleared = 0;
		for slot in state.slots.values_mut() {
			if slot.pending.take().is_some() {
				cleared += 1;
			}
		}
		if cleared > 0 {
			tracing::debug!(cleared, "scheduler.clear");
		}
		cleared
	}

	pub fn is_pending(&self, name: &str) -> bool {
		self.inner.lock().slots.get(name).is_some_and(|slot| slot.pending.is_some())
	}

	pub fn is_running(&self, name: &str) -> bool {
		self.inner.lock().slots.get(name).is_some_and(|slot| slot.running)
	}

	/// When the pending run of `name` is due.
	pub fn due_at(&self, name: &str) -> Option<Instant> {
		self.inner.lock().slots.get(name).and_then(|slot| slot.pending.as_ref().map(|p| p.due_at))
	}

	/// Records that the work behind `name` completed now.
	///
	/// For slots whose task only hands work off elsewhere, so the minimum
	/// interval counts from when that work actually finished.
	pub fn mark_completed(&self, name: &str) {
		let mut state = self.inner.lock();
		state.slots.entry(name.to_owned()).or_default().last_run_at = Some(Instant::now());
	}

	/// Forgets the last completion of `name`; the next run is not spaced.
	pub fn forget_completion(&self, name: &str) {
		if let Some(slot) = self.inner.lock().slots.get_mut(name) {
			slot.last_run_at = None;
		}
	}

	/// When `name` last completed.
	pub fn last_run_at(&self, name: &str) -> Option<Instant> {
		self.inner.lock().slots.get(name).and_then(|slot| slot.last_run_at)
	}

	pub fn pending_count(&self) -> usize {
		self.inner.lock().slots.values().filter(|slot| slot.pending.is_some()).count()
	}

	pub fn scheduled_total(&self) -> u64 {
		self.inner.lock().scheduled_total
	}

	pub fn replaced_total(&self) -> u64 {
		self.inner.lock().replaced_total
	}

	pub fn executed_total(&self) -> u64 {
		self.inner.lock().executed_total
	}

	fn begin_run(inner: &Mutex<SchedulerState>, name: &str, seq: u64) -> RunStart {
		let mut state = inner.lock();
		let Some(slot) = state.slots.get_mut(name) else {
			return RunStart::Stale;
		};
		if slot.pending.as_ref().is_none_or(|pending| pending.seq != seq) {
			return RunStart::Stale;
		}
		if slot.running {
			return RunStart::Busy;
		}
		slot.pending = None;
		slot.running = true;
		state.executed_total += 1;
		RunStart::Run
	}
}

/// Marks the slot idle and stamps its completion time, even if the task panics.
struct RunGuard {
	inner: Arc<Mutex<SchedulerState>>,
	name: String,
}

impl Drop for RunGuard {
	fn drop(&mut self) {
		let mut state = self.inner.lock();
		if let Some(slot) = state.slots.get_mut(&self.name) {
			slot.running = false;
			slot.last_run_at = Some(Instant::now());
		}
	}
}
