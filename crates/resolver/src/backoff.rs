//! Bounded exponential backoff for resolution retries.

use std::time::Duration;

/// Default first retry delay.
pub const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Default cap on the retry delay.
pub const BACKOFF_MAX: Duration = Duration::from_secs(8);

/// Exponential backoff that doubles per attempt up to a ceiling.
///
/// Callers [`reset`](Backoff::reset) it as soon as any progress is observed.
#[derive(Debug, Clone)]
pub struct Backoff {
	base: Duration,
	max: Duration,
	attempts: u32,
}

impl Default for Backoff {
	fn default() -> Self {
		Self::new(BACKOFF_BASE, BACKOFF_MAX)
	}
}

impl Backoff {
	pub fn new(base: Duration, max: Duration) -> Self {
		Self {
			base,
			max: max.max(base),
			attempts: 0,
		}
	}

	/// Returns the delay for the next attempt and advances.
	pub fn next_delay(&mut self) -> Duration {
		let factor = 1u32.checked_shl(self.attempts.min(16)).unwrap_or(u32::MAX);
		self.attempts = self.attempts.saturating_add(1);
		self.base.saturating_mul(factor).min(self.max)
	}

	pub fn reset(&mut self) {
		self.attempts = 0;
	}

	pub fn attempts(&self) -> u32 {
		self.attempts
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_doubles_until_cap() {
		let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500));
		let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
		assert_eq!(delays, vec![100, 200, 400, 500, 500]);
		assert_eq!(backoff.attempts(), 5);
	}

	#[test]
	fn test_reset_restarts_from_base() {
		let mut backoff = Backoff::default();
		backoff.next_delay();
		backoff.next_delay();
		backoff.reset();
		assert_eq!(backoff.next_delay(), BACKOFF_BASE);
	}

	#[test]
	fn test_many_attempts_do_not_overflow() {
		let mut backoff = Backoff::default();
		for _ in 0..100 {
			assert!(backoff.next_delay() <= BACKOFF_MAX);
		}
	}
}
