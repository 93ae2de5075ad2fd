//! Single-flight gate for reconcile passes.

/// At most one pass runs; triggers arriving while it runs collapse into a
/// single rerun request, reported when it finishes.
#[derive(Debug, Default)]
pub struct PassGate {
	running: bool,
	rerun: bool,
	coalesced: u64,
}

impl PassGate {
	/// Enters the gate. Returns false, and remembers the request, when a
	/// pass is already running.
	pub fn try_begin(&mut self) -> bool {
		if self.running {
			self.request_rerun();
			return false;
		}
		self.running = true;
		self.rerun = false;
		true
	}

	/// Records a trigger that arrived mid-run.
	pub fn request_rerun(&mut self) {
		if self.rerun {
			self.coalesced += 1;
		}
		self.rerun = true;
	}

	/// Leaves the gate. Returns true when a rerun was requested while the
	/// pass ran; the caller schedules it.
	pub fn finish(&mut self) -> bool {
		self.running = false;
		std::mem::take(&mut self.rerun)
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	/// Triggers that were absorbed by an already-pending rerun.
	pub fn coalesced(&self) -> u64 {
		self.coalesced
	}
}
