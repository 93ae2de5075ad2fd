/// Execution classes used for spawned work and its logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Work whose latency is visible on the page (reconcile passes, unpin checks).
	Interactive,
	/// Best-effort work that may lag or be lost (persistent cache writes).
	Background,
	/// Blocking I/O executed on the blocking pool.
	IoBlocking,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
			Self::IoBlocking => "io_blocking",
		}
	}
}
