use std::future::Future;

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::TaskClass;

/// Spawns an async task on the ambient runtime inside a `worker` span
/// carrying its class and label.
///
/// Tasks spawned from the session loop share its (possibly paused) clock.
///
/// # Panics
///
/// Panics when called outside a tokio runtime, like [`tokio::spawn`].
pub fn spawn<F>(class: TaskClass, label: &'static str, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	let span = tracing::trace_span!("worker", class = class.as_str(), task = label);
	tokio::spawn(fut.instrument(span))
}

/// Runs blocking work on the runtime's blocking pool.
pub fn spawn_blocking<F, R>(class: TaskClass, label: &'static str, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let span = tracing::trace_span!("worker", class = class.as_str(), task = label);
	tokio::task::spawn_blocking(move || span.in_scope(f))
}
