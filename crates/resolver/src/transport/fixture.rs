use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{Transport, TransportError, WireId, WireResponse, WireTarget};

type SendHook = Arc<dyn Fn(&[WireId]) + Send + Sync>;

/// Transport answering from an in-memory table.
///
/// Every requested id is answered: known ids with their target, unknown ids
/// as known-absent. Used to replay captured resolver responses and in tests.
#[derive(Clone, Default)]
pub struct FixtureTransport {
	inner: Arc<FixtureInner>,
}

#[derive(Default)]
struct FixtureInner {
	table: Mutex<FxHashMap<String, WireTarget>>,
	calls: Mutex<Vec<Vec<WireId>>>,
	failure: Mutex<Option<TransportError>>,
	latency: Mutex<Duration>,
	on_send: Mutex<Option<SendHook>>,
}

impl std::fmt::Debug for FixtureTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FixtureTransport")
			.field("entries", &self.inner.table.lock().len())
			.field("calls", &self.inner.calls.lock().len())
			.finish()
	}
}

impl FixtureTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a transport from `id → target` pairs.
	pub fn from_entries(entries: impl IntoIterator<Item = (String, WireTarget)>) -> Self {
		let transport = Self::new();
		transport.inner.table.lock().extend(entries);
		transport
	}

	pub fn insert(&self, id: impl Into<String>, target: WireTarget) {
		self.inner.table.lock().insert(id.into(), target);
	}

	/// Makes every following call fail with `error`; `None` restores answers.
	pub fn set_failure(&self, error: Option<TransportError>) {
		*self.inner.failure.lock() = error;
	}

	/// Delays every answer by `latency`.
	pub fn set_latency(&self, latency: Duration) {
		*self.inner.latency.lock() = latency;
	}

	/// Runs `hook` when a batch arrives, before the answer is produced.
	pub fn on_send(&self, hook: impl Fn(&[WireId]) + Send + Sync + 'static) {
		*self.inner.on_send.lock() = Some(Arc::new(hook));
	}

	/// Number of batch calls received.
	pub fn call_count(&self) -> usize {
		self.inner.calls.lock().len()
	}

	/// Every batch received so far, in order.
	pub fn calls(&self) -> Vec<Vec<WireId>> {
		self.inner.calls.lock().clone()
	}
}

#[async_trait]
impl Transport for FixtureTransport {
	async fn send_batch(&self, ids: &[WireId]) -> Result<WireResponse, TransportError> {
		self.inner.calls.lock().push(ids.to_vec());
		let hook = self.inner.on_send.lock().clone();
		if let Some(hook) = hook {
			hook(ids);
		}

		let latency = *self.inner.latency.lock();
		if !latency.is_zero() {
			tokio::time::sleep(latency).await;
		}

		if let Some(error) = self.inner.failure.lock().clone() {
			return Err(error);
		}

		let table = self.inner.table.lock();
		Ok(ids.iter().map(|wire| (wire.id.clone(), table.get(&wire.id).cloned())).collect())
	}
}
