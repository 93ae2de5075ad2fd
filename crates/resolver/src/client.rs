//! Batched resolver client.
//!
//! # Contract
//!
//! - Identifiers are deduplicated within a call.
//! - Anything present in a cache tier is answered locally and never sent.
//! - Remaining misses go out in batches of at most
//!   [`ResolverConfig::max_batch`], each bounded by [`ResolverConfig::timeout`].
//!   Timeouts and network errors are ordinary misses ([`Resolution::Unresolved`])
//!   and are not cached.
//! - [`TransportError::Unavailable`] latches the client: every later miss is
//!   answered `Unresolved` without a call until [`ResolverClient::reset_availability`].
//! - All cache writes are gated on the caller's [`EpochGuard`]. A batch that
//!   returns after a bump is dropped and the call fails with [`Superseded`].

use std::sync::Arc;
use std::time::Duration;

use crosslink_primitives::{CacheKey, Identifier, Target};
use crosslink_worker::{EpochGuard, Superseded};
use indexmap::IndexMap;
use indexmap::map::Entry;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::cache::{CacheLookup, TieredCache};
use crate::transport::{Transport, TransportError, WireId, WireResponse};

#[cfg(test)]
mod tests;

/// Default per-call deadline.
pub const RESOLVE_TIMEOUT: Duration = Duration::from_millis(1800);

/// Default number of identifiers per outbound batch.
pub const MAX_BATCH: usize = 50;

/// Resolver client tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
	pub timeout: Duration,
	pub max_batch: usize,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			timeout: RESOLVE_TIMEOUT,
			max_batch: MAX_BATCH,
		}
	}
}

/// Answer for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
	Found(Target),
	/// The resolver knows there is no target.
	Absent,
	/// No answer this time (timeout, network failure, transport gone).
	Unresolved,
}

impl Resolution {
	fn from_cached(value: Option<Target>) -> Self {
		value.map_or(Self::Absent, Self::Found)
	}

	pub fn target(&self) -> Option<&Target> {
		match self {
			Self::Found(target) => Some(target),
			_ => None,
		}
	}

	/// Returns true for answers that will not change within the epoch.
	pub fn is_settled(&self) -> bool {
		!matches!(self, Self::Unresolved)
	}
}

pub type Resolutions = FxHashMap<Identifier, Resolution>;

/// Identifier plus alternate cache keys known for the same item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
	pub id: Identifier,
	pub aliases: SmallVec<[CacheKey; 2]>,
}

impl From<Identifier> for LookupRequest {
	fn from(id: Identifier) -> Self {
		Self {
			id,
			aliases: SmallVec::new(),
		}
	}
}

impl LookupRequest {
	pub fn with_alias(mut self, key: CacheKey) -> Self {
		self.add_alias(key);
		self
	}

	fn add_alias(&mut self, key: CacheKey) {
		if !self.aliases.contains(&key) {
			self.aliases.push(key);
		}
	}

	/// Primary and URL keys of the identifier followed by its aliases.
	pub fn keys(&self) -> SmallVec<[CacheKey; 4]> {
		let mut keys: SmallVec<[CacheKey; 4]> = self.id.key_forms().into_iter().collect();
		for alias in &self.aliases {
			if !keys.contains(alias) {
				keys.push(alias.clone());
			}
		}
		keys
	}
}

/// Resolves identifiers through the tiered cache and the transport.
pub struct ResolverClient {
	transport: Arc<dyn Transport>,
	cache: TieredCache,
	config: ResolverConfig,
	unavailable: bool,
	network_calls: u64,
	keys_sent: u64,
}

impl std::fmt::Debug for ResolverClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResolverClient")
			.field("cache", &self.cache)
			.field("config", &self.config)
			.field("unavailable", &self.unavailable)
			.field("network_calls", &self.network_calls)
			.finish()
	}
}

impl ResolverClient {
	pub fn new(transport: Arc<dyn Transport>, cache: TieredCache) -> Self {
		Self::with_config(transport, cache, ResolverConfig::default())
	}

	pub fn with_config(transport: Arc<dyn Transport>, cache: TieredCache, config: ResolverConfig) -> Self {
		Self {
			transport,
			cache,
			config,
			unavailable: false,
			network_calls: 0,
			keys_sent: 0,
		}
	}

	/// Resolves bare identifiers.
	pub async fn resolve(&mut self, ids: &[Identifier], guard: &EpochGuard) -> Result<Resolutions, Superseded> {
		let requests: Vec<LookupRequest> = ids.iter().cloned().map(LookupRequest::from).collect();
		self.resolve_requests(&requests, guard).await
	}

	/// Resolves identifiers, writing results under their alternate keys too.
	pub async fn resolve_requests(&mut self, requests: &[LookupRequest], guard: &EpochGuard) -> Result<Resolutions, Superseded> {
		let mut unique: IndexMap<Identifier, LookupRequest> = IndexMap::with_capacity(requests.len());
		for request in requests {
			match unique.entry(request.id.clone()) {
				Entry::Occupied(mut entry) => {
					for alias in &request.aliases {
						entry.get_mut().add_alias(alias.clone());
					}
				}
				Entry::Vacant(entry) => {
					entry.insert(request.clone());
				}
			}
		}

		let mut resolutions = Resolutions::default();
		let mut misses = Vec::new();
		for (id, request) in unique {
			match self.cache.lookup(&request.keys(), guard).await? {
				CacheLookup::Hit { value, .. } => {
					resolutions.insert(id, Resolution::from_cached(value));
				}
				CacheLookup::Miss => misses.push(request),
			}
		}

		if misses.is_empty() {
			return Ok(resolutions);
		}

		if self.unavailable {
			tracing::trace!(misses = misses.len(), "resolver.unavailable.short_circuit");
			resolutions.extend(misses.into_iter().map(|request| (request.id, Resolution::Unresolved)));
			return Ok(resolutions);
		}

		let mut chunks = misses.chunks(self.config.max_batch.max(1));
		while let Some(chunk) = chunks.next() {
			let outcome = self.send_chunk(chunk).await;
			guard.check()?;

			match outcome {
				Ok(response) => self.apply_response(chunk, response, guard, &mut resolutions)?,
				Err(TransportError::Unavailable) => {
					self.unavailable = true;
					tracing::warn!("resolver transport unavailable, lookups disabled until reload");
					for request in chunk.iter().chain(chunks.by_ref().flatten()) {
						resolutions.insert(request.id.clone(), Resolution::Unresolved);
					}
					break;
				}
				Err(error) => {
					tracing::debug!(%error, batch = chunk.len(), "resolver.batch_failed");
					for request in chunk {
						resolutions.insert(request.id.clone(), Resolution::Unresolved);
					}
				}
			}
		}

		Ok(resolutions)
	}

	async fn send_chunk(&mut self, chunk: &[LookupRequest]) -> Result<WireResponse, TransportError> {
		let wire: Vec<WireId> = chunk.iter().map(|request| WireId::from(&request.id)).collect();
		self.network_calls += 1;
		self.keys_sent += wire.len() as u64;
		tracing::debug!(batch = wire.len(), network_calls = self.network_calls, "resolver.batch");

		match tokio::time::timeout(self.config.timeout, self.transport.send_batch(&wire)).await {
			Ok(result) => result,
			Err(_elapsed) => Err(TransportError::Timeout(self.config.timeout)),
		}
	}

	fn apply_response(
		&mut self,
		chunk: &[LookupRequest],
		mut response: WireResponse,
		guard: &EpochGuard,
		resolutions: &mut Resolutions,
	) -> Result<(), Superseded> {
		for request in chunk {
			let resolution = match response.remove(request.id.value()) {
				Some(Some(wire)) => {
					let target = Target::from(wire);
					self.cache.insert_resolved(&request.keys(), Some(target.clone()), guard)?;
					Resolution::Found(target)
				}
				Some(None) => {
					self.cache.insert_resolved(&request.keys(), None, guard)?;
					Resolution::Absent
				}
				None => Resolution::Unresolved,
			};
			resolutions.insert(request.id.clone(), resolution);
		}
		Ok(())
	}

	pub fn cache(&self) -> &TieredCache {
		&self.cache
	}

	pub fn cache_mut(&mut self) -> &mut TieredCache {
		&mut self.cache
	}

	pub fn config(&self) -> &ResolverConfig {
		&self.config
	}

	pub fn is_unavailable(&self) -> bool {
		self.unavailable
	}

	/// Clears the unavailable latch. Only a fresh page load should call this.
	pub fn reset_availability(&mut self) {
		self.unavailable = false;
	}

	pub fn network_calls(&self) -> u64 {
		self.network_calls
	}

	pub fn keys_sent(&self) -> u64 {
		self.keys_sent
	}
}
