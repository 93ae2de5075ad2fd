//! Mutation reconciler.
//!
//! One pass runs scan, resolve, place, dedup sweep and prune, in that order.
//! Right after the scan, records whose host item was recycled for another id
//! are retired.
//! Healing runs separately, on observer notifications, and only re-anchors
//! records it already knows about.
//!
//! # Epochs
//!
//! Every pass carries the [`EpochGuard`] captured when it started. The guard
//! is checked right before each host write and again after every suspension
//! point (resolver call, voluntary yield). A pass that finds itself superseded
//! stops where it is; [`Reconciler::teardown_epoch`] cleans up whatever the
//! old epoch left behind.

use std::sync::Arc;

use crosslink_config::Settings;
use crosslink_primitives::LogicalId;
use crosslink_resolver::{LookupRequest, ResolverClient};
use crosslink_worker::{EpochGuard, Superseded};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::host::{HostDocument, HostError};
use crate::placement;
use crate::registry::AnnotationRegistry;
use crate::scan::{self, AliasBook};

mod heal;
mod memory;
mod place;
mod report;


pub use memory::EpochMemory;
pub use report::{HealReport, PassReport};

/// Failure placing one item.
#[derive(Debug, Error)]
pub enum PlaceError {
	#[error(transparent)]
	Host(#[from] HostError),
	#[error(transparent)]
	Superseded(#[from] Superseded),
}

/// Owns the registry and per-epoch memory for one session.
pub struct Reconciler {
	doc: Arc<dyn HostDocument>,
	registry: AnnotationRegistry,
	aliases: AliasBook,
	memory: EpochMemory,
	config: EngineConfig,
}

impl Reconciler {
	pub fn new(doc: Arc<dyn HostDocument>, config: EngineConfig) -> Self {
		Self {
			doc,
			registry: AnnotationRegistry::default(),
			aliases: AliasBook::default(),
			memory: EpochMemory::default(),
			config,
		}
	}

	pub fn registry(&self) -> &AnnotationRegistry {
		&self.registry
	}

	pub(crate) fn registry_mut(&mut self) -> &mut AnnotationRegistry {
		&mut self.registry
	}

	pub fn memory(&self) -> &EpochMemory {
		&self.memory
	}

	pub fn aliases(&self) -> &AliasBook {
		&self.aliases
	}

	pub(crate) fn aliases_mut(&mut self) -> &mut AliasBook {
		&mut self.aliases
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn doc(&self) -> &dyn HostDocument {
		&*self.doc
	}

	/// Runs one full pass. A superseded pass returns the counters gathered so
	/// far with [`PassReport::superseded`] set.
	pub async fn run_pass(&mut self, resolver: &mut ResolverClient, settings: &Settings, guard: &EpochGuard) -> PassReport {
		let started = Instant::now();
		let mut report = PassReport::default();
		if let Err(superseded) = self.pass(resolver, settings, guard, &mut report).await {
			tracing::debug!(captured = %superseded.captured, current = %superseded.current, "reconcile.pass.superseded");
			report.superseded = true;
		}
		tracing::debug!(
			epoch = %guard.epoch(),
			scanned = report.scanned,
			resolved = report.resolved,
			created = report.created,
			moved = report.moved,
			reused = report.reused,
			pruned = report.pruned,
			skipped = report.skipped,
			failed = report.failed,
			superseded = report.superseded,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"reconcile.pass"
		);
		report
	}

	async fn pass(&mut self, resolver: &mut ResolverClient, settings: &Settings, guard: &EpochGuard, report: &mut PassReport) -> Result<(), Superseded> {
		guard.check()?;
		let now = Instant::now();

		let outcome = scan::collect(&*self.doc, settings, &mut self.aliases);
		report.scanned = outcome.items.len();
		report.skipped = outcome.skipped;
		report.shadowed = outcome.shadowed;

		for item in &outcome.items {
			if let Some(record) = self.registry.get_mut(&item.logical_id) {
				record.last_seen_at = now;
			}
		}
		report.retired += self.retire_recycled(&outcome, guard)?;

		let requests: Vec<LookupRequest> = outcome
			.items
			.iter()
			.filter(|item| !self.memory.is_settled(&item.logical_id))
			.map(|item| item.request.clone())
			.collect();
		let resolutions = resolver.resolve_requests(&requests, guard).await?;
		guard.check()?;

		for (index, batch) in outcome.items.chunks(self.config.batch_size.max(1)).enumerate() {
			if index > 0 {
				tokio::task::yield_now().await;
				guard.check()?;
			}
			for item in batch {
				let resolution = resolutions.get(item.id());
				match self.place_item(item, resolution, settings, guard, now, report) {
					Ok(()) => {}
					Err(PlaceError::Superseded(superseded)) => return Err(superseded),
					Err(PlaceError::Host(error)) => {
						tracing::warn!(id = %item.logical_id, %error, "annotation placement failed");
						report.failed += 1;
					}
				}
			}
		}

		report.deduped += self.dedup_sweep(guard)?;
		report.pruned += self.prune(now, guard)?;
		Ok(())
	}

	/// Removes records whose kind `settings` no longer allows.
	pub fn apply_settings(&mut self, settings: &Settings, guard: &EpochGuard) -> Result<usize, Superseded> {
		let disallowed: Vec<LogicalId> = self
			.registry
			.iter()
			.filter(|record| !settings.allows(record.view.kind))
			.map(|record| record.logical_id.clone())
			.collect();
		for id in &disallowed {
			guard.check()?;
			self.remove_record(id);
		}
		if !disallowed.is_empty() {
			tracing::debug!(removed = disallowed.len(), "reconcile.settings.retire");
		}
		Ok(disallowed.len())
	}

	/// Cleans up after an epoch bump: releases pins, removes every annotation,
	/// disconnects observers and forgets per-epoch memory. The alias book is
	/// kept; handle mappings do not depend on the page.
	pub fn teardown_epoch(&mut self) -> usize {
		let ids = self.registry.logical_ids();
		for id in &ids {
			self.remove_record(id);
		}
		self.registry.disconnect_all(&*self.doc);
		self.memory.reset();
		tracing::debug!(removed = ids.len(), "reconcile.teardown");
		ids.len()
	}

	/// Removes a record along with its element and observer reference.
	pub(crate) fn remove_record(&mut self, id: &LogicalId) -> bool {
		let Some(mut record) = self.registry.remove(id) else {
			return false;
		};
		placement::teardown(&*self.doc, &mut record);
		self.doc.remove_annotation(record.element);
		if let Some(observer) = record.observer {
			self.registry.unwatch(&*self.doc, observer);
		}
		true
	}
}
