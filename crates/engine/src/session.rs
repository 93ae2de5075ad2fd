//! Session driver.
//!
//! A [`Session`] is the whole engine context for one page: epoch clock,
//! resolver and caches, scheduler, registry and settings. Nothing lives in
//! globals, so tests and the CLI can run several sessions side by side.
//!
//! # Threading
//!
//! The session is driven by one task through `&mut self`. Host events and
//! internal triggers are handled strictly one after another. Deferred work
//! (debounced reconciles, retries, unpin checks) runs on the
//! [`TaskScheduler`], but a scheduled task never touches session state: it
//! only sends a [`Trigger`] back through a channel that the driver drains.
//! The epoch clock is the one piece of state shared with other tasks.

use std::sync::Arc;

use crosslink_config::{Settings, SettingsReceiver};
use crosslink_primitives::{Epoch, LogicalId, Point, Rect};
use crosslink_resolver::{Backoff, ResolverClient};
use crosslink_worker::{EpochClock, TaskScheduler};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::events::{HostEvent, HoverDisposition, HoverReply};
use crate::gate::PassGate;
use crate::host::{ElementId, HostDocument, ObserverId};
use crate::placement::{self, Settle};
use crate::reconciler::{PassReport, Reconciler};

mod redirect;


const RECONCILE_TASK: &str = "reconcile";
const RETRY_TASK: &str = "retry";

fn unpin_task(id: &LogicalId) -> String {
	format!("unpin:{id}")
}

/// Message from a scheduled task back to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
	Reconcile,
	Retry,
	Unpin(LogicalId),
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
	pub passes: u64,
	pub superseded: u64,
	/// Triggers absorbed into an already-requested rerun.
	pub coalesced: u64,
	pub epochs: u64,
	pub heals: u64,
}

pub struct Session {
	doc: Arc<dyn HostDocument>,
	clock: EpochClock,
	seen_epoch: Epoch,
	resolver: ResolverClient,
	reconciler: Reconciler,
	scheduler: TaskScheduler,
	settings: SettingsReceiver,
	gate: PassGate,
	backoff: Backoff,
	config: EngineConfig,
	pointer: Option<Point>,
	triggers_tx: mpsc::UnboundedSender<Trigger>,
	triggers_rx: mpsc::UnboundedReceiver<Trigger>,
	hover_replies: Option<mpsc::UnboundedSender<HoverReply>>,
	stats: SessionStats,
	last_report: Option<PassReport>,
}

impl Session {
	pub fn new(doc: Arc<dyn HostDocument>, resolver: ResolverClient, settings: SettingsReceiver, clock: EpochClock, config: EngineConfig) -> Self {
		let scheduler = TaskScheduler::new();
		scheduler.set_min_interval(RECONCILE_TASK, config.min_pass_interval);
		let (triggers_tx, triggers_rx) = mpsc::unbounded_channel();
		Self {
			reconciler: Reconciler::new(Arc::clone(&doc), config.clone()),
			doc,
			seen_epoch: clock.current(),
			clock,
			resolver,
			scheduler,
			settings,
			gate: PassGate::default(),
			backoff: Backoff::new(config.retry_base, config.retry_max),
			config,
			pointer: None,
			triggers_tx,
			triggers_rx,
			hover_replies: None,
			stats: SessionStats::default(),
			last_report: None,
		}
	}

	pub fn clock(&self) -> &EpochClock {
		&self.clock
	}

	pub fn reconciler(&self) -> &Reconciler {
		&self.reconciler
	}

	pub fn resolver(&self) -> &ResolverClient {
		&self.resolver
	}

	pub fn scheduler(&self) -> &TaskScheduler {
		&self.scheduler
	}

	pub fn stats(&self) -> SessionStats {
		SessionStats {
			coalesced: self.gate.coalesced(),
			..self.stats
		}
	}

	pub fn last_report(&self) -> Option<&PassReport> {
		self.last_report.as_ref()
	}

	/// Routes the disposition of every hover event handled by [`Session::run`]
	/// to `replies`. Hosts calling [`Session::handle_event`] directly get it
	/// as the return value instead.
	pub fn set_hover_replies(&mut self, replies: mpsc::UnboundedSender<HoverReply>) {
		self.hover_replies = Some(replies);
	}

	fn current_settings(&self) -> Settings {
		self.settings.borrow().clone()
	}

	/// Drives the session until `events` closes. Hover dispositions are sent
	/// to the sink given to [`Session::set_hover_replies`], if any.
	pub async fn run(&mut self, mut events: mpsc::UnboundedReceiver<HostEvent>) {
		self.request_reconcile(Duration::ZERO);
		let mut settings_open = true;
		loop {
			tokio::select! {
				event = events.recv() => match event {
					Some(event) => self.dispatch(event),
					None => break,
				},
				Some(trigger) = self.triggers_rx.recv() => self.handle_trigger(trigger).await,
				changed = self.settings.changed(), if settings_open => match changed {
					Ok(()) => self.on_settings_changed(),
					Err(_) => settings_open = false,
				},
			}
		}
		let cancelled = self.scheduler.clear();
		tracing::debug!(cancelled, passes = self.stats.passes, "session.stop");
	}

	fn dispatch(&mut self, event: HostEvent) {
		let hovered = match &event {
			HostEvent::HoverItem { item, .. } => Some(*item),
			_ => None,
		};
		let disposition = self.handle_event(event);
		if let Some(item) = hovered
			&& let Some(replies) = &self.hover_replies
			&& replies.send(HoverReply { item, disposition }).is_err()
		{
			tracing::debug!("session.hover_replies.closed");
			self.hover_replies = None;
		}
	}

	/// Handles every trigger already queued. Returns how many were handled.
	pub async fn pump(&mut self) -> usize {
		let mut handled = 0;
		while let Ok(trigger) = self.triggers_rx.try_recv() {
			self.handle_trigger(trigger).await;
			handled += 1;
		}
		handled
	}

	/// Applies one host event. Hover events report whether the host may run
	/// its own hover behavior; everything else returns [`HoverDisposition::Pass`].
	pub fn handle_event(&mut self, event: HostEvent) -> HoverDisposition {
		self.sync_epoch();
		match event {
			HostEvent::PageLoaded => {
				self.resolver.reset_availability();
				self.navigate();
			}
			HostEvent::Navigated { url } => {
				tracing::debug!(url = url.as_deref().unwrap_or(""), "session.navigate");
				self.navigate();
			}
			HostEvent::Mutated { observer } => self.on_mutation(observer),
			HostEvent::Scrolled | HostEvent::Grew => self.request_reconcile(self.config.scan_debounce),
			HostEvent::PointerEnter { annotation } => self.on_pointer_enter(annotation),
			HostEvent::PointerLeave { annotation, at } => {
				self.pointer = Some(at);
				self.on_pointer_leave(annotation);
			}
			HostEvent::PointerMove { at } => self.pointer = Some(at),
			HostEvent::HoverItem { item, region } => return self.on_hover_item(item, region),
			HostEvent::HoverEnd { item } => self.on_hover_end(item),
			HostEvent::SettingsChanged => self.on_settings_changed(),
		}
		HoverDisposition::Pass
	}

	async fn handle_trigger(&mut self, trigger: Trigger) {
		match trigger {
			Trigger::Reconcile | Trigger::Retry => {
				self.reconcile_now().await;
			}
			Trigger::Unpin(id) => self.settle_unpin(&id),
		}
	}

	/// Schedules a pass after `delay`, replacing any pending one.
	pub fn request_reconcile(&self, delay: Duration) {
		self.schedule_trigger(RECONCILE_TASK, delay, Trigger::Reconcile);
	}

	fn schedule_trigger(&self, name: &str, delay: Duration, trigger: Trigger) {
		let sender = self.triggers_tx.clone();
		self.scheduler.schedule(name, delay, async move {
			// The receiver lives as long as the session.
			let _ = sender.send(trigger);
		});
	}

	/// Runs a pass now and returns its report, or `None` when a pass was
	/// already in progress.
	///
	/// The minimum spacing between passes counts from here, when the pass
	/// completes. Triggers that arrived while it ran collapse into one rerun,
	/// scheduled through the spaced `reconcile` slot.
	pub async fn reconcile_now(&mut self) -> Option<PassReport> {
		self.sync_epoch();
		if !self.gate.try_begin() {
			return None;
		}
		let settings = self.current_settings();
		let guard = self.clock.guard();
		let report = self.reconciler.run_pass(&mut self.resolver, &settings, &guard).await;
		self.stats.passes += 1;
		self.scheduler.mark_completed(RECONCILE_TASK);
		if report.superseded {
			self.stats.superseded += 1;
			self.sync_epoch();
		} else {
			self.schedule_retry(&report);
		}

		while let Ok(trigger) = self.triggers_rx.try_recv() {
			match trigger {
				Trigger::Reconcile | Trigger::Retry => self.gate.request_rerun(),
				Trigger::Unpin(id) => self.settle_unpin(&id),
			}
		}
		if self.gate.finish() {
			self.request_reconcile(Duration::ZERO);
		}
		self.last_report = Some(report.clone());
		Some(report)
	}

	fn schedule_retry(&mut self, report: &PassReport) {
		if report.unresolved == 0 {
			self.backoff.reset();
			self.scheduler.cancel(RETRY_TASK);
			return;
		}
		if report.made_progress() {
			self.backoff.reset();
		}
		let delay = self.backoff.next_delay();
		tracing::debug!(pending = report.unresolved, delay_ms = delay.as_millis() as u64, attempt = self.backoff.attempts(), "session.retry");
		self.schedule_trigger(RETRY_TASK, delay, Trigger::Retry);
	}

	/// Bumps the epoch and starts over in the new context.
	pub fn navigate(&mut self) -> Epoch {
		let epoch = self.clock.bump();
		self.sync_epoch();
		epoch
	}

	/// Tears down everything tied to an epoch the clock has moved past. The
	/// cleanup finishes before the first pass of the new epoch is scheduled.
	fn sync_epoch(&mut self) -> bool {
		let current = self.clock.current();
		if current == self.seen_epoch {
			return false;
		}
		let cancelled = self.scheduler.clear();
		// A new page is not held back by the previous page's last pass.
		self.scheduler.forget_completion(RECONCILE_TASK);
		let removed = self.reconciler.teardown_epoch();
		self.resolver.cache_mut().clear_volatile();
		self.backoff.reset();
		self.pointer = None;
		tracing::debug!(
			from = %self.seen_epoch,
			to = %current,
			cancelled,
			removed,
			age_ms = self.clock.age().as_millis() as u64,
			"session.epoch"
		);
		self.seen_epoch = current;
		self.stats.epochs += 1;
		self.request_reconcile(Duration::ZERO);
		true
	}

	fn on_mutation(&mut self, observer: ObserverId) {
		let guard = self.clock.guard();
		match self.reconciler.heal(observer, &guard) {
			Ok(report) => {
				self.stats.heals += 1;
				let delay = if report.needs_rescan() { self.config.heal_debounce } else { self.config.scan_debounce };
				self.request_reconcile(delay);
			}
			Err(_) => {
				self.sync_epoch();
			}
		}
	}

	fn on_settings_changed(&mut self) {
		let settings = self.settings.borrow_and_update().clone();
		let guard = self.clock.guard();
		if self.reconciler.apply_settings(&settings, &guard).is_err() {
			self.sync_epoch();
		}
		if !settings.any_annotation_enabled() {
			tracing::debug!("session.settings.all_disabled");
		}
		self.request_reconcile(Duration::ZERO);
	}

	fn on_pointer_enter(&mut self, annotation: ElementId) {
		let Some(id) = self.reconciler.registry().by_element(annotation).cloned() else {
			return;
		};
		self.scheduler.cancel(&unpin_task(&id));
		let doc = Arc::clone(&self.doc);
		if let Some(record) = self.reconciler.registry_mut().get_mut(&id)
			&& let Err(error) = placement::pin(&*doc, record)
		{
			tracing::warn!(id = %id, %error, "failed to pin annotation");
		}
	}

	fn on_pointer_leave(&mut self, annotation: ElementId) {
		let Some(id) = self.reconciler.registry().by_element(annotation).cloned() else {
			return;
		};
		let grace = self.config.unpin_grace;
		let armed = self
			.reconciler
			.registry_mut()
			.get_mut(&id)
			.and_then(|record| placement::arm_leave(record, Instant::now(), grace));
		if armed.is_some() {
			self.schedule_trigger(&unpin_task(&id), grace, Trigger::Unpin(id));
		}
	}

	fn settle_unpin(&mut self, id: &LogicalId) {
		let doc = Arc::clone(&self.doc);
		let (pointer, margin) = (self.pointer, self.config.pin_margin);
		let Some(record) = self.reconciler.registry_mut().get_mut(id) else {
			return;
		};
		let now = Instant::now();
		match placement::settle(&*doc, record, pointer, now, margin) {
			Ok(Settle::Pending(deadline)) => {
				self.schedule_trigger(&unpin_task(id), deadline.saturating_duration_since(now), Trigger::Unpin(id.clone()));
			}
			Ok(Settle::Orphaned) => {
				let guard = self.clock.guard();
				match self.reconciler.heal_one(id, &guard) {
					Ok(report) if report.needs_rescan() => self.request_reconcile(self.config.heal_debounce),
					Ok(_) => {}
					Err(_) => {
						self.sync_epoch();
					}
				}
			}
			Ok(Settle::Idle | Settle::Stayed | Settle::Unpinned) => {}
			Err(error) => tracing::warn!(id = %id, %error, "failed to unpin annotation"),
		}
	}

	fn on_hover_item(&mut self, item: ElementId, region: Rect) -> HoverDisposition {
		let Some(id) = self.reconciler.registry().by_item(item).cloned() else {
			return HoverDisposition::Pass;
		};
		let doc = Arc::clone(&self.doc);
		let Some(record) = self.reconciler.registry_mut().get_mut(&id) else {
			return HoverDisposition::Pass;
		};
		let disposition = placement::hover_disposition(record);
		if disposition == HoverDisposition::Pass
			&& placement::geometry(&*doc, record).is_some_and(|rect| rect.intersects(&region))
			&& let Err(error) = placement::float(&*doc, record)
		{
			tracing::debug!(id = %id, %error, "placement.float_failed");
		}
		disposition
	}

	fn on_hover_end(&mut self, item: ElementId) {
		let Some(id) = self.reconciler.registry().by_item(item).cloned() else {
			return;
		};
		let doc = Arc::clone(&self.doc);
		if let Some(record) = self.reconciler.registry_mut().get_mut(&id)
			&& let Err(error) = placement::unfloat(&*doc, record)
		{
			tracing::debug!(id = %id, %error, "placement.unfloat_failed");
		}
	}
}
