//! `crosslink` binary.
//!
//! Loads a page fixture into the in-memory host, answers resolver calls from
//! a response fixture, lets a session run for a while and prints the
//! annotations it left behind as JSON.

mod cli;
mod fixture;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use crosslink_config::{Settings, SettingsHandle};
use crosslink_engine::host::MemoryDocument;
use crosslink_engine::{EngineConfig, Session};
use crosslink_resolver::{JsonFileStore, MemoryStore, PersistentStore, ResolverClient, TieredCache};
use crosslink_worker::EpochClock;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let settings = match &cli.settings {
		Some(path) => Settings::load_or_default(path).with_context(|| format!("loading settings from {}", path.display()))?,
		None => Settings::default(),
	};
	let page = fixture::load_page(&cli.page)?;
	let transport = match &cli.responses {
		Some(path) => fixture::load_transport(path)?,
		None => crosslink_resolver::FixtureTransport::new(),
	};
	let store: Arc<dyn PersistentStore> = match &cli.store {
		Some(path) => Arc::new(JsonFileStore::open(path).with_context(|| format!("opening cache store {}", path.display()))?),
		None => Arc::new(MemoryStore::new()),
	};

	let doc = Arc::new(MemoryDocument::from_fixture(&page));
	let handle = SettingsHandle::new(settings);
	let resolver = ResolverClient::new(Arc::new(transport), TieredCache::new(store));
	let mut session = Session::new(doc.clone(), resolver, handle.subscribe(), EpochClock::new(), EngineConfig::default());

	let redirect = match cli.redirect.as_deref() {
		Some(url) => session.redirect_for(url).await,
		None => None,
	};

	let (events_tx, events_rx) = mpsc::unbounded_channel();
	doc.set_notifier(events_tx.clone());
	info!(settle_ms = cli.settle_ms, "starting session");
	// The run loop never ends on its own while the sender is alive.
	let _ = tokio::time::timeout(cli.settle(), session.run(events_rx)).await;
	doc.clear_notifier();
	drop(events_tx);

	let output = fixture::Output::collect(&session, &doc, redirect);
	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_env("CROSSLINK_LOG").unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("crosslink=trace,crosslink_engine=debug,crosslink_resolver=debug,info")
			} else {
				EnvFilter::new("warn")
			}
		})
	};

	if let Some(log_dir) = std::env::var("CROSSLINK_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("crosslink.{}.log", std::process::id()));
		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false).with_target(true);
			tracing_subscriber::registry().with(filter()).with(file_layer).init();
			tracing::info!(path = ?log_path, "tracing initialized");
			return;
		}
	}

	tracing_subscriber::fmt().with_env_filter(filter()).with_writer(std::io::stderr).init();
}
