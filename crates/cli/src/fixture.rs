//! Fixture loading and the printed result.

use std::path::Path;

use anyhow::Context;
use crosslink_engine::host::{MemoryDocument, PageFixture};
use crosslink_engine::{AnnotationView, ElementId, PassReport, Session};
use crosslink_primitives::Epoch;
use crosslink_resolver::{FixtureTransport, WireResponse};
use serde::Serialize;

pub fn load_page(path: &Path) -> anyhow::Result<PageFixture> {
	let bytes = std::fs::read(path).with_context(|| format!("reading page fixture {}", path.display()))?;
	serde_json::from_slice(&bytes).with_context(|| format!("parsing page fixture {}", path.display()))
}

/// Builds a transport from a response fixture. `null` entries need no row:
/// the fixture transport answers unknown ids as known-absent.
pub fn load_transport(path: &Path) -> anyhow::Result<FixtureTransport> {
	let bytes = std::fs::read(path).with_context(|| format!("reading response fixture {}", path.display()))?;
	let responses: WireResponse = serde_json::from_slice(&bytes).with_context(|| format!("parsing response fixture {}", path.display()))?;
	Ok(FixtureTransport::from_entries(responses.into_iter().filter_map(|(id, target)| Some((id, target?)))))
}

#[derive(Debug, Serialize)]
pub struct Output {
	pub epoch: Epoch,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub redirect: Option<String>,
	pub report: Option<PassReport>,
	pub network_calls: u64,
	pub annotations: Vec<AnnotationRow>,
}

#[derive(Debug, Serialize)]
pub struct AnnotationRow {
	pub element: ElementId,
	#[serde(flatten)]
	pub view: AnnotationView,
}

impl Output {
	pub fn collect(session: &Session, doc: &MemoryDocument, redirect: Option<String>) -> Self {
		Self {
			epoch: session.clock().current(),
			redirect,
			report: session.last_report().cloned(),
			network_calls: session.resolver().network_calls(),
			annotations: doc.annotations().into_iter().map(|(element, view)| AnnotationRow { element, view }).collect(),
		}
	}
}
