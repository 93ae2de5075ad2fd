use std::path::Path;

use crosslink_primitives::{IdKind, Target};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{ConfigError, Result};


/// Destination platform that annotations and redirects link to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetPlatform {
	#[default]
	Odysee,
	Madiator,
	/// Desktop application via the `lbry://` scheme.
	App,
}

impl TargetPlatform {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Odysee => "odysee",
			Self::Madiator => "madiator",
			Self::App => "app",
		}
	}

	/// Builds the outbound link for `target` on this platform.
	pub fn link(self, target: &Target) -> String {
		let mut link = match self {
			Self::Odysee => format!("https://odysee.com{}", target.pathname),
			Self::Madiator => format!("https://madiator.com{}", target.pathname),
			Self::App => format!("lbry://{}", target.pathname.trim_start_matches('/').replace(':', "#")),
		};
		if let Some(seconds) = target.timestamp {
			link.push_str(&format!("?t={seconds}"));
		}
		link
	}
}

/// Recognized engine options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
	/// Show overlays on video thumbnails.
	pub enable_overlay: bool,
	/// Show a button next to channel headers.
	pub enable_channel_button: bool,
	/// Redirect watch/channel pages when a target exists.
	pub enable_redirect: bool,
	/// Link to a platform search by name when a channel fails to resolve.
	pub search_fallback: bool,
	pub target_platform: TargetPlatform,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			enable_overlay: true,
			enable_channel_button: true,
			enable_redirect: false,
			search_fallback: false,
			target_platform: TargetPlatform::default(),
		}
	}
}

impl Settings {
	/// Parses settings from TOML source.
	pub fn from_toml_str(source: &str) -> Result<Self> {
		Ok(toml::from_str(source)?)
	}

	/// Loads settings from a file.
	pub fn load(path: &Path) -> Result<Self> {
		let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&source)
	}

	/// Loads settings from a file, falling back to defaults when it does not exist.
	pub fn load_or_default(path: &Path) -> Result<Self> {
		if !path.exists() {
			tracing::debug!(path = %path.display(), "settings file missing, using defaults");
			return Ok(Self::default());
		}
		Self::load(path)
	}

	/// Returns true when annotations for items of `kind` are enabled.
	pub fn allows(&self, kind: IdKind) -> bool {
		match kind {
			IdKind::Video => self.enable_overlay,
			IdKind::Channel => self.enable_channel_button,
		}
	}

	/// Returns true when any annotation kind is enabled.
	pub fn any_annotation_enabled(&self) -> bool {
		self.enable_overlay || self.enable_channel_button
	}
}

/// Receiving side of live settings.
pub type SettingsReceiver = watch::Receiver<Settings>;

/// Owner of the live settings value.
///
/// Updates are delivered to every [`SettingsReceiver`]; unchanged values are
/// not broadcast.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
	tx: watch::Sender<Settings>,
}

impl Default for SettingsHandle {
	fn default() -> Self {
		Self::new(Settings::default())
	}
}

impl SettingsHandle {
	pub fn new(initial: Settings) -> Self {
		let (tx, _rx) = watch::channel(initial);
		Self { tx }
	}

	pub fn subscribe(&self) -> SettingsReceiver {
		self.tx.subscribe()
	}

	/// Returns a copy of the current settings.
	pub fn current(&self) -> Settings {
		self.tx.borrow().clone()
	}

	/// Replaces the settings. Returns true when the value changed.
	pub fn replace(&self, settings: Settings) -> bool {
		self.tx.send_if_modified(|current| {
			if *current == settings {
				return false;
			}
			*current = settings;
			true
		})
	}

	/// Applies `f` to the settings. Returns true when the value changed.
	pub fn update(&self, f: impl FnOnce(&mut Settings)) -> bool {
		self.tx.send_if_modified(|current| {
			let before = current.clone();
			f(current);
			*current != before
		})
	}
}
