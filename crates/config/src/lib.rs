//! Settings for the crosslink engine.
//!
//! Settings are read from a TOML file with kebab-case keys. Every key is
//! optional and falls back to its default:
//!
//! ```toml
//! enable-overlay = true
//! enable-channel-button = true
//! enable-redirect = false
//! search-fallback = false
//! target-platform = "odysee"
//! ```
//!
//! At runtime the settings are shared through a [`SettingsHandle`]. The engine
//! holds a [`SettingsReceiver`] and treats every change as an asynchronous
//! event that forces re-evaluation of the current annotations.

mod error;
mod settings;

pub use error::{ConfigError, Result};
pub use settings::{Settings, SettingsHandle, SettingsReceiver, TargetPlatform};
