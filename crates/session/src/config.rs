//! Session configuration loaded from TOML.
//!
//! ```toml
//! read_line = "native"
//!
//! [background]
//! thread_name = "shellhost-background"
//! modules = ["/opt/editor/EditorServices.psd1"]
//!
//! [background.variables]
//! hostName = "editor"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use shellhost_engine::{InitialSessionState, Value};
use shellhost_worker::SchedulerOptions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which read-line strategy the session uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadLineMode {
	/// Raw console key reads.
	Legacy,
	/// The engine's own line editor.
	#[default]
	Native,
}

/// Settings for the dedicated background runspace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundConfig {
	pub thread_name: String,
	pub modules: Vec<PathBuf>,
	pub variables: BTreeMap<String, Value>,
}

impl Default for BackgroundConfig {
	fn default() -> Self {
		let SchedulerOptions { thread_name, initial_state } = SchedulerOptions::default();
		Self {
			thread_name,
			modules: initial_state.modules,
			variables: initial_state.variables,
		}
	}
}

impl BackgroundConfig {
	pub fn scheduler_options(&self) -> SchedulerOptions {
		SchedulerOptions {
			thread_name: self.thread_name.clone(),
			initial_state: InitialSessionState {
				modules: self.modules.clone(),
				variables: self.variables.clone(),
			},
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
	pub read_line: ReadLineMode,
	pub background: BackgroundConfig,
}

impl SessionConfig {
	pub fn parse(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	/// Load configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
			path: path.to_path_buf(),
			error: e,
		})?;
		let config = Self::parse(&content)?;
		tracing::debug!(path = %path.display(), read_line = ?config.read_line, "loaded session config");
		Ok(config)
	}
}
