//! Editor state exposed to provider scripts.

use std::path::{Path, PathBuf};

use serde::Serialize;
use shellhost_engine::Value;

use crate::ProviderError;

/// An open document as seen by feature providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
	pub path: PathBuf,
	pub contents: String,
}

impl ScriptFile {
	pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			contents: contents.into(),
		}
	}
}

/// Placeholder for the editor window; scripts may read it but nothing on it
/// can change editor state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorWindow {
	pub title: Option<String>,
}

/// Snapshot of editor context bound to the `editor` variable while a
/// provider script runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOnlyEditorObject {
	pub file_path: PathBuf,
	pub contents: String,
	/// Directory containing the file.
	pub workspace_path: PathBuf,
	pub window: EditorWindow,
}

impl ReadOnlyEditorObject {
	pub fn for_file(file: &ScriptFile) -> Self {
		let workspace_path = file.path.parent().map(Path::to_path_buf).unwrap_or_default();
		Self {
			file_path: file.path.clone(),
			contents: file.contents.clone(),
			workspace_path,
			window: EditorWindow::default(),
		}
	}

	/// Editor commands cannot be registered from provider scripts.
	pub fn register_command(&self, name: &str) -> Result<(), ProviderError> {
		tracing::debug!(command = name, file = %self.file_path.display(), "provider script tried to register an editor command");
		Err(ProviderError::ReadOnly(name.to_string()))
	}

	pub fn to_value(&self) -> Result<Value, ProviderError> {
		serde_json::to_value(self).map_err(|error| ProviderError::Encode(error.to_string()))
	}
}
