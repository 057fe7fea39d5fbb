use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

/// Configuration applied once when an interpreter instance is opened.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitialSessionState {
	/// Modules imported into the instance, in order.
	pub modules: Vec<PathBuf>,
	/// Variables defined before the first command runs, ordered by name.
	pub variables: BTreeMap<String, Value>,
}

impl InitialSessionState {
	pub fn with_module(mut self, path: impl Into<PathBuf>) -> Self {
		self.modules.push(path.into());
		self
	}

	pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
		self.variables.insert(name.into(), value);
		self
	}
}
