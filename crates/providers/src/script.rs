//! Feature providers implemented as scripts on the background runspace.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use shellhost_engine::{CancellationToken, Command, ErrorSink, ExecutionOptions, PipelineMode, ScriptError, Value};
use shellhost_worker::BackgroundTaskScheduler;

use crate::ProviderError;
use crate::editor::{ReadOnlyEditorObject, ScriptFile};
use crate::registry::FeatureProvider;

/// Variable the editor object is bound to while a provider script runs.
pub const EDITOR_VARIABLE: &str = "editor";

/// Runs a provider script and decodes each output value as `T`.
///
/// Faults never reach the caller: runtime errors, engine errors and values
/// that do not decode are logged and produce an empty result.
pub struct ScriptFeatureProvider<T> {
	id: String,
	script_name: String,
	script: String,
	scheduler: BackgroundTaskScheduler,
	_output: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> ScriptFeatureProvider<T> {
	/// `scheduler` is used through a non-owning client.
	pub fn new(id: impl Into<String>, script_name: impl Into<String>, script: impl Into<String>, scheduler: &BackgroundTaskScheduler) -> Self {
		Self {
			id: id.into(),
			script_name: script_name.into(),
			script: script.into(),
			scheduler: scheduler.client(),
			_output: PhantomData,
		}
	}

	pub fn script_name(&self) -> &str {
		&self.script_name
	}

	/// Runs the script against `file`.
	pub async fn invoke(&self, file: &ScriptFile) -> Vec<T> {
		match self.try_invoke(file).await {
			Ok(items) => items,
			Err(error) => {
				self.log_fault(&error);
				Vec::new()
			}
		}
	}

	async fn try_invoke(&self, file: &ScriptFile) -> Result<Vec<T>, ProviderError> {
		let editor = ReadOnlyEditorObject::for_file(file).to_value()?;
		let script = self.script.clone();
		let values = self
			.scheduler
			.run(move |runspace| -> Result<Vec<Value>, ProviderError> {
				runspace.set_variable(EDITOR_VARIABLE, editor)?;
				let mut pipeline = runspace.create_pipeline(PipelineMode::Current)?;
				let values = pipeline.invoke(&Command::Script(script), &ExecutionOptions::silent(), &ErrorSink::new(), &CancellationToken::new())?;
				Ok(values)
			})
			.await??;
		values.into_iter().map(decode).collect()
	}

	fn log_fault(&self, error: &ProviderError) {
		match error {
			ProviderError::Script(fault) => {
				let script = fault.script_name.as_deref().unwrap_or(&self.script_name);
				tracing::error!(
					provider = %self.id,
					script,
					line = fault.line,
					kind = ?fault.kind,
					error = %fault.message,
					"feature provider script failed"
				);
			}
			other => {
				tracing::error!(provider = %self.id, script = %self.script_name, error = %other, "feature provider failed");
			}
		}
	}
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
	serde_json::from_value(value).map_err(|error| ProviderError::Script(ScriptError::invalid_cast(error.to_string())))
}

impl<T> FeatureProvider for ScriptFeatureProvider<T> {
	fn provider_id(&self) -> &str {
		&self.id
	}
}
