//! Error types reported by engine collaborators.

use thiserror::Error;

/// Failures of the engine plumbing itself (instances, pipelines, events).
#[derive(Debug, Clone, Error)]
pub enum EngineError {
	/// The interpreter instance could not be opened or configured.
	#[error("failed to open runspace: {0}")]
	Open(String),
	/// A pipeline could not be created on the instance.
	#[error("failed to create pipeline: {0}")]
	Pipeline(String),
	/// An event subscription could not be registered.
	#[error("failed to subscribe to {event}: {message}")]
	Subscribe {
		/// Engine event name.
		event: &'static str,
		/// Engine-provided detail.
		message: String,
	},
	/// A session variable could not be set.
	#[error("failed to set variable '{name}': {message}")]
	Variable {
		/// Variable name.
		name: String,
		/// Engine-provided detail.
		message: String,
	},
	/// The instance has been closed.
	#[error("runspace is closed")]
	Closed,
}

/// Classification of a script execution fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
	/// The script raised a runtime error.
	Runtime,
	/// A value could not be converted to the requested type.
	InvalidCast,
	/// The engine observed a cancellation request and stopped.
	Cancelled,
	/// Any other engine-reported failure.
	Other,
}

/// A fault raised while a pipeline was running a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
	pub kind: ScriptErrorKind,
	pub message: String,
	/// Script that raised the error, when the engine knows it.
	pub script_name: Option<String>,
	/// One-based line within [`Self::script_name`].
	pub line: Option<u32>,
}

impl ScriptError {
	pub fn new(kind: ScriptErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
			script_name: None,
			line: None,
		}
	}

	pub fn runtime(message: impl Into<String>) -> Self {
		Self::new(ScriptErrorKind::Runtime, message)
	}

	pub fn invalid_cast(message: impl Into<String>) -> Self {
		Self::new(ScriptErrorKind::InvalidCast, message)
	}

	pub fn cancelled() -> Self {
		Self::new(ScriptErrorKind::Cancelled, "the pipeline was stopped")
	}

	/// Attaches the invocation location.
	pub fn at(mut self, script_name: impl Into<String>, line: u32) -> Self {
		self.script_name = Some(script_name.into());
		self.line = Some(line);
		self
	}

	pub fn is_cancelled(&self) -> bool {
		self.kind == ScriptErrorKind::Cancelled
	}
}
