use shellhost_engine::{EngineError, ScriptError};
use shellhost_worker::SchedulerError;
use thiserror::Error;

/// Errors raised by provider registration and script-backed providers.
#[derive(Debug, Error)]
pub enum ProviderError {
	#[error("no feature provider registered with id '{0}'")]
	NotRegistered(String),
	/// Provider scripts cannot change editor state.
	#[error("cannot register editor command '{0}': the editor object is read-only")]
	ReadOnly(String),
	#[error("failed to encode editor object: {0}")]
	Encode(String),
	#[error(transparent)]
	Script(#[from] ScriptError),
	#[error(transparent)]
	Engine(#[from] EngineError),
	#[error(transparent)]
	Scheduler(#[from] SchedulerError),
}
