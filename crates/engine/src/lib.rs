//! Collaborator interfaces for the hosted script engine.
//!
//! The coordination crates never talk to a concrete interpreter. They see an
//! engine through a handful of object-safe traits:
//!
//! * [`ScriptEngine`] opens isolated interpreter instances from an
//!   [`InitialSessionState`].
//! * [`Runspace`] is one interpreter instance. It hands out single-use
//!   [`Pipeline`]s bound either to the current execution path or to a new
//!   nested one, fires idle notifications, and reports nested prompt
//!   (debugger) entry and exit.
//! * [`Console`] is the raw terminal used by the legacy line reader. All of
//!   its operations must be callable while a key read is outstanding.
//!
//! Values crossing the boundary are plain [`Value`]s (JSON-shaped), so
//! feature results can be decoded with serde on the consumer side.
//!
//! The `mock` feature exposes in-memory doubles of every trait for tests in
//! downstream crates.

mod command;
mod console;
mod error;
mod runspace;
mod session_state;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use command::{Command, ExecutionOptions};
pub use console::{Console, ConsoleError, Key, KeyInfo};
pub use error::{EngineError, ScriptError, ScriptErrorKind};
pub use runspace::{
	EngineCapabilities, ErrorSink, IdleHandler, NestedPromptHandler, NestedPromptKind, Pipeline, PipelineMode, Runspace, RunspaceLocation, ScriptEngine,
};
pub use serde_json::Value;
pub use session_state::InitialSessionState;
pub use tokio_util::sync::CancellationToken;
