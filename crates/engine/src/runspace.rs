use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{Command, EngineError, ExecutionOptions, InitialSessionState, ScriptError};

/// Where the interpreter instance lives relative to the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunspaceLocation {
	/// Same process; interactive input and command execution share one
	/// execution path.
	InProcess,
	/// Remote or out-of-process session; input and execution run on
	/// independent channels.
	OutOfProcess,
}

impl RunspaceLocation {
	pub const fn is_in_process(self) -> bool {
		matches!(self, Self::InProcess)
	}
}

/// Optional engine features the coordination layer adapts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCapabilities {
	/// The native line editor returns promptly when the cancellation token
	/// passed to [`Pipeline::invoke`] fires.
	pub cancellable_read_line: bool,
}

/// How a new pipeline attaches to the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
	/// Runs on the instance's current execution path.
	Current,
	/// Runs nested on top of a suspended or blocked pipeline.
	Nested,
}

/// Kind of nested prompt the engine entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedPromptKind {
	/// Explicitly requested nested prompt.
	Nested,
	/// Execution suspended at a breakpoint or step.
	Debugger,
}

/// Collects error records written while a command runs.
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
	messages: Arc<Mutex<Vec<String>>>,
}

impl ErrorSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&self, message: impl Into<String>) {
		self.messages.lock().push(message.into());
	}

	pub fn messages(&self) -> Vec<String> {
		self.messages.lock().clone()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.lock().is_empty()
	}
}

/// Single-use command execution object bound to an interpreter instance.
///
/// Pipelines are not reentrant. Callers guarantee exclusive use through the
/// lease protocol; implementations may assume `invoke` is never entered
/// concurrently on one pipeline.
pub trait Pipeline: Send {
	/// Runs `command` to completion and collects its output.
	///
	/// Non-terminating errors go to `errors`. Implementations that support
	/// cooperative cancellation stop when `cancel` fires and return a
	/// [`ScriptError`] of kind `Cancelled`.
	fn invoke(&mut self, command: &Command, options: &ExecutionOptions, errors: &ErrorSink, cancel: &CancellationToken) -> Result<Vec<Value>, ScriptError>;

	/// Returns true while the engine reports this pipeline as running.
	fn is_running(&self) -> bool {
		false
	}
}

/// Receives the engine's idle notifications.
///
/// The engine fires `on_idle` on its execution thread when it is not running
/// a command and not blocked on non-interruptible I/O, including while its
/// native line editor waits for a key.
pub trait IdleHandler: Send + Sync {
	fn on_idle(&self);

	/// The engine tore the subscription down.
	fn on_unsubscribed(self: Arc<Self>);
}

/// Receives nested prompt entry and exit notifications.
pub trait NestedPromptHandler: Send + Sync {
	fn on_enter(&self, kind: NestedPromptKind);
	fn on_exit(&self);
}

/// One isolated, stateful interpreter instance.
pub trait Runspace: Send + Sync {
	fn location(&self) -> RunspaceLocation;

	fn capabilities(&self) -> EngineCapabilities;

	fn create_pipeline(&self, mode: PipelineMode) -> Result<Box<dyn Pipeline>, EngineError>;

	fn set_variable(&self, name: &str, value: Value) -> Result<(), EngineError>;

	/// Registers `handler` for idle notifications until the engine tears the
	/// subscription down.
	fn subscribe_idle(&self, handler: Arc<dyn IdleHandler>) -> Result<(), EngineError>;

	fn subscribe_nested_prompt(&self, handler: Arc<dyn NestedPromptHandler>) -> Result<(), EngineError>;
}

/// Factory for interpreter instances.
pub trait ScriptEngine: Send + Sync {
	/// Opens and configures a new instance.
	fn open_runspace(&self, state: &InitialSessionState) -> Result<Arc<dyn Runspace>, EngineError>;
}
