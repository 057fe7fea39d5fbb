use std::panic::{AssertUnwindSafe, catch_unwind};

use shellhost_engine::{CancellationToken, Command, EngineError, ErrorSink, ExecutionOptions, Pipeline, ScriptError, Value};
use shellhost_worker::panic_message;
use thiserror::Error;
use tokio::sync::oneshot;

/// Why a command produced no output.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
	#[error(transparent)]
	Script(#[from] ScriptError),
	#[error(transparent)]
	Engine(#[from] EngineError),
	#[error("command panicked: {0}")]
	Panicked(String),
	/// The request was dropped before anything completed it.
	#[error("command was abandoned before it completed")]
	Abandoned,
}

impl ExecutionError {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Script(error) if error.is_cancelled())
	}
}

pub type ExecutionResult = Result<Vec<Value>, ExecutionError>;

/// A command bundled with the sink for its completion.
///
/// Consuming [`Self::complete`] or [`Self::run`] resolves the request; it can
/// only be resolved once.
pub struct PipelineExecutionRequest {
	id: u64,
	command: Command,
	errors: ErrorSink,
	options: ExecutionOptions,
	reply: oneshot::Sender<ExecutionResult>,
}

/// Receiving side of a [`PipelineExecutionRequest`].
pub struct PendingExecution {
	reply: oneshot::Receiver<ExecutionResult>,
}

impl PendingExecution {
	pub async fn wait(self) -> ExecutionResult {
		self.reply.await.unwrap_or(Err(ExecutionError::Abandoned))
	}
}

impl PipelineExecutionRequest {
	pub fn new(id: u64, command: Command, errors: ErrorSink, options: ExecutionOptions) -> (Self, PendingExecution) {
		let (reply, rx) = oneshot::channel();
		(
			Self {
				id,
				command,
				errors,
				options,
				reply,
			},
			PendingExecution { reply: rx },
		)
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn command(&self) -> &Command {
		&self.command
	}

	pub fn options(&self) -> &ExecutionOptions {
		&self.options
	}

	/// Runs the command on `pipeline` and resolves the request with the
	/// outcome. A panic inside the engine resolves it as
	/// [`ExecutionError::Panicked`].
	pub fn run(self, pipeline: &mut dyn Pipeline, cancel: &CancellationToken) {
		let result = invoke_isolated(pipeline, &self.command, &self.options, &self.errors, cancel);
		self.complete(result);
	}

	pub fn complete(self, result: ExecutionResult) {
		if self.reply.send(result).is_err() {
			tracing::trace!(request = self.id, "execution result discarded; caller went away");
		}
	}
}

/// Invokes `command` and converts an engine panic into an error.
pub(crate) fn invoke_isolated(
	pipeline: &mut dyn Pipeline,
	command: &Command,
	options: &ExecutionOptions,
	errors: &ErrorSink,
	cancel: &CancellationToken,
) -> ExecutionResult {
	match catch_unwind(AssertUnwindSafe(|| pipeline.invoke(command, options, errors, cancel))) {
		Ok(Ok(values)) => Ok(values),
		Ok(Err(error)) => Err(ExecutionError::Script(error)),
		Err(payload) => {
			let message = panic_message(&*payload);
			tracing::error!(%command, %message, "pipeline panicked");
			Err(ExecutionError::Panicked(message))
		}
	}
}
