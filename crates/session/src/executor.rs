//! Routes commands to the pipeline that may run them right now.

use std::sync::Arc;

use shellhost_engine::{CancellationToken, Command, ErrorSink, ExecutionOptions, ScriptError};
use shellhost_worker::{TaskClass, spawn_blocking};

use crate::idle_queue::InvocationEventQueue;
use crate::prompt_nest::PromptNest;
use crate::request::{ExecutionError, ExecutionResult, invoke_isolated};

/// Runs commands under the lease protocol.
///
/// While an in-process read-line holds the main execution path, ordinary
/// commands go through the idle queue instead of waiting for the lease.
pub struct PipelineExecutor {
	nest: Arc<PromptNest>,
	idle: InvocationEventQueue,
}

impl PipelineExecutor {
	pub fn new(nest: Arc<PromptNest>, idle: InvocationEventQueue) -> Self {
		Self { nest, idle }
	}

	pub fn prompt_nest(&self) -> &Arc<PromptNest> {
		&self.nest
	}

	pub fn idle_queue(&self) -> &InvocationEventQueue {
		&self.idle
	}

	/// Runs `command` and returns its output.
	///
	/// The lease is released when the engine call returns, even if the caller
	/// stops waiting. A token that fires while the command is still queued
	/// (for the lease or for an idle notification) fails it as cancelled
	/// without reaching the engine.
	pub async fn execute(&self, command: Command, errors: ErrorSink, options: ExecutionOptions, cancel: CancellationToken) -> ExecutionResult {
		if !options.is_read_line && self.nest.is_read_line_busy() && self.nest.runspace().location().is_in_process() {
			tracing::debug!(%command, "read-line holds the main path; deferring to idle");
			return tokio::select! {
				result = self.idle.execute_on_idle(command, errors, options) => result,
				() = cancel.cancelled() => {
					tracing::debug!("cancelled while waiting for idle");
					Err(ExecutionError::Script(ScriptError::cancelled()))
				}
			};
		}

		let handle = tokio::select! {
			handle = self.nest.acquire_handle(options.is_read_line) => handle,
			() = cancel.cancelled() => {
				tracing::debug!(%command, "cancelled while waiting for the lease");
				return Err(ExecutionError::Script(ScriptError::cancelled()));
			}
		};
		let pipeline = self.nest.current_pipeline(options.is_read_line);
		let span = tracing::debug_span!("execute", %command, level = self.nest.nested_prompt_level());

		let job = spawn_blocking(TaskClass::Interactive, move || {
			let _enter = span.enter();
			let _handle = handle;
			if cancel.is_cancelled() {
				tracing::debug!("cancelled before start");
				return Err(ExecutionError::Script(ScriptError::cancelled()));
			}
			let mut pipeline = pipeline.lock();
			let result = invoke_isolated(pipeline.as_mut(), &command, &options, &errors, &cancel);
			if let Err(error) = &result {
				tracing::debug!(%error, "command failed");
			}
			result
		});

		match job.await {
			Ok(result) => result,
			Err(error) => Err(ExecutionError::Panicked(error.to_string())),
		}
	}
}
