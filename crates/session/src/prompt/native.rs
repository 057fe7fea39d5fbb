//! Prompt strategy backed by the engine's own line editor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use shellhost_engine::{CancellationToken, Command, ErrorSink, ExecutionOptions, Value};

use crate::executor::PipelineExecutor;
use crate::prompt::ReadLineError;
use crate::prompt::legacy::ConsoleReadLine;
use crate::request::ExecutionResult;

/// Reads command lines by running [`Command::ReadLine`] on the read-line
/// pipeline. Non-command-line reads fall back to a plain console reader.
pub struct NativeReadLineContext {
	executor: Arc<PipelineExecutor>,
	fallback: ConsoleReadLine,
	active: Mutex<Option<(u64, CancellationToken)>>,
	next_read: AtomicU64,
}

impl NativeReadLineContext {
	pub fn new(executor: Arc<PipelineExecutor>, fallback: ConsoleReadLine) -> Self {
		Self {
			executor,
			fallback,
			active: Mutex::new(None),
			next_read: AtomicU64::new(1),
		}
	}

	pub async fn invoke_read_line(&self, is_command_line: bool, cancel: &CancellationToken) -> Result<String, ReadLineError> {
		if cancel.is_cancelled() {
			return Err(ReadLineError::Cancelled);
		}
		if !is_command_line {
			return self.fallback.read_line(false, cancel).await;
		}

		let nest = self.executor.prompt_nest();
		if nest.is_read_line_busy() {
			tracing::debug!("aborting in-flight read-line before starting a new one");
			self.abort_read_line().await;
		}

		let id = self.next_read.fetch_add(1, Ordering::Relaxed);
		let token = cancel.child_token();
		*self.active.lock() = Some((id, token.clone()));
		let _active = ClearActive { active: &self.active, id };

		let read = self.executor.execute(Command::ReadLine, ErrorSink::new(), ExecutionOptions::read_line(), token);
		tokio::pin!(read);
		let result = tokio::select! {
			result = &mut read => result,
			() = cancel.cancelled() => {
				tracing::debug!(read = id, "read-line cancelled by caller");
				let ((), result) = tokio::join!(self.abort_read_line(), &mut read);
				result
			}
		};

		interpret(result, cancel)
	}

	/// Stops the in-flight read, if any.
	///
	/// Engines whose line editor observes cancellation get the read's token
	/// cancelled; the call returns once the read has exited. Otherwise the
	/// editor is told through the idle queue to revert its input and accept
	/// the empty line.
	pub async fn abort_read_line(&self) {
		let nest = self.executor.prompt_nest();
		if !nest.is_read_line_busy() {
			return;
		}

		let token = self.active.lock().as_ref().map(|(_, token)| token.clone());
		if nest.runspace().capabilities().cancellable_read_line
			&& let Some(token) = token
		{
			token.cancel();
			self.wait_for_read_line_exit().await;
			return;
		}

		let revert = self
			.executor
			.idle_queue()
			.execute_on_idle(Command::RevertReadLine, ErrorSink::new(), ExecutionOptions::silent());
		tokio::select! {
			result = revert => {
				if let Err(error) = result {
					tracing::warn!(%error, "reverting the line editor failed");
				}
			}
			() = self.wait_for_read_line_exit() => {
				tracing::trace!("read-line exited before the revert ran");
			}
		}
	}

	/// Waits for exclusive use of the read-line pipeline and gives it back.
	pub async fn wait_for_read_line_exit(&self) {
		let handle = self.executor.prompt_nest().acquire_handle(true).await;
		self.executor.prompt_nest().release_handle(handle);
	}

	pub fn fallback(&self) -> &ConsoleReadLine {
		&self.fallback
	}
}

fn interpret(result: ExecutionResult, cancel: &CancellationToken) -> Result<String, ReadLineError> {
	match result {
		Ok(_) if cancel.is_cancelled() => Ok(String::new()),
		Ok(values) => Ok(first_line(values)),
		Err(error) if error.is_cancelled() => Ok(String::new()),
		Err(error) => Err(ReadLineError::Execution(error)),
	}
}

fn first_line(values: Vec<Value>) -> String {
	match values.into_iter().next() {
		Some(Value::String(line)) => line,
		Some(Value::Null) | None => String::new(),
		Some(other) => other.to_string(),
	}
}

struct ClearActive<'a> {
	active: &'a Mutex<Option<(u64, CancellationToken)>>,
	id: u64,
}

impl Drop for ClearActive<'_> {
	fn drop(&mut self) {
		let mut active = self.active.lock();
		if active.as_ref().is_some_and(|(id, _)| *id == self.id) {
			active.take();
		}
	}
}

#[cfg(test)]
mod tests;
