use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use shellhost_engine::{CancellationToken, Command, Console, EngineError, ErrorSink, ExecutionOptions, NestedPromptHandler, NestedPromptKind, Runspace};

use crate::config::{ReadLineMode, SessionConfig};
use crate::executor::PipelineExecutor;
use crate::idle_queue::InvocationEventQueue;
use crate::prompt::{PromptContext, ReadLineError};
use crate::prompt_nest::PromptNest;
use crate::request::ExecutionResult;

/// Access coordination for one interactive interpreter instance.
///
/// Owns the prompt nest, the idle queue, and the read-line strategy, and
/// tracks the engine's nested prompts (including debugger stops) as frames.
pub struct RunspaceSession {
	nest: Arc<PromptNest>,
	executor: Arc<PipelineExecutor>,
	prompt: PromptContext,
}

impl RunspaceSession {
	pub fn new(runspace: Arc<dyn Runspace>, console: Arc<dyn Console>, mode: ReadLineMode) -> Result<Self, EngineError> {
		let nest = Arc::new(PromptNest::new(Arc::clone(&runspace))?);
		let idle = InvocationEventQueue::new(Arc::clone(&nest), Arc::clone(&console))?;
		let executor = Arc::new(PipelineExecutor::new(Arc::clone(&nest), idle));
		let prompt = PromptContext::new(mode, Arc::clone(&executor), console);

		runspace.subscribe_nested_prompt(Arc::new(NestTracker {
			nest: Arc::downgrade(&nest),
			opened: Mutex::new(Vec::new()),
		}))?;
		tracing::debug!(location = ?runspace.location(), ?mode, "runspace session ready");
		Ok(Self { nest, executor, prompt })
	}

	pub fn from_config(runspace: Arc<dyn Runspace>, console: Arc<dyn Console>, config: &SessionConfig) -> Result<Self, EngineError> {
		Self::new(runspace, console, config.read_line)
	}

	pub fn prompt_nest(&self) -> &Arc<PromptNest> {
		&self.nest
	}

	pub fn prompt(&self) -> &PromptContext {
		&self.prompt
	}

	pub async fn execute_command(&self, command: Command, options: ExecutionOptions) -> ExecutionResult {
		self.execute_command_with(command, ErrorSink::new(), options, CancellationToken::new()).await
	}

	/// Runs `command` once the runspace is available.
	///
	/// With `interrupt_command_prompt`, an in-flight read is aborted first so
	/// the command runs directly instead of through the idle queue.
	pub async fn execute_command_with(&self, command: Command, errors: ErrorSink, options: ExecutionOptions, cancel: CancellationToken) -> ExecutionResult {
		if options.interrupt_command_prompt && self.nest.is_read_line_busy() {
			tracing::debug!(%command, "interrupting command prompt");
			self.prompt.abort_read_line().await;
			self.prompt.wait_for_read_line_exit().await;
		}
		self.executor.execute(command, errors, options, cancel).await
	}

	pub async fn read_line(&self, is_command_line: bool, cancel: &CancellationToken) -> Result<String, ReadLineError> {
		self.prompt.invoke_read_line(is_command_line, cancel).await
	}

	pub async fn abort_read_line(&self) {
		self.prompt.abort_read_line().await;
	}

	pub async fn wait_for_read_line_exit(&self) {
		self.prompt.wait_for_read_line_exit().await;
	}

	pub fn nested_prompt_level(&self) -> usize {
		self.nest.nested_prompt_level()
	}

	pub fn is_in_debugger(&self) -> bool {
		self.nest.is_in_debugger()
	}

	pub fn is_main_busy(&self) -> bool {
		self.nest.is_main_busy()
	}

	pub fn is_read_line_busy(&self) -> bool {
		self.nest.is_read_line_busy()
	}
}

/// Mirrors engine nested prompts onto the prompt nest.
struct NestTracker {
	nest: Weak<PromptNest>,
	/// One entry per engine nested prompt; false when its frame failed to open.
	opened: Mutex<Vec<bool>>,
}

impl NestedPromptHandler for NestTracker {
	fn on_enter(&self, kind: NestedPromptKind) {
		let Some(nest) = self.nest.upgrade() else {
			return;
		};
		let opened = match nest.push_frame(kind == NestedPromptKind::Debugger) {
			Ok(_) => true,
			Err(error) => {
				tracing::error!(%error, ?kind, "failed to open frame for nested prompt");
				false
			}
		};
		self.opened.lock().push(opened);
	}

	fn on_exit(&self) {
		let opened = self.opened.lock().pop().unwrap_or(false);
		if let (true, Some(nest)) = (opened, self.nest.upgrade()) {
			nest.pop_frame();
		}
	}
}

#[cfg(test)]
mod tests;
