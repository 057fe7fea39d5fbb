//! Interactive read-line strategies.
//!
//! [`PromptContext::Native`] drives the engine's own line editor through the
//! read-line pipeline. [`PromptContext::Legacy`] reads raw keys from the
//! console and is used when the native editor is unavailable.

mod legacy;
mod native;

use std::sync::Arc;

use shellhost_engine::{CancellationToken, Console, ConsoleError};
use thiserror::Error;

pub use self::legacy::{ConsoleReadLine, LegacyReadLineContext};
pub use self::native::NativeReadLineContext;
use crate::config::ReadLineMode;
use crate::executor::PipelineExecutor;
use crate::request::ExecutionError;

#[derive(Debug, Clone, Error)]
pub enum ReadLineError {
	/// The caller's token had already fired; nothing was read.
	#[error("read-line was cancelled before it started")]
	Cancelled,
	#[error(transparent)]
	Console(#[from] ConsoleError),
	#[error("native read-line failed: {0}")]
	Execution(#[source] ExecutionError),
}

/// The active read-line strategy.
pub enum PromptContext {
	Legacy(LegacyReadLineContext),
	Native(NativeReadLineContext),
}

impl PromptContext {
	pub fn new(mode: ReadLineMode, executor: Arc<PipelineExecutor>, console: Arc<dyn Console>) -> Self {
		match mode {
			ReadLineMode::Legacy => Self::Legacy(LegacyReadLineContext::new(console)),
			ReadLineMode::Native => Self::Native(NativeReadLineContext::new(executor, ConsoleReadLine::new(console))),
		}
	}

	pub fn mode(&self) -> ReadLineMode {
		match self {
			Self::Legacy(_) => ReadLineMode::Legacy,
			Self::Native(_) => ReadLineMode::Native,
		}
	}

	/// Reads one line of input.
	///
	/// A token that has already fired fails with [`ReadLineError::Cancelled`]
	/// without touching the console. A token that fires mid-read yields an
	/// empty line.
	pub async fn invoke_read_line(&self, is_command_line: bool, cancel: &CancellationToken) -> Result<String, ReadLineError> {
		tracing::trace!(mode = ?self.mode(), is_command_line, "read-line requested");
		match self {
			Self::Legacy(context) => context.invoke_read_line(is_command_line, cancel).await,
			Self::Native(context) => context.invoke_read_line(is_command_line, cancel).await,
		}
	}

	/// Stops the in-flight read. No-op when nothing is reading.
	pub async fn abort_read_line(&self) {
		match self {
			Self::Legacy(context) => context.abort_read_line(),
			Self::Native(context) => context.abort_read_line().await,
		}
	}

	/// Resolves once no read is in progress.
	pub async fn wait_for_read_line_exit(&self) {
		match self {
			Self::Legacy(context) => context.wait_for_read_line_exit().await,
			Self::Native(context) => context.wait_for_read_line_exit().await,
		}
	}
}
