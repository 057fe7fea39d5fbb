use std::fmt;

use serde_json::Value;

/// One unit of work submitted to a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	/// Script text evaluated by the engine.
	Script(String),
	/// Invocation of a named command with positional arguments.
	Call { name: String, args: Vec<Value> },
	/// Reads one line of command input with the engine's native line editor.
	///
	/// The pipeline blocks until a line is accepted. While blocked, the engine
	/// keeps firing idle notifications.
	ReadLine,
	/// Reverts the native line editor's partial input into history and
	/// injects an accept keystroke so a blocked [`Command::ReadLine`] returns.
	///
	/// Used to abort a read on line editors that do not observe cancellation.
	RevertReadLine,
}

impl Command {
	pub fn script(text: impl Into<String>) -> Self {
		Self::Script(text.into())
	}

	pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
		Self::Call {
			name: name.into(),
			args: args.into_iter().collect(),
		}
	}

	/// Returns true for the line editor commands.
	pub const fn is_line_editor(&self) -> bool {
		matches!(self, Self::ReadLine | Self::RevertReadLine)
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Script(text) => {
				let first = text.lines().find(|line| !line.trim().is_empty()).unwrap_or_default();
				write!(f, "script `{}`", first.trim())
			}
			Self::Call { name, args } => write!(f, "call `{name}` ({} args)", args.len()),
			Self::ReadLine => f.write_str("read-line"),
			Self::RevertReadLine => f.write_str("revert-read-line"),
		}
	}
}

/// Host-side options for running a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
	/// Echo output values to the host console.
	pub write_output_to_host: bool,
	/// Echo error records to the host console.
	pub write_errors_to_host: bool,
	/// Record the command in interactive history.
	pub add_to_history: bool,
	/// Abort an in-flight interactive read before running instead of
	/// injecting the command through the idle queue.
	pub interrupt_command_prompt: bool,
	/// The command is the interactive read itself.
	pub is_read_line: bool,
}

impl Default for ExecutionOptions {
	fn default() -> Self {
		Self {
			write_output_to_host: true,
			write_errors_to_host: true,
			add_to_history: false,
			interrupt_command_prompt: false,
			is_read_line: false,
		}
	}
}

impl ExecutionOptions {
	/// Options for commands whose output and errors stay with the caller.
	pub fn silent() -> Self {
		Self {
			write_output_to_host: false,
			write_errors_to_host: false,
			..Self::default()
		}
	}

	/// Options for the interactive read.
	pub fn read_line() -> Self {
		Self {
			is_read_line: true,
			..Self::silent()
		}
	}
}
