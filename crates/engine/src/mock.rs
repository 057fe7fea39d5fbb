//! In-memory doubles for the engine, runspace, and console traits.
//!
//! [`MockRunspace`] runs commands through a replaceable behavior closure and
//! records every invocation. Its native line editor ([`Command::ReadLine`])
//! blocks on typed lines and fires idle notifications while it waits, the
//! same way a real engine services idle events during a blocking read.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{
	Command, Console, ConsoleError, EngineCapabilities, EngineError, ErrorSink, ExecutionOptions, IdleHandler, InitialSessionState, Key, KeyInfo,
	NestedPromptHandler, NestedPromptKind, Pipeline, PipelineMode, Runspace, RunspaceLocation, ScriptEngine, ScriptError,
};

/// Interval between idle notifications while the line editor is blocked.
const IDLE_TICK: Duration = Duration::from_millis(5);

/// Command handler used by mock pipelines.
pub type Behavior = Arc<dyn Fn(&Command, &CancellationToken) -> Result<Vec<Value>, ScriptError> + Send + Sync>;

fn echo_behavior() -> Behavior {
	Arc::new(|command, _cancel| match command {
		Command::Script(text) => Ok(vec![Value::String(text.clone())]),
		Command::Call { args, .. } => Ok(args.clone()),
		Command::ReadLine | Command::RevertReadLine => Ok(Vec::new()),
	})
}

struct Shared {
	location: RunspaceLocation,
	capabilities: EngineCapabilities,
	behavior: Mutex<Behavior>,
	invocations: Mutex<Vec<Command>>,
	pipelines: Mutex<Vec<PipelineMode>>,
	variables: Mutex<BTreeMap<String, Value>>,
	idle_handlers: Mutex<Vec<Arc<dyn IdleHandler>>>,
	prompt_handlers: Mutex<Vec<Arc<dyn NestedPromptHandler>>>,
	lines: Mutex<VecDeque<String>>,
	line_ready: Condvar,
	active: AtomicUsize,
	max_active: AtomicUsize,
	reading: AtomicBool,
	fail_pipelines: AtomicBool,
}

impl Shared {
	fn fire_idle(&self) {
		let handlers = self.idle_handlers.lock().clone();
		for handler in handlers {
			handler.on_idle();
		}
	}

	fn push_line(&self, line: String) {
		self.lines.lock().push_back(line);
		self.line_ready.notify_all();
	}
}

/// Shared-state interpreter double. Clones observe the same instance.
#[derive(Clone)]
pub struct MockRunspace {
	shared: Arc<Shared>,
}

impl Default for MockRunspace {
	fn default() -> Self {
		Self::new()
	}
}

impl MockRunspace {
	/// In-process instance whose line editor ignores cancellation.
	pub fn new() -> Self {
		Self::with_options(RunspaceLocation::InProcess, EngineCapabilities::default())
	}

	pub fn with_options(location: RunspaceLocation, capabilities: EngineCapabilities) -> Self {
		Self {
			shared: Arc::new(Shared {
				location,
				capabilities,
				behavior: Mutex::new(echo_behavior()),
				invocations: Mutex::new(Vec::new()),
				pipelines: Mutex::new(Vec::new()),
				variables: Mutex::new(BTreeMap::new()),
				idle_handlers: Mutex::new(Vec::new()),
				prompt_handlers: Mutex::new(Vec::new()),
				lines: Mutex::new(VecDeque::new()),
				line_ready: Condvar::new(),
				active: AtomicUsize::new(0),
				max_active: AtomicUsize::new(0),
				reading: AtomicBool::new(false),
				fail_pipelines: AtomicBool::new(false),
			}),
		}
	}

	/// Replaces the handler for script and call commands.
	pub fn set_behavior(&self, behavior: impl Fn(&Command, &CancellationToken) -> Result<Vec<Value>, ScriptError> + Send + Sync + 'static) {
		*self.shared.behavior.lock() = Arc::new(behavior);
	}

	/// Makes subsequent `create_pipeline` calls fail.
	pub fn fail_pipeline_creation(&self, fail: bool) {
		self.shared.fail_pipelines.store(fail, Ordering::SeqCst);
	}

	/// Commands invoked so far, in start order.
	pub fn invocations(&self) -> Vec<Command> {
		self.shared.invocations.lock().clone()
	}

	/// Pipelines created so far, in creation order.
	pub fn pipelines_created(&self) -> Vec<PipelineMode> {
		self.shared.pipelines.lock().clone()
	}

	/// Highest number of simultaneously running invocations observed.
	pub fn max_concurrent_invocations(&self) -> usize {
		self.shared.max_active.load(Ordering::SeqCst)
	}

	pub fn variable(&self, name: &str) -> Option<Value> {
		self.shared.variables.lock().get(name).cloned()
	}

	/// Fires one idle notification on the calling thread.
	pub fn fire_idle(&self) {
		self.shared.fire_idle();
	}

	pub fn idle_subscriber_count(&self) -> usize {
		self.shared.idle_handlers.lock().len()
	}

	/// Tears every idle subscription down and notifies the handlers.
	pub fn drop_idle_subscriptions(&self) {
		let handlers = std::mem::take(&mut *self.shared.idle_handlers.lock());
		for handler in handlers {
			handler.on_unsubscribed();
		}
	}

	pub fn enter_nested_prompt(&self, kind: NestedPromptKind) {
		let handlers = self.shared.prompt_handlers.lock().clone();
		for handler in handlers {
			handler.on_enter(kind);
		}
	}

	pub fn exit_nested_prompt(&self) {
		let handlers = self.shared.prompt_handlers.lock().clone();
		for handler in handlers {
			handler.on_exit();
		}
	}

	/// Feeds one accepted line to the native line editor.
	pub fn type_line(&self, line: impl Into<String>) {
		self.shared.push_line(line.into());
	}

	/// Returns true while a [`Command::ReadLine`] is blocked.
	pub fn is_reading(&self) -> bool {
		self.shared.reading.load(Ordering::SeqCst)
	}
}

impl Runspace for MockRunspace {
	fn location(&self) -> RunspaceLocation {
		self.shared.location
	}

	fn capabilities(&self) -> EngineCapabilities {
		self.shared.capabilities
	}

	fn create_pipeline(&self, mode: PipelineMode) -> Result<Box<dyn Pipeline>, EngineError> {
		if self.shared.fail_pipelines.load(Ordering::SeqCst) {
			return Err(EngineError::Pipeline("pipeline creation disabled".to_string()));
		}
		self.shared.pipelines.lock().push(mode);
		Ok(Box::new(MockPipeline {
			shared: Arc::clone(&self.shared),
		}))
	}

	fn set_variable(&self, name: &str, value: Value) -> Result<(), EngineError> {
		self.shared.variables.lock().insert(name.to_string(), value);
		Ok(())
	}

	fn subscribe_idle(&self, handler: Arc<dyn IdleHandler>) -> Result<(), EngineError> {
		self.shared.idle_handlers.lock().push(handler);
		Ok(())
	}

	fn subscribe_nested_prompt(&self, handler: Arc<dyn NestedPromptHandler>) -> Result<(), EngineError> {
		self.shared.prompt_handlers.lock().push(handler);
		Ok(())
	}
}

struct ActiveGuard<'a> {
	shared: &'a Shared,
}

impl<'a> ActiveGuard<'a> {
	fn enter(shared: &'a Shared) -> Self {
		let now = shared.active.fetch_add(1, Ordering::SeqCst) + 1;
		shared.max_active.fetch_max(now, Ordering::SeqCst);
		Self { shared }
	}
}

impl Drop for ActiveGuard<'_> {
	fn drop(&mut self) {
		self.shared.active.fetch_sub(1, Ordering::SeqCst);
	}
}

struct ReadingGuard<'a>(&'a AtomicBool);

impl Drop for ReadingGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

struct MockPipeline {
	shared: Arc<Shared>,
}

impl MockPipeline {
	fn read_line(&self, cancel: &CancellationToken) -> Result<Vec<Value>, ScriptError> {
		self.shared.reading.store(true, Ordering::SeqCst);
		let _reading = ReadingGuard(&self.shared.reading);
		loop {
			{
				let mut lines = self.shared.lines.lock();
				if let Some(line) = lines.pop_front() {
					return Ok(vec![Value::String(line)]);
				}
				if self.shared.capabilities.cancellable_read_line && cancel.is_cancelled() {
					return Err(ScriptError::cancelled());
				}
				self.shared.line_ready.wait_for(&mut lines, IDLE_TICK);
			}
			self.shared.fire_idle();
		}
	}
}

impl Pipeline for MockPipeline {
	fn invoke(&mut self, command: &Command, _options: &ExecutionOptions, _errors: &ErrorSink, cancel: &CancellationToken) -> Result<Vec<Value>, ScriptError> {
		self.shared.invocations.lock().push(command.clone());
		let _active = ActiveGuard::enter(&self.shared);
		match command {
			Command::ReadLine => self.read_line(cancel),
			Command::RevertReadLine => {
				self.shared.push_line(String::new());
				Ok(Vec::new())
			}
			Command::Script(_) | Command::Call { .. } => {
				let behavior = Arc::clone(&*self.shared.behavior.lock());
				behavior(command, cancel)
			}
		}
	}
}

/// Engine double that opens [`MockRunspace`]s.
#[derive(Default)]
pub struct MockEngine {
	opened: Mutex<Vec<(InitialSessionState, MockRunspace)>>,
	behavior: Mutex<Option<Behavior>>,
	fail_open: AtomicBool,
}

impl MockEngine {
	pub fn new() -> Self {
		Self::default()
	}

	/// Behavior installed on every runspace opened afterwards.
	pub fn set_behavior(&self, behavior: impl Fn(&Command, &CancellationToken) -> Result<Vec<Value>, ScriptError> + Send + Sync + 'static) {
		*self.behavior.lock() = Some(Arc::new(behavior));
	}

	pub fn fail_open(&self, fail: bool) {
		self.fail_open.store(fail, Ordering::SeqCst);
	}

	pub fn opened(&self) -> Vec<MockRunspace> {
		self.opened.lock().iter().map(|(_, runspace)| runspace.clone()).collect()
	}

	pub fn opened_states(&self) -> Vec<InitialSessionState> {
		self.opened.lock().iter().map(|(state, _)| state.clone()).collect()
	}
}

impl ScriptEngine for MockEngine {
	fn open_runspace(&self, state: &InitialSessionState) -> Result<Arc<dyn Runspace>, EngineError> {
		if self.fail_open.load(Ordering::SeqCst) {
			return Err(EngineError::Open("engine refused to open".to_string()));
		}
		let runspace = MockRunspace::new();
		if let Some(behavior) = self.behavior.lock().clone() {
			*runspace.shared.behavior.lock() = behavior;
		}
		for (name, value) in &state.variables {
			runspace.set_variable(name, value.clone())?;
		}
		self.opened.lock().push((state.clone(), runspace.clone()));
		Ok(Arc::new(runspace))
	}
}

/// Scripted console double.
#[derive(Default)]
pub struct MockConsole {
	keys: Mutex<VecDeque<KeyInfo>>,
	key_pushed: Notify,
	output: Mutex<String>,
	cursor: Mutex<(u16, u16)>,
	reads: AtomicUsize,
}

impl MockConsole {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push_key(&self, key: Key) {
		self.keys.lock().push_back(KeyInfo::plain(key));
		self.key_pushed.notify_one();
	}

	/// Queues each character of `text` as a key press.
	pub fn type_str(&self, text: &str) {
		for ch in text.chars() {
			self.push_key(Key::Char(ch));
		}
	}

	/// Everything written so far.
	pub fn output(&self) -> String {
		self.output.lock().clone()
	}

	/// Number of `read_key` calls started.
	pub fn read_count(&self) -> usize {
		self.reads.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Console for MockConsole {
	fn key_available(&self) -> bool {
		!self.keys.lock().is_empty()
	}

	async fn read_key(&self, cancel: &CancellationToken) -> Result<KeyInfo, ConsoleError> {
		self.reads.fetch_add(1, Ordering::SeqCst);
		loop {
			if cancel.is_cancelled() {
				return Err(ConsoleError::Cancelled);
			}
			if let Some(key) = self.keys.lock().pop_front() {
				return Ok(key);
			}
			tokio::select! {
				_ = self.key_pushed.notified() => {}
				_ = cancel.cancelled() => return Err(ConsoleError::Cancelled),
			}
		}
	}

	fn cursor_position(&self) -> (u16, u16) {
		*self.cursor.lock()
	}

	fn set_cursor_position(&self, left: u16, top: u16) {
		*self.cursor.lock() = (left, top);
	}

	fn write_str(&self, text: &str) {
		self.output.lock().push_str(text);
		let mut cursor = self.cursor.lock();
		for ch in text.chars() {
			match ch {
				'\n' => *cursor = (0, cursor.1.saturating_add(1)),
				'\u{8}' => cursor.0 = cursor.0.saturating_sub(1),
				_ => cursor.0 = cursor.0.saturating_add(1),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn echo_behavior_returns_script_text() {
		let runspace = MockRunspace::new();
		let mut pipeline = runspace.create_pipeline(PipelineMode::Current).expect("pipeline");
		let out = pipeline
			.invoke(&Command::script("1 + 1"), &ExecutionOptions::default(), &ErrorSink::new(), &CancellationToken::new())
			.expect("invoke");
		assert_eq!(out, vec![Value::String("1 + 1".to_string())]);
		assert_eq!(runspace.invocations(), vec![Command::script("1 + 1")]);
	}

	#[test]
	fn revert_unblocks_read_line_with_empty_input() {
		let runspace = MockRunspace::new();
		let mut reader = runspace.create_pipeline(PipelineMode::Current).expect("pipeline");
		let mut reverter = runspace.create_pipeline(PipelineMode::Nested).expect("pipeline");
		reverter
			.invoke(&Command::RevertReadLine, &ExecutionOptions::default(), &ErrorSink::new(), &CancellationToken::new())
			.expect("revert");
		let out = reader
			.invoke(&Command::ReadLine, &ExecutionOptions::read_line(), &ErrorSink::new(), &CancellationToken::new())
			.expect("read");
		assert_eq!(out, vec![Value::String(String::new())]);
		assert!(!runspace.is_reading());
	}

	#[test]
	fn cancellable_line_editor_observes_token() {
		let runspace = MockRunspace::with_options(RunspaceLocation::InProcess, EngineCapabilities { cancellable_read_line: true });
		let mut reader = runspace.create_pipeline(PipelineMode::Current).expect("pipeline");
		let cancel = CancellationToken::new();
		cancel.cancel();
		let err = reader
			.invoke(&Command::ReadLine, &ExecutionOptions::read_line(), &ErrorSink::new(), &cancel)
			.expect_err("cancelled read");
		assert!(err.is_cancelled());
	}

	#[tokio::test]
	async fn console_keeps_key_buffered_when_cancelled() {
		let console = MockConsole::new();
		console.push_key(Key::Char('a'));
		let cancel = CancellationToken::new();
		cancel.cancel();
		assert_eq!(console.read_key(&cancel).await, Err(ConsoleError::Cancelled));
		assert!(console.key_available());
		let key = console.read_key(&CancellationToken::new()).await.expect("key");
		assert_eq!(key.key, Key::Char('a'));
	}
}
