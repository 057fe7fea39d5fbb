use std::time::Duration;

use pretty_assertions::assert_eq;
use shellhost_engine::mock::{MockConsole, MockRunspace};
use shellhost_engine::{EngineCapabilities, Key, RunspaceLocation};

use super::*;
use crate::idle_queue::InvocationEventQueue;
use crate::prompt_nest::PromptNest;

struct Fixture {
	runspace: MockRunspace,
	console: Arc<MockConsole>,
	context: Arc<NativeReadLineContext>,
}

impl Fixture {
	fn new(capabilities: EngineCapabilities) -> Self {
		let runspace = MockRunspace::with_options(RunspaceLocation::InProcess, capabilities);
		let console = Arc::new(MockConsole::new());
		let nest = Arc::new(PromptNest::new(Arc::new(runspace.clone())).expect("nest"));
		let idle = InvocationEventQueue::new(Arc::clone(&nest), console.clone()).expect("idle queue");
		let executor = Arc::new(PipelineExecutor::new(nest, idle));
		let context = Arc::new(NativeReadLineContext::new(executor, ConsoleReadLine::new(console.clone())));
		Self { runspace, console, context }
	}

	fn spawn_read(&self, cancel: &CancellationToken) -> tokio::task::JoinHandle<Result<String, ReadLineError>> {
		let context = Arc::clone(&self.context);
		let cancel = cancel.clone();
		tokio::spawn(async move { context.invoke_read_line(true, &cancel).await })
	}

	fn nest(&self) -> &PromptNest {
		self.context.executor.prompt_nest()
	}

	fn reverts(&self) -> usize {
		self.runspace.invocations().iter().filter(|command| **command == Command::RevertReadLine).count()
	}
}

async fn until(mut condition: impl FnMut() -> bool) {
	tokio::time::timeout(Duration::from_secs(2), async {
		while !condition() {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
	})
	.await
	.expect("condition reached in time");
}

async fn finish(task: tokio::task::JoinHandle<Result<String, ReadLineError>>) -> Result<String, ReadLineError> {
	tokio::time::timeout(Duration::from_secs(2), task).await.expect("read finished").unwrap()
}

#[tokio::test]
async fn command_line_comes_from_the_engine_editor() {
	let fx = Fixture::new(EngineCapabilities::default());
	let read = fx.spawn_read(&CancellationToken::new());
	until(|| fx.runspace.is_reading()).await;

	fx.runspace.type_line("Get-ChildItem");
	assert_eq!(finish(read).await.expect("line"), "Get-ChildItem");
	assert_eq!(fx.console.read_count(), 0);
	assert!(!fx.nest().is_read_line_busy());
	assert!(!fx.nest().is_main_busy());
}

#[tokio::test]
async fn pre_cancelled_read_faults_without_side_effects() {
	let fx = Fixture::new(EngineCapabilities::default());
	let cancel = CancellationToken::new();
	cancel.cancel();

	let result = fx.context.invoke_read_line(true, &cancel).await;
	assert!(matches!(result, Err(ReadLineError::Cancelled)));
	let result = fx.context.invoke_read_line(false, &cancel).await;
	assert!(matches!(result, Err(ReadLineError::Cancelled)));

	assert_eq!(fx.console.read_count(), 0);
	assert!(fx.runspace.invocations().is_empty());
}

#[tokio::test]
async fn plain_reads_use_the_console() {
	let fx = Fixture::new(EngineCapabilities::default());
	fx.console.type_str("yes");
	fx.console.push_key(Key::Enter);

	let line = fx.context.invoke_read_line(false, &CancellationToken::new()).await.expect("line");
	assert_eq!(line, "yes");
	assert!(fx.runspace.invocations().is_empty());
}

#[tokio::test]
async fn cancel_mid_read_reverts_input_on_plain_editor() {
	let fx = Fixture::new(EngineCapabilities::default());
	let cancel = CancellationToken::new();
	let read = fx.spawn_read(&cancel);
	until(|| fx.runspace.is_reading()).await;

	cancel.cancel();
	assert_eq!(finish(read).await.expect("empty line"), "");
	assert_eq!(fx.reverts(), 1);
	assert!(!fx.nest().is_read_line_busy());
	assert!(!fx.nest().is_main_busy());
	assert_eq!(fx.nest().nested_prompt_level(), 1);
}

#[tokio::test]
async fn cancel_mid_read_uses_token_on_cancellable_editor() {
	let fx = Fixture::new(EngineCapabilities { cancellable_read_line: true });
	let cancel = CancellationToken::new();
	let read = fx.spawn_read(&cancel);
	until(|| fx.runspace.is_reading()).await;

	cancel.cancel();
	assert_eq!(finish(read).await.expect("empty line"), "");
	assert_eq!(fx.reverts(), 0);
	assert!(!fx.nest().is_read_line_busy());
}

#[tokio::test]
async fn cancel_while_queued_behind_a_command_returns_empty_line() {
	let fx = Fixture::new(EngineCapabilities::default());
	let busy = fx.nest().acquire_handle(false).await;
	let cancel = CancellationToken::new();
	let read = fx.spawn_read(&cancel);

	tokio::time::sleep(Duration::from_millis(20)).await;
	cancel.cancel();

	let line = tokio::time::timeout(Duration::from_millis(500), read)
		.await
		.expect("read gave up without waiting for the command")
		.unwrap()
		.expect("cancelled read");
	assert_eq!(line, "");
	assert!(!fx.runspace.invocations().contains(&Command::ReadLine));

	fx.nest().release_handle(busy);
	assert!(!fx.nest().is_main_busy());
	assert!(!fx.nest().is_read_line_busy());
}

#[tokio::test]
async fn abort_with_nothing_reading_is_a_no_op() {
	let fx = Fixture::new(EngineCapabilities::default());
	tokio::time::timeout(Duration::from_secs(1), fx.context.abort_read_line())
		.await
		.expect("abort returned");
	assert!(fx.runspace.invocations().is_empty());
	assert!(!fx.context.executor.idle_queue().has_pending());
}

#[tokio::test]
async fn explicit_abort_ends_the_read_with_an_empty_line() {
	let fx = Fixture::new(EngineCapabilities { cancellable_read_line: true });
	let read = fx.spawn_read(&CancellationToken::new());
	until(|| fx.runspace.is_reading()).await;

	fx.context.abort_read_line().await;
	assert!(!fx.nest().is_read_line_busy());
	assert_eq!(finish(read).await.expect("empty line"), "");
}

#[tokio::test]
async fn new_read_aborts_the_one_in_flight() {
	let fx = Fixture::new(EngineCapabilities::default());
	let first = fx.spawn_read(&CancellationToken::new());
	until(|| fx.runspace.is_reading()).await;

	let second = fx.spawn_read(&CancellationToken::new());
	assert_eq!(finish(first).await.expect("aborted line"), "");

	until(|| fx.runspace.is_reading()).await;
	fx.runspace.type_line("second");
	assert_eq!(finish(second).await.expect("line"), "second");
	assert_eq!(fx.reverts(), 1);
}

#[tokio::test]
async fn wait_for_exit_resolves_after_the_read_ends() {
	let fx = Fixture::new(EngineCapabilities::default());
	let read = fx.spawn_read(&CancellationToken::new());
	until(|| fx.runspace.is_reading()).await;

	let waited = tokio::time::timeout(Duration::from_millis(20), fx.context.wait_for_read_line_exit()).await;
	assert!(waited.is_err());

	fx.runspace.type_line("done");
	finish(read).await.expect("line");
	tokio::time::timeout(Duration::from_secs(1), fx.context.wait_for_read_line_exit())
		.await
		.expect("no read in flight");
	assert!(!fx.nest().is_read_line_busy());
}

#[test]
fn first_line_takes_the_first_value() {
	assert_eq!(first_line(vec![Value::String("a".into()), Value::String("b".into())]), "a");
	assert_eq!(first_line(Vec::new()), "");
	assert_eq!(first_line(vec![Value::Null]), "");
	assert_eq!(first_line(vec![Value::from(3)]), "3");
}
