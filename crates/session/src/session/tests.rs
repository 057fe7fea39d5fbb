use std::time::Duration;

use pretty_assertions::assert_eq;
use shellhost_engine::mock::{MockConsole, MockRunspace};
use shellhost_engine::{EngineCapabilities, Key, PipelineMode, RunspaceLocation, Value};

use super::*;

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

struct Fixture {
	runspace: MockRunspace,
	console: Arc<MockConsole>,
	session: Arc<RunspaceSession>,
}

fn fixture(mode: ReadLineMode) -> Fixture {
	init_tracing();
	let runspace = MockRunspace::new();
	let console = Arc::new(MockConsole::new());
	let session = RunspaceSession::new(Arc::new(runspace.clone()), console.clone(), mode).expect("session");
	Fixture {
		runspace,
		console,
		session: Arc::new(session),
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

fn spawn_read(session: &Arc<RunspaceSession>) -> tokio::task::JoinHandle<Result<String, ReadLineError>> {
	let session = Arc::clone(session);
	tokio::spawn(async move { session.read_line(true, &CancellationToken::new()).await })
}

#[tokio::test]
async fn debugger_stop_pushes_and_pops_a_frame() {
	let fx = fixture(ReadLineMode::Native);
	assert_eq!(fx.session.nested_prompt_level(), 1);

	fx.runspace.enter_nested_prompt(NestedPromptKind::Debugger);
	assert_eq!(fx.session.nested_prompt_level(), 2);
	assert!(fx.session.is_in_debugger());
	assert_eq!(fx.runspace.pipelines_created().last(), Some(&PipelineMode::Nested));

	fx.runspace.exit_nested_prompt();
	assert_eq!(fx.session.nested_prompt_level(), 1);
	assert!(!fx.session.is_in_debugger());
}

#[tokio::test]
async fn commands_at_a_debugger_stop_bypass_the_suspended_pipeline() {
	let fx = fixture(ReadLineMode::Native);
	let suspended = fx.session.prompt_nest().acquire_handle(false).await;

	fx.runspace.enter_nested_prompt(NestedPromptKind::Debugger);
	let values = tokio::time::timeout(Duration::from_secs(1), fx.session.execute_command(Command::script("$x"), ExecutionOptions::default()))
		.await
		.expect("nested command ran")
		.expect("values");
	assert_eq!(values, vec![Value::String("$x".to_string())]);

	fx.runspace.exit_nested_prompt();
	assert!(fx.session.is_main_busy());
	drop(suspended);
	assert!(!fx.session.is_main_busy());
}

#[tokio::test]
async fn failed_nested_frame_does_not_unbalance_the_stack() {
	let fx = fixture(ReadLineMode::Native);
	fx.runspace.enter_nested_prompt(NestedPromptKind::Nested);
	fx.runspace.fail_pipeline_creation(true);
	fx.runspace.enter_nested_prompt(NestedPromptKind::Debugger);
	assert_eq!(fx.session.nested_prompt_level(), 2);
	fx.runspace.fail_pipeline_creation(false);

	fx.runspace.exit_nested_prompt();
	assert_eq!(fx.session.nested_prompt_level(), 2);
	fx.runspace.exit_nested_prompt();
	assert_eq!(fx.session.nested_prompt_level(), 1);
}

#[tokio::test]
async fn command_during_native_read_runs_through_idle() {
	let fx = fixture(ReadLineMode::Native);
	let read = spawn_read(&fx.session);
	until(|| fx.runspace.is_reading()).await;

	let values = tokio::time::timeout(Duration::from_secs(2), fx.session.execute_command(Command::script("ls"), ExecutionOptions::default()))
		.await
		.expect("idle command ran")
		.expect("values");
	assert_eq!(values, vec![Value::String("ls".to_string())]);
	assert_eq!(fx.session.nested_prompt_level(), 1);
	assert!(fx.session.is_read_line_busy());

	fx.runspace.type_line("exit");
	assert_eq!(read.await.unwrap().expect("line"), "exit");
}

#[tokio::test]
async fn interrupting_command_aborts_the_read_first() {
	let fx = fixture(ReadLineMode::Native);
	let read = spawn_read(&fx.session);
	until(|| fx.runspace.is_reading()).await;

	let options = ExecutionOptions {
		interrupt_command_prompt: true,
		..ExecutionOptions::default()
	};
	let values = tokio::time::timeout(Duration::from_secs(2), fx.session.execute_command(Command::script("urgent"), options))
		.await
		.expect("command ran")
		.expect("values");
	assert_eq!(values, vec![Value::String("urgent".to_string())]);
	assert_eq!(read.await.unwrap().expect("aborted read"), "");
	assert!(fx.runspace.invocations().contains(&Command::RevertReadLine));
	assert!(!fx.session.is_read_line_busy());
}

#[tokio::test]
async fn legacy_mode_reads_from_console() {
	let fx = fixture(ReadLineMode::Legacy);
	assert_eq!(fx.session.prompt().mode(), ReadLineMode::Legacy);
	fx.console.type_str("pwd");
	fx.console.push_key(Key::Enter);

	let line = fx.session.read_line(true, &CancellationToken::new()).await.expect("line");
	assert_eq!(line, "pwd");
	assert!(fx.runspace.invocations().is_empty());
}

#[tokio::test]
async fn pre_cancelled_read_touches_nothing() {
	for mode in [ReadLineMode::Native, ReadLineMode::Legacy] {
		let fx = fixture(mode);
		let cancel = CancellationToken::new();
		cancel.cancel();

		let result = fx.session.read_line(true, &cancel).await;
		assert!(matches!(result, Err(ReadLineError::Cancelled)));
		assert_eq!(fx.console.read_count(), 0);
		assert!(fx.runspace.invocations().is_empty());
		assert!(!fx.session.is_read_line_busy());
	}
}

#[tokio::test]
async fn cancelled_reads_leave_no_leases_behind() {
	let fx = fixture(ReadLineMode::Native);
	for _ in 0..3 {
		let cancel = CancellationToken::new();
		let read = {
			let session = Arc::clone(&fx.session);
			let cancel = cancel.clone();
			tokio::spawn(async move { session.read_line(true, &cancel).await })
		};
		until(|| fx.runspace.is_reading()).await;
		cancel.cancel();
		assert_eq!(read.await.unwrap().expect("empty line"), "");
	}

	assert!(!fx.session.is_read_line_busy());
	assert!(!fx.session.is_main_busy());
	tokio::time::timeout(Duration::from_secs(1), fx.session.wait_for_read_line_exit())
		.await
		.expect("nothing reading");
}

#[tokio::test]
async fn from_config_selects_mode() {
	init_tracing();
	let runspace = MockRunspace::with_options(RunspaceLocation::OutOfProcess, EngineCapabilities::default());
	let config = SessionConfig::parse("read_line = \"legacy\"").expect("config");
	let session = RunspaceSession::from_config(Arc::new(runspace), Arc::new(MockConsole::new()), &config).expect("session");
	assert_eq!(session.prompt().mode(), ReadLineMode::Legacy);
}

#[test]
fn construction_fails_when_pipelines_cannot_be_created() {
	let runspace = MockRunspace::new();
	runspace.fail_pipeline_creation(true);
	let result = RunspaceSession::new(Arc::new(runspace), Arc::new(MockConsole::new()), ReadLineMode::Native);
	assert!(result.is_err());
}

#[test]
fn dropped_session_ignores_late_notifications() {
	let fx = fixture(ReadLineMode::Native);
	let runspace = fx.runspace.clone();
	drop(fx);
	runspace.enter_nested_prompt(NestedPromptKind::Debugger);
	runspace.exit_nested_prompt();
	runspace.fire_idle();
	assert_eq!(runspace.pipelines_created().len(), 2);
}
