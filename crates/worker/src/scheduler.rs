//! Dedicated background runspace thread for feature-provider scripts.
//!
//! One OS thread opens its own interpreter instance at construction and then
//! drains a FIFO job queue for the rest of the process lifetime. Callers on
//! any other thread submit units of work and await their results. A unit that
//! is already running on the worker may submit further units through a
//! [`BackgroundTaskScheduler::client`]; those run inline instead of queueing
//! behind themselves.
//!
//! Caller tracing spans are propagated into the worker thread so that logs
//! emitted by provider scripts nest under the originating request span.
//!
//! Shutdown is explicit: dropping the owning scheduler sends a `Shutdown` job
//! and waits briefly for an ack. Clones made with `client` share the queue and
//! do not shut the worker down.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use shellhost_engine::{EngineError, InitialSessionState, Runspace, ScriptEngine};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::{TaskClass, panic_message, spawn_named_thread};

const DEFAULT_THREAD_NAME: &str = "shellhost-background";
const SHUTDOWN_ACK_TIMEOUT: Duration = Duration::from_millis(100);

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
	/// Set on a scheduler's worker thread while it drains its queue.
	static CURRENT_WORKER: RefCell<Option<WorkerSlot>> = const { RefCell::new(None) };
}

struct WorkerSlot {
	scheduler_id: u64,
	runspace: Arc<dyn Runspace>,
}

type Unit = Box<dyn FnOnce(&dyn Runspace) + Send>;

/// A job sent to the worker thread.
enum Job {
	Run { unit: Unit, span: tracing::Span },
	Shutdown { ack: oneshot::Sender<()> },
}

/// Construction options for the dedicated runspace.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOptions {
	pub thread_name: String,
	pub initial_state: InitialSessionState,
}

impl Default for SchedulerOptions {
	fn default() -> Self {
		Self {
			thread_name: DEFAULT_THREAD_NAME.to_string(),
			initial_state: InitialSessionState::default(),
		}
	}
}

#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error("failed to spawn background runspace thread: {0}")]
	Spawn(#[source] std::io::Error),
	#[error(transparent)]
	Open(#[from] EngineError),
	/// The worker has shut down; the unit was not run.
	#[error("background runspace thread has shut down")]
	Shutdown,
	/// The unit was queued but its reply never arrived.
	#[error("background runspace thread dropped the reply")]
	ReplyDropped,
	#[error("background unit of work panicked: {0}")]
	Panicked(String),
}

enum Dispatch<T> {
	Inline(Result<T, SchedulerError>),
	Queued(oneshot::Receiver<Result<T, SchedulerError>>),
}

/// Handle to the dedicated background runspace thread.
pub struct BackgroundTaskScheduler {
	id: u64,
	tx: mpsc::Sender<Job>,
	/// Only the owner sends `Shutdown` on drop.
	is_owner: bool,
}

impl BackgroundTaskScheduler {
	/// Spawns the worker thread and opens its runspace.
	///
	/// Blocks until the runspace is open so configuration failures surface
	/// here rather than on the first submitted unit.
	pub fn new(engine: Arc<dyn ScriptEngine>, options: SchedulerOptions) -> Result<Self, SchedulerError> {
		let id = NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = mpsc::channel::<Job>();
		let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), EngineError>>(1);
		let SchedulerOptions { thread_name, initial_state } = options;

		spawn_named_thread(TaskClass::Background, thread_name.clone(), move || {
			let runspace = match engine.open_runspace(&initial_state) {
				Ok(runspace) => runspace,
				Err(error) => {
					let _ = ready_tx.send(Err(error));
					return;
				}
			};
			let _ = ready_tx.send(Ok(()));
			drain(id, runspace, rx);
		})
		.map_err(SchedulerError::Spawn)?;

		match ready_rx.recv() {
			Ok(Ok(())) => {
				tracing::debug!(scheduler = id, thread = %thread_name, "background runspace opened");
				Ok(Self { id, tx, is_owner: true })
			}
			Ok(Err(error)) => Err(SchedulerError::Open(error)),
			Err(_) => Err(SchedulerError::Shutdown),
		}
	}

	/// Creates a non-owning client that shares the worker queue.
	///
	/// Clients can be moved into units of work to submit nested units.
	pub fn client(&self) -> Self {
		Self {
			id: self.id,
			tx: self.tx.clone(),
			is_owner: false,
		}
	}

	/// Returns true when called on this scheduler's worker thread.
	pub fn is_worker_thread(&self) -> bool {
		self.worker_runspace().is_some()
	}

	/// Runs `unit` on the worker and awaits its result.
	pub async fn run<F, T>(&self, unit: F) -> Result<T, SchedulerError>
	where
		F: FnOnce(&dyn Runspace) -> T + Send + 'static,
		T: Send + 'static,
	{
		match self.dispatch(unit) {
			Dispatch::Inline(result) => result,
			Dispatch::Queued(reply) => reply.await.unwrap_or(Err(SchedulerError::ReplyDropped)),
		}
	}

	/// Runs `unit` on the worker and blocks the calling thread for its result.
	///
	/// On the worker thread itself this runs inline. Elsewhere it must not be
	/// called from within an async context.
	pub fn run_blocking<F, T>(&self, unit: F) -> Result<T, SchedulerError>
	where
		F: FnOnce(&dyn Runspace) -> T + Send + 'static,
		T: Send + 'static,
	{
		match self.dispatch(unit) {
			Dispatch::Inline(result) => result,
			Dispatch::Queued(reply) => reply.blocking_recv().unwrap_or(Err(SchedulerError::ReplyDropped)),
		}
	}

	fn dispatch<F, T>(&self, unit: F) -> Dispatch<T>
	where
		F: FnOnce(&dyn Runspace) -> T + Send + 'static,
		T: Send + 'static,
	{
		if let Some(runspace) = self.worker_runspace() {
			tracing::trace!(scheduler = self.id, "background unit running inline");
			return Dispatch::Inline(run_unit(unit, &*runspace));
		}

		let (reply_tx, reply_rx) = oneshot::channel();
		let job = Job::Run {
			unit: Box::new(move |runspace| {
				let _ = reply_tx.send(run_unit(unit, runspace));
			}),
			span: tracing::Span::current(),
		};
		match self.tx.send(job) {
			Ok(()) => Dispatch::Queued(reply_rx),
			Err(_) => Dispatch::Inline(Err(SchedulerError::Shutdown)),
		}
	}

	fn worker_runspace(&self) -> Option<Arc<dyn Runspace>> {
		CURRENT_WORKER.with(|slot| {
			slot.borrow()
				.as_ref()
				.filter(|worker| worker.scheduler_id == self.id)
				.map(|worker| Arc::clone(&worker.runspace))
		})
	}
}

fn run_unit<F, T>(unit: F, runspace: &dyn Runspace) -> Result<T, SchedulerError>
where
	F: FnOnce(&dyn Runspace) -> T,
{
	catch_unwind(AssertUnwindSafe(|| unit(runspace))).map_err(|payload| {
		let message = panic_message(&*payload);
		tracing::error!(%message, "background unit of work panicked");
		SchedulerError::Panicked(message)
	})
}

struct ClearWorkerSlot;

impl Drop for ClearWorkerSlot {
	fn drop(&mut self) {
		CURRENT_WORKER.with(|slot| slot.borrow_mut().take());
	}
}

fn drain(id: u64, runspace: Arc<dyn Runspace>, rx: mpsc::Receiver<Job>) {
	CURRENT_WORKER.with(|slot| {
		*slot.borrow_mut() = Some(WorkerSlot {
			scheduler_id: id,
			runspace: Arc::clone(&runspace),
		});
	});
	let _clear = ClearWorkerSlot;

	while let Ok(job) = rx.recv() {
		match job {
			Job::Run { unit, span } => {
				let _guard = span.enter();
				unit(&*runspace);
			}
			Job::Shutdown { ack } => {
				let _ = ack.send(());
				break;
			}
		}
	}
	tracing::debug!(scheduler = id, "background runspace thread exiting");
}

impl Drop for BackgroundTaskScheduler {
	fn drop(&mut self) {
		if !self.is_owner {
			return;
		}

		let (ack_tx, mut ack_rx) = oneshot::channel();
		if self.tx.send(Job::Shutdown { ack: ack_tx }).is_err() {
			return;
		}
		if self.is_worker_thread() {
			return;
		}

		let deadline = Instant::now() + SHUTDOWN_ACK_TIMEOUT;
		loop {
			match ack_rx.try_recv() {
				Ok(()) => return,
				Err(TryRecvError::Empty) => {
					if Instant::now() >= deadline {
						return;
					}
					thread::yield_now();
				}
				Err(TryRecvError::Closed) => return,
			}
		}
	}
}
