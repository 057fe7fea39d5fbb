//! Runs commands from inside the engine's idle notification.
//!
//! While the native line editor blocks on the main execution path, nothing
//! else can run there. The engine still fires idle notifications on that
//! path, so commands are parked here as a single pending request and picked
//! up by the next notification, which runs them in a temporary nested frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use shellhost_engine::{CancellationToken, Command, Console, EngineError, ErrorSink, ExecutionOptions, IdleHandler};

use crate::prompt_nest::{FrameGuard, PromptNest};
use crate::request::{ExecutionResult, PipelineExecutionRequest};

struct QueueInner {
	nest: Arc<PromptNest>,
	console: Arc<dyn Console>,
	pending: Mutex<Option<PipelineExecutionRequest>>,
	/// FIFO gate; at most one caller has a request installed at a time.
	turn: tokio::sync::Mutex<()>,
	next_id: AtomicU64,
}

/// Single-slot queue of commands awaiting an idle notification.
#[derive(Clone)]
pub struct InvocationEventQueue {
	inner: Arc<QueueInner>,
}

impl InvocationEventQueue {
	/// Creates the queue and subscribes it to the engine's idle event.
	pub fn new(nest: Arc<PromptNest>, console: Arc<dyn Console>) -> Result<Self, EngineError> {
		let inner = Arc::new(QueueInner {
			nest,
			console,
			pending: Mutex::new(None),
			turn: tokio::sync::Mutex::new(()),
			next_id: AtomicU64::new(1),
		});
		let subscriber = Arc::new(IdleSubscriber {
			inner: Arc::downgrade(&inner),
		});
		inner.nest.runspace().subscribe_idle(subscriber)?;
		Ok(Self { inner })
	}

	/// Parks `command` until the next idle notification and waits for it.
	///
	/// Calls are serialized: a second caller waits for the first request to
	/// complete before installing its own. Dropping the returned future
	/// withdraws the request if the engine has not picked it up yet.
	pub async fn execute_on_idle(&self, command: Command, errors: ErrorSink, options: ExecutionOptions) -> ExecutionResult {
		let _turn = self.inner.turn.lock().await;
		let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
		tracing::debug!(request = id, %command, "queued for idle execution");

		let (request, pending) = PipelineExecutionRequest::new(id, command, errors, options);
		*self.inner.pending.lock() = Some(request);
		let _withdraw = Withdraw { inner: &self.inner, id };
		pending.wait().await
	}

	pub fn has_pending(&self) -> bool {
		self.inner.pending.lock().is_some()
	}
}

/// Removes an unserved request when its caller goes away.
struct Withdraw<'a> {
	inner: &'a QueueInner,
	id: u64,
}

impl Drop for Withdraw<'_> {
	fn drop(&mut self) {
		let mut pending = self.inner.pending.lock();
		if pending.as_ref().is_some_and(|request| request.id() == self.id) {
			tracing::debug!(request = self.id, "withdrew unserved idle request");
			pending.take();
		}
	}
}

impl QueueInner {
	fn on_idle(&self) {
		if self.pending.lock().is_none() || self.console.key_available() {
			return;
		}
		let Some(request) = self.pending.lock().take() else {
			return;
		};

		let span = tracing::debug_span!("idle_request", request = request.id(), command = %request.command());
		let _enter = span.enter();

		let (handle, shared) = match self.nest.push_leased_frame(false) {
			Ok(leased) => leased,
			Err(error) => {
				tracing::error!(%error, "could not open a frame for idle execution");
				request.complete(Err(error.into()));
				return;
			}
		};
		let _frame = FrameGuard::new(&self.nest);

		let mut pipeline = shared.lock();
		request.run(pipeline.as_mut(), &CancellationToken::new());
		drop(pipeline);
		drop(handle);
		tracing::trace!("idle request finished");
	}
}

struct IdleSubscriber {
	inner: Weak<QueueInner>,
}

impl IdleHandler for IdleSubscriber {
	fn on_idle(&self) {
		if let Some(inner) = self.inner.upgrade() {
			inner.on_idle();
		}
	}

	fn on_unsubscribed(self: Arc<Self>) {
		let Some(inner) = self.inner.upgrade() else {
			return;
		};
		tracing::debug!("idle subscription torn down; resubscribing");
		if let Err(error) = inner.nest.runspace().subscribe_idle(self) {
			tracing::error!(%error, "failed to resubscribe to idle notifications");
		}
	}
}
