//! Stack of nested prompt frames and the handle leases that guard them.
//!
//! The bottom frame always exists and owns the main pipeline. Every nested
//! prompt (explicit or debugger stop) pushes a frame with its own pipeline
//! and its own one-ticket queue, so commands issued at the nested prompt
//! never wait on the suspended outer pipeline. A separate read-line frame
//! serves the interactive reader while no nested prompt is active.

use std::sync::Arc;

use parking_lot::Mutex;
use shellhost_engine::{EngineError, Pipeline, PipelineMode, Runspace};

use crate::handle_queue::{HandleQueue, Lease};

/// A pipeline shared between the nest and whoever holds its lease.
pub type SharedPipeline = Arc<Mutex<Box<dyn Pipeline>>>;

/// One level of prompt nesting.
pub struct NestFrame {
	pipeline: SharedPipeline,
	queue: Arc<HandleQueue>,
	is_debugger: bool,
}

impl NestFrame {
	fn new(pipeline: Box<dyn Pipeline>, name: &'static str, is_debugger: bool) -> Self {
		Self {
			pipeline: Arc::new(Mutex::new(pipeline)),
			queue: Arc::new(HandleQueue::new(name)),
			is_debugger,
		}
	}

	pub fn pipeline(&self) -> &SharedPipeline {
		&self.pipeline
	}

	pub fn queue(&self) -> &Arc<HandleQueue> {
		&self.queue
	}

	pub fn is_debugger(&self) -> bool {
		self.is_debugger
	}
}

struct Frames {
	bottom: Arc<NestFrame>,
	nested: Vec<Arc<NestFrame>>,
}

impl Frames {
	fn top(&self) -> &Arc<NestFrame> {
		self.nested.last().unwrap_or(&self.bottom)
	}
}

/// Exclusive right to run on one pipeline.
///
/// A read-line handle acquired in-process also holds the main handle of the
/// frame it was taken from. Dropping the handle releases both, read-line
/// first, each into the queue it came from.
pub struct RunspaceHandle {
	lease: Lease,
	main: Option<Lease>,
	is_read_line: bool,
}

impl RunspaceHandle {
	pub fn is_read_line(&self) -> bool {
		self.is_read_line
	}

	/// Returns true when this handle also holds a main-pipeline lease.
	pub fn holds_main(&self) -> bool {
		!self.is_read_line || self.main.is_some()
	}

	pub fn release(self) {}
}

impl std::fmt::Debug for RunspaceHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RunspaceHandle")
			.field("queue", &self.lease.queue().name())
			.field("holds_main", &self.holds_main())
			.field("is_read_line", &self.is_read_line)
			.finish()
	}
}

/// Prompt frame stack for one interpreter instance.
pub struct PromptNest {
	runspace: Arc<dyn Runspace>,
	frames: Mutex<Frames>,
	read_line: Arc<NestFrame>,
}

impl PromptNest {
	/// Creates the bottom frame and the read-line frame.
	pub fn new(runspace: Arc<dyn Runspace>) -> Result<Self, EngineError> {
		let main = runspace.create_pipeline(PipelineMode::Current)?;
		let read_line = runspace.create_pipeline(PipelineMode::Current)?;
		Ok(Self {
			runspace,
			frames: Mutex::new(Frames {
				bottom: Arc::new(NestFrame::new(main, "main", false)),
				nested: Vec::new(),
			}),
			read_line: Arc::new(NestFrame::new(read_line, "read-line", false)),
		})
	}

	pub fn runspace(&self) -> &Arc<dyn Runspace> {
		&self.runspace
	}

	/// Pushes a frame with a fresh nested pipeline and returns the new level.
	pub fn push_frame(&self, is_debugger: bool) -> Result<usize, EngineError> {
		let frame = self.new_nested_frame(is_debugger)?;
		let mut frames = self.frames.lock();
		frames.nested.push(frame);
		let level = frames.nested.len() + 1;
		tracing::debug!(level, is_debugger, "pushed prompt frame");
		Ok(level)
	}

	/// Pushes a frame and leases its main handle before any other caller can
	/// observe the frame. Returns the lease and the frame's pipeline.
	pub fn push_leased_frame(&self, is_debugger: bool) -> Result<(RunspaceHandle, SharedPipeline), EngineError> {
		let frame = self.new_nested_frame(is_debugger)?;
		let mut frames = self.frames.lock();
		let Some(lease) = Lease::try_acquire(Arc::clone(frame.queue())) else {
			return Err(EngineError::Pipeline("new prompt frame has no free handle".to_string()));
		};
		let pipeline = Arc::clone(&frame.pipeline);
		frames.nested.push(frame);
		tracing::debug!(level = frames.nested.len() + 1, is_debugger, "pushed leased prompt frame");
		let handle = RunspaceHandle {
			lease,
			main: None,
			is_read_line: false,
		};
		Ok((handle, pipeline))
	}

	fn new_nested_frame(&self, is_debugger: bool) -> Result<Arc<NestFrame>, EngineError> {
		let pipeline = self.runspace.create_pipeline(PipelineMode::Nested)?;
		Ok(Arc::new(NestFrame::new(pipeline, "nested", is_debugger)))
	}

	/// Pops the top frame. The bottom frame is never popped.
	///
	/// Returns false when already at level one.
	pub fn pop_frame(&self) -> bool {
		let mut frames = self.frames.lock();
		match frames.nested.pop() {
			Some(frame) => {
				tracing::debug!(level = frames.nested.len() + 1, was_debugger = frame.is_debugger, "popped prompt frame");
				true
			}
			None => {
				tracing::trace!("pop at bottom prompt frame ignored");
				false
			}
		}
	}

	/// Current depth; always at least one.
	pub fn nested_prompt_level(&self) -> usize {
		self.frames.lock().nested.len() + 1
	}

	pub fn is_in_debugger(&self) -> bool {
		self.frames.lock().top().is_debugger
	}

	fn top(&self) -> Arc<NestFrame> {
		Arc::clone(self.frames.lock().top())
	}

	/// Pipeline the next command should run on.
	///
	/// Read-lines use the dedicated read-line pipeline only at level one;
	/// inside a nested prompt they run on the top frame.
	pub fn current_pipeline(&self, is_read_line: bool) -> SharedPipeline {
		let frames = self.frames.lock();
		if is_read_line && frames.nested.is_empty() {
			return Arc::clone(&self.read_line.pipeline);
		}
		Arc::clone(&frames.top().pipeline)
	}

	/// Waits for exclusive use of the pipeline a command should run on.
	///
	/// In-process, a read-line first takes the top frame's main handle and
	/// then the read-line handle, so interactive input and command execution
	/// never overlap. Out-of-process, a read-line takes only its own handle.
	pub async fn acquire_handle(&self, is_read_line: bool) -> RunspaceHandle {
		if !is_read_line {
			let lease = Lease::acquire(Arc::clone(&self.top().queue)).await;
			return RunspaceHandle {
				lease,
				main: None,
				is_read_line,
			};
		}

		let main = if self.runspace.location().is_in_process() {
			Some(Lease::acquire(Arc::clone(&self.top().queue)).await)
		} else {
			None
		};
		let lease = Lease::acquire(Arc::clone(&self.read_line.queue)).await;
		RunspaceHandle { lease, main, is_read_line }
	}

	/// Returns a handle to the queue it came from.
	pub fn release_handle(&self, handle: RunspaceHandle) {
		tracing::trace!(?handle, "releasing runspace handle");
		handle.release();
	}

	/// True when the top frame is leased or its pipeline is running.
	pub fn is_main_busy(&self) -> bool {
		let top = self.top();
		if top.queue.is_leased() {
			return true;
		}
		top.pipeline.try_lock().is_none_or(|pipeline| pipeline.is_running())
	}

	pub fn is_read_line_busy(&self) -> bool {
		self.read_line.queue.is_leased()
	}
}

/// Pops the frame it was created for when dropped.
pub(crate) struct FrameGuard<'a> {
	nest: &'a PromptNest,
}

impl<'a> FrameGuard<'a> {
	pub(crate) fn new(nest: &'a PromptNest) -> Self {
		Self { nest }
	}
}

impl Drop for FrameGuard<'_> {
	fn drop(&mut self) {
		self.nest.pop_frame();
	}
}
