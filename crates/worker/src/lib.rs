//! Worker primitives for the hosted runspace.
//!
//! * [`TaskClass`] tags spawned work for tracing.
//! * [`spawn_blocking`] and [`spawn_named_thread`] route work onto the tokio
//!   blocking pool or dedicated OS threads.
//! * [`BackgroundTaskScheduler`] owns a dedicated interpreter instance on its
//!   own thread and runs submitted units of work against it in order.

mod class;
mod panic;
mod scheduler;
mod spawn;

pub use class::TaskClass;
pub use panic::panic_message;
pub use scheduler::{BackgroundTaskScheduler, SchedulerError, SchedulerOptions};
pub use spawn::{spawn_blocking, spawn_named_thread};
