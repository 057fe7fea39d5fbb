//! Exclusive access coordination for a hosted interpreter instance.
//!
//! Only one command may run on a pipeline at a time, yet an interactive
//! session must let an editor run commands while the user sits at a prompt,
//! while the engine is stopped at a breakpoint, or while the native line
//! editor blocks the main execution path.
//!
//! * [`PromptNest`] keeps one frame per nested prompt level, each with its
//!   own pipeline and one-ticket [`HandleQueue`].
//! * [`PipelineExecutor`] leases a [`RunspaceHandle`] for every command and
//!   defers to the [`InvocationEventQueue`] while an in-process read-line
//!   holds the main path.
//! * [`PromptContext`] selects between the engine's line editor and a plain
//!   console reader.
//! * [`RunspaceSession`] wires all of the above to one runspace.

mod config;
mod executor;
mod handle_queue;
mod idle_queue;
mod prompt;
mod prompt_nest;
mod request;
mod session;

pub use config::{BackgroundConfig, ConfigError, ReadLineMode, SessionConfig};
pub use executor::PipelineExecutor;
pub use handle_queue::{AsyncQueue, HandleQueue, HandleTicket, Lease};
pub use idle_queue::InvocationEventQueue;
pub use prompt::{ConsoleReadLine, LegacyReadLineContext, NativeReadLineContext, PromptContext, ReadLineError};
pub use prompt_nest::{NestFrame, PromptNest, RunspaceHandle, SharedPipeline};
pub use request::{ExecutionError, ExecutionResult, PendingExecution, PipelineExecutionRequest};
pub use session::RunspaceSession;
