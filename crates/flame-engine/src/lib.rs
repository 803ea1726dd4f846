//! The render scheduler: task lifecycle, the single worker thread, the
//! per-flame driver, and the adaptive batching controller that sits
//! between them and a [`flame_device::RenderBackend`].

#![deny(unreachable_pub)]

mod api;
mod batching;
mod driver;
mod engine;
mod queue;
mod shutdown;
mod task;
mod worker;

pub use api::{EngineConfig, EngineConfigError, RenderCallback, RenderUpdate};
pub use batching::{BatchingInputs, BatchingState};
pub use engine::{start_engine, Engine, EngineHandle};
pub use queue::TaskQueue;
pub use shutdown::{register_hook, run_hooks, ShutdownHookGuard};
pub use task::{Task, TaskState};
