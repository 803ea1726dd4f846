//! Public engine configuration, callback, and update surface.

use std::sync::Arc;

use flame_device::{DeviceError, Raster};
use thiserror::Error;

use crate::task::Task;

/// Engine scheduling configuration: update cadence and batch-acceleration
/// policy. Distinct from [`flame_core::Settings`], which configures one
/// render rather than the scheduler driving it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub updates_per_sec: f64,
    pub update_images: bool,
    pub batch_accelerated: bool,
    pub max_batch_time_sec: f64,
}

impl EngineConfig {
    pub const DEFAULT_UPDATES_PER_SEC: f64 = 4.0;
    pub const DEFAULT_UPDATE_IMAGES: bool = true;
    pub const DEFAULT_BATCH_ACCELERATED: bool = true;
    pub const DEFAULT_MAX_BATCH_TIME_SEC: f64 = 0.5;
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            updates_per_sec: Self::DEFAULT_UPDATES_PER_SEC,
            update_images: Self::DEFAULT_UPDATE_IMAGES,
            batch_accelerated: Self::DEFAULT_BATCH_ACCELERATED,
            max_batch_time_sec: Self::DEFAULT_MAX_BATCH_TIME_SEC,
        }
    }
}

/// A rejected engine configuration setter.
#[derive(Debug, Error, PartialEq)]
pub enum EngineConfigError {
    #[error("updatesPerSec must be >= 0 (got {0})")]
    UpdatesPerSec(f64),
    #[error("maxBatchTimeSec must be >= 0 (got {0})")]
    MaxBatchTimeSec(f64),
}

/// One callback invocation: a progress update (`is_finished = false`) or
/// the terminal update for a flame (`is_finished = true`, at most one per
/// flame). `image` is `None` for no-image progress updates.
pub struct RenderUpdate<'a> {
    pub flame_index: u64,
    pub image: Option<&'a Raster>,
    pub quality: f64,
    pub points_plotted: u64,
    pub elapsed_seconds: f64,
    pub is_finished: bool,
}

/// The client capability the worker thread invokes. Implementations must
/// not block, since the worker thread makes no further progress until the
/// call returns. Both hooks receive the task handle so the callback can
/// inspect or cancel it.
pub trait RenderCallback: Send + Sync {
    fn on_update(&self, task: &Arc<Task>, update: RenderUpdate<'_>);

    /// A device error fatal to the current flame. The engine does not retry
    /// or cancel on the caller's behalf — the callback is expected to call
    /// `task.cancel(true)` from here if it wants the task to stop.
    fn on_device_error(&self, task: &Arc<Task>, flame_index: u64, error: &DeviceError);
}
