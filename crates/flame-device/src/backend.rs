//! The backend capability: a bounded set of operations an implementer
//! supplies so the engine can drive a flame without knowing whether it is
//! talking to a GPU, another accelerator, or the host CPU fallback.

use flame_core::{Flame, Settings};

use crate::error::DeviceError;

/// A 32-bit ARGB raster, `width * height` pixels, row-major, matching the
/// final image contract: `(A<<24)|(R<<16)|(G<<8)|B`.
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl Raster {
    pub fn blank(width: u32, height: u32) -> Self {
        Raster { width, height, pixels: vec![0; (width as usize) * (height as usize)] }
    }
}

/// One plot batch's raw, possibly-wrapped 32-bit hit counters, read back
/// from the device exactly as the kernel left them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCounters {
    pub total_hits: i32,
    pub pixel_hits: i32,
}

/// The rendering capability a device-resource manager exposes to the
/// per-flame driver. One backend instance is shared by every flame an
/// engine renders in its lifetime; `init_resources`/`free_resources`
/// bracket the worker thread's whole run, the rest is called once per
/// flame.
pub trait RenderBackend: Send {
    /// Called once when the worker thread starts.
    fn init_resources(&mut self) -> Result<(), DeviceError>;

    /// Called once when the worker thread is about to exit. Must be
    /// idempotent: calling it again after resources are already freed is a
    /// no-op, never an error.
    fn free_resources(&mut self) -> Result<(), DeviceError>;

    /// Ensure a compiled program matching `flame`'s variation set is
    /// current, and grow any buffer whose required capacity exceeds its
    /// current capacity, re-binding kernel arguments for every grown role.
    fn prepare(&mut self, settings: &Settings, flame: &Flame) -> Result<(), DeviceError>;

    /// Launch the init kernel: seed RNG state and points.
    fn launch_init(&mut self) -> Result<(), DeviceError>;

    /// Launch the warmup kernel: discard a fixed number of iterations per
    /// work item so the orbit approaches the attractor.
    fn launch_warmup(&mut self) -> Result<(), DeviceError>;

    /// Launch the plot kernel for `batch_size` iterations per work item,
    /// blocking until device completion, and read back the raw hit
    /// counters (still possibly 32-bit-wrapped; the driver applies the
    /// overflow discipline).
    fn launch_plot(&mut self, batch_size: u32) -> Result<BatchCounters, DeviceError>;

    /// Launch the preview kernel (no finalization blur) and read back the
    /// raster.
    fn launch_preview(&mut self) -> Result<Raster, DeviceError>;

    /// Launch the finalization pass: finish-kernel-1 (tone map to float
    /// pre-raster) then, if `settings.use_blur()`, finish-kernel-2
    /// (density-adaptive box blur); otherwise equivalent to
    /// `launch_preview`.
    fn launch_finish(&mut self, settings: &Settings) -> Result<Raster, DeviceError>;
}
