//! Device resource manager: lazy allocation, growth and release of
//! per-flame compute buffers, and the program/kernel cache keyed by
//! variation set, behind a backend capability that can be a real
//! accelerator or the deterministic host fallback.
#![deny(unreachable_pub)]

pub mod backend;
pub mod cpu;
pub mod error;
pub mod program;
pub mod resources;
pub mod role;
mod templates;

#[cfg(feature = "gpu")]
pub mod wgpu_backend;

pub use backend::{BatchCounters, Raster, RenderBackend};
pub use cpu::CpuBackend;
pub use error::DeviceError;
pub use role::BufferRole;

#[cfg(feature = "gpu")]
pub use wgpu_backend::WgpuBackend;
