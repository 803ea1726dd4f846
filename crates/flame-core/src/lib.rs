//! Shared data types for the flame rendering engine: validated settings and
//! the opaque flame descriptor model the device and engine crates pass
//! around without interpreting.

pub mod flame;
pub mod settings;

pub use flame::{Affine, Flame, FlameSource, VariationKind, Variation, VecFlameSource, XForm};
pub use settings::{Settings, SettingsBuilder, SettingsError};
