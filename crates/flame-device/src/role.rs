//! Named buffer roles.
//!
//! Replaces interleaved "grow this index, then remember to re-bind argument
//! 7" bookkeeping with a declarative table: every buffer a kernel argument
//! can reference has one name, and growth always re-binds through that name.

/// One device-allocated buffer's purpose, used both to size it and to find
/// every kernel argument that must be re-bound after it grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferRole {
    RngState,
    Point,
    Color,
    TransformWeight,
    TransformMix,
    TransformPalette,
    TransformAffine,
    VariationCoefficient,
    VariationParameter,
    FlameView,
    FlameColoration,
    FlameBackground,
    Histogram,
    PreRaster,
    FinalRaster,
    HitCounters,
}

impl BufferRole {
    /// All roles, in a stable order, for iterating a full resource set.
    pub const ALL: &'static [BufferRole] = &[
        BufferRole::RngState,
        BufferRole::Point,
        BufferRole::Color,
        BufferRole::TransformWeight,
        BufferRole::TransformMix,
        BufferRole::TransformPalette,
        BufferRole::TransformAffine,
        BufferRole::VariationCoefficient,
        BufferRole::VariationParameter,
        BufferRole::FlameView,
        BufferRole::FlameColoration,
        BufferRole::FlameBackground,
        BufferRole::Histogram,
        BufferRole::PreRaster,
        BufferRole::FinalRaster,
        BufferRole::HitCounters,
    ];
}
