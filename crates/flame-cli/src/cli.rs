use std::path::PathBuf;

use clap::Parser;

/// Render one or more fractal flames on the host engine and write the
/// final raster of each to a PNG.
#[derive(Debug, Clone, Parser)]
#[command(name = "flame-cli", version, about = "Flame rendering engine demo/bench CLI")]
pub struct Cli {
    /// Output raster width in pixels.
    #[arg(long, env = "FLAME_WIDTH", default_value_t = 1280)]
    pub width: u32,

    /// Output raster height in pixels.
    #[arg(long, env = "FLAME_HEIGHT", default_value_t = 720)]
    pub height: u32,

    /// Wall-clock budget per flame, in seconds.
    #[arg(long, env = "FLAME_MAX_TIME", default_value_t = 10.0)]
    pub max_time: f64,

    /// Target quality (mean samples per hit pixel) per flame.
    #[arg(long, env = "FLAME_MAX_QUALITY", default_value_t = 64.0)]
    pub max_quality: f64,

    /// Apply the density-adaptive box blur during finalization.
    #[arg(long, env = "FLAME_BLUR", default_value_t = false)]
    pub blur: bool,

    #[arg(long, env = "FLAME_BLUR_ALPHA", default_value_t = 0.4)]
    pub blur_alpha: f64,

    #[arg(long, env = "FLAME_BLUR_MIN_RADIUS", default_value_t = 0.0)]
    pub blur_min_radius: f64,

    #[arg(long, env = "FLAME_BLUR_MAX_RADIUS", default_value_t = 9.0)]
    pub blur_max_radius: f64,

    /// Progress-callback cadence. 0 disables progress callbacks entirely.
    #[arg(long, env = "FLAME_UPDATES_PER_SEC", default_value_t = 4.0)]
    pub updates_per_sec: f64,

    /// Skip image previews in progress callbacks (counters only).
    #[arg(long, env = "FLAME_NO_UPDATE_IMAGES", default_value_t = false)]
    pub no_update_images: bool,

    /// Disable the adaptive batching controller (batch size pinned to 1).
    #[arg(long, env = "FLAME_NO_BATCH_ACCELERATE", default_value_t = false)]
    pub no_batch_accelerate: bool,

    #[arg(long, env = "FLAME_MAX_BATCH_TIME_SEC", default_value_t = 0.5)]
    pub max_batch_time_sec: f64,

    /// Path to a JSON flame descriptor (array of flames). Falls back to a
    /// built-in three-xform demo flame when omitted.
    #[arg(long, value_name = "PATH")]
    pub flame_file: Option<PathBuf>,

    /// Number of times to repeat the demo flame when `--flame-file` is not
    /// given.
    #[arg(long, default_value_t = 1)]
    pub frames: u32,

    /// Output PNG path. With more than one flame, frame index is inserted
    /// before the extension (e.g. `out-0.png`, `out-1.png`).
    #[arg(long, short = 'o', default_value = "flame.png")]
    pub output: PathBuf,

    /// Render on the GPU backend instead of the deterministic host
    /// fallback. Requires the crate's `gpu` feature.
    #[arg(long, default_value_t = false)]
    pub gpu: bool,
}
