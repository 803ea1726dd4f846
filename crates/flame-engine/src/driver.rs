//! Per-flame driver (C7): init → warmup → adaptive plotting loop →
//! finalize, emitting progress and final callbacks.

use std::sync::Arc;
use std::time::Instant;

use flame_core::Flame;
use flame_device::{DeviceError, RenderBackend};

use crate::api::{RenderCallback, RenderUpdate};
use crate::batching::BatchingState;
use crate::engine::Engine;
use crate::task::Task;

/// First image preview is suppressed before this many completed
/// iterations, to skip the visible warmup-adjacent artifacts of the very
/// first plot batch. See DESIGN.md for why 20 was chosen.
const MIN_ITERATIONS_BEFORE_IMAGE_PREVIEW: u64 = 20;

/// Drive one flame to completion (or cancellation). `flame_index` is this
/// flame's position in the task's sequence, surfaced to the callback.
pub(crate) fn drive_flame<B: RenderBackend>(
    engine: &Engine<B>,
    task: &Arc<Task>,
    flame: Flame,
    flame_index: u64,
) -> Result<(), DeviceError> {
    let settings = task.settings().clone();
    let callback = task.callback().clone();

    let mut backend = engine.backend.lock().expect("backend poisoned");

    backend.prepare(&settings, &flame)?;
    backend.launch_init()?;
    backend.launch_warmup()?;

    let start = Instant::now();
    let mut last_update = Instant::now();
    let mut batching = BatchingState::new();

    let mut acc_total_hits: u64 = 0;
    let mut acc_pixel_hits: u64 = 0;
    let mut points_plotted: u64 = 0;
    let mut quality: f64 = 0.0;
    let mut last_delta_t: f64 = 0.0;
    let mut last_delta_q: f64 = 0.0;

    loop {
        let elapsed = start.elapsed().as_secs_f64();
        if quality >= settings.max_quality() || elapsed >= settings.max_time() {
            break;
        }

        let cadence = engine.updates_per_sec();
        let due_for_update = cadence > 0.0 && last_update.elapsed().as_secs_f64() >= 1.0 / cadence;
        let cancelled = task.is_cancelled();

        if cancelled && !due_for_update {
            break;
        }

        if due_for_update {
            let emitted_image = engine.update_images() && points_plotted >= MIN_ITERATIONS_BEFORE_IMAGE_PREVIEW;
            if emitted_image {
                let raster = backend.launch_preview()?;
                callback.on_update(task, RenderUpdate {
                    flame_index,
                    image: Some(&raster),
                    quality,
                    points_plotted,
                    elapsed_seconds: elapsed,
                    is_finished: false,
                });
            } else {
                callback.on_update(task, RenderUpdate {
                    flame_index,
                    image: None,
                    quality,
                    points_plotted,
                    elapsed_seconds: elapsed,
                    is_finished: false,
                });
            }
            last_update = Instant::now();

            if cancelled {
                return Ok(());
            }
        }

        let batch_start = Instant::now();
        let counters = backend.launch_plot(batching.batch_size())?;
        let delta_t = batch_start.elapsed().as_secs_f64().max(f64::EPSILON);

        let (batch_total_hits, batch_pixel_hits) = if counters.total_hits < 0 {
            acc_total_hits += counters.total_hits as u32 as u64;
            acc_pixel_hits += counters.pixel_hits.max(0) as u32 as u64;
            (0u64, 0u64)
        } else {
            (counters.total_hits as u64, counters.pixel_hits.max(0) as u64)
        };

        let denom = acc_pixel_hits + batch_pixel_hits;
        let new_quality = if denom == 0 {
            0.0
        } else {
            (acc_total_hits + batch_total_hits) as f64 / denom as f64
        };
        last_delta_q = (new_quality - quality).max(0.0);
        last_delta_t = delta_t;
        quality = new_quality;

        // `acc_total_hits + batch_total_hits` is already the flame's true
        // cumulative sample count (the same numerator quality uses), not
        // just this batch's contribution — use it directly rather than
        // re-deriving it from `batch_size`, which undercounts by the
        // backend's work-item count.
        points_plotted = acc_total_hits + batch_total_hits;

        if engine.batch_accelerated() {
            let elapsed_now = start.elapsed().as_secs_f64();
            batching.advance(
                &engine.batching_inputs(),
                last_delta_t,
                last_delta_q,
                quality,
                settings.max_quality(),
                elapsed_now,
                settings.max_time(),
            );
        }
    }

    if !task.is_cancelled() {
        let raster = backend.launch_finish(&settings)?;
        callback.on_update(task, RenderUpdate {
            flame_index,
            image: Some(&raster),
            quality,
            points_plotted,
            elapsed_seconds: start.elapsed().as_secs_f64(),
            is_finished: true,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EngineConfig;
    use crate::engine::start_engine;
    use flame_core::{Affine, VariationKind, Variation, VecFlameSource, XForm};
    use flame_device::CpuBackend;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingCallback {
        finals: AtomicU64,
        updates: AtomicU64,
        last_quality: Mutex<f64>,
    }

    impl RenderCallback for RecordingCallback {
        fn on_update(&self, _task: &Arc<Task>, update: RenderUpdate<'_>) {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if update.is_finished {
                self.finals.fetch_add(1, Ordering::SeqCst);
            }
            *self.last_quality.lock().unwrap() = update.quality;
        }
        fn on_device_error(&self, _task: &Arc<Task>, _flame_index: u64, _error: &DeviceError) {}
    }

    fn trivial_flame() -> Flame {
        Flame {
            xforms: vec![XForm {
                weight: 1.0,
                affine: Affine::IDENTITY,
                color_index: 0.0,
                variations: vec![Variation { kind: VariationKind::Linear, weight: 1.0 }],
                post_affine: None,
            }],
            final_xform: None,
            view: Affine::IDENTITY,
            background: [0.0; 3],
        }
    }

    #[test]
    fn trivial_completion_emits_one_final_callback() {
        let settings = Arc::new(
            Settings::builder().width(4).height(4).max_time(60.0).max_quality(1.0).build().unwrap(),
        );
        let callback = Arc::new(RecordingCallback::default());
        let task = Task::new(settings, Box::new(VecFlameSource::new(vec![trivial_flame()])), callback.clone());

        let engine = start_engine(EngineConfig::default(), CpuBackend::new());
        engine.queue().push(task.clone());

        assert!(task.await_termination_timeout(Duration::from_secs(5)));
        assert_eq!(callback.finals.load(Ordering::SeqCst), 1);
        assert!(*callback.last_quality.lock().unwrap() >= 1.0);

        engine.shutdown();
        engine.await_termination(Duration::from_secs(2));
    }
}
