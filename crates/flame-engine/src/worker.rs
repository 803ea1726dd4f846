//! The single worker loop (C6): register a process-shutdown hook, bring
//! the backend up once, drain tasks from the queue until told to stop,
//! then tear the backend down and mark the engine terminated.

use std::sync::Arc;
use std::time::Duration;

use flame_device::RenderBackend;

use crate::driver;
use crate::engine::Engine;
use crate::shutdown;

/// How long each blocking queue take waits before re-checking engine
/// state. Short enough that `shutdown_now` and `shutdown`-with-empty-queue
/// are noticed promptly, long enough to avoid busy-looping.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) fn run<B: RenderBackend + 'static>(engine: Arc<Engine<B>>) {
    let hook_engine = engine.clone();
    let guard = shutdown::register_hook(Arc::new(move || {
        hook_engine.shutdown_now();
    }));
    *engine.shutdown_hook.lock().expect("shutdown hook slot poisoned") = Some(guard);

    {
        let mut backend = engine.backend.lock().expect("backend poisoned");
        if let Err(err) = backend.init_resources() {
            tracing::error!(?err, "backend failed to initialize resources");
        }
    }

    while !engine.should_stop_draining() {
        let task = match engine.queue().take_timeout(POLL_INTERVAL) {
            Some(task) => task,
            None => continue,
        };

        if !task.start() {
            // Cancelled before the worker could claim it.
            continue;
        }

        *engine.current_task.lock().expect("current task poisoned") = Some(task.clone());

        let mut flame_index: u64 = 0;
        while !task.is_cancelled() && task.has_next_flame() {
            let flame = task.next_flame();
            if let Err(err) = driver::drive_flame(&engine, &task, flame, flame_index) {
                task.callback().on_device_error(&task, flame_index, &err);
                tracing::warn!(?err, flame_index, "device error while driving flame");
                break;
            }
            flame_index += 1;
        }

        task.complete();
        *engine.current_task.lock().expect("current task poisoned") = None;
    }

    {
        let mut backend = engine.backend.lock().expect("backend poisoned");
        if let Err(err) = backend.free_resources() {
            tracing::error!(?err, "backend failed to free resources");
        }
    }

    engine.mark_terminated();
    *engine.shutdown_hook.lock().expect("shutdown hook slot poisoned") = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{EngineConfig, RenderCallback, RenderUpdate};
    use crate::engine::start_engine;
    use crate::task::Task;
    use flame_core::{Settings, VecFlameSource};
    use flame_device::{CpuBackend, DeviceError};

    struct NullCallback;
    impl RenderCallback for NullCallback {
        fn on_update(&self, _task: &Arc<Task>, _update: RenderUpdate<'_>) {}
        fn on_device_error(&self, _task: &Arc<Task>, _flame_index: u64, _error: &DeviceError) {}
    }

    #[test]
    fn queued_task_with_no_flames_completes_without_blocking_shutdown() {
        let engine = start_engine(EngineConfig::default(), CpuBackend::new());
        let task = Task::new(
            Arc::new(Settings::builder().build().unwrap()),
            Box::new(VecFlameSource::new(vec![])),
            Arc::new(NullCallback),
        );
        engine.queue().push(task.clone());
        assert!(task.await_termination_timeout(Duration::from_secs(2)));
        assert!(engine.shutdown());
        assert!(engine.await_termination(Duration::from_secs(2)));
    }

    #[test]
    fn worker_drains_then_terminates_on_shutdown() {
        let engine = start_engine(EngineConfig::default(), CpuBackend::new());
        assert!(engine.queue().is_empty());
        assert!(engine.shutdown());
        assert!(engine.await_termination(Duration::from_secs(2)));
        assert!(engine.is_terminated());
    }
}
