//! Engine lifecycle (C4): ready → running → shutdown/shutdownNow →
//! terminated, driven by a single dedicated worker thread
//! (one `std::thread`, not a pool — the engine never runs two flames
//! concurrently).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use flame_device::RenderBackend;

use crate::api::{EngineConfig, EngineConfigError};
use crate::batching::BatchingInputs;
use crate::queue::TaskQueue;
use crate::shutdown::ShutdownHookGuard;
use crate::task::Task;
use crate::worker;

const READY: u8 = 0;
const RUNNING: u8 = 1;
const SHUTDOWN: u8 = 2;
const SHUTDOWN_NOW: u8 = 3;
const TERMINATED: u8 = 4;

pub(crate) struct ConfigState {
    pub updates_per_sec: f64,
    pub update_images: bool,
    pub batch_accelerated: bool,
    pub max_batch_time_sec: f64,
}

impl From<EngineConfig> for ConfigState {
    fn from(c: EngineConfig) -> Self {
        ConfigState {
            updates_per_sec: c.updates_per_sec,
            update_images: c.update_images,
            batch_accelerated: c.batch_accelerated,
            max_batch_time_sec: c.max_batch_time_sec,
        }
    }
}

/// The engine's lifecycle state machine, its task queue, and the single
/// worker thread driving it. `B` is the device backend capability
/// (`flame_device::RenderBackend`), shared exclusively by the worker
/// thread once running.
pub struct Engine<B: RenderBackend + 'static> {
    state: AtomicU8,
    queue: TaskQueue,
    pub(crate) current_task: Mutex<Option<Arc<Task>>>,
    term_lock: Mutex<()>,
    term_cvar: Condvar,
    pub(crate) config: Mutex<ConfigState>,
    pub(crate) backend: Mutex<B>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pub(crate) shutdown_hook: Mutex<Option<ShutdownHookGuard>>,
}

/// A shared handle to a running (or not-yet-started) engine.
pub type EngineHandle<B> = Arc<Engine<B>>;

impl<B: RenderBackend + 'static> Engine<B> {
    pub fn new(config: EngineConfig, backend: B) -> Arc<Self> {
        Arc::new(Engine {
            state: AtomicU8::new(READY),
            queue: TaskQueue::new(),
            current_task: Mutex::new(None),
            term_lock: Mutex::new(()),
            term_cvar: Condvar::new(),
            config: Mutex::new(config.into()),
            backend: Mutex::new(backend),
            worker: Mutex::new(None),
            shutdown_hook: Mutex::new(None),
        })
    }

    /// READY → RUNNING: starts the single worker thread. Returns true iff
    /// the previous state was READY.
    pub fn start(self: &Arc<Self>) -> bool {
        let won = self
            .state
            .compare_exchange(READY, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            let engine = self.clone();
            let handle = std::thread::spawn(move || worker::run(engine));
            *self.worker.lock().expect("worker slot poisoned") = Some(handle);
        }
        won
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn current_task(&self) -> Option<Arc<Task>> {
        self.current_task.lock().expect("current task poisoned").clone()
    }

    /// RUNNING → SHUTDOWN: the worker drains the queue, then exits.
    pub fn shutdown(&self) -> bool {
        self.state.compare_exchange(RUNNING, SHUTDOWN, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// RUNNING|SHUTDOWN → SHUTDOWN_NOW: force-cancels the current task and
    /// tells the worker to skip the rest of the queue.
    pub fn shutdown_now(&self) -> bool {
        let won = self
            .state
            .compare_exchange(RUNNING, SHUTDOWN_NOW, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            || self
                .state
                .compare_exchange(SHUTDOWN, SHUTDOWN_NOW, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
        if won {
            if let Some(task) = self.current_task() {
                task.cancel(true);
            }
        }
        won
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self.state.load(Ordering::Acquire), SHUTDOWN | SHUTDOWN_NOW)
    }

    pub fn is_terminated(&self) -> bool {
        self.state.load(Ordering::Acquire) == TERMINATED
    }

    /// Block until terminated or `timeout` elapses. Returns true iff
    /// termination occurred before the deadline.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        if self.is_terminated() {
            return true;
        }
        let guard = self.term_lock.lock().expect("term lock poisoned");
        let (_guard, result) = self
            .term_cvar
            .wait_timeout_while(guard, timeout, |_| !self.is_terminated())
            .expect("term lock poisoned");
        !result.timed_out()
    }

    pub(crate) fn mark_terminated(&self) {
        self.state.store(TERMINATED, Ordering::Release);
        let _guard = self.term_lock.lock().expect("term lock poisoned");
        self.term_cvar.notify_all();
    }

    pub(crate) fn should_stop_draining(&self) -> bool {
        let state = self.state.load(Ordering::Acquire);
        state == SHUTDOWN_NOW || (state == SHUTDOWN && self.queue.is_empty())
    }

    pub(crate) fn is_shutdown_now(&self) -> bool {
        self.state.load(Ordering::Acquire) == SHUTDOWN_NOW
    }

    pub fn updates_per_sec(&self) -> f64 {
        self.config.lock().expect("config poisoned").updates_per_sec
    }

    pub fn set_updates_per_sec(&self, v: f64) -> Result<(), EngineConfigError> {
        if v < 0.0 {
            return Err(EngineConfigError::UpdatesPerSec(v));
        }
        self.config.lock().expect("config poisoned").updates_per_sec = v;
        Ok(())
    }

    pub fn update_images(&self) -> bool {
        self.config.lock().expect("config poisoned").update_images
    }

    pub fn set_update_images(&self, v: bool) {
        self.config.lock().expect("config poisoned").update_images = v;
    }

    pub fn batch_accelerated(&self) -> bool {
        self.config.lock().expect("config poisoned").batch_accelerated
    }

    pub fn set_batch_accelerated(&self, v: bool) {
        self.config.lock().expect("config poisoned").batch_accelerated = v;
    }

    pub fn max_batch_time_sec(&self) -> f64 {
        self.config.lock().expect("config poisoned").max_batch_time_sec
    }

    pub fn set_max_batch_time_sec(&self, v: f64) -> Result<(), EngineConfigError> {
        if v < 0.0 {
            return Err(EngineConfigError::MaxBatchTimeSec(v));
        }
        self.config.lock().expect("config poisoned").max_batch_time_sec = v;
        Ok(())
    }

    pub(crate) fn batching_inputs(&self) -> BatchingInputs {
        let cfg = self.config.lock().expect("config poisoned");
        BatchingInputs {
            updates_per_sec: cfg.updates_per_sec,
            max_batch_time_sec: cfg.max_batch_time_sec,
            batch_accelerated: cfg.batch_accelerated,
        }
    }
}

/// Construct an engine and immediately start its worker thread, mirroring
/// the ergonomic one-call startup of the pattern this crate's worker loop
/// is grounded on.
pub fn start_engine<B: RenderBackend + 'static>(config: EngineConfig, backend: B) -> EngineHandle<B> {
    let engine = Engine::new(config, backend);
    engine.start();
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RenderCallback, RenderUpdate};
    use flame_core::{Settings, VecFlameSource};
    use flame_device::{CpuBackend, DeviceError};

    struct NullCallback;
    impl RenderCallback for NullCallback {
        fn on_update(&self, _task: &Arc<Task>, _update: RenderUpdate<'_>) {}
        fn on_device_error(&self, _task: &Arc<Task>, _flame_index: u64, _error: &DeviceError) {}
    }

    #[test]
    fn engine_terminates_with_no_tasks_after_shutdown() {
        let engine = start_engine(EngineConfig::default(), CpuBackend::new());
        assert!(engine.is_running());
        assert!(engine.shutdown());
        assert!(engine.await_termination(Duration::from_secs(2)));
        assert!(engine.is_terminated());
    }

    #[test]
    fn shutdown_now_cancels_current_task_slot() {
        let engine = start_engine(EngineConfig::default(), CpuBackend::new());
        let task = Task::new(
            Arc::new(Settings::builder().build().unwrap()),
            Box::new(VecFlameSource::new(vec![])),
            Arc::new(NullCallback),
        );
        engine.queue().push(task);
        assert!(engine.shutdown_now());
        assert!(engine.await_termination(Duration::from_secs(2)));
    }

    #[test]
    fn config_setters_reject_negative_values() {
        let engine = start_engine(EngineConfig::default(), CpuBackend::new());
        assert!(engine.set_updates_per_sec(-1.0).is_err());
        assert!(engine.set_max_batch_time_sec(-1.0).is_err());
        engine.shutdown();
        engine.await_termination(Duration::from_secs(2));
    }
}
