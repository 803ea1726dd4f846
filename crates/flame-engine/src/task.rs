//! Task state machine: an atomic state word plus a condition variable,
//! replacing a hand-rolled synchronizer class. The four states fit in a
//! byte; every transition is a single compare-and-set, and waiters block on
//! a `Condvar` that is signalled whenever the state reaches a terminal
//! value.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use flame_core::{Flame, FlameSource, Settings};

use crate::api::RenderCallback;

const READY: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const CANCELLED: u8 = 3;

/// One task's externally observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Completed,
    Cancelled,
}

fn decode(raw: u8) -> TaskState {
    match raw {
        READY => TaskState::Ready,
        RUNNING => TaskState::Running,
        COMPLETED => TaskState::Completed,
        CANCELLED => TaskState::Cancelled,
        _ => unreachable!("task state byte out of range"),
    }
}

/// A finite sequence of flames plus settings and a callback, carrying its
/// own state machine and termination synchronization.
pub struct Task {
    settings: Arc<Settings>,
    flame_source: Mutex<Box<dyn FlameSource>>,
    callback: Arc<dyn RenderCallback>,
    state: AtomicU8,
    term_lock: Mutex<()>,
    term_cvar: Condvar,
}

impl Task {
    pub fn new(
        settings: Arc<Settings>,
        flame_source: Box<dyn FlameSource>,
        callback: Arc<dyn RenderCallback>,
    ) -> Arc<Task> {
        Arc::new(Task {
            settings,
            flame_source: Mutex::new(flame_source),
            callback,
            state: AtomicU8::new(READY),
            term_lock: Mutex::new(()),
            term_cvar: Condvar::new(),
        })
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn callback(&self) -> &Arc<dyn RenderCallback> {
        &self.callback
    }

    pub fn state(&self) -> TaskState {
        decode(self.state.load(Ordering::Acquire))
    }

    pub fn has_next_flame(&self) -> bool {
        self.flame_source.lock().expect("flame source poisoned").has_next()
    }

    /// Only valid to call when [`Task::has_next_flame`] is true.
    pub fn next_flame(&self) -> Flame {
        self.flame_source.lock().expect("flame source poisoned").next()
    }

    /// READY → RUNNING. Returns true iff the previous state was READY.
    pub fn start(&self) -> bool {
        self.state
            .compare_exchange(READY, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// RUNNING → COMPLETED. Returns true iff the previous state was
    /// RUNNING. Wakes every `await_termination` waiter on success.
    pub fn complete(&self) -> bool {
        let won = self
            .state
            .compare_exchange(RUNNING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.wake_waiters();
        }
        won
    }

    /// Transition any non-terminal state to CANCELLED, subject to:
    /// if `may_cancel_if_started` is false and the state is not READY,
    /// cancellation fails. Converges within two CAS attempts because every
    /// competing transition (`complete`, a racing `cancel`) is terminal.
    pub fn cancel(&self, may_cancel_if_started: bool) -> bool {
        loop {
            let current = self.state.load(Ordering::Acquire);
            match current {
                READY => {}
                RUNNING if may_cancel_if_started => {}
                _ => return false,
            }
            match self.state.compare_exchange(current, CANCELLED, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    self.wake_waiters();
                    return true;
                }
                Err(_) => continue,
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMPLETED
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state.load(Ordering::Acquire), COMPLETED | CANCELLED)
    }

    /// Block the caller until `is_terminated()`.
    pub fn await_termination(&self) {
        if self.is_terminated() {
            return;
        }
        let guard = self.term_lock.lock().expect("term lock poisoned");
        let _ = self
            .term_cvar
            .wait_while(guard, |_| !self.is_terminated())
            .expect("term lock poisoned");
    }

    /// Block until `is_terminated()` or `timeout` elapses. Returns true iff
    /// termination occurred before the deadline.
    pub fn await_termination_timeout(&self, timeout: Duration) -> bool {
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

    fn wake_waiters(&self) {
        let _guard = self.term_lock.lock().expect("term lock poisoned");
        self.term_cvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_core::VecFlameSource;
    use std::sync::Mutex as StdMutex;

    struct NullCallback;
    impl RenderCallback for NullCallback {
        fn on_update(&self, _task: &Arc<Task>, _update: crate::api::RenderUpdate<'_>) {}
        fn on_device_error(&self, _task: &Arc<Task>, _flame_index: u64, _error: &flame_device::DeviceError) {}
    }

    fn empty_task() -> Arc<Task> {
        Task::new(
            Arc::new(Settings::builder().build().unwrap()),
            Box::new(VecFlameSource::new(vec![])),
            Arc::new(NullCallback),
        )
    }

    #[test]
    fn ready_to_running_to_completed() {
        let task = empty_task();
        assert!(task.start());
        assert_eq!(task.state(), TaskState::Running);
        assert!(task.complete());
        assert!(task.is_completed());
        assert!(task.is_terminated());
    }

    #[test]
    fn start_fails_on_precancelled_task() {
        let task = empty_task();
        assert!(task.cancel(false));
        assert!(!task.start());
    }

    #[test]
    fn cancel_false_only_succeeds_in_ready() {
        let task = empty_task();
        assert!(task.start());
        assert!(!task.cancel(false));
        assert!(task.state() == TaskState::Running);
        assert!(task.cancel(true));
        assert!(task.is_cancelled());
    }

    #[test]
    fn only_one_of_concurrent_cancels_wins() {
        let task = empty_task();
        task.start();
        let wins = StdMutex::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if task.cancel(true) {
                        *wins.lock().unwrap() += 1;
                    }
                });
            }
        });
        assert_eq!(*wins.lock().unwrap(), 1);
    }

    #[test]
    fn await_termination_unblocks_after_cancel() {
        let task = empty_task();
        task.start();
        let t2 = task.clone();
        let handle = std::thread::spawn(move || {
            t2.await_termination();
        });
        std::thread::sleep(Duration::from_millis(10));
        task.cancel(true);
        handle.join().unwrap();
    }

    #[test]
    fn await_termination_timeout_reports_deadline() {
        let task = empty_task();
        task.start();
        assert!(!task.await_termination_timeout(Duration::from_millis(20)));
        task.complete();
        assert!(task.await_termination_timeout(Duration::from_millis(20)));
    }
}
