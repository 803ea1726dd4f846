//! Unbounded FIFO between producers and the worker loop.
//!
//! Rust has no portable "interrupt this blocked thread" primitive, so the
//! interruptible blocking take is modeled as a bounded
//! `Condvar::wait_timeout`: the worker loop calls [`TaskQueue::take_timeout`]
//! in a loop and re-checks engine state every time it returns, whether that
//! return was a dequeued task or a timeout with nothing queued.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::task::Task;

pub struct TaskQueue {
    inner: Mutex<VecDeque<Arc<Task>>>,
    cvar: Condvar,
}

impl Default for TaskQueue {
    fn default() -> Self {
        TaskQueue { inner: Mutex::new(VecDeque::new()), cvar: Condvar::new() }
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task at the back of the FIFO and wake one waiting worker.
    pub fn push(&self, task: Arc<Task>) {
        let mut guard = self.inner.lock().expect("task queue poisoned");
        guard.push_back(task);
        self.cvar.notify_one();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("task queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait up to `timeout` for a task to be available, then pop one if
    /// present. Returns `None` either because the wait timed out with an
    /// empty queue, or because of a spurious wakeup that still found the
    /// queue empty — both cases mean the caller should re-check engine
    /// state and call again.
    pub fn take_timeout(&self, timeout: Duration) -> Option<Arc<Task>> {
        let mut guard = self.inner.lock().expect("task queue poisoned");
        if guard.is_empty() {
            let (g, _timeout_result) =
                self.cvar.wait_timeout(guard, timeout).expect("task queue poisoned");
            guard = g;
        }
        guard.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RenderCallback;
    use flame_core::{Settings, VecFlameSource};

    struct NullCallback;
    impl RenderCallback for NullCallback {
        fn on_update(&self, _task: &Arc<Task>, _update: crate::api::RenderUpdate<'_>) {}
        fn on_device_error(&self, _task: &Arc<Task>, _flame_index: u64, _error: &flame_device::DeviceError) {}
    }

    fn a_task() -> Arc<Task> {
        Task::new(
            Arc::new(Settings::builder().build().unwrap()),
            Box::new(VecFlameSource::new(vec![])),
            Arc::new(NullCallback),
        )
    }

    #[test]
    fn fifo_order() {
        let queue = TaskQueue::new();
        let t1 = a_task();
        let t2 = a_task();
        queue.push(t1.clone());
        queue.push(t2.clone());
        assert!(Arc::ptr_eq(&queue.take_timeout(Duration::from_millis(10)).unwrap(), &t1));
        assert!(Arc::ptr_eq(&queue.take_timeout(Duration::from_millis(10)).unwrap(), &t2));
    }

    #[test]
    fn take_times_out_on_empty_queue() {
        let queue = TaskQueue::new();
        assert!(queue.take_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn push_wakes_a_blocked_waiter() {
        let queue = Arc::new(TaskQueue::new());
        let q2 = queue.clone();
        let handle = std::thread::spawn(move || q2.take_timeout(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        queue.push(a_task());
        assert!(handle.join().unwrap().is_some());
    }
}
