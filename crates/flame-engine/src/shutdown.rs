//! Process-shutdown hook registry.
//!
//! The engine registers a weak back-reference to itself at worker start so
//! an external signal handler (installed by whatever embeds this crate,
//! e.g. a CLI's Ctrl+C handler) can accelerate shutdown by calling
//! [`run_hooks`]. The hook is a no-op once the engine it refers to has been
//! dropped, and is removed on normal termination; removal silently no-ops
//! if the hook is already gone, absorbing the race where termination and
//! an in-flight signal overlap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type HookFn = dyn Fn() + Send + Sync;

static HOOKS: Mutex<Vec<(u64, Weak<HookFn>)>> = Mutex::new(Vec::new());
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// An installed hook's handle. Dropping it removes the hook.
pub struct ShutdownHookGuard {
    id: u64,
    _keep_alive: Arc<HookFn>,
}

impl Drop for ShutdownHookGuard {
    fn drop(&mut self) {
        let mut hooks = HOOKS.lock().expect("shutdown hook registry poisoned");
        hooks.retain(|(id, _)| *id != self.id);
    }
}

/// Register a process-shutdown hook. The guard must be kept alive for the
/// hook to remain callable via [`run_hooks`]; dropping it removes the hook.
pub fn register_hook(hook: Arc<HookFn>) -> ShutdownHookGuard {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let mut hooks = HOOKS.lock().expect("shutdown hook registry poisoned");
    hooks.push((id, Arc::downgrade(&hook)));
    ShutdownHookGuard { id, _keep_alive: hook }
}

/// Invoke every currently-registered hook. Hooks whose engine has already
/// been dropped are silently skipped.
pub fn run_hooks() {
    let hooks = HOOKS.lock().expect("shutdown hook registry poisoned").clone();
    for (_, weak) in hooks {
        if let Some(hook) = weak.upgrade() {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn hook_fires_while_guard_is_alive() {
        let fired = Arc::new(AtomicBool::new(false));
        let f = fired.clone();
        let guard = register_hook(Arc::new(move || f.store(true, Ordering::SeqCst)));
        run_hooks();
        assert!(fired.load(Ordering::SeqCst));
        drop(guard);
    }

    #[test]
    fn hook_is_removed_after_drop() {
        let fired = Arc::new(AtomicBool::new(false));
        let f = fired.clone();
        let guard = register_hook(Arc::new(move || f.store(true, Ordering::SeqCst)));
        drop(guard);
        run_hooks();
        assert!(!fired.load(Ordering::SeqCst));
    }
}
