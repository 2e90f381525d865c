//! Process-wide storage lock and probe error suppression.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::Cell;

static STORAGE_LOCK: ReentrantMutex<()> = ReentrantMutex::new(());

/// Guard returned by [`lock`].
pub type StorageGuard = ReentrantMutexGuard<'static, ()>;

/// Acquire the process-wide storage lock.
///
/// The library is not thread-safe; every call into it must happen while this
/// lock is held. It is reentrant so that nested calls (attribute iteration,
/// object visitation) can re-acquire it on the same thread.
pub fn lock() -> StorageGuard {
    STORAGE_LOCK.lock()
}

thread_local! {
    static SUPPRESS_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Scope guard silencing probe warnings; see [`suppressed`].
pub struct ErrorSuppressor(());

impl Drop for ErrorSuppressor {
    fn drop(&mut self) {
        SUPPRESS_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Silence the library's failure warnings for the lifetime of the returned
/// guard.
///
/// Used around speculative probes such as opening a dataset whose existence
/// is uncertain. The previous verbosity is restored when the guard drops,
/// including during unwinding.
pub fn suppressed() -> ErrorSuppressor {
    SUPPRESS_DEPTH.with(|depth| depth.set(depth.get() + 1));
    ErrorSuppressor(())
}

/// Whether failure warnings are currently suppressed on this thread.
pub(crate) fn probes_are_quiet() -> bool {
    SUPPRESS_DEPTH.with(|depth| depth.get() > 0)
}
