// Colony Worker Pool
//
// This crate provides a pool of long-lived worker threads that repeatedly
// accept and run tasks, plus the spin lock used for the short critical
// sections around them.
//
// The worker talks to its pool only through `colony_api::WorkerHost`, so the
// worker core can be driven by other pools or by fake hosts in tests.

pub mod config;
pub mod logging;
pub mod pool;
pub mod sync;
pub mod worker;

// Re-export commonly used types
pub use colony_api::{panic_message, Logger, PanicHandler, PanicPayload, PoolError, Task, WorkerError, WorkerHost};
pub use config::PoolOptions;
pub use pool::Pool;
pub use sync::{SpinLock, SpinMutex};
pub use worker::{ExitReason, Worker};

use lazy_static::lazy_static;

lazy_static! {
    // Process-wide pool backing the free functions below.
    static ref DEFAULT_POOL: Pool = Pool::unbounded(PoolOptions::default());
}

/// Runs `task` on the process-wide default pool.
pub fn submit<F>(task: F) -> Result<(), PoolError>
where
    F: FnOnce() + Send + 'static,
{
    DEFAULT_POOL.submit(task)
}

/// Running workers in the default pool.
pub fn running() -> usize {
    DEFAULT_POOL.running()
}

/// Free capacity of the default pool; `None` because it is unbounded.
pub fn free() -> Option<usize> {
    DEFAULT_POOL.free()
}

/// Capacity of the default pool; `None` because it is unbounded.
pub fn capacity() -> Option<usize> {
    DEFAULT_POOL.capacity()
}

/// Closes the default pool.
pub fn release() {
    DEFAULT_POOL.release()
}

/// Reopens the default pool after [`release`].
pub fn reboot() {
    DEFAULT_POOL.reboot()
}
