//! # Worker Host
//!
//! The narrow set of callbacks a worker consumes from the pool that owns it.
//!
//! ## Thread Safety
//! Every method is called from worker threads, many at once. Implementations
//! must synchronize their own state; the worker performs no locking around
//! these calls.

use std::sync::Arc;

use crate::logger::Logger;
use crate::types::PanicHandler;

/// Callbacks from a worker back into its owning pool.
///
/// `W` is the handle the pool stores for a worker, usually an `Arc` of the
/// concrete worker type.
///
/// ## Call Order
/// On every exit of a worker's processing loop the worker calls, exactly once
/// and in this order: [`add_running(-1)`](WorkerHost::add_running),
/// [`recycle`](WorkerHost::recycle), the panic handler or logger if the exit
/// was caused by a panic, then [`signal`](WorkerHost::signal).
pub trait WorkerHost<W>: Send + Sync {
    /// Adjusts the running-worker counter by `delta`.
    fn add_running(&self, delta: isize);

    /// Attempts to return `worker` to the idle set after a task completed.
    ///
    /// `false` means the pool is closing or over capacity and the worker must
    /// terminate without taking another task.
    fn revert_worker(&self, worker: W) -> bool;

    /// Returns a terminated worker object to the reuse cache.
    fn recycle(&self, worker: W);

    /// Wakes one thread blocked waiting for pool capacity.
    fn signal(&self);

    /// Handler for panic payloads, if one is configured.
    fn panic_handler(&self) -> Option<PanicHandler>;

    /// Sink used to report panics when no handler is configured.
    fn logger(&self) -> Arc<dyn Logger>;
}
