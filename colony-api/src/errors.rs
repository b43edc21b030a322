//! # Worker and Pool Error Types
//!
//! Failures surfaced to callers of a worker or a pool. Task failures are
//! deliberately absent: a panicking task is contained by its worker and only
//! reaches the configured panic handler or logger.
//!
//! ## Usage Example
//!
//! ```rust
//! use colony_api::errors::{PoolError, WorkerError};
//!
//! fn describe(error: PoolError) -> String {
//!     match error {
//!         PoolError::Overload => "try again later".to_string(),
//!         PoolError::Worker(WorkerError::Closed) => "worker went away".to_string(),
//!         other => other.to_string(),
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Errors reported by a single worker.
///
/// These correspond to protocol misuse by the owning pool: starting a worker
/// twice or handing work to a worker that is no longer accepting any.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// `run()` was called on a worker whose loop is already started.
    #[error("Worker is already running")]
    AlreadyRunning,

    /// `finish()` was already called; the conduit no longer accepts tasks.
    #[error("Worker has been asked to finish")]
    Finished,

    /// The processing loop has terminated and dropped its end of the conduit.
    #[error("Worker conduit is closed")]
    Closed,

    /// The owning host was dropped before the worker could register with it.
    #[error("Worker host has been dropped")]
    HostDropped,

    /// The operating system refused to spawn the processing thread.
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Errors reported by a pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been released and accepts no more tasks.
    #[error("Pool has been closed")]
    Closed,

    /// No worker is available and the pool is non-blocking or already has
    /// the maximum number of blocked submitters.
    #[error("Pool is overloaded")]
    Overload,

    /// Pre-allocation was requested for an unbounded pool.
    #[error("Pre-allocation requires a bounded capacity")]
    InvalidPreAllocSize,

    /// Workers were still running when the release deadline passed.
    #[error("Pool release timed out after {0:?}")]
    ReleaseTimeout(Duration),

    /// The worker picked for a task rejected it.
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}
