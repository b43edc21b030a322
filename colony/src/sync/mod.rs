//! # Spin Lock Module
//!
//! A word-sized compare-and-swap lock with bounded exponential backoff, for
//! hot state that is held for a handful of instructions at a time.
//!
//! ## Usage Guidelines
//! - Keep critical sections short: a contended locker burns CPU yielding
//!   instead of parking.
//! - Prefer [`SpinMutex`] over the raw [`SpinLock`]; the guard cannot unlock
//!   twice.
//! - Never hold a spin lock across a blocking call.

mod spin;

pub use spin::{
    new_spin_lock, Backoff, SpinLock, SpinMutex, SpinMutexGuard, DEFAULT_MAX_BACKOFF,
    MAX_BACKOFF_LIMIT,
};
