//! # Colony Worker API
//!
//! Contracts shared between a colony worker and the pool that owns it.
//!
//! A worker never sees the internals of its pool. It holds a non-owning
//! reference to something implementing [`WorkerHost`] and calls back into it
//! for accounting, re-admission, recycling and wake-ups. Keeping the contract
//! in its own crate lets alternative pools, and fake hosts in tests, drive the
//! same worker implementation.
//!
//! ## Core Components
//!
//! - [`Task`]: a boxed zero-argument unit of work
//! - [`PanicHandler`]: optional sink for payloads of panicking tasks
//! - [`Logger`]: text sink used when no panic handler is configured
//! - [`WorkerHost`]: the callbacks a worker consumes from its pool
//! - [`errors`]: failures reported by workers and pools
//!
//! ## Usage Example
//!
//! ```rust
//! use colony_api::{Task, panic_message};
//!
//! let task: Task = Box::new(|| println!("hello from a worker"));
//! task();
//!
//! let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
//! assert_eq!(panic_message(&*payload), "boom");
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: task and panic type aliases
//! - [`host`]: the worker → pool callback trait
//! - [`logger`]: logging sink trait and panic payload formatting
//! - [`errors`]: error types

pub mod errors;
pub mod host;
pub mod logger;
pub mod types;

pub use errors::{PoolError, WorkerError};
pub use host::WorkerHost;
pub use logger::{panic_message, Logger};
pub use types::{PanicHandler, PanicPayload, Task};
