use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use colony_api::{Logger, PanicHandler, PanicPayload};

use crate::logging::TracingLogger;

/// Interval of the idle-worker scan, and how long a worker may sit idle.
pub const DEFAULT_EXPIRY_DURATION: Duration = Duration::from_secs(1);

/// Capacity used by [`Pool::with_default_capacity`](crate::Pool::with_default_capacity).
pub fn default_capacity() -> usize {
    num_cpus::get() * 256
}

/// Options for a [`Pool`](crate::Pool).
#[derive(Clone)]
pub struct PoolOptions {
    /// How often the purger scans for idle workers, and how long a worker
    /// may stay idle before it is finished. Zero means the default.
    pub expiry_duration: Duration,

    /// Reserve idle storage for the full capacity up front. Requires a
    /// bounded capacity and freezes it: `tune` is ignored.
    pub pre_alloc: bool,

    /// Maximum number of submitters allowed to block waiting for a worker.
    /// Zero means unlimited.
    pub max_blocking_tasks: usize,

    /// Fail with `PoolError::Overload` instead of blocking when no worker is
    /// available.
    pub nonblocking: bool,

    /// Never finish idle workers; they live until the pool is released.
    pub disable_purge: bool,

    /// Receives the payload of every task that panics.
    pub panic_handler: Option<PanicHandler>,

    /// Reports panics when no handler is configured.
    pub logger: Arc<dyn Logger>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            expiry_duration: DEFAULT_EXPIRY_DURATION,
            pre_alloc: false,
            max_blocking_tasks: 0,
            nonblocking: false,
            disable_purge: false,
            panic_handler: None,
            logger: Arc::new(TracingLogger),
        }
    }
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("expiry_duration", &self.expiry_duration)
            .field("pre_alloc", &self.pre_alloc)
            .field("max_blocking_tasks", &self.max_blocking_tasks)
            .field("nonblocking", &self.nonblocking)
            .field("disable_purge", &self.disable_purge)
            .field("panic_handler", &self.panic_handler.is_some())
            .finish_non_exhaustive()
    }
}

impl PoolOptions {
    pub fn with_expiry_duration(mut self, expiry: Duration) -> Self {
        self.expiry_duration = expiry;
        self
    }

    pub fn with_pre_alloc(mut self, pre_alloc: bool) -> Self {
        self.pre_alloc = pre_alloc;
        self
    }

    pub fn with_max_blocking_tasks(mut self, max: usize) -> Self {
        self.max_blocking_tasks = max;
        self
    }

    pub fn with_nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    pub fn with_disable_purge(mut self, disable: bool) -> Self {
        self.disable_purge = disable;
        self
    }

    pub fn with_panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(PanicPayload) + Send + Sync + 'static,
    {
        self.panic_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replaces unset values with their defaults.
    pub(crate) fn normalized(mut self) -> Self {
        if self.expiry_duration.is_zero() {
            self.expiry_duration = DEFAULT_EXPIRY_DURATION;
        }
        self
    }
}
