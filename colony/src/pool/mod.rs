//! # Pool Module
//!
//! A bounded pool of reusable workers.
//!
//! ## Key Concepts
//! - Idle workers wait on their conduits in a LIFO stack; `submit` hands a
//!   task to the most recently used one.
//! - When the stack is empty and the pool is below capacity, a worker object
//!   is taken from the reuse cache (or created) and started.
//! - When the pool is at capacity, submitters either fail fast or wait on a
//!   condition that exiting and reverting workers signal.
//! - A purger thread finishes workers that stayed idle past the expiry.
//!
//! ## Thread Safety
//! - Counters are atomics; the idle stack sits behind a mutex paired with
//!   the condition submitters wait on.
//! - Every wake-up is issued while holding that mutex, so a submitter cannot
//!   miss a signal between checking capacity and starting to wait.
//! - Workers only hold a weak reference to the pool; dropping the [`Pool`]
//!   releases it and finishes every idle worker.

mod purge;
mod worker_stack;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use tracing::{debug, trace};
use uuid::Uuid;

use colony_api::{Logger, PanicHandler, PoolError, Task, WorkerHost};

use crate::config::{default_capacity, PoolOptions};
use crate::worker::{DynHost, Worker};
use purge::Purger;
use worker_stack::WorkerStack;

const UNBOUNDED: isize = -1;
const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A pool of reusable worker threads.
///
/// # Examples
///
/// ```rust
/// use colony::{Pool, PoolOptions};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let pool = Pool::new(4, PoolOptions::default()).unwrap();
/// let done = Arc::new(AtomicUsize::new(0));
/// for _ in 0..16 {
///     let done = done.clone();
///     pool.submit(move || {
///         done.fetch_add(1, Ordering::SeqCst);
///     }).unwrap();
/// }
/// pool.release_timeout(std::time::Duration::from_secs(5)).unwrap();
/// assert_eq!(done.load(Ordering::SeqCst), 16);
/// ```
pub struct Pool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    capacity: AtomicIsize,
    running: AtomicIsize,
    waiting: AtomicUsize,
    closed: AtomicBool,
    idle: Mutex<WorkerStack>,
    cond: Condvar,
    cache: SegQueue<Arc<Worker>>,
    options: PoolOptions,
    purger: Mutex<Option<Purger>>,
    me: Weak<PoolInner>,
}

impl Pool {
    /// Creates a pool holding at most `capacity` workers; `0` means unbounded.
    pub fn new(capacity: usize, options: PoolOptions) -> Result<Self, PoolError> {
        if options.pre_alloc && capacity == 0 {
            return Err(PoolError::InvalidPreAllocSize);
        }
        Ok(Self::build(capacity, options))
    }

    /// Creates a pool sized from the number of CPUs.
    pub fn with_default_capacity(options: PoolOptions) -> Result<Self, PoolError> {
        Self::new(default_capacity(), options)
    }

    /// Creates a pool without a capacity limit.
    pub fn unbounded(options: PoolOptions) -> Self {
        Self::build(0, PoolOptions { pre_alloc: false, ..options })
    }

    fn build(capacity: usize, options: PoolOptions) -> Self {
        let options = options.normalized();
        let capacity = if capacity == 0 {
            UNBOUNDED
        } else {
            isize::try_from(capacity).unwrap_or(isize::MAX)
        };
        let stack = if options.pre_alloc {
            WorkerStack::with_capacity(capacity as usize)
        } else {
            WorkerStack::default()
        };

        let inner = Arc::new_cyclic(|me| PoolInner {
            capacity: AtomicIsize::new(capacity),
            running: AtomicIsize::new(0),
            waiting: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            idle: Mutex::new(stack),
            cond: Condvar::new(),
            cache: SegQueue::new(),
            options,
            purger: Mutex::new(None),
            me: me.clone(),
        });
        inner.start_purger();

        crate::log_pool!("new", "created", capacity, options = ?inner.options);
        Self { inner }
    }

    /// Runs `task` on a pooled worker.
    ///
    /// Blocks while the pool is at capacity unless the pool is non-blocking.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.submit(Box::new(task))
    }

    /// Runs an already boxed task on a pooled worker.
    pub fn submit_task(&self, task: Task) -> Result<(), PoolError> {
        self.inner.submit(task)
    }

    /// Number of workers currently registered as running.
    pub fn running(&self) -> usize {
        self.inner.running()
    }

    /// Capacity not taken by running workers; `None` when unbounded.
    pub fn free(&self) -> Option<usize> {
        self.capacity().map(|cap| cap.saturating_sub(self.running()))
    }

    /// Number of submitters blocked waiting for a worker.
    pub fn waiting(&self) -> usize {
        self.inner.waiting.load(Ordering::SeqCst)
    }

    /// `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        usize::try_from(self.inner.capacity.load(Ordering::SeqCst)).ok()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Changes the capacity.
    ///
    /// Ignored for unbounded and pre-allocated pools and for a size of `0`.
    /// Shrinking takes effect as running workers finish their tasks and are
    /// refused re-admission.
    pub fn tune(&self, size: usize) {
        self.inner.tune(size)
    }

    /// Closes the pool and finishes every idle worker.
    ///
    /// Running tasks complete; their workers then terminate.
    pub fn release(&self) {
        self.inner.release()
    }

    /// Releases the pool and waits for every worker to terminate.
    pub fn release_timeout(&self, timeout: Duration) -> Result<(), PoolError> {
        if self.inner.is_closed() {
            return Err(PoolError::Closed);
        }
        self.inner.release();

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.inner.running() == 0 {
                return Ok(());
            }
            thread::sleep(RELEASE_POLL_INTERVAL);
        }
        Err(PoolError::ReleaseTimeout(timeout))
    }

    /// Reopens a released pool.
    pub fn reboot(&self) {
        if self
            .inner
            .closed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.inner.start_purger();
            crate::log_pool!("reboot", "open");
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .field("running", &self.running())
            .field("waiting", &self.waiting())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PoolInner {
    fn lock_idle(&self) -> MutexGuard<'_, WorkerStack> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn host(&self) -> Weak<DynHost> {
        let host: Weak<DynHost> = self.me.clone();
        host
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn running(&self) -> usize {
        usize::try_from(self.running.load(Ordering::SeqCst)).unwrap_or(0)
    }

    fn submit(&self, task: Task) -> Result<(), PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        let worker = self.retrieve_worker()?;
        worker.input_func(task)?;
        Ok(())
    }

    fn retrieve_worker(&self) -> Result<Arc<Worker>, PoolError> {
        let mut idle = self.lock_idle();
        loop {
            if self.is_closed() {
                return Err(PoolError::Closed);
            }
            if let Some(worker) = idle.detach() {
                return Ok(worker);
            }

            let capacity = self.capacity.load(Ordering::SeqCst);
            if capacity == UNBOUNDED || capacity > self.running.load(Ordering::SeqCst) {
                // Started under the lock so concurrent submitters cannot
                // overshoot the capacity.
                return self.spawn_worker();
            }

            if self.options.nonblocking {
                return Err(PoolError::Overload);
            }
            let max_blocking = self.options.max_blocking_tasks;
            if max_blocking != 0 && self.waiting.load(Ordering::SeqCst) >= max_blocking {
                return Err(PoolError::Overload);
            }

            self.waiting.fetch_add(1, Ordering::SeqCst);
            idle = self.cond.wait(idle).unwrap_or_else(PoisonError::into_inner);
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn spawn_worker(&self) -> Result<Arc<Worker>, PoolError> {
        let id = Uuid::new_v4().to_string();
        let worker = match self.cache.pop() {
            Some(worker) => {
                worker.reset();
                worker.set_id(id);
                worker
            }
            None => Worker::new(id, self.host()),
        };
        if let Err(e) = worker.run() {
            self.cache.push(worker);
            return Err(e.into());
        }
        trace!(worker_id = %worker, "worker started");
        Ok(worker)
    }

    fn tune(&self, size: usize) {
        let capacity = self.capacity.load(Ordering::SeqCst);
        let size = isize::try_from(size).unwrap_or(isize::MAX);
        if capacity == UNBOUNDED || size == 0 || size == capacity || self.options.pre_alloc {
            return;
        }
        self.capacity.store(size, Ordering::SeqCst);
        crate::log_pool!("tune", "resized", from = capacity, to = size);

        if size > capacity {
            if size - capacity == 1 {
                self.signal();
            } else {
                self.broadcast();
            }
        }
    }

    fn release(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.stop_purger();
        let finished = self.lock_idle().reset();
        self.broadcast();
        crate::log_pool!("release", "closed", idle_finished = finished);
    }

    fn start_purger(&self) {
        if self.options.disable_purge {
            return;
        }
        match Purger::spawn(self.me.clone(), self.options.expiry_duration) {
            Ok(purger) => {
                let previous = self
                    .purger
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .replace(purger);
                if let Some(previous) = previous {
                    previous.stop();
                }
            }
            Err(e) => {
                crate::log_error!(e, component = "purger");
            }
        }
    }

    fn stop_purger(&self) {
        let purger = self.purger.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(purger) = purger {
            purger.stop();
        }
    }

    /// Finishes workers idle past the expiry and wakes waiters if the pool
    /// has gone dormant.
    pub(crate) fn purge_stale(&self) {
        let stale = self.lock_idle().refresh(self.options.expiry_duration);
        for worker in &stale {
            worker.finish();
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "finished idle workers");
        }

        let running = self.running();
        let dormant = running == 0 || running == stale.len();
        if dormant && self.waiting.load(Ordering::SeqCst) > 0 {
            self.broadcast();
        }
    }

    /// Most worker objects kept for reuse: the capacity, or the default
    /// capacity for unbounded pools.
    fn cache_limit(&self) -> usize {
        usize::try_from(self.capacity.load(Ordering::SeqCst)).unwrap_or_else(|_| default_capacity())
    }

    fn broadcast(&self) {
        let _idle = self.lock_idle();
        self.cond.notify_all();
    }
}

impl WorkerHost<Arc<Worker>> for PoolInner {
    fn add_running(&self, delta: isize) {
        self.running.fetch_add(delta, Ordering::SeqCst);
    }

    fn revert_worker(&self, worker: Arc<Worker>) -> bool {
        let capacity = self.capacity.load(Ordering::SeqCst);
        if (capacity > 0 && self.running.load(Ordering::SeqCst) > capacity) || self.is_closed() {
            self.broadcast();
            return false;
        }

        let mut idle = self.lock_idle();
        if self.is_closed() {
            return false;
        }
        idle.insert(worker);
        self.cond.notify_one();
        true
    }

    fn recycle(&self, worker: Arc<Worker>) {
        // Past the limit the worker is dropped instead of cached.
        if self.cache.len() < self.cache_limit() {
            self.cache.push(worker);
        }
    }

    fn signal(&self) {
        let _idle = self.lock_idle();
        self.cond.notify_one();
    }

    fn panic_handler(&self) -> Option<PanicHandler> {
        self.options.panic_handler.clone()
    }

    fn logger(&self) -> Arc<dyn Logger> {
        self.options.logger.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::test_support::wait_until;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_idle_worker_is_reused() {
        let pool = Pool::new(2, PoolOptions::default().with_disable_purge(true)).unwrap();
        let (done_tx, done_rx) = flume::unbounded();

        let tx = done_tx.clone();
        pool.submit(move || tx.send(thread::current().id()).unwrap()).unwrap();
        let first = done_rx.recv_timeout(TIMEOUT).unwrap();
        assert!(wait_until(TIMEOUT, || pool.inner.lock_idle().len() == 1));

        pool.submit(move || done_tx.send(thread::current().id()).unwrap()).unwrap();
        let second = done_rx.recv_timeout(TIMEOUT).unwrap();

        assert_eq!(first, second);
        assert_eq!(pool.running(), 1);
    }

    #[test]
    fn test_worker_objects_are_recycled() {
        let pool = Pool::new(1, PoolOptions::default().with_disable_purge(true)).unwrap();
        pool.submit(|| panic!("discard this worker")).unwrap();
        assert!(wait_until(TIMEOUT, || pool.inner.cache.len() == 1));
        assert!(wait_until(TIMEOUT, || pool.running() == 0));

        let (done_tx, done_rx) = flume::bounded(1);
        pool.submit(move || done_tx.send(()).unwrap()).unwrap();
        done_rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(pool.inner.cache.len(), 0);
    }

    #[test]
    fn test_recycle_cache_is_bounded() {
        let pool = Pool::new(2, PoolOptions::default().with_disable_purge(true)).unwrap();
        for i in 0..5 {
            pool.inner.recycle(Worker::new(format!("spent-{i}"), pool.inner.host()));
        }
        assert_eq!(pool.inner.cache.len(), 2);

        pool.tune(3);
        pool.inner.recycle(Worker::new("after-tune", pool.inner.host()));
        assert_eq!(pool.inner.cache.len(), 3);
    }

    #[test]
    fn test_unbounded_cache_uses_default_limit() {
        let pool = Pool::unbounded(PoolOptions::default().with_disable_purge(true));
        for i in 0..default_capacity() + 8 {
            pool.inner.recycle(Worker::new(format!("spent-{i}"), pool.inner.host()));
        }
        assert_eq!(pool.inner.cache.len(), default_capacity());
    }

    #[test]
    fn test_purge_finishes_stale_workers() {
        let pool = Pool::new(
            4,
            PoolOptions::default().with_expiry_duration(Duration::from_millis(20)),
        )
        .unwrap();
        for _ in 0..3 {
            pool.submit(|| thread::sleep(Duration::from_millis(5))).unwrap();
        }

        assert!(wait_until(TIMEOUT, || pool.running() == 0));
        assert!(pool.inner.lock_idle().is_empty());
        assert!(!pool.is_closed());
    }

    #[test]
    fn test_revert_refused_over_capacity() {
        let pool = Pool::new(2, PoolOptions::default().with_disable_purge(true)).unwrap();
        let worker = Worker::new("extra", pool.inner.host());
        pool.inner.running.store(3, Ordering::SeqCst);

        assert!(!pool.inner.revert_worker(worker.clone()));
        assert!(pool.inner.lock_idle().is_empty());

        pool.inner.running.store(1, Ordering::SeqCst);
        assert!(pool.inner.revert_worker(worker));
        assert_eq!(pool.inner.lock_idle().len(), 1);
        pool.inner.running.store(0, Ordering::SeqCst);
    }
}
