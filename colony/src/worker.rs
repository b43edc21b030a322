//! # Worker Module
//!
//! A worker owns one long-lived thread that repeatedly receives tasks from
//! its conduit, runs them, and hands itself back to its host for reuse.
//!
//! ## Key Concepts
//! - Conduit: a rendezvous `flume` channel. `input_func` blocks until the
//!   worker is ready to receive, so a worker never holds more than the task
//!   it is running.
//! - Stop: `finish` drops the sending half. The loop sees a disconnected
//!   conduit once it is back to waiting, so a running task always completes.
//! - Panic containment: the loop runs behind `catch_unwind`; a panicking task
//!   ends the worker and is reported through the host's handler or logger.
//!
//! ## Exit Side Effects
//! Whatever ends the loop, the worker calls back into its host exactly once,
//! in this order: `add_running(-1)`, `recycle`, panic report (if any),
//! `signal`.

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;

use flume::{Receiver, Sender};
use tracing::{error, trace};

use colony_api::{panic_message, PanicPayload, Task, WorkerError, WorkerHost};

use crate::logging;
use crate::sync::SpinMutex;

/// The host type a [`Worker`] calls back into.
pub type DynHost = dyn WorkerHost<Arc<Worker>>;

/// Why a worker's processing loop stopped.
#[derive(Debug)]
pub enum ExitReason {
    /// The conduit was closed by `finish`.
    Finished,
    /// The host refused to take the worker back after a task.
    Refused,
    /// A task panicked; the payload goes to the panic handler.
    Panicked(PanicPayload),
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::Finished => "finished",
            ExitReason::Refused => "refused",
            ExitReason::Panicked(_) => "panicked",
        }
    }
}

struct Conduit {
    tx: Option<Sender<Task>>,
    rx: Option<Receiver<Task>>,
}

impl Conduit {
    fn open() -> Self {
        let (tx, rx) = flume::bounded(0);
        Self {
            tx: Some(tx),
            rx: Some(rx),
        }
    }
}

/// An execution unit bound to one processing thread.
///
/// Created idle; [`run`](Worker::run) starts the thread. The worker keeps a
/// weak reference to its host so an abandoned pool is not kept alive by its
/// own threads.
pub struct Worker {
    id: SpinMutex<String>,
    host: Weak<DynHost>,
    conduit: SpinMutex<Conduit>,
    last_used: SpinMutex<Instant>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conduit = self.conduit.lock();
        f.debug_struct("Worker")
            .field("id", &*self.id.lock())
            .field("started", &conduit.rx.is_none())
            .field("finished", &conduit.tx.is_none())
            .finish()
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id.lock())
    }
}

impl Worker {
    /// Creates an idle worker owned by `host`.
    pub fn new(id: impl Into<String>, host: Weak<DynHost>) -> Arc<Self> {
        Arc::new(Self {
            id: SpinMutex::new(id.into()),
            host,
            conduit: SpinMutex::new(Conduit::open()),
            last_used: SpinMutex::new(Instant::now()),
        })
    }

    /// Starts the processing loop on a new thread and registers with the
    /// host's running-count.
    ///
    /// A worker can only be started once per conduit; see [`reset`](Worker::reset).
    pub fn run(self: &Arc<Self>) -> Result<(), WorkerError> {
        let rx = self.conduit.lock().rx.take().ok_or(WorkerError::AlreadyRunning)?;
        let Some(host) = self.host.upgrade() else {
            self.conduit.lock().rx = Some(rx);
            return Err(WorkerError::HostDropped);
        };

        host.add_running(1);

        let worker = Arc::clone(self);
        let dispatch = logging::current_subscriber();
        let name: String = self.id().chars().take(8).collect();
        let spawned = thread::Builder::new()
            .name(format!("colony-worker-{}", name))
            .spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || worker.process(rx));
            });

        if let Err(e) = spawned {
            host.add_running(-1);
            self.reset();
            return Err(WorkerError::Spawn(e.to_string()));
        }
        Ok(())
    }

    /// Hands one task to the worker, blocking until the worker receives it.
    ///
    /// Handing a task to a worker that was never started blocks forever.
    pub fn input_func(&self, task: Task) -> Result<(), WorkerError> {
        let tx = self.conduit.lock().tx.clone().ok_or(WorkerError::Finished)?;
        tx.send(task).map_err(|_| WorkerError::Closed)
    }

    /// Asks the worker to stop once it is back to waiting for work.
    ///
    /// A task that is already running is not interrupted.
    pub fn finish(&self) {
        self.conduit.lock().tx = None;
        trace!(worker_id = %self, "conduit closed");
    }

    /// Re-initialises a terminated worker with a fresh conduit.
    ///
    /// Only valid once the previous processing loop has exited.
    pub fn reset(&self) {
        *self.conduit.lock() = Conduit::open();
    }

    /// When the worker was last returned to its host's idle set.
    pub fn last_used_time(&self) -> Instant {
        *self.last_used.lock()
    }

    pub fn set_last_used(&self, at: Instant) {
        *self.last_used.lock() = at;
    }

    pub fn id(&self) -> String {
        self.id.lock().clone()
    }

    pub fn set_id(&self, id: impl Into<String>) {
        *self.id.lock() = id.into();
    }

    fn process(self: Arc<Self>, rx: Receiver<Task>) {
        let id = self.id();
        let span = crate::worker_span!(id.as_str());
        let _enter = span.enter();
        crate::log_worker!(id.as_str(), "started");

        let mut completed = 0usize;
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| self.drain(&rx, &mut completed))) {
            Ok(reason) => reason,
            Err(payload) => ExitReason::Panicked(payload),
        };
        // Pending senders fail instead of waiting on a dead loop.
        drop(rx);

        crate::log_worker!(id.as_str(), "exited", reason = reason.label(), completed);
        self.exit(reason);
    }

    fn drain(self: &Arc<Self>, rx: &Receiver<Task>, completed: &mut usize) -> ExitReason {
        while let Ok(task) = rx.recv() {
            task();
            *completed += 1;

            let admitted = self
                .host
                .upgrade()
                .is_some_and(|host| host.revert_worker(Arc::clone(self)));
            if !admitted {
                return ExitReason::Refused;
            }
        }
        ExitReason::Finished
    }

    fn exit(self: Arc<Self>, reason: ExitReason) {
        let Some(host) = self.host.upgrade() else {
            if let ExitReason::Panicked(payload) = reason {
                error!(panic = %panic_message(&*payload), "worker exits from panic after its host was dropped");
            }
            return;
        };

        host.add_running(-1);
        host.recycle(Arc::clone(&self));

        if let ExitReason::Panicked(payload) = reason {
            match host.panic_handler() {
                Some(handler) => {
                    if panic::catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                        error!("panic handler panicked");
                    }
                }
                None => host.logger().log(format_args!(
                    "worker exits from panic: {}\n{}",
                    panic_message(&*payload),
                    Backtrace::force_capture()
                )),
            }
        }

        host.signal();
    }
}
