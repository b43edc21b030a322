use std::io;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{RecvTimeoutError, Sender};
use tracing::trace;

use super::PoolInner;

/// Background scan that finishes workers idle for longer than the expiry.
///
/// Dropping the stop sender wakes the thread immediately.
pub(crate) struct Purger {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Purger {
    pub(crate) fn spawn(pool: Weak<PoolInner>, interval: Duration) -> io::Result<Self> {
        let (stop, stopped) = flume::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("colony-purger".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let Some(pool) = pool.upgrade() else { break };
                if pool.is_closed() {
                    break;
                }
                pool.purge_stale();
            })?;
        trace!(?interval, "purger started");
        Ok(Self { stop, handle })
    }

    /// Signals the thread and waits for it to exit.
    pub(crate) fn stop(self) {
        drop(self.stop);
        if self.handle.join().is_err() {
            tracing::error!("purger thread panicked");
        }
    }
}
