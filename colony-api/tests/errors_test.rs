use colony_api::errors::{PoolError, WorkerError};
use std::error::Error;
use std::time::Duration;
use anyhow::{anyhow, Result as AnyhowResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_error_display() {
        assert_eq!(WorkerError::AlreadyRunning.to_string(), "Worker is already running");
        assert_eq!(WorkerError::Finished.to_string(), "Worker has been asked to finish");
        assert_eq!(WorkerError::Closed.to_string(), "Worker conduit is closed");
        assert_eq!(WorkerError::HostDropped.to_string(), "Worker host has been dropped");
        assert_eq!(
            WorkerError::Spawn("resource temporarily unavailable".to_string()).to_string(),
            "Failed to spawn worker thread: resource temporarily unavailable"
        );
    }

    #[test]
    fn test_pool_error_display() {
        assert_eq!(PoolError::Closed.to_string(), "Pool has been closed");
        assert_eq!(PoolError::Overload.to_string(), "Pool is overloaded");
        assert_eq!(
            PoolError::InvalidPreAllocSize.to_string(),
            "Pre-allocation requires a bounded capacity"
        );
        assert_eq!(
            PoolError::ReleaseTimeout(Duration::from_millis(250)).to_string(),
            "Pool release timed out after 250ms"
        );
    }

    #[test]
    fn test_worker_error_converts_into_pool_error() {
        let error: PoolError = WorkerError::Closed.into();
        assert_eq!(error, PoolError::Worker(WorkerError::Closed));
        assert_eq!(error.to_string(), "Worker error: Worker conduit is closed");

        // thiserror wires #[from] fields as the error source
        let source = error.source().expect("worker error should be the source");
        assert_eq!(source.to_string(), "Worker conduit is closed");
    }

    #[test]
    fn test_errors_propagate_through_anyhow() -> AnyhowResult<()> {
        fn submit() -> Result<(), PoolError> {
            Err(PoolError::Overload)
        }

        let wrapped = submit().map_err(|e| anyhow!("submit failed: {}", e));
        assert_eq!(wrapped.unwrap_err().to_string(), "submit failed: Pool is overloaded");

        let converted: anyhow::Error = PoolError::Closed.into();
        assert!(converted.downcast_ref::<PoolError>().is_some());
        Ok(())
    }
}
