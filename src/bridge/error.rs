//! Error types for scheduler and deferred-computation operations.
//!
//! Only two variants are recovered inside the bridge:
//! - `AlreadyCompleted`: the computation was driven to completion earlier
//! - `Busy`: the scheduler is already driving other work on this thread
//!
//! Everything else reaches the caller.

use thiserror::Error;

/// Errors raised while driving a deferred computation on a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The computation already produced its value on an earlier drive.
    #[error("deferred computation was already driven to completion")]
    AlreadyCompleted,

    /// The computation failed on an earlier drive; the failure is not replayed.
    #[error("deferred computation already failed: {0}")]
    PreviouslyFailed(String),

    /// The scheduler is already running (reentrant use from scheduled work).
    #[error("scheduler is already running")]
    Busy,

    /// The scheduler was shut down and can no longer drive work.
    #[error("scheduler is closed")]
    Closed,

    /// Building a fresh runtime failed.
    #[error("failed to build scheduler runtime: {0}")]
    Build(#[from] std::io::Error),

    /// The computation itself failed.
    #[error(transparent)]
    Computation(anyhow::Error),
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    /// Convert into the error handed to bridge callers.
    ///
    /// Computation failures come back as the original error so callers can
    /// downcast to their own types.
    pub fn into_caller_error(self) -> anyhow::Error {
        match self {
            Self::Computation(err) => err,
            other => anyhow::Error::new(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk on fire")]
    struct DiskOnFire;

    #[test]
    fn test_computation_error_is_unwrapped() {
        let err = SchedulerError::Computation(anyhow::Error::new(DiskOnFire));
        let caller = err.into_caller_error();
        assert!(caller.downcast_ref::<DiskOnFire>().is_some());
        assert_eq!(caller.to_string(), "disk on fire");
    }

    #[test]
    fn test_other_errors_stay_typed() {
        let caller = SchedulerError::Closed.into_caller_error();
        assert!(matches!(
            caller.downcast_ref::<SchedulerError>(),
            Some(SchedulerError::Closed)
        ));
    }
}
