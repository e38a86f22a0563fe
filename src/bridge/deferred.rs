// Deferred computations and the maybe-deferred input type

use super::error::{SchedulerError, SchedulerResult};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'static>>;

enum Slot<T> {
    Pending(BoxFuture<T>),
    Completed(T),
    Failed(String),
}

/// Shared handle to work that yields its result at most once.
///
/// Clones refer to the same computation. The first drive that finishes
/// caches the value; every later drive reports `AlreadyCompleted` and the
/// cached value is available through [`Deferred::completed_value`].
pub struct Deferred<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot.try_lock() {
            Ok(slot) => match &*slot {
                Slot::Pending(_) => "pending",
                Slot::Completed(_) => "completed",
                Slot::Failed(_) => "failed",
            },
            Err(_) => "driving",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + 'static,
{
    /// Wrap a future that has not been driven yet.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Slot::Pending(Box::pin(future)))),
        }
    }

    /// A computation that already produced `value`.
    pub fn completed(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Completed(value))),
        }
    }

    /// Drive the computation to completion.
    ///
    /// Concurrent drives wait on each other. If this drive is cancelled the
    /// partially-polled future stays in place and the next drive resumes it.
    pub async fn drive(&self) -> SchedulerResult<T> {
        let mut slot = self.slot.lock().await;
        let outcome = match &mut *slot {
            Slot::Pending(future) => future.await,
            Slot::Completed(_) => return Err(SchedulerError::AlreadyCompleted),
            Slot::Failed(reason) => return Err(SchedulerError::PreviouslyFailed(reason.clone())),
        };

        match outcome {
            Ok(value) => {
                *slot = Slot::Completed(value.clone());
                Ok(value)
            }
            Err(err) => {
                *slot = Slot::Failed(format!("{err:#}"));
                Err(SchedulerError::Computation(err))
            }
        }
    }

    /// The cached result, if a drive has completed successfully.
    pub async fn completed_value(&self) -> Option<T> {
        match &*self.slot.lock().await {
            Slot::Completed(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Non-blocking check for a finished computation (success or failure).
    ///
    /// Returns `false` while another drive holds the computation.
    pub fn is_settled(&self) -> bool {
        self.slot
            .try_lock()
            .map(|slot| !matches!(&*slot, Slot::Pending(_)))
            .unwrap_or(false)
    }
}

/// Either a plain value or a deferred computation producing one.
#[derive(Debug, Clone)]
pub enum MaybeDeferred<T> {
    Value(T),
    Deferred(Deferred<T>),
}

impl<T> MaybeDeferred<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl<T> From<Deferred<T>> for MaybeDeferred<T> {
    fn from(deferred: Deferred<T>) -> Self {
        Self::Deferred(deferred)
    }
}
