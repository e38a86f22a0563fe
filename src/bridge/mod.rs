//! Async/sync execution bridge.
//!
//! Normalizes a value that may or may not be deferred work into a result:
//! - [`resolve_maybe_deferred`] awaits it inside a scheduler that is already
//!   running the caller
//! - [`run_to_completion`] blocks on it from synchronous code, building a
//!   scheduler for the call when the context has none
//!
//! When `run_to_completion` is invoked reentrantly from work the context's
//! scheduler is already driving, it cannot block. The computation is handed to
//! the busy scheduler instead and the caller gets [`Completion::Pending`]. The
//! busy scheduler is running, so the work does finish, but no ordering is
//! promised between that completion and whatever the caller does next.

pub mod deferred;
pub mod error;
pub mod scheduler;


pub use deferred::{BoxFuture, Deferred, MaybeDeferred};
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{ExecutionContext, Scheduler};

use tokio::task::JoinHandle;
use tracing::debug;

/// Outcome of [`run_to_completion`].
///
/// Callers must check for `Pending`: it is returned instead of a value when
/// the active scheduler was busy.
#[must_use]
#[derive(Debug)]
pub enum Completion<T> {
    Ready(T),
    Pending(PendingHandle<T>),
}

impl<T> Completion<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending(_) => None,
        }
    }

    /// Resolve to a value, waiting on the background task if pending.
    pub async fn into_value(self) -> anyhow::Result<T> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Pending(handle) => handle.wait().await,
        }
    }
}

/// A computation handed to a busy scheduler that has not finished yet.
#[derive(Debug)]
pub struct PendingHandle<T> {
    join: JoinHandle<SchedulerResult<T>>,
    deferred: Deferred<T>,
}

impl<T> PendingHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// The computation being completed in the background.
    pub fn deferred(&self) -> &Deferred<T> {
        &self.deferred
    }

    pub async fn wait(self) -> anyhow::Result<T> {
        match self.join.await {
            Ok(outcome) => outcome.map_err(SchedulerError::into_caller_error),
            Err(join_err) => Err(anyhow::anyhow!(
                "Background completion of deferred computation failed: {}",
                join_err
            )),
        }
    }
}

/// Drive `deferred`, treating an earlier completion as success.
async fn settle<T>(deferred: &Deferred<T>) -> SchedulerResult<T>
where
    T: Clone + Send + 'static,
{
    match deferred.drive().await {
        Err(SchedulerError::AlreadyCompleted) => {
            debug!("Deferred computation already completed; reusing its result");
            deferred
                .completed_value()
                .await
                .ok_or(SchedulerError::AlreadyCompleted)
        }
        outcome => outcome,
    }
}

/// Await `value` if it is deferred, otherwise return it unchanged.
///
/// A computation that already completed yields its earlier result without
/// running again. Failures of the computation come back as the original error.
pub async fn resolve_maybe_deferred<T>(value: MaybeDeferred<T>) -> anyhow::Result<T>
where
    T: Clone + Send + 'static,
{
    match value {
        MaybeDeferred::Value(value) => Ok(value),
        MaybeDeferred::Deferred(deferred) => settle(&deferred)
            .await
            .map_err(SchedulerError::into_caller_error),
    }
}

/// Run `value` to completion from synchronous code.
///
/// Plain values return immediately without touching a scheduler. Deferred
/// values block the calling thread on the context's scheduler, or on a fresh
/// one built for this call (and released before returning) when the context
/// has none or its scheduler is closed. A caller that is itself inside some
/// other runtime (an async task, a `spawn_blocking` thread) still blocks; the
/// scheduler is driven from a helper thread.
///
/// Only when the context's scheduler is the one already running the caller
/// does this return [`Completion::Pending`].
pub fn run_to_completion<T>(
    ctx: &mut ExecutionContext,
    value: MaybeDeferred<T>,
) -> anyhow::Result<Completion<T>>
where
    T: Clone + Send + 'static,
{
    let deferred = match value {
        MaybeDeferred::Value(value) => return Ok(Completion::Ready(value)),
        MaybeDeferred::Deferred(deferred) => deferred,
    };

    let (scheduler, fresh) = match ctx.usable_scheduler() {
        Some(scheduler) if scheduler.is_running_caller() => {
            return defer_to(&scheduler, deferred);
        }
        Some(scheduler) => (scheduler, false),
        None => {
            let scheduler = ctx
                .build_scheduler()
                .map_err(SchedulerError::into_caller_error)?;
            debug!("No usable scheduler in context; built one for this call");
            (scheduler, true)
        }
    };

    let previous = fresh.then(|| ctx.replace_scheduler(Some(scheduler.clone())));
    let outcome = scheduler
        .run_blocking(settle(&deferred))
        .and_then(|outcome| outcome);
    if let Some(previous) = previous {
        ctx.replace_scheduler(previous);
    }

    match outcome {
        Ok(value) => Ok(Completion::Ready(value)),
        // another thread started driving the scheduler in the meantime
        Err(SchedulerError::Busy) if !fresh => defer_to(&scheduler, deferred),
        Err(err) => Err(err.into_caller_error()),
    }
}

fn defer_to<T>(scheduler: &Scheduler, deferred: Deferred<T>) -> anyhow::Result<Completion<T>>
where
    T: Clone + Send + 'static,
{
    debug!("Scheduler busy; completing deferred computation in the background");
    let task = deferred.clone();
    let join = scheduler
        .spawn(async move { settle(&task).await })
        .map_err(SchedulerError::into_caller_error)?;

    Ok(Completion::Pending(PendingHandle { join, deferred }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("unrelated failure")]
    struct Unrelated;

    #[tokio::test]
    async fn test_resolve_plain_value() {
        let value = resolve_maybe_deferred(MaybeDeferred::Value("not async"))
            .await
            .unwrap();
        assert_eq!(value, "not async");
    }

    #[tokio::test]
    async fn test_resolve_deferred_value() {
        let deferred = Deferred::new(async { Ok(21 * 2) });
        assert_eq!(resolve_maybe_deferred(deferred.into()).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_resolve_twice_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let deferred = Deferred::new(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("r".to_string())
        });

        let first = resolve_maybe_deferred(deferred.clone().into()).await.unwrap();
        let second = resolve_maybe_deferred(deferred.into()).await.unwrap();
        assert_eq!(first, "r");
        assert_eq!(second, "r");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_propagates_failure() {
        let deferred: Deferred<u8> = Deferred::new(async { Err(Unrelated.into()) });
        let err = resolve_maybe_deferred(deferred.into()).await.unwrap_err();
        assert!(err.downcast_ref::<Unrelated>().is_some());
    }

    #[test]
    fn test_run_plain_value_builds_nothing() {
        let mut ctx = ExecutionContext::default();
        let completion = run_to_completion(&mut ctx, MaybeDeferred::Value("not async")).unwrap();
        assert_eq!(completion.into_ready(), Some("not async"));
        assert_eq!(ctx.schedulers_created(), 0);
        assert!(ctx.active_scheduler().is_none());
    }

    #[test]
    fn test_run_without_scheduler() {
        let mut ctx = ExecutionContext::default();
        let deferred = Deferred::new(async {
            tokio::task::yield_now().await;
            Ok(42)
        });

        let completion = run_to_completion(&mut ctx, deferred.into()).unwrap();
        assert_eq!(completion.into_ready(), Some(42));
        assert_eq!(ctx.schedulers_created(), 1);
        assert!(ctx.active_scheduler().is_none());
    }

    #[test]
    fn test_run_uses_active_scheduler() {
        let scheduler = Arc::new(Scheduler::build(&BridgeConfig::default()).unwrap());
        let mut ctx = ExecutionContext::with_scheduler(BridgeConfig::default(), scheduler.clone());

        let completion = run_to_completion(&mut ctx, Deferred::new(async { Ok(1) }).into()).unwrap();
        assert!(completion.is_ready());
        assert_eq!(ctx.schedulers_created(), 0);
        assert!(Arc::ptr_eq(ctx.active_scheduler().unwrap(), &scheduler));
    }

    #[test]
    fn test_run_replaces_closed_scheduler_for_the_call() {
        let closed = Arc::new(Scheduler::build(&BridgeConfig::default()).unwrap());
        closed.close();
        let mut ctx = ExecutionContext::with_scheduler(BridgeConfig::default(), closed.clone());

        let completion = run_to_completion(&mut ctx, Deferred::new(async { Ok(8) }).into()).unwrap();
        assert_eq!(completion.into_ready(), Some(8));
        assert_eq!(ctx.schedulers_created(), 1);
        assert!(Arc::ptr_eq(ctx.active_scheduler().unwrap(), &closed));
    }

    #[test]
    fn test_run_already_completed() {
        let mut ctx = ExecutionContext::default();
        let deferred = Deferred::new(async { Ok(3) });

        let first = run_to_completion(&mut ctx, deferred.clone().into()).unwrap();
        let second = run_to_completion(&mut ctx, deferred.into()).unwrap();
        assert_eq!(first.into_ready(), Some(3));
        assert_eq!(second.into_ready(), Some(3));
    }

    #[test]
    fn test_run_propagates_failure() {
        let mut ctx = ExecutionContext::default();
        let deferred: Deferred<u8> = Deferred::new(async { Err(Unrelated.into()) });
        let err = run_to_completion(&mut ctx, deferred.into()).unwrap_err();
        assert!(err.downcast_ref::<Unrelated>().is_some());
        assert!(ctx.active_scheduler().is_none());
    }

    #[test]
    fn test_run_reentrant_returns_pending() {
        let scheduler = Arc::new(Scheduler::build(&BridgeConfig::default()).unwrap());
        let mut ctx = ExecutionContext::with_scheduler(BridgeConfig::default(), scheduler.clone());

        let value = scheduler
            .run_until_complete(async move {
                let completion =
                    run_to_completion(&mut ctx, Deferred::new(async { Ok(7) }).into()).unwrap();
                assert!(!completion.is_ready());
                completion.into_value().await.unwrap()
            })
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_inside_unrelated_runtime_builds_fresh_scheduler() {
        let mut ctx = ExecutionContext::default();
        let completion = run_to_completion(&mut ctx, Deferred::new(async { Ok(7) }).into()).unwrap();

        assert_eq!(completion.into_ready(), Some(7));
        assert_eq!(ctx.schedulers_created(), 1);
        assert!(ctx.active_scheduler().is_none());
    }

    #[tokio::test]
    async fn test_run_with_idle_scheduler_inside_runtime_completes() {
        let idle = Arc::new(Scheduler::build(&BridgeConfig::default()).unwrap());
        let mut ctx = ExecutionContext::with_scheduler(BridgeConfig::default(), idle);

        let completion = run_to_completion(&mut ctx, Deferred::new(async { Ok(7) }).into()).unwrap();
        assert!(completion.is_ready());

        let value = tokio::time::timeout(Duration::from_secs(2), completion.into_value())
            .await
            .expect("idle scheduler work must complete")
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(ctx.schedulers_created(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_on_blocking_thread_is_ready() {
        let ready = tokio::task::spawn_blocking(|| {
            let mut ctx = ExecutionContext::default();
            run_to_completion(&mut ctx, Deferred::new(async { Ok(42) }).into())
                .unwrap()
                .into_ready()
        })
        .await
        .unwrap();
        assert_eq!(ready, Some(42));
    }

    #[tokio::test]
    async fn test_run_with_borrowed_running_runtime_returns_pending() {
        let borrowed = Arc::new(Scheduler::from_handle(tokio::runtime::Handle::current()));
        let mut ctx = ExecutionContext::with_scheduler(BridgeConfig::default(), borrowed);

        let completion = run_to_completion(&mut ctx, Deferred::new(async { Ok(7) }).into()).unwrap();
        let handle = match completion {
            Completion::Pending(handle) => handle,
            Completion::Ready(_) => panic!("expected a pending handle"),
        };
        assert_eq!(handle.wait().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_pending_failure_propagates() {
        let borrowed = Arc::new(Scheduler::from_handle(tokio::runtime::Handle::current()));
        let mut ctx = ExecutionContext::with_scheduler(BridgeConfig::default(), borrowed);

        let deferred: Deferred<u8> = Deferred::new(async { Err(Unrelated.into()) });
        let completion = run_to_completion(&mut ctx, deferred.into()).unwrap();
        assert!(!completion.is_ready());
        let err = completion.into_value().await.unwrap_err();
        assert!(err.downcast_ref::<Unrelated>().is_some());
    }
}
