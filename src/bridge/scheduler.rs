// Cooperative scheduler and the execution context that carries it

use super::error::{SchedulerError, SchedulerResult};
use crate::config::{BridgeConfig, SchedulerFlavor};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// A tokio runtime that drives one computation at a time.
///
/// Owned schedulers are built from a [`BridgeConfig`]; borrowed ones wrap a
/// handle to a runtime someone else runs.
pub struct Scheduler {
    runtime: Option<Runtime>,
    handle: Handle,
    driving: AtomicBool,
    closed: AtomicBool,
}

struct DrivingGuard<'a>(&'a AtomicBool);

impl Drop for DrivingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    pub fn build(config: &BridgeConfig) -> SchedulerResult<Self> {
        let mut builder = match config.flavor {
            SchedulerFlavor::CurrentThread => Builder::new_current_thread(),
            SchedulerFlavor::MultiThread => {
                let mut builder = Builder::new_multi_thread();
                if let Some(workers) = config.worker_threads {
                    builder.worker_threads(workers.max(1));
                }
                builder
            }
        };
        let runtime = builder
            .enable_all()
            .thread_name(config.thread_name.clone())
            .build()?;

        tracing::debug!(
            "Built {:?} scheduler (thread name '{}')",
            config.flavor,
            config.thread_name
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            driving: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Wrap a handle to a runtime owned elsewhere.
    ///
    /// On a current-thread runtime only the owner's `block_on` drives IO and
    /// timers, so work driven through this wrapper must not depend on them.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            runtime: None,
            handle,
            driving: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_owned(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn is_driving(&self) -> bool {
        self.driving.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting work. The runtime itself is released on drop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Block the calling thread until `future` completes on this scheduler.
    ///
    /// Fails with `Busy` when the scheduler is already driving something or
    /// the calling thread is already inside a runtime.
    pub fn run_until_complete<F: Future>(&self, future: F) -> SchedulerResult<F::Output> {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }
        if Handle::try_current().is_ok() {
            return Err(SchedulerError::Busy);
        }
        if self.driving.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::Busy);
        }
        let _guard = DrivingGuard(&self.driving);

        Ok(match &self.runtime {
            Some(runtime) => runtime.block_on(future),
            None => self.handle.block_on(future),
        })
    }

    /// Like [`Scheduler::run_until_complete`], but callable from a thread that
    /// is already inside some other runtime: the calling thread blocks while a
    /// scoped helper thread drives this scheduler.
    ///
    /// Still fails with `Busy` when this scheduler is already driving work.
    pub fn run_blocking<F>(&self, future: F) -> SchedulerResult<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        if Handle::try_current().is_err() {
            return self.run_until_complete(future);
        }

        tracing::debug!("Caller is inside a runtime; driving scheduler from a helper thread");
        std::thread::scope(|scope| {
            scope
                .spawn(|| self.run_until_complete(future))
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        })
    }

    /// Whether work handed to [`Scheduler::spawn`] can make progress while the
    /// caller holds the thread: the scheduler is driving something right now,
    /// or it is a borrowed handle used from inside a runtime (the runtime
    /// running the caller).
    pub fn is_running_caller(&self) -> bool {
        self.is_driving() || (!self.is_owned() && Handle::try_current().is_ok())
    }

    /// Hand work to the scheduler to complete in the background.
    pub fn spawn<F>(&self, future: F) -> SchedulerResult<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }
        Ok(self.handle.spawn(future))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Dropping a runtime from async code panics; background shutdown never does.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Explicit execution context threaded into the bridge.
///
/// Holds the active scheduler (if any) and the configuration used when a
/// call has to build a fresh one.
pub struct ExecutionContext {
    config: BridgeConfig,
    scheduler: Option<Arc<Scheduler>>,
    schedulers_created: usize,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl ExecutionContext {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            scheduler: None,
            schedulers_created: 0,
        }
    }

    pub fn with_scheduler(config: BridgeConfig, scheduler: Arc<Scheduler>) -> Self {
        Self {
            config,
            scheduler: Some(scheduler),
            schedulers_created: 0,
        }
    }

    pub fn active_scheduler(&self) -> Option<&Arc<Scheduler>> {
        self.scheduler.as_ref()
    }

    /// The active scheduler, unless it has been closed.
    pub fn usable_scheduler(&self) -> Option<Arc<Scheduler>> {
        self.scheduler.as_ref().filter(|s| !s.is_closed()).cloned()
    }

    /// Install `scheduler` as the active one, returning the previous one.
    pub fn replace_scheduler(&mut self, scheduler: Option<Arc<Scheduler>>) -> Option<Arc<Scheduler>> {
        std::mem::replace(&mut self.scheduler, scheduler)
    }

    /// Number of schedulers this context has built for individual calls.
    pub fn schedulers_created(&self) -> usize {
        self.schedulers_created
    }

    pub(crate) fn build_scheduler(&mut self) -> SchedulerResult<Arc<Scheduler>> {
        let scheduler = Scheduler::build(&self.config)?;
        self.schedulers_created += 1;
        Ok(Arc::new(scheduler))
    }
}
