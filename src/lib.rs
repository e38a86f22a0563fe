// Core modules
pub mod bridge;
pub mod config;
pub mod utils;

// Re-export key types and functions
pub use bridge::{
    Completion, Deferred, ExecutionContext, MaybeDeferred, PendingHandle, Scheduler,
    SchedulerError, resolve_maybe_deferred, run_to_completion,
};
pub use config::{BridgeConfig, SchedulerFlavor, load_bridge_config};

use anyhow::Result;
use std::future::Future;

/// Convenience function to block on a future from synchronous code.
///
/// Wraps the future in a [`Deferred`] and runs it through
/// [`run_to_completion`] with `ctx`; may return [`Completion::Pending`] when
/// called from inside a running scheduler.
pub fn block_on_deferred<F, T>(ctx: &mut ExecutionContext, future: F) -> Result<Completion<T>>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Clone + Send + 'static,
{
    run_to_completion(ctx, Deferred::new(future).into())
}
