use super::executor::{Executor, QueuedOperation};
use crate::context::ExecutionContext;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drain queued top-level operations one at a time until shutdown
///
/// Operations still queued when the shutdown signal fires are dropped, which
/// settles their callers' completions as abandoned.
pub(crate) async fn run_loop<T, R>(
    executor: Arc<Executor<T, R>>,
    mut queue: mpsc::UnboundedReceiver<QueuedOperation<T, R>>,
) where
    T: Clone + Debug + Send + Sync + 'static,
    R: Send + 'static,
{
    info!(scheduler = %executor.config.name, "Run loop started");

    loop {
        let operation = tokio::select! {
            biased;
            _ = executor.shutdown.cancelled() => break,
            next = queue.recv() => match next {
                Some(operation) => operation,
                None => break,
            },
        };

        executor
            .current_top_level
            .replace(operation.id, operation.value.clone());

        let context = match operation.context.clone() {
            Some(context) => context,
            None => {
                warn!(
                    scheduler = %executor.config.name,
                    operation = ?operation.value,
                    "Execution context was missing for queued operation, using a fresh one"
                );
                ExecutionContext::new()
            }
        };

        executor
            .currently_running
            .replace(operation.id, operation.clone());

        ExecutionContext::scope(context, executor.run_preemptively(&operation)).await;

        executor.current_top_level.release(operation.id);
        executor.currently_running.release(operation.id);
    }

    queue.close();
    let mut abandoned = 0usize;
    while queue.try_recv().is_ok() {
        abandoned += 1;
    }

    if abandoned > 0 {
        debug!(scheduler = %executor.config.name, abandoned, "Discarded queued operations");
    }
    info!(scheduler = %executor.config.name, "Run loop stopped");
}
