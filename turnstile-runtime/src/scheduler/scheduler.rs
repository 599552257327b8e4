use super::executor::Executor;
use super::lock;
use crate::config::SchedulerConfig;
use crate::error::{BoxError, SchedulerError};
use crate::operation::{into_execute_fn, Completion, ScheduledOperation, SubmitOptions};
use crate::source::{DeferredOperationSource, FnSource};
use std::fmt::Debug;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Serializes asynchronous operations submitted by many callers
///
/// Queued operations run one at a time, in submission order, on a single run
/// loop. Submissions accepted by the preemption predicate skip the queue and
/// run immediately on the submitting task. Before any top-level operation
/// runs, every registered [`DeferredOperationSource`] gets a chance to inject
/// prerequisite operations.
///
/// Dropping the scheduler disposes it.
pub struct Scheduler<T, R> {
    pub(crate) executor: Arc<Executor<T, R>>,
    pub(crate) run_loop: Mutex<Option<JoinHandle<()>>>,
}

impl<T, R> Scheduler<T, R>
where
    T: Clone + Debug + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Submit `value` to run through `execute` in the default scope
    pub async fn submit<F, Fut, E>(
        &self,
        value: T,
        execute: F,
    ) -> Result<Completion<R>, SchedulerError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.submit_with(value, execute, SubmitOptions::default())
            .await
    }

    /// Submit `value` with explicit scope, cancellation or context
    ///
    /// A queued submission returns as soon as the operation is enqueued. A
    /// preemptive submission returns only after the operation, and any
    /// deferred prerequisites, have finished; its completion is then already
    /// settled.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Disposed`] once the scheduler has been shut down.
    pub async fn submit_with<F, Fut, E>(
        &self,
        value: T,
        execute: F,
        options: SubmitOptions,
    ) -> Result<Completion<R>, SchedulerError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.executor.ensure_not_disposed()?;

        let execute = into_execute_fn(execute);
        let scope = options
            .scope
            .clone()
            .unwrap_or_else(|| self.executor.config.default_scope.clone());

        if self.executor.should_preempt(&value) {
            let (operation, completion) = ScheduledOperation::new(
                value,
                execute,
                scope,
                false,
                None,
                options.cancellation,
            );
            debug!(
                scheduler = %self.executor.config.name,
                operation = ?operation.value,
                "Running operation preemptively"
            );
            self.executor.run_preemptively(&operation).await;
            Ok(completion)
        } else {
            let context = options.captured_context();
            let (operation, completion) = ScheduledOperation::new(
                value,
                execute,
                scope,
                false,
                context,
                options.cancellation,
            );
            self.executor.enqueue(operation)?;
            Ok(completion)
        }
    }

    /// Cancel the operation the run loop is currently running, if any
    ///
    /// The delegate is not interrupted; only the caller's completion is
    /// settled as cancelled, which frees the run loop to move on.
    pub fn cancel_current_operation(&self) -> bool {
        self.cancel_current_operation_with(|_| {})
    }

    /// Like [`cancel_current_operation`](Self::cancel_current_operation), but
    /// hands the cancelled value to `on_cancellation` first
    pub fn cancel_current_operation_with<F>(&self, on_cancellation: F) -> bool
    where
        F: FnOnce(&T),
    {
        let Some(operation) = self.executor.currently_running.take() else {
            return false;
        };

        on_cancellation(&operation.value);
        operation.completion.try_cancel();
        info!(
            scheduler = %self.executor.config.name,
            operation = ?operation.value,
            "Cancelled current operation"
        );
        true
    }

    /// Register a deferred source built from a query and an execution delegate
    ///
    /// # Example
    ///
    /// ```rust
    /// use turnstile_runtime::{BoxError, SchedulerBuilder};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let scheduler = SchedulerBuilder::<String, String>::new().build();
    ///
    /// scheduler.register_deferred_operation_source(
    ///     |pending: &String, scope: &str| {
    ///         if scope == "python" { vec![format!("#!import for {pending}")] } else { Vec::new() }
    ///     },
    ///     |value: String| async move { Ok::<_, BoxError>(value) },
    /// )?;
    /// # scheduler.shutdown().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn register_deferred_operation_source<Q, F, Fut, E>(
        &self,
        get_deferred_operations: Q,
        execute: F,
    ) -> Result<(), SchedulerError>
    where
        Q: Fn(&T, &str) -> Vec<T> + Send + Sync + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.register_source(FnSource::new(get_deferred_operations, into_execute_fn(execute)))
    }

    /// Register a deferred source; sources are consulted in registration order
    pub fn register_source<S>(&self, source: S) -> Result<(), SchedulerError>
    where
        S: DeferredOperationSource<T, R> + 'static,
    {
        self.executor.ensure_not_disposed()?;
        self.executor.sources.register(Arc::new(source));
        debug!(
            scheduler = %self.executor.config.name,
            sources = self.executor.sources.len(),
            "Registered deferred operation source"
        );
        Ok(())
    }

    /// Value of the top-level operation currently occupying the scheduler
    pub fn current_top_level_operation(&self) -> Option<T> {
        self.executor.current_top_level.get()
    }

    /// Value of the queued operation the run loop is running
    pub fn currently_running_operation(&self) -> Option<T> {
        self.executor
            .currently_running
            .get()
            .map(|operation| operation.value.clone())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.executor.config
    }

    pub fn is_disposed(&self) -> bool {
        self.executor.is_disposed()
    }

    /// Stop accepting work and stop the run loop
    ///
    /// Operations already running may finish; queued operations are abandoned.
    /// Calling this more than once has no further effect.
    pub fn dispose(&self) {
        if self.executor.dispose() {
            info!(scheduler = %self.executor.config.name, "Scheduler disposed");
        }
    }

    /// Dispose the scheduler and wait for its run loop to exit
    pub async fn shutdown(self) {
        self.dispose();

        let handle = lock(&self.run_loop).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(scheduler = %self.executor.config.name, error = %e, "Run loop terminated abnormally");
            }
        }
    }
}

impl<T, R> Drop for Scheduler<T, R> {
    fn drop(&mut self) {
        self.executor.dispose();
    }
}
