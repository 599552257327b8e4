use super::builder::PreemptionPredicate;
use super::lock;
use super::state::OwnedSlot;
use crate::config::SchedulerConfig;
use crate::context::ExecutionContext;
use crate::error::{panic_message, OperationError, SchedulerError};
use crate::operation::{CompletionSource, ScheduledOperation};
use crate::source::SourceRegistry;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, warn, Instrument};

pub(crate) type QueuedOperation<T, R> = Arc<ScheduledOperation<T, R>>;

/// State shared between the façade and the run loop
pub(crate) struct Executor<T, R> {
    pub(crate) config: SchedulerConfig,
    pub(crate) sources: SourceRegistry<T, R>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) current_top_level: OwnedSlot<T>,
    pub(crate) currently_running: OwnedSlot<QueuedOperation<T, R>>,
    is_preemptive: PreemptionPredicate<T>,
    queue: Mutex<Option<mpsc::UnboundedSender<QueuedOperation<T, R>>>>,
}

impl<T, R> Executor<T, R> {
    pub(crate) fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn ensure_not_disposed(&self) -> Result<(), SchedulerError> {
        if self.is_disposed() {
            return Err(SchedulerError::Disposed);
        }
        Ok(())
    }

    /// Stop accepting work and signal the run loop; returns false if already disposed
    pub(crate) fn dispose(&self) -> bool {
        let sender = lock(&self.queue).take();
        self.shutdown.cancel();
        sender.is_some()
    }
}

impl<T, R> Executor<T, R>
where
    T: Clone + Debug + Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn new(
        config: SchedulerConfig,
        is_preemptive: PreemptionPredicate<T>,
        queue: mpsc::UnboundedSender<QueuedOperation<T, R>>,
    ) -> Self {
        Self {
            config,
            sources: SourceRegistry::new(),
            shutdown: CancellationToken::new(),
            current_top_level: OwnedSlot::new(),
            currently_running: OwnedSlot::new(),
            is_preemptive,
            queue: Mutex::new(Some(queue)),
        }
    }

    pub(crate) fn should_preempt(&self, incoming: &T) -> bool {
        let current = self.current_top_level.get();
        (self.is_preemptive)(current.as_ref(), incoming)
    }

    pub(crate) fn enqueue(&self, operation: QueuedOperation<T, R>) -> Result<(), SchedulerError> {
        let queue = lock(&self.queue);
        let sender = queue.as_ref().ok_or(SchedulerError::Disposed)?;
        sender.send(operation).map_err(|_| SchedulerError::Disposed)
    }

    /// Run every deferred prerequisite of `operation`, then `operation` itself
    ///
    /// Returns once the operation's completion has settled or the scheduler
    /// has been disposed. The chain stops early on either event; a disposed
    /// scheduler starts nothing further.
    pub(crate) async fn run_preemptively(&self, operation: &QueuedOperation<T, R>) {
        for source in self.sources.snapshot() {
            if self.chain_interrupted(operation) {
                break;
            }

            let deferred = match SourceRegistry::expand(&source, operation) {
                Ok(deferred) => deferred,
                Err(e) => {
                    error!(operation = ?operation.value, error = %e, "Deferred operation expansion failed");
                    if !operation.completion.try_settle(Err(e)) {
                        debug!(operation = ?operation.value, "Expansion failure ignored, operation already settled");
                    }
                    return;
                }
            };

            for (prerequisite, mut completion) in deferred {
                if self.chain_interrupted(operation) {
                    break;
                }
                self.run(&prerequisite, Some(operation.completion.as_ref())).await;
                if let Some(Err(e)) = completion.try_outcome() {
                    warn!(
                        operation = ?prerequisite.value,
                        parent = ?operation.value,
                        error = %e,
                        "Deferred operation failed"
                    );
                }
            }
        }

        if self.is_disposed() {
            debug!(operation = ?operation.value, "Scheduler disposed before operation could run");
            return;
        }

        self.run(operation, None).await;
        self.wait_settled(operation).await;
    }

    fn chain_interrupted(&self, operation: &ScheduledOperation<T, R>) -> bool {
        self.is_disposed() || operation.completion.is_settled()
    }

    /// Wait for the operation to settle, bounded by scheduler shutdown
    async fn wait_settled(&self, operation: &ScheduledOperation<T, R>) {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {}
            _ = operation.completion.settled() => {}
        }
    }

    /// Drive one operation's delegate until it, or the operation's completion, settles
    ///
    /// A deferred operation also stops waiting once its `parent` settles.
    async fn run(
        &self,
        operation: &QueuedOperation<T, R>,
        parent: Option<&CompletionSource<R>>,
    ) {
        let claimed = self
            .current_top_level
            .claim_if_empty(operation.id, operation.value.clone());

        let span = debug_span!(
            "run",
            scheduler = %self.config.name,
            id = operation.id,
            operation = ?operation.value,
            scope = %operation.scope,
            deferred = operation.is_deferred,
        );
        self.drive(operation, parent).instrument(span).await;

        if claimed {
            self.current_top_level.release(operation.id);
        }
    }

    async fn drive(
        &self,
        operation: &QueuedOperation<T, R>,
        parent: Option<&CompletionSource<R>>,
    ) {
        if self.is_disposed() {
            debug!("Skipping operation, scheduler disposed");
            return;
        }
        if operation.completion.is_settled() {
            debug!("Skipping operation settled before it started");
            return;
        }

        debug!("Running operation");
        let mut task = self.spawn_delegate(operation);

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!("Scheduler disposed while operation was in flight");
            }
            joined = &mut task => {
                if let Err(e) = joined {
                    self.delegate_task_failed(operation, e);
                }
            }
            _ = operation.completion.settled() => {
                if self.config.abort_on_cancellation && operation.cancellation_requested() {
                    debug!("Aborting cancelled operation");
                    task.abort();
                }
            }
            _ = parent_settled(parent) => {
                debug!("Parent operation settled, no longer waiting on deferred operation");
            }
        }
        debug!(settled = operation.completion.is_settled(), "Operation run finished");
    }

    /// Spawn the delegate on its own task, carrying the ambient context along
    fn spawn_delegate(&self, operation: &QueuedOperation<T, R>) -> JoinHandle<()> {
        let execute = operation.delegate();
        let value = operation.value.clone();
        let completion = operation.completion.clone();
        let context = ExecutionContext::current();

        tokio::spawn(ExecutionContext::scope(context, async move {
            let outcome = execute(value).await.map_err(OperationError::Failed);
            completion.try_settle(outcome);
        }))
    }

    fn delegate_task_failed(&self, operation: &ScheduledOperation<T, R>, e: JoinError) {
        let failure = if e.is_panic() {
            OperationError::Panicked(panic_message(e.into_panic().as_ref()))
        } else {
            OperationError::Cancelled
        };

        let message = failure.to_string();
        if !operation.completion.try_settle(Err(failure)) {
            error!(operation = ?operation.value, error = %message, "Operation failed after it had already settled");
        }
    }
}

async fn parent_settled<R>(parent: Option<&CompletionSource<R>>) {
    match parent {
        Some(parent) => parent.settled().await,
        None => std::future::pending().await,
    }
}
