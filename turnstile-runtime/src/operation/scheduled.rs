use super::completion::{wait_settled, Completion, CompletionSource};
use crate::context::ExecutionContext;
use crate::error::BoxError;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

/// Boxed future produced by an execution delegate
pub type OperationFuture<R> = Pin<Box<dyn Future<Output = Result<R, BoxError>> + Send + 'static>>;

/// Type-erased execution delegate
pub type ExecuteFn<T, R> = Arc<dyn Fn(T) -> OperationFuture<R> + Send + Sync>;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Erase a closure returning any compatible future into an [`ExecuteFn`]
pub(crate) fn into_execute_fn<T, R, F, Fut, E>(execute: F) -> ExecuteFn<T, R>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<BoxError>,
{
    Arc::new(move |value: T| {
        let future = execute(value);
        Box::pin(async move { future.await.map_err(Into::into) }) as OperationFuture<R>
    })
}

/// One unit of scheduled work, from submission until it settles
pub(crate) struct ScheduledOperation<T, R> {
    pub(crate) id: u64,
    pub(crate) value: T,
    pub(crate) scope: String,
    pub(crate) is_deferred: bool,
    pub(crate) context: Option<ExecutionContext>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) completion: Arc<CompletionSource<R>>,
    execute: ExecuteFn<T, R>,
}

impl<T, R> ScheduledOperation<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Create an operation and the completion its submitter will await
    ///
    /// When a cancellation token is supplied, a watcher task settles the
    /// completion as cancelled once the token fires. The watcher exits as soon
    /// as the completion settles by any other path.
    pub(crate) fn new(
        value: T,
        execute: ExecuteFn<T, R>,
        scope: String,
        is_deferred: bool,
        context: Option<ExecutionContext>,
        cancellation: Option<CancellationToken>,
    ) -> (Arc<Self>, Completion<R>) {
        let (completion, handle) = CompletionSource::new();

        if let Some(token) = &cancellation {
            watch_cancellation(token.clone(), Arc::downgrade(&completion));
        }

        let operation = Arc::new(Self {
            id: NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed),
            value,
            scope,
            is_deferred,
            context,
            cancellation,
            completion,
            execute,
        });
        (operation, handle)
    }

    /// The execution delegate, for driving the operation on another task
    pub(crate) fn delegate(&self) -> ExecuteFn<T, R> {
        self.execute.clone()
    }

    pub(crate) fn cancellation_requested(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

fn watch_cancellation<R: Send + 'static>(
    token: CancellationToken,
    completion: Weak<CompletionSource<R>>,
) {
    let Some(source) = completion.upgrade() else {
        return;
    };
    let mut settled = source.subscribe();
    drop(source);

    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                if let Some(source) = completion.upgrade() {
                    source.try_cancel();
                }
            }
            // Also returns once the operation is dropped unsettled; nothing left to cancel then.
            _ = wait_settled(&mut settled) => {}
        }
    });
}

impl<T: std::fmt::Debug, R> std::fmt::Debug for ScheduledOperation<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledOperation")
            .field("id", &self.id)
            .field("value", &self.value)
            .field("scope", &self.scope)
            .field("is_deferred", &self.is_deferred)
            .finish()
    }
}
