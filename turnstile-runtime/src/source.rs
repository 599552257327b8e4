//! Deferred operation sources: providers of prerequisite work.

use crate::error::{panic_message, OperationError};
use crate::operation::{Completion, ExecuteFn, OperationFuture, ScheduledOperation};
use crate::scheduler::read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

/// Provider of operations that must run before a top-level operation
///
/// Every registered source is consulted, in registration order, right before
/// each top-level operation runs. The values it returns are executed one by
/// one, in order, through [`execute`](Self::execute).
///
/// # Example
///
/// ```rust
/// use turnstile_runtime::{DeferredOperationSource, OperationFuture};
///
/// struct EnsureKernelStarted;
///
/// impl DeferredOperationSource<String, String> for EnsureKernelStarted {
///     fn deferred_operations(&self, pending: &String, scope: &str) -> Vec<String> {
///         if scope == "python" && !pending.starts_with("#!") {
///             vec!["#!start-python".to_string()]
///         } else {
///             Vec::new()
///         }
///     }
///
///     fn execute(&self, value: String) -> OperationFuture<String> {
///         Box::pin(async move { Ok(format!("ran {value}")) })
///     }
/// }
/// ```
pub trait DeferredOperationSource<T, R>: Send + Sync {
    /// Values that must run before `pending` in `scope`; may be empty
    fn deferred_operations(&self, pending: &T, scope: &str) -> Vec<T>;

    /// Execute one of the values returned by [`deferred_operations`](Self::deferred_operations)
    fn execute(&self, value: T) -> OperationFuture<R>;
}

/// Source built from a pair of closures
pub(crate) struct FnSource<Q, T, R> {
    query: Q,
    execute: ExecuteFn<T, R>,
}

impl<Q, T, R> FnSource<Q, T, R> {
    pub(crate) fn new(query: Q, execute: ExecuteFn<T, R>) -> Self {
        Self { query, execute }
    }
}

impl<Q, T, R> DeferredOperationSource<T, R> for FnSource<Q, T, R>
where
    Q: Fn(&T, &str) -> Vec<T> + Send + Sync,
    T: Send + Sync,
    R: Send,
{
    fn deferred_operations(&self, pending: &T, scope: &str) -> Vec<T> {
        (self.query)(pending, scope)
    }

    fn execute(&self, value: T) -> OperationFuture<R> {
        (self.execute)(value)
    }
}

pub(crate) type SharedSource<T, R> = Arc<dyn DeferredOperationSource<T, R>>;

/// Append-only, ordered collection of registered sources
pub(crate) struct SourceRegistry<T, R> {
    sources: RwLock<Vec<SharedSource<T, R>>>,
}

impl<T, R> SourceRegistry<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn register(&self, source: SharedSource<T, R>) {
        crate::scheduler::write(&self.sources).push(source);
    }

    pub(crate) fn len(&self) -> usize {
        read(&self.sources).len()
    }

    /// Sources registered so far, in registration order
    pub(crate) fn snapshot(&self) -> Vec<SharedSource<T, R>> {
        read(&self.sources).clone()
    }

    /// Ask one source for the operations that must precede `parent`
    ///
    /// Produced operations share the parent's scope, carry no captured context
    /// and cannot be cancelled by the caller. A panicking query is reported as
    /// [`OperationError::DeferredExpansion`].
    pub(crate) fn expand(
        source: &SharedSource<T, R>,
        parent: &ScheduledOperation<T, R>,
    ) -> Result<Vec<(Arc<ScheduledOperation<T, R>>, Completion<R>)>, OperationError> {
        let values = catch_unwind(AssertUnwindSafe(|| {
            source.deferred_operations(&parent.value, &parent.scope)
        }))
        .map_err(|payload| OperationError::DeferredExpansion(panic_message(payload.as_ref())))?;

        let operations = values
            .into_iter()
            .map(|value| {
                let source = source.clone();
                let execute: ExecuteFn<T, R> = Arc::new(move |value: T| source.execute(value));
                ScheduledOperation::new(value, execute, parent.scope.clone(), true, None, None)
            })
            .collect();
        Ok(operations)
    }
}
