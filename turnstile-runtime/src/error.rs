//! Scheduler and operation error types.

use thiserror::Error;

/// Boxed error returned by execution delegates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the scheduler façade itself.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler has been disposed")]
    Disposed,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Terminal failure states of a single operation.
///
/// Callers only ever observe these through the [`Completion`](crate::Completion)
/// they were handed at submission time.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The execution delegate returned an error.
    #[error("operation failed: {0}")]
    Failed(#[source] BoxError),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("operation panicked: {0}")]
    Panicked(String),

    /// The scheduler shut down before the operation was run.
    #[error("operation was abandoned at scheduler shutdown")]
    Abandoned,

    /// A deferred operation source failed while expanding prerequisites.
    #[error("deferred operation expansion failed: {0}")]
    DeferredExpansion(String),
}

impl OperationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperationError::Cancelled)
    }
}

/// Render a panic payload the way the standard panic hook does.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_display_includes_source() {
        let err = OperationError::Failed("boom".into());
        assert_eq!(err.to_string(), "operation failed: boom");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn panic_message_handles_str_and_string() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "Box<dyn Any>");
    }

    #[test]
    fn only_cancelled_reports_cancelled() {
        assert!(OperationError::Cancelled.is_cancelled());
        assert!(!OperationError::Abandoned.is_cancelled());
    }
}
