use crate::context::ExecutionContext;
use tokio_util::sync::CancellationToken;

/// Per-submission settings
///
/// # Example
///
/// ```rust
/// use turnstile_runtime::SubmitOptions;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let options = SubmitOptions::new()
///     .scope("csharp")
///     .cancellation(token.clone());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub(crate) scope: Option<String>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) context: Option<ExecutionContext>,
    pub(crate) suppress_context_flow: bool,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope used to select deferred operations; defaults to the scheduler's default scope
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Token that cancels the operation when triggered
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Use `context` instead of capturing the submitter's ambient context
    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Queue the operation without any captured context
    pub fn suppress_context_flow(mut self) -> Self {
        self.suppress_context_flow = true;
        self
    }

    /// Context to attach to a queued operation
    pub(crate) fn captured_context(&self) -> Option<ExecutionContext> {
        if let Some(context) = &self.context {
            return Some(context.clone());
        }
        if self.suppress_context_flow {
            None
        } else {
            Some(ExecutionContext::current())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_context_wins_over_suppression() {
        let ctx = ExecutionContext::new().with_property("culture", "de-DE");
        let options = SubmitOptions::new().suppress_context_flow().context(ctx.clone());
        assert_eq!(options.captured_context(), Some(ctx));
    }

    #[test]
    fn suppressed_flow_captures_nothing() {
        let options = SubmitOptions::new().suppress_context_flow();
        assert!(options.captured_context().is_none());
    }

    #[tokio::test]
    async fn captures_ambient_context_by_default() {
        let ctx = ExecutionContext::new().with_property("user", "ada");
        let captured =
            ExecutionContext::scope(ctx.clone(), async { SubmitOptions::new().captured_context() })
                .await;
        assert_eq!(captured, Some(ctx));
    }
}
