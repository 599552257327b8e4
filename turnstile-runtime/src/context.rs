//! Ambient execution context carried from submitters to delegates.
//!
//! A submitting task's context is captured when an operation is queued and
//! reinstalled by the run loop before the operation executes, so that values
//! like a culture or correlation id flow across the queue.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

tokio::task_local! {
    static AMBIENT: ExecutionContext;
}

/// Serializable bag of ambient properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    properties: BTreeMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// The context installed on the current task, if any.
    pub fn capture() -> Option<Self> {
        AMBIENT.try_with(Clone::clone).ok()
    }

    /// The context installed on the current task, or an empty one.
    pub fn current() -> Self {
        Self::capture().unwrap_or_default()
    }

    /// Run `future` with `context` installed as the ambient context.
    pub async fn scope<F>(context: ExecutionContext, future: F) -> F::Output
    where
        F: Future,
    {
        AMBIENT.scope(context, future).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_outside_scope_is_none() {
        assert!(ExecutionContext::capture().is_none());
        assert_eq!(ExecutionContext::current(), ExecutionContext::default());
    }

    #[tokio::test]
    async fn scope_installs_and_restores() {
        let ctx = ExecutionContext::new().with_property("culture", "fr-FR");

        let seen = ExecutionContext::scope(ctx.clone(), async { ExecutionContext::capture() }).await;

        assert_eq!(seen, Some(ctx));
        assert!(ExecutionContext::capture().is_none());
    }

    #[tokio::test]
    async fn nested_scope_shadows_outer() {
        let outer = ExecutionContext::new().with_property("user", "outer");
        let inner = ExecutionContext::new().with_property("user", "inner");

        let (seen_inner, seen_outer) = ExecutionContext::scope(outer, async move {
            let seen_inner =
                ExecutionContext::scope(inner, async { ExecutionContext::current() }).await;
            (seen_inner, ExecutionContext::current())
        })
        .await;

        assert_eq!(seen_inner.get("user"), Some("inner"));
        assert_eq!(seen_outer.get("user"), Some("outer"));
    }
}
