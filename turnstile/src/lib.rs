//! # Turnstile - One-at-a-time Operation Scheduling
//!
//! Turnstile serializes asynchronous operations submitted concurrently by many
//! callers, the way a notebook kernel runs submitted cells strictly in order.
//!
//! ## Features
//!
//! - **Strict FIFO**: queued operations run one at a time, in submission order
//! - **Preemption**: a predicate lets urgent operations skip the queue
//! - **Deferred operations**: registered sources inject prerequisite work
//!   before each top-level operation, per scope
//! - **Cancellation**: per-operation tokens and cancel-current, with an
//!   optional hard interrupt
//! - **Failure isolation**: a failing or panicking operation only affects its
//!   own completion
//! - **Ambient context**: an execution context flows from submitter to delegate
//! - **Config support**: settings from TOML/YAML files and `TURNSTILE_` env vars
//!
//! ## Quick Start
//!
//! ```rust
//! use turnstile::{BoxError, SchedulerBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = SchedulerBuilder::<String, String>::new()
//!         .preempt_when(|_current, incoming| incoming == "#!cancel")
//!         .build();
//!
//!     // Make sure every python cell runs after the kernel has been started.
//!     scheduler.register_deferred_operation_source(
//!         |_pending: &String, scope: &str| {
//!             if scope == "python" { vec!["#!start".to_string()] } else { Vec::new() }
//!         },
//!         |value: String| async move { Ok::<_, BoxError>(value) },
//!     )?;
//!
//!     let first = scheduler
//!         .submit("1 + 1".to_string(), |code: String| async move {
//!             Ok::<_, BoxError>(format!("evaluated {code}"))
//!         })
//!         .await?;
//!
//!     assert_eq!(first.await?, "evaluated 1 + 1");
//!
//!     scheduler.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Create `config/turnstile.toml`:
//!
//! ```toml
//! [scheduler]
//! name = "kernel"
//! default_scope = "csharp"
//! abort_on_cancellation = true
//! ```
//!
//! Or `config/turnstile.yaml`:
//!
//! ```yaml
//! scheduler:
//!   name: kernel
//!   default_scope: csharp
//! ```
//!
//! You can also use environment variables with the `TURNSTILE_` prefix:
//!
//! ```bash
//! export TURNSTILE_SCHEDULER__DEFAULT_SCOPE=fsharp
//! ```

// Re-export core types
pub use turnstile_runtime::{
    load_toml_config, load_yaml_config, BoxError, Completion, DeferredOperationSource,
    ExecuteFn, ExecutionContext, OperationError, OperationFuture, PreemptionPredicate,
    Scheduler, SchedulerBuilder, SchedulerConfig, SchedulerError, SubmitOptions, DEFAULT_SCOPE,
};

// Make turnstile_runtime available for downstream integrations
pub use turnstile_runtime;

// Re-export commonly used types
pub use tokio_util::sync::CancellationToken;
