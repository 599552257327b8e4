//! Turnstile Runtime - Core runtime for serialized operation scheduling
//!
//! This crate provides the run loop, operation records and deferred source
//! registry behind the `turnstile` crate.

mod config;
mod context;
mod error;
mod operation;
mod scheduler;
mod source;

// Re-export public API
pub use self::config::{load_toml_config, load_yaml_config, SchedulerConfig, DEFAULT_SCOPE};
pub use context::ExecutionContext;
pub use error::{BoxError, OperationError, SchedulerError};
pub use operation::{Completion, ExecuteFn, OperationFuture, SubmitOptions};
pub use scheduler::{PreemptionPredicate, Scheduler, SchedulerBuilder};
pub use source::DeferredOperationSource;
