use super::executor::Executor;
use super::run_loop::run_loop;
use super::scheduler::Scheduler;
use crate::config::{load_toml_config, load_yaml_config, SchedulerConfig};
use crate::error::SchedulerError;
use config::Config;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::info;

/// Decides whether an incoming value jumps the queue
///
/// Receives the value of the active top-level operation (if any) and the
/// incoming value.
pub type PreemptionPredicate<T> = Arc<dyn Fn(Option<&T>, &T) -> bool + Send + Sync>;

/// Builder for the scheduler
pub struct SchedulerBuilder<T, R> {
    pub(crate) config: SchedulerConfig,
    pub(crate) is_preemptive: Option<PreemptionPredicate<T>>,
    _result: PhantomData<fn() -> R>,
}

impl<T, R> Default for SchedulerBuilder<T, R>
where
    T: Clone + Debug + Send + Sync + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> SchedulerBuilder<T, R>
where
    T: Clone + Debug + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Create a new scheduler builder with default settings
    pub fn new() -> Self {
        Self::with_settings(SchedulerConfig::default())
    }

    /// Create with explicit settings
    pub fn with_settings(config: SchedulerConfig) -> Self {
        Self {
            config,
            is_preemptive: None,
            _result: PhantomData,
        }
    }

    /// Create with TOML config file
    ///
    /// Settings are read from the `[scheduler]` table and can be overridden by
    /// `TURNSTILE_SCHEDULER__*` environment variables.
    pub fn with_toml<P: AsRef<Path>>(path: P) -> Result<Self, SchedulerError> {
        Self::with_config(load_toml_config(path)?)
    }

    /// Create with YAML config file
    pub fn with_yaml<P: AsRef<Path>>(path: P) -> Result<Self, SchedulerError> {
        Self::with_config(load_yaml_config(path)?)
    }

    /// Create with custom config
    pub fn with_config(config: Config) -> Result<Self, SchedulerError> {
        Ok(Self::with_settings(SchedulerConfig::from_config(&config)?))
    }

    /// Let submissions matching `predicate` run immediately instead of queueing
    ///
    /// Without a predicate the scheduler is strictly first-in, first-out.
    ///
    /// # Example
    ///
    /// ```rust
    /// use turnstile_runtime::SchedulerBuilder;
    ///
    /// let builder = SchedulerBuilder::<String, ()>::new()
    ///     .preempt_when(|_current, incoming| incoming.starts_with("#!cancel"));
    /// ```
    pub fn preempt_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(Option<&T>, &T) -> bool + Send + Sync + 'static,
    {
        self.is_preemptive = Some(Arc::new(predicate));
        self
    }

    /// Build the scheduler and start its run loop
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime, since the run loop is
    /// spawned as a tokio task.
    pub fn build(self) -> Scheduler<T, R> {
        let preemptive = self.is_preemptive.is_some();
        let is_preemptive: PreemptionPredicate<T> = match self.is_preemptive {
            Some(predicate) => predicate,
            None => Arc::new(never_preempt::<T>),
        };

        info!(
            scheduler = %self.config.name,
            default_scope = %self.config.default_scope,
            abort_on_cancellation = self.config.abort_on_cancellation,
            preemptive,
            "Building scheduler"
        );

        let (sender, receiver) = mpsc::unbounded_channel();
        let executor = Arc::new(Executor::new(self.config, is_preemptive, sender));
        let handle = tokio::spawn(run_loop(executor.clone(), receiver));

        Scheduler {
            executor,
            run_loop: Mutex::new(Some(handle)),
        }
    }
}

fn never_preempt<T>(_current: Option<&T>, _incoming: &T) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_with_defaults() {
        let scheduler = SchedulerBuilder::<u32, ()>::new().build();
        assert_eq!(scheduler.config().default_scope, "default");
        assert!(!scheduler.is_disposed());
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn default_predicate_never_preempts() {
        let scheduler = SchedulerBuilder::<u32, ()>::new().build();
        assert!(!scheduler.executor.should_preempt(&1));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn predicate_sees_incoming_value() {
        let scheduler = SchedulerBuilder::<u32, ()>::new()
            .preempt_when(|current, incoming| current.is_none() && *incoming > 10)
            .build();
        assert!(scheduler.executor.should_preempt(&11));
        assert!(!scheduler.executor.should_preempt(&3));
        scheduler.shutdown().await;
    }

    #[test]
    fn with_settings_keeps_config() {
        let settings = SchedulerConfig {
            name: "kernel".into(),
            default_scope: "csharp".into(),
            abort_on_cancellation: true,
        };
        let builder = SchedulerBuilder::<u32, ()>::with_settings(settings.clone());
        assert_eq!(builder.config, settings);
        assert!(builder.is_preemptive.is_none());
    }
}
