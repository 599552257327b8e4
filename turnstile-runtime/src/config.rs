use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

use crate::error::SchedulerError;

/// Scope used when a submission does not name one
pub const DEFAULT_SCOPE: &str = "default";

/// Prefix for environment variable overrides, e.g. `TURNSTILE_SCHEDULER__NAME`
const ENV_PREFIX: &str = "TURNSTILE";

/// Section of the config file holding scheduler settings
const CONFIG_SECTION: &str = "scheduler";

/// Runtime settings for a scheduler instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name attached to every log event emitted by the scheduler
    pub name: String,
    /// Scope given to submissions that do not specify one
    pub default_scope: String,
    /// Abort the delegate's task when its cancellation token fires
    pub abort_on_cancellation: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "turnstile".to_string(),
            default_scope: DEFAULT_SCOPE.to_string(),
            abort_on_cancellation: false,
        }
    }
}

impl SchedulerConfig {
    /// Read the `[scheduler]` section, falling back to defaults when absent
    pub fn from_config(config: &Config) -> Result<Self, SchedulerError> {
        match config.get::<SchedulerConfig>(CONFIG_SECTION) {
            Ok(settings) => Ok(settings),
            Err(config::ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Load config from a specific TOML file
pub fn load_toml_config<P: AsRef<Path>>(path: P) -> Result<Config, SchedulerError> {
    load_config(path.as_ref(), FileFormat::Toml, environment())
}

/// Load config from a specific YAML file
pub fn load_yaml_config<P: AsRef<Path>>(path: P) -> Result<Config, SchedulerError> {
    load_config(path.as_ref(), FileFormat::Yaml, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load_config(
    path: &Path,
    format: FileFormat,
    environment: Environment,
) -> Result<Config, SchedulerError> {
    let config = Config::builder()
        .add_source(File::from(path).format(format))
        .add_source(environment)
        .build()?;
    Ok(config)
}
