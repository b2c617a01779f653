use std::time::Duration;

use crate::error::ConfigError;
use crate::overlay::legend::DEFAULT_CANDIDATE_DEADLINE;
use crate::overlay::registry::RegistryOptions;

pub const DEFAULT_ANNOTATION_SOURCE: &str = "data/annotations.kmz";
/// Upper bound on a remote annotation download, connect to last byte.
pub const DEFAULT_ANNOTATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime settings, read from the environment (or a `.env` file).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub annotation_source: String,
    pub annotation_timeout: Duration,
    pub legend_deadline: Duration,
    pub registry: RegistryOptions,
    pub window_size: (f32, f32),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            annotation_source: DEFAULT_ANNOTATION_SOURCE.to_string(),
            annotation_timeout: DEFAULT_ANNOTATION_TIMEOUT,
            legend_deadline: DEFAULT_CANDIDATE_DEADLINE,
            registry: RegistryOptions::default(),
            window_size: (1600.0, 960.0),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(source) = dotenv::var("ANNOTATION_SOURCE") {
            config.annotation_source = source;
        }
        if let Some(deadline) = duration_var("LEGEND_DEADLINE_MS")? {
            config.legend_deadline = deadline;
        }
        if let Some(timeout) = duration_var("ANNOTATION_TIMEOUT_MS")? {
            config.annotation_timeout = timeout;
        }

        Ok(config)
    }
}

/// Milliseconds from the environment, `None` when the variable is unset.
fn duration_var(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    match dotenv::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|millis| Some(Duration::from_millis(millis)))
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(None),
    }
}
