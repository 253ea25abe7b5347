//! Runtime configuration.
//!
//! Configuration is layered: built-in defaults, then an optional file, then
//! `GUARDRAIL__*` environment variables (`GUARDRAIL__SERVER__PORT=8080`).

use crate::signal::DEFAULT_GRANULARITY_CONFIDENCE_THRESHOLD;
use crate::Result;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

/// Environment variable prefix.
const ENV_PREFIX: &str = "GUARDRAIL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    #[validate]
    pub server: ServerConfig,
    /// Decision cache settings
    #[validate]
    pub cache: CacheConfig,
    /// Telemetry settings
    pub telemetry: TelemetryConfig,
    /// Granularity guard settings
    #[validate]
    pub guard: GuardConfig,
    /// External predictor endpoints
    #[validate]
    pub predictors: PredictorsConfig,
    /// Policy table and lexicon sources
    pub policy: PolicySourceConfig,
}

impl Config {
    /// Load configuration from defaults and the environment.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from a file, with environment overrides on top.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.guard.granularity_confidence_threshold.is_finite() {
            return Err(crate::Error::config_key(
                "Granularity confidence threshold must be a finite number",
                "guard.granularity_confidence_threshold",
            ));
        }

        Validate::validate(self).map_err(|errors| {
            let key = errors
                .field_errors()
                .keys()
                .min()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "config".to_string());
            crate::Error::config_key(errors.to_string(), key)
        })
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    #[validate(length(min = 1))]
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Decision cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether decisions are cached
    pub enabled: bool,
    /// Maximum number of cached decisions
    #[validate(range(min = 1))]
    pub max_entries: usize,
    /// Lifetime of a cached decision in seconds
    #[validate(range(min = 1))]
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            ttl_secs: 300,
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Whether metrics are collected
    pub enabled: bool,
    /// Service name attached to logs
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "prompt-guardrail".to_string(),
        }
    }
}

/// Granularity guard settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GuardConfig {
    /// Below this granularity confidence the request is treated as record-level
    #[validate(range(min = 0.0, max = 1.0))]
    pub granularity_confidence_threshold: f64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            granularity_confidence_threshold: DEFAULT_GRANULARITY_CONFIDENCE_THRESHOLD,
        }
    }
}

/// External predictor endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PredictorsConfig {
    /// Base URL of the intent model server
    pub intent_url: Option<String>,
    /// Base URL of the domain model server
    pub domain_url: Option<String>,
    /// Base URL of the granularity model server
    pub granularity_url: Option<String>,
    /// Per-call timeout in milliseconds
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
}

impl PredictorsConfig {
    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PredictorsConfig {
    fn default() -> Self {
        Self {
            intent_url: None,
            domain_url: None,
            granularity_url: None,
            timeout_ms: 2_000,
        }
    }
}

/// Where the policy table and lexicon come from.
///
/// Unset paths fall back to the reference data compiled into the crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySourceConfig {
    /// Policy table file (YAML or JSON)
    pub policy_file: Option<PathBuf>,
    /// Extraction lexicon file (YAML or JSON)
    pub lexicon_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.guard.granularity_confidence_threshold, 0.75);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let mut config = Config::default();
        config.guard.granularity_confidence_threshold = f64::NAN;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config { key: Some(ref k), .. } if k == "guard.granularity_confidence_threshold"
        ));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = Config::default();
        config.guard.granularity_confidence_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, crate::Error::Config { .. }));
    }

    #[test]
    fn test_zero_cache_size_rejected() {
        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 8080\n\n[guard]\ngranularity_confidence_threshold = 0.9\n\n[predictors]\nintent_url = \"http://models:9000/intent\"\n"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.guard.granularity_confidence_threshold, 0.9);
        assert_eq!(
            config.predictors.intent_url.as_deref(),
            Some("http://models:9000/intent")
        );
        assert!(config.cache.enabled);
    }
}
