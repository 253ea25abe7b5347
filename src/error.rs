//! Error types for the guardrail.
//!
//! This module defines all error types used throughout the crate, providing
//! structured error handling with enough context to explain a failed request.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the guardrail.
#[derive(Error, Debug)]
pub enum Error {
    /// A policy, lexicon or configuration record failed validation
    #[error("Validation error: {message}")]
    Validation {
        /// Detailed error message
        message: String,
        /// Field that caused the error, if applicable
        field: Option<String>,
    },

    /// A string could not be parsed into one of the crate's enums
    #[error("Parse error: {message}")]
    Parse {
        /// Detailed error message
        message: String,
    },

    /// An upstream classifier or extractor failed to produce a signal
    #[error("Signal error in {stage}: {message}")]
    Signal {
        /// Pipeline stage that failed (intent, domain, granularity, extraction)
        stage: String,
        /// Detailed error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Detailed error message
        message: String,
        /// Configuration key that caused the error
        key: Option<String>,
    },

    /// Transport error while talking to an external predictor
    #[error("Integration error with {service}: {message}")]
    Integration {
        /// Name of the external service
        service: String,
        /// Detailed error message
        message: String,
    },

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms: {message}")]
    Timeout {
        /// Detailed error message
        message: String,
        /// Duration in milliseconds before timeout
        duration_ms: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal error (unexpected condition)
    #[error("Internal error: {message}")]
    Internal {
        /// Detailed error message
        message: String,
    },
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field context.
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    /// Create a signal construction error for the given pipeline stage.
    pub fn signal(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Signal {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: None,
        }
    }

    /// Create a configuration error with key context.
    pub fn config_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create an integration error.
    pub fn integration(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Integration {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>, duration_ms: u64) -> Self {
        Error::Timeout {
            message: message.into(),
            duration_ms,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Whether the request that produced this error must be treated as denied.
    ///
    /// Upstream signal failures never fall back to a default label, so the
    /// caller has to answer them the same way it answers a deny verdict.
    pub fn fails_closed(&self) -> bool {
        matches!(
            self,
            Error::Signal { .. } | Error::Integration { .. } | Error::Timeout { .. }
        )
    }

    /// Get the error category for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::Parse { .. } => "parse",
            Error::Signal { .. } => "signal",
            Error::Config { .. } => "config",
            Error::Integration { .. } => "integration",
            Error::Timeout { .. } => "timeout",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Yaml(_) => "yaml",
            Error::Internal { .. } => "internal",
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::config(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add field context to validation errors.
    fn with_field(self, field: impl Into<String>) -> Result<T>;

    /// Attribute a signal failure to a pipeline stage.
    fn with_stage(self, stage: &str) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn with_field(self, field: impl Into<String>) -> Result<T> {
        self.map_err(|e| match e {
            Error::Validation { message, .. } => Error::Validation {
                message,
                field: Some(field.into()),
            },
            other => other,
        })
    }

    fn with_stage(self, stage: &str) -> Result<T> {
        self.map_err(|e| match e {
            Error::Signal { message, .. } => Error::signal(stage, message),
            Error::Parse { message } => Error::signal(stage, message),
            other => other,
        })
    }
}
