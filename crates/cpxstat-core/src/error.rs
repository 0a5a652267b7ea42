//! Error types for cpxstat.

use thiserror::Error;

/// Result type alias for registry and classification operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors surfaced by a polling cycle.
///
/// Unknown service names or status values in a query are not errors: they
/// simply match nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// The registry could not be reached, timed out, or answered non-2xx.
    #[error("registry unavailable at {url}: {reason}")]
    RegistryUnavailable { url: String, reason: String },

    /// An instance record is missing a field or carries an unparseable value.
    #[error("malformed metric for instance {instance}: field `{field}` {reason}")]
    MalformedMetric {
        instance: String,
        field: &'static str,
        reason: String,
    },
}

impl MonitorError {
    pub fn unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        MonitorError::RegistryUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(instance: impl Into<String>, field: &'static str, reason: impl ToString) -> Self {
        MonitorError::MalformedMetric {
            instance: instance.into(),
            field,
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config section `{0}` not found")]
    MissingSection(String),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
