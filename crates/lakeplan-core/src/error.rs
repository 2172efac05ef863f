//! Error types for path planning and configuration.

use chrono::{DateTime, Utc};

/// Planner errors.
///
/// All of these are local validation failures. The planner performs no I/O
/// and never retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Timestamp is in the future relative to `now`, or could not be parsed.
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// `source`, `type` or `base_name` fails the `[a-z0-9_]+` rule.
    #[error("invalid {field} '{value}': must be non-empty and match [a-z0-9_]+")]
    InvalidIdentifier { field: &'static str, value: String },

    /// Data format outside `parquet | json | csv`.
    #[error("unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Data file path is already present in the catalog.
    #[error("path collision: {path} already exists")]
    PathCollision { path: String },

    /// A path handed back to the parser does not follow the partition grammar.
    #[error("invalid lake path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

impl PlanError {
    pub(crate) fn future_timestamp(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::InvalidTimestamp {
            value: timestamp.to_rfc3339(),
            reason: format!("timestamp is after now ({})", now.to_rfc3339()),
        }
    }

    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can resolve this by retrying with a fresh timestamp
    /// or a disambiguated base name.
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::PathCollision { .. })
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Result type for planner operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for `LakeConfig`.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Config parsed but is semantically inconsistent.
    #[error("invalid config: {message}")]
    Invalid { message: String },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
