//! Error types for catalog and lake storage operations.

use thiserror::Error;

use crate::error::PlanError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or mutating the catalog and the lake.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key already present (catalog insert or conditional write lost).
    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    /// Key not found.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Invalid store specification (URL parsing failed).
    #[error("invalid store spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// Network or I/O error.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Sidecar could not be encoded or decoded.
    #[error("invalid sidecar {path}: {message}")]
    Serialization { path: String, message: String },

    /// Planning failed before any I/O happened.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Generic error from the underlying object store.
    #[error("object store error: {0}")]
    ObjectStore(object_store::Error),
}

impl StoreError {
    /// Returns true if this error indicates the key already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true if this error indicates the key was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for planner collisions surfaced through the store.
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::Plan(e) if e.is_collision())
    }

    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::ObjectStore(_))
    }

    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Plan(e) => e.exit_code(),
            Self::NotFound { .. } => 1,
            Self::AlreadyExists { .. } => 1,
            _ => 2,
        }
    }

    /// Create from object_store error with context about the key.
    pub fn from_object_store(err: object_store::Error, path: &str) -> Self {
        match &err {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                path: path.to_string(),
            },
            object_store::Error::AlreadyExists { .. } => StoreError::AlreadyExists {
                path: path.to_string(),
            },
            object_store::Error::Precondition { .. } => StoreError::AlreadyExists {
                path: path.to_string(),
            },
            _ => StoreError::ObjectStore(err),
        }
    }
}

impl From<object_store::Error> for StoreError {
    fn from(err: object_store::Error) -> Self {
        StoreError::from_object_store(err, "unknown")
    }
}
