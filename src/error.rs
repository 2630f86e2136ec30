//! Error types for the experiment service.
//!
//! Domain errors carry enough context for a boundary layer to map them to
//! client responses; `ErrorKind` gives that layer a stable classification
//! without matching on every variant.

use thiserror::Error;
use uuid::Uuid;

use crate::models::ExperimentStatus;

/// Result type for experiment-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Variant traffic percentages do not sum to 100
    #[error("variants[].traffic_pct must sum to 100, got {0}")]
    VariantTraffic(u32),

    /// end_date is less than the minimum duration after start_date
    #[error("end_date must be at least {min_days} days after start_date")]
    Duration { min_days: i64 },

    /// Invalid lifecycle transition (e.g. starting a COMPLETED experiment)
    #[error("cannot {action} experiment in status '{current}'")]
    Transition {
        action: &'static str,
        current: ExperimentStatus,
    },

    #[error("cohort {0} not found")]
    CohortNotFound(Uuid),

    #[error("experiment {0} not found")]
    ExperimentNotFound(Uuid),

    /// Duplicate resource (unique-name collisions)
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error classification for boundary mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-correctable input error; never retried
    Validation,
    /// Referenced resource does not exist
    NotFound,
    /// State or uniqueness conflict
    Conflict,
    /// Cache or other recoverable infrastructure failure
    Infrastructure,
    /// Unexpected internal failure
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::VariantTraffic(_) | AppError::Duration { .. } => ErrorKind::Validation,
            AppError::CohortNotFound(_) | AppError::ExperimentNotFound(_) => ErrorKind::NotFound,
            AppError::Transition { .. } | AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Cache(_) => ErrorKind::Infrastructure,
            AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::Config(_)
            | AppError::Internal(_) => ErrorKind::Internal,
        }
    }
}
