// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// Every variant except `Storage` is recoverable by the caller and maps to a
/// stable error code via [`AppError::code`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Station unavailable: {0}")]
    StationUnavailable(String),

    #[error("Queue empty: {0}")]
    QueueEmpty(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl AppError {
    /// Stable error code for the surrounding system (HTTP mapping, logs).
    pub fn code(&self) -> &'static str {
        use crate::domain::DomainError;
        match self {
            AppError::Domain(DomainError::InvalidStateTransition { .. }) => "invalid_transition",
            AppError::Domain(DomainError::InvalidStationState(_)) => "invalid_station_state",
            AppError::Domain(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::StationUnavailable(_) => "station_unavailable",
            AppError::QueueEmpty(_) => "queue_empty",
            AppError::CapacityExceeded(_) => "capacity_exceeded",
            AppError::ConcurrencyConflict(_) => "concurrency_conflict",
            AppError::NotFound(_) => "not_found",
            AppError::Storage(_) => "storage_failure",
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// From implementation for infra crates (to avoid circular dependency)
impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Storage(err)
    }
}
