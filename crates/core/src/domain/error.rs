// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid ticket state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid station state: {0}")]
    InvalidStationState(String),

    #[error("Invalid priority: {0} (must be 1..=5)")]
    InvalidPriority(i32),

    #[error("Invalid queue position: {0}")]
    InvalidPosition(i32),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
