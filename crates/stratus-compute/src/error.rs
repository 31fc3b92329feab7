//! Compute provider error types

use std::time::Duration;
use thiserror::Error;

/// Compute provider errors
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Deployment {name} was not created within {timeout:?} and has been rolled back")]
    ProvisionTimeout { name: String, timeout: Duration },

    #[error("Resources for node {0} are still present after teardown")]
    TeardownIncomplete(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ComputeError>;
