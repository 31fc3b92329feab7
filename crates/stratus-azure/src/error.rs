//! Azure provider error types

use std::time::Duration;
use stratus_compute::ComputeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("Deployment {name} was not created within {timeout:?} and has been rolled back")]
    Timeout { name: String, timeout: Duration },

    #[error("Resources for node {0} are still present after teardown")]
    TeardownIncomplete(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Malformed resource id: {0}")]
    InvalidResourceId(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("ARM API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AzureError>;

impl From<AzureError> for ComputeError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::Timeout { name, timeout } => {
                ComputeError::ProvisionTimeout { name, timeout }
            }
            AzureError::TeardownIncomplete(id) => ComputeError::TeardownIncomplete(id),
            AzureError::NotFound(what) => ComputeError::ResourceNotFound(what),
            AzureError::MissingEnvVar(var) => {
                ComputeError::InvalidConfig(format!("missing environment variable {}", var))
            }
            AzureError::InvalidResourceId(id) => {
                ComputeError::InvalidConfig(format!("malformed resource id {}", id))
            }
            other => ComputeError::ApiError(other.to_string()),
        }
    }
}
