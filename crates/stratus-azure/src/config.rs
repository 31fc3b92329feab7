//! Azure provider configuration
//!
//! The resource group (and everything else the engine needs) is an explicit
//! configuration value threaded through the provider constructor, never
//! ambient state.

use crate::error::{AzureError, Result};
use std::time::Duration;

/// Public ARM control-plane endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const DEFAULT_PUBLISHERS: &[&str] = &["Canonical", "MicrosoftWindowsServer"];
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the Azure compute provider
#[derive(Debug, Clone)]
pub struct ArmConfig {
    /// Subscription every request is scoped to
    pub subscription_id: String,

    /// Resource group holding the nodes managed by this provider
    pub resource_group: String,

    /// Bearer token for the ARM control plane
    pub access_token: String,

    /// Control-plane base URL
    pub endpoint: String,

    /// Marketplace publishers scanned when listing images
    pub image_publishers: Vec<String>,

    /// Upper bound for deployment creation before rollback
    pub operation_timeout: Duration,

    /// Wait between deployment creation attempts
    pub poll_interval: Duration,
}

impl ArmConfig {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            access_token: access_token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            image_publishers: DEFAULT_PUBLISHERS.iter().map(|p| p.to_string()).collect(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create ArmConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let subscription_id = std::env::var("AZURE_SUBSCRIPTION_ID")
            .map_err(|_| AzureError::MissingEnvVar("AZURE_SUBSCRIPTION_ID".to_string()))?;
        let resource_group = std::env::var("AZURE_RESOURCE_GROUP")
            .map_err(|_| AzureError::MissingEnvVar("AZURE_RESOURCE_GROUP".to_string()))?;
        let access_token = std::env::var("AZURE_ACCESS_TOKEN")
            .map_err(|_| AzureError::MissingEnvVar("AZURE_ACCESS_TOKEN".to_string()))?;

        let mut config = Self::new(subscription_id, resource_group, access_token);

        if let Ok(endpoint) = std::env::var("AZURE_ARM_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(publishers) = std::env::var("AZURE_IMAGE_PUBLISHERS") {
            config.image_publishers = split_publishers(&publishers);
        }

        Ok(config)
    }
}

/// Split a comma-separated publisher list, trimming entries and dropping
/// empty ones
pub(crate) fn split_publishers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ArmConfig::new("sub", "group", "token");

        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.image_publishers.contains(&"Canonical".to_string()));
    }

    #[test]
    fn test_split_publishers() {
        assert_eq!(
            split_publishers("Canonical, RedHat ,,MicrosoftWindowsServer"),
            vec!["Canonical", "RedHat", "MicrosoftWindowsServer"]
        );
        assert!(split_publishers("").is_empty());
        assert!(split_publishers(" , ").is_empty());
    }
}
