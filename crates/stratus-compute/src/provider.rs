//! Compute provider trait definition

use crate::error::Result;
use crate::template::{NodeTemplate, ProvisionedNode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Compute provider abstraction trait
///
/// Vendor adapters implement this trait to expose node lifecycle and
/// catalog operations through a unified interface. The associated types
/// carry the vendor's own node, hardware, image and location records; the
/// orchestrator treats them as opaque values it hands back to the same
/// provider.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Assembled node view returned by node operations
    type Node: Send + Sync;

    /// Hardware profile catalog entry
    type Hardware: Send + Sync;

    /// OS image catalog entry
    type Image: Send + Sync;

    /// Region catalog entry
    type Location: Send + Sync;

    /// Returns the provider name (e.g., "azure-arm")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Provision a node and return its assembled view with initial
    /// credentials.
    ///
    /// `name` must be unique per node; concurrent submissions under the
    /// same name are not arbitrated by the provider.
    async fn create_node(
        &self,
        group: &str,
        name: &str,
        template: &NodeTemplate,
    ) -> Result<ProvisionedNode<Self::Node>>;

    /// List all nodes managed by this provider
    async fn list_nodes(&self) -> Result<Vec<Self::Node>>;

    /// List the subset of nodes whose ids are in `ids`
    async fn list_nodes_by_ids(&self, ids: &[String]) -> Result<Vec<Self::Node>>;

    /// Fetch one node; `None` when no such node exists
    async fn get_node(&self, id: &str) -> Result<Option<Self::Node>>;

    /// Tear down a node and verify its resources are gone
    async fn destroy_node(&self, id: &str) -> Result<()>;

    /// Restart a node
    async fn reboot_node(&self, id: &str) -> Result<()>;

    /// Stop a node
    async fn suspend_node(&self, id: &str) -> Result<()>;

    /// Start a stopped node
    async fn resume_node(&self, id: &str) -> Result<()>;

    /// List hardware profiles across all regions
    async fn list_hardware_profiles(&self) -> Result<Vec<Self::Hardware>>;

    /// List OS images across all regions
    async fn list_images(&self) -> Result<Vec<Self::Image>>;

    /// Fetch one image by its unique id; `None` when it no longer exists
    async fn get_image(&self, id: &str) -> Result<Option<Self::Image>>;

    /// List regions where nodes can be provisioned
    async fn list_locations(&self) -> Result<Vec<Self::Location>>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/subscription information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}
