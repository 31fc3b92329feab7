//! Compute provider trait implementation
//!
//! Maps the engine's inherent operations onto the
//! [`stratus_compute::ComputeProvider`] surface, converting
//! [`AzureError`](crate::error::AzureError) into the shared error taxonomy
//! at the boundary.

use crate::api::{CleanupResources, ImageBlobStore, ResourceApi};
use crate::deployment::AzureCompute;
use crate::types::{NodeDeployment, Region, VmHardware, VmImage};
use async_trait::async_trait;
use stratus_compute::{
    AuthStatus, ComputeError, ComputeProvider, NodeTemplate, ProvisionedNode, Result,
};

pub const PROVIDER_NAME: &str = "azure-arm";

#[async_trait]
impl<A, C, B> ComputeProvider for AzureCompute<A, C, B>
where
    A: ResourceApi,
    C: CleanupResources,
    B: ImageBlobStore,
{
    type Node = NodeDeployment;
    type Hardware = VmHardware;
    type Image = VmImage;
    type Location = Region;

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &str {
        "Azure Resource Manager"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        Ok(self.auth_status().await)
    }

    async fn create_node(
        &self,
        group: &str,
        name: &str,
        template: &NodeTemplate,
    ) -> Result<ProvisionedNode<NodeDeployment>> {
        tracing::debug!("creating node {} for group {}", name, group);

        let deployment = self
            .create_deployment(name, &template.body, self.config().operation_timeout)
            .await
            .map_err(ComputeError::from)?;

        let node = self
            .assemble_node(deployment)
            .await
            .map_err(ComputeError::from)?;

        Ok(ProvisionedNode {
            node_id: name.to_string(),
            node,
            credentials: template.login.clone(),
        })
    }

    async fn list_nodes(&self) -> Result<Vec<NodeDeployment>> {
        self.list_nodes().await.map_err(ComputeError::from)
    }

    async fn list_nodes_by_ids(&self, ids: &[String]) -> Result<Vec<NodeDeployment>> {
        self.list_nodes_by_ids(ids).await.map_err(ComputeError::from)
    }

    async fn get_node(&self, id: &str) -> Result<Option<NodeDeployment>> {
        self.get_node(id).await.map_err(ComputeError::from)
    }

    async fn destroy_node(&self, id: &str) -> Result<()> {
        self.destroy_node(id).await.map_err(ComputeError::from)
    }

    async fn reboot_node(&self, id: &str) -> Result<()> {
        self.reboot_node(id).await.map_err(ComputeError::from)
    }

    async fn suspend_node(&self, id: &str) -> Result<()> {
        self.suspend_node(id).await.map_err(ComputeError::from)
    }

    async fn resume_node(&self, id: &str) -> Result<()> {
        self.resume_node(id).await.map_err(ComputeError::from)
    }

    async fn list_hardware_profiles(&self) -> Result<Vec<VmHardware>> {
        self.list_hardware_profiles().await.map_err(ComputeError::from)
    }

    async fn list_images(&self) -> Result<Vec<VmImage>> {
        self.list_images().await.map_err(ComputeError::from)
    }

    async fn get_image(&self, id: &str) -> Result<Option<VmImage>> {
        self.get_image(id).await.map_err(ComputeError::from)
    }

    async fn list_locations(&self) -> Result<Vec<Region>> {
        self.list_locations().await.map_err(ComputeError::from)
    }
}
