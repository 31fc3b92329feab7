//! Consumed collaborator contracts
//!
//! The deployment engine depends only on these traits. The concrete ARM
//! client in [`crate::arm`] implements [`ResourceApi`]; cleanup and
//! blob-store implementations are supplied by the embedding application.

use crate::error::Result;
use crate::types::{
    Deployment, ImageVersion, InstanceView, NetworkInterface, Offer, ProviderResourceType,
    PublicIpAddress, Region, Sku, StorageAccount, VirtualMachine, VmImage, VmSize,
};
use async_trait::async_trait;

/// Typed request/response bindings to the cloud control plane.
///
/// Implementations must be reentrant; the engine issues a fresh call per
/// operation and holds no state across them.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Submit a deployment template. `None` while the control plane has not
    /// produced a deployment object for the name yet.
    async fn create_deployment(
        &self,
        group: &str,
        name: &str,
        template: &str,
    ) -> Result<Option<Deployment>>;

    async fn get_deployment(&self, group: &str, name: &str) -> Result<Option<Deployment>>;

    async fn list_deployments(&self, group: &str) -> Result<Vec<Deployment>>;

    async fn get_virtual_machine(&self, group: &str, name: &str)
    -> Result<Option<VirtualMachine>>;

    /// Live instance status, a separate read from the machine resource
    async fn get_instance_view(&self, group: &str, name: &str) -> Result<InstanceView>;

    async fn start_virtual_machine(&self, group: &str, name: &str) -> Result<()>;

    async fn stop_virtual_machine(&self, group: &str, name: &str) -> Result<()>;

    async fn restart_virtual_machine(&self, group: &str, name: &str) -> Result<()>;

    async fn get_network_interface(&self, group: &str, name: &str) -> Result<NetworkInterface>;

    async fn get_public_ip_address(&self, group: &str, name: &str) -> Result<PublicIpAddress>;

    async fn list_locations(&self) -> Result<Vec<Region>>;

    /// Resource types offered by a provider namespace, with their regions
    async fn get_resource_provider(&self, namespace: &str) -> Result<Vec<ProviderResourceType>>;

    async fn list_vm_sizes(&self, location: &str) -> Result<Vec<VmSize>>;

    async fn list_offers(&self, location: &str, publisher: &str) -> Result<Vec<Offer>>;

    async fn list_skus(&self, location: &str, publisher: &str, offer: &str) -> Result<Vec<Sku>>;

    async fn list_versions(
        &self,
        location: &str,
        publisher: &str,
        offer: &str,
        sku: &str,
    ) -> Result<Vec<ImageVersion>>;

    async fn list_storage_accounts(&self, group: &str) -> Result<Vec<StorageAccount>>;

    async fn storage_account_key(&self, group: &str, account: &str) -> Result<String>;
}

/// Final teardown of every cloud-side resource belonging to a node
#[async_trait]
pub trait CleanupResources: Send + Sync {
    /// Returns true iff all resources for the node are confirmed removed
    async fn cleanup(&self, node_id: &str) -> Result<bool>;
}

/// Storage-hosted custom image discovery
#[async_trait]
pub trait ImageBlobStore: Send + Sync {
    async fn list_custom_images(
        &self,
        group: &str,
        storage_account: &str,
        key: &str,
        location: &str,
    ) -> Result<Vec<VmImage>>;

    async fn custom_image_exists(&self, storage_account: &str, key: &str) -> Result<bool>;
}
