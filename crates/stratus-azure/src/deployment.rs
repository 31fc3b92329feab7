//! Deployment lifecycle engine
//!
//! Creation with bounded retry and rollback on timeout, dependency-graph
//! resolution, and node view assembly.

use crate::api::{CleanupResources, ImageBlobStore, ResourceApi};
use crate::config::ArmConfig;
use crate::error::{AzureError, Result};
use crate::types::{
    Deployment, NETWORK_INTERFACE_TYPE, NetworkInterface, NodeDeployment, PUBLIC_IP_TYPE,
    PublicIpAddress,
};
use std::time::{Duration, Instant};

/// Azure compute provider.
///
/// Generic over the collaborator contracts so the engine can be exercised
/// against stubs. Holds no state across calls beyond its configuration;
/// operations on distinct node names are freely concurrent.
pub struct AzureCompute<A, C, B> {
    pub(crate) api: A,
    pub(crate) cleanup: C,
    pub(crate) blobs: B,
    pub(crate) config: ArmConfig,
}

impl<A, C, B> AzureCompute<A, C, B> {
    pub fn new(api: A, cleanup: C, blobs: B, config: ArmConfig) -> Self {
        tracing::debug!(
            "azure provider managing resource group {}",
            config.resource_group
        );
        Self {
            api,
            cleanup,
            blobs,
            config,
        }
    }

    pub fn config(&self) -> &ArmConfig {
        &self.config
    }
}

impl<A, C, B> AzureCompute<A, C, B>
where
    A: ResourceApi,
    C: CleanupResources,
    B: ImageBlobStore,
{
    /// Submit a deployment template and wait for the control plane to
    /// accept it.
    ///
    /// The create call is retried at the configured poll interval until a
    /// deployment object is observed or `timeout` elapses. On timeout the
    /// partially created resources are destroyed before the error is
    /// returned; dropping the future cancels the wait early.
    pub async fn create_deployment(
        &self,
        name: &str,
        template_body: &str,
        timeout: Duration,
    ) -> Result<Deployment> {
        let group = &self.config.resource_group;
        let started = Instant::now();

        loop {
            if let Some(deployment) = self
                .api
                .create_deployment(group, name, template_body)
                .await?
            {
                tracing::debug!(
                    "deployment {} accepted after {:?}",
                    name,
                    started.elapsed()
                );
                return Ok(deployment);
            }

            if started.elapsed() >= timeout {
                break;
            }

            tracing::debug!("deployment {} not observed yet, retrying", name);
            tokio::time::sleep(self.config.poll_interval).await;
        }

        tracing::warn!(
            "deployment {} was not created within {:?}, destroying partial resources",
            name,
            timeout
        );
        self.destroy_node(name).await?;

        Err(AzureError::Timeout {
            name: name.to_string(),
            timeout,
        })
    }

    /// Network interfaces declared by the deployment's dependency graph
    pub async fn network_interfaces_of(
        &self,
        deployment: &Deployment,
    ) -> Result<Vec<NetworkInterface>> {
        let group = deployment.resource_group()?;

        let mut interfaces = Vec::new();
        for dependency in deployment.dependencies() {
            if dependency.resource_type == NETWORK_INTERFACE_TYPE {
                let nic = self
                    .api
                    .get_network_interface(group, &dependency.resource_name)
                    .await?;
                interfaces.push(nic);
            }
        }
        Ok(interfaces)
    }

    /// Public addresses reachable through the deployment's network
    /// interfaces.
    ///
    /// Only the first public-address entry nested under each interface is
    /// resolved: one address per interface by convention.
    pub async fn public_addresses_of(
        &self,
        deployment: &Deployment,
    ) -> Result<Vec<PublicIpAddress>> {
        let group = deployment.resource_group()?;

        let mut addresses = Vec::new();
        for dependency in deployment.dependencies() {
            if dependency.resource_type != NETWORK_INTERFACE_TYPE {
                continue;
            }
            if let Some(nested) = dependency
                .depends_on
                .iter()
                .find(|d| d.resource_type == PUBLIC_IP_TYPE)
            {
                let address = self
                    .api
                    .get_public_ip_address(group, &nested.resource_name)
                    .await?;
                addresses.push(address);
            }
        }
        Ok(addresses)
    }

    /// Compose the fully-resolved node view for a deployment.
    ///
    /// The virtual machine and its instance view are two independent reads
    /// and may disagree if the control plane mutates state between them.
    /// Any fetch failure propagates; there is no partial assembly.
    pub async fn assemble_node(&self, deployment: Deployment) -> Result<NodeDeployment> {
        let public_addresses = self.public_addresses_of(&deployment).await?;
        let network_interfaces = self.network_interfaces_of(&deployment).await?;

        let group = &self.config.resource_group;
        let virtual_machine = self.api.get_virtual_machine(group, &deployment.name).await?;
        let instance_view = match &virtual_machine {
            Some(_) => Some(self.api.get_instance_view(group, &deployment.name).await?),
            None => None,
        };

        let user_metadata = virtual_machine.as_ref().and_then(|vm| vm.tags.clone());
        let tags = virtual_machine.as_ref().and_then(|vm| vm.user_tags());

        Ok(NodeDeployment {
            deployment,
            public_addresses,
            virtual_machine,
            instance_view,
            network_interfaces,
            user_metadata,
            tags,
        })
    }

    /// Fetch one node; `Ok(None)` when no deployment with that id exists
    pub async fn get_node(&self, id: &str) -> Result<Option<NodeDeployment>> {
        match self.api.get_deployment(&self.config.resource_group, id).await? {
            Some(deployment) => Ok(Some(self.assemble_node(deployment).await?)),
            None => Ok(None),
        }
    }

    /// List all nodes in the managed resource group.
    ///
    /// Deployments whose derived storage account still hosts a custom image
    /// were generalized into images and are not listed as nodes; a failed
    /// check skips the deployment as well, since there is nothing usable to
    /// list either way.
    pub async fn list_nodes(&self) -> Result<Vec<NodeDeployment>> {
        let deployments = self.api.list_deployments(&self.config.resource_group).await?;

        let mut nodes = Vec::new();
        for deployment in deployments {
            match self.is_generalized(&deployment).await {
                Ok(false) => nodes.push(self.assemble_node(deployment).await?),
                Ok(true) => {
                    tracing::debug!("skipping generalized deployment {}", deployment.name);
                }
                Err(err) => {
                    tracing::debug!(
                        "custom image check failed for {}: {}",
                        deployment.name,
                        err
                    );
                }
            }
        }
        Ok(nodes)
    }

    /// List the subset of nodes whose deployment names are in `ids`
    pub async fn list_nodes_by_ids(&self, ids: &[String]) -> Result<Vec<NodeDeployment>> {
        let nodes = self.list_nodes().await?;
        Ok(nodes
            .into_iter()
            .filter(|n| ids.iter().any(|id| id == n.name()))
            .collect())
    }

    async fn is_generalized(&self, deployment: &Deployment) -> Result<bool> {
        let account = storage_account_for(&deployment.name);
        let key = self
            .api
            .storage_account_key(&self.config.resource_group, &account)
            .await?;
        self.blobs.custom_image_exists(&account, &key).await
    }

    /// Tear down a node and verify every resource is gone.
    ///
    /// The cleanup collaborator owns the actual teardown; reporting
    /// resources still present is surfaced as [`AzureError::TeardownIncomplete`].
    pub async fn destroy_node(&self, id: &str) -> Result<()> {
        tracing::info!("destroying node {}", id);
        if self.cleanup.cleanup(id).await? {
            Ok(())
        } else {
            Err(AzureError::TeardownIncomplete(id.to_string()))
        }
    }

    /// One-shot restart passthrough; the vendor call is authoritative
    pub async fn reboot_node(&self, id: &str) -> Result<()> {
        self.api
            .restart_virtual_machine(&self.config.resource_group, id)
            .await
    }

    /// One-shot stop passthrough
    pub async fn suspend_node(&self, id: &str) -> Result<()> {
        self.api
            .stop_virtual_machine(&self.config.resource_group, id)
            .await
    }

    /// One-shot start passthrough
    pub async fn resume_node(&self, id: &str) -> Result<()> {
        self.api
            .start_virtual_machine(&self.config.resource_group, id)
            .await
    }
}

/// Storage account a generalized deployment's image lands in: the
/// alphanumeric part of the deployment name plus `stor`
pub(crate) fn storage_account_for(deployment_name: &str) -> String {
    let mut account: String = deployment_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    account.push_str("stor");
    account
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_account_for() {
        assert_eq!(storage_account_for("node-1"), "node1stor");
        assert_eq!(storage_account_for("web_frontend.2"), "webfrontend2stor");
        assert_eq!(storage_account_for(""), "stor");
    }
}
