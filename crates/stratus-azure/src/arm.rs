//! ARM control-plane client
//!
//! Direct REST bindings for the deployment, virtual-machine,
//! network-interface, public-address and catalog endpoints, using Bearer
//! token authentication.

use crate::api::ResourceApi;
use crate::config::ArmConfig;
use crate::error::{AzureError, Result};
use crate::types::{
    Deployment, ImageVersion, InstanceView, NetworkInterface, Offer, ProviderResourceType,
    PublicIpAddress, Region, Sku, StorageAccount, VirtualMachine, VmSize,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

const DEPLOYMENT_API_VERSION: &str = "2021-04-01";
const COMPUTE_API_VERSION: &str = "2023-03-01";
const NETWORK_API_VERSION: &str = "2023-04-01";
const STORAGE_API_VERSION: &str = "2023-01-01";
const SUBSCRIPTION_API_VERSION: &str = "2022-12-01";

/// ARM REST client
pub struct ArmClient {
    client: reqwest::Client,
    config: ArmConfig,
}

impl ArmClient {
    pub fn new(config: ArmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.config.endpoint, path, api_version)
    }

    fn subscription_path(&self, rest: &str) -> String {
        format!("/subscriptions/{}{}", self.config.subscription_id, rest)
    }

    fn group_path(&self, group: &str, rest: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}{}",
            self.config.subscription_id, group, rest
        )
    }

    fn deployment_url(&self, group: &str, name: &str) -> String {
        self.url(
            &self.group_path(
                group,
                &format!("/providers/Microsoft.Resources/deployments/{}", name),
            ),
            DEPLOYMENT_API_VERSION,
        )
    }

    fn vm_url(&self, group: &str, name: &str, action: &str) -> String {
        self.url(
            &self.group_path(
                group,
                &format!("/providers/Microsoft.Compute/virtualMachines/{}{}", name, action),
            ),
            COMPUTE_API_VERSION,
        )
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AzureError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        Self::parse(response).await
    }

    /// GET where a 404 is a valid outcome, not an error
    async fn get_json_opt<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::parse(response).await?))
    }

    /// POST an action endpoint and discard the (empty) body
    async fn post_action(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AzureError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceApi for ArmClient {
    async fn create_deployment(
        &self,
        group: &str,
        name: &str,
        template: &str,
    ) -> Result<Option<Deployment>> {
        let url = self.deployment_url(group, name);
        tracing::debug!("submitting deployment {} to group {}", name, group);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(template.to_string())
            .send()
            .await?;

        // The group may still be materializing; the caller treats an absent
        // deployment as a retryable attempt.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::parse(response).await?))
    }

    async fn get_deployment(&self, group: &str, name: &str) -> Result<Option<Deployment>> {
        self.get_json_opt(&self.deployment_url(group, name)).await
    }

    async fn list_deployments(&self, group: &str) -> Result<Vec<Deployment>> {
        let url = self.url(
            &self.group_path(group, "/providers/Microsoft.Resources/deployments"),
            DEPLOYMENT_API_VERSION,
        );
        let listing: ListResponse<Deployment> = self.get_json(&url).await?;
        Ok(listing.value)
    }

    async fn get_virtual_machine(
        &self,
        group: &str,
        name: &str,
    ) -> Result<Option<VirtualMachine>> {
        self.get_json_opt(&self.vm_url(group, name, "")).await
    }

    async fn get_instance_view(&self, group: &str, name: &str) -> Result<InstanceView> {
        match self
            .get_json_opt(&self.vm_url(group, name, "/instanceView"))
            .await?
        {
            Some(view) => Ok(view),
            None => Err(AzureError::NotFound(format!("instance view for {}", name))),
        }
    }

    async fn start_virtual_machine(&self, group: &str, name: &str) -> Result<()> {
        self.post_action(&self.vm_url(group, name, "/start")).await
    }

    async fn stop_virtual_machine(&self, group: &str, name: &str) -> Result<()> {
        self.post_action(&self.vm_url(group, name, "/powerOff")).await
    }

    async fn restart_virtual_machine(&self, group: &str, name: &str) -> Result<()> {
        self.post_action(&self.vm_url(group, name, "/restart")).await
    }

    async fn get_network_interface(&self, group: &str, name: &str) -> Result<NetworkInterface> {
        let url = self.url(
            &self.group_path(
                group,
                &format!("/providers/Microsoft.Network/networkInterfaces/{}", name),
            ),
            NETWORK_API_VERSION,
        );
        match self.get_json_opt(&url).await? {
            Some(nic) => Ok(nic),
            None => Err(AzureError::NotFound(format!("network interface {}", name))),
        }
    }

    async fn get_public_ip_address(&self, group: &str, name: &str) -> Result<PublicIpAddress> {
        let url = self.url(
            &self.group_path(
                group,
                &format!("/providers/Microsoft.Network/publicIPAddresses/{}", name),
            ),
            NETWORK_API_VERSION,
        );
        match self.get_json_opt(&url).await? {
            Some(address) => Ok(address),
            None => Err(AzureError::NotFound(format!("public address {}", name))),
        }
    }

    async fn list_locations(&self) -> Result<Vec<Region>> {
        let url = self.url(&self.subscription_path("/locations"), SUBSCRIPTION_API_VERSION);
        let listing: ListResponse<Region> = self.get_json(&url).await?;
        Ok(listing.value)
    }

    async fn get_resource_provider(&self, namespace: &str) -> Result<Vec<ProviderResourceType>> {
        let url = self.url(
            &self.subscription_path(&format!("/providers/{}", namespace)),
            DEPLOYMENT_API_VERSION,
        );
        let provider: ProviderResponse = self.get_json(&url).await?;
        Ok(provider.resource_types)
    }

    async fn list_vm_sizes(&self, location: &str) -> Result<Vec<VmSize>> {
        let url = self.url(
            &self.subscription_path(&format!(
                "/providers/Microsoft.Compute/locations/{}/vmSizes",
                location
            )),
            COMPUTE_API_VERSION,
        );
        let listing: ListResponse<VmSize> = self.get_json(&url).await?;
        Ok(listing.value)
    }

    async fn list_offers(&self, location: &str, publisher: &str) -> Result<Vec<Offer>> {
        let url = self.url(
            &self.subscription_path(&format!(
                "/providers/Microsoft.Compute/locations/{}/publishers/{}/artifacttypes/vmimage/offers",
                location, publisher
            )),
            COMPUTE_API_VERSION,
        );
        self.get_json(&url).await
    }

    async fn list_skus(&self, location: &str, publisher: &str, offer: &str) -> Result<Vec<Sku>> {
        let url = self.url(
            &self.subscription_path(&format!(
                "/providers/Microsoft.Compute/locations/{}/publishers/{}/artifacttypes/vmimage/offers/{}/skus",
                location, publisher, offer
            )),
            COMPUTE_API_VERSION,
        );
        self.get_json(&url).await
    }

    async fn list_versions(
        &self,
        location: &str,
        publisher: &str,
        offer: &str,
        sku: &str,
    ) -> Result<Vec<ImageVersion>> {
        let url = self.url(
            &self.subscription_path(&format!(
                "/providers/Microsoft.Compute/locations/{}/publishers/{}/artifacttypes/vmimage/offers/{}/skus/{}/versions",
                location, publisher, offer, sku
            )),
            COMPUTE_API_VERSION,
        );
        self.get_json(&url).await
    }

    async fn list_storage_accounts(&self, group: &str) -> Result<Vec<StorageAccount>> {
        let url = self.url(
            &self.group_path(group, "/providers/Microsoft.Storage/storageAccounts"),
            STORAGE_API_VERSION,
        );
        let listing: ListResponse<StorageAccount> = self.get_json(&url).await?;
        Ok(listing.value)
    }

    async fn storage_account_key(&self, group: &str, account: &str) -> Result<String> {
        let url = self.url(
            &self.group_path(
                group,
                &format!("/providers/Microsoft.Storage/storageAccounts/{}/listKeys", account),
            ),
            STORAGE_API_VERSION,
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let keys: KeyListResponse = Self::parse(response).await?;
        keys.keys
            .into_iter()
            .next()
            .map(|k| k.value)
            .ok_or_else(|| AzureError::NotFound(format!("keys for storage account {}", account)))
    }
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ListResponse<T> {
    #[serde(default)]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderResponse {
    #[serde(default)]
    resource_types: Vec<ProviderResourceType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyListResponse {
    #[serde(default)]
    keys: Vec<AccountKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountKey {
    #[allow(dead_code)]
    key_name: String,
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> ArmClient {
        ArmClient::new(ArmConfig::new("sub-1", "myGroup", "token"))
    }

    #[test]
    fn test_deployment_url() {
        let client = test_client();
        assert_eq!(
            client.deployment_url("myGroup", "node1"),
            "https://management.azure.com/subscriptions/sub-1/resourceGroups/myGroup\
             /providers/Microsoft.Resources/deployments/node1?api-version=2021-04-01"
        );
    }

    #[test]
    fn test_vm_action_url() {
        let client = test_client();
        assert_eq!(
            client.vm_url("myGroup", "node1", "/restart"),
            "https://management.azure.com/subscriptions/sub-1/resourceGroups/myGroup\
             /providers/Microsoft.Compute/virtualMachines/node1/restart?api-version=2023-03-01"
        );
    }

    #[test]
    fn test_key_list_parsing() {
        let raw = r#"{"keys": [{"keyName": "key1", "value": "c2VjcmV0"}]}"#;
        let keys: KeyListResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(keys.keys[0].value, "c2VjcmV0");
    }
}
