//! ARM domain types
//!
//! Typed views of the control-plane resources the engine works with, plus
//! the assembled [`NodeDeployment`] record exposed upward.

use crate::error::{AzureError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dependency resource type reported for network interfaces
pub const NETWORK_INTERFACE_TYPE: &str = "Microsoft.Network/networkInterfaces";

/// Dependency resource type reported for public IP addresses
pub const PUBLIC_IP_TYPE: &str = "Microsoft.Network/publicIPAddresses";

/// Tag-map key holding the comma-separated caller-supplied tag list
pub const USER_TAGS_KEY: &str = "tags";

const RESOURCE_GROUP_MARKER: &str = "/resourceGroups/";
const PROVIDER_MARKER: &str = "/providers/";

/// Extract the resource-group segment from an ARM resource id.
///
/// The group is the text between the last `/resourceGroups/` marker and the
/// last `/providers/` marker in the id.
pub fn resource_group_from_id(id: &str) -> Option<&str> {
    let start = id.rfind(RESOURCE_GROUP_MARKER)? + RESOURCE_GROUP_MARKER.len();
    let end = id.rfind(PROVIDER_MARKER)?;
    id.get(start..end)
}

// ============ Deployments ============

/// A declarative provisioning request accepted by the control plane,
/// together with the resource-dependency graph it reported.
///
/// Immutable once accepted; later reads of the same id supersede earlier
/// ones instead of mutating them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<DeploymentProperties>,
}

impl Deployment {
    /// Top-level dependency list; empty when the control plane reported none
    pub fn dependencies(&self) -> &[Dependency] {
        self.properties
            .as_ref()
            .and_then(|p| p.dependencies.as_deref())
            .unwrap_or(&[])
    }

    /// Resource group derived from the deployment id
    pub fn resource_group(&self) -> Result<&str> {
        resource_group_from_id(&self.id)
            .ok_or_else(|| AzureError::InvalidResourceId(self.id.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Dependency>>,
}

/// One entry of a deployment's dependency graph.
///
/// The graph is traversed two levels deep only, so nested entries are plain
/// references rather than further dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub resource_type: String,
    pub resource_name: String,
    #[serde(default)]
    pub depends_on: Vec<DependencyRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRef {
    pub resource_type: String,
    pub resource_name: String,
}

// ============ Virtual machines ============

/// Compute instance configuration as the control plane stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<VmProperties>,
}

impl VirtualMachine {
    /// Caller-supplied tag list from the conventional tag-map entry.
    ///
    /// `None` when the machine has no tag map or no such entry, to keep
    /// "no metadata" distinguishable from an empty tag list.
    pub fn user_tags(&self) -> Option<Vec<String>> {
        self.tags
            .as_ref()?
            .get(USER_TAGS_KEY)
            .map(|raw| raw.split(',').map(String::from).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_profile: Option<HardwareProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_size: Option<String>,
}

/// Live power/provisioning state of a virtual machine, fetched separately
/// from the [`VirtualMachine`] resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceView {
    #[serde(default)]
    pub statuses: Vec<InstanceViewStatus>,
}

const PROVISIONING_STATE_PREFIX: &str = "ProvisioningState/";
const POWER_STATE_PREFIX: &str = "PowerState/";

impl InstanceView {
    /// Current provisioning state, e.g. "succeeded"
    pub fn provisioning_state(&self) -> Option<&str> {
        self.status_with_prefix(PROVISIONING_STATE_PREFIX)
    }

    /// Current power state, e.g. "running"
    pub fn power_state(&self) -> Option<&str> {
        self.status_with_prefix(POWER_STATE_PREFIX)
    }

    fn status_with_prefix(&self, prefix: &str) -> Option<&str> {
        self.statuses.iter().find_map(|s| s.code.strip_prefix(prefix))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceViewStatus {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

// ============ Network resources ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<NetworkInterfaceProperties>,
}

impl NetworkInterface {
    /// Private addresses across all ip configurations
    pub fn private_addresses(&self) -> Vec<&str> {
        self.properties
            .as_ref()
            .map(|p| {
                p.ip_configurations
                    .iter()
                    .filter_map(|c| c.properties.as_ref()?.private_ip_address.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfiguration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IpConfigurationProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfigurationProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddress {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PublicIpProperties>,
}

impl PublicIpAddress {
    /// Allocated address, once the control plane has assigned one
    pub fn ip_address(&self) -> Option<&str> {
        self.properties.as_ref()?.ip_address.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip_allocation_method: Option<String>,
}

// ============ Catalog resources ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

/// One resource type a provider namespace offers, with its regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResourceType {
    pub resource_type: String,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmSize {
    pub name: String,
    pub number_of_cores: u32,
    #[serde(rename = "osDiskSizeInMB")]
    pub os_disk_size_in_mb: u64,
    #[serde(rename = "resourceDiskSizeInMB")]
    pub resource_disk_size_in_mb: u64,
    #[serde(rename = "memoryInMB")]
    pub memory_in_mb: u64,
    pub max_data_disk_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVersion {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccount {
    pub name: String,
    pub location: String,
}

// ============ Catalog records ============

/// Hardware profile catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmHardware {
    pub name: String,
    pub cores: u32,
    pub os_disk_size_mb: u64,
    pub resource_disk_size_mb: u64,
    pub memory_mb: u64,
    pub max_data_disks: u32,
    pub location: String,
    /// Offered in every known region
    pub globally_available: bool,
}

impl VmHardware {
    pub fn from_size(size: &VmSize, location: &str) -> Self {
        Self {
            name: size.name.clone(),
            cores: size.number_of_cores,
            os_disk_size_mb: size.os_disk_size_in_mb,
            resource_disk_size_mb: size.resource_disk_size_in_mb,
            memory_mb: size.memory_in_mb,
            max_data_disks: size.max_data_disk_count,
            location: location.to_string(),
            globally_available: false,
        }
    }
}

const CUSTOM_IMAGE_MARKER: &str = "custom";

/// OS image catalog entry.
///
/// Marketplace images are identified by publisher/offer/sku/version in a
/// region; custom images live in a storage account of the managed group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmImage {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
    pub location: String,
    pub custom: bool,
    /// Resource group of the storage account, custom images only
    pub group: Option<String>,
    /// Storage account hosting the image, custom images only
    pub storage: Option<String>,
    /// Offered in every known region
    pub globally_available: bool,
}

impl VmImage {
    pub fn marketplace(
        publisher: impl Into<String>,
        offer: impl Into<String>,
        sku: impl Into<String>,
        version: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            publisher: publisher.into(),
            offer: offer.into(),
            sku: sku.into(),
            version: version.into(),
            location: location.into(),
            custom: false,
            group: None,
            storage: None,
            globally_available: false,
        }
    }

    pub fn custom(
        group: impl Into<String>,
        storage: impl Into<String>,
        offer: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            publisher: CUSTOM_IMAGE_MARKER.to_string(),
            offer: offer.into(),
            sku: String::new(),
            version: String::new(),
            location: location.into(),
            custom: true,
            group: Some(group.into()),
            storage: Some(storage.into()),
            globally_available: false,
        }
    }

    /// Unique id: `location/publisher/offer/sku/version` for marketplace
    /// images, `custom/location/group/storage/offer` for custom images.
    pub fn unique_id(&self) -> String {
        if self.custom {
            format!(
                "{}/{}/{}/{}/{}",
                CUSTOM_IMAGE_MARKER,
                self.location,
                self.group.as_deref().unwrap_or_default(),
                self.storage.as_deref().unwrap_or_default(),
                self.offer
            )
        } else {
            format!(
                "{}/{}/{}/{}/{}",
                self.location, self.publisher, self.offer, self.sku, self.version
            )
        }
    }

    /// Decode a unique id produced by [`VmImage::unique_id`]
    pub fn from_unique_id(id: &str) -> Option<Self> {
        let parts: Vec<&str> = id.split('/').collect();
        if parts.len() != 5 {
            return None;
        }
        if parts[0] == CUSTOM_IMAGE_MARKER {
            Some(Self::custom(parts[2], parts[3], parts[4], parts[1]))
        } else {
            Some(Self::marketplace(
                parts[1], parts[2], parts[3], parts[4], parts[0],
            ))
        }
    }

    /// Key catalog availability is tracked under
    pub(crate) fn availability_key(&self) -> String {
        format!("{}/{}", self.offer, self.sku)
    }
}

// ============ Assembled node view ============

/// Fully-resolved view of one provisioned node.
///
/// Immutable once constructed and rebuilt fresh on every query, never
/// patched incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDeployment {
    pub deployment: Deployment,
    pub public_addresses: Vec<PublicIpAddress>,
    pub virtual_machine: Option<VirtualMachine>,
    pub instance_view: Option<InstanceView>,
    pub network_interfaces: Vec<NetworkInterface>,
    pub user_metadata: Option<HashMap<String, String>>,
    /// Caller-supplied tags; absent (not empty) when none were supplied
    pub tags: Option<Vec<String>>,
}

impl NodeDeployment {
    /// Resource group, always derived from the deployment id
    pub fn resource_group(&self) -> Result<&str> {
        self.deployment.resource_group()
    }

    pub fn name(&self) -> &str {
        &self.deployment.name
    }
}
