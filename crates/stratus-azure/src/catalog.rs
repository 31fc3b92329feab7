//! Hardware, image and location catalogs
//!
//! Region fan-out over the vendor catalogs, cross-region availability
//! flagging, and storage-hosted custom image discovery.

use crate::api::{CleanupResources, ImageBlobStore, ResourceApi};
use crate::deployment::AzureCompute;
use crate::error::{AzureError, Result};
use crate::types::{Region, VmHardware, VmImage};
use std::collections::{HashMap, HashSet};
use stratus_compute::AuthStatus;

const COMPUTE_NAMESPACE: &str = "Microsoft.Compute";
const VIRTUAL_MACHINES_TYPE: &str = "virtualMachines";

impl<A, C, B> AzureCompute<A, C, B>
where
    A: ResourceApi,
    C: CleanupResources,
    B: ImageBlobStore,
{
    /// Regions where virtual machines can be provisioned
    pub async fn list_locations(&self) -> Result<Vec<Region>> {
        let regions = self.api.list_locations().await?;
        let resource_types = self.api.get_resource_provider(COMPUTE_NAMESPACE).await?;

        let vm_locations = resource_types
            .into_iter()
            .find(|t| t.resource_type == VIRTUAL_MACHINES_TYPE)
            .map(|t| t.locations)
            .unwrap_or_default();

        Ok(regions
            .into_iter()
            .filter(|r| vm_locations.iter().any(|l| l == &r.display_name))
            .collect())
    }

    /// Hardware profiles across every region
    pub async fn list_hardware_profiles(&self) -> Result<Vec<VmHardware>> {
        let mut profiles = Vec::new();
        let mut region_ids = HashSet::new();

        for region in self.list_locations().await? {
            for size in self.api.list_vm_sizes(&region.name).await? {
                profiles.push(VmHardware::from_size(&size, &region.name));
            }
            region_ids.insert(region.name);
        }

        flag_hardware_availability(&mut profiles, &region_ids);
        Ok(profiles)
    }

    /// OS images across every region, marketplace and custom
    pub async fn list_images(&self) -> Result<Vec<VmImage>> {
        let mut images = Vec::new();
        let mut region_ids = HashSet::new();

        for region in self.list_locations().await? {
            for publisher in &self.config.image_publishers {
                images.extend(self.images_in_location(&region.name, publisher).await?);
            }
            region_ids.insert(region.name);
        }

        flag_image_availability(&mut images, &region_ids);

        // Custom images live in the storage accounts of the managed group
        let group = &self.config.resource_group;
        for account in self.api.list_storage_accounts(group).await? {
            let key = self.api.storage_account_key(group, &account.name).await?;
            let custom = self
                .blobs
                .list_custom_images(group, &account.name, &key, &account.location)
                .await?;
            images.extend(custom);
        }

        Ok(images)
    }

    async fn images_in_location(&self, location: &str, publisher: &str) -> Result<Vec<VmImage>> {
        let mut images = Vec::new();
        for offer in self.api.list_offers(location, publisher).await? {
            for sku in self.api.list_skus(location, publisher, &offer.name).await? {
                for version in self
                    .api
                    .list_versions(location, publisher, &offer.name, &sku.name)
                    .await?
                {
                    images.push(VmImage::marketplace(
                        publisher,
                        &offer.name,
                        &sku.name,
                        &version.name,
                        location,
                    ));
                }
            }
        }
        Ok(images)
    }

    /// Fetch one image by unique id; `Ok(None)` when it no longer exists
    pub async fn get_image(&self, id: &str) -> Result<Option<VmImage>> {
        let Some(image) = VmImage::from_unique_id(id) else {
            return Err(AzureError::InvalidResourceId(id.to_string()));
        };

        if image.custom {
            let storage = image
                .storage
                .clone()
                .ok_or_else(|| AzureError::InvalidResourceId(id.to_string()))?;
            let key = self
                .api
                .storage_account_key(&self.config.resource_group, &storage)
                .await?;
            if self.blobs.custom_image_exists(&storage, &key).await? {
                return Ok(Some(image));
            }
            return Ok(None);
        }

        // Marketplace images re-resolve to the newest published version
        let versions = self
            .api
            .list_versions(&image.location, &image.publisher, &image.offer, &image.sku)
            .await?;
        Ok(versions.first().map(|v| {
            VmImage::marketplace(
                &image.publisher,
                &image.offer,
                &image.sku,
                &v.name,
                &image.location,
            )
        }))
    }

    /// Probe control-plane access for the configured subscription
    pub async fn auth_status(&self) -> AuthStatus {
        match self.api.list_locations().await {
            Ok(regions) => AuthStatus::ok(format!(
                "subscription {} ({} regions)",
                self.config.subscription_id,
                regions.len()
            )),
            Err(err) => AuthStatus::failed(err.to_string()),
        }
    }
}

/// A profile is globally available iff it is offered in every known region
fn flag_hardware_availability(profiles: &mut [VmHardware], regions: &HashSet<String>) {
    let mut offered: HashMap<String, HashSet<String>> = HashMap::new();
    for profile in profiles.iter() {
        offered
            .entry(profile.name.clone())
            .or_default()
            .insert(profile.location.clone());
    }
    for profile in profiles.iter_mut() {
        profile.globally_available = offered[&profile.name].is_superset(regions);
    }
}

/// Same rule as hardware, keyed on offer/sku
fn flag_image_availability(images: &mut [VmImage], regions: &HashSet<String>) {
    let mut offered: HashMap<String, HashSet<String>> = HashMap::new();
    for image in images.iter() {
        offered
            .entry(image.availability_key())
            .or_default()
            .insert(image.location.clone());
    }
    for image in images.iter_mut() {
        image.globally_available = offered[&image.availability_key()].is_superset(regions);
    }
}
