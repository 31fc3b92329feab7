//! Deployment engine behavior against stub collaborators

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use stratus_azure::api::{CleanupResources, ImageBlobStore, ResourceApi};
use stratus_azure::config::ArmConfig;
use stratus_azure::error::{AzureError, Result};
use stratus_azure::types::*;
use stratus_azure::AzureCompute;
use stratus_compute::{ComputeProvider, LoginIdentity, NodeTemplate};

const GROUP: &str = "myGroup";

// ============ Stub collaborators ============

#[derive(Default)]
struct StubApi {
    create_attempts: Arc<AtomicUsize>,
    /// Attempt number (1-based) from which create returns the deployment;
    /// 0 means never
    succeed_on_attempt: usize,
    fail_create: bool,
    deployment: Option<Deployment>,
    vm: Option<VirtualMachine>,
    instance: Option<InstanceView>,
    nics: Vec<NetworkInterface>,
    ips: Vec<PublicIpAddress>,
    deployments: Vec<Deployment>,
    storage_keys: HashMap<String, String>,
    regions: Vec<Region>,
    provider_types: Vec<ProviderResourceType>,
    vm_sizes: HashMap<String, Vec<VmSize>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl StubApi {
    fn log(&self, entry: String) {
        self.requested.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ResourceApi for StubApi {
    async fn create_deployment(
        &self,
        _group: &str,
        name: &str,
        _template: &str,
    ) -> Result<Option<Deployment>> {
        let attempt = self.create_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create {
            return Err(AzureError::Api {
                status: 500,
                message: format!("create {} failed", name),
            });
        }
        if self.succeed_on_attempt != 0 && attempt >= self.succeed_on_attempt {
            Ok(self.deployment.clone())
        } else {
            Ok(None)
        }
    }

    async fn get_deployment(&self, _group: &str, name: &str) -> Result<Option<Deployment>> {
        Ok(self.deployment.clone().filter(|d| d.name == name))
    }

    async fn list_deployments(&self, _group: &str) -> Result<Vec<Deployment>> {
        Ok(self.deployments.clone())
    }

    async fn get_virtual_machine(
        &self,
        _group: &str,
        _name: &str,
    ) -> Result<Option<VirtualMachine>> {
        Ok(self.vm.clone())
    }

    async fn get_instance_view(&self, _group: &str, name: &str) -> Result<InstanceView> {
        self.instance
            .clone()
            .ok_or_else(|| AzureError::NotFound(format!("instance view for {}", name)))
    }

    async fn start_virtual_machine(&self, group: &str, name: &str) -> Result<()> {
        self.log(format!("start {}/{}", group, name));
        Ok(())
    }

    async fn stop_virtual_machine(&self, group: &str, name: &str) -> Result<()> {
        self.log(format!("stop {}/{}", group, name));
        Ok(())
    }

    async fn restart_virtual_machine(&self, group: &str, name: &str) -> Result<()> {
        self.log(format!("restart {}/{}", group, name));
        Ok(())
    }

    async fn get_network_interface(&self, group: &str, name: &str) -> Result<NetworkInterface> {
        self.log(format!("nic {}/{}", group, name));
        self.nics
            .iter()
            .find(|n| n.name == name)
            .cloned()
            .ok_or_else(|| AzureError::NotFound(format!("network interface {}", name)))
    }

    async fn get_public_ip_address(&self, group: &str, name: &str) -> Result<PublicIpAddress> {
        self.log(format!("ip {}/{}", group, name));
        self.ips
            .iter()
            .find(|i| i.name == name)
            .cloned()
            .ok_or_else(|| AzureError::NotFound(format!("public address {}", name)))
    }

    async fn list_locations(&self) -> Result<Vec<Region>> {
        Ok(self.regions.clone())
    }

    async fn get_resource_provider(
        &self,
        _namespace: &str,
    ) -> Result<Vec<ProviderResourceType>> {
        Ok(self.provider_types.clone())
    }

    async fn list_vm_sizes(&self, location: &str) -> Result<Vec<VmSize>> {
        Ok(self.vm_sizes.get(location).cloned().unwrap_or_default())
    }

    async fn list_offers(&self, _location: &str, _publisher: &str) -> Result<Vec<Offer>> {
        Ok(Vec::new())
    }

    async fn list_skus(
        &self,
        _location: &str,
        _publisher: &str,
        _offer: &str,
    ) -> Result<Vec<Sku>> {
        Ok(Vec::new())
    }

    async fn list_versions(
        &self,
        _location: &str,
        _publisher: &str,
        _offer: &str,
        _sku: &str,
    ) -> Result<Vec<ImageVersion>> {
        Ok(Vec::new())
    }

    async fn list_storage_accounts(&self, _group: &str) -> Result<Vec<StorageAccount>> {
        Ok(Vec::new())
    }

    async fn storage_account_key(&self, _group: &str, account: &str) -> Result<String> {
        self.storage_keys
            .get(account)
            .cloned()
            .ok_or_else(|| AzureError::NotFound(format!("keys for storage account {}", account)))
    }
}

#[derive(Default)]
struct StubCleanup {
    calls: Arc<AtomicUsize>,
    /// What the collaborator reports: true = everything confirmed gone
    all_gone: bool,
}

#[async_trait]
impl CleanupResources for StubCleanup {
    async fn cleanup(&self, _node_id: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.all_gone)
    }
}

#[derive(Default)]
struct StubBlobs {
    generalized: HashSet<String>,
}

#[async_trait]
impl ImageBlobStore for StubBlobs {
    async fn list_custom_images(
        &self,
        _group: &str,
        _storage_account: &str,
        _key: &str,
        _location: &str,
    ) -> Result<Vec<VmImage>> {
        Ok(Vec::new())
    }

    async fn custom_image_exists(&self, storage_account: &str, _key: &str) -> Result<bool> {
        Ok(self.generalized.contains(storage_account))
    }
}

// ============ Fixtures ============

fn test_config() -> ArmConfig {
    let mut config = ArmConfig::new("sub-1", GROUP, "token");
    config.poll_interval = Duration::from_millis(10);
    config.operation_timeout = Duration::from_millis(100);
    config
}

fn deployment_id(name: &str) -> String {
    format!(
        "/subscriptions/sub-1/resourceGroups/{}/providers/Microsoft.Resources/deployments/{}",
        GROUP, name
    )
}

fn bare_deployment(name: &str) -> Deployment {
    Deployment {
        id: deployment_id(name),
        name: name.to_string(),
        properties: None,
    }
}

/// Two network interfaces, the first with a nested public address (plus a
/// non-address entry before it and a second address after it), the second
/// with no address at all.
fn networked_deployment(name: &str) -> Deployment {
    let nic_dependency = |nic: &str, depends_on: Vec<DependencyRef>| Dependency {
        resource_type: NETWORK_INTERFACE_TYPE.to_string(),
        resource_name: nic.to_string(),
        depends_on,
    };

    Deployment {
        properties: Some(DeploymentProperties {
            provisioning_state: Some("Succeeded".to_string()),
            timestamp: None,
            dependencies: Some(vec![
                Dependency {
                    resource_type: "Microsoft.Storage/storageAccounts".to_string(),
                    resource_name: format!("{}stor", name),
                    depends_on: Vec::new(),
                },
                nic_dependency(
                    &format!("{}-nic", name),
                    vec![
                        DependencyRef {
                            resource_type: "Microsoft.Network/virtualNetworks".to_string(),
                            resource_name: format!("{}-vnet", name),
                        },
                        DependencyRef {
                            resource_type: PUBLIC_IP_TYPE.to_string(),
                            resource_name: format!("{}-ip", name),
                        },
                        DependencyRef {
                            resource_type: PUBLIC_IP_TYPE.to_string(),
                            resource_name: format!("{}-ip-extra", name),
                        },
                    ],
                ),
                nic_dependency(&format!("{}-nic2", name), Vec::new()),
            ]),
        }),
        ..bare_deployment(name)
    }
}

fn nic(name: &str) -> NetworkInterface {
    NetworkInterface {
        id: format!(
            "/subscriptions/sub-1/resourceGroups/{}/providers/Microsoft.Network/networkInterfaces/{}",
            GROUP, name
        ),
        name: name.to_string(),
        location: Some("eastus".to_string()),
        properties: Some(NetworkInterfaceProperties {
            mac_address: None,
            ip_configurations: vec![IpConfiguration {
                name: "primary".to_string(),
                properties: Some(IpConfigurationProperties {
                    private_ip_address: Some("10.0.0.4".to_string()),
                }),
            }],
        }),
    }
}

fn public_ip(name: &str) -> PublicIpAddress {
    PublicIpAddress {
        id: format!(
            "/subscriptions/sub-1/resourceGroups/{}/providers/Microsoft.Network/publicIPAddresses/{}",
            GROUP, name
        ),
        name: name.to_string(),
        location: Some("eastus".to_string()),
        properties: Some(PublicIpProperties {
            ip_address: Some("203.0.113.7".to_string()),
            public_ip_allocation_method: Some("Dynamic".to_string()),
        }),
    }
}

fn vm(name: &str, user_tags: Option<&str>) -> VirtualMachine {
    let mut tags = HashMap::new();
    tags.insert("owner".to_string(), "ops".to_string());
    if let Some(value) = user_tags {
        tags.insert(USER_TAGS_KEY.to_string(), value.to_string());
    }

    VirtualMachine {
        id: format!(
            "/subscriptions/sub-1/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
            GROUP, name
        ),
        name: name.to_string(),
        location: "eastus".to_string(),
        tags: Some(tags),
        properties: None,
    }
}

fn running_instance() -> InstanceView {
    InstanceView {
        statuses: vec![InstanceViewStatus {
            code: "PowerState/running".to_string(),
            level: None,
            display_status: Some("VM running".to_string()),
            time: None,
        }],
    }
}

fn engine(
    api: StubApi,
    cleanup: StubCleanup,
    blobs: StubBlobs,
) -> AzureCompute<StubApi, StubCleanup, StubBlobs> {
    AzureCompute::new(api, cleanup, blobs, test_config())
}

// ============ Creation orchestrator ============

#[tokio::test]
async fn create_rolls_back_after_timeout() {
    let api = StubApi::default();
    let attempts = api.create_attempts.clone();
    let cleanup = StubCleanup {
        all_gone: true,
        ..Default::default()
    };
    let cleanup_calls = cleanup.calls.clone();
    let engine = engine(api, cleanup, StubBlobs::default());

    let timeout = Duration::from_millis(50);
    let started = Instant::now();
    let result = engine.create_deployment("node1", "{}", timeout).await;
    let elapsed = started.elapsed();

    match result {
        Err(AzureError::Timeout { name, timeout: t }) => {
            assert_eq!(name, "node1");
            assert_eq!(t, timeout);
        }
        other => panic!("expected timeout, got {:?}", other.map(|d| d.name)),
    }

    assert_eq!(cleanup_calls.load(Ordering::SeqCst), 1);
    assert!(attempts.load(Ordering::SeqCst) >= 2);
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_millis(500));
}

#[tokio::test]
async fn create_succeeds_on_later_attempt() {
    let api = StubApi {
        succeed_on_attempt: 3,
        deployment: Some(bare_deployment("node1")),
        ..Default::default()
    };
    let attempts = api.create_attempts.clone();
    let cleanup = StubCleanup::default();
    let cleanup_calls = cleanup.calls.clone();
    let engine = engine(api, cleanup, StubBlobs::default());

    let deployment = engine
        .create_deployment("node1", "{}", Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(deployment.name, "node1");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(cleanup_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn create_propagates_upstream_failure_without_retry() {
    let api = StubApi {
        fail_create: true,
        ..Default::default()
    };
    let attempts = api.create_attempts.clone();
    let cleanup = StubCleanup::default();
    let cleanup_calls = cleanup.calls.clone();
    let engine = engine(api, cleanup, StubBlobs::default());

    let result = engine
        .create_deployment("node1", "{}", Duration::from_secs(1))
        .await;

    assert!(matches!(result, Err(AzureError::Api { status: 500, .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(cleanup_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rollback_failure_surfaces_incomplete_teardown() {
    let cleanup = StubCleanup {
        all_gone: false,
        ..Default::default()
    };
    let engine = engine(StubApi::default(), cleanup, StubBlobs::default());

    let result = engine
        .create_deployment("node1", "{}", Duration::from_millis(30))
        .await;

    match result {
        Err(AzureError::TeardownIncomplete(id)) => assert_eq!(id, "node1"),
        other => panic!("expected teardown failure, got {:?}", other.map(|d| d.name)),
    }
}

// ============ Dependency graph resolver ============

#[tokio::test]
async fn resolvers_yield_empty_lists_without_properties() {
    let engine = engine(
        StubApi::default(),
        StubCleanup::default(),
        StubBlobs::default(),
    );
    let deployment = bare_deployment("node1");

    assert!(engine
        .network_interfaces_of(&deployment)
        .await
        .unwrap()
        .is_empty());
    assert!(engine
        .public_addresses_of(&deployment)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn resolves_first_public_address_per_interface() {
    let api = StubApi {
        nics: vec![nic("node1-nic"), nic("node1-nic2")],
        ips: vec![public_ip("node1-ip"), public_ip("node1-ip-extra")],
        ..Default::default()
    };
    let requested = api.requested.clone();
    let engine = engine(api, StubCleanup::default(), StubBlobs::default());
    let deployment = networked_deployment("node1");

    let interfaces = engine.network_interfaces_of(&deployment).await.unwrap();
    assert_eq!(interfaces.len(), 2);
    assert_eq!(interfaces[0].private_addresses(), vec!["10.0.0.4"]);

    let addresses = engine.public_addresses_of(&deployment).await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].name, "node1-ip");
    assert_eq!(addresses[0].ip_address(), Some("203.0.113.7"));

    // The second nested address entry was never fetched
    let log = requested.lock().unwrap();
    assert_eq!(log.iter().filter(|e| e.starts_with("ip ")).count(), 1);
    assert!(log.contains(&format!("ip {}/node1-ip", GROUP)));
}

#[tokio::test]
async fn resolver_surfaces_missing_resources() {
    let api = StubApi::default(); // no NICs registered
    let engine = engine(api, StubCleanup::default(), StubBlobs::default());
    let deployment = networked_deployment("node1");

    let result = engine.network_interfaces_of(&deployment).await;
    assert!(matches!(result, Err(AzureError::NotFound(_))));
}

// ============ Node view assembly ============

#[tokio::test]
async fn get_node_assembles_full_view_and_is_idempotent() {
    let api = StubApi {
        deployment: Some(networked_deployment("node1")),
        vm: Some(vm("node1", Some("web,frontend"))),
        instance: Some(running_instance()),
        nics: vec![nic("node1-nic"), nic("node1-nic2")],
        ips: vec![public_ip("node1-ip"), public_ip("node1-ip-extra")],
        ..Default::default()
    };
    let engine = engine(api, StubCleanup::default(), StubBlobs::default());

    let first = engine.get_node("node1").await.unwrap().unwrap();
    let second = engine.get_node("node1").await.unwrap().unwrap();
    assert_eq!(first, second);

    assert_eq!(first.resource_group().unwrap(), GROUP);
    assert_eq!(first.public_addresses.len(), 1);
    assert_eq!(first.network_interfaces.len(), 2);
    assert_eq!(
        first.instance_view.as_ref().unwrap().power_state(),
        Some("running")
    );
    assert_eq!(
        first.tags,
        Some(vec!["web".to_string(), "frontend".to_string()])
    );
    assert_eq!(
        first.user_metadata.as_ref().unwrap().get("owner"),
        Some(&"ops".to_string())
    );
}

#[tokio::test]
async fn get_node_absent_is_none() {
    let engine = engine(
        StubApi::default(),
        StubCleanup::default(),
        StubBlobs::default(),
    );
    assert!(engine.get_node("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn assembly_without_vm_leaves_tags_absent() {
    let api = StubApi {
        deployment: Some(bare_deployment("node1")),
        ..Default::default()
    };
    let engine = engine(api, StubCleanup::default(), StubBlobs::default());

    let node = engine.get_node("node1").await.unwrap().unwrap();
    assert!(node.virtual_machine.is_none());
    assert!(node.instance_view.is_none());
    assert!(node.user_metadata.is_none());
    // Absent, not empty: no metadata was supplied at all
    assert!(node.tags.is_none());
}

#[tokio::test]
async fn tag_list_absent_when_conventional_key_missing() {
    let api = StubApi {
        deployment: Some(bare_deployment("node1")),
        vm: Some(vm("node1", None)),
        instance: Some(running_instance()),
        ..Default::default()
    };
    let engine = engine(api, StubCleanup::default(), StubBlobs::default());

    let node = engine.get_node("node1").await.unwrap().unwrap();
    assert!(node.user_metadata.is_some());
    assert!(node.tags.is_none());
}

// ============ Lifecycle passthroughs & destroy ============

#[tokio::test]
async fn destroy_verifies_cleanup_outcome() {
    let complete = StubCleanup {
        all_gone: true,
        ..Default::default()
    };
    let engine_ok = engine(StubApi::default(), complete, StubBlobs::default());
    engine_ok.destroy_node("node1").await.unwrap();

    let incomplete = StubCleanup {
        all_gone: false,
        ..Default::default()
    };
    let engine_err = engine(StubApi::default(), incomplete, StubBlobs::default());
    let err = engine_err.destroy_node("node1").await.unwrap_err();
    assert!(err.to_string().contains("node1"));
    match err {
        AzureError::TeardownIncomplete(id) => assert_eq!(id, "node1"),
        other => panic!("expected teardown failure, got {}", other),
    }
}

#[tokio::test]
async fn lifecycle_passthroughs_hit_vendor_operations() {
    let api = StubApi::default();
    let requested = api.requested.clone();
    let engine = engine(api, StubCleanup::default(), StubBlobs::default());

    engine.reboot_node("node1").await.unwrap();
    engine.suspend_node("node1").await.unwrap();
    engine.resume_node("node1").await.unwrap();

    let log = requested.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            format!("restart {}/node1", GROUP),
            format!("stop {}/node1", GROUP),
            format!("start {}/node1", GROUP),
        ]
    );
}

// ============ Node listing ============

#[tokio::test]
async fn list_nodes_skips_generalized_deployments() {
    let mut storage_keys = HashMap::new();
    storage_keys.insert("node1stor".to_string(), "key-1".to_string());
    storage_keys.insert("node2stor".to_string(), "key-2".to_string());
    // node3 has no storage key at all; its check fails and it is skipped

    let api = StubApi {
        deployments: vec![
            bare_deployment("node1"),
            bare_deployment("node2"),
            bare_deployment("node3"),
        ],
        storage_keys,
        ..Default::default()
    };
    let blobs = StubBlobs {
        generalized: ["node2stor".to_string()].into_iter().collect(),
    };
    let engine = engine(api, StubCleanup::default(), blobs);

    let nodes = engine.list_nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name(), "node1");

    let filtered = engine
        .list_nodes_by_ids(&["node1".to_string(), "node9".to_string()])
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
}

// ============ Catalogs ============

fn catalog_api() -> StubApi {
    let mut vm_sizes = HashMap::new();
    vm_sizes.insert(
        "eastus".to_string(),
        vec![size("Standard_A1"), size("Standard_A2")],
    );
    vm_sizes.insert("westus".to_string(), vec![size("Standard_A1")]);

    StubApi {
        regions: vec![
            region("eastus", "East US"),
            region("westus", "West US"),
            region("northpole", "North Pole"),
        ],
        provider_types: vec![ProviderResourceType {
            resource_type: "virtualMachines".to_string(),
            locations: vec!["East US".to_string(), "West US".to_string()],
        }],
        vm_sizes,
        ..Default::default()
    }
}

fn region(name: &str, display_name: &str) -> Region {
    Region {
        id: format!("/subscriptions/sub-1/locations/{}", name),
        name: name.to_string(),
        display_name: display_name.to_string(),
    }
}

fn size(name: &str) -> VmSize {
    VmSize {
        name: name.to_string(),
        number_of_cores: 2,
        os_disk_size_in_mb: 130_048,
        resource_disk_size_in_mb: 40_960,
        memory_in_mb: 4096,
        max_data_disk_count: 4,
    }
}

#[tokio::test]
async fn locations_filtered_to_vm_capable_regions() {
    let engine = engine(catalog_api(), StubCleanup::default(), StubBlobs::default());

    let locations = engine.list_locations().await.unwrap();
    let names: Vec<&str> = locations.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["eastus", "westus"]);
}

#[tokio::test]
async fn hardware_profiles_flag_global_availability() {
    let engine = engine(catalog_api(), StubCleanup::default(), StubBlobs::default());

    let profiles = engine.list_hardware_profiles().await.unwrap();
    assert_eq!(profiles.len(), 3);

    for profile in &profiles {
        match profile.name.as_str() {
            "Standard_A1" => assert!(profile.globally_available),
            "Standard_A2" => assert!(!profile.globally_available),
            other => panic!("unexpected profile {}", other),
        }
    }
}

// ============ Provider trait surface ============

#[tokio::test]
async fn create_node_returns_view_and_credentials() {
    let api = StubApi {
        succeed_on_attempt: 1,
        deployment: Some(networked_deployment("node1")),
        vm: Some(vm("node1", Some("web"))),
        instance: Some(running_instance()),
        nics: vec![nic("node1-nic"), nic("node1-nic2")],
        ips: vec![public_ip("node1-ip")],
        ..Default::default()
    };
    let engine = engine(api, StubCleanup::default(), StubBlobs::default());

    let template = NodeTemplate::new("{}", LoginIdentity::with_password("admin", "Azur3!"));
    let provisioned = ComputeProvider::create_node(&engine, "web", "node1", &template)
        .await
        .unwrap();

    assert_eq!(provisioned.node_id, "node1");
    assert_eq!(provisioned.node.name(), "node1");
    assert_eq!(provisioned.credentials.username, "admin");
    assert_eq!(provisioned.node.tags, Some(vec!["web".to_string()]));
}
