//! Azure Resource Manager provider for Stratus
//!
//! Provisions and manages virtual-machine deployments through the ARM
//! control plane, hiding templated deployments, resource-dependency graphs
//! and regional catalogs behind the
//! [`ComputeProvider`](stratus_compute::ComputeProvider) operations.
//!
//! The deployment lifecycle engine submits a declarative template with
//! bounded-retry creation and deterministic rollback on timeout, then
//! reconstructs the node view (virtual machine, instance status, network
//! interfaces, public addresses, tags) by walking the dependency graph the
//! control plane reports for the deployment.
//!
//! Teardown and custom-image discovery are delegated to the
//! [`CleanupResources`](api::CleanupResources) and
//! [`ImageBlobStore`](api::ImageBlobStore) collaborators supplied at
//! construction.

pub mod api;
pub mod arm;
pub mod catalog;
pub mod config;
pub mod deployment;
pub mod error;
pub mod provider;
pub mod types;

// Re-exports
pub use arm::ArmClient;
pub use config::ArmConfig;
pub use deployment::AzureCompute;
pub use error::{AzureError, Result};
pub use provider::PROVIDER_NAME;
pub use types::{
    Deployment, InstanceView, NetworkInterface, NodeDeployment, PublicIpAddress, Region,
    VirtualMachine, VmHardware, VmImage,
};
