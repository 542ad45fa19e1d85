//! Resolved specification types

use super::Secret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fully resolved description of the VM and its supporting resources.
///
/// Produced once per invocation by merging configuration sources and
/// validating the result; immutable afterwards. Every field required for
/// resource creation is guaranteed non-empty and internally consistent.
#[derive(Debug, Clone, Serialize)]
pub struct Specification {
    /// Azure subscription the resources are billed to
    pub subscription_id: String,

    /// Virtual machine name (1-64 alphanumeric characters, `-` or `_`)
    pub vm_name: String,

    /// Resource group holding every created resource
    pub resource_group: String,

    /// Azure location, e.g. "West Europe"
    pub location: String,

    /// VM size, e.g. "Standard_B2s"
    pub vm_size: String,

    /// Administrator account name
    pub admin_username: String,

    /// Administrator password; never logged or rendered
    pub admin_password: Secret,

    pub image: ImageReference,
    pub os_disk: OsDiskSpec,
    pub network: NetworkSpec,
    pub security: SecuritySpec,

    /// Tags applied to every taggable resource
    pub tags: HashMap<String, String>,
}

/// Marketplace image to boot the VM from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

impl ImageReference {
    /// URN form consumed by the cloud API, `publisher:offer:sku:version`
    pub fn urn(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.publisher, self.offer, self.sku, self.version
        )
    }
}

/// Managed OS disk settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsDiskSpec {
    pub size_gb: u32,
    pub storage_account_type: String,
}

/// Names and address layout of the network resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub vnet_name: String,
    pub vnet_address_space: String,
    pub subnet_name: String,
    pub subnet_prefix: String,
    pub public_ip_name: String,
    pub nsg_name: String,
    pub nic_name: String,
}

/// Inbound security rules for the VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySpec {
    pub ssh_port: u16,

    /// Source address prefixes allowed to reach the SSH port; `*` for any
    pub allowed_ssh_sources: Vec<String>,
}
