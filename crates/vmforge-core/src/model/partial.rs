//! Partial specification and the merge/validate pipeline

use super::cidr::Cidr;
use super::secret::Secret;
use super::spec::{ImageReference, NetworkSpec, OsDiskSpec, SecuritySpec, Specification};
use crate::error::{ValidationError, Violation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A specification in which every field is optional.
///
/// Each configuration source produces one of these; the resolver folds them
/// together by precedence and validates the result into a [`Specification`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialSpecification {
    pub subscription_id: Option<String>,
    pub vm_name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub vm_size: Option<String>,
    pub admin_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<Secret>,
    pub image: Option<ImageReference>,
    pub os_disk: Option<OsDiskSpec>,
    pub network: Option<NetworkSpec>,
    pub security: Option<SecuritySpec>,
    pub tags: HashMap<String, String>,
}

impl PartialSpecification {
    /// Merge another partial into this one.
    ///
    /// Fields defined in `other` win (override semantics):
    /// - `Option<T>`: `other` `Some` replaces the current value
    /// - `HashMap<K, V>`: entries merged, `other` wins per key
    pub fn merge(&mut self, other: PartialSpecification) {
        if other.subscription_id.is_some() {
            self.subscription_id = other.subscription_id;
        }
        if other.vm_name.is_some() {
            self.vm_name = other.vm_name;
        }
        if other.resource_group.is_some() {
            self.resource_group = other.resource_group;
        }
        if other.location.is_some() {
            self.location = other.location;
        }
        if other.vm_size.is_some() {
            self.vm_size = other.vm_size;
        }
        if other.admin_username.is_some() {
            self.admin_username = other.admin_username;
        }
        if other.admin_password.is_some() {
            self.admin_password = other.admin_password;
        }
        if other.image.is_some() {
            self.image = other.image;
        }
        if other.os_disk.is_some() {
            self.os_disk = other.os_disk;
        }
        if other.network.is_some() {
            self.network = other.network;
        }
        if other.security.is_some() {
            self.security = other.security;
        }

        for (key, value) in other.tags {
            self.tags.insert(key, value);
        }
    }

    /// The built-in lowest-precedence defaults: a small Ubuntu VM with a
    /// locked-down network, matching what `generate-config` emits.
    pub fn builtin_defaults() -> Self {
        Self {
            subscription_id: None,
            vm_name: Some("vmforge-vm".to_string()),
            resource_group: Some("rg-vmforge".to_string()),
            location: Some("East US".to_string()),
            vm_size: Some("Standard_B2s".to_string()),
            admin_username: Some("azureuser".to_string()),
            admin_password: None,
            image: Some(ImageReference {
                publisher: "Canonical".to_string(),
                offer: "0001-com-ubuntu-server-focal".to_string(),
                sku: "20_04-lts-gen2".to_string(),
                version: "latest".to_string(),
            }),
            os_disk: Some(OsDiskSpec {
                size_gb: 30,
                storage_account_type: "Premium_LRS".to_string(),
            }),
            network: Some(NetworkSpec {
                vnet_name: "vnet-vmforge".to_string(),
                vnet_address_space: "10.0.0.0/16".to_string(),
                subnet_name: "subnet-default".to_string(),
                subnet_prefix: "10.0.0.0/24".to_string(),
                public_ip_name: "ip-vmforge".to_string(),
                nsg_name: "nsg-vmforge".to_string(),
                nic_name: "nic-vmforge".to_string(),
            }),
            security: Some(SecuritySpec {
                ssh_port: 22,
                allowed_ssh_sources: vec!["*".to_string()],
            }),
            tags: [
                ("Environment".to_string(), "Production".to_string()),
                ("CreatedBy".to_string(), "vmforge".to_string()),
                ("Project".to_string(), "Infrastructure".to_string()),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Configuration file skeleton for the `generate-config` command.
    ///
    /// The defaults plus a placeholder subscription id; the admin password
    /// is intentionally absent so it never lands in a file.
    pub fn template() -> Self {
        let mut template = Self::builtin_defaults();
        template.subscription_id = Some("00000000-0000-0000-0000-000000000000".to_string());
        template
    }

    /// Validate completeness and internal consistency, producing the
    /// immutable [`Specification`].
    ///
    /// Collects every violation rather than stopping at the first; either a
    /// complete valid specification is returned or nothing is.
    pub fn validate(self) -> Result<Specification, ValidationError> {
        let mut violations = Vec::new();

        let subscription_id = require(&mut violations, "subscription_id", self.subscription_id);
        let vm_name = require(&mut violations, "vm_name", self.vm_name);
        let resource_group = require(&mut violations, "resource_group", self.resource_group);
        let location = require(&mut violations, "location", self.location);
        let vm_size = require(&mut violations, "vm_size", self.vm_size);
        let admin_username = require(&mut violations, "admin_username", self.admin_username);

        if let Some(name) = &vm_name {
            check_resource_name(&mut violations, "vm_name", name);
        }
        if let Some(name) = &resource_group {
            check_resource_name(&mut violations, "resource_group", name);
        }

        let admin_password = match self.admin_password {
            Some(p) if !p.is_empty() => Some(p),
            _ => {
                violations.push(Violation::new("admin_password", "missing or empty"));
                None
            }
        };

        let image = match self.image {
            Some(image) => {
                for (field, value) in [
                    ("image.publisher", &image.publisher),
                    ("image.offer", &image.offer),
                    ("image.sku", &image.sku),
                    ("image.version", &image.version),
                ] {
                    if value.trim().is_empty() {
                        violations.push(Violation::new(field, "missing or empty"));
                    }
                }
                Some(image)
            }
            None => {
                violations.push(Violation::new("image", "missing block"));
                None
            }
        };

        let os_disk = match self.os_disk {
            Some(disk) => {
                if disk.size_gb == 0 {
                    violations.push(Violation::new("os_disk.size_gb", "must be at least 1 GB"));
                }
                if disk.storage_account_type.trim().is_empty() {
                    violations.push(Violation::new(
                        "os_disk.storage_account_type",
                        "missing or empty",
                    ));
                }
                Some(disk)
            }
            None => {
                violations.push(Violation::new("os_disk", "missing block"));
                None
            }
        };

        let network = match self.network {
            Some(network) => {
                for (field, value) in [
                    ("network.vnet_name", &network.vnet_name),
                    ("network.subnet_name", &network.subnet_name),
                    ("network.public_ip_name", &network.public_ip_name),
                    ("network.nsg_name", &network.nsg_name),
                    ("network.nic_name", &network.nic_name),
                ] {
                    if value.trim().is_empty() {
                        violations.push(Violation::new(field, "missing or empty"));
                    }
                }

                let vnet_cidr = parse_cidr(
                    &mut violations,
                    "network.vnet_address_space",
                    &network.vnet_address_space,
                );
                let subnet_cidr = parse_cidr(
                    &mut violations,
                    "network.subnet_prefix",
                    &network.subnet_prefix,
                );
                if let (Some(vnet), Some(subnet)) = (vnet_cidr, subnet_cidr) {
                    if !vnet.contains(&subnet) {
                        violations.push(Violation::new(
                            "network.subnet_prefix",
                            format!(
                                "{} is not within the virtual network address space {}",
                                subnet, vnet
                            ),
                        ));
                    }
                }

                Some(network)
            }
            None => {
                violations.push(Violation::new("network", "missing block"));
                None
            }
        };

        let security = match self.security {
            Some(security) => {
                if security.ssh_port == 0 {
                    violations.push(Violation::new("security.ssh_port", "must be 1-65535"));
                }
                if security.allowed_ssh_sources.is_empty() {
                    violations.push(Violation::new(
                        "security.allowed_ssh_sources",
                        "must list at least one source prefix",
                    ));
                }
                for source in &security.allowed_ssh_sources {
                    if source != "*" && source.parse::<Cidr>().is_err() {
                        violations.push(Violation::new(
                            "security.allowed_ssh_sources",
                            format!("'{}' is neither '*' nor a CIDR block", source),
                        ));
                    }
                }
                Some(security)
            }
            None => {
                violations.push(Violation::new("security", "missing block"));
                None
            }
        };

        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }

        // All `unwrap`s guarded by the empty-violations check above.
        Ok(Specification {
            subscription_id: subscription_id.unwrap(),
            vm_name: vm_name.unwrap(),
            resource_group: resource_group.unwrap(),
            location: location.unwrap(),
            vm_size: vm_size.unwrap(),
            admin_username: admin_username.unwrap(),
            admin_password: admin_password.unwrap(),
            image: image.unwrap(),
            os_disk: os_disk.unwrap(),
            network: network.unwrap(),
            security: security.unwrap(),
            tags: self.tags,
        })
    }
}

fn require(
    violations: &mut Vec<Violation>,
    field: &str,
    value: Option<String>,
) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            violations.push(Violation::new(field, "missing or empty"));
            None
        }
    }
}

/// Cloud resource naming rules: 1-64 characters, alphanumeric plus `-`/`_`.
fn check_resource_name(violations: &mut Vec<Violation>, field: &str, name: &str) {
    let valid_len = (1..=64).contains(&name.len());
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !(valid_len && valid_chars) {
        violations.push(Violation::new(
            field,
            "must be 1-64 alphanumeric characters, hyphens or underscores",
        ));
    }
}

fn parse_cidr(violations: &mut Vec<Violation>, field: &str, value: &str) -> Option<Cidr> {
    match value.parse::<Cidr>() {
        Ok(cidr) => Some(cidr),
        Err(e) => {
            violations.push(Violation::new(field, e.to_string()));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PartialSpecification {
        let mut partial = PartialSpecification::builtin_defaults();
        partial.subscription_id = Some("sub-123".to_string());
        partial.admin_password = Some(Secret::new("correct horse"));
        partial
    }

    #[test]
    fn defaults_plus_credentials_validate() {
        let spec = complete().validate().unwrap();
        assert_eq!(spec.vm_name, "vmforge-vm");
        assert_eq!(spec.network.subnet_name, "subnet-default");
        assert_eq!(spec.security.ssh_port, 22);
    }

    #[test]
    fn merge_other_wins() {
        let mut base = PartialSpecification::builtin_defaults();
        let mut overlay = PartialSpecification::default();
        overlay.vm_name = Some("web01".to_string());
        overlay.location = Some("West Europe".to_string());
        overlay.tags.insert("Environment".to_string(), "Staging".to_string());
        overlay.tags.insert("Owner".to_string(), "ops".to_string());

        base.merge(overlay);

        assert_eq!(base.vm_name.as_deref(), Some("web01"));
        assert_eq!(base.location.as_deref(), Some("West Europe"));
        // untouched field survives
        assert_eq!(base.vm_size.as_deref(), Some("Standard_B2s"));
        // map entries merged, overlay wins per key
        assert_eq!(base.tags.get("Environment").unwrap(), "Staging");
        assert_eq!(base.tags.get("Owner").unwrap(), "ops");
        assert_eq!(base.tags.get("Project").unwrap(), "Infrastructure");
    }

    #[test]
    fn empty_partial_reports_every_missing_field() {
        let err = PartialSpecification::default().validate().unwrap_err();
        let fields: Vec<&str> = err.violations.iter().map(|v| v.field.as_str()).collect();

        for expected in [
            "subscription_id",
            "vm_name",
            "resource_group",
            "location",
            "vm_size",
            "admin_username",
            "admin_password",
            "image",
            "os_disk",
            "network",
            "security",
        ] {
            assert!(fields.contains(&expected), "missing violation for {expected}");
        }
    }

    #[test]
    fn subnet_outside_vnet_is_rejected() {
        let mut partial = complete();
        let network = partial.network.as_mut().unwrap();
        network.vnet_address_space = "10.1.0.0/16".to_string();
        network.subnet_prefix = "10.2.1.0/24".to_string();

        let err = partial.validate().unwrap_err();
        assert!(
            err.violations
                .iter()
                .any(|v| v.field == "network.subnet_prefix"
                    && v.message.contains("not within"))
        );
    }

    #[test]
    fn bad_vm_name_is_rejected() {
        let mut partial = complete();
        partial.vm_name = Some("bad name!".to_string());
        let err = partial.validate().unwrap_err();
        assert!(err.violations.iter().any(|v| v.field == "vm_name"));

        let mut partial = complete();
        partial.vm_name = Some("x".repeat(65));
        assert!(partial.validate().is_err());
    }

    #[test]
    fn template_has_placeholder_subscription_and_no_password() {
        let template = PartialSpecification::template();
        assert_eq!(
            template.subscription_id.as_deref(),
            Some("00000000-0000-0000-0000-000000000000")
        );
        assert!(template.admin_password.is_none());

        // round-trips through JSON without gaining a password field
        let json = serde_json::to_string_pretty(&template).unwrap();
        assert!(!json.contains("admin_password"));
        let back: PartialSpecification = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vm_name.as_deref(), Some("vmforge-vm"));
    }
}
