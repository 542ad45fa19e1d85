//! CloudClient implementation on top of the az CLI

use crate::azcli::AzCli;
use crate::error::AzureError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use vmforge_cloud::{CloudClient, ProviderError, ResourceHandle};
use vmforge_core::{CreateParams, ResourceDescriptor, ResourceKind, Specification};

/// Azure client for one provisioning invocation.
///
/// Bound to the specification's subscription, resource group and virtual
/// network, since nested resources (subnet, NIC) are addressed through
/// them on every az call.
pub struct AzureClient {
    cli: AzCli,
    resource_group: String,
    vnet_name: String,
}

impl AzureClient {
    pub fn new(spec: &Specification) -> Self {
        Self {
            cli: AzCli::new(&spec.subscription_id),
            resource_group: spec.resource_group.clone(),
            vnet_name: spec.network.vnet_name.clone(),
        }
    }

    /// Verify the az session before provisioning starts
    pub async fn check_auth(&self) -> crate::Result<String> {
        let account = self.cli.check_auth().await?;
        let user = account
            .user
            .and_then(|u| u.name)
            .unwrap_or_else(|| "unknown".to_string());
        Ok(format!("{} ({})", account.name, user))
    }

    /// The `show`-style command probing for a resource's existence
    fn exists_args(&self, kind: ResourceKind, name: &str) -> Vec<String> {
        match kind {
            ResourceKind::ResourceGroup => args(&["group", "exists", "--name", name]),
            ResourceKind::VirtualNetwork => self.show_args(&["network", "vnet"], name),
            ResourceKind::Subnet => {
                let mut a = args(&["network", "vnet", "subnet", "show", "--name", name]);
                a.extend(args(&["--resource-group", &self.resource_group]));
                a.extend(args(&["--vnet-name", &self.vnet_name]));
                a
            }
            ResourceKind::PublicIp => self.show_args(&["network", "public-ip"], name),
            ResourceKind::NetworkSecurityGroup => self.show_args(&["network", "nsg"], name),
            ResourceKind::NetworkInterface => self.show_args(&["network", "nic"], name),
            ResourceKind::VirtualMachine => self.show_args(&["vm"], name),
        }
    }

    fn show_args(&self, prefix: &[&str], name: &str) -> Vec<String> {
        let mut a = args(prefix);
        a.push("show".to_string());
        a.extend(args(&["--name", name, "--resource-group", &self.resource_group]));
        a
    }

    /// The az command sequence creating one resource.
    ///
    /// Most kinds are a single `create`; the NSG is a `create` followed by
    /// one `rule create` per inbound rule.
    fn create_commands(&self, descriptor: &ResourceDescriptor) -> Vec<Vec<String>> {
        let name = descriptor.name.as_str();
        let rg = self.resource_group.as_str();

        match &descriptor.params {
            CreateParams::ResourceGroup { location, tags } => {
                let mut cmd = args(&["group", "create", "--name", name, "--location", location]);
                cmd.extend(tag_args(tags));
                vec![cmd]
            }
            CreateParams::VirtualNetwork {
                location,
                address_space,
                tags,
            } => {
                let mut cmd = args(&[
                    "network",
                    "vnet",
                    "create",
                    "--name",
                    name,
                    "--resource-group",
                    rg,
                    "--location",
                    location,
                    "--address-prefixes",
                    address_space,
                ]);
                cmd.extend(tag_args(tags));
                vec![cmd]
            }
            CreateParams::Subnet {
                vnet_name,
                address_prefix,
            } => {
                vec![args(&[
                    "network",
                    "vnet",
                    "subnet",
                    "create",
                    "--name",
                    name,
                    "--resource-group",
                    rg,
                    "--vnet-name",
                    vnet_name,
                    "--address-prefixes",
                    address_prefix,
                ])]
            }
            CreateParams::PublicIp {
                location,
                sku,
                allocation_method,
                tags,
            } => {
                let mut cmd = args(&[
                    "network",
                    "public-ip",
                    "create",
                    "--name",
                    name,
                    "--resource-group",
                    rg,
                    "--location",
                    location,
                    "--sku",
                    sku,
                    "--allocation-method",
                    allocation_method,
                ]);
                cmd.extend(tag_args(tags));
                vec![cmd]
            }
            CreateParams::NetworkSecurityGroup {
                location,
                rules,
                tags,
            } => {
                let mut cmd = args(&[
                    "network",
                    "nsg",
                    "create",
                    "--name",
                    name,
                    "--resource-group",
                    rg,
                    "--location",
                    location,
                ]);
                cmd.extend(tag_args(tags));

                let mut commands = vec![cmd];
                for rule in rules {
                    commands.push(args(&[
                        "network",
                        "nsg",
                        "rule",
                        "create",
                        "--name",
                        &rule.name,
                        "--nsg-name",
                        name,
                        "--resource-group",
                        rg,
                        "--priority",
                        &rule.priority.to_string(),
                        "--direction",
                        &rule.direction,
                        "--access",
                        &rule.access,
                        "--protocol",
                        &rule.protocol,
                        "--destination-port-ranges",
                        &rule.destination_port_range,
                        "--source-address-prefixes",
                        &rule.source_address_prefix,
                    ]));
                }
                commands
            }
            CreateParams::NetworkInterface {
                location,
                vnet_name,
                subnet_name,
                public_ip_name,
                nsg_name,
                tags,
            } => {
                let mut cmd = args(&[
                    "network",
                    "nic",
                    "create",
                    "--name",
                    name,
                    "--resource-group",
                    rg,
                    "--location",
                    location,
                    "--vnet-name",
                    vnet_name,
                    "--subnet",
                    subnet_name,
                    "--public-ip-address",
                    public_ip_name,
                    "--network-security-group",
                    nsg_name,
                ]);
                cmd.extend(tag_args(tags));
                vec![cmd]
            }
            CreateParams::VirtualMachine {
                location,
                size,
                admin_username,
                admin_password,
                image,
                os_disk,
                nic_name,
                tags,
            } => {
                let mut cmd = args(&[
                    "vm",
                    "create",
                    "--name",
                    name,
                    "--resource-group",
                    rg,
                    "--location",
                    location,
                    "--size",
                    size,
                    "--image",
                    &image.urn(),
                    "--admin-username",
                    admin_username,
                    "--admin-password",
                    admin_password.expose(),
                    "--authentication-type",
                    "password",
                    "--nics",
                    nic_name,
                    "--os-disk-size-gb",
                    &os_disk.size_gb.to_string(),
                    "--storage-sku",
                    &os_disk.storage_account_type,
                ]);
                cmd.extend(tag_args(tags));
                vec![cmd]
            }
        }
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// `--tags k=v ...`, with a creation timestamp appended
fn tag_args(tags: &HashMap<String, String>) -> Vec<String> {
    let mut out = vec!["--tags".to_string()];
    let mut pairs: Vec<_> = tags.iter().collect();
    pairs.sort_by_key(|(k, _)| k.as_str());
    for (key, value) in pairs {
        out.push(format!("{}={}", key, value));
    }
    out.push(format!("CreatedAt={}", Utc::now().to_rfc3339()));
    out
}

/// Pull the provider resource id out of az's creation output.
///
/// `az ... create` responses differ per resource type: some carry a
/// top-level `id`, others nest the resource under a wrapper key
/// (`newVNet`, `publicIp`, `NewNIC`, ...).
fn extract_id(value: &serde_json::Value) -> Option<String> {
    if let Some(id) = value.get("id").and_then(|v| v.as_str()) {
        return Some(id.to_string());
    }
    if let Some(obj) = value.as_object() {
        for nested in obj.values() {
            if let Some(id) = nested.get("id").and_then(|v| v.as_str()) {
                return Some(id.to_string());
            }
        }
    }
    None
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("resourcenotfound")
        || lower.contains("resourcegroupnotfound")
        || lower.contains("notfound")
        || lower.contains("could not be found")
        || lower.contains("does not exist")
}

#[async_trait]
impl CloudClient for AzureClient {
    async fn exists(&self, kind: ResourceKind, name: &str) -> vmforge_cloud::Result<bool> {
        let cmd = self.exists_args(kind, name);

        if kind == ResourceKind::ResourceGroup {
            let output = self.cli.run(&cmd).await.map_err(ProviderError::from)?;
            let exists: bool =
                serde_json::from_str(output.trim()).map_err(|e| ProviderError::Api(e.to_string()))?;
            return Ok(exists);
        }

        match self.cli.run(&cmd).await {
            Ok(_) => Ok(true),
            Err(AzureError::CommandFailed { stderr }) if is_not_found(&stderr) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(
        &self,
        descriptor: &ResourceDescriptor,
        _deps: &HashMap<String, ResourceHandle>,
    ) -> vmforge_cloud::Result<ResourceHandle> {
        // The first command creates the resource itself; any following
        // commands (NSG rules) attach to it.
        let mut first_output = String::new();

        for (index, cmd) in self.create_commands(descriptor).into_iter().enumerate() {
            let output = self.cli.run(&cmd).await.map_err(ProviderError::from)?;
            if index == 0 {
                first_output = output;
            }
        }

        let handle = match serde_json::from_str::<serde_json::Value>(&first_output) {
            Ok(value) => {
                let id = extract_id(&value).unwrap_or_else(|| descriptor.name.clone());
                ResourceHandle::new(id).with_attribute("raw", value)
            }
            // some az commands print nothing on success
            Err(_) => ResourceHandle::new(descriptor.name.clone()),
        };

        tracing::info!(resource = %descriptor.id, provider_id = %handle.id, "azure resource created");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmforge_core::{PartialSpecification, ProvisioningPlan, Secret};

    fn spec() -> Specification {
        let mut partial = PartialSpecification::builtin_defaults();
        partial.subscription_id = Some("sub-123".to_string());
        partial.vm_name = Some("web01".to_string());
        partial.admin_password = Some(Secret::new("s3cret!pw"));
        partial.validate().unwrap()
    }

    fn client() -> AzureClient {
        AzureClient::new(&spec())
    }

    fn descriptor(id: &str) -> ResourceDescriptor {
        ProvisioningPlan::build(&spec())
            .unwrap()
            .descriptor(id)
            .unwrap()
            .clone()
    }

    #[test]
    fn subnet_create_addresses_through_the_vnet() {
        let commands = client().create_commands(&descriptor("subnet:subnet-default"));
        assert_eq!(commands.len(), 1);
        let cmd = &commands[0];
        assert_eq!(&cmd[..4], &["network", "vnet", "subnet", "create"]);
        assert!(cmd.contains(&"--vnet-name".to_string()));
        assert!(cmd.contains(&"vnet-vmforge".to_string()));
        assert!(cmd.contains(&"10.0.0.0/24".to_string()));
        // a subnet is not taggable
        assert!(!cmd.contains(&"--tags".to_string()));
    }

    #[test]
    fn nsg_create_emits_one_command_per_rule() {
        let commands = client().create_commands(&descriptor("nsg:nsg-vmforge"));
        // nsg itself + SSH_1 + DenyAllInbound
        assert_eq!(commands.len(), 3);
        assert_eq!(&commands[0][..3], &["network", "nsg", "create"]);
        assert!(commands[1].contains(&"SSH_1".to_string()));
        assert!(commands[1].contains(&"1000".to_string()));
        assert!(commands[2].contains(&"DenyAllInbound".to_string()));
        assert!(commands[2].contains(&"4096".to_string()));
    }

    #[test]
    fn vm_create_carries_image_credentials_and_disk() {
        let commands = client().create_commands(&descriptor("vm:web01"));
        assert_eq!(commands.len(), 1);
        let cmd = &commands[0];
        assert!(
            cmd.contains(&"Canonical:0001-com-ubuntu-server-focal:20_04-lts-gen2:latest".to_string())
        );
        assert!(cmd.contains(&"s3cret!pw".to_string()));
        assert!(cmd.contains(&"--os-disk-size-gb".to_string()));
        assert!(cmd.contains(&"30".to_string()));
        assert!(cmd.contains(&"Premium_LRS".to_string()));
        let tags_at = cmd.iter().position(|a| a == "--tags").unwrap();
        assert!(cmd[tags_at + 1..].iter().any(|t| t == "CreatedBy=vmforge"));
        assert!(cmd[tags_at + 1..].iter().any(|t| t.starts_with("CreatedAt=")));
    }

    #[test]
    fn exists_probe_matches_resource_kind() {
        let c = client();
        assert_eq!(
            c.exists_args(ResourceKind::ResourceGroup, "rg-vmforge"),
            vec!["group", "exists", "--name", "rg-vmforge"]
        );

        let subnet = c.exists_args(ResourceKind::Subnet, "subnet-default");
        assert!(subnet.contains(&"--vnet-name".to_string()));
        assert!(subnet.contains(&"vnet-vmforge".to_string()));

        let vm = c.exists_args(ResourceKind::VirtualMachine, "web01");
        assert_eq!(&vm[..2], &["vm", "show"]);
    }

    #[test]
    fn extract_id_handles_top_level_and_wrapped_payloads() {
        let flat = serde_json::json!({"id": "/subscriptions/s/resourceGroups/rg"});
        assert_eq!(
            extract_id(&flat).unwrap(),
            "/subscriptions/s/resourceGroups/rg"
        );

        let wrapped = serde_json::json!({"newVNet": {"id": "/sub/vnet-a", "location": "eastus"}});
        assert_eq!(extract_id(&wrapped).unwrap(), "/sub/vnet-a");

        assert!(extract_id(&serde_json::json!({"ok": true})).is_none());
    }

    #[test]
    fn not_found_stderr_is_recognized() {
        assert!(is_not_found("ERROR: (ResourceNotFound) the vm was not there"));
        assert!(is_not_found("Resource group 'rg-x' could not be found."));
        assert!(!is_not_found("ERROR: (QuotaExceeded)"));
    }
}
