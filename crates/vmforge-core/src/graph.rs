//! Resource dependency graph
//!
//! Expands a validated [`Specification`] into the fixed DAG of cloud
//! resources backing one VM, together with a topologically valid execution
//! order. Identifiers derive deterministically from the specification's
//! naming fields, so re-running with the same specification addresses the
//! same logical cloud objects.

use crate::error::GraphError;
use crate::model::{ImageReference, OsDiskSpec, Secret, Specification};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Kind of cloud resource a descriptor stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ResourceGroup,
    VirtualNetwork,
    Subnet,
    PublicIp,
    NetworkSecurityGroup,
    NetworkInterface,
    VirtualMachine,
}

impl ResourceKind {
    /// Short stable prefix used in descriptor identifiers
    pub fn key(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "group",
            ResourceKind::VirtualNetwork => "vnet",
            ResourceKind::Subnet => "subnet",
            ResourceKind::PublicIp => "public-ip",
            ResourceKind::NetworkSecurityGroup => "nsg",
            ResourceKind::NetworkInterface => "nic",
            ResourceKind::VirtualMachine => "vm",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::ResourceGroup => write!(f, "resource group"),
            ResourceKind::VirtualNetwork => write!(f, "virtual network"),
            ResourceKind::Subnet => write!(f, "subnet"),
            ResourceKind::PublicIp => write!(f, "public IP"),
            ResourceKind::NetworkSecurityGroup => write!(f, "network security group"),
            ResourceKind::NetworkInterface => write!(f, "network interface"),
            ResourceKind::VirtualMachine => write!(f, "virtual machine"),
        }
    }
}

/// Lifecycle state of a resource during one provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Not yet processed
    Pending,
    /// Creation call in flight
    Creating,
    /// Created by this run
    Created,
    /// Found on the provider side; left untouched
    AlreadyExists,
    /// Dry-run: creation withheld
    Skipped,
    /// Creation failed, or a dependency failed
    Failed,
    /// Run was cancelled before this resource started
    Cancelled,
}

impl ResourceState {
    /// Whether dependents of a resource in this state may proceed
    pub fn is_satisfied(&self) -> bool {
        matches!(
            self,
            ResourceState::Created | ResourceState::AlreadyExists | ResourceState::Skipped
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResourceState::Pending | ResourceState::Creating)
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceState::Pending => write!(f, "pending"),
            ResourceState::Creating => write!(f, "creating"),
            ResourceState::Created => write!(f, "created"),
            ResourceState::AlreadyExists => write!(f, "already exists"),
            ResourceState::Skipped => write!(f, "skipped"),
            ResourceState::Failed => write!(f, "failed"),
            ResourceState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One inbound rule of the network security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsgRule {
    pub name: String,
    pub protocol: String,
    pub destination_port_range: String,
    pub source_address_prefix: String,
    pub access: String,
    pub priority: u16,
    pub direction: String,
}

/// Creation parameters for one resource, derived from the specification.
///
/// Serializable so a dry run can record the would-be creation payload;
/// secrets are redacted on serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum CreateParams {
    ResourceGroup {
        location: String,
        tags: HashMap<String, String>,
    },
    VirtualNetwork {
        location: String,
        address_space: String,
        tags: HashMap<String, String>,
    },
    Subnet {
        vnet_name: String,
        address_prefix: String,
    },
    PublicIp {
        location: String,
        sku: String,
        allocation_method: String,
        tags: HashMap<String, String>,
    },
    NetworkSecurityGroup {
        location: String,
        rules: Vec<NsgRule>,
        tags: HashMap<String, String>,
    },
    NetworkInterface {
        location: String,
        vnet_name: String,
        subnet_name: String,
        public_ip_name: String,
        nsg_name: String,
        tags: HashMap<String, String>,
    },
    VirtualMachine {
        location: String,
        size: String,
        admin_username: String,
        admin_password: Secret,
        image: ImageReference,
        os_disk: OsDiskSpec,
        nic_name: String,
        tags: HashMap<String, String>,
    },
}

impl CreateParams {
    /// JSON rendering of the parameters, safe to print (secrets redacted)
    pub fn preview(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One node of the provisioning graph
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    /// Stable identifier, `<kind-key>:<name>`
    pub id: String,

    pub kind: ResourceKind,

    /// Name of the logical cloud object
    pub name: String,

    /// Identifiers of descriptors that must be satisfied first
    pub depends_on: Vec<String>,

    pub params: CreateParams,
}

impl ResourceDescriptor {
    fn new(kind: ResourceKind, name: &str, depends_on: Vec<String>, params: CreateParams) -> Self {
        Self {
            id: format!("{}:{}", kind.key(), name),
            kind,
            name: name.to_string(),
            depends_on,
            params,
        }
    }
}

/// The full dependency graph plus a topologically valid execution order.
///
/// Immutable once built from a specification.
#[derive(Debug, Clone)]
pub struct ProvisioningPlan {
    descriptors: Vec<ResourceDescriptor>,
    levels: Vec<Vec<String>>,
}

impl ProvisioningPlan {
    /// Expand a validated specification into the provisioning graph.
    ///
    /// Shape: ResourceGroup → {VirtualNetwork → Subnet, NetworkSecurityGroup,
    /// PublicIp} → NetworkInterface → VirtualMachine.
    pub fn build(spec: &Specification) -> Result<Self, GraphError> {
        let net = &spec.network;
        let tags = spec.tags.clone();

        let group = ResourceDescriptor::new(
            ResourceKind::ResourceGroup,
            &spec.resource_group,
            Vec::new(),
            CreateParams::ResourceGroup {
                location: spec.location.clone(),
                tags: tags.clone(),
            },
        );

        let vnet = ResourceDescriptor::new(
            ResourceKind::VirtualNetwork,
            &net.vnet_name,
            vec![group.id.clone()],
            CreateParams::VirtualNetwork {
                location: spec.location.clone(),
                address_space: net.vnet_address_space.clone(),
                tags: tags.clone(),
            },
        );

        let subnet = ResourceDescriptor::new(
            ResourceKind::Subnet,
            &net.subnet_name,
            vec![vnet.id.clone()],
            CreateParams::Subnet {
                vnet_name: net.vnet_name.clone(),
                address_prefix: net.subnet_prefix.clone(),
            },
        );

        let public_ip = ResourceDescriptor::new(
            ResourceKind::PublicIp,
            &net.public_ip_name,
            vec![group.id.clone()],
            CreateParams::PublicIp {
                location: spec.location.clone(),
                sku: "Standard".to_string(),
                allocation_method: "Static".to_string(),
                tags: tags.clone(),
            },
        );

        let nsg = ResourceDescriptor::new(
            ResourceKind::NetworkSecurityGroup,
            &net.nsg_name,
            vec![group.id.clone()],
            CreateParams::NetworkSecurityGroup {
                location: spec.location.clone(),
                rules: nsg_rules(spec),
                tags: tags.clone(),
            },
        );

        let nic = ResourceDescriptor::new(
            ResourceKind::NetworkInterface,
            &net.nic_name,
            vec![subnet.id.clone(), public_ip.id.clone(), nsg.id.clone()],
            CreateParams::NetworkInterface {
                location: spec.location.clone(),
                vnet_name: net.vnet_name.clone(),
                subnet_name: net.subnet_name.clone(),
                public_ip_name: net.public_ip_name.clone(),
                nsg_name: net.nsg_name.clone(),
                tags: tags.clone(),
            },
        );

        let vm = ResourceDescriptor::new(
            ResourceKind::VirtualMachine,
            &spec.vm_name,
            vec![nic.id.clone()],
            CreateParams::VirtualMachine {
                location: spec.location.clone(),
                size: spec.vm_size.clone(),
                admin_username: spec.admin_username.clone(),
                admin_password: spec.admin_password.clone(),
                image: spec.image.clone(),
                os_disk: spec.os_disk.clone(),
                nic_name: net.nic_name.clone(),
                tags,
            },
        );

        let descriptors = vec![group, vnet, subnet, public_ip, nsg, nic, vm];
        let levels = compute_levels(&descriptors)?;

        Ok(Self {
            descriptors,
            levels,
        })
    }

    pub fn descriptors(&self) -> &[ResourceDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, id: &str) -> Option<&ResourceDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// Execution levels in order; resources within one level are mutually
    /// independent and safe to create concurrently.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Descriptors nothing depends on (the graph's roots)
    pub fn roots(&self) -> Vec<&ResourceDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.depends_on.is_empty())
            .collect()
    }

    /// Descriptors no other descriptor depends on (the graph's sinks)
    pub fn sinks(&self) -> Vec<&ResourceDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| {
                !self
                    .descriptors
                    .iter()
                    .any(|other| other.depends_on.contains(&d.id))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Inbound NSG rules: one SSH allow per configured source, then deny-all.
fn nsg_rules(spec: &Specification) -> Vec<NsgRule> {
    let mut rules: Vec<NsgRule> = spec
        .security
        .allowed_ssh_sources
        .iter()
        .enumerate()
        .map(|(i, source)| NsgRule {
            name: format!("SSH_{}", i + 1),
            protocol: "Tcp".to_string(),
            destination_port_range: spec.security.ssh_port.to_string(),
            source_address_prefix: source.clone(),
            access: "Allow".to_string(),
            priority: 1000 + i as u16,
            direction: "Inbound".to_string(),
        })
        .collect();

    rules.push(NsgRule {
        name: "DenyAllInbound".to_string(),
        protocol: "*".to_string(),
        destination_port_range: "*".to_string(),
        source_address_prefix: "*".to_string(),
        access: "Deny".to_string(),
        priority: 4096,
        direction: "Inbound".to_string(),
    });

    rules
}

/// Kahn's algorithm, grouped into levels. Doubles as DAG validation.
fn compute_levels(descriptors: &[ResourceDescriptor]) -> Result<Vec<Vec<String>>, GraphError> {
    let mut seen = HashSet::new();
    for d in descriptors {
        if !seen.insert(d.id.as_str()) {
            return Err(GraphError::DuplicateId(d.id.clone()));
        }
    }

    for d in descriptors {
        for dep in &d.depends_on {
            if !seen.contains(dep.as_str()) {
                return Err(GraphError::UnknownDependency {
                    id: d.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let mut in_degree: HashMap<&str, usize> = descriptors
        .iter()
        .map(|d| (d.id.as_str(), d.depends_on.len()))
        .collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for d in descriptors {
        for dep in &d.depends_on {
            dependents.entry(dep.as_str()).or_default().push(d.id.as_str());
        }
    }

    let mut levels = Vec::new();
    let mut ready: Vec<&str> = descriptors
        .iter()
        .filter(|d| d.depends_on.is_empty())
        .map(|d| d.id.as_str())
        .collect();
    let mut placed = 0;

    while !ready.is_empty() {
        placed += ready.len();
        let mut next = Vec::new();
        for id in &ready {
            for dependent in dependents.get(id).into_iter().flatten() {
                let degree = in_degree.get_mut(dependent).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    next.push(*dependent);
                }
            }
        }
        levels.push(ready.iter().map(|id| id.to_string()).collect());
        ready = next;
    }

    if placed < descriptors.len() {
        let stuck: Vec<&str> = descriptors
            .iter()
            .filter(|d| in_degree[d.id.as_str()] > 0)
            .map(|d| d.id.as_str())
            .collect();
        return Err(GraphError::Cycle(stuck.join(", ")));
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartialSpecification;

    fn spec() -> Specification {
        let mut partial = PartialSpecification::builtin_defaults();
        partial.subscription_id = Some("sub-123".to_string());
        partial.vm_name = Some("web01".to_string());
        partial.admin_password = Some(Secret::new("pw"));
        partial.network.as_mut().unwrap().vnet_address_space = "10.1.0.0/16".to_string();
        partial.network.as_mut().unwrap().subnet_prefix = "10.1.1.0/24".to_string();
        partial.validate().unwrap()
    }

    #[test]
    fn plan_has_seven_descriptors_one_root_one_sink() {
        let plan = ProvisioningPlan::build(&spec()).unwrap();

        assert_eq!(plan.len(), 7);

        let roots = plan.roots();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].kind, ResourceKind::ResourceGroup);

        let sinks = plan.sinks();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].kind, ResourceKind::VirtualMachine);
    }

    #[test]
    fn identifiers_are_deterministic() {
        let spec = spec();
        let a = ProvisioningPlan::build(&spec).unwrap();
        let b = ProvisioningPlan::build(&spec).unwrap();

        let ids_a: Vec<&str> = a.descriptors().iter().map(|d| d.id.as_str()).collect();
        let ids_b: Vec<&str> = b.descriptors().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(a.levels(), b.levels());
    }

    #[test]
    fn levels_respect_dependencies() {
        let plan = ProvisioningPlan::build(&spec()).unwrap();
        let level_of = |id: &str| {
            plan.levels()
                .iter()
                .position(|level| level.iter().any(|l| l == id))
                .unwrap()
        };

        for d in plan.descriptors() {
            for dep in &d.depends_on {
                assert!(
                    level_of(dep) < level_of(&d.id),
                    "{} should come before {}",
                    dep,
                    d.id
                );
            }
        }

        // fixed shape: group / (vnet, ip, nsg) / subnet / nic / vm
        assert_eq!(plan.levels().len(), 5);
        assert_eq!(plan.levels()[0], vec!["group:rg-vmforge".to_string()]);
        assert_eq!(plan.levels()[1].len(), 3);
        assert_eq!(plan.levels()[2], vec!["subnet:subnet-default".to_string()]);
        assert_eq!(plan.levels()[3], vec!["nic:nic-vmforge".to_string()]);
        assert_eq!(plan.levels()[4], vec!["vm:web01".to_string()]);
    }

    #[test]
    fn nsg_rules_cover_each_source_plus_deny_all() {
        let mut spec = spec();
        spec.security.allowed_ssh_sources =
            vec!["203.0.113.0/24".to_string(), "198.51.100.0/24".to_string()];
        let plan = ProvisioningPlan::build(&spec).unwrap();

        let nsg = plan.descriptor("nsg:nsg-vmforge").unwrap();
        let CreateParams::NetworkSecurityGroup { rules, .. } = &nsg.params else {
            panic!("wrong params variant");
        };

        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].name, "SSH_1");
        assert_eq!(rules[0].priority, 1000);
        assert_eq!(rules[1].priority, 1001);
        let deny = rules.last().unwrap();
        assert_eq!(deny.name, "DenyAllInbound");
        assert_eq!(deny.access, "Deny");
        assert_eq!(deny.priority, 4096);
    }

    #[test]
    fn vm_params_preview_redacts_password() {
        let plan = ProvisioningPlan::build(&spec()).unwrap();
        let vm = plan.descriptor("vm:web01").unwrap();
        let preview = vm.params.preview();
        assert_eq!(preview["admin_password"], "****");
        assert_eq!(preview["size"], "Standard_B2s");
    }

    #[test]
    fn cycle_is_reported() {
        let spec = spec();
        let mut plan = ProvisioningPlan::build(&spec).unwrap();
        // sabotage: make the group depend on the vm
        plan.descriptors[0].depends_on = vec!["vm:web01".to_string()];
        let err = compute_levels(&plan.descriptors).unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));
    }
}
