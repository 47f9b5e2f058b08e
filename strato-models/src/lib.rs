use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kinds of provider-managed resources strato knows about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    Subnet,
    Database,
    Cache,
    Broker,
    Search,
    Cluster,
    ElasticAddress,
    AllowList,
}

impl ResourceKind {
    /// The terminal-success status the provider reports for this kind.
    /// Every other status value is treated as "keep polling".
    pub fn ready_status(&self) -> &'static str {
        match self {
            ResourceKind::Network | ResourceKind::Subnet | ResourceKind::ElasticAddress => {
                "Available"
            }
            _ => "Running",
        }
    }

    /// Whether the kind is a primary resource a `ResourceSpec` can describe.
    /// Networks, subnets, addresses and allow-lists are only ever created as
    /// sub-steps of a primary resource's provisioning.
    pub fn is_provisionable(&self) -> bool {
        matches!(
            self,
            ResourceKind::Database
                | ResourceKind::Cache
                | ResourceKind::Broker
                | ResourceKind::Search
                | ResourceKind::Cluster
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Database => "database",
            ResourceKind::Cache => "cache",
            ResourceKind::Broker => "broker",
            ResourceKind::Search => "search",
            ResourceKind::Cluster => "cluster",
            ResourceKind::ElasticAddress => "elastic-address",
            ResourceKind::AllowList => "allow-list",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "network" => Ok(ResourceKind::Network),
            "subnet" => Ok(ResourceKind::Subnet),
            "database" => Ok(ResourceKind::Database),
            "cache" => Ok(ResourceKind::Cache),
            "broker" => Ok(ResourceKind::Broker),
            "search" => Ok(ResourceKind::Search),
            "cluster" => Ok(ResourceKind::Cluster),
            "elastic-address" => Ok(ResourceKind::ElasticAddress),
            "allow-list" => Ok(ResourceKind::AllowList),
            other => Err(format!("unknown resource kind '{other}'")),
        }
    }
}

/// Identity of a created (or discovered) resource: the provider-assigned id
/// plus the kind and logical name it was created from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.id, self.name)
    }
}

// ============================================================================
// Resource specifications (declarative input)
// ============================================================================

/// Network CIDR used when a spec does not carry an explicit network section.
pub const DEFAULT_VPC_CIDR: &str = "192.168.0.0/16";
/// Subnet CIDR used when a spec does not carry an explicit subnet section.
pub const DEFAULT_SUBNET_CIDR: &str = "192.168.1.0/24";

/// Declarative description of one primary resource to provision.
/// Immutable once handed to the provisioner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    /// Logical name, unique per kind. All idempotency checks match on it.
    pub name: String,
    /// Availability zone the primary resource (and its subnet) lives in.
    pub zone: String,
    #[serde(default)]
    pub engine_version: Option<String>,
    #[serde(default)]
    pub node_spec: Option<String>,
    #[serde(default)]
    pub storage: Option<StorageSpec>,
    #[serde(default)]
    pub charge: Option<ChargeSpec>,
    /// Pre-existing network to attach to. When set together with
    /// `subnet_id`, the network and subnet steps are skipped.
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    /// Overrides for the network created on behalf of this resource.
    #[serde(default)]
    pub network: Option<NetworkSpec>,
    #[serde(default)]
    pub subnet: Option<SubnetSpec>,
    /// Presence requests public access via a named elastic address.
    #[serde(default)]
    pub public_address: Option<EipSpec>,
    /// Names of allow-lists (from the catalog) to bind to the instance.
    #[serde(default)]
    pub allow_lists: Vec<String>,
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,
    #[serde(default)]
    pub databases: Vec<DatabaseObjectSpec>,
    #[serde(default)]
    pub backup: Option<BackupSpec>,
    /// Engine parameters applied after the instance is running
    /// (e.g. disabled commands on a cache).
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Node pools, for the cluster kind.
    #[serde(default)]
    pub node_pools: Vec<NodePoolSpec>,
    /// Provider-specific fields passed through to the create call untouched.
    #[serde(default)]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl ResourceSpec {
    /// Logical name of the network this spec provisions into.
    pub fn network_name(&self) -> String {
        self.network
            .as_ref()
            .and_then(|n| n.name.clone())
            .unwrap_or_else(|| format!("net-{}", self.name))
    }

    pub fn network_cidr(&self) -> String {
        self.network
            .as_ref()
            .and_then(|n| n.cidr_block.clone())
            .unwrap_or_else(|| DEFAULT_VPC_CIDR.to_string())
    }

    /// Logical name of the zone subnet this spec provisions into.
    pub fn subnet_name(&self) -> String {
        self.subnet
            .as_ref()
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| format!("subnet-{}", self.name))
    }

    pub fn subnet_cidr(&self) -> String {
        self.subnet
            .as_ref()
            .and_then(|s| s.cidr_block.clone())
            .unwrap_or_else(|| DEFAULT_SUBNET_CIDR.to_string())
    }

    /// Whether the spec carries pre-existing network attachments, making
    /// the network/subnet steps no-ops.
    pub fn has_network_refs(&self) -> bool {
        self.vpc_id.is_some() && self.subnet_id.is_some()
    }
}

/// Overrides for the network created on behalf of a resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cidr_block: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Overrides for the zone subnet created on behalf of a resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubnetSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cidr_block: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSpec {
    pub storage_type: String,
    pub storage_space_gb: i32,
}

/// Billing terms for a created resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeSpec {
    pub charge_type: String,
    #[serde(default)]
    pub period_unit: Option<String>,
    #[serde(default)]
    pub period: Option<i32>,
    #[serde(default)]
    pub auto_renew: bool,
}

/// A named elastic address to allocate (or find) for public access.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EipSpec {
    pub name: String,
    #[serde(default)]
    pub bandwidth_mbps: Option<i32>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub billing_type: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub charge: Option<ChargeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountSpec {
    pub username: String,
    pub password: String,
    /// Provider account role, e.g. "Super" or "Normal".
    pub account_type: String,
}

/// A logical database and the schemas to create under it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseObjectSpec {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub schemas: Vec<SchemaSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaSpec {
    pub name: String,
    pub owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupSpec {
    pub retention_days: u32,
    #[serde(default)]
    pub full_backup_period: Option<String>,
    #[serde(default)]
    pub full_backup_time: Option<String>,
    #[serde(default)]
    pub increment_backup_frequency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodePoolSpec {
    pub name: String,
    pub node_count: u32,
    #[serde(default)]
    pub node_spec: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
}

/// A named set of CIDR entries grantable access to instances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllowListSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub entries: Vec<String>,
}

// ============================================================================
// Boundary summaries (what the provider reports back)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VpcSummary {
    pub vpc_id: String,
    pub vpc_name: String,
    pub status: String,
    #[serde(default)]
    pub cidr_block: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubnetSummary {
    pub subnet_id: String,
    pub subnet_name: String,
    pub status: String,
    pub zone_id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub cidr_block: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EipSummary {
    pub allocation_id: String,
    pub name: String,
    pub eip_address: String,
    /// Instance the address is currently associated with, if any.
    #[serde(default)]
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceSummary {
    pub instance_id: String,
    pub instance_name: String,
    pub status: String,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub engine_version: Option<String>,
    #[serde(default)]
    pub eip_id: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
}

/// Whether an endpoint address is reachable publicly or only inside the VPC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NetworkScope {
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    pub scope: NetworkScope,
    pub domain: String,
    pub port: u16,
    #[serde(default)]
    pub eip_id: Option<String>,
}

/// Detail view of an instance, as returned by a describe call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceDetail {
    pub instance_id: String,
    pub status: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl InstanceDetail {
    pub fn public_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.scope == NetworkScope::Public)
    }

    pub fn private_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.scope == NetworkScope::Private)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllowListSummary {
    pub allow_list_id: String,
    pub allow_list_name: String,
    #[serde(default)]
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodePoolSummary {
    pub node_pool_id: String,
    pub name: String,
    pub cluster_id: String,
}

// ============================================================================
// Batch outcome reporting
// ============================================================================

/// One failed step, recorded with the operation that failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepFailure {
    pub operation: String,
    pub error: String,
}

/// Per-resource outcome of a provisioning or teardown run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceOutcome {
    /// The resource the outcome is about: a spec name when provisioning,
    /// an instance id when tearing down.
    pub subject: String,
    #[serde(default)]
    pub handle: Option<ResourceHandle>,
    #[serde(default)]
    pub failures: Vec<StepFailure>,
}

impl ResourceOutcome {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            handle: None,
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn record_failure(&mut self, operation: impl Into<String>, error: impl fmt::Display) {
        self.failures.push(StepFailure {
            operation: operation.into(),
            error: error.to_string(),
        });
    }
}

/// Aggregate result of a multi-resource operation. The batch itself never
/// fails; callers inspect the outcomes and decide whether to re-run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<ResourceOutcome>,
}

impl BatchReport {
    pub fn push(&mut self, outcome: ResourceOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn fully_succeeded(&self) -> bool {
        self.outcomes.iter().all(ResourceOutcome::succeeded)
    }

    pub fn failed_subjects(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.subject.as_str())
            .collect()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            if outcome.succeeded() {
                match &outcome.handle {
                    Some(handle) => writeln!(f, "ok    {} -> {}", outcome.subject, handle)?,
                    None => writeln!(f, "ok    {}", outcome.subject)?,
                }
            } else {
                writeln!(f, "FAIL  {}", outcome.subject)?;
                for failure in &outcome.failures {
                    writeln!(f, "      {}: {}", failure.operation, failure.error)?;
                }
            }
        }
        let failed = self.outcomes.iter().filter(|o| !o.succeeded()).count();
        write!(
            f,
            "{} resource(s), {} failed",
            self.outcomes.len(),
            failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_spec_parses_from_yaml() {
        let spec: ResourceSpec =
            serde_yaml::from_str("kind: cache\nname: c1\nzone: z1\n").unwrap();
        assert_eq!(spec.kind, ResourceKind::Cache);
        assert_eq!(spec.name, "c1");
        assert_eq!(spec.zone, "z1");
        assert!(spec.allow_lists.is_empty());
        assert!(spec.public_address.is_none());
    }

    #[test]
    fn network_names_derive_from_resource_name() {
        let spec: ResourceSpec =
            serde_yaml::from_str("kind: cache\nname: c1\nzone: z1\n").unwrap();
        assert_eq!(spec.network_name(), "net-c1");
        assert_eq!(spec.subnet_name(), "subnet-c1");
        assert_eq!(spec.network_cidr(), DEFAULT_VPC_CIDR);
    }

    #[test]
    fn explicit_network_section_wins() {
        let yaml = "kind: database\nname: pg1\nzone: z1\nnetwork:\n  name: shared-net\n  cidr_block: 10.0.0.0/16\n";
        let spec: ResourceSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.network_name(), "shared-net");
        assert_eq!(spec.network_cidr(), "10.0.0.0/16");
    }

    #[test]
    fn ready_status_per_kind() {
        assert_eq!(ResourceKind::Network.ready_status(), "Available");
        assert_eq!(ResourceKind::Subnet.ready_status(), "Available");
        assert_eq!(ResourceKind::Cache.ready_status(), "Running");
        assert_eq!(ResourceKind::Cluster.ready_status(), "Running");
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            ResourceKind::Database,
            ResourceKind::Cache,
            ResourceKind::Broker,
            ResourceKind::Search,
            ResourceKind::Cluster,
            ResourceKind::ElasticAddress,
        ] {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn handle_serialization_round_trip() {
        let handle = ResourceHandle::new(ResourceKind::Cache, "inst-123", "c1");
        let json = serde_json::to_string(&handle).unwrap();
        let parsed: ResourceHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(handle, parsed);
    }

    #[test]
    fn batch_report_tracks_partial_failure() {
        let mut report = BatchReport::default();
        report.push(ResourceOutcome::new("a"));
        let mut failed = ResourceOutcome::new("b");
        failed.record_failure("delete instance", "boom");
        report.push(failed);

        assert!(!report.fully_succeeded());
        assert_eq!(report.failed_subjects(), vec!["b"]);
        let rendered = report.to_string();
        assert!(rendered.contains("ok    a"));
        assert!(rendered.contains("FAIL  b"));
        assert!(rendered.contains("delete instance: boom"));
    }
}
