//! In-memory control plane for tests.
//!
//! Records pass through a configurable number of pending observations
//! before reporting their ready status, mimicking asynchronous creation.
//! Every operation is counted so tests can assert idempotency (a second
//! provisioning run must add zero create calls).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use strato_models::{
    AccountSpec, AllowListSpec, AllowListSummary, BackupSpec, DatabaseObjectSpec, EipSpec,
    EipSummary, Endpoint, InstanceDetail, InstanceSummary, NetworkScope, NodePoolSpec,
    NodePoolSummary, ResourceKind, ResourceSpec, SchemaSpec, SubnetSummary, VpcSummary,
};

use crate::client::{
    AddressApi, CreateSubnetRequest, CreateVpcRequest, NetworkApi, NetworkAttachment, ResourceApi,
};
use crate::error::{ApiError, ApiResult};

#[derive(Debug)]
struct VpcRecord {
    id: String,
    name: String,
    cidr: String,
    pending: u32,
}

#[derive(Debug)]
struct SubnetRecord {
    id: String,
    name: String,
    vpc_id: String,
    zone: String,
    cidr: String,
    pending: u32,
}

#[derive(Debug)]
struct InstanceRecord {
    id: String,
    name: String,
    vpc_id: Option<String>,
    subnet_id: Option<String>,
    pending: u32,
    public_endpoint: bool,
    eip_id: Option<String>,
    accounts: Vec<String>,
    databases: Vec<String>,
    schemas: HashMap<String, Vec<String>>,
    parameters: BTreeMap<String, String>,
    backup: Option<BackupSpec>,
}

#[derive(Debug)]
struct EipRecord {
    allocation_id: String,
    name: String,
    address: String,
    instance_id: Option<String>,
}

#[derive(Debug)]
struct AllowListRecord {
    id: String,
    name: String,
    entries: Vec<String>,
    instances: HashSet<String>,
}

#[derive(Debug)]
struct PoolRecord {
    id: String,
    name: String,
    cluster_id: String,
}

#[derive(Debug, Default)]
struct State {
    seq: u32,
    vpcs: Vec<VpcRecord>,
    subnets: Vec<SubnetRecord>,
    instances: Vec<InstanceRecord>,
    eips: Vec<EipRecord>,
    allow_lists: Vec<AllowListRecord>,
    node_pools: Vec<PoolRecord>,
    calls: HashMap<&'static str, u32>,
    fail_delete: HashSet<String>,
    last_associated: Option<Vec<String>>,
    last_disassociated: Option<Vec<String>>,
}

fn observe_status(pending: &mut u32, ready: &'static str) -> String {
    if *pending > 0 {
        *pending -= 1;
        "Creating".to_string()
    } else {
        ready.to_string()
    }
}

pub struct MockProvider {
    kind: ResourceKind,
    /// Observations a new record stays pending before reporting ready.
    readiness_after: u32,
    state: Mutex<State>,
}

impl MockProvider {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            readiness_after: 0,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_readiness_after(mut self, observations: u32) -> Self {
        self.readiness_after = observations;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("mock provider state poisoned")
    }

    fn bump(state: &mut State, op: &'static str) {
        *state.calls.entry(op).or_insert(0) += 1;
    }

    fn next_id(state: &mut State, prefix: &str) -> String {
        state.seq += 1;
        format!("{prefix}-{}", state.seq)
    }

    /// Times the named operation has been invoked.
    pub fn calls(&self, op: &str) -> u32 {
        self.state().calls.get(op).copied().unwrap_or(0)
    }

    /// Make future deletes of this instance fail with an api error.
    pub fn fail_delete_of(&self, instance_id: &str) {
        self.state().fail_delete.insert(instance_id.to_string());
    }

    /// Insert an instance that is already in its ready state.
    pub fn seed_instance(&self, name: &str) -> String {
        let mut state = self.state();
        let id = Self::next_id(&mut state, "inst");
        state.instances.push(InstanceRecord {
            id: id.clone(),
            name: name.to_string(),
            vpc_id: None,
            subnet_id: None,
            pending: 0,
            public_endpoint: false,
            eip_id: None,
            accounts: Vec::new(),
            databases: Vec::new(),
            schemas: HashMap::new(),
            parameters: BTreeMap::new(),
            backup: None,
        });
        id
    }

    pub fn seed_allow_list(&self, name: &str) -> String {
        let mut state = self.state();
        let id = Self::next_id(&mut state, "acl");
        state.allow_lists.push(AllowListRecord {
            id: id.clone(),
            name: name.to_string(),
            entries: Vec::new(),
            instances: HashSet::new(),
        });
        id
    }

    pub fn seed_binding(&self, instance_id: &str, allow_list_id: &str) {
        let mut state = self.state();
        if let Some(list) = state
            .allow_lists
            .iter_mut()
            .find(|l| l.id == allow_list_id)
        {
            list.instances.insert(instance_id.to_string());
        }
    }

    pub fn seed_address(&self, name: &str, address: &str, instance_id: Option<&str>) -> String {
        let mut state = self.state();
        let allocation_id = Self::next_id(&mut state, "eip");
        state.eips.push(EipRecord {
            allocation_id: allocation_id.clone(),
            name: name.to_string(),
            address: address.to_string(),
            instance_id: instance_id.map(String::from),
        });
        allocation_id
    }

    pub fn allow_list_id(&self, name: &str) -> Option<String> {
        self.state()
            .allow_lists
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id.clone())
    }

    /// Ids passed to the most recent associate call.
    pub fn last_associated(&self) -> Option<Vec<String>> {
        self.state().last_associated.clone()
    }

    /// Ids passed to the most recent disassociate call.
    pub fn last_disassociated(&self) -> Option<Vec<String>> {
        self.state().last_disassociated.clone()
    }

    pub fn has_instance(&self, instance_id: &str) -> bool {
        self.state().instances.iter().any(|i| i.id == instance_id)
    }

    pub fn has_address(&self, address: &str) -> bool {
        self.state().eips.iter().any(|e| e.address == address)
    }
}

#[async_trait]
impl NetworkApi for MockProvider {
    async fn list_vpcs(&self) -> ApiResult<Vec<VpcSummary>> {
        let mut state = self.state();
        Self::bump(&mut state, "list_vpcs");
        Ok(state
            .vpcs
            .iter_mut()
            .map(|v| VpcSummary {
                vpc_id: v.id.clone(),
                vpc_name: v.name.clone(),
                status: observe_status(&mut v.pending, "Available"),
                cidr_block: Some(v.cidr.clone()),
            })
            .collect())
    }

    async fn create_vpc(&self, req: &CreateVpcRequest) -> ApiResult<String> {
        let mut state = self.state();
        Self::bump(&mut state, "create_vpc");
        let id = Self::next_id(&mut state, "vpc");
        let pending = self.readiness_after;
        state.vpcs.push(VpcRecord {
            id: id.clone(),
            name: req.name.clone(),
            cidr: req.cidr_block.clone(),
            pending,
        });
        Ok(id)
    }

    async fn list_subnets(&self, vpc_id: Option<&str>) -> ApiResult<Vec<SubnetSummary>> {
        let mut state = self.state();
        Self::bump(&mut state, "list_subnets");
        Ok(state
            .subnets
            .iter_mut()
            .filter(|s| vpc_id.map_or(true, |v| s.vpc_id == v))
            .map(|s| SubnetSummary {
                subnet_id: s.id.clone(),
                subnet_name: s.name.clone(),
                status: observe_status(&mut s.pending, "Available"),
                zone_id: s.zone.clone(),
                vpc_id: s.vpc_id.clone(),
                cidr_block: Some(s.cidr.clone()),
            })
            .collect())
    }

    async fn create_subnet(&self, req: &CreateSubnetRequest) -> ApiResult<String> {
        let mut state = self.state();
        Self::bump(&mut state, "create_subnet");
        let id = Self::next_id(&mut state, "subnet");
        let pending = self.readiness_after;
        state.subnets.push(SubnetRecord {
            id: id.clone(),
            name: req.name.clone(),
            vpc_id: req.vpc_id.clone(),
            zone: req.zone_id.clone(),
            cidr: req.cidr_block.clone(),
            pending,
        });
        Ok(id)
    }
}

#[async_trait]
impl AddressApi for MockProvider {
    async fn list_addresses(&self) -> ApiResult<Vec<EipSummary>> {
        let mut state = self.state();
        Self::bump(&mut state, "list_addresses");
        Ok(state
            .eips
            .iter()
            .map(|e| EipSummary {
                allocation_id: e.allocation_id.clone(),
                name: e.name.clone(),
                eip_address: e.address.clone(),
                instance_id: e.instance_id.clone(),
            })
            .collect())
    }

    async fn allocate_address(&self, spec: &EipSpec) -> ApiResult<EipSummary> {
        let mut state = self.state();
        Self::bump(&mut state, "allocate_address");
        let allocation_id = Self::next_id(&mut state, "eip");
        let address = format!("198.51.100.{}", state.seq);
        state.eips.push(EipRecord {
            allocation_id: allocation_id.clone(),
            name: spec.name.clone(),
            address: address.clone(),
            instance_id: None,
        });
        Ok(EipSummary {
            allocation_id,
            name: spec.name.clone(),
            eip_address: address,
            instance_id: None,
        })
    }

    async fn disassociate_address(&self, allocation_id: &str) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "disassociate_address");
        let eip = state
            .eips
            .iter_mut()
            .find(|e| e.allocation_id == allocation_id)
            .ok_or_else(|| ApiError::NotFound(format!("elastic address {allocation_id}")))?;
        eip.instance_id = None;
        Ok(())
    }

    async fn release_address(&self, allocation_id: &str) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "release_address");
        let index = state
            .eips
            .iter()
            .position(|e| e.allocation_id == allocation_id)
            .ok_or_else(|| ApiError::NotFound(format!("elastic address {allocation_id}")))?;
        state.eips.remove(index);
        Ok(())
    }
}

#[async_trait]
impl ResourceApi for MockProvider {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn list_instances(&self) -> ApiResult<Vec<InstanceSummary>> {
        let ready = self.kind.ready_status();
        let mut state = self.state();
        Self::bump(&mut state, "list_instances");
        Ok(state
            .instances
            .iter_mut()
            .map(|i| InstanceSummary {
                instance_id: i.id.clone(),
                instance_name: i.name.clone(),
                status: observe_status(&mut i.pending, ready),
                create_time: None,
                vpc_id: i.vpc_id.clone(),
                subnet_id: i.subnet_id.clone(),
                engine_version: None,
                eip_id: i.eip_id.clone(),
                public_ip: None,
            })
            .collect())
    }

    async fn describe_instance(&self, instance_id: &str) -> ApiResult<InstanceDetail> {
        let ready = self.kind.ready_status();
        let mut state = self.state();
        Self::bump(&mut state, "describe_instance");
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;

        let mut endpoints = vec![Endpoint {
            scope: NetworkScope::Private,
            domain: format!("{}.mock.internal", instance.name),
            port: 5432,
            eip_id: None,
        }];
        if instance.public_endpoint {
            endpoints.push(Endpoint {
                scope: NetworkScope::Public,
                domain: format!("{}.mock.public", instance.name),
                port: 5432,
                eip_id: instance.eip_id.clone(),
            });
        }
        Ok(InstanceDetail {
            instance_id: instance.id.clone(),
            status: observe_status(&mut instance.pending, ready),
            endpoints,
        })
    }

    async fn create_instance(
        &self,
        spec: &ResourceSpec,
        network: &NetworkAttachment,
    ) -> ApiResult<String> {
        let mut state = self.state();
        Self::bump(&mut state, "create_instance");
        let id = Self::next_id(&mut state, "inst");
        let pending = self.readiness_after;
        state.instances.push(InstanceRecord {
            id: id.clone(),
            name: spec.name.clone(),
            vpc_id: Some(network.vpc_id.clone()),
            subnet_id: Some(network.subnet_id.clone()),
            pending,
            public_endpoint: false,
            eip_id: None,
            accounts: Vec::new(),
            databases: Vec::new(),
            schemas: HashMap::new(),
            parameters: BTreeMap::new(),
            backup: None,
        });
        Ok(id)
    }

    async fn delete_instance(&self, instance_id: &str) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "delete_instance");
        if state.fail_delete.contains(instance_id) {
            return Err(ApiError::Api {
                code: Some("InternalError".to_string()),
                message: format!("injected delete failure for {instance_id}"),
            });
        }
        let index = state
            .instances
            .iter()
            .position(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        state.instances.remove(index);
        for list in &mut state.allow_lists {
            list.instances.remove(instance_id);
        }
        Ok(())
    }

    async fn create_public_endpoint(
        &self,
        instance_id: &str,
        allocation_id: &str,
    ) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "create_public_endpoint");
        let state = &mut *state;
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        instance.public_endpoint = true;
        instance.eip_id = Some(allocation_id.to_string());
        if let Some(eip) = state
            .eips
            .iter_mut()
            .find(|e| e.allocation_id == allocation_id)
        {
            eip.instance_id = Some(instance_id.to_string());
        }
        Ok(())
    }

    async fn list_allow_lists(
        &self,
        instance_id: Option<&str>,
    ) -> ApiResult<Vec<AllowListSummary>> {
        let mut state = self.state();
        Self::bump(&mut state, "list_allow_lists");
        Ok(state
            .allow_lists
            .iter()
            .filter(|l| instance_id.map_or(true, |id| l.instances.contains(id)))
            .map(|l| AllowListSummary {
                allow_list_id: l.id.clone(),
                allow_list_name: l.name.clone(),
                entries: l.entries.clone(),
            })
            .collect())
    }

    async fn create_allow_list(&self, spec: &AllowListSpec) -> ApiResult<String> {
        let mut state = self.state();
        Self::bump(&mut state, "create_allow_list");
        let id = Self::next_id(&mut state, "acl");
        state.allow_lists.push(AllowListRecord {
            id: id.clone(),
            name: spec.name.clone(),
            entries: spec.entries.clone(),
            instances: HashSet::new(),
        });
        Ok(id)
    }

    async fn associate_allow_lists(
        &self,
        instance_id: &str,
        allow_list_ids: &[String],
    ) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "associate_allow_lists");
        state.last_associated = Some(allow_list_ids.to_vec());
        for id in allow_list_ids {
            let list = state
                .allow_lists
                .iter_mut()
                .find(|l| &l.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("allow-list {id}")))?;
            list.instances.insert(instance_id.to_string());
        }
        Ok(())
    }

    async fn disassociate_allow_lists(
        &self,
        instance_id: &str,
        allow_list_ids: &[String],
    ) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "disassociate_allow_lists");
        state.last_disassociated = Some(allow_list_ids.to_vec());
        for id in allow_list_ids {
            let list = state
                .allow_lists
                .iter_mut()
                .find(|l| &l.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("allow-list {id}")))?;
            list.instances.remove(instance_id);
        }
        Ok(())
    }

    async fn list_accounts(&self, instance_id: &str) -> ApiResult<Vec<String>> {
        let mut state = self.state();
        Self::bump(&mut state, "list_accounts");
        let instance = state
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        Ok(instance.accounts.clone())
    }

    async fn create_account(&self, instance_id: &str, account: &AccountSpec) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "create_account");
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        if instance.accounts.contains(&account.username) {
            return Err(ApiError::AlreadyExists);
        }
        instance.accounts.push(account.username.clone());
        Ok(())
    }

    async fn list_databases(&self, instance_id: &str) -> ApiResult<Vec<String>> {
        let mut state = self.state();
        Self::bump(&mut state, "list_databases");
        let instance = state
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        Ok(instance.databases.clone())
    }

    async fn create_database(
        &self,
        instance_id: &str,
        database: &DatabaseObjectSpec,
    ) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "create_database");
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        if instance.databases.contains(&database.name) {
            return Err(ApiError::AlreadyExists);
        }
        instance.databases.push(database.name.clone());
        Ok(())
    }

    async fn list_schemas(&self, instance_id: &str, db_name: &str) -> ApiResult<Vec<String>> {
        let mut state = self.state();
        Self::bump(&mut state, "list_schemas");
        let instance = state
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        Ok(instance.schemas.get(db_name).cloned().unwrap_or_default())
    }

    async fn create_schema(
        &self,
        instance_id: &str,
        db_name: &str,
        schema: &SchemaSpec,
    ) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "create_schema");
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        instance
            .schemas
            .entry(db_name.to_string())
            .or_default()
            .push(schema.name.clone());
        Ok(())
    }

    async fn modify_backup_policy(
        &self,
        instance_id: &str,
        backup: &BackupSpec,
    ) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "modify_backup_policy");
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        instance.backup = Some(backup.clone());
        Ok(())
    }

    async fn modify_instance_parameters(
        &self,
        instance_id: &str,
        parameters: &BTreeMap<String, String>,
    ) -> ApiResult<()> {
        let mut state = self.state();
        Self::bump(&mut state, "modify_instance_parameters");
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))?;
        instance.parameters.extend(
            parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Ok(())
    }

    async fn list_node_pools(&self, cluster_id: &str) -> ApiResult<Vec<NodePoolSummary>> {
        let mut state = self.state();
        Self::bump(&mut state, "list_node_pools");
        Ok(state
            .node_pools
            .iter()
            .filter(|p| p.cluster_id == cluster_id)
            .map(|p| NodePoolSummary {
                node_pool_id: p.id.clone(),
                name: p.name.clone(),
                cluster_id: p.cluster_id.clone(),
            })
            .collect())
    }

    async fn create_node_pool(&self, cluster_id: &str, pool: &NodePoolSpec) -> ApiResult<String> {
        let mut state = self.state();
        Self::bump(&mut state, "create_node_pool");
        let id = Self::next_id(&mut state, "pool");
        state.node_pools.push(PoolRecord {
            id: id.clone(),
            name: pool.name.clone(),
            cluster_id: cluster_id.to_string(),
        });
        Ok(id)
    }
}
