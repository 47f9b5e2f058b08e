//! The control-plane client boundary.
//!
//! Each trait wraps one plane of the provider API. The orchestrator never
//! sees transport details; it interprets the structured summaries and the
//! typed error per call. Optional product capabilities carry default bodies
//! returning [`ApiError::Unsupported`]; the provisioner only invokes them
//! when the spec carries the matching section.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use strato_models::{
    AccountSpec, AllowListSpec, AllowListSummary, BackupSpec, DatabaseObjectSpec, EipSpec,
    EipSummary, InstanceDetail, InstanceSummary, NodePoolSpec, NodePoolSummary, ResourceKind,
    ResourceSpec, SchemaSpec, SubnetSummary, VpcSummary,
};

use crate::error::{ApiError, ApiResult};

/// Network attachment identifiers consumed by instance creation.
#[derive(Debug, Clone)]
pub struct NetworkAttachment {
    pub vpc_id: String,
    pub subnet_id: String,
}

#[derive(Debug, Clone)]
pub struct CreateVpcRequest {
    pub name: String,
    pub cidr_block: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateSubnetRequest {
    pub vpc_id: String,
    pub name: String,
    pub cidr_block: String,
    pub zone_id: String,
    pub description: Option<String>,
}

/// VPC and subnet operations.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    async fn list_vpcs(&self) -> ApiResult<Vec<VpcSummary>>;

    /// Returns the new VPC id.
    async fn create_vpc(&self, req: &CreateVpcRequest) -> ApiResult<String>;

    async fn list_subnets(&self, vpc_id: Option<&str>) -> ApiResult<Vec<SubnetSummary>>;

    /// Returns the new subnet id.
    async fn create_subnet(&self, req: &CreateSubnetRequest) -> ApiResult<String>;
}

/// Elastic address operations.
#[async_trait]
pub trait AddressApi: Send + Sync {
    async fn list_addresses(&self) -> ApiResult<Vec<EipSummary>>;

    async fn allocate_address(&self, spec: &EipSpec) -> ApiResult<EipSummary>;

    async fn disassociate_address(&self, allocation_id: &str) -> ApiResult<()>;

    async fn release_address(&self, allocation_id: &str) -> ApiResult<()>;
}

/// Control-plane operations for one managed product family.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn list_instances(&self) -> ApiResult<Vec<InstanceSummary>>;

    async fn describe_instance(&self, instance_id: &str) -> ApiResult<InstanceDetail>;

    /// Returns the new instance id. The create call is asynchronous on the
    /// provider side; callers poll for readiness afterwards.
    async fn create_instance(
        &self,
        spec: &ResourceSpec,
        network: &NetworkAttachment,
    ) -> ApiResult<String>;

    async fn delete_instance(&self, instance_id: &str) -> ApiResult<()>;

    async fn create_public_endpoint(
        &self,
        _instance_id: &str,
        _allocation_id: &str,
    ) -> ApiResult<()> {
        Err(ApiError::Unsupported("create_public_endpoint"))
    }

    /// Allow-lists of this product, scoped to an instance when given.
    async fn list_allow_lists(
        &self,
        _instance_id: Option<&str>,
    ) -> ApiResult<Vec<AllowListSummary>> {
        Err(ApiError::Unsupported("list_allow_lists"))
    }

    /// Returns the new allow-list id.
    async fn create_allow_list(&self, _spec: &AllowListSpec) -> ApiResult<String> {
        Err(ApiError::Unsupported("create_allow_list"))
    }

    async fn associate_allow_lists(
        &self,
        _instance_id: &str,
        _allow_list_ids: &[String],
    ) -> ApiResult<()> {
        Err(ApiError::Unsupported("associate_allow_lists"))
    }

    async fn disassociate_allow_lists(
        &self,
        _instance_id: &str,
        _allow_list_ids: &[String],
    ) -> ApiResult<()> {
        Err(ApiError::Unsupported("disassociate_allow_lists"))
    }

    async fn list_accounts(&self, _instance_id: &str) -> ApiResult<Vec<String>> {
        Err(ApiError::Unsupported("list_accounts"))
    }

    async fn create_account(&self, _instance_id: &str, _account: &AccountSpec) -> ApiResult<()> {
        Err(ApiError::Unsupported("create_account"))
    }

    async fn list_databases(&self, _instance_id: &str) -> ApiResult<Vec<String>> {
        Err(ApiError::Unsupported("list_databases"))
    }

    async fn create_database(
        &self,
        _instance_id: &str,
        _database: &DatabaseObjectSpec,
    ) -> ApiResult<()> {
        Err(ApiError::Unsupported("create_database"))
    }

    async fn list_schemas(&self, _instance_id: &str, _db_name: &str) -> ApiResult<Vec<String>> {
        Err(ApiError::Unsupported("list_schemas"))
    }

    async fn create_schema(
        &self,
        _instance_id: &str,
        _db_name: &str,
        _schema: &SchemaSpec,
    ) -> ApiResult<()> {
        Err(ApiError::Unsupported("create_schema"))
    }

    async fn modify_backup_policy(
        &self,
        _instance_id: &str,
        _backup: &BackupSpec,
    ) -> ApiResult<()> {
        Err(ApiError::Unsupported("modify_backup_policy"))
    }

    async fn modify_instance_parameters(
        &self,
        _instance_id: &str,
        _parameters: &BTreeMap<String, String>,
    ) -> ApiResult<()> {
        Err(ApiError::Unsupported("modify_instance_parameters"))
    }

    async fn list_node_pools(&self, _cluster_id: &str) -> ApiResult<Vec<NodePoolSummary>> {
        Err(ApiError::Unsupported("list_node_pools"))
    }

    /// Returns the new node pool id.
    async fn create_node_pool(
        &self,
        _cluster_id: &str,
        _pool: &NodePoolSpec,
    ) -> ApiResult<String> {
        Err(ApiError::Unsupported("create_node_pool"))
    }
}

/// Clients for every product in play plus the shared network and address
/// planes. Built once per run; no ambient process-wide configuration.
#[derive(Clone)]
pub struct ProviderRegistry {
    network: Arc<dyn NetworkApi>,
    address: Arc<dyn AddressApi>,
    products: HashMap<ResourceKind, Arc<dyn ResourceApi>>,
}

impl ProviderRegistry {
    pub fn new(network: Arc<dyn NetworkApi>, address: Arc<dyn AddressApi>) -> Self {
        Self {
            network,
            address,
            products: HashMap::new(),
        }
    }

    pub fn register(mut self, api: Arc<dyn ResourceApi>) -> Self {
        self.products.insert(api.kind(), api);
        self
    }

    pub fn network(&self) -> &dyn NetworkApi {
        self.network.as_ref()
    }

    pub fn address(&self) -> &dyn AddressApi {
        self.address.as_ref()
    }

    pub fn product(&self, kind: ResourceKind) -> Option<Arc<dyn ResourceApi>> {
        self.products.get(&kind).cloned()
    }

    pub fn registered_kinds(&self) -> Vec<ResourceKind> {
        self.products.keys().copied().collect()
    }
}
