//! Dependency-ordered provisioning.
//!
//! Each resource kind has an ordered plan (see [`crate::plan`]); every
//! create step runs behind a list-then-match idempotency check, and every
//! asynchronous create is followed by a readiness wait. A step failure
//! aborts the remaining steps of that resource's run and nothing is rolled
//! back. Re-invoking with the same spec is the recovery mechanism, since
//! every step is find-or-create.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use strato_models::{
    AccountSpec, BatchReport, DatabaseObjectSpec, EipSpec, NodePoolSpec, ResourceHandle,
    ResourceOutcome, ResourceSpec, StepFailure,
};

use crate::allowlist::AllowListBinder;
use crate::client::{
    CreateSubnetRequest, CreateVpcRequest, NetworkAttachment, ProviderRegistry, ResourceApi,
};
use crate::error::{ApiError, OrchestrationError, OrchestrationResult};
use crate::guard;
use crate::plan::{self, ProvisionStep};
use crate::readiness::{self, ProbeErrorPolicy, ReadinessDefaults};

pub struct Provisioner {
    registry: ProviderRegistry,
    binder: AllowListBinder,
    defaults: ReadinessDefaults,
    cancel: CancellationToken,
}

impl Provisioner {
    pub fn new(registry: ProviderRegistry, binder: AllowListBinder) -> Self {
        Self {
            registry,
            binder,
            defaults: ReadinessDefaults::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: ReadinessDefaults) -> Self {
        self.binder = self.binder.with_wait(defaults.binding);
        self.defaults = defaults;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token an operator can use to abort a stuck run at its next wait point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Provision one resource, walking its plan in order.
    pub async fn provision(&self, spec: &ResourceSpec) -> OrchestrationResult<ResourceHandle> {
        let api = self
            .registry
            .product(spec.kind)
            .ok_or(OrchestrationError::UnregisteredKind(spec.kind))?;
        info!(kind = %spec.kind, name = %spec.name, "provisioning resource");

        let mut vpc_id = spec.vpc_id.clone();
        let mut subnet_id = spec.subnet_id.clone();
        let mut instance_id: Option<String> = None;

        for step in plan::steps_for(spec.kind) {
            if self.cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }
            match step {
                ProvisionStep::Network => {
                    if vpc_id.is_none() {
                        vpc_id = Some(self.ensure_network(spec).await?);
                    }
                }
                ProvisionStep::Subnet => {
                    if subnet_id.is_none() {
                        let vpc = vpc_id.as_deref().ok_or(OrchestrationError::MissingInput {
                            resource: spec.name.clone(),
                            what: "vpc id",
                        })?;
                        subnet_id = Some(self.ensure_subnet(spec, vpc).await?);
                    }
                }
                ProvisionStep::Primary => {
                    let network = NetworkAttachment {
                        vpc_id: vpc_id.clone().ok_or(OrchestrationError::MissingInput {
                            resource: spec.name.clone(),
                            what: "vpc id",
                        })?,
                        subnet_id: subnet_id.clone().ok_or(OrchestrationError::MissingInput {
                            resource: spec.name.clone(),
                            what: "subnet id",
                        })?,
                    };
                    instance_id = Some(self.ensure_instance(api.as_ref(), spec, &network).await?);
                }
                ProvisionStep::Endpoint => {
                    if let Some(eip) = &spec.public_address {
                        let id = instance_id.as_deref().ok_or(
                            OrchestrationError::MissingInput {
                                resource: spec.name.clone(),
                                what: "instance id",
                            },
                        )?;
                        self.ensure_public_endpoint(api.as_ref(), id, eip).await?;
                    }
                }
                ProvisionStep::AllowLists => {
                    if !spec.allow_lists.is_empty() {
                        let id = instance_id.as_deref().ok_or(
                            OrchestrationError::MissingInput {
                                resource: spec.name.clone(),
                                what: "instance id",
                            },
                        )?;
                        self.binder
                            .bind(api.as_ref(), id, &spec.allow_lists, Some(&self.cancel))
                            .await?;
                    }
                }
                ProvisionStep::PostConfig => {
                    let id = instance_id.as_deref().ok_or(
                        OrchestrationError::MissingInput {
                            resource: spec.name.clone(),
                            what: "instance id",
                        },
                    )?;
                    self.post_configure(api.as_ref(), spec, id).await?;
                }
            }
        }

        let id = instance_id.ok_or(OrchestrationError::MissingInput {
            resource: spec.name.clone(),
            what: "instance id",
        })?;
        info!(kind = %spec.kind, name = %spec.name, instance_id = %id, "resource provisioned");
        Ok(ResourceHandle::new(spec.kind, id, spec.name.clone()))
    }

    /// Provision a batch, continuing past per-resource failures.
    ///
    /// Specs run sequentially: two concurrent find-or-create sequences on a
    /// shared network name could both observe "absent" and both create.
    pub async fn provision_batch(&self, specs: &[ResourceSpec]) -> BatchReport {
        let run_id = Uuid::new_v4();
        info!(%run_id, count = specs.len(), "starting provisioning batch");

        let mut report = BatchReport::default();
        for spec in specs {
            let mut outcome = ResourceOutcome::new(&spec.name);
            if self.cancel.is_cancelled() {
                outcome.record_failure("provision", OrchestrationError::Cancelled);
                report.push(outcome);
                continue;
            }
            match self.provision(spec).await {
                Ok(handle) => outcome.handle = Some(handle),
                Err(err) => {
                    error!(name = %spec.name, error = %err, "provisioning failed");
                    outcome.record_failure("provision", &err);
                }
            }
            report.push(outcome);
        }
        info!(%run_id, failed = report.failed_subjects().len(), "provisioning batch finished");
        report
    }

    async fn ensure_network(&self, spec: &ResourceSpec) -> OrchestrationResult<String> {
        let name = spec.network_name();
        let vpcs = self
            .registry
            .network()
            .list_vpcs()
            .await
            .map_err(|e| OrchestrationError::op("list networks", &name, e))?;
        if let Some(existing) = guard::find_named(vpcs, &name) {
            debug!(%name, vpc_id = %existing.vpc_id, "network already exists");
            return Ok(existing.vpc_id);
        }

        let request = CreateVpcRequest {
            name: name.clone(),
            cidr_block: spec.network_cidr(),
            description: spec.network.as_ref().and_then(|n| n.description.clone()),
        };
        let vpc_id = self
            .registry
            .network()
            .create_vpc(&request)
            .await
            .map_err(|e| OrchestrationError::op("create network", &name, e))?;
        info!(%name, vpc_id = %vpc_id, "network created");

        let network = self.registry.network();
        let id_ref = vpc_id.as_str();
        let ready = readiness::wait_for_status(
            &name,
            "Available",
            self.defaults.network,
            ProbeErrorPolicy::KeepPolling,
            Some(&self.cancel),
            move || async move {
                network.list_vpcs().await.map(|items| {
                    items
                        .into_iter()
                        .find(|v| v.vpc_id == id_ref)
                        .map(|v| v.status)
                })
            },
        )
        .await?;
        if !ready {
            return Err(OrchestrationError::ReadinessTimeout {
                resource: name,
                target: "Available".to_string(),
            });
        }
        Ok(vpc_id)
    }

    async fn ensure_subnet(&self, spec: &ResourceSpec, vpc_id: &str) -> OrchestrationResult<String> {
        let name = spec.subnet_name();
        let subnets = self
            .registry
            .network()
            .list_subnets(Some(vpc_id))
            .await
            .map_err(|e| OrchestrationError::op("list subnets", &name, e))?;
        if let Some(existing) = guard::find_named(subnets, &name) {
            debug!(%name, subnet_id = %existing.subnet_id, "subnet already exists");
            return Ok(existing.subnet_id);
        }

        let request = CreateSubnetRequest {
            vpc_id: vpc_id.to_string(),
            name: name.clone(),
            cidr_block: spec.subnet_cidr(),
            zone_id: spec.zone.clone(),
            description: spec.subnet.as_ref().and_then(|s| s.description.clone()),
        };
        let subnet_id = self
            .registry
            .network()
            .create_subnet(&request)
            .await
            .map_err(|e| OrchestrationError::op("create subnet", &name, e))?;
        info!(%name, subnet_id = %subnet_id, zone = %spec.zone, "subnet created");

        let network = self.registry.network();
        let id_ref = subnet_id.as_str();
        let vpc_ref = vpc_id;
        let ready = readiness::wait_for_status(
            &name,
            "Available",
            self.defaults.network,
            ProbeErrorPolicy::KeepPolling,
            Some(&self.cancel),
            move || async move {
                network.list_subnets(Some(vpc_ref)).await.map(|items| {
                    items
                        .into_iter()
                        .find(|s| s.subnet_id == id_ref)
                        .map(|s| s.status)
                })
            },
        )
        .await?;
        if !ready {
            return Err(OrchestrationError::ReadinessTimeout {
                resource: name,
                target: "Available".to_string(),
            });
        }
        Ok(subnet_id)
    }

    async fn ensure_instance(
        &self,
        api: &dyn ResourceApi,
        spec: &ResourceSpec,
        network: &NetworkAttachment,
    ) -> OrchestrationResult<String> {
        let instances = api
            .list_instances()
            .await
            .map_err(|e| OrchestrationError::op("list instances", &spec.name, e))?;
        if let Some(existing) = guard::find_named(instances, &spec.name) {
            debug!(name = %spec.name, instance_id = %existing.instance_id, "instance already exists");
            return Ok(existing.instance_id);
        }

        let instance_id = api
            .create_instance(spec, network)
            .await
            .map_err(|e| OrchestrationError::op("create instance", &spec.name, e))?;
        info!(name = %spec.name, instance_id = %instance_id, "instance created");

        let target = spec.kind.ready_status();
        let id_ref = instance_id.as_str();
        let ready = readiness::wait_for_status(
            &spec.name,
            target,
            self.defaults.for_kind(spec.kind),
            ProbeErrorPolicy::KeepPolling,
            Some(&self.cancel),
            move || async move {
                api.list_instances()
                    .await
                    .map(|items| guard::status_of(items, id_ref))
            },
        )
        .await?;
        if !ready {
            return Err(OrchestrationError::ReadinessTimeout {
                resource: spec.name.clone(),
                target: target.to_string(),
            });
        }
        Ok(instance_id)
    }

    /// Allocate (or find) the named elastic address and attach a public
    /// endpoint. The endpoint API reports success or failure per attempt
    /// rather than an intermediate state, so the instance detail is
    /// re-probed under the bounded-attempts policy until a public address
    /// appears.
    async fn ensure_public_endpoint(
        &self,
        api: &dyn ResourceApi,
        instance_id: &str,
        eip: &EipSpec,
    ) -> OrchestrationResult<()> {
        let addresses = self
            .registry
            .address()
            .list_addresses()
            .await
            .map_err(|e| OrchestrationError::op("list elastic addresses", &eip.name, e))?;
        let address = match guard::find_named(addresses, &eip.name) {
            Some(existing) => {
                debug!(name = %eip.name, allocation_id = %existing.allocation_id, "elastic address already exists");
                existing
            }
            None => {
                let allocated = self
                    .registry
                    .address()
                    .allocate_address(eip)
                    .await
                    .map_err(|e| OrchestrationError::op("allocate elastic address", &eip.name, e))?;
                info!(name = %eip.name, allocation_id = %allocated.allocation_id, address = %allocated.eip_address, "elastic address allocated");
                allocated
            }
        };

        let detail = api
            .describe_instance(instance_id)
            .await
            .map_err(|e| OrchestrationError::op("describe instance", instance_id, e))?;
        if let Some(endpoint) = detail.public_endpoint() {
            debug!(instance_id, domain = %endpoint.domain, "public endpoint already exists");
            return Ok(());
        }

        api.create_public_endpoint(instance_id, &address.allocation_id)
            .await
            .map_err(|e| OrchestrationError::op("create public endpoint", instance_id, e))?;

        let ready = readiness::wait_for_status(
            instance_id,
            "Public",
            self.defaults.endpoint,
            ProbeErrorPolicy::KeepPolling,
            Some(&self.cancel),
            move || async move {
                api.describe_instance(instance_id).await.map(|detail| {
                    detail.public_endpoint().map(|_| "Public".to_string())
                })
            },
        )
        .await?;
        if !ready {
            return Err(OrchestrationError::ReadinessTimeout {
                resource: instance_id.to_string(),
                target: "Public".to_string(),
            });
        }
        info!(instance_id, "public endpoint ready");
        Ok(())
    }

    /// Kind-specific post-configuration. Every sub-step is independently
    /// idempotent and every sub-step is attempted even when an earlier one
    /// failed; the call fails afterwards if any did. Succeeded sub-steps are
    /// never rolled back.
    async fn post_configure(
        &self,
        api: &dyn ResourceApi,
        spec: &ResourceSpec,
        instance_id: &str,
    ) -> OrchestrationResult<()> {
        let mut failures: Vec<StepFailure> = Vec::new();
        let mut record = |operation: &str, err: &dyn std::fmt::Display| {
            error!(instance_id, operation, error = %err, "post-configuration step failed");
            failures.push(StepFailure {
                operation: operation.to_string(),
                error: err.to_string(),
            });
        };

        if !spec.accounts.is_empty() {
            if let Err(err) = self.ensure_accounts(api, instance_id, &spec.accounts).await {
                record("create accounts", &err);
            }
        }
        if !spec.databases.is_empty() {
            if let Err(err) = self
                .ensure_databases(api, instance_id, &spec.databases)
                .await
            {
                record("create databases", &err);
            }
        }
        if let Some(backup) = &spec.backup {
            match api.modify_backup_policy(instance_id, backup).await {
                Ok(()) => info!(instance_id, "backup policy applied"),
                Err(err) => record("modify backup policy", &err),
            }
        }
        if !spec.parameters.is_empty() {
            match api
                .modify_instance_parameters(instance_id, &spec.parameters)
                .await
            {
                Ok(()) => info!(instance_id, count = spec.parameters.len(), "instance parameters applied"),
                Err(err) => record("modify instance parameters", &err),
            }
        }
        if !spec.node_pools.is_empty() {
            if let Err(err) = self
                .ensure_node_pools(api, instance_id, &spec.node_pools)
                .await
            {
                record("create node pools", &err);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OrchestrationError::PostConfig {
                resource: instance_id.to_string(),
                failures,
            })
        }
    }

    async fn ensure_accounts(
        &self,
        api: &dyn ResourceApi,
        instance_id: &str,
        accounts: &[AccountSpec],
    ) -> Result<(), ApiError> {
        let existing = api.list_accounts(instance_id).await?;
        for account in accounts {
            if existing.iter().any(|name| name == &account.username) {
                debug!(instance_id, user = %account.username, "account already exists");
                continue;
            }
            api.create_account(instance_id, account).await?;
            info!(instance_id, user = %account.username, "account created");
        }
        Ok(())
    }

    async fn ensure_databases(
        &self,
        api: &dyn ResourceApi,
        instance_id: &str,
        databases: &[DatabaseObjectSpec],
    ) -> Result<(), ApiError> {
        let existing = api.list_databases(instance_id).await?;
        for database in databases {
            if existing.iter().any(|name| name == &database.name) {
                debug!(instance_id, db = %database.name, "database already exists");
            } else {
                api.create_database(instance_id, database).await?;
                info!(instance_id, db = %database.name, "database created");
            }
            if database.schemas.is_empty() {
                continue;
            }
            let existing_schemas = api.list_schemas(instance_id, &database.name).await?;
            for schema in &database.schemas {
                if existing_schemas.iter().any(|name| name == &schema.name) {
                    debug!(instance_id, db = %database.name, schema = %schema.name, "schema already exists");
                    continue;
                }
                api.create_schema(instance_id, &database.name, schema).await?;
                info!(instance_id, db = %database.name, schema = %schema.name, "schema created");
            }
        }
        Ok(())
    }

    async fn ensure_node_pools(
        &self,
        api: &dyn ResourceApi,
        cluster_id: &str,
        pools: &[NodePoolSpec],
    ) -> Result<(), ApiError> {
        let existing = api.list_node_pools(cluster_id).await?;
        for pool in pools {
            if existing.iter().any(|p| p.name == pool.name) {
                debug!(cluster_id, pool = %pool.name, "node pool already exists");
                continue;
            }
            let pool_id = api.create_node_pool(cluster_id, pool).await?;
            info!(cluster_id, pool = %pool.name, node_pool_id = %pool_id, "node pool created");
        }
        Ok(())
    }
}
