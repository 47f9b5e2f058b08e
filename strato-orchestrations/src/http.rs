//! Thin JSON gateway client for the control plane.
//!
//! Marshals each boundary operation as a JSON action envelope against a
//! gateway endpoint. This is deliberately not a vendor SDK: no request
//! signing, no wire-format fidelity. It carries only the structured summaries and the
//! status-code-to-error mapping the orchestrator interprets.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use async_trait::async_trait;

use strato_models::{
    AccountSpec, AllowListSpec, AllowListSummary, BackupSpec, DatabaseObjectSpec, EipSpec,
    EipSummary, InstanceDetail, InstanceSummary, NodePoolSpec, NodePoolSummary, ResourceKind,
    ResourceSpec, SchemaSpec, SubnetSummary, VpcSummary,
};

use crate::client::{
    AddressApi, CreateSubnetRequest, CreateVpcRequest, NetworkApi, NetworkAttachment, ResourceApi,
};
use crate::error::{ApiError, ApiResult};

/// Connection settings for one gateway. Passed in explicitly; there is no
/// process-wide default configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Clone)]
pub struct HttpProvider {
    kind: ResourceKind,
    config: GatewayConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Empty {}

impl HttpProvider {
    pub fn new(kind: ResourceKind, config: GatewayConfig) -> Self {
        Self {
            kind,
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        plane: &str,
        action: &str,
        body: serde_json::Value,
    ) -> ApiResult<T> {
        let url = format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            plane,
            action
        );
        let response = self
            .http
            .post(&url)
            .header("x-access-key", &self.config.access_key)
            .header("x-secret-key", &self.config.secret_key)
            .header("x-region", &self.config.region)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        match status {
            s if s.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| ApiError::Transport(format!("decoding {action} response: {e}"))),
            StatusCode::NOT_FOUND => {
                let message = response.text().await.unwrap_or_default();
                Err(ApiError::NotFound(message))
            }
            StatusCode::CONFLICT => Err(ApiError::AlreadyExists),
            StatusCode::TOO_MANY_REQUESTS => Err(ApiError::Throttled),
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(ApiError::Api {
                    code: Some(status.as_u16().to_string()),
                    message,
                })
            }
        }
    }

    fn plane(&self) -> &'static str {
        self.kind.as_str()
    }
}

#[async_trait]
impl NetworkApi for HttpProvider {
    async fn list_vpcs(&self) -> ApiResult<Vec<VpcSummary>> {
        let response: ListResponse<VpcSummary> =
            self.call("network", "list-vpcs", json!({})).await?;
        Ok(response.items)
    }

    async fn create_vpc(&self, req: &CreateVpcRequest) -> ApiResult<String> {
        let response: IdResponse = self
            .call(
                "network",
                "create-vpc",
                json!({
                    "name": req.name,
                    "cidr_block": req.cidr_block,
                    "description": req.description,
                }),
            )
            .await?;
        Ok(response.id)
    }

    async fn list_subnets(&self, vpc_id: Option<&str>) -> ApiResult<Vec<SubnetSummary>> {
        let response: ListResponse<SubnetSummary> = self
            .call("network", "list-subnets", json!({ "vpc_id": vpc_id }))
            .await?;
        Ok(response.items)
    }

    async fn create_subnet(&self, req: &CreateSubnetRequest) -> ApiResult<String> {
        let response: IdResponse = self
            .call(
                "network",
                "create-subnet",
                json!({
                    "vpc_id": req.vpc_id,
                    "name": req.name,
                    "cidr_block": req.cidr_block,
                    "zone_id": req.zone_id,
                    "description": req.description,
                }),
            )
            .await?;
        Ok(response.id)
    }
}

#[async_trait]
impl AddressApi for HttpProvider {
    async fn list_addresses(&self) -> ApiResult<Vec<EipSummary>> {
        let response: ListResponse<EipSummary> =
            self.call("address", "list-addresses", json!({})).await?;
        Ok(response.items)
    }

    async fn allocate_address(&self, spec: &EipSpec) -> ApiResult<EipSummary> {
        self.call("address", "allocate-address", json!({ "spec": spec }))
            .await
    }

    async fn disassociate_address(&self, allocation_id: &str) -> ApiResult<()> {
        let _: Empty = self
            .call(
                "address",
                "disassociate-address",
                json!({ "allocation_id": allocation_id }),
            )
            .await?;
        Ok(())
    }

    async fn release_address(&self, allocation_id: &str) -> ApiResult<()> {
        let _: Empty = self
            .call(
                "address",
                "release-address",
                json!({ "allocation_id": allocation_id }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceApi for HttpProvider {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn list_instances(&self) -> ApiResult<Vec<InstanceSummary>> {
        let response: ListResponse<InstanceSummary> =
            self.call(self.plane(), "list-instances", json!({})).await?;
        Ok(response.items)
    }

    async fn describe_instance(&self, instance_id: &str) -> ApiResult<InstanceDetail> {
        self.call(
            self.plane(),
            "describe-instance",
            json!({ "instance_id": instance_id }),
        )
        .await
    }

    async fn create_instance(
        &self,
        spec: &ResourceSpec,
        network: &NetworkAttachment,
    ) -> ApiResult<String> {
        let response: IdResponse = self
            .call(
                self.plane(),
                "create-instance",
                json!({
                    "spec": spec,
                    "vpc_id": network.vpc_id,
                    "subnet_id": network.subnet_id,
                }),
            )
            .await?;
        Ok(response.id)
    }

    async fn delete_instance(&self, instance_id: &str) -> ApiResult<()> {
        let _: Empty = self
            .call(
                self.plane(),
                "delete-instance",
                json!({ "instance_id": instance_id }),
            )
            .await?;
        Ok(())
    }

    async fn create_public_endpoint(
        &self,
        instance_id: &str,
        allocation_id: &str,
    ) -> ApiResult<()> {
        let _: Empty = self
            .call(
                self.plane(),
                "create-public-endpoint",
                json!({
                    "instance_id": instance_id,
                    "allocation_id": allocation_id,
                }),
            )
            .await?;
        Ok(())
    }

    async fn list_allow_lists(
        &self,
        instance_id: Option<&str>,
    ) -> ApiResult<Vec<AllowListSummary>> {
        let response: ListResponse<AllowListSummary> = self
            .call(
                self.plane(),
                "list-allow-lists",
                json!({ "instance_id": instance_id }),
            )
            .await?;
        Ok(response.items)
    }

    async fn create_allow_list(&self, spec: &AllowListSpec) -> ApiResult<String> {
        let response: IdResponse = self
            .call(self.plane(), "create-allow-list", json!({ "spec": spec }))
            .await?;
        Ok(response.id)
    }

    async fn associate_allow_lists(
        &self,
        instance_id: &str,
        allow_list_ids: &[String],
    ) -> ApiResult<()> {
        let _: Empty = self
            .call(
                self.plane(),
                "associate-allow-lists",
                json!({
                    "instance_id": instance_id,
                    "allow_list_ids": allow_list_ids,
                }),
            )
            .await?;
        Ok(())
    }

    async fn disassociate_allow_lists(
        &self,
        instance_id: &str,
        allow_list_ids: &[String],
    ) -> ApiResult<()> {
        let _: Empty = self
            .call(
                self.plane(),
                "disassociate-allow-lists",
                json!({
                    "instance_id": instance_id,
                    "allow_list_ids": allow_list_ids,
                }),
            )
            .await?;
        Ok(())
    }

    async fn list_accounts(&self, instance_id: &str) -> ApiResult<Vec<String>> {
        let response: ListResponse<String> = self
            .call(
                self.plane(),
                "list-accounts",
                json!({ "instance_id": instance_id }),
            )
            .await?;
        Ok(response.items)
    }

    async fn create_account(&self, instance_id: &str, account: &AccountSpec) -> ApiResult<()> {
        let _: Empty = self
            .call(
                self.plane(),
                "create-account",
                json!({
                    "instance_id": instance_id,
                    "account": account,
                }),
            )
            .await?;
        Ok(())
    }

    async fn list_databases(&self, instance_id: &str) -> ApiResult<Vec<String>> {
        let response: ListResponse<String> = self
            .call(
                self.plane(),
                "list-databases",
                json!({ "instance_id": instance_id }),
            )
            .await?;
        Ok(response.items)
    }

    async fn create_database(
        &self,
        instance_id: &str,
        database: &DatabaseObjectSpec,
    ) -> ApiResult<()> {
        let _: Empty = self
            .call(
                self.plane(),
                "create-database",
                json!({
                    "instance_id": instance_id,
                    "name": database.name,
                    "owner": database.owner,
                }),
            )
            .await?;
        Ok(())
    }

    async fn list_schemas(&self, instance_id: &str, db_name: &str) -> ApiResult<Vec<String>> {
        let response: ListResponse<String> = self
            .call(
                self.plane(),
                "list-schemas",
                json!({
                    "instance_id": instance_id,
                    "db_name": db_name,
                }),
            )
            .await?;
        Ok(response.items)
    }

    async fn create_schema(
        &self,
        instance_id: &str,
        db_name: &str,
        schema: &SchemaSpec,
    ) -> ApiResult<()> {
        let _: Empty = self
            .call(
                self.plane(),
                "create-schema",
                json!({
                    "instance_id": instance_id,
                    "db_name": db_name,
                    "schema": schema,
                }),
            )
            .await?;
        Ok(())
    }

    async fn modify_backup_policy(
        &self,
        instance_id: &str,
        backup: &BackupSpec,
    ) -> ApiResult<()> {
        let _: Empty = self
            .call(
                self.plane(),
                "modify-backup-policy",
                json!({
                    "instance_id": instance_id,
                    "backup": backup,
                }),
            )
            .await?;
        Ok(())
    }

    async fn modify_instance_parameters(
        &self,
        instance_id: &str,
        parameters: &BTreeMap<String, String>,
    ) -> ApiResult<()> {
        let _: Empty = self
            .call(
                self.plane(),
                "modify-instance-parameters",
                json!({
                    "instance_id": instance_id,
                    "parameters": parameters,
                }),
            )
            .await?;
        Ok(())
    }

    async fn list_node_pools(&self, cluster_id: &str) -> ApiResult<Vec<NodePoolSummary>> {
        let response: ListResponse<NodePoolSummary> = self
            .call(
                self.plane(),
                "list-node-pools",
                json!({ "cluster_id": cluster_id }),
            )
            .await?;
        Ok(response.items)
    }

    async fn create_node_pool(&self, cluster_id: &str, pool: &NodePoolSpec) -> ApiResult<String> {
        let response: IdResponse = self
            .call(
                self.plane(),
                "create-node-pool",
                json!({
                    "cluster_id": cluster_id,
                    "pool": pool,
                }),
            )
            .await?;
        Ok(response.id)
    }
}
