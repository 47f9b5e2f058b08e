//! Teardown orchestration.
//!
//! The inverse of the provisioning order: access control unbinds first, the
//! companion elastic address is detached and released next, the primary
//! resource is deleted last. Targets are independent of each other and every
//! sub-step is attempted even when an earlier one failed for the same target:
//! leaving a resource undeleted is worse than leaving an allow-list bound.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use strato_models::{BatchReport, ResourceKind, ResourceOutcome};

use crate::allowlist::AllowListBinder;
use crate::client::ProviderRegistry;
use crate::error::{OrchestrationError, OrchestrationResult};

/// One resource to decommission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeardownTarget {
    pub kind: ResourceKind,
    pub instance_id: String,
    /// Companion elastic address to release, when one was allocated.
    #[serde(default)]
    pub eip_address: Option<String>,
}

pub struct Decommissioner {
    registry: ProviderRegistry,
    binder: AllowListBinder,
    /// Delay between address disassociation and release, giving the control
    /// plane time to detach.
    settle: Duration,
    cancel: CancellationToken,
}

impl Decommissioner {
    pub fn new(registry: ProviderRegistry, binder: AllowListBinder) -> Self {
        Self {
            registry,
            binder,
            settle: Duration::from_secs(5),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Tear down a batch. The batch never raises: per-target failures are
    /// accumulated and the caller decides whether to re-invoke for the
    /// partially failed ids.
    pub async fn decommission(&self, targets: &[TeardownTarget]) -> BatchReport {
        let run_id = Uuid::new_v4();
        info!(%run_id, count = targets.len(), "starting teardown batch");

        let mut report = BatchReport::default();
        for target in targets {
            if self.cancel.is_cancelled() {
                let mut outcome = ResourceOutcome::new(&target.instance_id);
                outcome.record_failure("decommission", OrchestrationError::Cancelled);
                report.push(outcome);
                continue;
            }
            report.push(self.decommission_one(target).await);
        }
        info!(%run_id, failed = report.failed_subjects().len(), "teardown batch finished");
        report
    }

    async fn decommission_one(&self, target: &TeardownTarget) -> ResourceOutcome {
        let mut outcome = ResourceOutcome::new(&target.instance_id);
        info!(kind = %target.kind, instance_id = %target.instance_id, "decommissioning resource");

        let api = match self.registry.product(target.kind) {
            Some(api) => api,
            None => {
                outcome.record_failure(
                    "resolve client",
                    OrchestrationError::UnregisteredKind(target.kind),
                );
                return outcome;
            }
        };

        if let Err(err) = self
            .binder
            .unbind(api.as_ref(), &target.instance_id, None)
            .await
        {
            warn!(instance_id = %target.instance_id, error = %err, "allow-list unbind failed");
            outcome.record_failure("unbind allow-lists", &err);
        }

        if let Some(address) = &target.eip_address {
            if let Err(err) = self.release_address(address).await {
                warn!(address = %address, error = %err, "elastic address release failed");
                outcome.record_failure("release elastic address", &err);
            }
        }

        match api.delete_instance(&target.instance_id).await {
            Ok(()) => info!(instance_id = %target.instance_id, "instance deleted"),
            Err(err) if err.is_not_found() => {
                info!(instance_id = %target.instance_id, "instance already gone")
            }
            Err(err) => {
                error!(instance_id = %target.instance_id, error = %err, "instance delete failed");
                outcome.record_failure("delete instance", &err);
            }
        }

        outcome
    }

    /// Release an elastic address by its public address, detaching it first
    /// when a describe shows it bound to an instance.
    async fn release_address(&self, address: &str) -> OrchestrationResult<()> {
        let addresses = self
            .registry
            .address()
            .list_addresses()
            .await
            .map_err(|e| OrchestrationError::op("list elastic addresses", address, e))?;
        let Some(eip) = addresses.into_iter().find(|e| e.eip_address == address) else {
            return Err(OrchestrationError::MissingInput {
                resource: address.to_string(),
                what: "allocation id for elastic address",
            });
        };

        if let Some(instance_id) = &eip.instance_id {
            self.registry
                .address()
                .disassociate_address(&eip.allocation_id)
                .await
                .map_err(|e| OrchestrationError::op("disassociate elastic address", address, e))?;
            info!(address, instance_id = %instance_id, "elastic address disassociated");
            tokio::time::sleep(self.settle).await;
        }

        self.registry
            .address()
            .release_address(&eip.allocation_id)
            .await
            .map_err(|e| OrchestrationError::op("release elastic address", address, e))?;
        info!(address, allocation_id = %eip.allocation_id, "elastic address released");
        Ok(())
    }
}
