//! Allow-list binding with idempotent set-difference semantics.
//!
//! Binding resolves each requested name against the provider (creating
//! absent lists from the catalog), then associates only the subset not
//! already bound. Re-binding a bound list is avoided outright rather than
//! relied upon to be a harmless no-op server-side. Unbinding mirrors this:
//! only the non-empty intersection of requested and currently bound ids is
//! disassociated.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use strato_models::AllowListSpec;

use crate::client::ResourceApi;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::guard;
use crate::readiness::{self, PollPolicy, ProbeErrorPolicy};

pub struct AllowListBinder {
    catalog: Vec<AllowListSpec>,
    /// Pre-binding readiness check; bounded attempts rather than a deadline.
    wait: PollPolicy,
}

impl AllowListBinder {
    pub fn new(catalog: Vec<AllowListSpec>) -> Self {
        Self {
            catalog,
            wait: PollPolicy::attempts(10, 30),
        }
    }

    pub fn with_wait(mut self, policy: PollPolicy) -> Self {
        self.wait = policy;
        self
    }

    fn catalog_spec(&self, name: &str) -> Option<&AllowListSpec> {
        self.catalog.iter().find(|spec| spec.name == name)
    }

    /// Bind the named allow-lists to an instance. Association calls are only
    /// accepted while the instance is in its ready state, so the binder
    /// waits for readiness first.
    pub async fn bind(
        &self,
        api: &dyn ResourceApi,
        instance_id: &str,
        names: &[String],
        cancel: Option<&CancellationToken>,
    ) -> OrchestrationResult<()> {
        if names.is_empty() {
            return Ok(());
        }

        let target = api.kind().ready_status();
        let ready = readiness::wait_for_status(
            instance_id,
            target,
            self.wait,
            ProbeErrorPolicy::KeepPolling,
            cancel,
            move || async move {
                api.list_instances()
                    .await
                    .map(|items| guard::status_of(items, instance_id))
            },
        )
        .await?;
        if !ready {
            return Err(OrchestrationError::ReadinessTimeout {
                resource: instance_id.to_string(),
                target: target.to_string(),
            });
        }

        let existing = api
            .list_allow_lists(None)
            .await
            .map_err(|e| OrchestrationError::op("list allow-lists", instance_id, e))?;

        let mut wanted_ids: Vec<String> = Vec::new();
        for name in names {
            let id = match existing.iter().find(|a| &a.allow_list_name == name) {
                Some(found) => {
                    debug!(%name, allow_list_id = %found.allow_list_id, "allow-list already exists");
                    found.allow_list_id.clone()
                }
                None => {
                    let spec =
                        self.catalog_spec(name)
                            .ok_or_else(|| OrchestrationError::MissingInput {
                                resource: name.clone(),
                                what: "allow-list definition in the catalog",
                            })?;
                    let id = api
                        .create_allow_list(spec)
                        .await
                        .map_err(|e| OrchestrationError::op("create allow-list", name, e))?;
                    info!(%name, allow_list_id = %id, "allow-list created");
                    id
                }
            };
            if !wanted_ids.contains(&id) {
                wanted_ids.push(id);
            }
        }

        let bound: HashSet<String> = api
            .list_allow_lists(Some(instance_id))
            .await
            .map_err(|e| OrchestrationError::op("list bound allow-lists", instance_id, e))?
            .into_iter()
            .map(|a| a.allow_list_id)
            .collect();

        let to_bind: Vec<String> = wanted_ids
            .into_iter()
            .filter(|id| !bound.contains(id))
            .collect();
        if to_bind.is_empty() {
            debug!(instance_id, "all requested allow-lists already bound");
            return Ok(());
        }

        api.associate_allow_lists(instance_id, &to_bind)
            .await
            .map_err(|e| OrchestrationError::op("associate allow-lists", instance_id, e))?;
        info!(instance_id, count = to_bind.len(), "allow-lists bound");
        Ok(())
    }

    /// Unbind allow-lists from an instance. With no explicit ids, everything
    /// currently bound is removed. Issues no call when nothing is bound.
    pub async fn unbind(
        &self,
        api: &dyn ResourceApi,
        instance_id: &str,
        allow_list_ids: Option<&[String]>,
    ) -> OrchestrationResult<()> {
        let bound: Vec<String> = api
            .list_allow_lists(Some(instance_id))
            .await
            .map_err(|e| OrchestrationError::op("list bound allow-lists", instance_id, e))?
            .into_iter()
            .map(|a| a.allow_list_id)
            .collect();

        let to_remove: Vec<String> = match allow_list_ids {
            Some(requested) => bound
                .into_iter()
                .filter(|id| requested.contains(id))
                .collect(),
            None => bound,
        };
        if to_remove.is_empty() {
            debug!(instance_id, "no allow-lists bound, nothing to remove");
            return Ok(());
        }

        api.disassociate_allow_lists(instance_id, &to_remove)
            .await
            .map_err(|e| OrchestrationError::op("disassociate allow-lists", instance_id, e))?;
        info!(instance_id, count = to_remove.len(), "allow-lists unbound");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use strato_models::ResourceKind;

    fn catalog() -> Vec<AllowListSpec> {
        ["office", "vpn", "ci"]
            .into_iter()
            .map(|name| AllowListSpec {
                name: name.to_string(),
                description: None,
                entries: vec!["10.0.0.0/24".to_string()],
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn bind_associates_only_the_unbound_subset() {
        let mock = MockProvider::new(ResourceKind::Cache);
        let instance_id = mock.seed_instance("c1");
        let office = mock.seed_allow_list("office");
        let vpn = mock.seed_allow_list("vpn");
        mock.seed_binding(&instance_id, &office);
        mock.seed_binding(&instance_id, &vpn);

        let binder = AllowListBinder::new(catalog());
        let names: Vec<String> = ["office", "vpn", "ci"]
            .into_iter()
            .map(String::from)
            .collect();
        binder.bind(&mock, &instance_id, &names, None).await.unwrap();

        // "ci" did not exist, so the binder created it and bound only it
        let ci = mock.allow_list_id("ci").unwrap();
        assert_eq!(mock.last_associated(), Some(vec![ci]));
        assert_eq!(mock.calls("associate_allow_lists"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bind_is_a_no_op_when_everything_is_bound() {
        let mock = MockProvider::new(ResourceKind::Cache);
        let instance_id = mock.seed_instance("c1");
        let office = mock.seed_allow_list("office");
        mock.seed_binding(&instance_id, &office);

        let binder = AllowListBinder::new(catalog());
        binder
            .bind(&mock, &instance_id, &["office".to_string()], None)
            .await
            .unwrap();

        assert_eq!(mock.calls("associate_allow_lists"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bind_requires_a_catalog_entry_for_unknown_lists() {
        let mock = MockProvider::new(ResourceKind::Cache);
        let instance_id = mock.seed_instance("c1");

        let binder = AllowListBinder::new(Vec::new());
        let result = binder
            .bind(&mock, &instance_id, &["mystery".to_string()], None)
            .await;

        assert!(matches!(
            result,
            Err(OrchestrationError::MissingInput { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unbind_without_ids_removes_exactly_the_bound_set() {
        let mock = MockProvider::new(ResourceKind::Cache);
        let instance_id = mock.seed_instance("c1");
        let office = mock.seed_allow_list("office");
        let vpn = mock.seed_allow_list("vpn");
        mock.seed_binding(&instance_id, &office);
        mock.seed_binding(&instance_id, &vpn);

        let binder = AllowListBinder::new(Vec::new());
        binder.unbind(&mock, &instance_id, None).await.unwrap();

        let mut removed = mock.last_disassociated().unwrap();
        removed.sort();
        let mut expected = vec![office, vpn];
        expected.sort();
        assert_eq!(removed, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn unbind_intersects_with_the_requested_ids() {
        let mock = MockProvider::new(ResourceKind::Cache);
        let instance_id = mock.seed_instance("c1");
        let office = mock.seed_allow_list("office");
        let vpn = mock.seed_allow_list("vpn");
        mock.seed_binding(&instance_id, &office);
        mock.seed_binding(&instance_id, &vpn);

        let binder = AllowListBinder::new(Vec::new());
        let requested = vec![office.clone(), "acl-unknown".to_string()];
        binder
            .unbind(&mock, &instance_id, Some(&requested))
            .await
            .unwrap();

        assert_eq!(mock.last_disassociated(), Some(vec![office]));
    }

    #[tokio::test(start_paused = true)]
    async fn unbind_issues_no_call_when_nothing_is_bound() {
        let mock = MockProvider::new(ResourceKind::Cache);
        let instance_id = mock.seed_instance("c1");

        let binder = AllowListBinder::new(Vec::new());
        binder.unbind(&mock, &instance_id, None).await.unwrap();

        assert_eq!(mock.calls("disassociate_allow_lists"), 0);
    }
}
