//! List-then-match idempotency checks.
//!
//! Every create path lists the existing resources of the kind first and
//! reuses the match by logical name. Absence is a normal outcome, not an
//! error; a failed list call propagates to the caller, which must treat
//! "cannot verify absence" as unsafe to create.

use strato_models::{
    AllowListSummary, EipSummary, InstanceSummary, NodePoolSummary, SubnetSummary, VpcSummary,
};

/// Access to the logical name and provider id of a listed resource.
pub trait Named {
    fn logical_name(&self) -> &str;
    fn provider_id(&self) -> &str;
}

impl Named for VpcSummary {
    fn logical_name(&self) -> &str {
        &self.vpc_name
    }
    fn provider_id(&self) -> &str {
        &self.vpc_id
    }
}

impl Named for SubnetSummary {
    fn logical_name(&self) -> &str {
        &self.subnet_name
    }
    fn provider_id(&self) -> &str {
        &self.subnet_id
    }
}

impl Named for InstanceSummary {
    fn logical_name(&self) -> &str {
        &self.instance_name
    }
    fn provider_id(&self) -> &str {
        &self.instance_id
    }
}

impl Named for EipSummary {
    fn logical_name(&self) -> &str {
        &self.name
    }
    fn provider_id(&self) -> &str {
        &self.allocation_id
    }
}

impl Named for AllowListSummary {
    fn logical_name(&self) -> &str {
        &self.allow_list_name
    }
    fn provider_id(&self) -> &str {
        &self.allow_list_id
    }
}

impl Named for NodePoolSummary {
    fn logical_name(&self) -> &str {
        &self.name
    }
    fn provider_id(&self) -> &str {
        &self.node_pool_id
    }
}

/// First resource whose logical name equals `name`, if any.
pub fn find_named<T: Named>(items: Vec<T>, name: &str) -> Option<T> {
    items.into_iter().find(|item| item.logical_name() == name)
}

/// Status of the resource with the given provider id, if listed.
pub fn status_of(items: Vec<InstanceSummary>, instance_id: &str) -> Option<String> {
    items
        .into_iter()
        .find(|item| item.instance_id == instance_id)
        .map(|item| item.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vpc(id: &str, name: &str) -> VpcSummary {
        VpcSummary {
            vpc_id: id.to_string(),
            vpc_name: name.to_string(),
            status: "Available".to_string(),
            cidr_block: None,
        }
    }

    #[test]
    fn matches_by_logical_name() {
        let items = vec![vpc("vpc-1", "net-a"), vpc("vpc-2", "net-b")];
        let found = find_named(items, "net-b").unwrap();
        assert_eq!(found.provider_id(), "vpc-2");
    }

    #[test]
    fn absence_is_none() {
        let items = vec![vpc("vpc-1", "net-a")];
        assert!(find_named(items, "net-z").is_none());
    }

    #[test]
    fn first_match_wins() {
        let items = vec![vpc("vpc-1", "net-a"), vpc("vpc-2", "net-a")];
        let found = find_named(items, "net-a").unwrap();
        assert_eq!(found.provider_id(), "vpc-1");
    }
}
