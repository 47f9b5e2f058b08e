//! Ordered provisioning plans.
//!
//! A step may only execute once every handle it references exists and is
//! ready, so the order below is load-bearing: network before subnet before
//! the primary resource, endpoint and access control after the primary,
//! data-plane objects last.

use strato_models::ResourceKind;

/// One step of a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Network,
    Subnet,
    Primary,
    Endpoint,
    AllowLists,
    PostConfig,
}

const FULL_PLAN: &[ProvisionStep] = &[
    ProvisionStep::Network,
    ProvisionStep::Subnet,
    ProvisionStep::Primary,
    ProvisionStep::Endpoint,
    ProvisionStep::AllowLists,
    ProvisionStep::PostConfig,
];

// Clusters have no public endpoint or allow-list binding; node pools are
// their post-configuration.
const CLUSTER_PLAN: &[ProvisionStep] = &[
    ProvisionStep::Network,
    ProvisionStep::Subnet,
    ProvisionStep::Primary,
    ProvisionStep::PostConfig,
];

/// The ordered step list for a provisionable kind. Non-provisionable kinds
/// have no plan; they are only ever created as sub-steps.
pub fn steps_for(kind: ResourceKind) -> &'static [ProvisionStep] {
    match kind {
        ResourceKind::Database
        | ResourceKind::Cache
        | ResourceKind::Broker
        | ResourceKind::Search => FULL_PLAN,
        ResourceKind::Cluster => CLUSTER_PLAN,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_plan_order() {
        assert_eq!(
            steps_for(ResourceKind::Database),
            &[
                ProvisionStep::Network,
                ProvisionStep::Subnet,
                ProvisionStep::Primary,
                ProvisionStep::Endpoint,
                ProvisionStep::AllowLists,
                ProvisionStep::PostConfig,
            ]
        );
        assert_eq!(steps_for(ResourceKind::Cache), steps_for(ResourceKind::Broker));
        assert_eq!(steps_for(ResourceKind::Cache), steps_for(ResourceKind::Search));
    }

    #[test]
    fn cluster_plan_skips_endpoint_and_allow_lists() {
        let plan = steps_for(ResourceKind::Cluster);
        assert!(!plan.contains(&ProvisionStep::Endpoint));
        assert!(!plan.contains(&ProvisionStep::AllowLists));
        assert_eq!(plan.last(), Some(&ProvisionStep::PostConfig));
    }

    #[test]
    fn network_always_precedes_primary() {
        for kind in [
            ResourceKind::Database,
            ResourceKind::Cache,
            ResourceKind::Broker,
            ResourceKind::Search,
            ResourceKind::Cluster,
        ] {
            let plan = steps_for(kind);
            let network = plan
                .iter()
                .position(|s| *s == ProvisionStep::Network)
                .unwrap();
            let subnet = plan.iter().position(|s| *s == ProvisionStep::Subnet).unwrap();
            let primary = plan
                .iter()
                .position(|s| *s == ProvisionStep::Primary)
                .unwrap();
            assert!(network < subnet && subnet < primary);
        }
    }

    #[test]
    fn sub_resource_kinds_have_no_plan() {
        assert!(steps_for(ResourceKind::Network).is_empty());
        assert!(steps_for(ResourceKind::AllowList).is_empty());
        assert!(steps_for(ResourceKind::ElasticAddress).is_empty());
    }
}
