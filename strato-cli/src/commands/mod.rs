use std::sync::Arc;

use strato_models::ResourceKind;
use strato_orchestrations::client::ProviderRegistry;
use strato_orchestrations::http::HttpProvider;

use crate::config::Settings;

pub mod decommission;
pub mod list;
pub mod provision;

/// One gateway client per product kind in play, sharing the network and
/// address planes.
pub(crate) fn build_registry(
    settings: &Settings,
    kinds: impl IntoIterator<Item = ResourceKind>,
) -> ProviderRegistry {
    let gateway = settings.gateway();
    let shared = Arc::new(HttpProvider::new(ResourceKind::Network, gateway.clone()));
    let mut registry = ProviderRegistry::new(shared.clone(), shared);
    for kind in kinds {
        registry = registry.register(Arc::new(HttpProvider::new(kind, gateway.clone())));
    }
    registry
}
