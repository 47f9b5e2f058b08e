//! Strato orchestration core.
//!
//! Turns declarative resource specifications into ordered, idempotent,
//! polling-verified provisioning runs against a cloud control plane, and
//! reverses the same dependency graph for teardown.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strato_orchestrations::allowlist::AllowListBinder;
//! use strato_orchestrations::client::ProviderRegistry;
//! use strato_orchestrations::http::{GatewayConfig, HttpProvider};
//! use strato_orchestrations::provision::Provisioner;
//! use strato_models::ResourceKind;
//!
//! # async fn example(spec: strato_models::ResourceSpec) -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = GatewayConfig {
//!     endpoint: "https://gateway.example".into(),
//!     access_key: "ak".into(),
//!     secret_key: "sk".into(),
//!     region: "region-a".into(),
//! };
//! let shared = Arc::new(HttpProvider::new(ResourceKind::Network, gateway.clone()));
//! let registry = ProviderRegistry::new(shared.clone(), shared)
//!     .register(Arc::new(HttpProvider::new(ResourceKind::Cache, gateway)));
//! let provisioner = Provisioner::new(registry, AllowListBinder::new(Vec::new()));
//! let handle = provisioner.provision(&spec).await?;
//! # Ok(())
//! # }
//! ```

pub mod allowlist;
pub mod client;
pub mod error;
pub mod guard;
pub mod http;
pub mod mock;
pub mod plan;
pub mod provision;
pub mod readiness;
pub mod teardown;

pub use allowlist::AllowListBinder;
pub use client::{NetworkAttachment, ProviderRegistry};
pub use error::{ApiError, ApiResult, OrchestrationError, OrchestrationResult};
pub use provision::Provisioner;
pub use readiness::{PollPolicy, ProbeErrorPolicy, ReadinessDefaults};
pub use teardown::{Decommissioner, TeardownTarget};
