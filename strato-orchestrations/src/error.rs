//! Error taxonomy for the client boundary and the orchestration core.

use strato_models::ResourceKind;
use thiserror::Error;

/// Failures reported by the control-plane client boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The referenced resource does not exist. Safe to skip during teardown.
    #[error("not found: {0}")]
    NotFound(String),

    /// A resource with the same identity already exists. Create paths treat
    /// this as success by resolving the existing resource instead.
    #[error("resource already exists")]
    AlreadyExists,

    /// Rate limit exceeded; retryable.
    #[error("rate limit exceeded")]
    Throttled,

    /// The product does not expose this operation.
    #[error("operation '{0}' is not supported by this product")]
    Unsupported(&'static str),

    /// Structured error returned by the control plane.
    #[error("api error: {message}")]
    Api {
        code: Option<String>,
        message: String,
    },

    /// Network-level failure before a structured response was received.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ApiError::AlreadyExists)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Throttled | ApiError::Transport(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures surfaced by orchestration runs. Client errors are wrapped with
/// the operation name and the resource they concern.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A required input was absent; surfaced immediately, never retried.
    #[error("missing required input for {resource}: {what}")]
    MissingInput {
        resource: String,
        what: &'static str,
    },

    #[error("{operation} failed for {resource}: {source}")]
    Operation {
        operation: &'static str,
        resource: String,
        #[source]
        source: ApiError,
    },

    /// The readiness wait gave up before the target state was observed.
    #[error("timed out waiting for {resource} to become {target}")]
    ReadinessTimeout { resource: String, target: String },

    /// A status probe failed and the caller opted into fail-fast.
    #[error("status probe for {resource} failed: {source}")]
    Probe {
        resource: String,
        #[source]
        source: ApiError,
    },

    #[error(
        "post-configuration failed for {resource}: {} step(s) failed",
        .failures.len()
    )]
    PostConfig {
        resource: String,
        failures: Vec<strato_models::StepFailure>,
    },

    #[error("orchestration cancelled")]
    Cancelled,

    #[error("no client registered for kind '{0}'")]
    UnregisteredKind(ResourceKind),
}

impl OrchestrationError {
    pub(crate) fn op(
        operation: &'static str,
        resource: impl Into<String>,
        source: ApiError,
    ) -> Self {
        OrchestrationError::Operation {
            operation,
            resource: resource.into(),
            source,
        }
    }
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        assert!(ApiError::NotFound("inst-1".into()).is_not_found());
        assert!(ApiError::AlreadyExists.is_already_exists());
        assert!(ApiError::Throttled.is_retryable());
        assert!(ApiError::Transport("reset".into()).is_retryable());
        assert!(!ApiError::Unsupported("create_account").is_retryable());
    }

    #[test]
    fn operation_errors_carry_context() {
        let err = OrchestrationError::op(
            "create network",
            "net-c1",
            ApiError::Throttled,
        );
        let text = err.to_string();
        assert!(text.contains("create network"));
        assert!(text.contains("net-c1"));
    }
}
