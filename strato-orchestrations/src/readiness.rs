//! Interval-based readiness polling.
//!
//! One poller serves both polling shapes the control plane requires: a
//! deadline-bound wait for resources that report intermediate states, and a
//! bounded attempt count for calls that report success or absence per
//! attempt. Giving up is a normal outcome; only cancellation and fatal probe
//! errors are reported as errors.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use strato_models::ResourceKind;

use crate::error::{ApiResult, OrchestrationError, OrchestrationResult};

/// How long to keep probing before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPolicy {
    /// Probe at `interval` until `timeout` has elapsed.
    Deadline { timeout: Duration, interval: Duration },
    /// Probe at `interval` at most `max_attempts` times.
    Attempts { max_attempts: u32, interval: Duration },
}

impl PollPolicy {
    pub const fn deadline(timeout_secs: u64, interval_secs: u64) -> Self {
        PollPolicy::Deadline {
            timeout: Duration::from_secs(timeout_secs),
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub const fn attempts(max_attempts: u32, interval_secs: u64) -> Self {
        PollPolicy::Attempts {
            max_attempts,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            PollPolicy::Deadline { interval, .. } => *interval,
            PollPolicy::Attempts { interval, .. } => *interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::deadline(1800, 30)
    }
}

/// What to do when the status probe itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeErrorPolicy {
    /// Treat the failure as one more pending observation.
    #[default]
    KeepPolling,
    /// Abort the wait and surface the error.
    Fail,
}

/// Per-kind polling defaults. Node pools, search clusters and brokers
/// converge at different rates, so callers override per resource kind.
#[derive(Debug, Clone)]
pub struct ReadinessDefaults {
    pub network: PollPolicy,
    pub instance: PollPolicy,
    pub cluster: PollPolicy,
    /// Public endpoint creation reports success or absence per attempt.
    pub endpoint: PollPolicy,
    /// Pre-binding instance readiness check inside the allow-list binder.
    pub binding: PollPolicy,
}

impl Default for ReadinessDefaults {
    fn default() -> Self {
        Self {
            network: PollPolicy::deadline(300, 10),
            instance: PollPolicy::deadline(1800, 30),
            cluster: PollPolicy::deadline(600, 30),
            endpoint: PollPolicy::attempts(10, 30),
            binding: PollPolicy::attempts(10, 30),
        }
    }
}

impl ReadinessDefaults {
    pub fn for_kind(&self, kind: ResourceKind) -> PollPolicy {
        match kind {
            ResourceKind::Network | ResourceKind::Subnet | ResourceKind::ElasticAddress => {
                self.network
            }
            ResourceKind::Cluster => self.cluster,
            _ => self.instance,
        }
    }
}

/// Repeatedly invoke `probe` until it reports `target`.
///
/// The probe returns the current status, or `None` when the resource is not
/// listed. Returns `Ok(true)` the first time the target status is observed,
/// `Ok(false)` when the policy allowance runs out without reaching it, and an
/// error only on cancellation or on a probe failure under
/// [`ProbeErrorPolicy::Fail`]. The poller holds no state of its own; it only
/// reads through the probe.
pub async fn wait_for_status<F, Fut>(
    resource: &str,
    target: &str,
    policy: PollPolicy,
    on_probe_error: ProbeErrorPolicy,
    cancel: Option<&CancellationToken>,
    probe: F,
) -> OrchestrationResult<bool>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ApiResult<Option<String>>>,
{
    let started = tokio::time::Instant::now();
    let interval = policy.interval();
    let mut attempts: u32 = 0;

    loop {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }
        }

        attempts += 1;
        match probe().await {
            Ok(Some(status)) if status == target => {
                debug!(resource, target, attempts, "resource ready");
                return Ok(true);
            }
            Ok(status) => {
                debug!(
                    resource,
                    target,
                    current = status.as_deref().unwrap_or("<absent>"),
                    attempts,
                    "not ready yet"
                );
            }
            Err(err) => match on_probe_error {
                ProbeErrorPolicy::Fail => {
                    return Err(OrchestrationError::Probe {
                        resource: resource.to_string(),
                        source: err,
                    });
                }
                ProbeErrorPolicy::KeepPolling => {
                    warn!(resource, error = %err, "status probe failed, still polling");
                }
            },
        }

        let exhausted = match policy {
            PollPolicy::Deadline { timeout, .. } => started.elapsed() >= timeout,
            PollPolicy::Attempts { max_attempts, .. } => attempts >= max_attempts,
        };
        if exhausted {
            warn!(
                resource,
                target,
                attempts,
                waited_secs = started.elapsed().as_secs(),
                "gave up waiting"
            );
            return Ok(false);
        }

        match cancel {
            Some(token) => {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = token.cancelled() => return Err(OrchestrationError::Cancelled),
                }
            }
            None => tokio::time::sleep(interval).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn reaches_target_on_nth_probe() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = calls.clone();
        let started = tokio::time::Instant::now();

        let ready = wait_for_status(
            "inst-1",
            "Running",
            PollPolicy::deadline(1800, 30),
            ProbeErrorPolicy::KeepPolling,
            None,
            move || {
                let calls = probe_calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n >= 4 {
                        Ok(Some("Running".to_string()))
                    } else {
                        Ok(Some("Creating".to_string()))
                    }
                }
            },
        )
        .await
        .unwrap();

        assert!(ready);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // three sleeps of the configured interval separate the four probes
        assert_eq!(started.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_deadline_with_no_further_probes() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = calls.clone();

        let ready = wait_for_status(
            "inst-1",
            "Running",
            PollPolicy::deadline(90, 30),
            ProbeErrorPolicy::KeepPolling,
            None,
            move || {
                let calls = probe_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("Creating".to_string()))
                }
            },
        )
        .await
        .unwrap();

        assert!(!ready);
        // probes at t = 0, 30, 60, 90; the deadline check stops the loop there
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_policy_bounds_probe_count() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = calls.clone();

        let ready = wait_for_status(
            "inst-1",
            "Running",
            PollPolicy::attempts(3, 10),
            ProbeErrorPolicy::KeepPolling,
            None,
            move || {
                let calls = probe_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            },
        )
        .await
        .unwrap();

        assert!(!ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_fails_fast_when_configured() {
        let result = wait_for_status(
            "inst-1",
            "Running",
            PollPolicy::deadline(1800, 30),
            ProbeErrorPolicy::Fail,
            None,
            || async { Err(ApiError::Transport("connection reset".to_string())) },
        )
        .await;

        assert!(matches!(
            result,
            Err(OrchestrationError::Probe { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_keeps_polling_by_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = calls.clone();

        let ready = wait_for_status(
            "inst-1",
            "Running",
            PollPolicy::deadline(1800, 30),
            ProbeErrorPolicy::KeepPolling,
            None,
            move || {
                let calls = probe_calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(ApiError::Throttled)
                    } else {
                        Ok(Some("Running".to_string()))
                    }
                }
            },
        )
        .await
        .unwrap();

        assert!(ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_wait() {
        let token = CancellationToken::new();
        token.cancel();

        let result = wait_for_status(
            "inst-1",
            "Running",
            PollPolicy::deadline(1800, 30),
            ProbeErrorPolicy::KeepPolling,
            Some(&token),
            || async { Ok(Some("Creating".to_string())) },
        )
        .await;

        assert!(matches!(result, Err(OrchestrationError::Cancelled)));
    }

    #[test]
    fn defaults_vary_by_kind() {
        let defaults = ReadinessDefaults::default();
        assert_eq!(
            defaults.for_kind(ResourceKind::Network),
            PollPolicy::deadline(300, 10)
        );
        assert_eq!(
            defaults.for_kind(ResourceKind::Cluster),
            PollPolicy::deadline(600, 30)
        );
        assert_eq!(
            defaults.for_kind(ResourceKind::Cache),
            PollPolicy::deadline(1800, 30)
        );
    }
}
