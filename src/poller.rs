//! Wait-until-condition polling of cluster health.
//!
//! Every attempt fetches a fresh [`HealthSnapshot`] and compares one field
//! against an expected value. Connectivity failures and mismatches are
//! retried after a backoff delay; a match returns at once. Once the attempt
//! budget is spent the last error is wrapped in
//! [`RestartError::Exhausted`].

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backoff::RetryPolicy;
use crate::client::{ClusterApi, HealthSnapshot};
use crate::error::{RestartError, Result};

/// Outcome of a single polling attempt.
#[derive(Debug)]
pub enum PollOutcome {
    /// The field matched.
    Ready(HealthSnapshot),
    /// Not there yet; try again after a delay.
    Retry(RestartError),
}

/// Run one polling attempt and classify it.
pub async fn poll_once(
    api: &dyn ClusterApi,
    endpoint: &str,
    field: &str,
    expected: &Value,
) -> Result<PollOutcome> {
    match api.health(endpoint).await {
        Ok(snapshot) if snapshot.matches(field, expected) => Ok(PollOutcome::Ready(snapshot)),
        Ok(snapshot) => {
            let actual = snapshot.get(field).cloned().unwrap_or(Value::Null);
            info!(
                endpoint = %endpoint,
                field = %field,
                expected = %expected,
                current = %actual,
                "Waiting on cluster state"
            );
            Ok(PollOutcome::Retry(RestartError::StateMismatch {
                field: field.to_string(),
                expected: expected.clone(),
                actual,
            }))
        }
        Err(e) if e.is_retryable() => {
            warn!(endpoint = %endpoint, error = %e, "Cannot connect");
            Ok(PollOutcome::Retry(e))
        }
        Err(e) => Err(e),
    }
}

/// Poll `endpoint` until `snapshot[field] == expected`.
///
/// Makes at most `policy.max_attempts` attempts (at least one). Delays grow
/// from `policy.min_delay` and are capped at `policy.max_delay`; no delay
/// follows the final attempt.
pub async fn wait_for_state(
    api: &dyn ClusterApi,
    endpoint: &str,
    policy: &RetryPolicy,
    field: &str,
    expected: &Value,
) -> Result<HealthSnapshot> {
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let last_error = match poll_once(api, endpoint, field, expected).await? {
            PollOutcome::Ready(snapshot) => {
                debug!(endpoint = %endpoint, field = %field, attempt, "Cluster state reached");
                return Ok(snapshot);
            }
            PollOutcome::Retry(e) => e,
        };

        if attempt >= max_attempts {
            warn!(
                endpoint = %endpoint,
                field = %field,
                expected = %expected,
                attempts = attempt,
                "Giving up on cluster state"
            );
            return Err(RestartError::Exhausted {
                attempts: attempt,
                field: field.to_string(),
                expected: expected.clone(),
                last: Box::new(last_error),
            });
        }

        let delay = backoff.next_delay();
        debug!(
            endpoint = %endpoint,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Retrying after backoff"
        );
        sleep(delay).await;
    }
}
