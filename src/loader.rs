//! Artifact loading under a bounded retry policy

use crate::config::RetryPolicy;
use crate::error::{DeepReleaseError, Result};
use tokio::time::sleep;
use tracing::{info, warn};

/// Run `load` until it succeeds or the policy is exhausted
///
/// Every failed attempt is logged. Exhaustion is a fatal `ModelLoad` error
/// carrying the last failure.
pub async fn load_with_retry<T, F>(what: &str, policy: &RetryPolicy, mut load: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match load() {
            Ok(value) => {
                if attempt > 1 {
                    info!("Loaded {} on attempt {}/{}", what, attempt, max_attempts);
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt >= max_attempts {
                    return Err(DeepReleaseError::ModelLoad {
                        what: what.to_string(),
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }

                warn!(
                    "Failed to load {}, retrying after {}s (attempt {}/{}): {}",
                    what,
                    policy.delay_secs,
                    attempt,
                    max_attempts,
                    e
                );
                sleep(policy.delay()).await;
            }
        }
    }
}
