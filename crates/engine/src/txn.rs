use std::thread;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::EngineError;

/// Run `attempt` until it succeeds or fails with something other than a
/// conditional-write conflict, backing off between conflicted tries. Each
/// attempt must re-read whatever it stages.
pub(crate) fn run_optimistic<T>(
    policy: RetryPolicy,
    mut attempt: impl FnMut() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let max_attempts = policy.max_attempts.max(1);
    for n in 1..=max_attempts {
        match attempt() {
            Err(e) if e.is_write_conflict() => {
                if n == max_attempts {
                    break;
                }
                let delay = policy.delay(n);
                warn!(attempt = n, max_attempts, ?delay, error = %e, "optimistic write conflicted, retrying");
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
            other => return other,
        }
    }
    Err(EngineError::RetriesExhausted {
        attempts: max_attempts,
    })
}
