//! Retry policy (§4.3): exactly {429, 502, 503, 504} are retriable, backoff is
//! `base * 2^attempt`, bounded at a handful of attempts, and the whole loop
//! sits under an independent wall-clock cap.
//!
//! Backoff uses `tokio::time::sleep` rather than a blocking `std::thread::sleep`
//! (§9 — the cooperative-suspend correction), and `tokio::time::timeout`
//! wraps the whole retry loop so a wedged call eventually gives up regardless
//! of how many attempts it took to get there.

use std::time::Duration;

use crate::error::LlmError;
use crate::provider::{ChatRequest, LlmProvider, ProviderCallError};

const RETRIABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub wall_clock_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 3,
            wall_clock_cap: Duration::from_secs(30),
        }
    }
}

/// A connection/transport failure (no status reached) is treated as
/// transient; it is far more likely a blip than a permanent rejection.
fn is_retriable(err: &ProviderCallError) -> bool {
    match err.status {
        Some(status) => RETRIABLE_STATUSES.contains(&status),
        None => true,
    }
}

pub async fn call_with_retry(
    provider: &dyn LlmProvider,
    request: ChatRequest,
    policy: RetryPolicy,
) -> Result<String, LlmError> {
    let loop_fut = async {
        let mut attempt: u32 = 0;
        loop {
            match provider.call_once(request.clone()).await {
                Ok(response) => return Ok(response.body),
                Err(err) => {
                    if !is_retriable(&err) {
                        return Err(LlmError::Permanent(err.message));
                    }
                    attempt += 1;
                    if attempt >= policy.max_attempts {
                        return Err(LlmError::Transient(format!(
                            "retries exhausted after {attempt} attempts: {}",
                            err.message
                        )));
                    }
                    let delay = policy.base_delay * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        attempt,
                        status = ?err.status,
                        delay_ms = delay.as_millis() as u64,
                        "LLM call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    };

    match tokio::time::timeout(policy.wall_clock_cap, loop_fut).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Transient(
            "per-message wall-clock cap exceeded".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderResponse;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        fail_times: u32,
        calls: AtomicU32,
        status: u16,
    }

    #[async_trait::async_trait]
    impl LlmProvider for FlakyProvider {
        async fn call_once(&self, _request: ChatRequest) -> Result<ProviderResponse, ProviderCallError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(ProviderCallError {
                    status: Some(self.status),
                    message: "server busy".into(),
                })
            } else {
                Ok(ProviderResponse {
                    status: 200,
                    body: "ok".into(),
                })
            }
        }
    }

    fn sample_request() -> ChatRequest {
        ChatRequest::new(
            "test-model".into(),
            "system".into(),
            "user".into(),
            crate::sampling::Operation::Feedback.sampling(),
        )
    }

    #[tokio::test]
    async fn succeeds_after_retriable_failures() {
        let provider = FlakyProvider {
            fail_times: 2,
            calls: AtomicU32::new(0),
            status: 503,
        };
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_attempts: 5,
            wall_clock_cap: Duration::from_secs(5),
        };
        let result = call_with_retry(&provider, sample_request(), policy).await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test]
    async fn exhausts_into_transient_error() {
        let provider = FlakyProvider {
            fail_times: 100,
            calls: AtomicU32::new(0),
            status: 429,
        };
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_attempts: 3,
            wall_clock_cap: Duration::from_secs(5),
        };
        let err = call_with_retry(&provider, sample_request(), policy)
            .await
            .unwrap_err();
        assert!(err.retriable());
    }

    #[tokio::test]
    async fn non_retriable_status_is_permanent_immediately() {
        let provider = FlakyProvider {
            fail_times: 100,
            calls: AtomicU32::new(0),
            status: 400,
        };
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_attempts: 5,
            wall_clock_cap: Duration::from_secs(5),
        };
        let err = call_with_retry(&provider, sample_request(), policy)
            .await
            .unwrap_err();
        assert!(!err.retriable());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
