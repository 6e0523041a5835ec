//! Retry policy and the sleep seam used between attempts.

use async_trait::async_trait;
use delve_common::Backoff;
use reqwest::StatusCode;
use std::sync::Mutex;
use std::time::Duration;

/// Which failures are worth another attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryOn {
    /// 429 and any 5xx.
    Transient,
    /// Only the listed status codes.
    Statuses(Vec<u16>),
}

impl RetryOn {
    pub fn matches(&self, status: StatusCode) -> bool {
        match self {
            RetryOn::Transient => {
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            RetryOn::Statuses(codes) => codes.contains(&status.as_u16()),
        }
    }
}

/// Bounded retry loop configuration.
///
/// ```
/// use delve_common::Backoff;
/// use delve_http::{RetryOn, RetryPolicy};
///
/// let policy = RetryPolicy::on_statuses(3, [503], Backoff::Fixed { ms: 2_000 });
/// assert_eq!(policy.max_retries, 3);
/// assert!(!policy.retry_network);
/// assert_eq!(policy.retry_on, RetryOn::Statuses(vec![503]));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub retry_on: RetryOn,
    /// Also retry when the request could not be sent or the body not read.
    pub retry_network: bool,
    pub backoff: Backoff,
    /// Prefer a numeric `Retry-After` header over `backoff` when present.
    pub honor_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_on: RetryOn::Transient,
            retry_network: true,
            backoff: Backoff::Exponential { ms: 200 },
            honor_retry_after: true,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn on_statuses(
        max_retries: usize,
        statuses: impl IntoIterator<Item = u16>,
        backoff: Backoff,
    ) -> Self {
        Self {
            max_retries,
            retry_on: RetryOn::Statuses(statuses.into_iter().collect()),
            retry_network: false,
            backoff,
            honor_retry_after: false,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: usize, retry_after_secs: Option<u64>, status: Option<StatusCode>) -> Duration {
        if self.honor_retry_after {
            if let Some(secs) = retry_after_secs {
                return Duration::from_secs(secs);
            }
        }
        let base = self
            .backoff
            .delay_for(u32::try_from(retry).unwrap_or(u32::MAX));
        if status == Some(StatusCode::TOO_MANY_REQUESTS) {
            // floor for 429 when no Retry-After is present
            base.max(Duration::from_millis(1100))
        } else {
            base
        }
    }
}

/// Suspends the caller between attempts. Injected so tests can skip real time.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Production sleeper backed by `tokio::time::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        if let Ok(mut d) = self.delays.lock() {
            d.push(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_covers_429_and_5xx_only() {
        let on = RetryOn::Transient;
        assert!(on.matches(StatusCode::TOO_MANY_REQUESTS));
        assert!(on.matches(StatusCode::BAD_GATEWAY));
        assert!(!on.matches(StatusCode::NOT_FOUND));
    }

    #[test]
    fn retry_after_only_counts_when_honored() {
        let mut policy = RetryPolicy::on_statuses(3, [503], Backoff::Linear { ms: 5_000 });
        assert_eq!(policy.delay(2, Some(1), None), Duration::from_secs(10));
        policy.honor_retry_after = true;
        assert_eq!(policy.delay(2, Some(1), None), Duration::from_secs(1));
    }

    #[test]
    fn too_many_requests_has_a_floor() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay(1, None, Some(StatusCode::TOO_MANY_REQUESTS)),
            Duration::from_millis(1100)
        );
        assert_eq!(
            policy.delay(1, None, Some(StatusCode::SERVICE_UNAVAILABLE)),
            Duration::from_millis(200)
        );
    }

    #[tokio::test]
    async fn recording_sleeper_keeps_order() {
        let s = RecordingSleeper::new();
        s.sleep(Duration::from_secs(5)).await;
        s.sleep(Duration::from_secs(10)).await;
        assert_eq!(s.delays(), vec![Duration::from_secs(5), Duration::from_secs(10)]);
    }
}
