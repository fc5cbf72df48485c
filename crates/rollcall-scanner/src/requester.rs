//! Flood-control aware call wrapper.

use rollcall_client::{ClientError, FloodWait};
use rollcall_core::ScanningConfig;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Runs provider calls, sleeping through flood-control waits and retrying.
///
/// There is no retry cap and no shared lock: every caller waits out the
/// duration the provider reported for its own call, then tries again.
/// Errors that are not flood signals are returned unchanged.
#[derive(Debug)]
pub struct RateLimitedRequester {
    padding: Duration,
    default_wait: Duration,
    flood_waits: AtomicU64,
}

impl RateLimitedRequester {
    /// Create a requester that pads every wait by `padding` and uses
    /// `default_wait` when the provider did not say how long to wait.
    #[must_use]
    pub fn new(padding: Duration, default_wait: Duration) -> Self {
        Self {
            padding,
            default_wait,
            flood_waits: AtomicU64::new(0),
        }
    }

    /// Create a requester from the `[scanning]` configuration.
    #[must_use]
    pub fn from_config(config: &ScanningConfig) -> Self {
        Self::new(
            Duration::from_secs(config.flood_padding_secs),
            Duration::from_secs(config.default_flood_wait_secs),
        )
    }

    /// Number of flood-control waits honoured so far.
    #[must_use]
    pub fn flood_waits(&self) -> u64 {
        self.flood_waits.load(Ordering::Relaxed)
    }

    /// Sleep required for a flood signal, padding included.
    #[must_use]
    pub fn backoff(&self, wait: FloodWait) -> Duration {
        wait.duration_or(self.default_wait) + self.padding
    }

    /// Invoke `operation` until it returns something other than a flood signal.
    ///
    /// `label` names the call in log output.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let Some(wait) = e.flood_wait() else {
                        return Err(e);
                    };
                    let delay = self.backoff(wait);
                    self.flood_waits.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Flood control on {}: sleeping {:?} before retrying", label, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RateLimitedRequester {
    fn default() -> Self {
        Self::from_config(&ScanningConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;

    fn requester() -> RateLimitedRequester {
        RateLimitedRequester::new(Duration::from_secs(1), Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn test_flood_wait_is_honoured_then_retried() {
        let requester = requester();
        let attempts = &AtomicUsize::new(0);
        let start = Instant::now();

        let value = requester
            .execute("test", move || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ClientError::FloodWait { seconds: Some(5) })
                } else {
                    Ok(7)
                }
            })
            .await
            .expect("eventually succeeds");

        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert_eq!(requester.flood_waits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_floods_keep_waiting() {
        let requester = requester();
        let attempts = &AtomicUsize::new(0);
        let start = Instant::now();

        requester
            .execute("test", move || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(ClientError::Rpc {
                        code: 420,
                        message: "FLOOD_WAIT_2".to_string(),
                    })
                } else {
                    Ok(())
                }
            })
            .await
            .expect("eventually succeeds");

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert!(start.elapsed() >= Duration::from_secs(9));
        assert_eq!(requester.flood_waits(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unspecified_wait_uses_default() {
        let requester = requester();
        let attempts = &AtomicUsize::new(0);
        let start = Instant::now();

        requester
            .execute("test", move || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ClientError::FloodWait { seconds: None })
                } else {
                    Ok(())
                }
            })
            .await
            .expect("eventually succeeds");

        assert!(start.elapsed() >= Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_propagate_unchanged() {
        let requester = requester();
        let attempts = &AtomicUsize::new(0);

        let result: Result<(), _> = requester
            .execute("test", move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::PrivacyRestricted("hidden".to_string()))
            })
            .await;

        assert_eq!(
            result,
            Err(ClientError::PrivacyRestricted("hidden".to_string()))
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(requester.flood_waits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_flood_is_returned_without_waiting() {
        let requester = requester();
        let attempts = &AtomicUsize::new(0);
        let start = Instant::now();

        let result: Result<(), _> = requester
            .execute("test", move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Rpc {
                    code: 400,
                    message: "PEER_FLOOD".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(ClientError::Rpc { code: 400, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(requester.flood_waits(), 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_wait_independently() {
        let requester = requester();
        let start = Instant::now();

        let flood_once = |seconds: u64| {
            let requester = &requester;
            async move {
                let attempts = &AtomicUsize::new(0);
                requester
                    .execute("test", move || async move {
                        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(ClientError::FloodWait {
                                seconds: Some(seconds),
                            })
                        } else {
                            Ok(Instant::now())
                        }
                    })
                    .await
            }
        };

        let (short, long) = tokio::join!(flood_once(2), flood_once(10));
        let short = short.expect("short call");
        let long = long.expect("long call");

        assert!(short.duration_since(start) >= Duration::from_secs(3));
        assert!(short.duration_since(start) < Duration::from_secs(11));
        assert!(long.duration_since(start) >= Duration::from_secs(11));
    }
}
