use std::{future::Future, time::Duration};

use crate::app_constants::{DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_MULTIPLIER};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_RETRY_COUNT,
            initial_delay: DEFAULT_RETRY_DELAY,
            multiplier: DEFAULT_RETRY_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn next_delay(&self, delay: Duration) -> Duration {
        let next_ms = (delay.as_millis() as f64 * self.multiplier).round();
        Duration::from_millis(next_ms.max(0.0) as u64)
    }

    /// Delays slept between attempts when every attempt fails.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delays = Vec::with_capacity(self.max_retries as usize);
        let mut delay = self.initial_delay;
        for _ in 0..self.max_retries {
            delays.push(delay);
            delay = self.next_delay(delay);
        }
        delays
    }
}

/// Runs `operation`, retrying errors accepted by `is_retryable` with
/// exponential backoff. The last error is returned once retries run out.
pub async fn with_retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut retries_left = policy.max_retries;
    let mut delay = policy.initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if retries_left > 0 && is_retryable(&error) => {
                tracing::warn!(
                    retries_left,
                    delay_ms = delay.as_millis() as u64,
                    "request failed, retrying: {error}"
                );
                tokio::time::sleep(delay).await;
                retries_left -= 1;
                delay = policy.next_delay(delay);
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum FakeError {
        Transport,
        Status(u16),
    }

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn is_transport(error: &FakeError) -> bool {
        matches!(error, FakeError::Transport)
    }

    #[test]
    fn default_policy_delays_grow_by_half() {
        assert_eq!(
            RetryPolicy::default().delays(),
            vec![
                Duration::from_millis(500),
                Duration::from_millis(750),
                Duration::from_millis(1125),
            ]
        );
        assert!(RetryPolicy::none().delays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fourth_attempt_after_backoff() {
        let attempts = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = with_retry(&RetryPolicy::default(), is_transport, || {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(FakeError::Transport)
                } else {
                    Ok("payload")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("payload"));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(2375));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_retries() {
        let attempts = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = with_retry(&RetryPolicy::default(), is_transport, || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Transport)
            }
        })
        .await;

        assert_eq!(result, Err(FakeError::Transport));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_non_retryable_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<(), _> = with_retry(&RetryPolicy::default(), is_transport, || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Status(503))
            }
        })
        .await;

        assert_eq!(result, Err(FakeError::Status(503)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
