use std::{future::Future, time::Duration};

use tracing::warn;

use crate::error::ControllerError;

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

/// Bounded exponential backoff for transport failures.
///
/// Only [`ControllerError::Transport`] is retried. A `{valid: false}` answer is
/// a decision by the engine and is returned on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ControllerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ControllerError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(ControllerError::Transport(detail)) if attempt < attempts => {
                    let delay = self.delay_before(attempt);
                    warn!(what, attempt, %detail, ?delay, "gateway call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn transport_errors_are_retried_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = quick(3)
            .run("probe", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ControllerError::Transport("refused".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_last_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = quick(2)
            .run("probe", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ControllerError::Transport("refused".into()))
            })
            .await;
        assert!(result.expect_err("error").is_transport());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = quick(3)
            .run("probe", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ControllerError::Unauthorized)
            })
            .await;
        assert_eq!(result, Err(ControllerError::Unauthorized));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::from_millis(200));
        assert_eq!(policy.delay_before(2), Duration::from_millis(400));
        assert_eq!(RetryPolicy::none().attempts, 1);
    }
}
