use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use watch_logging::watch_debug;

/// Bounded retry with a fixed inter-attempt delay.
///
/// `max_elapsed`, when set, refuses to start another wait once the budget
/// would be exceeded; the last error is returned instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub wait: Duration,
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    /// Policy for network fetches: 5 attempts, 30s apart, 10min total.
    pub fn fetch_default() -> Self {
        Self {
            attempts: 5,
            wait: Duration::from_secs(30),
            max_elapsed: Some(Duration::from_secs(600)),
        }
    }

    /// Policy for publish submissions: 5 attempts, 30s apart, unbounded.
    pub fn publish_default() -> Self {
        Self {
            attempts: 5,
            wait: Duration::from_secs(30),
            max_elapsed: None,
        }
    }

    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.attempts {
                        return Err(err);
                    }
                    if let Some(max_elapsed) = self.max_elapsed {
                        if started.elapsed() + self.wait >= max_elapsed {
                            return Err(err);
                        }
                    }
                    watch_debug!("attempt {attempt} failed ({err}), retrying in {:?}", self.wait);
                    tokio::time::sleep(self.wait).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::RetryPolicy;

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let policy = RetryPolicy::fetch_default();
        let calls = AtomicU32::new(0);

        let result: Result<u32, &str> = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("boom")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempt_budget() {
        let policy = RetryPolicy {
            attempts: 5,
            wait: Duration::from_secs(30),
            max_elapsed: None,
        };
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            })
            .await;

        assert_eq!(result, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_budget_cuts_retries_short() {
        // Two waits would pass the 50s budget, so only two attempts run.
        let policy = RetryPolicy {
            attempts: 5,
            wait: Duration::from_secs(30),
            max_elapsed: Some(Duration::from_secs(50)),
        };
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            })
            .await;

        assert_eq!(result, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
