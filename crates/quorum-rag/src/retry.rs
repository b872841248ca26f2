//! Bounded retry with cooperative backoff.
//!
//! An empty completion waits a fixed `empty_delay` before the next attempt.
//! An error waits `base_backoff * 2^attempt` (1, 2, 4, ... units). Nothing is
//! slept after the final attempt, and permanent errors stop immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::GenerationError;
use crate::llm::{GenerationGateway, PromptMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub empty_delay: Duration,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            empty_delay: Duration::from_secs(1),
            base_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy where one delay unit is `unit_ms` milliseconds.
    pub fn with_unit(max_attempts: u32, unit_ms: u64) -> Self {
        let unit = Duration::from_millis(unit_ms);
        Self {
            max_attempts,
            empty_delay: unit,
            base_backoff: unit,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after the failed attempt with zero-based index `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Call the gateway until it produces non-blank text.
    ///
    /// `Ok(None)` means every attempt came back blank. `Err` carries the last
    /// error once attempts run out, or the first permanent one.
    pub async fn generate(
        &self,
        gateway: &dyn GenerationGateway,
        messages: &[PromptMessage],
    ) -> Result<Option<String>, GenerationError> {
        let attempts = self.attempts();
        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;
            match gateway.complete(messages).await {
                Ok(text) if !text.trim().is_empty() => return Ok(Some(text)),
                Ok(_) => {
                    warn!(attempt = attempt + 1, "Empty completion");
                    if !last {
                        tokio::time::sleep(self.empty_delay).await;
                    }
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if last {
                        return Err(e);
                    }
                    let delay = self.backoff(attempt);
                    warn!(attempt = attempt + 1, error = %e, "Generation failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Ok(None)
    }

    /// Run `op` until it succeeds, backing off on transient errors.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        mut op: F,
        is_transient: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts && is_transient(&e) => {
                    let delay = self.backoff(attempt);
                    warn!(operation = label, attempt = attempt + 1, error = %e, "Retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationGateway for Scripted {
        async fn complete(&self, _m: &[PromptMessage]) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn transient() -> Result<String, GenerationError> {
        Err(GenerationError::Transient("flaky".into()))
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_no_delay() {
        let gateway = Scripted::new(vec![Ok("answer".into())]);
        let start = Instant::now();
        let out = RetryPolicy::default().generate(&gateway, &[]).await.unwrap();
        assert_eq!(out.as_deref(), Some("answer"));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_then_success_backs_off_exponentially() {
        let gateway = Scripted::new(vec![transient(), transient(), Ok("third time".into())]);
        let start = Instant::now();
        let out = RetryPolicy::default().generate(&gateway, &[]).await.unwrap();
        assert_eq!(out.as_deref(), Some("third time"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_replies_use_fixed_delay() {
        let gateway = Scripted::new(vec![Ok("  ".into()), Ok("\n".into()), Ok(String::new())]);
        let start = Instant::now();
        let out = RetryPolicy::default().generate(&gateway, &[]).await.unwrap();
        assert!(out.is_none());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_errors_propagate() {
        let gateway = Scripted::new(vec![transient(), transient(), transient()]);
        let start = Instant::now();
        let err = RetryPolicy::default().generate(&gateway, &[]).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_stops_immediately() {
        let gateway = Scripted::new(vec![Err(GenerationError::Permanent("bad key".into()))]);
        let err = RetryPolicy::default().generate(&gateway, &[]).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_tries_once() {
        let gateway = Scripted::new(vec![Ok("ok".into())]);
        let policy = RetryPolicy { max_attempts: 0, ..RetryPolicy::default() };
        assert!(policy.generate(&gateway, &[]).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_transient_only() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let out: Result<u32, String> = RetryPolicy::default()
            .run(
                "store",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("busy".to_string())
                        } else {
                            Ok(n)
                        }
                    }
                },
                |e| e == "busy",
            )
            .await;
        assert_eq!(out, Ok(2));
        assert_eq!(start.elapsed(), Duration::from_secs(3));

        let calls = AtomicU32::new(0);
        let out: Result<(), String> = RetryPolicy::default()
            .run(
                "store",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("denied".to_string()) }
                },
                |e| e == "busy",
            )
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
