use std::future::Future;
use std::time::Duration;

/// How long to wait before the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    Exponential {
        initial: Duration,
        factor: u32,
        max: Duration,
    },
}

impl Backoff {
    /// Delay after the given zero-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                initial,
                factor,
                max,
            } => {
                let multiplier = factor.saturating_pow(attempt);
                initial.saturating_mul(multiplier).min(*max)
            }
        }
    }
}

/// Bounded retry loop shared by generation requests, status polling,
/// pin uploads and receipt polling.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self::new(
            max_attempts,
            Backoff::Exponential {
                initial,
                factor: 2,
                max,
            },
        )
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    /// HTTP-level retries for image generation: 3 attempts, 500ms doubling up to 4s.
    pub fn generation_requests() -> Self {
        Self::exponential(3, Duration::from_millis(500), Duration::from_secs(4))
    }

    /// Status polling for asynchronous generation jobs.
    pub fn generation_polling() -> Self {
        Self::exponential(40, Duration::from_secs(1), Duration::from_secs(5))
    }

    pub fn uploads() -> Self {
        Self::exponential(3, Duration::from_secs(1), Duration::from_secs(8))
    }

    pub fn receipt_polling() -> Self {
        Self::fixed(60, Duration::from_secs(2))
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Runs `operation` until it succeeds, fails with an error `is_retryable`
    /// rejects, or the attempt budget is spent. The last error is returned.
    pub async fn run<T, E, F, Fut, R>(&self, label: &str, is_retryable: R, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let remaining = self.max_attempts.saturating_sub(attempt + 1);
                    if remaining == 0 || !is_retryable(&err) {
                        if attempt > 0 {
                            log::error!("{} failed after {} attempts: {}", label, attempt + 1, err);
                        }
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    log::warn!(
                        "{} attempt {}/{} failed: {} (retrying in {}ms)",
                        label,
                        attempt + 1,
                        self.max_attempts,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Polls `check` until it yields `Some`, sleeping per the backoff between
    /// checks. Errors end polling immediately; `Ok(None)` means the budget ran out.
    pub async fn poll<T, E, F, Fut>(&self, label: &str, mut check: F) -> Result<Option<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        for attempt in 0..self.max_attempts {
            if let Some(value) = check(attempt).await? {
                return Ok(Some(value));
            }
            if attempt + 1 < self.max_attempts {
                let delay = self.delay_for(attempt);
                log::debug!(
                    "{} not ready after check {}/{}, waiting {}ms",
                    label,
                    attempt + 1,
                    self.max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
        log::warn!("{} gave up after {} checks", label, self.max_attempts);
        Ok(None)
    }
}
