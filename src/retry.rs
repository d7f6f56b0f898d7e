//! Bounded retry policy shared by the embedder and extractor
//! capabilities: no open-ended retry loops anywhere in the crate.

use rand::Rng;
use std::time::Duration;

use crate::error::{CodexfiError, Result};

/// Base delay, backoff factor, jitter, ceiling and total budget for the
/// retry schedule: base 250ms, factor 2, jitter +/-20%, max delay 8s, up
/// to 4 retries, total budget 30s.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub factor: f64,
    pub jitter: f64,
    pub max_delay: Duration,
    pub max_retries: u32,
    pub total_budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            factor: 2.0,
            jitter: 0.2,
            max_delay: Duration::from_secs(8),
            max_retries: 4,
            total_budget: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.base.as_secs_f64() * self.factor.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jitter_span = capped * self.jitter;
        let jittered = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        Duration::from_secs_f64((capped + jittered).max(0.0))
    }
}

/// Classifies whether an upstream failure should be retried under this
/// policy: transient (5xx), rate-limited (429), and timeouts are retried;
/// other 4xx responses are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamOutcome {
    Retryable,
    Fatal,
}

pub fn classify_status(status: u16) -> UpstreamOutcome {
    if status == 429 || (500..600).contains(&status) {
        UpstreamOutcome::Retryable
    } else {
        UpstreamOutcome::Fatal
    }
}

/// Runs `op` under the bounded retry schedule. `op` must return
/// `Ok(_)`, a fatal `Err`, or a retryable `Err` (per
/// [`CodexfiError::is_retryable`]) — fatal errors return immediately.
pub async fn with_backoff<F, Fut, T>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let started = std::time::Instant::now();
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                if started.elapsed() + delay > policy.total_budget {
                    return Err(err);
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Wraps a future with a hard timeout, mapping elapsed to `E_TIMEOUT`.
pub async fn with_timeout<Fut, T>(duration: Duration, fut: Fut) -> Result<T>
where
    Fut: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(CodexfiError::Timeout(duration)),
    }
}
