use std::future::Future;
use std::time::Duration;

use log::{error, warn};

use crate::app_config::PipelineConfig;
use crate::errors::{PipelineError, UpstreamError};

use super::context::{CancellationFlag, Stage};

/// Bounded retries with exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.retry_count,
            Duration::from_millis(config.retry_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails for good or runs out of
    /// attempts. Retryable failures are logged as recoverable; the final
    /// failure escalates to `StageFailed`.
    pub async fn run<T, F, Fut>(
        &self,
        stage: Stage,
        label: &str,
        cancel: &CancellationFlag,
        mut operation: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut attempt = 0;
        loop {
            cancel.check(stage)?;
            attempt += 1;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    let recoverable = PipelineError::RecoverableUpstreamFailure {
                        stage,
                        attempt,
                        source: e,
                    };
                    warn!("{}: {} - retrying in {:?}", label, recoverable, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!("{}: giving up after {} attempt(s): {}", label, attempt, e);
                    return Err(PipelineError::StageFailed {
                        stage,
                        reason: format!("{} failed after {} attempt(s): {}", label, attempt, e),
                    });
                }
            }
        }
    }
}
