use crate::error::BwError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Bounded retry policy shared by both transports.
///
/// The policy only classifies errors and spaces attempts; whether an
/// operation is safe to repeat is decided by the caller opting in.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max.max(base);
        self
    }

    /// Whether `error`, observed on attempt number `attempt` (1-based), warrants another try
    pub fn should_retry(&self, error: &BwError, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        Self::is_retryable(error)
    }

    pub fn is_retryable(error: &BwError) -> bool {
        match error {
            BwError::Transport(_) | BwError::Decode(_) => true,
            BwError::Backend { .. }
            | BwError::NotFound
            | BwError::AttachmentNotFound
            | BwError::Unsupported { .. }
            | BwError::ConsistencyViolation(_)
            | BwError::Cancelled
            | BwError::InvalidObject(_)
            | BwError::Config(_)
            | BwError::Io(_) => false,
        }
    }

    /// Delay before the attempt following `attempt`: base * 2^(attempt-1), capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Sleep for the attempt's delay, returning early with [`BwError::Cancelled`]
    pub async fn backoff(&self, attempt: u32, cancel: &CancellationToken) -> Result<(), BwError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BwError::Cancelled),
            _ = tokio::time::sleep(self.delay_for(attempt)) => Ok(()),
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error or exhausts the attempts.
    ///
    /// Each attempt races against `cancel`; cancellation is never retried.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, BwError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BwError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(BwError::Cancelled),
                r = op() => r,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(&e, attempt) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %e,
                        delay = ?self.delay_for(attempt),
                        "Retrying after error"
                    );
                    self.backoff(attempt, cancel).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Run a single attempt of a non-retried operation, still honoring cancellation.
pub(crate) async fn once<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T, BwError>
where
    Fut: Future<Output = Result<T, BwError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BwError::Cancelled),
        r = fut => r,
    }
}
