use super::cancel::CancelToken;
use evoflow_error::{EvoflowError, EvoflowResult};
use std::thread;
use std::time::Duration;

/// Backoff shape between attempts. `Linear` sleeps `base * attempt_number`,
/// `Exponential` sleeps `base * 2^failed_attempts`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backoff {
    Linear,
    Exponential,
}

/// A bounded retry policy. Persistence and genome evaluation both retry
/// three times with exponential backoff, from 500 ms and one second bases.
#[derive(Copy, Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn linear(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Linear,
        }
    }

    pub fn exponential(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Exponential,
        }
    }

    /// The sleep before retrying after `failed_attempts` failures
    /// (1-indexed: the first failure yields `failed_attempts == 1`).
    pub fn delay_after(&self, failed_attempts: usize) -> Duration {
        match self.backoff {
            Backoff::Linear => self.base_delay * failed_attempts as u32,
            Backoff::Exponential => {
                let shift = (failed_attempts - 1).min(16) as u32;
                self.base_delay * (1u32 << shift)
            }
        }
    }
}

/// Sleeps for `duration`, waking early (with `Cancelled`) when the token
/// flips. The sleep is chunked so cancellation is observed promptly.
pub fn sleep_cancellable(duration: Duration, cancel: &CancelToken) -> EvoflowResult<()> {
    const CHUNK: Duration = Duration::from_millis(50);

    let mut remaining = duration;
    while !remaining.is_zero() {
        cancel.ensure_active()?;
        let step = remaining.min(CHUNK);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }

    cancel.ensure_active()
}

/// Runs `op` under the given policy. The closure receives the zero-based
/// attempt index. Non-retryable errors and cancellation short-circuit;
/// otherwise the last error is returned after `max_attempts` tries.
pub fn retry<T, F>(policy: RetryPolicy, cancel: &CancelToken, mut op: F) -> EvoflowResult<T>
where
    F: FnMut(usize) -> EvoflowResult<T>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err: Option<EvoflowError> = None;

    for attempt in 0..attempts {
        cancel.ensure_active()?;

        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if matches!(err, EvoflowError::Cancelled) || !err.is_retryable() {
                    return Err(err);
                }
                if attempt + 1 < attempts {
                    sleep_cancellable(policy.delay_after(attempt + 1), cancel)?;
                }
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or(EvoflowError::Engine {
        message: "retry exhausted without an attempt".into(),
    }))
}
