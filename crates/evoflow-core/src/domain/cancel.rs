use evoflow_error::{EvoflowError, EvoflowResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cooperative cancellation signal. Clones share the same flag, so one
/// token can be handed to the caller while the engine and its workers check
/// the shared state at every suspension point.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns `Cancelled` once the flag is set. Called before and after
    /// every collaborator call and inside retry sleeps.
    #[inline]
    pub fn ensure_active(&self) -> EvoflowResult<()> {
        if self.is_cancelled() {
            return Err(EvoflowError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoflow_error::ErrorCode;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();

        assert!(token.ensure_active().is_ok());
        clone.cancel();

        assert!(token.is_cancelled());
        assert_eq!(
            token.ensure_active().unwrap_err().code(),
            ErrorCode::Cancelled
        );
    }
}
