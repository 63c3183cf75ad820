use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::IoError;

/// Cooperative cancellation signal.
///
/// Long operations check the token at each suspension point (byte-source
/// reads, compression calls) and fail with a cancellation error once it
/// has fired. Cancellation is advisory for in-flight work: a compression
/// job already on the blocking pool runs to completion and its result is
/// discarded.
///
/// Clones share the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`IoError::Cancelled`] if the signal has fired.
    pub fn check(&self) -> Result<(), IoError> {
        if self.is_cancelled() {
            Err(IoError::Cancelled)
        } else {
            Ok(())
        }
    }
}
