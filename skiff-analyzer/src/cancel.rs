//! Cooperative cancellation
//!
//! A cloneable atomic flag checked at every suspension point. Cancelled
//! work returns promptly without mutating state (or with a partial union,
//! which is still a subset of the eventual answer and gets completed by the
//! next scheduled pass).

use crate::error::{AnalysisError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation signal
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; all clones observe it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Turn the flag into an early return
    pub fn bail_if_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}
