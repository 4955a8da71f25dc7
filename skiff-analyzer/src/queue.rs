//! Analysis work queue
//!
//! A plain FIFO of states waiting for a convergence run. Duplicate
//! entries for the same state are collapsed while pending, so a burst of
//! upstream edits costs one run, not one per edit. Counters are kept for
//! observability and for tests that assert re-trigger behavior.

use crate::state::AnalysisState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Why a state was enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueReason {
    /// Fresh or replaced module content
    Seeded,
    /// A module this state imports from bumped its version
    DependencyChanged,
    /// Explicit request from the embedding application
    Requested,
}

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub state: Arc<AnalysisState>,
    pub reason: QueueReason,
}

#[derive(Debug, Default)]
pub struct WorkQueue {
    pending: Mutex<VecDeque<QueueItem>>,
    scheduled: AtomicU64,
    requeued: AtomicU64,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a state. Returns false when the state is already pending.
    pub fn push(&self, state: Arc<AnalysisState>, reason: QueueReason) -> bool {
        let mut pending = self.pending.lock().unwrap();
        let already = pending
            .iter()
            .any(|item| Arc::ptr_eq(&item.state, &state));
        if already {
            return false;
        }
        pending.push_back(QueueItem { state, reason });
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        if reason == QueueReason::DependencyChanged {
            self.requeued.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    pub fn pop(&self) -> Option<QueueItem> {
        self.pending.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total states ever enqueued
    pub fn scheduled_count(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    /// How many enqueues were dependency-change re-triggers
    pub fn requeue_count(&self) -> u64 {
        self.requeued.load(Ordering::Relaxed)
    }
}
