//! Row-level progress events emitted by the batch orchestrator.
//!
//! Reporters must not fail the batch; they only observe it.

use std::sync::Mutex;

/// A single progress event for a batch run.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchProgressEvent {
    /// Row `row` (1-based) is about to be processed.
    RowStarted { row: usize, done: usize, total: usize },
    /// Row finished and was recorded.
    RowFinished {
        row: usize,
        accepted: usize,
        done: usize,
        total: usize,
    },
    /// Row could not be processed and stays pending.
    RowFailed {
        row: usize,
        reason: String,
        done: usize,
        total: usize,
    },
}

pub trait BatchProgressReporter: Send + Sync {
    fn report(&self, event: BatchProgressEvent);
}

/// No-op reporter.
pub struct NoProgress;

impl BatchProgressReporter for NoProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

/// Keeps every event, in order.
#[derive(Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<BatchProgressEvent>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BatchProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl BatchProgressReporter for CollectingProgress {
    fn report(&self, event: BatchProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
