//! Progress reporting for evaluation runs.

use std::sync::Mutex;
use tracing::info;

/// Receives progress events from an evaluator.
///
/// `advance` is called once per completed step with the 1-based step number.
pub trait ProgressSink: Send + Sync {
    fn begin(&self, label: &str, total: usize);
    fn advance(&self, current: usize, total: usize);
    fn finish(&self);
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn begin(&self, _label: &str, _total: usize) {}
    fn advance(&self, _current: usize, _total: usize) {}
    fn finish(&self) {}
}

/// Emits progress as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingProgress {
    label: Mutex<String>,
}

impl ProgressSink for TracingProgress {
    fn begin(&self, label: &str, total: usize) {
        if let Ok(mut current) = self.label.lock() {
            *current = label.to_string();
        }
        info!(label, total, "Evaluation started");
    }

    fn advance(&self, current: usize, total: usize) {
        let label = self.label.lock().map(|l| l.clone()).unwrap_or_default();
        info!(label = %label, step = current, total, "Evaluation progress");
    }

    fn finish(&self) {
        let label = self.label.lock().map(|l| l.clone()).unwrap_or_default();
        info!(label = %label, "Evaluation finished");
    }
}

/// Progress event captured by [`RecordingProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Begin { label: String, total: usize },
    Advance { current: usize, total: usize },
    Finish,
}

/// Records every event, for tests.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of `advance` events seen.
    pub fn steps(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Advance { .. }))
            .count()
    }

    /// Total announced by the most recent `begin`.
    pub fn announced_total(&self) -> Option<usize> {
        self.events().iter().rev().find_map(|e| match e {
            ProgressEvent::Begin { total, .. } => Some(*total),
            _ => None,
        })
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ProgressSink for RecordingProgress {
    fn begin(&self, label: &str, total: usize) {
        self.push(ProgressEvent::Begin {
            label: label.to_string(),
            total,
        });
    }

    fn advance(&self, current: usize, total: usize) {
        self.push(ProgressEvent::Advance { current, total });
    }

    fn finish(&self) {
        self.push(ProgressEvent::Finish);
    }
}
