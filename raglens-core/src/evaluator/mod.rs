//! Evaluation orchestrators.
//!
//! Each orchestrator owns a fresh [`MetricResults`](crate::results::MetricResults)
//! for one run, drives the RAG service and judge strictly in sequence, reports
//! progress through a [`ProgressSink`](crate::progress::ProgressSink), and ends
//! with an [`AggregateReport`](crate::results::AggregateReport). The first
//! failing call aborts the run.

pub mod generation;
pub mod retrieval;

pub use generation::GenerationEvaluator;
pub use retrieval::RetrievalEvaluator;

use tracing::warn;

/// Number of positions evaluated when two parallel inputs differ in length.
fn paired_len(left_name: &str, left: usize, right_name: &str, right: usize) -> usize {
    if left != right {
        warn!(
            left = left_name,
            left_len = left,
            right = right_name,
            right_len = right,
            "Input lengths differ; evaluating the shorter prefix"
        );
    }
    left.min(right)
}
