//! Per-run metric accumulation and the rounded aggregate report.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::types::{Metric, Score};

/// Values collected during one evaluation run, keyed by metric.
///
/// Owned by a single orchestrator for the duration of its run.
#[derive(Debug, Clone, Default)]
pub struct MetricResults {
    series: BTreeMap<Metric, Vec<f64>>,
}

impl MetricResults {
    /// Start a run with an empty series for each metric in `metrics`.
    pub fn for_metrics(metrics: &[Metric]) -> Self {
        Self {
            series: metrics.iter().map(|m| (*m, Vec::new())).collect(),
        }
    }

    pub fn record_score(&mut self, metric: Metric, score: Score) {
        self.push(metric, score.value());
    }

    /// Boolean outcomes are averaged as 1.0 / 0.0.
    pub fn record_outcome(&mut self, metric: Metric, passed: bool) {
        self.push(metric, if passed { 1.0 } else { 0.0 });
    }

    pub fn record_latency(&mut self, elapsed: Duration) {
        self.push(Metric::Latency, elapsed.as_secs_f64());
    }

    fn push(&mut self, metric: Metric, value: f64) {
        self.series.entry(metric).or_default().push(value);
    }

    pub fn series(&self, metric: Metric) -> &[f64] {
        self.series.get(&metric).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, metric: Metric) -> usize {
        self.series(metric).len()
    }

    /// Reduce every non-empty series to its mean rounded to 2 decimals.
    ///
    /// Metrics with no samples are left out of the report.
    pub fn aggregate(&self) -> AggregateReport {
        let values = self
            .series
            .iter()
            .filter_map(|(metric, values)| mean(values).map(|m| (*metric, round2(m))))
            .collect();
        AggregateReport { values }
    }
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Round to two decimal places, ties to even (0.625 -> 0.62).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Metric name to rounded mean. The terminal output of an evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregateReport {
    values: BTreeMap<Metric, f64>,
}

impl AggregateReport {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().map(|(m, v)| (*m, *v))
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.values.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(Metric, f64)> for AggregateReport {
    fn from_iter<I: IntoIterator<Item = (Metric, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (metric, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{metric}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn score(v: f64) -> Score {
        Score::new(v).unwrap()
    }

    #[test]
    fn test_aggregate_rounds_mean() {
        let mut results = MetricResults::for_metrics(&[Metric::Faithfulness]);
        for v in [0.8, 0.6, 1.0] {
            results.record_score(Metric::Faithfulness, score(v));
        }
        let report = results.aggregate();
        assert_eq!(report.get(Metric::Faithfulness), Some(0.80));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.666_666), 0.67);
        assert_eq!(round2(0.123), 0.12);
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(0.5), 0.5);
    }

    #[test]
    fn test_round2_ties_to_even() {
        assert_eq!(round2(0.625), 0.62);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(0.875), 0.88);
    }

    #[test]
    fn test_aggregate_tie_rounds_to_even() {
        let mut results = MetricResults::for_metrics(&[Metric::NegativeRejection]);
        for i in 0..8 {
            results.record_outcome(Metric::NegativeRejection, i < 5);
        }
        assert_eq!(results.aggregate().get(Metric::NegativeRejection), Some(0.62));
    }

    #[test]
    fn test_outcomes_average_as_fraction() {
        let mut results = MetricResults::default();
        results.record_outcome(Metric::NegativeRejection, true);
        results.record_outcome(Metric::NegativeRejection, false);
        results.record_outcome(Metric::NegativeRejection, false);
        results.record_outcome(Metric::NegativeRejection, true);
        assert_eq!(results.series(Metric::NegativeRejection), &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(results.aggregate().get(Metric::NegativeRejection), Some(0.5));
    }

    #[test]
    fn test_latency_in_seconds() {
        let mut results = MetricResults::default();
        results.record_latency(Duration::from_millis(1500));
        results.record_latency(Duration::from_millis(500));
        assert_eq!(results.aggregate().get(Metric::Latency), Some(1.0));
    }

    #[test]
    fn test_empty_series_left_out() {
        let mut results =
            MetricResults::for_metrics(&[Metric::Faithfulness, Metric::CounterfactualRobustness]);
        results.record_score(Metric::Faithfulness, score(0.4));
        let report = results.aggregate();
        assert_eq!(report.metrics(), vec![Metric::Faithfulness]);
        assert_eq!(results.len(Metric::CounterfactualRobustness), 0);
    }

    #[test]
    fn test_report_display_and_json_follow_catalogue_order() {
        let report: AggregateReport = [
            (Metric::ContextRecall, 0.25),
            (Metric::NoiseRobustness, 1.0),
            (Metric::ContextPrecision, 0.5),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            report.to_string(),
            "{context_precision: 0.5, context_recall: 0.25, noise_robustness: 1}"
        );
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"context_precision":0.5,"context_recall":0.25,"noise_robustness":1.0}"#
        );
    }
}
