//! Retrieval-quality evaluation.

use tracing::{Instrument, debug, info, info_span};

use super::paired_len;
use crate::error::EvalError;
use crate::judge::JudgeClient;
use crate::metrics::MetricJudge;
use crate::noise::NoiseGenerator;
use crate::progress::ProgressSink;
use crate::rag::{QueryAdapter, RagService};
use crate::results::{AggregateReport, MetricResults};
use crate::types::{GroundTruth, Metric};

const LABEL: &str = "Calculating retrieval metrics";

/// Scores context precision, recall, relevance and entity recall per query,
/// then runs one noise-robustness check over the whole query set.
pub struct RetrievalEvaluator<'a> {
    adapter: QueryAdapter<'a>,
    metrics: MetricJudge<'a>,
    progress: &'a dyn ProgressSink,
    noise: NoiseGenerator,
}

impl<'a> RetrievalEvaluator<'a> {
    pub fn new(
        rag: &'a dyn RagService,
        judge: &'a dyn JudgeClient,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            adapter: QueryAdapter::new(rag),
            metrics: MetricJudge::new(judge),
            progress,
            noise: NoiseGenerator::from_entropy(),
        }
    }

    pub fn with_adapter(mut self, adapter: QueryAdapter<'a>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_noise(mut self, noise: NoiseGenerator) -> Self {
        self.noise = noise;
        self
    }

    /// Run the evaluation. Queries and ground truth are paired by position;
    /// extra entries on either side are ignored.
    pub async fn evaluate(
        &mut self,
        queries: &[String],
        ground_truth: &[GroundTruth],
    ) -> Result<AggregateReport, EvalError> {
        let span = info_span!("retrieval_eval", queries = queries.len());
        self.run(queries, ground_truth).instrument(span).await
    }

    async fn run(
        &mut self,
        queries: &[String],
        ground_truth: &[GroundTruth],
    ) -> Result<AggregateReport, EvalError> {
        let count = paired_len("queries", queries.len(), "ground_truth", ground_truth.len());
        let total = count + 1;
        let mut results = MetricResults::for_metrics(Metric::RETRIEVAL);
        let mut retrieved = Vec::with_capacity(count);

        self.progress.begin(LABEL, total);

        for (i, (query, truth)) in queries.iter().zip(ground_truth).enumerate() {
            debug!(query = %query, "Evaluating retrieval");
            let context = self.adapter.retrieve_raw(query).await?;

            let precision = self
                .metrics
                .context_precision(query, &context, &truth.relevant_contexts)
                .await?;
            results.record_score(Metric::ContextPrecision, precision);

            let recall = self
                .metrics
                .context_recall(query, &context, &truth.relevant_contexts)
                .await?;
            results.record_score(Metric::ContextRecall, recall);

            let relevance = self.metrics.context_relevance(&context, query).await?;
            results.record_score(Metric::ContextRelevance, relevance);

            let entity_recall = self
                .metrics
                .context_entity_recall(&context, &truth.relevant_entities)
                .await?;
            results.record_score(Metric::ContextEntityRecall, entity_recall);

            retrieved.push(context);
            self.progress.advance(i + 1, total);
        }

        if !queries.is_empty() {
            let noisy = self.noise.generate(queries);
            debug!(count = noisy.len(), "Scoring noise robustness");
            let score = self
                .metrics
                .noise_robustness(&self.adapter, &noisy, queries, &retrieved)
                .await?;
            results.record_score(Metric::NoiseRobustness, score);
        }
        self.progress.advance(total, total);
        self.progress.finish();

        let report = results.aggregate();
        info!(report = %report, "Retrieval evaluation complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoopProgress, RecordingProgress};
    use crate::testing::{MockJudge, MockRag};
    use pretty_assertions::assert_eq;

    fn inputs(n: usize) -> (Vec<String>, Vec<GroundTruth>) {
        let queries = (0..n).map(|i| format!("question {i}")).collect();
        let truth = (0..n)
            .map(|i| GroundTruth::new([format!("context {i}")], ["entity"]))
            .collect();
        (queries, truth)
    }

    #[tokio::test]
    async fn test_three_queries_call_pattern() {
        let rag = MockRag::new();
        let judge = MockJudge::returning("0.5");
        let progress = RecordingProgress::new();
        let (queries, truth) = inputs(3);

        let report = RetrievalEvaluator::new(&rag, &judge, &progress)
            .with_noise(NoiseGenerator::seeded(7))
            .evaluate(&queries, &truth)
            .await
            .unwrap();

        // One retrieval per query, then one per noisy variant.
        let clean_calls = rag
            .calls()
            .iter()
            .filter(|c| queries.contains(&c.question))
            .count();
        assert_eq!(clean_calls, 3);
        assert_eq!(rag.call_count(), 6);
        assert_eq!(judge.calls_mentioning("noise_robustness"), 1);
        assert_eq!(judge.call_count(), 3 * 4 + 1);
        assert_eq!(progress.announced_total(), Some(4));
        assert_eq!(progress.steps(), 4);

        assert_eq!(report.metrics(), Metric::RETRIEVAL.to_vec());
        for (_, value) in report.iter() {
            assert_eq!(value, 0.5);
        }
    }

    #[tokio::test]
    async fn test_mismatched_lengths_truncate() {
        let rag = MockRag::new();
        let judge = MockJudge::returning("1");
        let (queries, _) = inputs(3);
        let (_, truth) = inputs(2);

        RetrievalEvaluator::new(&rag, &judge, &NoopProgress)
            .with_noise(NoiseGenerator::seeded(1))
            .evaluate(&queries, &truth)
            .await
            .unwrap();

        assert_eq!(judge.calls_mentioning("context_precision"), 2);
        assert_eq!(judge.calls_mentioning("noise_robustness"), 1);
    }

    #[tokio::test]
    async fn test_mean_is_rounded() {
        let rag = MockRag::new();
        let judge = MockJudge::returning("0.5")
            .with_reply_for("calculate the context_precision", "0.333");
        let (queries, truth) = inputs(2);

        let report = RetrievalEvaluator::new(&rag, &judge, &NoopProgress)
            .with_noise(NoiseGenerator::seeded(1))
            .evaluate(&queries, &truth)
            .await
            .unwrap();

        assert_eq!(report.get(Metric::ContextPrecision), Some(0.33));
        assert_eq!(report.get(Metric::NoiseRobustness), Some(0.5));
    }

    #[tokio::test]
    async fn test_judge_failure_aborts() {
        let rag = MockRag::new();
        let judge = MockJudge::returning("not a number");
        let progress = RecordingProgress::new();
        let (queries, truth) = inputs(2);

        let err = RetrievalEvaluator::new(&rag, &judge, &progress)
            .evaluate(&queries, &truth)
            .await
            .unwrap_err();

        assert!(err.is_judge_reply());
        assert_eq!(judge.call_count(), 1);
        assert_eq!(progress.steps(), 0);
    }

    #[tokio::test]
    async fn test_judge_failure_on_second_query_keeps_first_step() {
        let rag = MockRag::new();
        let judge =
            MockJudge::returning("0.5").with_sequence(["0.9", "0.8", "0.7", "0.6", "high"]);
        let progress = RecordingProgress::new();
        let (queries, truth) = inputs(2);

        let err = RetrievalEvaluator::new(&rag, &judge, &progress)
            .evaluate(&queries, &truth)
            .await
            .unwrap_err();

        assert!(err.is_judge_reply());
        assert_eq!(judge.call_count(), 5);
        assert_eq!(rag.calls().len(), 2);
        assert_eq!(progress.steps(), 1);
    }

    #[tokio::test]
    async fn test_rag_failure_aborts() {
        let rag = MockRag::new().failing_on("question 1");
        let judge = MockJudge::returning("0.5");
        let (queries, truth) = inputs(3);

        let err = RetrievalEvaluator::new(&rag, &judge, &NoopProgress)
            .evaluate(&queries, &truth)
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::UpstreamStatus { .. }));
        assert_eq!(judge.call_count(), 4);
    }

    #[tokio::test]
    async fn test_no_queries_reports_nothing() {
        let rag = MockRag::new();
        let judge = MockJudge::returning("0.5");
        let progress = RecordingProgress::new();

        let report = RetrievalEvaluator::new(&rag, &judge, &progress)
            .evaluate(&[], &[])
            .await
            .unwrap();

        assert!(report.is_empty());
        assert_eq!(judge.call_count(), 0);
        assert_eq!(progress.announced_total(), Some(1));
    }
}
