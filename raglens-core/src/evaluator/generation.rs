//! Generation-quality evaluation.

use tracing::{Instrument, debug, info, info_span};

use super::paired_len;
use crate::error::EvalError;
use crate::judge::JudgeClient;
use crate::metrics::{MetricJudge, negative_rejection};
use crate::progress::ProgressSink;
use crate::rag::{QueryAdapter, RagService};
use crate::results::{AggregateReport, MetricResults};
use crate::types::{CounterfactualPair, Metric};

const LABEL: &str = "Calculating generation metrics";

/// Scores generated answers: faithfulness, answer relevance, information
/// integration and latency per query, then the counterfactual and
/// negative-rejection checks.
pub struct GenerationEvaluator<'a> {
    adapter: QueryAdapter<'a>,
    metrics: MetricJudge<'a>,
    progress: &'a dyn ProgressSink,
}

impl<'a> GenerationEvaluator<'a> {
    pub fn new(
        rag: &'a dyn RagService,
        judge: &'a dyn JudgeClient,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            adapter: QueryAdapter::new(rag),
            metrics: MetricJudge::new(judge),
            progress,
        }
    }

    pub fn with_adapter(mut self, adapter: QueryAdapter<'a>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Run the evaluation.
    ///
    /// `truths` holds one reference text per query, paired by position.
    pub async fn evaluate(
        &self,
        queries: &[String],
        truths: &[String],
        counterfactual_pairs: &[CounterfactualPair],
        negative_queries: &[String],
    ) -> Result<AggregateReport, EvalError> {
        let span = info_span!(
            "generation_eval",
            queries = queries.len(),
            counterfactual = counterfactual_pairs.len(),
            negative = negative_queries.len()
        );
        self.run(queries, truths, counterfactual_pairs, negative_queries)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        queries: &[String],
        truths: &[String],
        counterfactual_pairs: &[CounterfactualPair],
        negative_queries: &[String],
    ) -> Result<AggregateReport, EvalError> {
        let count = paired_len("queries", queries.len(), "truths", truths.len());
        let total = count + counterfactual_pairs.len() + negative_queries.len();
        let mut results = MetricResults::for_metrics(Metric::GENERATION);
        let mut step = 0;

        self.progress.begin(LABEL, total);

        for (query, truth) in queries.iter().zip(truths) {
            let answer = self.adapter.ask(query).await?;
            debug!(query = %query, latency = answer.latency_secs(), "Generated answer");

            let faithfulness = self.metrics.faithfulness(&answer.text, truth).await?;
            results.record_score(Metric::Faithfulness, faithfulness);

            let relevance = self.metrics.answer_relevance(&answer.text, query).await?;
            results.record_score(Metric::AnswerRelevance, relevance);

            let integration = self.metrics.information_integration(&answer.text).await?;
            results.record_score(Metric::InformationIntegration, integration);

            results.record_latency(answer.latency);

            step += 1;
            self.progress.advance(step, total);
        }

        for pair in counterfactual_pairs {
            let score = self
                .metrics
                .counterfactual_robustness(&self.adapter, &pair.original, &pair.counterfactual)
                .await?;
            results.record_score(Metric::CounterfactualRobustness, score);

            step += 1;
            self.progress.advance(step, total);
        }

        for query in negative_queries {
            let answer = self.adapter.ask(query).await?;
            let refused = negative_rejection(&answer.text);
            debug!(query = %query, refused, "Negative query answered");
            results.record_outcome(Metric::NegativeRejection, refused);

            step += 1;
            self.progress.advance(step, total);
        }

        self.progress.finish();

        let report = results.aggregate();
        info!(report = %report, "Generation evaluation complete");
        Ok(report)
    }
}
