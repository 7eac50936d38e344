//! Metric functions.
//!
//! Each judged metric builds a [`JudgePrompt`] (metric definition, data,
//! single-float output constraint), sends it to the judge once, and parses the
//! reply into a [`Score`]. Robustness metrics first query the RAG service
//! through a [`QueryAdapter`]. A reply that does not parse is an error for
//! that data point; nothing is defaulted.

use tracing::debug;

use crate::error::EvalError;
use crate::judge::{JudgeClient, JudgePrompt, parse_score};
use crate::markdown;
use crate::rag::QueryAdapter;
use crate::types::{Metric, Score};

/// The answer a RAG service must give to out-of-scope questions.
pub const CANONICAL_REFUSAL: &str = "I can't answer this question.";

const PREAMBLE: &str = "We are evaluating a RAG (retrieval-augmented generation) pipeline.";

/// True iff the answer, trimmed and lowercased, is the canonical refusal.
pub fn negative_rejection(answer: &str) -> bool {
    answer.trim().to_lowercase() == CANONICAL_REFUSAL.to_lowercase()
}

/// Scores metrics by asking the judge.
#[derive(Clone, Copy)]
pub struct MetricJudge<'a> {
    judge: &'a dyn JudgeClient,
}

impl<'a> MetricJudge<'a> {
    pub fn new(judge: &'a dyn JudgeClient) -> Self {
        Self { judge }
    }

    async fn score(&self, metric: Metric, prompt: JudgePrompt) -> Result<Score, EvalError> {
        let reply = self.judge.judge(&prompt).await?;
        let score = parse_score(&reply)?;
        debug!(metric = %metric, score = score.value(), "Judge scored");
        Ok(score)
    }

    /// How accurately the retrieved context matches the query.
    pub async fn context_precision(
        &self,
        query: &str,
        retrieved_context: &str,
        relevant_contexts: &[String],
    ) -> Result<Score, EvalError> {
        let instructions = instructions(
            "the user query, the retrieved context and a list of relevant (reference) contexts",
            Metric::ContextPrecision,
            "how accurately the retrieved context matches the user's query, i.e. how much of what was retrieved is relevant",
        );
        let mut context = String::new();
        field(&mut context, "Query", query);
        field(&mut context, "Retrieved Context", retrieved_context);
        list(&mut context, "Relevant Context List", relevant_contexts);
        self.score(Metric::ContextPrecision, JudgePrompt::scored(instructions, context))
            .await
    }

    /// How much of the reference context made it into the retrieval.
    pub async fn context_recall(
        &self,
        query: &str,
        retrieved_context: &str,
        relevant_contexts: &[String],
    ) -> Result<Score, EvalError> {
        let instructions = instructions(
            "the user query, the retrieved context and a list of relevant (reference) contexts",
            Metric::ContextRecall,
            "the ability to retrieve all of the relevant contexts for the user's query",
        );
        let mut context = String::new();
        field(&mut context, "Query", query);
        field(&mut context, "Retrieved Context", retrieved_context);
        list(&mut context, "Relevant Context List", relevant_contexts);
        self.score(Metric::ContextRecall, JudgePrompt::scored(instructions, context))
            .await
    }

    /// Topical relevance of the retrieval to the query.
    pub async fn context_relevance(
        &self,
        retrieved_context: &str,
        query: &str,
    ) -> Result<Score, EvalError> {
        let instructions = instructions(
            "the retrieved context and the user query",
            Metric::ContextRelevance,
            "the relevance of the retrieved context to the user's query",
        );
        let mut context = String::new();
        field(&mut context, "Retrieved Context", retrieved_context);
        field(&mut context, "Query", query);
        self.score(Metric::ContextRelevance, JudgePrompt::scored(instructions, context))
            .await
    }

    /// Fraction of the expected entities present in the retrieval.
    pub async fn context_entity_recall(
        &self,
        retrieved_context: &str,
        relevant_entities: &[String],
    ) -> Result<Score, EvalError> {
        let instructions = instructions(
            "the retrieved context and a list of relevant entities",
            Metric::ContextEntityRecall,
            "the fraction of the relevant entities that appear in the retrieved context",
        );
        let mut context = String::new();
        field(&mut context, "Retrieved Context", retrieved_context);
        field(&mut context, "Relevant Entities", &relevant_entities.join(", "));
        self.score(
            Metric::ContextEntityRecall,
            JudgePrompt::scored(instructions, context),
        )
        .await
    }

    /// Agreement between a generated answer and the reference text.
    pub async fn faithfulness(
        &self,
        generated_answer: &str,
        ground_truth: &str,
    ) -> Result<Score, EvalError> {
        let instructions = instructions(
            "the generated answer and the ground truth",
            Metric::Faithfulness,
            "the degree to which the generated answer agrees with the ground truth",
        );
        let mut context = String::new();
        field(&mut context, "Generated Answer", generated_answer);
        field(&mut context, "Ground Truth", ground_truth);
        self.score(Metric::Faithfulness, JudgePrompt::scored(instructions, context))
            .await
    }

    /// Relevance of a generated answer to the query.
    pub async fn answer_relevance(
        &self,
        generated_answer: &str,
        query: &str,
    ) -> Result<Score, EvalError> {
        let instructions = instructions(
            "the generated answer and the user query",
            Metric::AnswerRelevance,
            "the degree to which the generated answer is relevant to the user's query",
        );
        let mut context = String::new();
        field(&mut context, "Generated Answer", generated_answer);
        field(&mut context, "Query", query);
        self.score(Metric::AnswerRelevance, JudgePrompt::scored(instructions, context))
            .await
    }

    /// How cohesively the answer integrates information from several sources.
    pub async fn information_integration(
        &self,
        generated_answer: &str,
    ) -> Result<Score, EvalError> {
        let instructions = instructions(
            "the generated answer",
            Metric::InformationIntegration,
            "the ability to integrate information from multiple sources and present it cohesively",
        );
        let mut context = String::new();
        field(&mut context, "Generated Answer", generated_answer);
        self.score(
            Metric::InformationIntegration,
            JudgePrompt::scored(instructions, context),
        )
        .await
    }

    /// Ask both questions of a counterfactual pair and judge whether the
    /// answers track the change of premise.
    pub async fn counterfactual_robustness(
        &self,
        adapter: &QueryAdapter<'_>,
        original_query: &str,
        counterfactual_query: &str,
    ) -> Result<Score, EvalError> {
        let original = adapter.ask(original_query).await?;
        let counterfactual = adapter.ask(counterfactual_query).await?;

        let instructions = instructions(
            "the answer to an original query, the answer to a counterfactual query with the opposite premise, and the original query",
            Metric::CounterfactualRobustness,
            "the ability of the system to handle counterfactual or contradictory queries instead of repeating the same answer",
        );
        let mut context = String::new();
        field(&mut context, "Original Answer", &original.text);
        field(&mut context, "Counterfactual Answer", &counterfactual.text);
        field(&mut context, "Original Query", original_query);
        self.score(
            Metric::CounterfactualRobustness,
            JudgePrompt::scored(instructions, context),
        )
        .await
    }

    /// Judge the whole batch of noisy answers against the clean ones.
    ///
    /// `clean_answers` holds already-retrieved answers for a prefix of
    /// `clean_queries`; the remaining clean queries are retrieved here. Every
    /// noisy query is retrieved. Answers are compared as plain text.
    ///
    /// Clean answers passed in are reused as-is rather than sampled again, so
    /// the judge compares noisy answers against the exact contexts the other
    /// retrieval metrics scored.
    pub async fn noise_robustness(
        &self,
        adapter: &QueryAdapter<'_>,
        noisy_queries: &[String],
        clean_queries: &[String],
        clean_answers: &[String],
    ) -> Result<Score, EvalError> {
        let mut noisy_results = Vec::with_capacity(noisy_queries.len());
        for query in noisy_queries {
            let raw = adapter.retrieve_raw(query).await?;
            noisy_results.push(markdown::to_plain_text(&raw));
        }

        let mut clean_results: Vec<String> = clean_answers
            .iter()
            .take(clean_queries.len())
            .map(|raw| markdown::to_plain_text(raw))
            .collect();
        for query in &clean_queries[clean_results.len()..] {
            let raw = adapter.retrieve_raw(query).await?;
            clean_results.push(markdown::to_plain_text(&raw));
        }

        let instructions = instructions(
            "the results for noisy queries, the results for the clean queries, and the clean queries",
            Metric::NoiseRobustness,
            "the robustness of the system against noisy queries (typos and irrelevant terms)",
        );
        let mut context = String::new();
        list(&mut context, "Noisy Results", &noisy_results);
        list(&mut context, "Clean Results", &clean_results);
        list(&mut context, "Clean Queries", clean_queries);
        self.score(Metric::NoiseRobustness, JudgePrompt::scored(instructions, context))
            .await
    }
}

fn instructions(inputs: &str, metric: Metric, definition: &str) -> String {
    format!(
        "{PREAMBLE} You will get {inputs}.\nYou need to calculate the {metric}. The {metric} is {definition}."
    )
}

fn field(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!("{name}: {value}\n"));
}

fn list(out: &mut String, name: &str, items: &[String]) {
    out.push_str(&format!("{name}:\n"));
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, item.trim()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockJudge, MockRag};
    use pretty_assertions::assert_eq;

    fn contexts() -> Vec<String> {
        vec!["ctx one".to_string(), "ctx two".to_string()]
    }

    #[test]
    fn test_negative_rejection_exact_match() {
        assert!(negative_rejection("I Can't Answer This Question.  "));
        assert!(negative_rejection("\ni can't answer this question."));
        assert!(!negative_rejection("I don't know."));
        assert!(!negative_rejection("I can't answer this question. Sorry!"));
    }

    #[tokio::test]
    async fn test_every_judged_metric_returns_reply_value() {
        let judge = MockJudge::returning("0.73");
        let rag = MockRag::new();
        let adapter = QueryAdapter::new(&rag);
        let metrics = MetricJudge::new(&judge);
        let ctx = contexts();
        let queries = vec!["q".to_string()];

        let scores = vec![
            metrics.context_precision("q", "retrieved", &ctx).await.unwrap(),
            metrics.context_recall("q", "retrieved", &ctx).await.unwrap(),
            metrics.context_relevance("retrieved", "q").await.unwrap(),
            metrics.context_entity_recall("retrieved", &ctx).await.unwrap(),
            metrics.faithfulness("answer", "truth").await.unwrap(),
            metrics.answer_relevance("answer", "q").await.unwrap(),
            metrics.information_integration("answer").await.unwrap(),
            metrics
                .counterfactual_robustness(&adapter, "a", "b")
                .await
                .unwrap(),
            metrics
                .noise_robustness(&adapter, &queries, &queries, &[])
                .await
                .unwrap(),
        ];

        for score in scores {
            assert_eq!(score.value(), 0.73);
        }
        assert_eq!(judge.call_count(), 9);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_an_error() {
        let judge = MockJudge::returning("The answer is quite faithful.");
        let metrics = MetricJudge::new(&judge);
        let err = metrics.faithfulness("answer", "truth").await.unwrap_err();
        assert!(matches!(err, EvalError::JudgeParse { .. }));
    }

    #[tokio::test]
    async fn test_out_of_range_reply_is_an_error() {
        let judge = MockJudge::returning("7");
        let metrics = MetricJudge::new(&judge);
        let err = metrics.answer_relevance("answer", "q").await.unwrap_err();
        assert!(matches!(err, EvalError::ScoreOutOfRange { value } if value == 7.0));
    }

    #[tokio::test]
    async fn test_prompt_carries_metric_and_data() {
        let judge = MockJudge::returning("0.5");
        let metrics = MetricJudge::new(&judge);
        metrics
            .context_entity_recall("retrieved text", &["yield".to_string(), "generator".to_string()])
            .await
            .unwrap();

        let prompt = &judge.prompts()[0];
        assert!(prompt.instructions.contains("context_entity_recall"));
        assert_eq!(
            prompt.context,
            "Retrieved Context: retrieved text\nRelevant Entities: yield, generator\n"
        );
        assert_eq!(prompt.output_format, crate::judge::SCORE_OUTPUT_FORMAT);
    }

    #[tokio::test]
    async fn test_counterfactual_asks_both_questions() {
        let judge = MockJudge::returning("0.9");
        let rag = MockRag::new()
            .with_answer_for("Why is Python slow?", "It is **interpreted**.")
            .with_answer_for("Why is Python fast?", "It is not.");
        let adapter = QueryAdapter::new(&rag);
        MetricJudge::new(&judge)
            .counterfactual_robustness(&adapter, "Why is Python slow?", "Why is Python fast?")
            .await
            .unwrap();

        let questions: Vec<_> = rag.calls().into_iter().map(|c| c.question).collect();
        assert_eq!(questions, vec!["Why is Python slow?", "Why is Python fast?"]);
        let context = &judge.prompts()[0].context;
        assert!(context.contains("Original Answer: It is interpreted."));
        assert!(context.contains("Counterfactual Answer: It is not."));
        assert!(context.contains("Original Query: Why is Python slow?"));
    }

    #[tokio::test]
    async fn test_noise_robustness_reuses_clean_answers() {
        let judge = MockJudge::returning("0.6");
        let rag = MockRag::new();
        let adapter = QueryAdapter::new(&rag);
        let clean = vec!["first".to_string(), "second".to_string()];
        let noisy = vec!["frst list".to_string(), "secnd dict".to_string()];

        MetricJudge::new(&judge)
            .noise_robustness(&adapter, &noisy, &clean, &["cached first".to_string()])
            .await
            .unwrap();

        let questions: Vec<_> = rag.calls().into_iter().map(|c| c.question).collect();
        assert_eq!(questions, vec!["frst list", "secnd dict", "second"]);
        let context = &judge.prompts()[0].context;
        assert!(context.contains("1. cached first"));
        assert_eq!(judge.call_count(), 1);
    }

    #[tokio::test]
    async fn test_noise_prompt_lists_are_numbered() {
        let judge = MockJudge::returning("0.6");
        let rag = MockRag::new().with_answer("  noisy answer \n");
        let adapter = QueryAdapter::new(&rag);

        MetricJudge::new(&judge)
            .noise_robustness(
                &adapter,
                &["frst".to_string()],
                &["first".to_string(), "second".to_string()],
                &["clean one".to_string(), "clean two".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(
            judge.prompts()[0].context,
            "Noisy Results:\n1. noisy answer\n\
             Clean Results:\n1. clean one\n2. clean two\n\
             Clean Queries:\n1. first\n2. second\n"
        );
    }

    #[tokio::test]
    async fn test_judge_transport_error_propagates() {
        let judge = MockJudge::failing();
        let metrics = MetricJudge::new(&judge);
        let err = metrics.information_integration("answer").await.unwrap_err();
        assert!(matches!(err, EvalError::Transport { .. }));
    }
}
