//! Integration tests for the evaluation orchestrators.
//!
//! These run full retrieval and generation evaluations against the in-memory
//! RAG service and judge doubles.

use pretty_assertions::assert_eq;
use raglens_core::evaluator::{GenerationEvaluator, RetrievalEvaluator};
use raglens_core::fixtures::Fixtures;
use raglens_core::noise::NoiseGenerator;
use raglens_core::progress::RecordingProgress;
use raglens_core::results::AggregateReport;
use raglens_core::testing::{MockJudge, MockRag};
use raglens_core::types::{GroundTruth, Metric};

fn generators_fixture() -> (Vec<String>, Vec<GroundTruth>) {
    let queries = vec!["What are Python generators?".to_string()];
    let truth = vec![GroundTruth::new(
        [
            "Generator objects are what Python uses to implement generator iterators.",
            "Generators are normally created by iterating over a function that yields values.",
        ],
        ["generator", "yield", "iterable", "function"],
    )];
    (queries, truth)
}

#[tokio::test]
async fn test_generators_end_to_end() {
    let rag = MockRag::new().with_answer("## Generators\n\nA **generator** function uses `yield`.");
    let judge = MockJudge::returning("0.5");
    let progress = RecordingProgress::new();
    let (queries, truth) = generators_fixture();

    let report = RetrievalEvaluator::new(&rag, &judge, &progress)
        .with_noise(NoiseGenerator::seeded(42))
        .evaluate(&queries, &truth)
        .await
        .unwrap();

    let expected: AggregateReport = [
        (Metric::ContextPrecision, 0.5),
        (Metric::ContextRecall, 0.5),
        (Metric::ContextRelevance, 0.5),
        (Metric::ContextEntityRecall, 0.5),
        (Metric::NoiseRobustness, 0.5),
    ]
    .into_iter()
    .collect();
    assert_eq!(report, expected);
    assert_eq!(
        report.to_string(),
        "{context_precision: 0.5, context_recall: 0.5, context_relevance: 0.5, \
         context_entity_recall: 0.5, noise_robustness: 0.5}"
    );
    assert_eq!(progress.steps(), 2);
}

#[tokio::test]
async fn test_retrieval_prompt_keeps_markdown_but_noise_prompt_strips_it() {
    let rag = MockRag::new().with_answer("**yield** pauses a function");
    let judge = MockJudge::returning("0.5");
    let (queries, truth) = generators_fixture();

    RetrievalEvaluator::new(&rag, &judge, &RecordingProgress::new())
        .with_noise(NoiseGenerator::seeded(3))
        .evaluate(&queries, &truth)
        .await
        .unwrap();

    let prompts = judge.prompts();
    let precision = &prompts[0];
    assert!(precision.context.contains("Retrieved Context: **yield** pauses a function"));
    let noise = prompts.last().unwrap();
    assert!(noise.instructions.contains("noise_robustness"));
    assert!(noise.context.contains("1. yield pauses a function"));
    assert!(!noise.context.contains("**"));
}

#[tokio::test]
async fn test_generation_counts_follow_fixture_sizes() {
    let rag = MockRag::new();
    let judge = MockJudge::returning("0.7");
    let progress = RecordingProgress::new();
    let fixtures = Fixtures::builtin();
    let truths = fixtures.truth_contexts();

    let q = fixtures.queries.len();
    let c = fixtures.counterfactual_pairs.len();
    let n = fixtures.negative_queries.len();

    let report = GenerationEvaluator::new(&rag, &judge, &progress)
        .evaluate(
            &fixtures.queries,
            &truths,
            &fixtures.counterfactual_pairs,
            &fixtures.negative_queries,
        )
        .await
        .unwrap();

    assert_eq!(rag.call_count(), q + 2 * c + n);
    assert_eq!(judge.call_count(), 3 * q + c);
    assert_eq!(progress.steps(), q + c + n);
    assert_eq!(progress.announced_total(), Some(q + c + n));
    assert_eq!(report.len(), Metric::GENERATION.len());
    assert_eq!(report.get(Metric::AnswerRelevance), Some(0.7));
}

#[tokio::test]
async fn test_builtin_retrieval_run() {
    let rag = MockRag::new();
    let judge = MockJudge::returning("0.9").with_reply_for("calculate the context_recall", "0.1");
    let fixtures = Fixtures::builtin();

    let report = RetrievalEvaluator::new(&rag, &judge, &RecordingProgress::new())
        .with_noise(NoiseGenerator::seeded(0))
        .evaluate(&fixtures.queries, &fixtures.ground_truth)
        .await
        .unwrap();

    assert_eq!(report.get(Metric::ContextPrecision), Some(0.9));
    assert_eq!(report.get(Metric::ContextRecall), Some(0.1));
    assert_eq!(judge.call_count(), 4 * fixtures.queries.len() + 1);
    assert_eq!(rag.call_count(), 2 * fixtures.queries.len());
}

#[tokio::test]
async fn test_seeded_noise_is_reproducible_across_runs() {
    let (queries, truth) = generators_fixture();
    let mut noisy_questions = Vec::new();

    for _ in 0..2 {
        let rag = MockRag::new();
        let judge = MockJudge::returning("0.5");
        RetrievalEvaluator::new(&rag, &judge, &RecordingProgress::new())
            .with_noise(NoiseGenerator::seeded(11))
            .evaluate(&queries, &truth)
            .await
            .unwrap();
        noisy_questions.push(rag.calls().last().unwrap().question.clone());
    }

    assert_eq!(noisy_questions[0], noisy_questions[1]);
    assert_ne!(noisy_questions[0], queries[0]);
}
