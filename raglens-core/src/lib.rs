//! # raglens Core
//!
//! Evaluation engine for retrieval-augmented generation services.
//! Provides the LLM judge client, the RAG service client and query adapter,
//! metric functions, noisy query generation, the retrieval and generation
//! orchestrators, configuration, and fixtures.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod fixtures;
pub mod judge;
pub mod markdown;
pub mod metrics;
pub mod noise;
pub mod progress;
pub mod rag;
pub mod results;
pub mod testing;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{EvalConfig, JudgeConfig, NoiseConfig, RagConfig, load_config};
pub use error::EvalError;
pub use evaluator::{GenerationEvaluator, RetrievalEvaluator};
pub use fixtures::Fixtures;
pub use judge::{AzureJudgeClient, JudgeClient, JudgePrompt, parse_score};
pub use metrics::{CANONICAL_REFUSAL, MetricJudge, negative_rejection};
pub use noise::NoiseGenerator;
pub use progress::{NoopProgress, ProgressSink, TracingProgress};
pub use rag::{HttpRagService, QueryAdapter, RagService, TimedAnswer};
pub use results::{AggregateReport, MetricResults};
pub use types::{CounterfactualPair, GroundTruth, Metric, Score};
