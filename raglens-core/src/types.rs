//! Core data types: the metric catalogue, judged scores, and fixture records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EvalError;

/// Every metric raglens can report.
///
/// Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// How much of what was retrieved matches the query.
    ContextPrecision,
    /// How much of the reference context was retrieved.
    ContextRecall,
    /// Topical relevance of the retrieval to the query.
    ContextRelevance,
    /// Fraction of expected entities present in the retrieval.
    ContextEntityRecall,
    /// Output degradation under perturbed queries.
    NoiseRobustness,
    /// Agreement between the generated answer and the ground truth.
    Faithfulness,
    /// Topical relevance of the answer to the query.
    AnswerRelevance,
    /// Cohesiveness of multi-source synthesis.
    InformationIntegration,
    /// Whether the system differentiates opposite premises.
    CounterfactualRobustness,
    /// Share of unanswerable queries refused with the canonical string.
    NegativeRejection,
    /// Wall-clock seconds per generation call.
    Latency,
}

impl Metric {
    /// Metrics reported by the retrieval evaluator.
    pub const RETRIEVAL: &'static [Metric] = &[
        Metric::ContextPrecision,
        Metric::ContextRecall,
        Metric::ContextRelevance,
        Metric::ContextEntityRecall,
        Metric::NoiseRobustness,
    ];

    /// Metrics reported by the generation evaluator.
    pub const GENERATION: &'static [Metric] = &[
        Metric::Faithfulness,
        Metric::AnswerRelevance,
        Metric::InformationIntegration,
        Metric::CounterfactualRobustness,
        Metric::NegativeRejection,
        Metric::Latency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ContextPrecision => "context_precision",
            Metric::ContextRecall => "context_recall",
            Metric::ContextRelevance => "context_relevance",
            Metric::ContextEntityRecall => "context_entity_recall",
            Metric::NoiseRobustness => "noise_robustness",
            Metric::Faithfulness => "faithfulness",
            Metric::AnswerRelevance => "answer_relevance",
            Metric::InformationIntegration => "information_integration",
            Metric::CounterfactualRobustness => "counterfactual_robustness",
            Metric::NegativeRejection => "negative_rejection",
            Metric::Latency => "latency",
        }
    }

    /// Whether values of this metric come from the judge and live in [0, 1].
    pub fn is_judged(&self) -> bool {
        !matches!(self, Metric::NegativeRejection | Metric::Latency)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A judged score, guaranteed finite and within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Score(f64);

impl Score {
    pub fn new(value: f64) -> Result<Self, EvalError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(EvalError::ScoreOutOfRange { value })
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference material a correct retrieval for one query should surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub relevant_contexts: Vec<String>,
    pub relevant_entities: Vec<String>,
}

impl GroundTruth {
    pub fn new<C, E>(contexts: C, entities: E) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            relevant_contexts: contexts.into_iter().map(Into::into).collect(),
            relevant_entities: entities.into_iter().map(Into::into).collect(),
        }
    }

    /// All reference contexts joined by newlines.
    pub fn joined_contexts(&self) -> String {
        self.relevant_contexts.join("\n")
    }
}

/// Two related questions with opposite premises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterfactualPair {
    pub original: String,
    pub counterfactual: String,
}

impl CounterfactualPair {
    pub fn new(original: impl Into<String>, counterfactual: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            counterfactual: counterfactual.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_match_serde() {
        for metric in Metric::RETRIEVAL.iter().chain(Metric::GENERATION) {
            let json = serde_json::to_string(metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.as_str()));
        }
    }

    #[test]
    fn test_metric_catalogues_are_disjoint() {
        for metric in Metric::RETRIEVAL {
            assert!(!Metric::GENERATION.contains(metric));
        }
        assert_eq!(Metric::RETRIEVAL.len() + Metric::GENERATION.len(), 11);
    }

    #[test]
    fn test_judged_metrics() {
        assert!(Metric::Faithfulness.is_judged());
        assert!(Metric::NoiseRobustness.is_judged());
        assert!(!Metric::NegativeRejection.is_judged());
        assert!(!Metric::Latency.is_judged());
    }

    #[test]
    fn test_score_bounds() {
        assert_eq!(Score::new(0.0).unwrap().value(), 0.0);
        assert_eq!(Score::new(1.0).unwrap().value(), 1.0);
        assert!(matches!(
            Score::new(1.01),
            Err(EvalError::ScoreOutOfRange { .. })
        ));
        assert!(Score::new(-0.1).is_err());
        assert!(Score::new(f64::NAN).is_err());
        assert!(Score::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_joined_contexts() {
        let truth = GroundTruth::new(["first passage", "second passage"], ["entity"]);
        assert_eq!(truth.joined_contexts(), "first passage\nsecond passage");
    }
}
