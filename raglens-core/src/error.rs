//! Error types for the raglens-core crate.

use thiserror::Error;

/// Errors raised while talking to the RAG service or the judge, or while
/// turning judge replies into scores.
///
/// Every variant is fatal for the run that produced it: the orchestrators
/// never convert an error into a default score.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{service} request failed: {message}")]
    Transport { service: String, message: String },

    #[error("Authentication failed for {service}")]
    AuthFailed { service: String },

    #[error("Upstream query failed: {service} returned HTTP {status}: {body}")]
    UpstreamStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Judge response error: {message}")]
    JudgeResponse { message: String },

    #[error("Judge reply is not a number: {reply:?}")]
    JudgeParse { reply: String },

    #[error("Judge score {value} is outside [0, 1]")]
    ScoreOutOfRange { value: f64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Fixture error: {message}")]
    Fixtures { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EvalError {
    pub fn transport(service: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn fixtures(message: impl Into<String>) -> Self {
        Self::Fixtures {
            message: message.into(),
        }
    }

    /// Whether the failure came from the judge's reply rather than the network.
    pub fn is_judge_reply(&self) -> bool {
        matches!(
            self,
            Self::JudgeResponse { .. } | Self::JudgeParse { .. } | Self::ScoreOutOfRange { .. }
        )
    }
}

impl From<Box<figment::Error>> for EvalError {
    fn from(err: Box<figment::Error>) -> Self {
        Self::config(err.to_string())
    }
}
