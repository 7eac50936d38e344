//! LLM-as-judge client.
//!
//! A judge call is a three-message chat completion: a system message framing
//! the metric, a user message carrying the data, and a system message pinning
//! the output format to a single float. The raw reply text is returned to the
//! caller, which parses it with [`parse_score`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::config::JudgeConfig;
use crate::error::EvalError;
use crate::types::Score;

const SERVICE: &str = "judge";

/// Output constraint appended to every judged metric.
pub const SCORE_OUTPUT_FORMAT: &str =
    "You just have to return a single float value. The value should be between 0 and 1.";

/// The three parts of a judge prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgePrompt {
    /// Role framing and the one-sentence metric definition.
    pub instructions: String,
    /// The data being judged.
    pub context: String,
    /// Output-format constraint.
    pub output_format: String,
}

impl JudgePrompt {
    /// A prompt with the standard single-float output constraint.
    pub fn scored(instructions: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            context: context.into(),
            output_format: SCORE_OUTPUT_FORMAT.to_string(),
        }
    }

    /// Role-tagged chat messages in order: system, user, system.
    pub fn to_messages(&self) -> Vec<Value> {
        vec![
            json!({ "role": "system", "content": self.instructions }),
            json!({ "role": "user", "content": self.context }),
            json!({ "role": "system", "content": self.output_format }),
        ]
    }
}

/// Sends a prompt to the judge model and returns its raw reply.
///
/// Implementations do not retry; transport and auth errors surface unchanged.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    async fn judge(&self, prompt: &JudgePrompt) -> Result<String, EvalError>;
}

/// Parse a judge reply into a [`Score`].
///
/// Surrounding whitespace is ignored. Anything that is not a plain number is
/// a [`EvalError::JudgeParse`]; a number outside [0, 1] (or NaN/inf) is a
/// [`EvalError::ScoreOutOfRange`].
pub fn parse_score(reply: &str) -> Result<Score, EvalError> {
    let trimmed = reply.trim();
    let value: f64 = trimmed.parse().map_err(|_| EvalError::JudgeParse {
        reply: reply.to_string(),
    })?;
    Score::new(value)
}

/// Judge backed by an Azure OpenAI chat-completions deployment.
pub struct AzureJudgeClient {
    client: Client,
    url: String,
    api_key: String,
    temperature: Option<f32>,
}

impl AzureJudgeClient {
    /// Create a client from configuration.
    ///
    /// Reads the API key from `config.api_key` or the env var named by
    /// `config.api_key_env`.
    pub fn new(config: &JudgeConfig) -> Result<Self, EvalError> {
        let api_key = config.resolve_api_key()?;
        Self::new_with_key(config, api_key)
    }

    /// Create a client with an explicitly provided API key.
    pub fn new_with_key(config: &JudgeConfig, api_key: String) -> Result<Self, EvalError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| EvalError::config("judge.endpoint is not set"))?;
        let deployment = config
            .deployment
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| EvalError::config("judge.deployment is not set"))?;

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| EvalError::transport(SERVICE, e))?;

        Ok(Self {
            client,
            url: Self::completions_url(endpoint, deployment, &config.api_version),
            api_key,
            temperature: config.temperature,
        })
    }

    fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version
        )
    }

    fn request_body(&self, prompt: &JudgePrompt) -> Value {
        let mut body = json!({ "messages": prompt.to_messages() });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    /// Pull the top choice's text out of a chat-completions body.
    fn parse_response(body: &Value) -> Result<String, EvalError> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| EvalError::JudgeResponse {
                message: "No choices in response".to_string(),
            })?;

        choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| EvalError::JudgeResponse {
                message: "No message content in choice".to_string(),
            })
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> EvalError {
        match status.as_u16() {
            401 | 403 => {
                debug!(body = %body, "Judge authentication failed");
                EvalError::AuthFailed {
                    service: SERVICE.to_string(),
                }
            }
            code => EvalError::UpstreamStatus {
                service: SERVICE.to_string(),
                status: code,
                body: body.to_string(),
            },
        }
    }
}

#[async_trait]
impl JudgeClient for AzureJudgeClient {
    async fn judge(&self, prompt: &JudgePrompt) -> Result<String, EvalError> {
        debug!(url = %self.url, "Sending judge completion request");

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| EvalError::transport(SERVICE, e))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| EvalError::transport(SERVICE, format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| EvalError::JudgeResponse {
                message: format!("Invalid JSON: {e}"),
            })?;

        Self::parse_response(&json)
    }
}
