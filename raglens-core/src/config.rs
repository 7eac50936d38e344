//! Configuration for raglens.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> legacy
//! environment names -> `RAGLENS_` environment -> CLI overrides. The config file
//! is either passed explicitly or picked up from `raglens.toml` in the current
//! directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EvalError;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "raglens.toml";

/// Top-level configuration for an evaluation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalConfig {
    /// LLM judge (Azure OpenAI deployment).
    #[serde(default)]
    pub judge: JudgeConfig,
    /// RAG service under evaluation.
    #[serde(default)]
    pub rag: RagConfig,
    /// Noise-robustness settings.
    #[serde(default)]
    pub noise: NoiseConfig,
}

/// Connection settings for the judge model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Azure OpenAI resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Deployment name of the judge model.
    #[serde(default)]
    pub deployment: Option<String>,
    /// Azure OpenAI REST API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Inline API key. Prefer `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Environment variable name containing the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Sampling temperature sent with each judge request (provider default if unset).
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Request timeout in seconds. Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: default_api_version(),
            api_key: None,
            api_key_env: default_api_key_env(),
            temperature: None,
            timeout_secs: None,
        }
    }
}

impl JudgeConfig {
    /// Resolve the API key from the inline value or the configured env var.
    pub fn resolve_api_key(&self) -> Result<String, EvalError> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                EvalError::config(format!(
                    "judge API key not set (env var '{}')",
                    self.api_key_env
                ))
            })
    }
}

fn default_api_version() -> String {
    "2024-02-01".to_string()
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

/// Connection and query settings for the RAG service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_rag_host")]
    pub host: String,
    #[serde(default = "default_rag_port")]
    pub port: u16,
    /// Route prefix the query and upload endpoints live under.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Generation temperature passed to every query.
    #[serde(default = "default_rag_temperature")]
    pub temperature: f64,
    /// Number of documents the service retrieves per query.
    #[serde(default = "default_n_docs")]
    pub n_docs: usize,
    /// Chunk size requested when uploading documents.
    #[serde(default = "default_chunk_size")]
    pub upload_chunk_size: usize,
    /// Request timeout in seconds. Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            host: default_rag_host(),
            port: default_rag_port(),
            base_path: default_base_path(),
            temperature: default_rag_temperature(),
            n_docs: default_n_docs(),
            upload_chunk_size: default_chunk_size(),
            timeout_secs: None,
        }
    }
}

impl RagConfig {
    /// Base URL of the service routes, without a trailing slash.
    pub fn base_url(&self) -> String {
        let path = self.base_path.trim_matches('/');
        if path.is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}/{}", self.host, self.port, path)
        }
    }
}

fn default_rag_host() -> String {
    "localhost".to_string()
}

fn default_rag_port() -> u16 {
    8000
}

fn default_base_path() -> String {
    "/files".to_string()
}

fn default_rag_temperature() -> f64 {
    0.7
}

fn default_n_docs() -> usize {
    10
}

fn default_chunk_size() -> usize {
    200
}

/// Noise-robustness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Probability of dropping each character of a query.
    #[serde(default = "default_drop_probability")]
    pub drop_probability: f64,
    /// Fixed RNG seed. Unset seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            drop_probability: default_drop_probability(),
            seed: None,
        }
    }
}

fn default_drop_probability() -> f64 {
    0.1
}

impl EvalConfig {
    /// Check values that figment cannot validate on its own.
    pub fn validate(&self) -> Result<(), EvalError> {
        if !(0.0..=1.0).contains(&self.noise.drop_probability) {
            return Err(EvalError::config(format!(
                "noise.drop_probability must be within [0, 1], got {}",
                self.noise.drop_probability
            )));
        }
        if self.rag.n_docs == 0 {
            return Err(EvalError::config("rag.n_docs must be at least 1"));
        }
        if self.rag.upload_chunk_size == 0 {
            return Err(EvalError::config("rag.upload_chunk_size must be at least 1"));
        }
        Ok(())
    }

    /// Render the configuration as TOML. Inline API keys are never written.
    pub fn to_toml(&self) -> Result<String, EvalError> {
        toml::to_string_pretty(self).map_err(|e| EvalError::config(e.to_string()))
    }
}

/// Environment variable names used by the original deployment scripts.
fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        let path = match key.as_str().to_ascii_uppercase().as_str() {
            "AZURE_ENDPOINT" => "judge.endpoint",
            "AZURE_DEPLOYMENT" => "judge.deployment",
            "API_VERSION" => "judge.api_version",
            "FASTAPI_HOST" => "rag.host",
            "FASTAPI_PORT" => "rag.port",
            _ => return None,
        };
        Some(path.into())
    })
}

/// Build the layered figment without extracting it.
pub fn figment(config_file: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(EvalConfig::default()));

    match config_file {
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.exists() {
                figment = figment.merge(Toml::file(local));
            }
        }
    }

    // Legacy names (AZURE_ENDPOINT, FASTAPI_PORT, ...)
    figment = figment.merge(legacy_env());

    // RAGLENS_JUDGE__DEPLOYMENT, RAGLENS_RAG__PORT, RAGLENS_NOISE__SEED, ...
    figment.merge(Env::prefixed("RAGLENS_").split("__"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables prefixed with `RAGLENS_`
/// 2. Legacy environment variables (`AZURE_ENDPOINT`, `FASTAPI_HOST`, ...)
/// 3. The config file (`config_file`, or `./raglens.toml` when present)
/// 4. Built-in defaults
pub fn load_config(config_file: Option<&Path>) -> Result<EvalConfig, EvalError> {
    if let Some(path) = config_file
        && !path.exists()
    {
        return Err(EvalError::config(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    let config: EvalConfig = figment(config_file).extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
