//! RAG service client and the query adapter used by the evaluators.
//!
//! The service exposes `GET {base}/query` returning a markdown answer and
//! `POST {base}/upload` for indexing documents. In tests, the [`RagService`]
//! trait is implemented by an in-memory mock.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::RagConfig;
use crate::error::EvalError;
use crate::markdown;

const SERVICE: &str = "rag";

/// Default generation temperature for evaluation queries.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Default number of retrieved documents for evaluation queries.
pub const DEFAULT_N_DOCS: usize = 10;

/// Trait for RAG service interactions.
#[async_trait]
pub trait RagService: Send + Sync {
    /// Run retrieval + generation and return the raw (markdown) answer.
    async fn query(
        &self,
        question: &str,
        temperature: f64,
        n_docs: usize,
    ) -> Result<String, EvalError>;

    /// Upload a document for chunking and indexing.
    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        chunk_size: usize,
    ) -> Result<(), EvalError>;
}

/// [`RagService`] over HTTP.
pub struct HttpRagService {
    client: Client,
    base_url: String,
}

impl HttpRagService {
    pub fn new(config: &RagConfig) -> Result<Self, EvalError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| EvalError::transport(SERVICE, e))?;
        Ok(Self {
            client,
            base_url: config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EvalError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %body, "RAG service HTTP error");
        Err(EvalError::UpstreamStatus {
            service: SERVICE.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RagService for HttpRagService {
    async fn query(
        &self,
        question: &str,
        temperature: f64,
        n_docs: usize,
    ) -> Result<String, EvalError> {
        let url = format!("{}/query", self.base_url);
        debug!(url = %url, question, temperature, n_docs, "Querying RAG service");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("question", question.to_string()),
                ("temperature", temperature.to_string()),
                ("n_docs", n_docs.to_string()),
            ])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| EvalError::transport(SERVICE, e))?;

        let response = Self::check_status(response).await?;

        // The service streams tokens; collect the whole body.
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                EvalError::transport(SERVICE, format!("Failed to read response stream: {e}"))
            })?;
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        chunk_size: usize,
    ) -> Result<(), EvalError> {
        let url = format!("{}/upload", self.base_url);
        debug!(url = %url, file_name, chunk_size, "Uploading document");

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| EvalError::transport(SERVICE, e))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .query(&[("chunk_size", chunk_size)])
            .header("accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| EvalError::transport(SERVICE, e))?;

        Self::check_status(response).await.map(|_| ())
    }
}

/// A generated answer with the wall-clock time the call took.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedAnswer {
    /// Answer with markdown stripped.
    pub text: String,
    pub latency: Duration,
}

impl TimedAnswer {
    pub fn latency_secs(&self) -> f64 {
        self.latency.as_secs_f64()
    }
}

/// Issues evaluation queries against a [`RagService`] with fixed query settings.
#[derive(Clone, Copy)]
pub struct QueryAdapter<'a> {
    service: &'a dyn RagService,
    temperature: f64,
    n_docs: usize,
}

impl<'a> QueryAdapter<'a> {
    pub fn new(service: &'a dyn RagService) -> Self {
        Self {
            service,
            temperature: DEFAULT_TEMPERATURE,
            n_docs: DEFAULT_N_DOCS,
        }
    }

    pub fn with_settings(mut self, temperature: f64, n_docs: usize) -> Self {
        self.temperature = temperature;
        self.n_docs = n_docs;
        self
    }

    pub fn from_config(service: &'a dyn RagService, config: &RagConfig) -> Self {
        Self::new(service).with_settings(config.temperature, config.n_docs)
    }

    /// Generate an answer with the adapter's settings.
    pub async fn ask(&self, question: &str) -> Result<TimedAnswer, EvalError> {
        self.ask_with(question, self.temperature, self.n_docs).await
    }

    /// Generate an answer, timing the call and stripping markdown.
    pub async fn ask_with(
        &self,
        question: &str,
        temperature: f64,
        n_docs: usize,
    ) -> Result<TimedAnswer, EvalError> {
        let start = Instant::now();
        let raw = self.service.query(question, temperature, n_docs).await?;
        let latency = start.elapsed();
        Ok(TimedAnswer {
            text: markdown::to_plain_text(&raw),
            latency,
        })
    }

    /// Fetch the raw response for retrieval metrics. Not timed, not stripped.
    pub async fn retrieve_raw(&self, question: &str) -> Result<String, EvalError> {
        self.service
            .query(question, self.temperature, self.n_docs)
            .await
    }
}
