//! In-memory [`JudgeClient`] and [`RagService`] doubles.
//!
//! Both record every call so tests can assert on call counts and arguments
//! without a network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::EvalError;
use crate::judge::{JudgeClient, JudgePrompt};
use crate::rag::RagService;

/// One recorded [`RagService::query`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct RagCall {
    pub question: String,
    pub temperature: f64,
    pub n_docs: usize,
}

/// One recorded [`RagService::upload`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadCall {
    pub file_name: String,
    pub size: usize,
    pub chunk_size: usize,
}

/// Mock RAG service with canned answers.
#[derive(Clone)]
pub struct MockRag {
    default_answer: String,
    answers: Vec<(String, String)>,
    fail_on: Option<String>,
    calls: Arc<Mutex<Vec<RagCall>>>,
    uploads: Arc<Mutex<Vec<UploadCall>>>,
}

impl Default for MockRag {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRag {
    pub fn new() -> Self {
        Self {
            default_answer: "mock answer".to_string(),
            answers: Vec::new(),
            fail_on: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer returned for questions without a specific answer.
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.default_answer = answer.into();
        self
    }

    /// Answer returned for one exact question.
    pub fn with_answer_for(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.push((question.into(), answer.into()));
        self
    }

    /// Return HTTP 500 for any question (or upload) containing `needle`.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    pub fn calls(&self) -> Vec<RagCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn uploads(&self) -> Vec<UploadCall> {
        self.uploads.lock().unwrap().clone()
    }

    fn check_failure(&self, subject: &str) -> Result<(), EvalError> {
        match &self.fail_on {
            Some(needle) if subject.contains(needle.as_str()) => Err(EvalError::UpstreamStatus {
                service: "rag".to_string(),
                status: 500,
                body: "Internal Server Error".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RagService for MockRag {
    async fn query(
        &self,
        question: &str,
        temperature: f64,
        n_docs: usize,
    ) -> Result<String, EvalError> {
        self.calls.lock().unwrap().push(RagCall {
            question: question.to_string(),
            temperature,
            n_docs,
        });
        self.check_failure(question)?;
        Ok(self
            .answers
            .iter()
            .find(|(q, _)| q == question)
            .map(|(_, a)| a.clone())
            .unwrap_or_else(|| self.default_answer.clone()))
    }

    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        chunk_size: usize,
    ) -> Result<(), EvalError> {
        self.check_failure(file_name)?;
        self.uploads.lock().unwrap().push(UploadCall {
            file_name: file_name.to_string(),
            size: bytes.len(),
            chunk_size,
        });
        Ok(())
    }
}

/// Mock judge returning scripted replies.
#[derive(Clone)]
pub struct MockJudge {
    default_reply: Option<String>,
    scripted: Arc<Mutex<VecDeque<String>>>,
    by_instruction: Vec<(String, String)>,
    prompts: Arc<Mutex<Vec<JudgePrompt>>>,
}

impl MockJudge {
    /// Always reply with `reply`.
    pub fn returning(reply: impl Into<String>) -> Self {
        Self {
            default_reply: Some(reply.into()),
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            by_instruction: Vec::new(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every call with a transport error.
    pub fn failing() -> Self {
        Self {
            default_reply: None,
            ..Self::returning("")
        }
    }

    /// Reply with these in order before falling back to the default.
    pub fn with_sequence<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripted
            .lock()
            .unwrap()
            .extend(replies.into_iter().map(Into::into));
        self
    }

    /// Reply with `reply` whenever the instructions mention `needle`.
    pub fn with_reply_for(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.by_instruction.push((needle.into(), reply.into()));
        self
    }

    pub fn prompts(&self) -> Vec<JudgePrompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Number of calls whose instructions mention `needle`.
    pub fn calls_mentioning(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.instructions.contains(needle))
            .count()
    }
}

#[async_trait]
impl JudgeClient for MockJudge {
    async fn judge(&self, prompt: &JudgePrompt) -> Result<String, EvalError> {
        self.prompts.lock().unwrap().push(prompt.clone());

        if let Some(reply) = self.scripted.lock().unwrap().pop_front() {
            return Ok(reply);
        }
        if let Some((_, reply)) = self
            .by_instruction
            .iter()
            .find(|(needle, _)| prompt.instructions.contains(needle.as_str()))
        {
            return Ok(reply.clone());
        }
        self.default_reply
            .clone()
            .ok_or_else(|| EvalError::transport("judge", "connection refused"))
    }
}
