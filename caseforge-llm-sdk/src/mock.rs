//! Scripted in-process client for tests.
//!
//! Responses are drained in order; once the script is exhausted the
//! client returns the configured default. Every received request is
//! recorded for assertion.

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type ScriptedResult = Result<String, LlmError>;

pub struct MockLlmClient {
    script: Mutex<VecDeque<ScriptedResult>>,
    requests: Mutex<Vec<CompletionRequest>>,
    default_response: Option<String>,
}

impl MockLlmClient {
    /// Client that answers with `response` for every request
    pub fn always(response: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_response: Some(response.into()),
        }
    }

    /// Client that plays back `results` in order, then fails
    pub fn scripted(results: Vec<ScriptedResult>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            default_response: None,
        }
    }

    /// Requests received so far, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);

        let next = self.script.lock().unwrap().pop_front();
        let content = match next {
            Some(Ok(content)) => content,
            Some(Err(e)) => return Err(e),
            None => match &self.default_response {
                Some(content) => content.clone(),
                None => return Err(LlmError::internal("mock script exhausted")),
            },
        };

        Ok(CompletionResponse {
            content,
            usage: None,
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
