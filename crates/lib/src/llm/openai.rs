//! OpenAI-compatible chat completion client (`POST {base}/chat/completions`).
//! Supports plain completion and function-call-constrained completion.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::decode::decode_completion;
use super::types::{ChatMessage, FunctionDefinition, TurnResult};
use super::{LlmBackend, LlmError};
use crate::config::{self, Config, LlmConfig};

/// Client for an OpenAI-compatible completion endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    functions: Option<&'a [FunctionDefinition]>,
}

impl OpenAiClient {
    /// Every request is bounded by `llm.timeout_secs`.
    pub fn new(llm: &LlmConfig, api_key: Option<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()
            .map_err(LlmError::Transport)?;
        Ok(Self {
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: llm.model.trim().to_string(),
            client,
        })
    }

    /// Build from the loaded config; OPENAI_API_KEY overrides `llm.apiKey`.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let api_key = config::resolve_llm_api_key(config);
        if api_key.is_none() {
            log::warn!("llm: no api key configured, requests are sent unauthenticated");
        }
        Self::new(&config.llm, api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmBackend for OpenAiClient {
    async fn complete(
        &self,
        transcript: &[ChatMessage],
        function: Option<&FunctionDefinition>,
    ) -> Result<TurnResult, LlmError> {
        if transcript.is_empty() {
            return Err(LlmError::EmptyTranscript);
        }
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages: transcript,
            functions: function.map(std::slice::from_ref),
        };
        let payload = serde_json::to_vec(&body).map_err(LlmError::Marshal)?;
        let mut req = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        log::debug!(
            "llm: POST {} ({} message(s), function: {})",
            url,
            transcript.len(),
            function.map(|f| f.name.as_str()).unwrap_or("none")
        );
        let res = req.send().await.map_err(LlmError::from_send)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(LlmError::from_body)?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        decode_completion(&bytes)
    }
}
