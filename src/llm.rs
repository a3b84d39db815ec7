// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Language model clients for the analysis agents
//!
//! Agents only see [`TextGenerator`]. [`LlmClient`] speaks either the Ollama
//! generate API or an OpenAI-compatible chat completions API;
//! [`DisabledGenerator`] refuses every prompt so each agent takes its
//! rule-based path.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{LlmConfig, LlmProvider};
use crate::{DocSentryError, Result};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";

/// Anything that turns a prompt into a completion
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// Complete a single prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// HTTP client for Ollama or OpenAI-compatible servers
pub struct LlmClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Strip endpoint paths so only the server root remains
fn normalize_url(url: &str) -> String {
    let mut base = url.trim().trim_end_matches('/').to_string();
    for suffix in ["/api/generate", "/api/chat", "/v1/chat/completions", "/v1"] {
        if let Some(stripped) = base.strip_suffix(suffix) {
            base = stripped.trim_end_matches('/').to_string();
        }
    }
    base
}

/// Pull the first non-empty message out of a chat completion
fn first_choice_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .filter_map(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

impl LlmClient {
    /// Create a client from the LLM section of the configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocSentryError::LlmUnavailable(format!("Failed to create HTTP client: {}", e)))?;

        let mut base_url = normalize_url(&config.url);
        // The stock URL points at a local Ollama; OpenAI users usually only set a key.
        if config.provider == LlmProvider::OpenAi && base_url == "http://localhost:11434" {
            base_url = OPENAI_DEFAULT_URL.to_string();
        }

        Ok(Self {
            client,
            provider: config.provider,
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            retries: config.retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn models_url(&self) -> String {
        match self.provider {
            LlmProvider::Ollama => format!("{}/api/tags", self.base_url),
            LlmProvider::OpenAi => format!("{}/v1/models", self.base_url),
        }
    }

    /// Check that the server answers and accepts our credentials
    pub async fn health_check(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(self.models_url()))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                DocSentryError::LlmUnavailable(format!(
                    "Cannot connect to {} at {}: {}",
                    self.provider.as_str(),
                    self.base_url,
                    e
                ))
            })?;

        if !response.status().is_success() {
            return Err(DocSentryError::LlmUnavailable(format!(
                "{} at {} returned status {}",
                self.provider.as_str(),
                self.base_url,
                response.status()
            )));
        }

        Ok(())
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self.authorize(self.client.get(self.models_url())).send().await?;

        if !response.status().is_success() {
            return Err(DocSentryError::LlmUnavailable(format!(
                "Model listing returned status {}",
                response.status()
            )));
        }

        match self.provider {
            LlmProvider::Ollama => {
                let tags: TagsResponse = response.json().await?;
                Ok(tags.models.into_iter().map(|m| m.name).collect())
            }
            LlmProvider::OpenAi => {
                let list: ModelList = response.json().await?;
                Ok(list.data.into_iter().map(|m| m.id).collect())
            }
        }
    }

    /// Whether a listed model name is the configured model.
    ///
    /// An untagged model name also matches any tag of it (`llama3` matches
    /// `llama3:latest` and `llama3:8b`, but not `llama3.2:3b`).
    pub fn is_configured_model(&self, listed: &str) -> bool {
        listed == self.model
            || (!self.model.contains(':')
                && listed
                    .strip_prefix(self.model.as_str())
                    .is_some_and(|tag| tag.starts_with(':')))
    }

    /// Single completion request, no retries
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(
            provider = self.provider.as_str(),
            model = %self.model,
            prompt_len = prompt.len(),
            "Sending LLM request"
        );

        let request = match self.provider {
            LlmProvider::Ollama => self
                .client
                .post(format!("{}/api/generate", self.base_url))
                .json(&GenerateRequest {
                    model: &self.model,
                    prompt,
                    stream: false,
                    options: GenerateOptions { temperature: self.temperature },
                }),
            LlmProvider::OpenAi => self
                .client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .json(&ChatRequest {
                    model: &self.model,
                    messages: vec![ChatMessage { role: "user", content: prompt }],
                    temperature: self.temperature,
                }),
        };

        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DocSentryError::LlmUnavailable(format!(
                "{} returned status {}: {}",
                self.provider.as_str(),
                status,
                body.trim()
            )));
        }

        let text = match self.provider {
            LlmProvider::Ollama => response.json::<GenerateResponse>().await?.response,
            LlmProvider::OpenAi => first_choice_content(response.json().await?).unwrap_or_default(),
        };

        debug!(response_len = text.len(), "Received LLM response");
        Ok(text)
    }

    /// Generate with retry logic
    pub async fn generate_with_retry(&self, prompt: &str, retries: u32) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=retries {
            if attempt > 0 {
                let delay = Duration::from_secs(2u64.saturating_pow(attempt - 1));
                warn!("Retrying LLM request in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.complete(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!("LLM request failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DocSentryError::LlmUnavailable("Unknown error".to_string())
        }))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_retry(prompt, self.retries).await
    }
}

/// Generator that refuses every prompt
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(DocSentryError::LlmDisabled)
    }
}
