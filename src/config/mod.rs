// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for DocSentry

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{DocSentryError, Result};

/// Upper bound on `llm.retries`; the backoff doubles per attempt
pub const MAX_RETRIES: u32 = 10;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Language model backend
    #[serde(default)]
    pub llm: LlmConfig,

    /// Prompt templates for the agents
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Entity extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Rule-based anomaly thresholds
    #[serde(default)]
    pub rules: RuleConfig,

    /// Report archive settings
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Which wire protocol the language model speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama `/api/generate`
    #[default]
    Ollama,
    /// Any `/v1/chat/completions` endpoint (OpenAI, Groq, LM Studio...)
    OpenAi,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_llm_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum characters of document text sent in a prompt
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_classifier_prompt")]
    pub classifier: String,
    #[serde(default = "default_anomaly_prompt")]
    pub anomaly: String,
    #[serde(default = "default_entities_prompt")]
    pub entities: String,
}

/// Entity recognizer backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerBackend {
    /// Regex patterns, no network
    #[default]
    Pattern,
    /// Ask the language model, fall back to patterns
    Llm,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub backend: RecognizerBackend,
    /// Entity labels kept from the recognizer (durations are always added)
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuleConfig {
    /// A `$` amount with at least this many digits is flagged as suspiciously high
    #[serde(default = "default_high_value_digits")]
    pub high_value_digits: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ArchiveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_archive_path")]
    pub path: String,
}

// Default value functions
fn default_true() -> bool { true }
fn default_llm_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "llama3.2:3b".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_retries() -> u32 { 2 }
fn default_temperature() -> f32 { 0.0 }
fn default_max_content_chars() -> usize { 12000 }
fn default_high_value_digits() -> usize { 9 }
fn default_archive_path() -> String { "docsentry_reports.jsonl".to_string() }

fn default_labels() -> Vec<String> {
    vec!["ORG", "DATE", "MONEY"].into_iter().map(String::from).collect()
}

fn default_classifier_prompt() -> String {
    "You are an expert in renewable energy legal and financial documents.\n\
     Classify the following document as one of the following types: \
     'Power Purchase Agreement (PPA)', 'Invoice', or 'Contract Summary'.\n\
     If unsure, choose the closest match.\n\
     Document:\n{document}\n\n\
     Type (choose one: Power Purchase Agreement (PPA), Invoice, Contract Summary):"
        .to_string()
}

fn default_anomaly_prompt() -> String {
    "You are an expert in renewable energy contracts and documents.\n\
     Given the document, its extracted entities, and its type ({doc_type}), \
     list any anomalies or missing critical fields.\n\
     Check for missing effective date, payment clause, unrealistic values, or other issues.\n\
     If none, say 'None'.\n\n\
     Document:\n{document}\n\nEntities:\n{entities}\n\nAnomalies:"
        .to_string()
}

fn default_entities_prompt() -> String {
    "Extract the named entities from the document below. \
     Return ONLY a JSON array of objects with keys \"type\" and \"value\", \
     where type is one of {labels}. Copy values exactly as they appear.\n\n\
     Document:\n{document}\n\nEntities:"
        .to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::default(),
            url: default_llm_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout(),
            retries: default_retries(),
            temperature: default_temperature(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            classifier: default_classifier_prompt(),
            anomaly: default_anomaly_prompt(),
            entities: default_entities_prompt(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backend: RecognizerBackend::default(),
            labels: default_labels(),
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            high_value_digits: default_high_value_digits(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_archive_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| DocSentryError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the environment.
    ///
    /// Supported variables:
    /// - `DOCSENTRY_API_KEY`, then `OPENAI_API_KEY`: fill `llm.api_key` when unset
    /// - `DOCSENTRY_LLM_URL`: replaces `llm.url`
    /// - `DOCSENTRY_LLM_MODEL`: replaces `llm.model`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.llm.api_key.is_none() {
            self.llm.api_key = non_empty("DOCSENTRY_API_KEY").or_else(|| non_empty("OPENAI_API_KEY"));
        }
        if let Some(url) = non_empty("DOCSENTRY_LLM_URL") {
            self.llm.url = url;
        }
        if let Some(model) = non_empty("DOCSENTRY_LLM_MODEL") {
            self.llm.model = model;
        }
    }

    /// Check the configuration for values the agents cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.llm.enabled
            && self.llm.provider == LlmProvider::OpenAi
            && self.llm.api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(DocSentryError::Config(
                "openai provider requires an API key (set OPENAI_API_KEY or llm.api_key)".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DocSentryError::Config(format!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(DocSentryError::Config("llm.timeout_secs must be positive".to_string()));
        }
        if self.llm.retries > MAX_RETRIES {
            return Err(DocSentryError::Config(format!(
                "llm.retries must be at most {}, got {}",
                MAX_RETRIES, self.llm.retries
            )));
        }
        if self.llm.max_content_chars == 0 {
            return Err(DocSentryError::Config("llm.max_content_chars must be positive".to_string()));
        }
        if self.rules.high_value_digits == 0 {
            return Err(DocSentryError::Config("rules.high_value_digits must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.extraction.labels, vec!["ORG", "DATE", "MONEY"]);
        assert!(config.prompts.anomaly.contains("{doc_type}"));
        assert!(config.prompts.classifier.contains("{document}"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "llm": { "provider": "openai", "model": "gpt-4o-mini" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.retries, 2);
        assert_eq!(config.rules.high_value_digits, 9);
        assert!(config.archive.enabled);
    }

    #[test]
    fn test_openai_requires_key() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::OpenAi;
        assert!(matches!(config.validate(), Err(DocSentryError::Config(_))));

        config.llm.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());

        config.llm.enabled = false;
        config.llm.api_key = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unusable_llm_limits() {
        let mut config = AppConfig::default();
        config.llm.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(DocSentryError::Config(_))));

        let mut config = AppConfig::default();
        config.llm.retries = MAX_RETRIES + 1;
        assert!(matches!(config.validate(), Err(DocSentryError::Config(_))));

        config.llm.retries = MAX_RETRIES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-openai"),
            ("DOCSENTRY_LLM_MODEL", "mistral"),
            ("DOCSENTRY_LLM_URL", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.url, "http://localhost:11434");
    }

    #[test]
    fn test_explicit_key_wins_over_env() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("from-file".to_string());
        config.apply_env_overrides(|k| (k == "OPENAI_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.llm.model = "phi3".to_string();
        config.archive.enabled = false;
        config.save(&path).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(!saved.contains("api_key"));

        let loaded: AppConfig = serde_json::from_str(&saved).unwrap();
        assert_eq!(loaded.llm.model, "phi3");
        assert!(!loaded.archive.enabled);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(DocSentryError::Config(_))));
    }
}
