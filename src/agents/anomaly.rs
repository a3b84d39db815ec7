// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Anomaly detection agent

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use super::{fill_template, render_entities, DocumentType, Entity, EntityKind, Source};
use crate::config::AppConfig;
use crate::document::truncate_content;
use crate::llm::TextGenerator;
use crate::{DocSentryError, Result};

static PAYMENT_TERMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)payment|payable|amount due|invoice").unwrap());

static UNREALISTIC_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\$0|zero|negative").unwrap());

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s+").unwrap());

/// Outcome of anomaly detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub anomalies: Vec<String>,
    pub source: Source,
}

/// Agent that flags missing fields and implausible values
pub struct AnomalyDetector {
    generator: Arc<dyn TextGenerator>,
    prompt: String,
    max_chars: usize,
    high_value: Regex,
}

/// `none`, in any case, with an optional trailing period
fn is_none_reply(line: &str) -> bool {
    let line = line.trim();
    line.strip_suffix('.').unwrap_or(line).eq_ignore_ascii_case("none")
}

/// Split a model reply into one anomaly per line
pub fn parse_anomaly_reply(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| LIST_MARKER.replace(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty() && !is_none_reply(line))
        .collect()
}

impl AnomalyDetector {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        prompt: String,
        max_chars: usize,
        high_value_digits: usize,
    ) -> Result<Self> {
        let high_value = Regex::new(&format!(r"\$\s*\d{{{},}}", high_value_digits))
            .map_err(|e| DocSentryError::Config(format!("Invalid high value rule: {}", e)))?;

        Ok(Self {
            generator,
            prompt,
            max_chars,
            high_value,
        })
    }

    pub fn from_config(config: &AppConfig, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        Self::new(
            generator,
            config.prompts.anomaly.clone(),
            config.llm.max_content_chars,
            config.rules.high_value_digits,
        )
    }

    /// Rule-based checks used when the model has nothing to say
    pub fn rule_based_check(&self, text: &str, entities: &[Entity]) -> Vec<String> {
        let mut anomalies = Vec::new();

        if !entities.iter().any(|e| e.kind == EntityKind::Date) {
            anomalies.push("Missing effective date.".to_string());
        }

        if !PAYMENT_TERMS.is_match(text) {
            anomalies.push("Missing payment clause or amount.".to_string());
        }

        for entity in entities.iter().filter(|e| e.kind == EntityKind::Money) {
            if UNREALISTIC_VALUE.is_match(&entity.value) {
                anomalies.push(format!("Unrealistic value: {}", entity.value));
            }
            // Digits only, without thousands separators
            if self.high_value.is_match(&entity.value.replace(',', "")) {
                anomalies.push(format!("Suspiciously high value: {}", entity.value));
            }
        }

        anomalies
    }

    /// Detect anomalies with the model, falling back to the rules
    pub async fn run(&self, text: &str, entities: &[Entity], doc_type: DocumentType) -> Detection {
        let rendered = render_entities(entities);
        let prompt = fill_template(
            &self.prompt,
            &[
                ("document", truncate_content(text, self.max_chars)),
                ("entities", rendered.as_str()),
                ("doc_type", doc_type.label()),
            ],
        );

        match self.generator.generate(&prompt).await {
            Ok(reply) if !reply.trim().is_empty() && !is_none_reply(&reply) => {
                let anomalies = parse_anomaly_reply(&reply);
                if !anomalies.is_empty() {
                    return Detection {
                        anomalies,
                        source: Source::Llm,
                    };
                }
                debug!("Model reply held no anomalies after cleanup");
            }
            Ok(_) => info!("Model reported no anomalies, running rule-based checks"),
            Err(e) => warn!("Anomaly detection via {} failed: {}", self.generator.name(), e),
        }

        Detection {
            anomalies: self.rule_based_check(text, entities),
            source: Source::Fallback,
        }
    }
}
