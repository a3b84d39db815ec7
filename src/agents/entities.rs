// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Entity extraction agent
//!
//! Organizations, dates and money amounts come from an [`EntityRecognizer`]
//! backend. Contract durations (`20 years`, `6 months`) are always added by
//! a regex heuristic, in the order they appear.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::{fill_template, Entity, EntityKind};
use crate::config::{AppConfig, RecognizerBackend};
use crate::document::truncate_content;
use crate::llm::TextGenerator;
use crate::{DocSentryError, Result};

/// Backend that finds named entities in text
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Name of this recognizer
    fn name(&self) -> &'static str;

    /// Find entities, in document order
    async fn recognize(&self, text: &str) -> Result<Vec<Entity>>;
}

const MONTH: &str = r"(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\.?";

static ORG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(?:[A-Z][A-Za-z0-9&'\-]*|&)[ \t]+){1,5}(?:Corporation|Corp|Incorporated|Inc|LLC|L\.L\.C|Ltd|Limited|GmbH|PLC|plc|Company|Co|LLP|LP|Group|Holdings|Partners|Utilities|Authority)\b",
    )
    .unwrap()
});

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:{m}[ \t]+\d{{1,2}}(?:st|nd|rd|th)?,?[ \t]+\d{{4}}|\d{{1,2}}(?:st|nd|rd|th)?[ \t]+{m},?[ \t]+\d{{4}}|{m}[ \t]+\d{{4}}|\d{{4}}-\d{{2}}-\d{{2}}|\d{{1,2}}/\d{{1,2}}/\d{{2,4}}|Q[1-4][ \t]+\d{{4}})\b",
        m = MONTH
    ))
    .unwrap()
});

static MONEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:US\$|[$€£]|\b(?:USD|EUR|GBP)[ \t]?)-?\d+(?:,\d{3})*(?:\.\d+)?(?:[ \t]?(?i:million|billion|thousand|bn|m|k)\b)?|\b\d+(?:,\d{3})*(?:\.\d+)?(?:[ \t](?i:million|billion|thousand))?[ \t](?:dollars|euros|pounds|USD|EUR|GBP)\b",
    )
    .unwrap()
});

static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+\s*(?:years?|months?|days?))\b").unwrap());

/// Words that start sentences or clauses rather than company names
const CLAUSE_WORDS: &[&str] = &[
    "This", "The", "These", "That", "A", "An", "And", "Between", "By", "With", "From", "To",
    "For", "Of", "Each", "Such", "Said", "Whereas", "Dear",
];

/// Keep only the words after the last clause word of an organization match.
///
/// "Agreement Between Sunrise Wind LLC" becomes "Sunrise Wind LLC". Returns
/// the byte offset of the name within `raw` and the name itself, or `None`
/// when nothing but the corporate suffix is left.
fn clean_org(raw: &str) -> Option<(usize, String)> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    let start = words
        .iter()
        .rposition(|w| CLAUSE_WORDS.contains(w))
        .map_or(0, |i| i + 1);
    let mut name = &words[start..];
    if name.first() == Some(&"&") {
        name = &name[1..];
    }
    if name.len() < 2 {
        return None;
    }
    let offset = name[0].as_ptr() as usize - raw.as_ptr() as usize;
    Some((offset, name.join(" ")))
}

/// Contract durations, duplicates kept
pub fn durations(text: &str) -> Vec<Entity> {
    DURATION_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| Entity::new(EntityKind::Duration, m.as_str()))
        .collect()
}

/// Regex recognizer for organizations, dates and money amounts
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternRecognizer;

impl PatternRecognizer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core, shared with the LLM recognizer's fallback
    pub fn extract(&self, text: &str) -> Vec<Entity> {
        let mut spans: Vec<(usize, usize, Entity)> = Vec::new();

        for m in ORG_PATTERN.find_iter(text) {
            if let Some((offset, name)) = clean_org(m.as_str()) {
                spans.push((m.start() + offset, m.end(), Entity::new(EntityKind::Org, name)));
            }
        }
        for m in DATE_PATTERN.find_iter(text) {
            spans.push((m.start(), m.end(), Entity::new(EntityKind::Date, m.as_str())));
        }
        for m in MONEY_PATTERN.find_iter(text) {
            spans.push((m.start(), m.end(), Entity::new(EntityKind::Money, m.as_str().trim())));
        }

        // Earliest first, longest wins on a tie
        spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut seen = HashSet::new();
        let mut covered_until = 0;
        let mut entities = Vec::new();
        for (start, end, entity) in spans {
            if start < covered_until {
                continue;
            }
            covered_until = end;
            if seen.insert(entity.clone()) {
                entities.push(entity);
            }
        }
        entities
    }
}

#[async_trait]
impl EntityRecognizer for PatternRecognizer {
    fn name(&self) -> &'static str {
        "pattern"
    }

    async fn recognize(&self, text: &str) -> Result<Vec<Entity>> {
        Ok(self.extract(text))
    }
}

#[derive(Deserialize)]
struct RawEntity {
    #[serde(rename = "type", alias = "label")]
    kind: String,
    #[serde(alias = "text")]
    value: String,
}

/// Parse the first JSON array of entities in a model reply.
///
/// Text after the array is ignored, so trailing notes such as "see clause
/// [3]" do not spoil an otherwise valid answer.
fn parse_entity_reply(reply: &str) -> Result<Vec<Entity>> {
    let mut first_error = None;

    for (start, _) in reply.match_indices('[') {
        let mut stream =
            serde_json::Deserializer::from_str(&reply[start..]).into_iter::<Vec<RawEntity>>();
        match stream.next() {
            Some(Ok(raw)) => {
                return Ok(raw
                    .into_iter()
                    .filter(|r| !r.value.trim().is_empty())
                    .map(|r| Entity::new(EntityKind::from(r.kind), r.value.trim()))
                    .collect())
            }
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            None => {}
        }
    }

    Err(match first_error {
        Some(e) => e.into(),
        None => DocSentryError::Analysis("No JSON array in entity reply".to_string()),
    })
}

/// Recognizer that asks the language model, falling back to patterns
pub struct LlmRecognizer {
    generator: Arc<dyn TextGenerator>,
    prompt: String,
    labels: Vec<String>,
    max_chars: usize,
    fallback: PatternRecognizer,
}

impl LlmRecognizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        prompt: String,
        labels: Vec<String>,
        max_chars: usize,
    ) -> Self {
        Self {
            generator,
            prompt,
            labels,
            max_chars,
            fallback: PatternRecognizer::new(),
        }
    }

    async fn ask(&self, text: &str) -> Result<Vec<Entity>> {
        let labels = self.labels.join(", ");
        let prompt = fill_template(
            &self.prompt,
            &[
                ("document", truncate_content(text, self.max_chars)),
                ("labels", labels.as_str()),
            ],
        );
        let reply = self.generator.generate(&prompt).await?;
        let mut entities = parse_entity_reply(&reply)?;

        entities.retain(|e| {
            let grounded = text.contains(&e.value);
            if !grounded {
                debug!("Dropping entity not present in document: {}", e);
            }
            grounded
        });

        let mut seen = HashSet::new();
        entities.retain(|e| seen.insert(e.clone()));
        Ok(entities)
    }
}

#[async_trait]
impl EntityRecognizer for LlmRecognizer {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn recognize(&self, text: &str) -> Result<Vec<Entity>> {
        match self.ask(text).await {
            Ok(entities) => Ok(entities),
            Err(e) => {
                warn!("LLM entity recognition failed, using patterns: {}", e);
                Ok(self.fallback.extract(text))
            }
        }
    }
}

/// Agent that extracts organizations, dates, money amounts and durations
pub struct EntityExtractor {
    recognizer: Box<dyn EntityRecognizer>,
    labels: Vec<EntityKind>,
}

impl EntityExtractor {
    pub fn new(recognizer: Box<dyn EntityRecognizer>, labels: &[String]) -> Self {
        Self {
            recognizer,
            labels: labels.iter().map(|l| EntityKind::from(l.as_str())).collect(),
        }
    }

    /// Build the extractor with the configured recognizer backend
    pub fn from_config(config: &AppConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let recognizer: Box<dyn EntityRecognizer> = match config.extraction.backend {
            RecognizerBackend::Pattern => Box::new(PatternRecognizer::new()),
            RecognizerBackend::Llm => Box::new(LlmRecognizer::new(
                generator,
                config.prompts.entities.clone(),
                config.extraction.labels.clone(),
                config.llm.max_content_chars,
            )),
        };
        Self::new(recognizer, &config.extraction.labels)
    }

    pub fn recognizer_name(&self) -> &'static str {
        self.recognizer.name()
    }

    /// Extract entities from the document
    pub async fn run(&self, text: &str) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self
            .recognizer
            .recognize(text)
            .await?
            .into_iter()
            .filter(|e| self.labels.contains(&e.kind))
            .collect();

        entities.extend(durations(text));
        Ok(entities)
    }
}
