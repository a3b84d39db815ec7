// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Analysis agents: entity extraction, classification and anomaly detection

pub mod anomaly;
pub mod classifier;
pub mod entities;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

pub use anomaly::{AnomalyDetector, Detection};
pub use classifier::{Classification, DocumentClassifier, DocumentType};
pub use entities::{EntityExtractor, EntityRecognizer, LlmRecognizer, PatternRecognizer};

/// Category of an extracted entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Org,
    Date,
    Money,
    Duration,
    Other(String),
}

impl EntityKind {
    pub fn label(&self) -> &str {
        match self {
            EntityKind::Org => "ORG",
            EntityKind::Date => "DATE",
            EntityKind::Money => "MONEY",
            EntityKind::Duration => "DURATION",
            EntityKind::Other(label) => label,
        }
    }
}

impl From<&str> for EntityKind {
    fn from(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "ORG" | "ORGANIZATION" | "ORGANISATION" | "COMPANY" => EntityKind::Org,
            "DATE" => EntityKind::Date,
            "MONEY" | "AMOUNT" => EntityKind::Money,
            "DURATION" => EntityKind::Duration,
            other => EntityKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EntityKind {
    fn from(label: String) -> Self {
        EntityKind::from(label.as_str())
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.label().to_string()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named entity found in a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub value: String,
}

impl Entity {
    pub fn new(kind: EntityKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.value)
    }
}

/// Where an agent's answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Llm,
    Fallback,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Llm => "llm",
            Source::Fallback => "fallback",
        }
    }
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// Substitute `{name}` placeholders in one pass.
///
/// Substituted values are never rescanned, so document text containing
/// braces is inserted verbatim. Unknown placeholders are left untouched.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Render entities as the JSON list handed to prompts
pub fn render_entities(entities: &[Entity]) -> String {
    serde_json::to_string(entities).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_labels() {
        assert_eq!(EntityKind::from("org"), EntityKind::Org);
        assert_eq!(EntityKind::from("Organization"), EntityKind::Org);
        assert_eq!(EntityKind::from("MONEY"), EntityKind::Money);
        assert_eq!(EntityKind::from("gpe"), EntityKind::Other("GPE".to_string()));
        assert_eq!(EntityKind::Other("GPE".to_string()).to_string(), "GPE");
    }

    #[test]
    fn test_entity_serializes_as_type_value() {
        let entity = Entity::new(EntityKind::Duration, "20 years");
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(json, r#"{"type":"DURATION","value":"20 years"}"#);

        let back: Entity = serde_json::from_str(r#"{"type":"date","value":"2023"}"#).unwrap();
        assert_eq!(back, Entity::new(EntityKind::Date, "2023"));
        assert_eq!(back.to_string(), "DATE: 2023");
    }

    #[test]
    fn test_fill_template_single_pass() {
        let out = fill_template(
            "Type ({doc_type}) Document:\n{document} {unknown}",
            &[("doc_type", "Invoice"), ("document", "literal {doc_type}")],
        );
        assert_eq!(out, "Type (Invoice) Document:\nliteral {doc_type} {unknown}");
    }
}
