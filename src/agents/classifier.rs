// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Document type classification agent

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::{fill_template, Source};
use crate::config::AppConfig;
use crate::document::truncate_content;
use crate::llm::TextGenerator;

/// The fixed document taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "Power Purchase Agreement (PPA)")]
    PowerPurchaseAgreement,
    #[serde(rename = "Invoice")]
    Invoice,
    #[serde(rename = "Contract Summary")]
    ContractSummary,
}

static LABEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(power purchase|ppa|invoice|contract summary|summary)\b").unwrap()
});

static PPA_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:power purchase|ppa|offtaker|off-taker|mwh|mw|delivery point|energy output|commercial operation|contract capacity|renewable energy credits?)\b").unwrap()
});

static INVOICE_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:invoice|amount due|bill to|due date|invoice number|subtotal|total due|remit|billing period)\b").unwrap()
});

static SUMMARY_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:summary|overview|key terms|highlights|summarizes|abstract)\b").unwrap()
});

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [
        DocumentType::PowerPurchaseAgreement,
        DocumentType::Invoice,
        DocumentType::ContractSummary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::PowerPurchaseAgreement => "Power Purchase Agreement (PPA)",
            DocumentType::Invoice => "Invoice",
            DocumentType::ContractSummary => "Contract Summary",
        }
    }

    fn keywords(&self) -> &'static Regex {
        match self {
            DocumentType::PowerPurchaseAgreement => &*PPA_TERMS,
            DocumentType::Invoice => &*INVOICE_TERMS,
            DocumentType::ContractSummary => &*SUMMARY_TERMS,
        }
    }

    /// Closest taxonomy entry mentioned in a model reply; earliest mention wins
    pub fn from_label(reply: &str) -> Option<Self> {
        let found = LABEL_PATTERN.find(reply)?;
        match found.as_str().to_lowercase().as_str() {
            "power purchase" | "ppa" => Some(DocumentType::PowerPurchaseAgreement),
            "invoice" => Some(DocumentType::Invoice),
            _ => Some(DocumentType::ContractSummary),
        }
    }

    /// Keyword vote over the document text.
    ///
    /// Ties go to the earlier entry in [`DocumentType::ALL`]; a document with
    /// no keyword hits is a contract summary.
    pub fn guess_from_text(text: &str) -> Self {
        let mut best = (DocumentType::ContractSummary, 0usize);
        for doc_type in Self::ALL {
            let score = doc_type.keywords().find_iter(text).count();
            debug!("Keyword score for {}: {}", doc_type, score);
            if score > best.1 {
                best = (doc_type, score);
            }
        }
        best.0
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub doc_type: DocumentType,
    pub source: Source,
    /// Model reply, when one was received
    pub raw: Option<String>,
}

/// Agent that assigns one of the three document types
pub struct DocumentClassifier {
    generator: Arc<dyn TextGenerator>,
    prompt: String,
    max_chars: usize,
}

impl DocumentClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>, prompt: String, max_chars: usize) -> Self {
        Self {
            generator,
            prompt,
            max_chars,
        }
    }

    pub fn from_config(config: &AppConfig, generator: Arc<dyn TextGenerator>) -> Self {
        Self::new(
            generator,
            config.prompts.classifier.clone(),
            config.llm.max_content_chars,
        )
    }

    /// Classify the document
    pub async fn run(&self, text: &str) -> Classification {
        let prompt = fill_template(
            &self.prompt,
            &[("document", truncate_content(text, self.max_chars))],
        );

        let raw = match self.generator.generate(&prompt).await {
            Ok(reply) => {
                let reply = reply.trim().to_string();
                if let Some(doc_type) = DocumentType::from_label(&reply) {
                    return Classification {
                        doc_type,
                        source: Source::Llm,
                        raw: Some(reply),
                    };
                }
                warn!("Unrecognized document type from {}: {:?}", self.generator.name(), reply);
                Some(reply)
            }
            Err(e) => {
                warn!("Classification via {} failed: {}", self.generator.name(), e);
                None
            }
        };

        Classification {
            doc_type: DocumentType::guess_from_text(text),
            source: Source::Fallback,
            raw,
        }
    }
}
