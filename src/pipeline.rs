// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Multi-agent pipeline: extraction, then classification, then anomaly detection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::agents::{
    AnomalyDetector, DocumentClassifier, DocumentType, Entity, EntityExtractor, Source,
};
use crate::llm::{DisabledGenerator, LlmClient, TextGenerator};
use crate::{AppConfig, Result};

/// Merged output of the three agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub entities: Vec<Entity>,
    pub doc_type: DocumentType,
    pub anomalies: Vec<String>,
    pub classification_source: Source,
    pub anomaly_source: Source,
}

/// Orchestrates the entity, classification and anomaly agents
pub struct Pipeline {
    extractor: EntityExtractor,
    classifier: DocumentClassifier,
    detector: AnomalyDetector,
    generator_name: String,
}

impl Pipeline {
    /// Build all agents around a shared text generator
    pub fn new(config: &AppConfig, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        Ok(Self {
            extractor: EntityExtractor::from_config(config, generator.clone()),
            classifier: DocumentClassifier::from_config(config, generator.clone()),
            detector: AnomalyDetector::from_config(config, generator.clone())?,
            generator_name: generator.name().to_string(),
        })
    }

    /// Build the pipeline with the configured LLM, or none when disabled
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let generator: Arc<dyn TextGenerator> = if config.llm.enabled {
            Arc::new(LlmClient::new(&config.llm)?)
        } else {
            Arc::new(DisabledGenerator)
        };
        Self::new(config, generator)
    }

    pub fn generator_name(&self) -> &str {
        &self.generator_name
    }

    /// Run the document through all three agents in order
    pub async fn run(&self, document: &str) -> Result<AnalysisReport> {
        info!("Starting NER agent ({} recognizer)...", self.extractor.recognizer_name());
        let entities = self.extractor.run(document).await?;
        info!(
            "Entities extracted: [{}]",
            entities.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
        );

        info!("Starting Document Classifier agent...");
        let classification = self.classifier.run(document).await;
        info!(
            "Document classified as: {} (via {})",
            classification.doc_type,
            classification.source.as_str()
        );

        info!("Starting Anomaly Detector agent...");
        let detection = self
            .detector
            .run(document, &entities, classification.doc_type)
            .await;
        info!(
            "Anomalies detected: {:?} (via {})",
            detection.anomalies,
            detection.source.as_str()
        );

        Ok(AnalysisReport {
            entities,
            doc_type: classification.doc_type,
            anomalies: detection.anomalies,
            classification_source: classification.source,
            anomaly_source: detection.source,
        })
    }
}

/// Render the human-readable summary of a report
pub fn summary_report(report: &AnalysisReport) -> String {
    let mut lines = vec!["==== Document Analysis Summary ====".to_string()];
    lines.push(format!("Document Type: {}", report.doc_type));

    lines.push("\nNamed Entities:".to_string());
    for entity in &report.entities {
        lines.push(format!("- {}", entity));
    }

    lines.push("\nAnomalies or Missing Info:".to_string());
    if report.anomalies.is_empty() {
        lines.push("None".to_string());
    } else {
        for anomaly in &report.anomalies {
            lines.push(format!("- {}", anomaly));
        }
    }

    lines.join("\n")
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&summary_report(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::EntityKind;
    use crate::document::SAMPLE_DOCUMENT;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies in call order, recording every prompt
    struct Scripted {
        replies: Mutex<Vec<&'static str>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().copied().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.replies.lock().unwrap().pop().unwrap_or("None").to_string())
        }
    }

    #[tokio::test]
    async fn test_offline_sample_report() {
        let mut config = AppConfig::default();
        config.llm.enabled = false;
        let pipeline = Pipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.generator_name(), "disabled");

        let report = pipeline.run(SAMPLE_DOCUMENT).await.unwrap();
        assert_eq!(report.doc_type, DocumentType::PowerPurchaseAgreement);
        assert_eq!(report.classification_source, Source::Fallback);
        assert_eq!(report.anomaly_source, Source::Fallback);
        assert_eq!(report.anomalies, vec!["Missing payment clause or amount."]);

        let expected = "\
==== Document Analysis Summary ====
Document Type: Power Purchase Agreement (PPA)

Named Entities:
- DATE: January 1, 2023
- ORG: Green Energy Corp
- ORG: Solar Solutions Inc
- MONEY: $50 million
- DURATION: 20 years

Anomalies or Missing Info:
- Missing payment clause or amount.";
        assert_eq!(summary_report(&report), expected);
    }

    #[tokio::test]
    async fn test_agents_run_in_order() {
        let generator = Scripted::new(&["Contract Summary", "- No termination date"]);
        let pipeline = Pipeline::new(&AppConfig::default(), generator.clone()).unwrap();

        let report = pipeline.run(SAMPLE_DOCUMENT).await.unwrap();
        assert_eq!(report.doc_type, DocumentType::ContractSummary);
        assert_eq!(report.classification_source, Source::Llm);
        assert_eq!(report.anomalies, vec!["No termination date"]);
        assert_eq!(report.anomaly_source, Source::Llm);

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Classify the following document"));
        assert!(prompts[1].contains("its type (Contract Summary)"));
        assert!(prompts[1].contains(r#"{"type":"DURATION","value":"20 years"}"#));
    }

    #[tokio::test]
    async fn test_llm_entity_backend_uses_generator_first() {
        let mut config = AppConfig::default();
        config.extraction.backend = crate::config::RecognizerBackend::Llm;
        let generator = Scripted::new(&[
            r#"[{"type":"ORG","value":"Solar Solutions Inc"}]"#,
            "Power Purchase Agreement (PPA)",
            "None",
        ]);
        let pipeline = Pipeline::new(&config, generator.clone()).unwrap();

        let report = pipeline.run(SAMPLE_DOCUMENT).await.unwrap();
        assert_eq!(
            report.entities,
            vec![
                Entity::new(EntityKind::Org, "Solar Solutions Inc"),
                Entity::new(EntityKind::Duration, "20 years"),
            ]
        );
        assert_eq!(report.anomaly_source, Source::Fallback);
        assert_eq!(
            report.anomalies,
            vec!["Missing effective date.", "Missing payment clause or amount."]
        );
        assert_eq!(generator.prompts.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_summary_without_findings() {
        let report = AnalysisReport {
            entities: vec![],
            doc_type: DocumentType::Invoice,
            anomalies: vec![],
            classification_source: Source::Llm,
            anomaly_source: Source::Llm,
        };
        assert_eq!(
            report.to_string(),
            "==== Document Analysis Summary ====\nDocument Type: Invoice\n\nNamed Entities:\n\nAnomalies or Missing Info:\nNone"
        );
    }

    #[test]
    fn test_report_json_shape() {
        let report = AnalysisReport {
            entities: vec![Entity::new(EntityKind::Money, "$5")],
            doc_type: DocumentType::Invoice,
            anomalies: vec!["Missing effective date.".to_string()],
            classification_source: Source::Fallback,
            anomaly_source: Source::Fallback,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["doc_type"], "Invoice");
        assert_eq!(json["entities"][0]["type"], "MONEY");
        assert_eq!(json["classification_source"], "fallback");
    }
}
