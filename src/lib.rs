// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! DocSentry: multi-agent document analysis
//!
//! Extracts named entities, classifies the document type and flags anomalies
//! in renewable energy contracts, using a language model with rule-based
//! fallbacks for every step.

pub mod agents;
pub mod archive;
pub mod config;
pub mod document;
pub mod error;
pub mod llm;
pub mod pipeline;

pub use config::AppConfig;
pub use error::{DocSentryError, Result};
pub use pipeline::{AnalysisReport, Pipeline};
