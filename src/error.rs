// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for DocSentry

use thiserror::Error;

/// Result type alias for DocSentry operations
pub type Result<T> = std::result::Result<T, DocSentryError>;

/// DocSentry error types
#[derive(Error, Debug)]
pub enum DocSentryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("LLM not available: {0}")]
    LlmUnavailable(String),

    #[error("LLM is disabled")]
    LlmDisabled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("PDF error: {0}")]
    Pdf(String),
}
