//! Component error types.
//!
//! Each pipeline stage returns its own tagged error; the orchestrator in
//! the app crate maps them onto a single failure taxonomy.

use thiserror::Error;

/// Outcome of a failed PDF validation. Always user-actionable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("file is empty")]
    Empty,
    #[error("file is {size} bytes, exceeding the {max} byte limit")]
    TooLarge { size: u64, max: u64 },
    #[error("invalid file type: {0}")]
    InvalidType(String),
    #[error("corrupted PDF: {0}")]
    Corrupted(String),
    #[error("PDF is encrypted or password-protected")]
    Encrypted,
}

impl ValidationFailure {
    /// Stable machine-readable sub-reason.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationFailure::Empty => "empty",
            ValidationFailure::TooLarge { .. } => "too_large",
            ValidationFailure::InvalidType(_) => "invalid_type",
            ValidationFailure::Corrupted(_) => "corrupted",
            ValidationFailure::Encrypted => "encrypted",
        }
    }
}

/// Text could not be obtained from a structurally valid PDF.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("text extraction failed on all {pages} pages: {reason}")]
    Unreadable { pages: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    #[error("extracted text is empty")]
    EmptyText,
    #[error("segmentation produced no sentences")]
    NoSentences,
    #[error("invalid chunking configuration: {0}")]
    InvalidConfig(String),
    #[error("tokenizer '{name}' unavailable: {reason}")]
    Tokenizer { name: String, reason: String },
}

/// Persistence-layer failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("store backend error: {0}")]
    Backend(String),
}
