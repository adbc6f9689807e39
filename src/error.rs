//! Ingestion failure taxonomy.
//!
//! Every component error is folded into [`IngestError`], which carries a
//! [`FailureCategory`] so callers can tell a bad upload (4xx) from bad
//! content (422) from an infrastructure fault (5xx).

use thiserror::Error;

use docingest_core::error::{ChunkingError, ExtractionError, StoreError, ValidationFailure};

use crate::saga::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The upload itself was unacceptable.
    Client,
    /// The PDF was accepted but its content could not be processed.
    Processing,
    /// Storage or database fault.
    System,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
    #[error("file storage failure: {0}")]
    File(#[from] std::io::Error),
    #[error("ingestion task aborted: {0}")]
    Aborted(String),
}

impl IngestError {
    pub fn category(&self) -> FailureCategory {
        match self {
            IngestError::Validation(_) => FailureCategory::Client,
            IngestError::Extraction(_) | IngestError::Chunking(_) => FailureCategory::Processing,
            IngestError::Store(_) | IngestError::File(_) | IngestError::Aborted(_) => {
                FailureCategory::System
            }
        }
    }

    /// Machine-readable code; validation failures report their sub-reason.
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Validation(v) => v.code(),
            IngestError::Extraction(_) => "extraction_failed",
            IngestError::Chunking(_) => "chunking_failed",
            IngestError::Store(_) | IngestError::File(_) => "storage_failure",
            IngestError::Aborted(_) => "internal",
        }
    }
}

/// A failed ingestion attempt.
///
/// `document_id` names the document the attempt was recorded under. Its
/// row is absent only if writing the failure marker itself failed.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct IngestFailure {
    pub document_id: Option<String>,
    /// Last stage the attempt completed before failing.
    pub stage: Option<Stage>,
    #[source]
    pub error: IngestError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            IngestError::from(ValidationFailure::Encrypted).category(),
            FailureCategory::Client
        );
        assert_eq!(
            IngestError::from(ChunkingError::EmptyText).category(),
            FailureCategory::Processing
        );
        assert_eq!(
            IngestError::from(StoreError::Backend("locked".into())).category(),
            FailureCategory::System
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(IngestError::from(io).category(), FailureCategory::System);
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            IngestError::from(ValidationFailure::TooLarge { size: 2, max: 1 }).code(),
            "too_large"
        );
        assert_eq!(
            IngestError::from(ChunkingError::NoSentences).code(),
            "chunking_failed"
        );
        assert_eq!(
            IngestError::from(StoreError::NotFound("x".into())).code(),
            "storage_failure"
        );
    }

    #[test]
    fn test_message_keeps_sub_reason() {
        let msg = IngestError::from(ValidationFailure::Encrypted).to_string();
        assert_eq!(msg, "validation failed: PDF is encrypted or password-protected");
    }
}
