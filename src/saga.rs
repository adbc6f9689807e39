//! Compensation log for one ingestion attempt.
//!
//! Each side effect that outlives a database rollback registers its
//! undo action here as soon as it succeeds. On failure, [`Saga::abort`]
//! runs the cleanup protocol in a fixed order:
//!
//! 1. compensations, newest first (stored files are deleted);
//! 2. rollback of the open transaction, if it was not consumed;
//! 3. an out-of-band write marking the document `failed`.
//!
//! Every step is best-effort. Cleanup errors are logged and reported in
//! the [`CleanupReport`], never returned in place of the original error.

use std::fmt;

use docingest_core::models::Document;
use docingest_core::store::{DocumentStore, IngestTransaction};

use crate::error::IngestError;
use crate::file_store::FileStore;

/// Pipeline position of an ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Created,
    Validated,
    Extracted,
    Stored,
    Chunked,
    Persisted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Created => "created",
            Stage::Validated => "validated",
            Stage::Extracted => "extracted",
            Stage::Stored => "stored",
            Stage::Chunked => "chunked",
            Stage::Persisted => "persisted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Undo action for a completed side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    DeleteStoredFile(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_deleted: usize,
    pub rolled_back: bool,
    pub failure_recorded: bool,
    pub errors: Vec<String>,
}

#[derive(Debug)]
pub struct Saga {
    document_id: String,
    stage: Option<Stage>,
    compensations: Vec<Compensation>,
}

impl Saga {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            stage: None,
            compensations: Vec::new(),
        }
    }

    /// Last stage reached, `None` before the attempt started.
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn advance(&mut self, stage: Stage) {
        tracing::info!(document_id = %self.document_id, stage = %stage, "Ingestion stage reached");
        self.stage = Some(stage);
    }

    pub fn register(&mut self, compensation: Compensation) {
        tracing::debug!(document_id = %self.document_id, ?compensation, "Compensation registered");
        self.compensations.push(compensation);
    }

    pub fn compensations(&self) -> &[Compensation] {
        &self.compensations
    }

    /// Undo this attempt and record `document` as failed.
    pub async fn abort(
        self,
        files: &FileStore,
        store: &dyn DocumentStore,
        tx: Option<Box<dyn IngestTransaction>>,
        document: &Document,
        error: &IngestError,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        let stage = self.stage.map(|s| s.as_str()).unwrap_or("none");
        tracing::warn!(
            document_id = %self.document_id,
            stage,
            code = error.code(),
            error = %error,
            "Ingestion failed; running cleanup"
        );

        for compensation in self.compensations.into_iter().rev() {
            match compensation {
                Compensation::DeleteStoredFile(path) => match files.delete(&path) {
                    Ok(()) => report.files_deleted += 1,
                    Err(e) => {
                        tracing::error!(document_id = %self.document_id, path = %path, error = %e, "Failed to delete stored file");
                        report.errors.push(format!("delete {}: {}", path, e));
                    }
                },
            }
        }

        if let Some(tx) = tx {
            match tx.rollback().await {
                Ok(()) => report.rolled_back = true,
                Err(e) => {
                    tracing::error!(document_id = %self.document_id, error = %e, "Transaction rollback failed");
                    report.errors.push(format!("rollback: {}", e));
                }
            }
        }

        match store.record_failure(document, &error.to_string()).await {
            Ok(()) => report.failure_recorded = true,
            Err(e) => {
                tracing::error!(document_id = %self.document_id, error = %e, "Failed to record document failure");
                report.errors.push(format!("record failure: {}", e));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docingest_core::error::{StoreError, ValidationFailure};
    use docingest_core::models::DocumentStatus;
    use docingest_core::store::memory::{FailPoint, MemoryStore};
    use std::path::Path;
    use tempfile::TempDir;

    fn document() -> Document {
        Document::pending("t", "t.pdf", b"%PDF-", "application/pdf", None, 1)
    }

    #[tokio::test]
    async fn test_abort_runs_full_protocol() {
        let dir = TempDir::new().unwrap();
        let files = FileStore::new(dir.path()).unwrap();
        let store = MemoryStore::new();
        let doc = document();

        let mut tx = store.begin().await.unwrap();
        tx.create_document(&doc).await.unwrap();

        let mut saga = Saga::new(&doc.id);
        saga.advance(Stage::Created);
        let path = files.save(b"%PDF-1.4", "t.pdf").unwrap();
        saga.register(Compensation::DeleteStoredFile(path.clone()));
        saga.advance(Stage::Stored);

        let error = IngestError::from(StoreError::Backend("disk I/O error".into()));
        let report = saga.abort(&files, &store, Some(tx), &doc, &error).await;

        assert_eq!(report.files_deleted, 1);
        assert!(report.rolled_back);
        assert!(report.failure_recorded);
        assert!(report.errors.is_empty());
        assert!(!Path::new(&path).exists());
        assert_eq!(store.rollback_count(), 1);

        let stored = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert!(stored.error_message.unwrap().contains("disk I/O error"));
    }

    #[tokio::test]
    async fn test_cleanup_errors_are_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let files = FileStore::new(dir.path()).unwrap();
        let store = MemoryStore::new();
        store.fail_on(FailPoint::Rollback);
        store.fail_on(FailPoint::RecordFailure);
        let doc = document();
        let tx = store.begin().await.unwrap();

        let error = IngestError::from(ValidationFailure::Empty);
        let report = Saga::new(&doc.id)
            .abort(&files, &store, Some(tx), &doc, &error)
            .await;

        assert!(!report.rolled_back);
        assert!(!report.failure_recorded);
        assert_eq!(report.errors.len(), 2);
        assert!(store.get_document(&doc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_without_transaction_still_records_failure() {
        let dir = TempDir::new().unwrap();
        let files = FileStore::new(dir.path()).unwrap();
        let store = MemoryStore::new();
        let doc = document();

        let error = IngestError::from(StoreError::Backend("commit failed".into()));
        let report = Saga::new(&doc.id)
            .abort(&files, &store, None, &doc, &error)
            .await;

        assert!(!report.rolled_back);
        assert!(report.failure_recorded);
        assert_eq!(store.rollback_count(), 0);
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(Stage::Created < Stage::Validated);
        assert!(Stage::Chunked < Stage::Persisted);
        let mut saga = Saga::new("doc");
        assert_eq!(saga.stage(), None);
        saga.advance(Stage::Extracted);
        assert_eq!(saga.stage(), Some(Stage::Extracted));
    }
}
