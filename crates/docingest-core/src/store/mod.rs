//! Storage abstraction for ingestion.
//!
//! The orchestrator writes a document and its chunks through an
//! [`IngestTransaction`]: nothing it writes is visible until
//! [`commit`](IngestTransaction::commit), and
//! [`rollback`](IngestTransaction::rollback) discards all of it.
//! [`DocumentStore::record_failure`] is the one write made outside that
//! transaction, so a failed attempt stays observable after rollback.
//!
//! Implementations must be `Send + Sync` to be shared across concurrent
//! ingestions.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`begin`](DocumentStore::begin) | Open an ingestion transaction |
//! | [`record_failure`](DocumentStore::record_failure) | Upsert a `failed` document out of band |
//! | [`get_document`](DocumentStore::get_document) | Fetch one document |
//! | [`list_chunks`](DocumentStore::list_chunks) | Chunks of a document, by index |
//! | [`list_documents`](DocumentStore::list_documents) | Most recent documents |
//! | [`delete_document`](DocumentStore::delete_document) | Remove a document and its chunks |

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Chunk, Document, DocumentPatch};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn IngestTransaction>, StoreError>;

    /// Write `document` in its `failed` form with `reason`, committed
    /// independently of any open transaction.
    async fn record_failure(&self, document: &Document, reason: &str) -> Result<(), StoreError>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError>;

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>, StoreError>;

    async fn list_documents(&self, limit: i64) -> Result<Vec<Document>, StoreError>;

    /// Returns `false` when no such document existed.
    async fn delete_document(&self, id: &str) -> Result<bool, StoreError>;
}

/// One ingestion's unit of work.
#[async_trait]
pub trait IngestTransaction: Send {
    async fn create_document(&mut self, document: &Document) -> Result<(), StoreError>;

    /// Apply a partial update. Fails with [`StoreError::NotFound`] for an unknown id.
    async fn update_document(&mut self, id: &str, patch: &DocumentPatch) -> Result<(), StoreError>;

    async fn insert_chunks(&mut self, document_id: &str, chunks: &[Chunk]) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
