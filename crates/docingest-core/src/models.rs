//! Core data models for the ingestion pipeline.
//!
//! A [`Document`] is one upload attempt. It is created in the `pending`
//! state, mutated in place as the pipeline advances, and ends either
//! `completed` (with its [`Chunk`]s persisted in the same transaction) or
//! `failed` (with a human-readable reason).
//!
//! Timestamps are Unix seconds; identifiers are UUID v4 strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Processing status of a [`Document`].
///
/// `Processing` is reserved for asynchronous pipelines; the synchronous
/// orchestrator moves straight from `Pending` to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(format!("unknown document status: '{}'", other)),
        }
    }
}

/// An uploaded PDF and its processing state.
///
/// `storage_path` and `page_count` stay `None` until extraction succeeds
/// and the bytes are written to the file store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub original_filename: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_path: Option<String>,
    pub page_count: Option<i64>,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub user_id: Option<String>,
    /// SHA-256 hex digest of the uploaded bytes.
    pub content_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    /// Build a fresh `pending` document for an upload.
    pub fn pending(
        title: impl Into<String>,
        original_filename: impl Into<String>,
        bytes: &[u8],
        mime_type: impl Into<String>,
        user_id: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            original_filename: original_filename.into(),
            file_size: bytes.len() as i64,
            mime_type: mime_type.into(),
            storage_path: None,
            page_count: None,
            status: DocumentStatus::Pending,
            error_message: None,
            user_id,
            content_hash: sha256_hex(bytes),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &DocumentPatch, now: i64) {
        if let Some(path) = &patch.storage_path {
            self.storage_path = Some(path.clone());
        }
        if let Some(pages) = patch.page_count {
            self.page_count = Some(pages);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(message) = &patch.error_message {
            self.error_message = Some(message.clone());
        }
        self.updated_at = now;
    }

    /// The terminal `failed` form of this document.
    ///
    /// Storage path and page count are cleared: the failed marker is
    /// written after compensation has removed any stored file.
    pub fn failed(&self, reason: &str, now: i64) -> Self {
        Self {
            storage_path: None,
            page_count: None,
            status: DocumentStatus::Failed,
            error_message: Some(reason.to_string()),
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Partial update for [`Document`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub storage_path: Option<String>,
    pub page_count: Option<i64>,
    pub status: Option<DocumentStatus>,
    pub error_message: Option<String>,
}

impl DocumentPatch {
    pub fn stored(storage_path: impl Into<String>, page_count: i64) -> Self {
        Self {
            storage_path: Some(storage_path.into()),
            page_count: Some(page_count),
            ..Self::default()
        }
    }

    pub fn status(status: DocumentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Per-chunk metadata produced by the chunk builder.
///
/// Offsets are Unicode scalar (char) offsets into the extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    pub token_count: usize,
    pub sentence_count: usize,
    pub char_start: usize,
    pub char_end: usize,
}

/// A persisted chunk of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub char_start: i64,
    pub char_end: i64,
    pub token_count: i64,
    pub sentence_count: i64,
    pub character_count: i64,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
    /// Embedding slot; never populated by the ingestion pipeline.
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn new(document_id: &str, chunk_index: usize, text: String, meta: ChunkMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            chunk_index: chunk_index as i64,
            hash: sha256_hex(text.as_bytes()),
            character_count: text.chars().count() as i64,
            text,
            char_start: meta.char_start as i64,
            char_end: meta.char_end as i64,
            token_count: meta.token_count as i64,
            sentence_count: meta.sentence_count as i64,
            embedding: None,
        }
    }
}

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
