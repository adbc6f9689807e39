//! Document lookup, listing and removal.
//!
//! Shared by the `docingest get|list|delete` commands and the
//! `GET /documents/{id}` endpoint.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde::Serialize;

use docingest_core::models::{Chunk, Document, DocumentStatus};
use docingest_core::store::DocumentStore;

use crate::config::Config;
use crate::db;
use crate::file_store::FileStore;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
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
    pub content_hash: String,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
    pub chunk_count: usize,
    pub chunks: Vec<ChunkResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkResponse {
    pub index: i64,
    pub text: String,
    pub char_start: i64,
    pub char_end: i64,
    pub token_count: i64,
    pub sentence_count: i64,
    pub hash: String,
}

impl From<&Chunk> for ChunkResponse {
    fn from(chunk: &Chunk) -> Self {
        Self {
            index: chunk.chunk_index,
            text: chunk.text.clone(),
            char_start: chunk.char_start,
            char_end: chunk.char_end,
            token_count: chunk.token_count,
            sentence_count: chunk.sentence_count,
            hash: chunk.hash.clone(),
        }
    }
}

impl DocumentResponse {
    fn new(doc: Document, chunks: &[Chunk]) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            original_filename: doc.original_filename,
            file_size: doc.file_size,
            mime_type: doc.mime_type,
            storage_path: doc.storage_path,
            page_count: doc.page_count,
            status: doc.status,
            error_message: doc.error_message,
            user_id: doc.user_id,
            content_hash: doc.content_hash,
            created_at: format_ts_iso(doc.created_at),
            updated_at: format_ts_iso(doc.updated_at),
            chunk_count: chunks.len(),
            chunks: chunks.iter().map(ChunkResponse::from).collect(),
        }
    }
}

/// Fetch a document and its chunks in index order.
pub async fn get_document(store: &dyn DocumentStore, id: &str) -> Result<Option<DocumentResponse>> {
    let Some(doc) = store.get_document(id).await? else {
        return Ok(None);
    };
    let chunks = store.list_chunks(id).await?;
    Ok(Some(DocumentResponse::new(doc, &chunks)))
}

/// Delete a document, its chunks, and its stored file.
///
/// Returns `false` if no such document exists.
pub async fn delete_document(store: &dyn DocumentStore, files: &FileStore, id: &str) -> Result<bool> {
    let Some(doc) = store.get_document(id).await? else {
        return Ok(false);
    };
    let deleted = store.delete_document(id).await?;
    if let Some(path) = doc.storage_path {
        if let Err(e) = files.delete(&path) {
            tracing::warn!(document_id = id, path = %path, error = %e, "Failed to remove stored file");
        }
    }
    Ok(deleted)
}

async fn open_store(config: &Config) -> Result<(sqlx::SqlitePool, Arc<SqliteStore>)> {
    let pool = db::connect(config).await?;
    Ok((pool.clone(), Arc::new(SqliteStore::new(pool))))
}

/// CLI entry point: print a document and its chunks.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let (pool, store) = open_store(config).await?;
    let doc = get_document(store.as_ref(), id).await;
    pool.close().await;

    let Some(doc) = doc? else {
        bail!("document not found: {}", id);
    };

    println!("--- Document ---");
    println!("id:            {}", doc.id);
    println!("title:         {}", doc.title);
    println!("filename:      {}", doc.original_filename);
    println!("size:          {} bytes", doc.file_size);
    println!("mime_type:     {}", doc.mime_type);
    println!("status:        {}", doc.status);
    if let Some(ref message) = doc.error_message {
        println!("error:         {}", message);
    }
    if let Some(pages) = doc.page_count {
        println!("pages:         {}", pages);
    }
    if let Some(ref path) = doc.storage_path {
        println!("storage_path:  {}", path);
    }
    if let Some(ref user) = doc.user_id {
        println!("user_id:       {}", user);
    }
    println!("content_hash:  {}", doc.content_hash);
    println!("created_at:    {}", doc.created_at);
    println!("updated_at:    {}", doc.updated_at);
    println!();

    println!("--- Chunks ({}) ---", doc.chunk_count);
    for chunk in &doc.chunks {
        println!(
            "[chunk {}] chars {}..{}, {} tokens, {} sentences",
            chunk.index, chunk.char_start, chunk.char_end, chunk.token_count, chunk.sentence_count
        );
        println!("{}", chunk.text);
        println!();
    }

    Ok(())
}

/// CLI entry point: list recent documents.
pub async fn run_list(config: &Config, limit: i64) -> Result<()> {
    let (pool, store) = open_store(config).await?;
    let docs = store.list_documents(limit).await;
    pool.close().await;
    let docs = docs?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!("{:<36}  {:<9}  {:>5}  {:<20}  TITLE", "ID", "STATUS", "PAGES", "CREATED");
    for doc in docs {
        println!(
            "{:<36}  {:<9}  {:>5}  {:<20}  {}",
            doc.id,
            doc.status.as_str(),
            doc.page_count.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            format_ts_iso(doc.created_at),
            doc.title
        );
    }
    Ok(())
}

/// CLI entry point: delete a document.
pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let (pool, store) = open_store(config).await?;
    let files = FileStore::new(&config.storage.root)?;
    let deleted = delete_document(store.as_ref(), &files, id).await;
    pool.close().await;

    if !deleted? {
        bail!("document not found: {}", id);
    }
    println!("Deleted {}", id);
    Ok(())
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
