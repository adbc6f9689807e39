//! SQLite-backed [`DocumentStore`] implementation.
//!
//! An ingestion transaction wraps a `sqlx` transaction on the pool; if the
//! handle is dropped without `commit`, sqlx rolls it back. Failure
//! records go through the pool directly so they commit on their own.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

use docingest_core::embedding::{blob_to_vec, vec_to_blob};
use docingest_core::error::StoreError;
use docingest_core::models::{Chunk, Document, DocumentPatch};
use docingest_core::store::{DocumentStore, IngestTransaction};

/// Rows per multi-row chunk INSERT. 11 columns each keeps a statement
/// under SQLite's historical 999-parameter limit.
const CHUNK_INSERT_BATCH: usize = 64;

const DOCUMENT_COLUMNS: &str = "id, title, original_filename, file_size, mime_type, storage_path, \
     page_count, status, error_message, user_id, content_hash, created_at, updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn document_from_row(row: &SqliteRow) -> Result<Document, StoreError> {
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        title: row.get("title"),
        original_filename: row.get("original_filename"),
        file_size: row.get("file_size"),
        mime_type: row.get("mime_type"),
        storage_path: row.get("storage_path"),
        page_count: row.get("page_count"),
        status: status.parse().map_err(StoreError::Backend)?,
        error_message: row.get("error_message"),
        user_id: row.get("user_id"),
        content_hash: row.get("content_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn chunk_from_row(row: &SqliteRow) -> Chunk {
    let embedding: Option<Vec<u8>> = row.get("embedding");
    Chunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        char_start: row.get("char_start"),
        char_end: row.get("char_end"),
        token_count: row.get("token_count"),
        sentence_count: row.get("sentence_count"),
        character_count: row.get("character_count"),
        hash: row.get("hash"),
        embedding: embedding.map(|blob| blob_to_vec(&blob)),
    }
}

/// A `sqlx` transaction scoped to one ingestion.
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl IngestTransaction for SqliteTransaction {
    async fn create_document(&mut self, document: &Document) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO documents ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            DOCUMENT_COLUMNS
        ))
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.original_filename)
        .bind(document.file_size)
        .bind(&document.mime_type)
        .bind(&document.storage_path)
        .bind(document.page_count)
        .bind(document.status.as_str())
        .bind(&document.error_message)
        .bind(&document.user_id)
        .bind(&document.content_hash)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn update_document(&mut self, id: &str, patch: &DocumentPatch) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET
                storage_path = COALESCE(?, storage_path),
                page_count = COALESCE(?, page_count),
                status = COALESCE(?, status),
                error_message = COALESCE(?, error_message),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&patch.storage_path)
        .bind(patch.page_count)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.error_message)
        .bind(now())
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn insert_chunks(&mut self, document_id: &str, chunks: &[Chunk]) -> Result<(), StoreError> {
        for batch in chunks.chunks(CHUNK_INSERT_BATCH) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO chunks (id, document_id, chunk_index, text, char_start, char_end, \
                 token_count, sentence_count, character_count, hash, embedding) ",
            );
            qb.push_values(batch, |mut row, c| {
                row.push_bind(&c.id)
                    .push_bind(document_id)
                    .push_bind(c.chunk_index)
                    .push_bind(&c.text)
                    .push_bind(c.char_start)
                    .push_bind(c.char_end)
                    .push_bind(c.token_count)
                    .push_bind(c.sentence_count)
                    .push_bind(c.character_count)
                    .push_bind(&c.hash)
                    .push_bind(c.embedding.as_deref().map(vec_to_blob));
            });
            qb.build()
                .execute(&mut *self.tx)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(backend)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(backend)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn IngestTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(backend)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn record_failure(&self, document: &Document, reason: &str) -> Result<(), StoreError> {
        let failed = document.failed(reason, now());
        sqlx::query(&format!(
            r#"
            INSERT INTO documents ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                error_message = excluded.error_message,
                storage_path = NULL,
                page_count = NULL,
                updated_at = excluded.updated_at
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(&failed.id)
        .bind(&failed.title)
        .bind(&failed.original_filename)
        .bind(failed.file_size)
        .bind(&failed.mime_type)
        .bind(&failed.storage_path)
        .bind(failed.page_count)
        .bind(failed.status.as_str())
        .bind(&failed.error_message)
        .bind(&failed.user_id)
        .bind(&failed.content_hash)
        .bind(failed.created_at)
        .bind(failed.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, text, char_start, char_end, token_count, \
             sentence_count, character_count, hash, embedding \
             FROM chunks WHERE document_id = ? ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.iter().map(chunk_from_row).collect())
    }

    async fn list_documents(&self, limit: i64) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY created_at DESC, id ASC LIMIT ?",
            DOCUMENT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(document_from_row).collect()
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        // Chunks go with the document via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }
}
