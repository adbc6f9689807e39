//! Ingestion orchestrator.
//!
//! Drives one upload through validation, extraction, file storage,
//! segmentation and chunking inside a single store transaction:
//!
//! ```text
//! created ─▶ validated ─▶ extracted ─▶ stored ─▶ chunked ─▶ persisted
//!    │            │            │          │          │
//!    └────────────┴────────────┴──────────┴──────────┴─▶ failed
//! ```
//!
//! Validation and extraction happen first, outside any transaction. The
//! transaction then spans the pending document row, the storage metadata
//! update, the chunk batch and the `completed` transition. Any failure
//! hands the attempt to [`Saga::abort`], which deletes stored files,
//! rolls back, and records the document as `failed` out of band.
//!
//! CPU-bound stages run on the blocking pool so concurrent ingestions
//! do not stall the async runtime.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use docingest_core::chunker::{ChunkBuilder, ChunkDraft};
use docingest_core::extract::{ExtractedText, TextExtractor};
use docingest_core::models::{Chunk, Document, DocumentPatch, DocumentStatus};
use docingest_core::segment::Segmenter;
use docingest_core::store::{DocumentStore, IngestTransaction};
use docingest_core::validate::{PdfValidator, MIME_PDF};

use crate::config::Config;
use crate::db;
use crate::error::{IngestError, IngestFailure};
use crate::file_store::FileStore;
use crate::saga::{Compensation, Saga, Stage};
use crate::sqlite_store::SqliteStore;

const FALLBACK_FILENAME: &str = "document.pdf";

/// One upload to ingest.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub filename: String,
    /// Declared media type, as sent by the client.
    pub mime_type: String,
    pub title: Option<String>,
    pub user_id: Option<String>,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub document_id: String,
    pub status: DocumentStatus,
    pub chunk_count: usize,
    pub page_count: usize,
}

/// Stateless processing stages, shared read-only across ingestions.
struct Pipeline {
    validator: PdfValidator,
    extractor: TextExtractor,
    segmenter: Arc<Segmenter>,
    chunker: ChunkBuilder,
}

/// Validation or extraction outcome, tagged with how far it got.
enum Prepared {
    Rejected(IngestError),
    ExtractFailed(IngestError),
    Extracted(ExtractedText),
}

impl Pipeline {
    fn prepare(&self, bytes: &[u8], mime: &str) -> Prepared {
        let pdf = match self.validator.validate(bytes, mime) {
            Ok(pdf) => pdf,
            Err(e) => return Prepared::Rejected(e.into()),
        };
        tracing::debug!(pages = pdf.page_count(), "PDF validated");
        match self.extractor.extract(pdf) {
            Ok(extracted) => Prepared::Extracted(extracted),
            Err(e) => Prepared::ExtractFailed(e.into()),
        }
    }

    fn chunk(&self, text: &str) -> Result<Vec<ChunkDraft>, IngestError> {
        Ok(self.chunker.chunk(&self.segmenter, text)?)
    }
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    files: FileStore,
    pipeline: Arc<Pipeline>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        files: FileStore,
        validator: PdfValidator,
        extractor: TextExtractor,
        segmenter: Arc<Segmenter>,
        chunker: ChunkBuilder,
    ) -> Self {
        Self {
            store,
            files,
            pipeline: Arc::new(Pipeline {
                validator,
                extractor,
                segmenter,
                chunker,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    /// Ingest one upload, returning the new document's id and counts.
    ///
    /// On failure the returned [`IngestFailure`] carries the id of the
    /// document marked `failed` and the last stage it completed.
    pub async fn ingest(&self, request: UploadRequest) -> Result<IngestOutcome, IngestFailure> {
        let UploadRequest {
            bytes,
            filename,
            mime_type,
            title,
            user_id,
        } = request;

        let filename = match filename.trim() {
            "" => FALLBACK_FILENAME.to_string(),
            name => name.to_string(),
        };
        let title = resolve_title(title.as_deref(), &filename);
        let document = Document::pending(title, filename, &bytes, mime_type, user_id, now());
        let mut saga = Saga::new(&document.id);

        tracing::info!(
            document_id = %document.id,
            filename = %document.original_filename,
            size = document.file_size,
            "Ingesting upload"
        );
        saga.advance(Stage::Created);

        // Validation and extraction run before the transaction opens so no
        // database lock is held during CPU-bound work.
        let (bytes, extracted) = match self.prepare(&mut saga, &document, bytes).await {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.fail(saga, None, &document, e).await),
        };

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => return Err(self.fail(saga, None, &document, e.into()).await),
        };

        let outcome = match self.persist(&mut saga, &mut *tx, &document, bytes, extracted).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(saga, Some(tx), &document, e).await),
        };

        // A failed commit has already discarded the transaction.
        if let Err(e) = tx.commit().await {
            return Err(self.fail(saga, None, &document, e.into()).await);
        }
        saga.advance(Stage::Persisted);

        tracing::info!(
            document_id = %outcome.document_id,
            chunks = outcome.chunk_count,
            pages = outcome.page_count,
            "Ingestion completed"
        );
        Ok(outcome)
    }

    async fn prepare(
        &self,
        saga: &mut Saga,
        document: &Document,
        bytes: Vec<u8>,
    ) -> Result<(Vec<u8>, ExtractedText), IngestError> {
        let pipeline = Arc::clone(&self.pipeline);
        let mime = document.mime_type.clone();
        let (bytes, prepared) = blocking(move || {
            let prepared = pipeline.prepare(&bytes, &mime);
            (bytes, prepared)
        })
        .await?;
        match prepared {
            Prepared::Rejected(e) => Err(e),
            Prepared::ExtractFailed(e) => {
                saga.advance(Stage::Validated);
                Err(e)
            }
            Prepared::Extracted(extracted) => {
                saga.advance(Stage::Validated);
                saga.advance(Stage::Extracted);
                Ok((bytes, extracted))
            }
        }
    }

    async fn persist(
        &self,
        saga: &mut Saga,
        tx: &mut dyn IngestTransaction,
        document: &Document,
        bytes: Vec<u8>,
        extracted: ExtractedText,
    ) -> Result<IngestOutcome, IngestError> {
        let ExtractedText { text, page_count } = extracted;
        tx.create_document(document).await?;

        let storage_path = self.files.save(&bytes, &document.original_filename)?;
        saga.register(Compensation::DeleteStoredFile(storage_path.clone()));
        tx.update_document(
            &document.id,
            &DocumentPatch::stored(storage_path, page_count as i64),
        )
        .await?;
        saga.advance(Stage::Stored);

        let pipeline = Arc::clone(&self.pipeline);
        let drafts = blocking(move || pipeline.chunk(&text)).await??;
        saga.advance(Stage::Chunked);

        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .map(|draft| Chunk::new(&document.id, draft.index, draft.text, draft.meta))
            .collect();
        tx.insert_chunks(&document.id, &chunks).await?;
        tx.update_document(&document.id, &DocumentPatch::status(DocumentStatus::Completed))
            .await?;

        Ok(IngestOutcome {
            document_id: document.id.clone(),
            status: DocumentStatus::Completed,
            chunk_count: chunks.len(),
            page_count,
        })
    }

    async fn fail(
        &self,
        saga: Saga,
        tx: Option<Box<dyn IngestTransaction>>,
        document: &Document,
        error: IngestError,
    ) -> IngestFailure {
        let stage = saga.stage();
        let report = saga
            .abort(&self.files, self.store.as_ref(), tx, document, &error)
            .await;
        if !report.failure_recorded {
            tracing::error!(document_id = %document.id, "Document left without a failure record");
        }
        IngestFailure {
            document_id: Some(document.id.clone()),
            stage,
            error,
        }
    }
}

/// Build the ingestor from configuration.
///
/// The segmenter (and its tokenizer tables) is loaded here once and
/// shared by every ingestion.
pub fn build_ingestor(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Ingestor> {
    let segmenter = Segmenter::new(config.segmenter_config()?)
        .context("Failed to initialise sentence segmenter")?;
    let chunker = ChunkBuilder::new(config.chunking.chunk_config())?;
    let validator = PdfValidator::new(
        config.upload.max_bytes,
        config.upload.allowed_mime_types.clone(),
    );
    let files = FileStore::new(&config.storage.root).with_context(|| {
        format!(
            "Failed to create storage root: {}",
            config.storage.root.display()
        )
    })?;

    Ok(Ingestor::new(
        store,
        files,
        validator,
        TextExtractor::new(),
        Arc::new(segmenter),
        chunker,
    ))
}

/// CLI entry point: ingest a file from disk.
pub async fn run_ingest(
    config: &Config,
    path: &Path,
    title: Option<String>,
    mime: Option<String>,
    user_id: Option<String>,
) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(FALLBACK_FILENAME)
        .to_string();
    let mime_type = mime.unwrap_or_else(|| guess_mime(path).to_string());

    let pool = db::connect(config).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(pool.clone()));
    let ingestor = build_ingestor(config, store)?;

    let result = ingestor
        .ingest(UploadRequest {
            bytes,
            filename,
            mime_type,
            title,
            user_id,
        })
        .await;
    pool.close().await;

    match result {
        Ok(outcome) => {
            println!("Ingested {}", path.display());
            println!("  document_id: {}", outcome.document_id);
            println!("  pages:       {}", outcome.page_count);
            println!("  chunks:      {}", outcome.chunk_count);
            Ok(())
        }
        Err(failure) => {
            if let Some(id) = &failure.document_id {
                eprintln!("Document {} marked failed", id);
            }
            Err(anyhow::anyhow!("[{}] {}", failure.error.code(), failure.error))
        }
    }
}

fn resolve_title(title: Option<&str>, filename: &str) -> String {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(filename)
        .to_string()
}

fn guess_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => MIME_PDF,
        _ => "application/octet-stream",
    }
}

async fn blocking<T, F>(f: F) -> Result<T, IngestError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestError::Aborted(e.to_string()))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
