//! End-to-end ingestion against a real SQLite database.

mod common;

use std::path::Path;
use std::sync::Arc;

use sqlx::Row;
use tempfile::TempDir;

use docingest::config::Config;
use docingest::file_store::FileStore;
use docingest::get::{delete_document, get_document};
use docingest::sqlite_store::SqliteStore;
use docingest::{db, migrate};
use docingest_core::models::DocumentStatus;
use docingest_core::store::DocumentStore;

use common::{default_config, encrypted_pdf, ingestor, pdf_with_pages, stored_files, upload};

async fn open(cfg: &Config) -> (sqlx::SqlitePool, Arc<SqliteStore>) {
    migrate::run_migrations(cfg).await.unwrap();
    let pool = db::connect(cfg).await.unwrap();
    (pool.clone(), Arc::new(SqliteStore::new(pool)))
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let cfg = default_config(&tmp);
    migrate::run_migrations(&cfg).await.unwrap();
    migrate::run_migrations(&cfg).await.unwrap();
    assert!(cfg.db.path.exists());

    let pool = db::connect(&cfg).await.unwrap();
    let tables: Vec<String> = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap()
    .iter()
    .map(|r| r.get("name"))
    .collect();
    assert!(tables.contains(&"documents".to_string()));
    assert!(tables.contains(&"chunks".to_string()));
    pool.close().await;
}

#[tokio::test]
async fn test_ingest_persists_document_and_chunks() {
    let tmp = TempDir::new().unwrap();
    let cfg = default_config(&tmp);
    let (pool, store) = open(&cfg).await;
    let ing = ingestor(&cfg, store.clone());

    let bytes = pdf_with_pages(&["First page talks about rivers.", "Second page covers lakes."]);
    let outcome = ing.ingest(upload(bytes, "water.pdf")).await.unwrap();
    assert_eq!(outcome.page_count, 2);

    let doc = get_document(store.as_ref(), &outcome.document_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert_eq!(doc.page_count, Some(2));
    assert_eq!(doc.chunk_count, outcome.chunk_count);
    assert!(doc.chunks[0].text.contains("rivers"));
    assert_eq!(doc.content_hash.len(), 64);

    let listed = store.list_documents(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, outcome.document_id);
    pool.close().await;
}

#[tokio::test]
async fn test_failed_validation_is_recorded() {
    let tmp = TempDir::new().unwrap();
    let cfg = default_config(&tmp);
    let (pool, store) = open(&cfg).await;
    let ing = ingestor(&cfg, store.clone());

    let failure = ing
        .ingest(upload(encrypted_pdf("Secret."), "secret.pdf"))
        .await
        .unwrap_err();
    let id = failure.document_id.unwrap();

    let doc = store.get_document(&id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.error_message.unwrap().contains("encrypted"));
    assert!(doc.storage_path.is_none());
    assert!(doc.page_count.is_none());
    pool.close().await;
}

#[tokio::test]
async fn test_database_failure_rolls_back_and_deletes_file() {
    let tmp = TempDir::new().unwrap();
    let cfg = default_config(&tmp);
    let (pool, store) = open(&cfg).await;
    let ing = ingestor(&cfg, store.clone());

    // Chunk inserts will fail after the file has been stored.
    sqlx::query("DROP TABLE chunks").execute(&pool).await.unwrap();

    let failure = ing
        .ingest(upload(pdf_with_pages(&["Doomed upload."]), "doomed.pdf"))
        .await
        .unwrap_err();
    assert_eq!(failure.error.code(), "storage_failure");
    assert_eq!(stored_files(&cfg.storage.root), 0);

    let id = failure.document_id.unwrap();
    let doc = store.get_document(&id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.storage_path.is_none());
    pool.close().await;
}

#[tokio::test]
async fn test_delete_cascades_to_chunks_and_file() {
    let tmp = TempDir::new().unwrap();
    let cfg = default_config(&tmp);
    let (pool, store) = open(&cfg).await;
    let ing = ingestor(&cfg, store.clone());

    let outcome = ing
        .ingest(upload(pdf_with_pages(&["Short lived document."]), "tmp.pdf"))
        .await
        .unwrap();
    let path = store
        .get_document(&outcome.document_id)
        .await
        .unwrap()
        .unwrap()
        .storage_path
        .unwrap();
    assert!(Path::new(&path).exists());

    let files = FileStore::new(&cfg.storage.root).unwrap();
    assert!(delete_document(store.as_ref(), &files, &outcome.document_id)
        .await
        .unwrap());

    let remaining: i64 = sqlx::query("SELECT COUNT(*) AS n FROM chunks")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(remaining, 0);
    assert!(!Path::new(&path).exists());
    assert!(store.get_document(&outcome.document_id).await.unwrap().is_none());
    pool.close().await;
}

#[tokio::test]
async fn test_concurrent_ingestions_share_the_database() {
    let tmp = TempDir::new().unwrap();
    let cfg = default_config(&tmp);
    let (pool, store) = open(&cfg).await;
    let ing = ingestor(&cfg, store.clone());

    let uploads = vec![
        upload(pdf_with_pages(&["Alpha page one.", "Alpha page two."]), "a.pdf"),
        upload(encrypted_pdf("Locked away."), "b.pdf"),
        upload(pdf_with_pages(&["Beta has a single page."]), "c.pdf"),
        upload(b"%PDF-1.4\nbroken".to_vec(), "d.pdf"),
    ];
    let handles: Vec<_> = uploads
        .into_iter()
        .map(|req| {
            let ing = ing.clone();
            tokio::spawn(async move { ing.ingest(req).await })
        })
        .collect();

    let mut completed = 0;
    let mut failed = 0;
    for handle in handles {
        let (id, expected) = match handle.await.unwrap() {
            Ok(outcome) => {
                completed += 1;
                (outcome.document_id, DocumentStatus::Completed)
            }
            Err(failure) => {
                failed += 1;
                assert_ne!(failure.error.code(), "storage_failure");
                (failure.document_id.unwrap(), DocumentStatus::Failed)
            }
        };
        let doc = store.get_document(&id).await.unwrap().unwrap();
        assert_eq!(doc.status, expected);
    }
    assert_eq!((completed, failed), (2, 2));
    assert_eq!(stored_files(&cfg.storage.root), 2);
    assert_eq!(store.list_documents(10).await.unwrap().len(), 4);
    pool.close().await;
}
