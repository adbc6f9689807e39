#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use docingest::config::Config;
use docingest::ingest::{build_ingestor, Ingestor, UploadRequest};
use docingest_core::store::DocumentStore;

pub use docingest_core::testpdf::{encrypted_pdf, pdf_with_pages};

/// Config rooted in `tmp` with whitespace token counting.
pub fn test_config(tmp: &TempDir, chunking: &str, extra: &str) -> Config {
    let root = tmp.path();
    let content = format!(
        r#"
[db]
path = "{}"

[storage]
root = "{}"

[chunking]
tokenizer = "whitespace"
{}

{}
"#,
        root.join("docingest.sqlite").display(),
        root.join("files").display(),
        chunking,
        extra
    );
    let cfg: Config = toml::from_str(&content).unwrap();
    cfg.validate().unwrap();
    cfg
}

pub fn default_config(tmp: &TempDir) -> Config {
    test_config(tmp, "", "")
}

pub fn ingestor(cfg: &Config, store: Arc<dyn DocumentStore>) -> Ingestor {
    build_ingestor(cfg, store).unwrap()
}

pub fn upload(bytes: Vec<u8>, filename: &str) -> UploadRequest {
    UploadRequest {
        bytes,
        filename: filename.to_string(),
        mime_type: "application/pdf".to_string(),
        title: None,
        user_id: None,
    }
}

/// Number of entries in the storage root (0 if it does not exist).
pub fn stored_files(root: &Path) -> usize {
    std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
}

/// `count` distinct five-word sentences.
pub fn sentences(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("Sentence {} has five words.", i))
        .collect()
}
