//! # docingest core
//!
//! Pure pipeline logic for PDF ingestion: data models, PDF validation,
//! text extraction and cleanup, sentence segmentation, token counting,
//! sentence-aligned chunking, and the transactional store abstraction.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Everything
//! here operates on in-memory bytes and strings; the `docingest` app
//! crate supplies the SQLite store, file storage, and orchestration.

pub mod chunker;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod models;
pub mod preprocess;
pub mod segment;
pub mod store;
pub mod tokens;
pub mod validate;

#[cfg(any(test, feature = "test-support"))]
pub mod testpdf;
