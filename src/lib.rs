//! # docingest
//!
//! PDF ingestion for retrieval pipelines: validate an upload, extract and
//! clean its text, store the original, split the text into
//! sentence-aligned overlapping chunks, and persist everything in SQLite
//! as one atomic unit.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │ Validate │──▶│  Extract  │──▶│ File Store │──▶│ Segment + │──▶│  SQLite  │
//! │ (lopdf)  │   │ + clean   │   │ (uuid.pdf) │   │   Chunk   │   │ docs+chk │
//! └──────────┘   └───────────┘   └────────────┘   └───────────┘   └──────────┘
//!        any failure ─▶ saga: delete file, rollback, mark `failed`
//! ```
//!
//! The processing stages live in the runtime-free `docingest-core` crate;
//! this crate wires them to SQLite, the filesystem, an HTTP server and
//! the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`ingest`] | Ingestion orchestrator |
//! | [`saga`] | Compensation log and cleanup protocol |
//! | [`file_store`] | Raw PDF storage |
//! | [`sqlite_store`] | SQLite document store |
//! | [`get`] | Document lookup, listing and removal |
//! | [`server`] | HTTP upload server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod file_store;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod saga;
pub mod server;
pub mod sqlite_store;
