//! In-memory [`DocumentStore`] for tests.
//!
//! Transactions buffer their writes and apply them under the store's
//! locks on commit. Failures can be injected per operation with
//! [`MemoryStore::fail_on`] to exercise cleanup paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Chunk, Document, DocumentPatch};

use super::{DocumentStore, IngestTransaction};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    CreateDocument,
    UpdateDocument,
    InsertChunks,
    Commit,
    Rollback,
    RecordFailure,
}

#[derive(Default)]
struct State {
    docs: HashMap<String, Document>,
    chunks: Vec<Chunk>,
}

#[derive(Default)]
struct Shared {
    state: RwLock<State>,
    fail_points: RwLock<HashSet<FailPoint>>,
    rollbacks: RwLock<usize>,
}

/// In-memory store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `point` fail with a backend error.
    pub fn fail_on(&self, point: FailPoint) {
        self.shared
            .fail_points
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point);
    }

    pub fn clear_failures(&self) {
        self.shared
            .fail_points
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of transactions rolled back so far.
    pub fn rollback_count(&self) -> usize {
        *self
            .shared
            .rollbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn document_count(&self) -> usize {
        self.shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .docs
            .len()
    }

    pub fn chunk_count(&self) -> usize {
        self.shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .chunks
            .len()
    }
}

impl Shared {
    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        let injected = self
            .fail_points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&point);
        if injected {
            Err(StoreError::Backend(format!("injected failure at {:?}", point)))
        } else {
            Ok(())
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

enum Op {
    Create(Document),
    Update(String, DocumentPatch),
    InsertChunks(Vec<Chunk>),
}

struct MemoryTransaction {
    shared: Arc<Shared>,
    ops: Vec<Op>,
    /// Ids created in this transaction, for update lookups before commit.
    created: HashSet<String>,
}

#[async_trait]
impl IngestTransaction for MemoryTransaction {
    async fn create_document(&mut self, document: &Document) -> Result<(), StoreError> {
        self.shared.check(FailPoint::CreateDocument)?;
        self.created.insert(document.id.clone());
        self.ops.push(Op::Create(document.clone()));
        Ok(())
    }

    async fn update_document(&mut self, id: &str, patch: &DocumentPatch) -> Result<(), StoreError> {
        self.shared.check(FailPoint::UpdateDocument)?;
        let known = self.created.contains(id)
            || self
                .shared
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .docs
                .contains_key(id);
        if !known {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.ops.push(Op::Update(id.to_string(), patch.clone()));
        Ok(())
    }

    async fn insert_chunks(&mut self, _document_id: &str, chunks: &[Chunk]) -> Result<(), StoreError> {
        self.shared.check(FailPoint::InsertChunks)?;
        self.ops.push(Op::InsertChunks(chunks.to_vec()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.shared.check(FailPoint::Commit)?;
        let MemoryTransaction { shared, ops, .. } = *self;
        let mut state = shared.state.write().unwrap_or_else(PoisonError::into_inner);
        let ts = now();
        for op in ops {
            match op {
                Op::Create(doc) => {
                    state.docs.insert(doc.id.clone(), doc);
                }
                Op::Update(id, patch) => {
                    if let Some(doc) = state.docs.get_mut(&id) {
                        doc.apply(&patch, ts);
                    }
                }
                Op::InsertChunks(chunks) => state.chunks.extend(chunks),
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.shared.check(FailPoint::Rollback)?;
        *self
            .shared
            .rollbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn IngestTransaction>, StoreError> {
        self.shared.check(FailPoint::Begin)?;
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            ops: Vec::new(),
            created: HashSet::new(),
        }))
    }

    async fn record_failure(&self, document: &Document, reason: &str) -> Result<(), StoreError> {
        self.shared.check(FailPoint::RecordFailure)?;
        let mut state = self
            .shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let failed = match state.docs.get(&document.id) {
            Some(existing) => existing.failed(reason, now()),
            None => document.failed(reason, now()),
        };
        state.docs.insert(failed.id.clone(), failed);
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let state = self
            .shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(state.docs.get(id).cloned())
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>, StoreError> {
        let state = self
            .shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut chunks: Vec<Chunk> = state
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn list_documents(&self, limit: i64) -> Result<Vec<Document>, StoreError> {
        let state = self
            .shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut docs: Vec<Document> = state.docs.values().cloned().collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        docs.truncate(limit.max(0) as usize);
        Ok(docs)
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        let mut state = self
            .shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let existed = state.docs.remove(id).is_some();
        state.chunks.retain(|c| c.document_id != id);
        Ok(existed)
    }
}
