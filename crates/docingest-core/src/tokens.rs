//! Token counting.
//!
//! Chunk sizes are budgeted in tokens: either `cl100k_base` BPE tokens
//! (via `tiktoken-rs`) or whitespace-separated words.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::error::ChunkingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerKind {
    Cl100kBase,
    Whitespace,
}

impl TokenizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenizerKind::Cl100kBase => "cl100k_base",
            TokenizerKind::Whitespace => "whitespace",
        }
    }
}

impl FromStr for TokenizerKind {
    type Err = ChunkingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cl100k_base" | "cl100k" => Ok(TokenizerKind::Cl100kBase),
            "whitespace" => Ok(TokenizerKind::Whitespace),
            other => Err(ChunkingError::Tokenizer {
                name: other.to_string(),
                reason: "expected 'cl100k_base' or 'whitespace'".to_string(),
            }),
        }
    }
}

/// Counts tokens in a piece of text. Cheap to clone; shares the BPE tables.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Option<Arc<CoreBPE>>,
}

impl TokenCounter {
    pub fn new(kind: TokenizerKind) -> Result<Self, ChunkingError> {
        match kind {
            TokenizerKind::Whitespace => Ok(Self::whitespace()),
            TokenizerKind::Cl100kBase => {
                let bpe = cl100k_base().map_err(|e| ChunkingError::Tokenizer {
                    name: kind.as_str().to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Self {
                    bpe: Some(Arc::new(bpe)),
                })
            }
        }
    }

    pub fn whitespace() -> Self {
        Self { bpe: None }
    }

    pub fn kind(&self) -> TokenizerKind {
        if self.bpe.is_some() {
            TokenizerKind::Cl100kBase
        } else {
            TokenizerKind::Whitespace
        }
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => text.split_whitespace().count(),
        }
    }
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCounter")
            .field("kind", &self.kind())
            .finish()
    }
}
