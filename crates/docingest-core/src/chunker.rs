//! Sentence-aligned chunk builder.
//!
//! Consumes [`SentenceSpan`]s and groups them into overlapping chunks
//! bounded by a token budget.
//!
//! # Algorithm
//!
//! 1. Accumulate sentences into a buffer, tracking its token count.
//! 2. Once the buffer reaches `target_size` tokens, emit it as a chunk.
//! 3. Seed the next buffer with the longest run of trailing sentences
//!    whose combined tokens stay within `overlap`. Overlap is always made
//!    of whole sentences.
//! 4. A sentence larger than `target_size` on its own is emitted alone,
//!    after flushing whatever the buffer held.
//! 5. At end of input, a final buffer below `min_chunk_size` is merged
//!    into the previous chunk. When there is no previous chunk it is
//!    emitted regardless of size.
//!
//! A buffer holding only carried-over overlap is never emitted: those
//! sentences already live in the previous chunk.
//!
//! Chunk text is the exact source slice from the first sentence's start to
//! the last sentence's end, so overlapping regions of neighbouring chunks
//! are identical substrings.

use crate::error::ChunkingError;
use crate::models::ChunkMetadata;
use crate::segment::{Segmenter, SentenceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Token count at which a buffer is finalized.
    pub target_size: usize,
    /// Maximum tokens carried into the next chunk.
    pub overlap: usize,
    /// Trailing chunks below this are merged backwards.
    pub min_chunk_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_size: 512,
            overlap: 50,
            min_chunk_size: 100,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.target_size == 0 {
            return Err(ChunkingError::InvalidConfig(
                "target_size must be > 0".to_string(),
            ));
        }
        if self.overlap >= self.target_size {
            return Err(ChunkingError::InvalidConfig(format!(
                "overlap ({}) must be smaller than target_size ({})",
                self.overlap, self.target_size
            )));
        }
        if self.min_chunk_size == 0 || self.min_chunk_size > self.target_size {
            return Err(ChunkingError::InvalidConfig(format!(
                "min_chunk_size ({}) must be in 1..={}",
                self.min_chunk_size, self.target_size
            )));
        }
        Ok(())
    }
}

/// A chunk before it is bound to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub index: usize,
    pub text: String,
    pub meta: ChunkMetadata,
    byte_start: usize,
    byte_end: usize,
}

impl ChunkDraft {
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.byte_start..self.byte_end
    }
}

#[derive(Debug, Clone)]
pub struct ChunkBuilder {
    config: ChunkConfig,
}

impl ChunkBuilder {
    pub fn new(config: ChunkConfig) -> Result<Self, ChunkingError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Segment `text` and build its chunks.
    pub fn chunk(
        &self,
        segmenter: &Segmenter,
        text: &str,
    ) -> Result<Vec<ChunkDraft>, ChunkingError> {
        if text.trim().is_empty() {
            return Err(ChunkingError::EmptyText);
        }
        self.build(text, segmenter.sentences(text))
    }

    /// Build chunks from sentence spans of `source`.
    ///
    /// Spans must come from segmenting `source`, in order.
    pub fn build<'a, I>(
        &self,
        source: &'a str,
        sentences: I,
    ) -> Result<Vec<ChunkDraft>, ChunkingError>
    where
        I: IntoIterator<Item = SentenceSpan<'a>>,
    {
        let mut chunks: Vec<ChunkDraft> = Vec::new();
        let mut buffer = Buffer::default();

        for span in sentences {
            if span.token_count > self.config.target_size {
                self.flush(&mut chunks, &mut buffer, source);
                chunks.push(draft(chunks.len(), &[span], source));
                buffer = Buffer::seeded(overlap_seed(&[span], self.config.overlap));
                continue;
            }

            buffer.push(span);
            if buffer.tokens >= self.config.target_size {
                chunks.push(draft(chunks.len(), &buffer.spans, source));
                buffer = Buffer::seeded(overlap_seed(&buffer.spans, self.config.overlap));
            }
        }
        self.flush(&mut chunks, &mut buffer, source);

        if chunks.is_empty() {
            return Err(ChunkingError::NoSentences);
        }
        Ok(chunks)
    }

    /// Emit or merge the fresh sentences left in `buffer`.
    fn flush<'a>(&self, chunks: &mut Vec<ChunkDraft>, buffer: &mut Buffer<'a>, source: &'a str) {
        let taken = std::mem::take(buffer);
        let fresh = &taken.spans[taken.seeded..];
        if fresh.is_empty() {
            return;
        }
        if taken.tokens < self.config.min_chunk_size {
            if let Some(previous) = chunks.last_mut() {
                extend(previous, fresh, source);
                return;
            }
        }
        chunks.push(draft(chunks.len(), &taken.spans, source));
    }
}

#[derive(Default)]
struct Buffer<'a> {
    spans: Vec<SentenceSpan<'a>>,
    tokens: usize,
    /// Leading spans carried over from the previous chunk.
    seeded: usize,
}

impl<'a> Buffer<'a> {
    fn seeded(spans: Vec<SentenceSpan<'a>>) -> Self {
        Self {
            tokens: spans.iter().map(|s| s.token_count).sum(),
            seeded: spans.len(),
            spans,
        }
    }

    fn push(&mut self, span: SentenceSpan<'a>) {
        self.tokens += span.token_count;
        self.spans.push(span);
    }
}

fn overlap_seed<'a>(spans: &[SentenceSpan<'a>], overlap: usize) -> Vec<SentenceSpan<'a>> {
    let mut total = 0;
    let mut keep = 0;
    for span in spans.iter().rev() {
        if total + span.token_count > overlap {
            break;
        }
        total += span.token_count;
        keep += 1;
    }
    spans[spans.len() - keep..].to_vec()
}

fn draft(index: usize, spans: &[SentenceSpan<'_>], source: &str) -> ChunkDraft {
    let first = &spans[0];
    let last = &spans[spans.len() - 1];
    ChunkDraft {
        index,
        text: source[first.byte_start..last.byte_end].to_string(),
        meta: ChunkMetadata {
            token_count: spans.iter().map(|s| s.token_count).sum(),
            sentence_count: spans.len(),
            char_start: first.char_start,
            char_end: last.char_end,
        },
        byte_start: first.byte_start,
        byte_end: last.byte_end,
    }
}

fn extend(chunk: &mut ChunkDraft, spans: &[SentenceSpan<'_>], source: &str) {
    let last = &spans[spans.len() - 1];
    chunk.byte_end = last.byte_end;
    chunk.text = source[chunk.byte_start..chunk.byte_end].to_string();
    chunk.meta.char_end = last.char_end;
    chunk.meta.token_count += spans.iter().map(|s| s.token_count).sum::<usize>();
    chunk.meta.sentence_count += spans.len();
}
