//! Page-by-page text extraction.
//!
//! Walks the page tree of a [`ValidatedPdf`] in document order, pulling
//! text from one page at a time with `lopdf` so only the growing text
//! buffer is held across pages. Pages that fail are logged and skipped.
//! When no page yields any text the whole file is retried once with
//! `pdf-extract`, which lays out text blocks differently.
//!
//! The parsed document is dropped before cleanup runs, on every path.

use crate::error::ExtractionError;
use crate::preprocess::{clean_text, PARAGRAPH_BREAK};
use crate::validate::ValidatedPdf;

/// Cleaned document text plus the number of pages in the source PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TextExtractor {
    fallback: bool,
}

impl TextExtractor {
    pub fn new() -> Self {
        Self { fallback: true }
    }

    /// Extractor that never falls back to whole-document extraction.
    pub fn without_fallback() -> Self {
        Self { fallback: false }
    }

    /// Extract and clean the text of a validated PDF.
    ///
    /// An extraction error means no text could be obtained at all. A PDF
    /// that extracts to empty text (image-only pages) succeeds with an
    /// empty string; that is reported later as a chunking failure.
    pub fn extract(&self, pdf: ValidatedPdf<'_>) -> Result<ExtractedText, ExtractionError> {
        let ValidatedPdf {
            document,
            bytes,
            page_count,
        } = pdf;

        let mut raw = String::new();
        let mut failures = 0usize;
        let mut last_error = String::new();

        for (&number, _) in document.get_pages().iter() {
            match document.extract_text(&[number]) {
                Ok(page_text) => {
                    if page_text.trim().is_empty() {
                        continue;
                    }
                    if !raw.is_empty() {
                        raw.push_str(PARAGRAPH_BREAK);
                    }
                    raw.push_str(&page_text);
                }
                Err(e) => {
                    tracing::warn!(page = number, error = %e, "Skipping page that failed text extraction");
                    failures += 1;
                    last_error = e.to_string();
                }
            }
        }
        drop(document);

        if raw.trim().is_empty() && self.fallback {
            match pdf_extract::extract_text_from_mem(bytes) {
                Ok(text) => raw = text,
                Err(e) if failures == page_count => {
                    return Err(ExtractionError::Unreadable {
                        pages: page_count,
                        reason: format!("{}; fallback: {}", last_error, e),
                    });
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Fallback extraction failed; treating document as textless");
                }
            }
        } else if raw.is_empty() && page_count > 0 && failures == page_count {
            return Err(ExtractionError::Unreadable {
                pages: page_count,
                reason: last_error,
            });
        }

        Ok(ExtractedText {
            text: clean_text(&raw),
            page_count,
        })
    }
}
