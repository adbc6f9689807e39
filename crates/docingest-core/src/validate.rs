//! PDF validation.
//!
//! Runs cheap checks before any heavy work and short-circuits on the
//! first failure, in this order:
//!
//! 1. non-empty
//! 2. within the configured size limit (`too_large`)
//! 3. declared MIME type is allowed (`invalid_type`)
//! 4. leading bytes are the `%PDF-` signature (`invalid_type`)
//! 5. parses as a PDF with a readable page tree (`corrupted`)
//! 6. not encrypted (`encrypted`)
//!
//! Malformed input is an expected outcome and is returned as a
//! [`ValidationFailure`], never a panic. Validation has no side effects.

use lopdf::Document as PdfDocument;

use crate::error::ValidationFailure;

/// Default upload limit: 50 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 52_428_800;

pub const MIME_PDF: &str = "application/pdf";

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// A PDF that passed validation, still open.
///
/// Consumed by [`TextExtractor::extract`](crate::extract::TextExtractor::extract),
/// which releases the parsed document before returning.
pub struct ValidatedPdf<'a> {
    pub(crate) document: PdfDocument,
    pub(crate) bytes: &'a [u8],
    pub(crate) page_count: usize,
}

impl<'a> ValidatedPdf<'a> {
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

impl std::fmt::Debug for ValidatedPdf<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedPdf")
            .field("bytes", &self.bytes.len())
            .field("page_count", &self.page_count)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PdfValidator {
    max_bytes: u64,
    allowed_mime_types: Vec<String>,
}

impl Default for PdfValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES, vec![MIME_PDF.to_string()])
    }
}

impl PdfValidator {
    pub fn new(max_bytes: u64, allowed_mime_types: Vec<String>) -> Self {
        Self {
            max_bytes,
            allowed_mime_types: allowed_mime_types
                .into_iter()
                .map(|m| m.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Validate an upload and open it for extraction.
    pub fn validate<'a>(
        &self,
        bytes: &'a [u8],
        declared_mime: &str,
    ) -> Result<ValidatedPdf<'a>, ValidationFailure> {
        if bytes.is_empty() {
            return Err(ValidationFailure::Empty);
        }

        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return Err(ValidationFailure::TooLarge {
                size,
                max: self.max_bytes,
            });
        }

        let mime = essence(declared_mime);
        if !self.allowed_mime_types.iter().any(|m| *m == mime) {
            return Err(ValidationFailure::InvalidType(format!(
                "declared type '{}' is not accepted",
                declared_mime
            )));
        }

        if !bytes.starts_with(PDF_SIGNATURE) {
            return Err(ValidationFailure::InvalidType(
                "missing %PDF- signature".to_string(),
            ));
        }

        let document = match PdfDocument::load_mem(bytes) {
            Ok(document) => document,
            // Encrypted files frequently fail to parse without a password.
            Err(_) if trailer_declares_encryption(bytes) => {
                return Err(ValidationFailure::Encrypted)
            }
            Err(e) => return Err(ValidationFailure::Corrupted(e.to_string())),
        };

        // The raw trailer check catches files the parser already decrypted
        // with the empty user password.
        if document.is_encrypted()
            || document.trailer.get(b"Encrypt").is_ok()
            || trailer_declares_encryption(bytes)
        {
            return Err(ValidationFailure::Encrypted);
        }

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(ValidationFailure::Corrupted(
                "document has no pages".to_string(),
            ));
        }

        Ok(ValidatedPdf {
            document,
            bytes,
            page_count,
        })
    }
}

/// `"Application/PDF; charset=binary"` -> `"application/pdf"`.
fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether the last trailer carries an `/Encrypt` entry, read from the
/// raw bytes.
fn trailer_declares_encryption(bytes: &[u8]) -> bool {
    trailer_dictionary(bytes).is_some_and(|dict| find(dict, b"/Encrypt").is_some())
}

/// Raw bytes of the trailer that `startxref` points at.
///
/// For a classic cross-reference table this is everything from the
/// `trailer` keyword up to `startxref`. For a cross-reference stream it is
/// the stream object's dictionary, up to the `stream` keyword. Page
/// content is never included.
fn trailer_dictionary(bytes: &[u8]) -> Option<&[u8]> {
    const STARTXREF: &[u8] = b"startxref";
    let startxref = rfind(bytes, STARTXREF)?;
    let offset = parse_offset(&bytes[startxref + STARTXREF.len()..])?;
    let section = bytes.get(offset..startxref)?;
    if section.starts_with(b"xref") {
        let pos = find(section, b"trailer")?;
        Some(&section[pos..])
    } else {
        let end = find(section, b"stream").unwrap_or(section.len());
        Some(&section[..end])
    }
}

fn parse_offset(tail: &[u8]) -> Option<usize> {
    let digits: String = tail
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    digits.parse().ok()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
