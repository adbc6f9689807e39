//! Sentence segmentation.
//!
//! Boundaries come from the Unicode sentence-boundary rules (UAX #29, via
//! `unicode-segmentation`), then two repairs are applied:
//!
//! - a segment ending in a known abbreviation ("Dr.", "Fig.", "e.g.",
//!   a single initial) is joined with the following segment, unless a
//!   line break follows it;
//! - whitespace-only segments are absorbed into the preceding sentence.
//!
//! Spans tile the input exactly: every character belongs to one span and
//! concatenating `raw()` of all spans reproduces the input. `text()`
//! trims surrounding whitespace while the offsets keep referencing the
//! original buffer.
//!
//! A [`Segmenter`] is built once (it owns the tokenizer tables) and shared
//! read-only across concurrent ingestions.

use std::collections::HashSet;
use std::iter::Peekable;

use unicode_segmentation::{USentenceBoundIndices, UnicodeSegmentation};

use crate::error::ChunkingError;
use crate::tokens::{TokenCounter, TokenizerKind};

/// Abbreviations that end in a period without ending the sentence.
const ENGLISH_ABBREVIATIONS: &[&str] = &[
    "Dr.", "Mr.", "Mrs.", "Ms.", "Prof.", "Sr.", "Jr.", "St.", "Mt.", "Gen.", "Col.", "Capt.",
    "Lt.", "Rev.", "Hon.", "Fig.", "Figs.", "Eq.", "Eqs.", "Sec.", "Ch.", "Vol.", "No.", "Nos.",
    "pp.", "p.", "al.", "vs.", "cf.", "approx.", "ca.", "viz.", "Jan.", "Feb.", "Mar.", "Apr.",
    "Jun.", "Jul.", "Aug.", "Sep.", "Sept.", "Oct.", "Nov.", "Dec.",
];

pub const SUPPORTED_LANGUAGES: &[&str] = &["en"];

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub language: String,
    pub tokenizer: TokenizerKind,
    pub extra_abbreviations: Vec<String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            tokenizer: TokenizerKind::Cl100kBase,
            extra_abbreviations: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Segmenter {
    language: String,
    counter: TokenCounter,
    abbreviations: HashSet<String>,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self, ChunkingError> {
        let counter = TokenCounter::new(config.tokenizer)?;
        Self::with_counter(&config.language, counter, &config.extra_abbreviations)
    }

    pub fn with_counter(
        language: &str,
        counter: TokenCounter,
        extra_abbreviations: &[String],
    ) -> Result<Self, ChunkingError> {
        if !SUPPORTED_LANGUAGES.contains(&language) {
            return Err(ChunkingError::InvalidConfig(format!(
                "unsupported segmenter language '{}'",
                language
            )));
        }
        let mut abbreviations: HashSet<String> =
            ENGLISH_ABBREVIATIONS.iter().map(|a| a.to_string()).collect();
        for extra in extra_abbreviations {
            let extra = extra.trim();
            if extra.is_empty() {
                continue;
            }
            if extra.ends_with('.') {
                abbreviations.insert(extra.to_string());
            } else {
                abbreviations.insert(format!("{}.", extra));
            }
        }
        Ok(Self {
            language: language.to_string(),
            counter,
            abbreviations,
        })
    }

    /// English segmenter counting whitespace tokens.
    pub fn whitespace() -> Self {
        Self {
            language: "en".to_string(),
            counter: TokenCounter::whitespace(),
            abbreviations: ENGLISH_ABBREVIATIONS.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Lazily segment `text`. Call again to restart from the beginning.
    pub fn sentences<'a>(&'a self, text: &'a str) -> Sentences<'a> {
        Sentences {
            segmenter: self,
            text,
            bounds: text.split_sentence_bound_indices().peekable(),
            char_pos: 0,
        }
    }

    fn ends_with_abbreviation(&self, span: &str) -> bool {
        let body = span.trim_end();
        if span[body.len()..].contains('\n') {
            return false;
        }
        let word = match body.split_whitespace().next_back() {
            Some(w) => w.trim_start_matches(['(', '[', '"', '\'', '\u{201C}', '\u{2018}']),
            None => return false,
        };
        if !word.ends_with('.') {
            return false;
        }
        self.abbreviations.contains(word) || is_initialism(word)
    }
}

/// Single letters each followed by a period: "J.", "e.g.", "U.S.".
fn is_initialism(word: &str) -> bool {
    let parts: Vec<&str> = word.trim_end_matches('.').split('.').collect();
    parts.iter().all(|p| {
        let mut chars = p.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
    }) && (parts.len() > 1 || word.chars().next().is_some_and(char::is_uppercase))
}

/// One sentence of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceSpan<'a> {
    raw: &'a str,
    pub byte_start: usize,
    pub byte_end: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub token_count: usize,
}

impl<'a> SentenceSpan<'a> {
    /// The exact source slice, including absorbed whitespace.
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// The sentence with surrounding whitespace trimmed.
    pub fn text(&self) -> &'a str {
        self.raw.trim()
    }
}

/// Iterator over the [`SentenceSpan`]s of a text.
pub struct Sentences<'a> {
    segmenter: &'a Segmenter,
    text: &'a str,
    bounds: Peekable<USentenceBoundIndices<'a>>,
    char_pos: usize,
}

impl<'a> Sentences<'a> {
    fn span(&mut self, start: usize, end: usize) -> SentenceSpan<'a> {
        let raw = &self.text[start..end];
        let char_start = self.char_pos;
        self.char_pos += raw.chars().count();
        SentenceSpan {
            raw,
            byte_start: start,
            byte_end: end,
            char_start,
            char_end: self.char_pos,
            token_count: self.segmenter.counter.count(raw.trim()),
        }
    }
}

impl<'a> Iterator for Sentences<'a> {
    type Item = SentenceSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut start: Option<usize> = None;
        let mut end = 0;

        while let Some((idx, segment)) = self.bounds.next() {
            let begin = *start.get_or_insert(idx);
            end = idx + segment.len();
            if self.text[begin..end].trim().is_empty() {
                continue;
            }
            while let Some((_, next)) = self.bounds.peek() {
                if !next.trim().is_empty() {
                    break;
                }
                end += next.len();
                self.bounds.next();
            }
            if self.bounds.peek().is_some()
                && self.segmenter.ends_with_abbreviation(&self.text[begin..end])
            {
                continue;
            }
            return Some(self.span(begin, end));
        }

        start.map(|begin| self.span(begin, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(text: &str) -> Vec<String> {
        Segmenter::whitespace()
            .sentences(text)
            .map(|s| s.text().to_string())
            .collect()
    }

    #[test]
    fn test_splits_simple_sentences() {
        assert_eq!(
            texts("The cat sat. The dog ran! Did it rain?"),
            vec!["The cat sat.", "The dog ran!", "Did it rain?"]
        );
    }

    #[test]
    fn test_does_not_split_on_abbreviations() {
        assert_eq!(
            texts("Dr. Smith reviewed Fig. 3 in detail. The results held."),
            vec!["Dr. Smith reviewed Fig. 3 in detail.", "The results held."]
        );
    }

    #[test]
    fn test_initials_and_latin_abbreviations() {
        assert_eq!(
            texts("J. R. Tolkien wrote it, e.g. The Hobbit. Next sentence."),
            vec!["J. R. Tolkien wrote it, e.g. The Hobbit.", "Next sentence."]
        );
    }

    #[test]
    fn test_extra_abbreviations() {
        let seg = Segmenter::with_counter("en", TokenCounter::whitespace(), &["Approx".to_string()])
            .unwrap();
        let spans: Vec<_> = seg
            .sentences("Approx. Ten people came. They left.")
            .map(|s| s.text())
            .collect();
        assert_eq!(spans, vec!["Approx. Ten people came.", "They left."]);
    }

    #[test]
    fn test_paragraph_break_ends_sentence_even_after_abbreviation() {
        assert_eq!(texts("See Fig.\n\nResults follow."), vec!["See Fig.", "Results follow."]);
    }

    #[test]
    fn test_spans_tile_input() {
        let text = "  Leading space. Heading\n\nBody one.  Body two?\n\nTail without period";
        let seg = Segmenter::whitespace();
        let spans: Vec<_> = seg.sentences(text).collect();
        let joined: String = spans.iter().map(|s| s.raw()).collect();
        assert_eq!(joined, text);

        assert_eq!(spans[0].char_start, 0);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].char_end, pair[1].char_start);
            assert_eq!(pair[0].byte_end, pair[1].byte_start);
        }
        assert_eq!(spans.last().unwrap().char_end, text.chars().count());
        assert!(spans.iter().all(|s| !s.text().is_empty()));
    }

    #[test]
    fn test_offsets_count_chars_not_bytes() {
        let text = "Café au lait. Naïve résumé.";
        let seg = Segmenter::whitespace();
        let spans: Vec<_> = seg.sentences(text).collect();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].char_end, "Café au lait. ".chars().count());
        assert_eq!(spans[1].char_end, text.chars().count());
        assert_ne!(spans[1].byte_end, spans[1].char_end);
        let chars: Vec<char> = text.chars().collect();
        let second: String = chars[spans[1].char_start..spans[1].char_end].iter().collect();
        assert_eq!(second, "Naïve résumé.");
    }

    #[test]
    fn test_restartable() {
        let seg = Segmenter::whitespace();
        let text = "One. Two. Three.";
        let first: Vec<_> = seg.sentences(text).collect();
        let second: Vec<_> = seg.sentences(text).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_token_counts_use_trimmed_text() {
        let seg = Segmenter::whitespace();
        let spans: Vec<_> = seg
            .sentences("Four words are here.   Two more.")
            .collect();
        assert_eq!(spans[0].token_count, 4);
        assert_eq!(spans[1].token_count, 2);
    }

    #[test]
    fn test_empty_and_whitespace_inputs() {
        assert_eq!(Segmenter::whitespace().sentences("").count(), 0);
        let seg = Segmenter::whitespace();
        let spans: Vec<_> = seg.sentences("   ").collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].token_count, 0);
    }

    #[test]
    fn test_rejects_unsupported_language() {
        let err = Segmenter::with_counter("de", TokenCounter::whitespace(), &[]).unwrap_err();
        assert!(matches!(err, ChunkingError::InvalidConfig(_)));
    }
}
