//! Artifact cleanup for extracted PDF text.
//!
//! Applied once to the concatenated page text. The output is NFC
//! normalized, uses `"\n\n"` as the only paragraph separator and a single
//! space everywhere else, and [`clean_text`] is idempotent on it.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Paragraph separator used between pages and paragraphs.
pub const PARAGRAPH_BREAK: &str = "\n\n";

fn hyphen_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w)-[ \t]*\n[ \t]*(\p{Ll})").expect("static regex"))
}

fn page_footer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^page\s+\d+\s+of\s+\d+$").expect("static regex"))
}

fn blank_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("static regex"))
}

/// Clean extracted text.
///
/// In order: NFC normalization, line-ending normalization (form feeds
/// become paragraph breaks), end-of-line hyphenation rejoin, removal of
/// lines that are only digits or a `Page N of M` footer, then whitespace
/// collapse within each paragraph.
pub fn clean_text(raw: &str) -> String {
    let text: String = raw.nfc().collect();
    let text = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', PARAGRAPH_BREAK);

    let text = rejoin_hyphenation(text);

    let text = text
        .split('\n')
        .filter(|line| !is_page_number(line) && !is_page_footer(line))
        .collect::<Vec<_>>()
        .join("\n");

    blank_line()
        .split(&text)
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty() && !is_page_footer(para))
        .collect::<Vec<_>>()
        .join(PARAGRAPH_BREAK)
}

/// Repeats until stable: a line of one letter both ends and continues a
/// break (`"a-\nb-\nc"`), and matches cannot overlap.
fn rejoin_hyphenation(mut text: String) -> String {
    loop {
        let joined = match hyphen_break().replace_all(&text, "$1$2") {
            Cow::Borrowed(_) => return text,
            Cow::Owned(joined) => joined,
        };
        text = joined;
    }
}

fn is_page_footer(line: &str) -> bool {
    page_footer().is_match(line.trim())
}

fn is_page_number(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit())
}
