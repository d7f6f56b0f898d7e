//! Privacy filter.
//!
//! Iteratively (not regex-based) strips `<private>...</private>` spans
//! from text, case-insensitive on the tag name, replacing each match with
//! `[REDACTED]`. An unclosed `<private>` keeps the remainder of the string
//! verbatim — the filter only acts on spans it can fully delimit.

const OPEN_LEN: usize = "<private>".len();
const CLOSE_TAG: &str = "</private>";

/// Strips every `<private>...</private>` span from `text`.
pub fn strip_private(text: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    loop {
        match find_open_tag(&lower, cursor) {
            Some(open_start) => {
                out.push_str(&text[cursor..open_start]);
                let content_start = open_start + OPEN_LEN;
                match find_close_tag(&lower, content_start) {
                    Some(close_start) => {
                        out.push_str("[REDACTED]");
                        cursor = close_start + CLOSE_TAG.len();
                    }
                    None => {
                        // Unclosed tag: keep the remainder verbatim.
                        out.push_str(&text[open_start..]);
                        cursor = text.len();
                        break;
                    }
                }
            }
            None => {
                out.push_str(&text[cursor..]);
                break;
            }
        }
    }

    out
}

fn find_open_tag(lower: &str, from: usize) -> Option<usize> {
    lower[from..].find("<private>").map(|i| i + from)
}

fn find_close_tag(lower: &str, from: usize) -> Option<usize> {
    lower[from..].find(&CLOSE_TAG.to_ascii_lowercase()).map(|i| i + from)
}

/// A string is "fully private" iff stripping it collapses to empty or to
/// the literal `[REDACTED]` marker.
pub fn is_fully_private(text: &str) -> bool {
    let stripped = strip_private(text);
    let trimmed = stripped.trim();
    trimmed.is_empty() || trimmed == "[REDACTED]"
}
