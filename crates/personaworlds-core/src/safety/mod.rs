//! Content safety validation.
//!
//! Every generated post, reply, preview variant, and battle opening passes
//! through [`validate_content`] before persistence or display. Rejections
//! are [`ContentViolation`]s, mapped to 400s on synchronous paths and to
//! permanent job failures in the worker.

pub mod sanitize;

use std::sync::OnceLock;

use regex::Regex;

/// Small English profanity list. Multilingual coverage is out of scope.
const PROFANITY_PATTERN: &str = r"(?i)\b(fuck|shit|bitch|asshole|cunt|faggot)\b";

/// URL-like tokens; more than [`MAX_LINKS`] of these rejects the content.
const URL_PATTERN: &str = r"(?i)https?://|www\.";

/// Maximum number of URL-like tokens allowed in one piece of content.
const MAX_LINKS: usize = 2;

fn profanity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PROFANITY_PATTERN).expect("profanity pattern compiles"))
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(URL_PATTERN).expect("url pattern compiles"))
}

/// Why a piece of content was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentViolation {
    /// Content is empty after trimming.
    Empty,
    /// Content exceeds the rune cap.
    TooLong {
        /// Rune count of the content.
        len: usize,
        /// Maximum allowed rune count.
        max: usize,
    },
    /// Content matches the profanity list.
    Profanity,
    /// Content contains more than the allowed number of URL-like tokens.
    TooManyLinks {
        /// Number of URL-like tokens found.
        count: usize,
    },
}

impl std::fmt::Display for ContentViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "content is empty"),
            Self::TooLong { len, max } => {
                write!(f, "content is {len} characters, limit is {max}")
            }
            Self::Profanity => write!(f, "content failed safety validation"),
            Self::TooManyLinks { count } => {
                write!(f, "content contains {count} links, limit is {MAX_LINKS}")
            }
        }
    }
}

/// Validate generated content against the safety rules.
///
/// Returns the trimmed content on success. `max_runes` is counted in
/// Unicode scalar values, not bytes.
pub fn validate_content(content: &str, max_runes: usize) -> Result<String, ContentViolation> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ContentViolation::Empty);
    }

    let len = trimmed.chars().count();
    if len > max_runes {
        return Err(ContentViolation::TooLong { len, max: max_runes });
    }

    if profanity_regex().is_match(trimmed) {
        return Err(ContentViolation::Profanity);
    }

    let link_count = url_regex().find_iter(trimmed).count();
    if link_count > MAX_LINKS {
        return Err(ContentViolation::TooManyLinks { count: link_count });
    }

    Ok(trimmed.to_string())
}

/// Truncate a string to at most `max_runes` Unicode scalar values.
pub fn truncate_runes(s: &str, max_runes: usize) -> String {
    if s.chars().count() <= max_runes {
        return s.to_string();
    }
    s.chars().take(max_runes).collect()
}

/// Truncate for preview/log display, appending an ellipsis when cut.
pub fn truncate_preview(s: &str, max_runes: usize) -> String {
    if s.chars().count() <= max_runes {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_runes.saturating_sub(1)).collect();
    format!("{}\u{2026}", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_content() {
        let result = validate_content("  A perfectly fine opening statement.  ", 500);
        assert_eq!(result.unwrap(), "A perfectly fine opening statement.");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(validate_content("   \n\t ", 500), Err(ContentViolation::Empty));
    }

    #[test]
    fn rejects_overlong_by_runes_not_bytes() {
        // 10 multi-byte runes fit a rune cap of 10 even though the byte
        // length is far larger.
        let text = "ğüşiöçĞÜŞİ";
        assert!(validate_content(text, 10).is_ok());
        assert!(matches!(
            validate_content(text, 9),
            Err(ContentViolation::TooLong { len: 10, max: 9 })
        ));
    }

    #[test]
    fn rejects_profanity_case_insensitive() {
        assert_eq!(
            validate_content("well SHIT happens", 500),
            Err(ContentViolation::Profanity)
        );
    }

    #[test]
    fn profanity_matches_whole_words_only() {
        // "scunthorpe" must not trip the word-boundary regex
        assert!(validate_content("greetings from Scunthorpe", 500).is_ok());
    }

    #[test]
    fn allows_two_links() {
        let text = "see https://a.example and www.b.example";
        assert!(validate_content(text, 500).is_ok());
    }

    #[test]
    fn rejects_three_links() {
        let text = "https://a.example http://b.example www.c.example";
        assert_eq!(
            validate_content(text, 500),
            Err(ContentViolation::TooManyLinks { count: 3 })
        );
    }

    #[test]
    fn truncate_runes_respects_boundaries() {
        assert_eq!(truncate_runes("merhaba dünya", 9), "merhaba d");
        assert_eq!(truncate_runes("short", 10), "short");
    }

    #[test]
    fn truncate_preview_appends_ellipsis() {
        let result = truncate_preview("a long preview string", 10);
        assert!(result.chars().count() <= 10);
        assert!(result.ends_with('\u{2026}'));
        assert_eq!(truncate_preview("tiny", 10), "tiny");
    }
}
