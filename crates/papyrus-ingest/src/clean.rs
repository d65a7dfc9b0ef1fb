//! Text cleaning passes applied before embedding.
//!
//! `clean_description` strips the noise that dominates scraped metadata:
//! URLs, timestamps, over-long tokens, and anything outside plain
//! alphanumeric text. `clean_latex` keeps markup but drops non-ASCII
//! artifacts left behind by PDF conversion.

use once_cell::sync::Lazy;
use regex::Regex;

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+|www\.\S+").unwrap());
static TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+:\d+:\d+|\d+:\d+").unwrap());
static LONG_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S{30,}").unwrap());
static SPECIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9 \n.]").unwrap());
static NEWLINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());

static BULLET_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x{2022}-\x{5424}]").unwrap());
static NON_ASCII: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").unwrap());

/// Clean free-text descriptions down to plain alphanumeric prose.
pub fn clean_description(text: &str) -> String {
    let text = URL.replace_all(text, "");
    let text = TIMESTAMP.replace_all(&text, "");
    let text = LONG_TOKEN.replace_all(&text, "");
    let text = SPECIAL.replace_all(&text, "");
    let text = NEWLINE_RUN.replace_all(&text, "\n");
    let text = SPACE_RUN.replace_all(&text, " ");
    text.into_owned()
}

/// Strip non-ASCII conversion artifacts from markup content.
pub fn clean_latex(text: &str) -> String {
    let text = BULLET_RANGE.replace_all(text, "");
    let text = NON_ASCII.replace_all(&text, "");
    let text = SPACE_RUN.replace_all(&text, " ");
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_urls_and_timestamps() {
        let cleaned = clean_description("intro http://example.com/x 12:30 outro www.site.org end");
        assert!(!cleaned.contains("http"));
        assert!(!cleaned.contains("12:30"));
        assert!(!cleaned.contains("www"));
        assert!(cleaned.contains("intro"));
        assert!(cleaned.contains("outro"));
    }

    #[test]
    fn removes_long_tokens_and_special_characters() {
        let long_token = "a".repeat(35);
        let cleaned = clean_description(&format!("keep {long_token} drop-this? fine."));
        assert!(!cleaned.contains(&long_token));
        assert!(!cleaned.contains('?'));
        assert!(!cleaned.contains('-'));
        assert!(cleaned.contains("fine."));
    }

    #[test]
    fn collapses_runs() {
        assert_eq!(clean_description("a  b\n\n\nc"), "a b\nc");
    }

    #[test]
    fn clean_latex_keeps_markup_and_drops_non_ascii() {
        let cleaned = clean_latex("\\section{Résumé} • item  x");
        assert!(cleaned.contains("\\section{"));
        assert!(!cleaned.contains('é'));
        assert!(!cleaned.contains('•'));
        assert!(!cleaned.contains("  "));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = clean_description("a  b?? http://x.y  c");
        assert_eq!(clean_description(&once), once);
    }
}
