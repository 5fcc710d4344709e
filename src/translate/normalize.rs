//! Input normalisation and validation for the interactive translator.

use std::sync::OnceLock;

use regex::Regex;

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn word_char() -> &'static Regex {
    // Letters (including CJK ideographs) or digits in any script.
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}]").expect("static regex"))
}

/// Trim and collapse internal whitespace runs to single spaces.
/// This is the form sent to the backend and used as the cache key.
pub fn normalize(text: &str) -> String {
    whitespace_runs().replace_all(text.trim(), " ").into_owned()
}

/// False for empty, whitespace-only, or punctuation-only input.
pub fn is_translatable(text: &str) -> bool {
    !text.trim().is_empty() && word_char().is_match(text)
}

/// The user is between words; translating now would churn on a partial token.
pub fn ends_mid_word_break(text: &str) -> bool {
    text.ends_with(' ') || text.ends_with('\u{3000}')
}
