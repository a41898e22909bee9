//! Text normalization applied before feature extraction

use regex::Regex;
use std::sync::OnceLock;

/// Longest text kept after cleaning, in characters
pub const MAX_TEXT_CHARS: usize = 32767;

fn long_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3,}\b").expect("valid number pattern"))
}

fn invisible_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\u{200B}-\u{200F}\u{FEFF}]")
            .expect("valid control-char pattern")
    })
}

/// Normalize raw email text for classification.
///
/// Currency symbols become words, numbers of three or more digits collapse
/// to a `num` token, control and zero-width characters are dropped and the
/// result is truncated to [`MAX_TEXT_CHARS`].
pub fn clean_text(text: &str) -> String {
    let text = text
        .replace('$', " dollar ")
        .replace('£', " pound ")
        .replace('€', " euro ");

    let text = long_number().replace_all(&text, " num ");
    let text = invisible_chars().replace_all(&text, "");

    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.into_owned(),
    }
}
