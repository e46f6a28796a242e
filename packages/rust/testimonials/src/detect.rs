//! Language detection for testimonial text.

use std::sync::LazyLock;

use regex::Regex;

/// Language code recorded when detection is not possible or not confident.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Cleaned texts shorter than this are never sent to the detector.
pub const MIN_DETECT_CHARS: usize = 10;

/// Maps text to an ISO-639-3-like code.
pub trait LanguageDetector: Send + Sync {
    /// Detected language code, or `None` when the detector is not confident.
    fn detect(&self, text: &str) -> Option<String>;
}

/// Trigram detector backed by `whatlang`. Returns ISO-639-3 codes (`spa`, `eng`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<String> {
        whatlang::detect(text)
            .filter(whatlang::Info::is_reliable)
            .map(|info| info.lang().code().to_string())
    }
}

/// Strip everything but letters, digits and single spaces.
pub fn clean_text(text: &str) -> String {
    static NOISE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid regex"));
    static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let stripped = NOISE_RE.replace_all(text, " ");
    SPACE_RE.replace_all(stripped.trim(), " ").into_owned()
}

/// Detect the language of raw testimonial text, falling back to
/// [`UNKNOWN_LANGUAGE`] for short or ambiguous text.
pub fn detect_language(detector: &dyn LanguageDetector, text: &str) -> String {
    let cleaned = clean_text(text);
    let letters = cleaned.chars().filter(|c| !c.is_whitespace()).count();
    if letters < MIN_DETECT_CHARS {
        return UNKNOWN_LANGUAGE.to_string();
    }

    detector
        .detect(&cleaned)
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

/// Spanish under either code family.
pub fn is_spanish(code: &str) -> bool {
    matches!(code, "spa" | "es")
}
