//! Multilingual annotation of testimonials.
//!
//! [`TestimonialProcessor`] reads the testimonials collection straight from
//! the remote store, detects each record's language, translates Spanish text
//! to the target language, and writes the annotated record back.

pub mod detect;
pub mod processor;
pub mod translate;

pub use detect::{
    LanguageDetector, MIN_DETECT_CHARS, UNKNOWN_LANGUAGE, WhatlangDetector, clean_text,
    detect_language, is_spanish,
};
pub use processor::{
    PROCESSING_VERSION, ProcessingState, ProcessingSummary, ProcessorOptions, TRANSLATION_MARKER,
    TestimonialOutcome, TestimonialProcessor,
};
pub use translate::{GoogleTranslator, Translator};
