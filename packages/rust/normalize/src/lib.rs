//! Schema normalization for content records.
//!
//! Raw records arrive in whatever shape they were written in over the years.
//! [`normalize_offering`] and [`normalize_testimonial`] map them onto the
//! canonical shapes in `contentsync_shared`, and the FAQ block goes through
//! [`normalize_faq`] on the way. Normalizing a canonical record is a no-op.

pub mod faq;
pub mod offering;

pub use faq::{FaqChange, LegacyFaq, normalize_faq};
pub use offering::{
    FieldMapping, NormalizationAudit, NormalizedOffering, normalize_offering,
    normalize_testimonial, parse_price,
};
