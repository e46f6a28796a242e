//! Shared types, error model, and configuration for contentsync.
//!
//! This crate is the foundation depended on by all other contentsync crates.
//! It provides:
//! - [`ContentSyncError`]: the unified error type
//! - Dataset types ([`Snapshot`], [`Collection`], [`Singleton`])
//! - Canonical entity shapes ([`Offering`], [`Faq`], [`Testimonial`])
//! - Configuration ([`AppConfig`], [`StoreConfig`], config loading)

pub mod config;
pub mod content;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ReferencesConfig, ReportsConfig, SnapshotConfig, StoreConfig, StoreCredentials,
    TranslationConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_snapshot_exists, validate_store_credentials, validate_translation_key,
};
pub use content::{
    Author, Cta, Faq, FaqItem, Format, Hero, Offering, Price, ProcessingStatus, Seo, Testimonial,
};
pub use error::{ContentSyncError, RecordFailure, Result};
pub use types::{
    Collection, SINGLETON_COLLECTION, Singleton, Snapshot, record_key, str_field,
};
