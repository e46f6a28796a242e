//! End-to-end jobs for contentsync.
//!
//! Each job takes its collaborators explicitly (a [`DocumentStore`], report
//! writer, progress reporter), runs one batch operation, and writes its
//! report to disk as JSON and Markdown.
//!
//! [`DocumentStore`]: contentsync_store::DocumentStore

pub mod artifacts;
pub mod audit;
pub mod export;
pub mod migrate;
pub mod progress;
pub mod testimonials;

pub use artifacts::{ArtifactMeta, JobReport, ReportWriter, new_run};
pub use audit::{coverage, parity, structure};
pub use export::{ExportOptions, ExportResult, export};
pub use migrate::{MigrateOptions, MigrateResult, migrate, migrate_dataset};
pub use progress::{ProgressReporter, SilentProgress};
pub use testimonials::process_testimonials;
