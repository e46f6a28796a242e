//! Consistency passes over canonical content.
//!
//! - [`dedup`]: collapse records sharing a slug
//! - [`parity`]: deep diff of the remote store against the snapshot
//! - [`references`]: dangling links, orphans and coverage
//! - [`validate`]: post-merge schema checks
//! - [`structure`]: field inventory of a dataset
//!
//! Every pass is a pure function over in-memory data. Findings are report
//! values, never errors.

pub mod dedup;
pub mod parity;
pub mod references;
pub mod structure;
pub mod validate;

pub use dedup::{
    DroppedRecord, DuplicateMerge, MergeResult, merge_collection, merge_into, merge_positioned,
};
pub use parity::{
    ExtraField, FieldMismatch, MissingRecord, ParityReport, diff_datasets, diff_document, json_eq,
};
pub use references::{
    CoverageReport, DanglingLink, Orphan, Reference, ReferenceOptions, check_references,
    coverage_percent, discover_references, parse_route,
};
pub use structure::{CollectionStructure, FieldStats, JsonType, StructureReport, inspect_structure};
pub use validate::{ValidationIssue, validate_offerings};
