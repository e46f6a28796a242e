//! The migration (normalize, dedup, validate) report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use contentsync_consistency::{DroppedRecord, DuplicateMerge, ValidationIssue};
use contentsync_normalize::{FaqChange, FieldMapping, NormalizationAudit};
use contentsync_shared::{Collection, RecordFailure};

/// Record counts for one offering collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMigration {
    pub collection: Collection,
    pub input: usize,
    pub output: usize,
}

/// Everything a migration run did and found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// `snapshot` or `remote`.
    pub source: String,
    pub applied: bool,
    pub pushed: bool,
    pub collections: Vec<CollectionMigration>,
    pub faq_changes: BTreeMap<FaqChange, usize>,
    pub mappings: BTreeMap<FieldMapping, usize>,
    /// Audits of records normalization changed.
    pub normalized: Vec<NormalizationAudit>,
    pub duplicates: Vec<DuplicateMerge>,
    pub dropped: Vec<DroppedRecord>,
    pub validation_issues: Vec<ValidationIssue>,
    pub failures: Vec<RecordFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_backup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_backup: Option<String>,
}

impl MigrationReport {
    /// Count an audit and keep it if it changed anything.
    pub fn record_audit(&mut self, audit: NormalizationAudit) {
        *self.faq_changes.entry(audit.faq).or_default() += 1;
        for mapping in &audit.mappings {
            *self.mappings.entry(*mapping).or_default() += 1;
        }
        if audit.changed() {
            self.normalized.push(audit);
        }
    }
}
