//! `migrate`: normalize, merge and validate the offering collections.
//!
//! 1. Load the dataset (snapshot file, or a fresh remote export)
//! 2. Normalize every offering to the canonical shape
//! 3. Collapse duplicates per collection
//! 4. Validate the merged records
//! 5. With `apply`: back up and replace the snapshot
//! 6. With `push`: back up the remote dataset, then write each offering back
//!
//! Testimonials, pages and singletons pass through untouched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use contentsync_consistency::{merge_positioned, validate_offerings};
use contentsync_normalize::normalize_offering;
use contentsync_reports::{CollectionMigration, MigrationReport};
use contentsync_shared::{
    Collection, ContentSyncError, RecordFailure, Result, Snapshot, SnapshotConfig, record_key,
    str_field,
};
use contentsync_store::{
    DocumentStore, export_dataset, load_snapshot, write_json_atomic, write_snapshot,
};

use crate::artifacts::{ArtifactMeta, ReportWriter, new_run};
use crate::progress::ProgressReporter;

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub snapshot_path: PathBuf,
    pub backup_dir: PathBuf,
    /// Read from the remote store instead of the snapshot file.
    pub from_remote: bool,
    /// Replace the snapshot with the migrated dataset.
    pub apply: bool,
    /// Also write migrated offerings to the remote store. Requires `apply`.
    pub push: bool,
}

impl MigrateOptions {
    pub fn from_config(config: &SnapshotConfig) -> Self {
        Self {
            snapshot_path: PathBuf::from(&config.path),
            backup_dir: PathBuf::from(&config.backup_dir),
            from_remote: false,
            apply: false,
            push: false,
        }
    }

    /// Whether this run needs the remote store at all.
    pub fn needs_store(&self) -> bool {
        self.from_remote || self.push
    }
}

#[derive(Debug)]
pub struct MigrateResult {
    pub dataset: Snapshot,
    pub report: MigrationReport,
    pub artifacts: Vec<ArtifactMeta>,
}

/// Run the migration job and write its report.
///
/// `store` may be `None` when [`MigrateOptions::needs_store`] is false.
#[instrument(skip_all, fields(from_remote = options.from_remote, apply = options.apply, push = options.push))]
pub async fn migrate(
    store: Option<&dyn DocumentStore>,
    options: &MigrateOptions,
    writer: &ReportWriter,
    progress: &dyn ProgressReporter,
) -> Result<MigrateResult> {
    if options.push && !options.apply {
        return Err(ContentSyncError::config("--push requires --apply"));
    }
    let store = match (store, options.needs_store()) {
        (None, true) => {
            return Err(ContentSyncError::config(
                "remote store is required to read from or push to it",
            ));
        }
        (store, _) => store,
    };

    let meta = new_run(!options.apply);
    info!(run_id = %meta.run_id, "starting migration");

    // --- Load ---
    progress.phase("Loading dataset");
    let (dataset, source) = match store {
        Some(store) if options.from_remote => (export_dataset(store).await?, "remote"),
        _ => (load_snapshot(&options.snapshot_path)?, "snapshot"),
    };

    // --- Normalize, merge, validate ---
    progress.phase("Normalizing and merging offerings");
    let mut report = MigrationReport {
        source: source.to_string(),
        ..Default::default()
    };
    let migrated = migrate_dataset(dataset, &mut report)?;
    for entry in &report.collections {
        progress.collection(entry.collection.as_str(), entry.output);
    }

    // --- Apply ---
    if options.apply {
        progress.phase("Writing snapshot");
        let write = write_snapshot(&options.snapshot_path, &options.backup_dir, &migrated)?;
        report.applied = true;
        report.snapshot_backup = write.backup.map(|p| p.display().to_string());
    }

    // --- Push ---
    if let Some(store) = store.filter(|_| options.push) {
        progress.phase("Backing up remote store");
        let remote = export_dataset(store).await?;
        let backup = remote_backup_path(&options.backup_dir);
        write_json_atomic(&backup, &remote)?;
        report.remote_backup = Some(backup.display().to_string());

        progress.phase("Pushing offerings");
        push_offerings(store, &migrated, &mut report.failures).await;
        report.pushed = true;
    }

    // --- Report ---
    let artifacts = writer.write(&report, &meta)?;

    info!(
        duplicates = report.duplicates.len(),
        dropped = report.dropped.len(),
        normalized = report.normalized.len(),
        issues = report.validation_issues.len(),
        failures = report.failures.len(),
        applied = report.applied,
        pushed = report.pushed,
        "migration complete"
    );
    progress.done(&artifacts);

    Ok(MigrateResult {
        dataset: migrated,
        report,
        artifacts,
    })
}

/// Normalize, merge and validate every offering collection of `dataset`.
///
/// Records that cannot be normalized are left out and reported as failures.
#[instrument(skip_all, fields(records = dataset.record_count()))]
pub fn migrate_dataset(mut dataset: Snapshot, report: &mut MigrationReport) -> Result<Snapshot> {
    let testimonial_ids: HashSet<String> = dataset
        .testimonials
        .iter()
        .filter_map(|t| str_field(t, "id"))
        .map(str::to_string)
        .collect();

    for collection in Collection::OFFERINGS {
        let Some(list) = dataset.list_mut(collection) else {
            continue;
        };
        let raw = std::mem::take(list);
        let input = raw.len();

        let mut records = Vec::with_capacity(input);
        for (index, value) in raw.iter().enumerate() {
            match normalize_offering(value) {
                Ok(normalized) => {
                    debug!(
                        id = %normalized.audit.id,
                        faq = %normalized.audit.faq,
                        mappings = normalized.audit.mappings.len(),
                        "normalized"
                    );
                    report.record_audit(normalized.audit);
                    records.push((index, normalized.offering));
                }
                Err(e) => {
                    let id = record_key(value).unwrap_or_else(|| format!("#{index}"));
                    warn!(%collection, %id, error = %e, "record could not be normalized");
                    report
                        .failures
                        .push(RecordFailure::new(collection.as_str(), id, e));
                }
            }
        }

        let merged = merge_positioned(collection, records);
        report.validation_issues.extend(validate_offerings(
            collection,
            &merged.records,
            &testimonial_ids,
        ));
        report.duplicates.extend(merged.merges);
        report.dropped.extend(merged.dropped);

        let output = merged
            .records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                ContentSyncError::validation(format!("failed to serialize {collection}: {e}"))
            })?;

        report.collections.push(CollectionMigration {
            collection,
            input,
            output: output.len(),
        });
        *list = output;
    }

    Ok(dataset)
}

/// Timestamped file for the pre-push copy of the remote dataset.
fn remote_backup_path(backup_dir: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    backup_dir.join(format!("remote.{stamp}.json"))
}

/// Write every migrated offering back. A failed write is recorded and the
/// push continues.
async fn push_offerings(
    store: &dyn DocumentStore,
    dataset: &Snapshot,
    failures: &mut Vec<RecordFailure>,
) {
    let mut written = 0usize;

    for collection in Collection::OFFERINGS {
        for record in dataset.records(collection) {
            let Some(id) = str_field(record, "id").or_else(|| str_field(record, "slug")) else {
                continue;
            };
            match store.put(collection.as_str(), id, record).await {
                Ok(()) => {
                    written += 1;
                    debug!(%collection, %id, "pushed");
                }
                Err(e) => {
                    warn!(%collection, %id, error = %e, "push failed");
                    failures.push(RecordFailure::new(collection.as_str(), id, e));
                }
            }
        }
    }

    info!(written, failed = failures.len(), "push complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use contentsync_store::MemoryStore;
    use serde_json::{Value, json};

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("cs-migrate-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn options(dir: &Path) -> MigrateOptions {
        MigrateOptions {
            snapshot_path: dir.join("content.json"),
            backup_dir: dir.join("backups"),
            from_remote: false,
            apply: false,
            push: false,
        }
    }

    fn duplicate_programs() -> Snapshot {
        serde_json::from_value(json!({
            "programs": [
                {"id": "a", "slug": "x", "title": "Old", "outcomes": ["A"]},
                {"id": "b", "slug": "x", "title": "New", "outcomes": ["B"]}
            ],
            "testimonials": [{"id": "t1", "text": "Hola"}],
            "pages": {"home": {"featuredPrograms": ["x"]}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_slugs_collapse_end_to_end() {
        let dir = temp_dir();
        let mut options = options(&dir);
        options.apply = true;
        std::fs::write(
            &options.snapshot_path,
            serde_json::to_string(&duplicate_programs()).unwrap(),
        )
        .unwrap();
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let result = migrate(None, &options, &writer, &SilentProgress)
            .await
            .unwrap();

        let programs = &result.dataset.programs;
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0]["id"], "a");
        assert_eq!(programs[0]["title"], "New");
        assert_eq!(programs[0]["outcomes"], json!(["A", "B"]));

        assert_eq!(
            serde_json::to_value(&result.report.duplicates).unwrap(),
            json!([{"collection": "programs", "slug": "x", "keptId": "a", "mergedIds": ["b"]}])
        );
        assert_eq!(result.report.source, "snapshot");
        assert!(result.report.applied);
        assert!(result.report.snapshot_backup.is_some());

        let written = load_snapshot(&options.snapshot_path).unwrap();
        assert_eq!(written.programs, result.dataset.programs);
        assert_eq!(written.testimonials, duplicate_programs().testimonials);
        assert!(dir.join("reports/migration-report.json").is_file());
        assert!(dir.join("reports/migration-report.md").is_file());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn dry_run_leaves_snapshot_alone() {
        let dir = temp_dir();
        let options = options(&dir);
        let original = serde_json::to_string(&duplicate_programs()).unwrap();
        std::fs::write(&options.snapshot_path, &original).unwrap();
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let result = migrate(None, &options, &writer, &SilentProgress)
            .await
            .unwrap();
        assert!(!result.report.applied);
        assert_eq!(result.dataset.programs.len(), 1);
        assert_eq!(
            std::fs::read_to_string(&options.snapshot_path).unwrap(),
            original
        );
        assert!(!options.backup_dir.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn push_backs_up_remote_and_records_failures() {
        let dir = temp_dir();
        let mut options = options(&dir);
        options.from_remote = true;
        options.apply = true;
        options.push = true;

        let seed: Snapshot = serde_json::from_value(json!({
            "programs": [
                {"id": "p1", "slug": "lab", "title": "Lab", "faqs": [{"question": "Q?", "answer": "A."}]},
                {"id": "p2", "slug": "studio", "title": "Studio"}
            ]
        }))
        .unwrap();
        let store = MemoryStore::from_snapshot(&seed).with_failing_write("programs", "p2");
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let result = migrate(Some(&store), &options, &writer, &SilentProgress)
            .await
            .unwrap();

        assert!(result.report.pushed);
        assert_eq!(result.report.source, "remote");
        assert_eq!(result.report.failures.len(), 1);
        assert_eq!(result.report.failures[0].id, "p2");

        let backup = result.report.remote_backup.as_deref().unwrap();
        let backed_up = load_snapshot(Path::new(backup)).unwrap();
        assert_eq!(backed_up.programs.len(), 2);
        assert!(backed_up.programs[0].get("faqs").is_some());

        let pushed = store.get("programs", "p1").await.unwrap().unwrap();
        assert!(pushed.get("faqs").is_none());
        assert_eq!(pushed["faq"]["items"], json!([{"q": "Q?", "a": "A."}]));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn push_without_apply_is_rejected() {
        let dir = temp_dir();
        let mut options = options(&dir);
        options.push = true;
        let store = MemoryStore::new();
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let err = migrate(Some(&store), &options, &writer, &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.is_fatal_config());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_snapshot_is_fatal() {
        let dir = temp_dir();
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let err = migrate(None, &options(&dir), &writer, &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.is_fatal_config());
        assert!(!dir.join("reports").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn dataset_migration_reports_findings() {
        let dataset: Snapshot = serde_json::from_value(json!({
            "experiences": [
                "not an object",
                {"id": "e1", "slug": "retreat", "title": "Retreat", "testimonialRefs": ["t9"]},
                {"title": "No identity"}
            ],
            "solutions": [
                {"id": "s1", "slug": "audit", "title": "Audit",
                 "faq": {"title": "", "subtitle": "", "items": []}}
            ]
        }))
        .unwrap();

        let mut report = MigrationReport::default();
        let migrated = migrate_dataset(dataset, &mut report).unwrap();

        assert_eq!(migrated.experiences.len(), 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].index, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "#0");
        assert!(
            report
                .validation_issues
                .iter()
                .any(|i| i.field == "testimonialRefs" && i.id == "retreat")
        );

        let solutions = report
            .collections
            .iter()
            .find(|c| c.collection == Collection::Solutions)
            .unwrap();
        assert_eq!((solutions.input, solutions.output), (1, 1));
        assert_eq!(
            migrated.solutions[0]["faq"],
            json!({"title": "", "subtitle": "", "items": []})
        );
        assert_eq!(migrated.programs, Vec::<Value>::new());
    }
}
