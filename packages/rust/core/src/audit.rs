//! Read-only audit jobs: `parity`, `coverage` and `structure`.
//!
//! None of these write anything but their own report.

use std::path::Path;

use tracing::{info, instrument};

use contentsync_consistency::{
    CoverageReport, ParityReport, ReferenceOptions, StructureReport, check_references,
    diff_datasets, inspect_structure,
};
use contentsync_shared::Result;
use contentsync_store::{DocumentStore, export_dataset, load_snapshot};

use crate::artifacts::{JobReport, ReportWriter, new_run};
use crate::progress::ProgressReporter;

/// Deep-diff the remote store against the snapshot file.
#[instrument(skip_all, fields(snapshot = %snapshot_path.display()))]
pub async fn parity(
    store: &dyn DocumentStore,
    snapshot_path: &Path,
    writer: &ReportWriter,
    progress: &dyn ProgressReporter,
) -> Result<JobReport<ParityReport>> {
    let meta = new_run(true);

    progress.phase("Loading snapshot");
    let snapshot = load_snapshot(snapshot_path)?;

    progress.phase("Exporting remote store");
    let remote = export_dataset(store).await?;

    progress.phase("Comparing");
    let report = diff_datasets(&remote, &snapshot);
    let artifacts = writer.write(&report, &meta)?;

    info!(
        missing_in_json = report.missing_in_json.len(),
        missing_in_firestore = report.missing_in_firestore.len(),
        field_mismatches = report.field_mismatches.len(),
        extra_fields = report.extra_fields_in_json.len(),
        "parity check complete"
    );
    progress.done(&artifacts);

    Ok(JobReport { report, artifacts })
}

/// Dangling links, orphans and coverage of the snapshot file.
#[instrument(skip_all, fields(snapshot = %snapshot_path.display(), heuristics = options.path_heuristics))]
pub fn coverage(
    snapshot_path: &Path,
    options: &ReferenceOptions,
    writer: &ReportWriter,
    progress: &dyn ProgressReporter,
) -> Result<JobReport<CoverageReport>> {
    let meta = new_run(true);

    progress.phase("Loading snapshot");
    let snapshot = load_snapshot(snapshot_path)?;

    progress.phase("Checking references");
    let report = check_references(&snapshot, options);
    let artifacts = writer.write(&report, &meta)?;

    info!(
        coverage = report.coverage,
        dangling = report.dangling_links.len(),
        orphans = report.orphan_count,
        "coverage check complete"
    );
    progress.done(&artifacts);

    Ok(JobReport { report, artifacts })
}

/// Field inventory of the remote store.
#[instrument(skip_all)]
pub async fn structure(
    store: &dyn DocumentStore,
    writer: &ReportWriter,
    progress: &dyn ProgressReporter,
) -> Result<JobReport<StructureReport>> {
    let meta = new_run(true);

    progress.phase("Exporting remote store");
    let remote = export_dataset(store).await?;

    progress.phase("Inspecting structure");
    let report = inspect_structure(&remote);
    for collection in &report.collections {
        progress.collection(&collection.name, collection.document_count);
    }
    let artifacts = writer.write(&report, &meta)?;

    info!(collections = report.collections.len(), "structure report complete");
    progress.done(&artifacts);

    Ok(JobReport { report, artifacts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use contentsync_shared::Snapshot;
    use contentsync_store::{MemoryStore, write_json_atomic};
    use serde_json::{Value, json};
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cs-audit-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn dataset() -> Snapshot {
        serde_json::from_value(json!({
            "programs": [
                {"id": "p1", "slug": "lab", "title": "Lab", "testimonialRefs": ["t1"]},
                {"id": "p2", "slug": "quiet", "title": "Quiet"}
            ],
            "testimonials": [{"id": "t1", "text": "Great"}],
            "pages": {"home": {"title": "Home"}},
            "navigation": {"menu": [
                {"label": "Lab", "href": "/programs/lab"},
                {"label": "Ghost", "href": "/programs/ghost"}
            ]}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn parity_of_fresh_export_is_clean() {
        let dir = temp_dir();
        let snapshot_path = dir.join("content.json");
        write_json_atomic(&snapshot_path, &dataset()).unwrap();
        let store = MemoryStore::from_snapshot(&dataset());
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let result = parity(&store, &snapshot_path, &writer, &SilentProgress)
            .await
            .unwrap();
        assert!(result.report.is_clean());
        assert_eq!(result.artifacts[0].filename, "parity-report.json");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn parity_reports_remote_drift() {
        let dir = temp_dir();
        let snapshot_path = dir.join("content.json");
        write_json_atomic(&snapshot_path, &dataset()).unwrap();
        let store = MemoryStore::from_snapshot(&dataset());
        store
            .put("programs", "p1", &json!({"slug": "lab", "title": "Lab v2", "testimonialRefs": ["t1"]}))
            .await
            .unwrap();
        store
            .put("programs", "p3", &json!({"slug": "new", "title": "New"}))
            .await
            .unwrap();
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let report = parity(&store, &snapshot_path, &writer, &SilentProgress)
            .await
            .unwrap()
            .report;
        assert_eq!(report.missing_in_json.len(), 1);
        assert_eq!(report.missing_in_json[0].id, "new");
        assert_eq!(report.field_mismatches.len(), 1);
        assert_eq!(report.field_mismatches[0].field, "title");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn coverage_finds_ghost_link_and_orphan() {
        let dir = temp_dir();
        let snapshot_path = dir.join("content.json");
        write_json_atomic(&snapshot_path, &dataset()).unwrap();
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let result = coverage(
            &snapshot_path,
            &ReferenceOptions::default(),
            &writer,
            &SilentProgress,
        )
        .unwrap();

        let report = result.report;
        assert_eq!(report.dangling_links.len(), 1);
        assert_eq!(report.dangling_links[0].target, "ghost");
        assert_eq!(report.orphans.len(), 1);
        assert_eq!(report.orphans[0].id, "quiet");

        let json: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.join("reports/coverage-report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["report"]["coverage"], report.coverage);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn structure_covers_remote_collections() {
        let dir = temp_dir();
        let store = MemoryStore::from_snapshot(&dataset());
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let report = structure(&store, &writer, &SilentProgress)
            .await
            .unwrap()
            .report;
        let programs = report
            .collections
            .iter()
            .find(|c| c.name == "programs")
            .unwrap();
        assert_eq!(programs.document_count, 2);
        assert!(report.collections.iter().any(|c| c.name == "site/navigation"));
        assert!(dir.join("reports/structure-report.md").is_file());

        std::fs::remove_dir_all(&dir).ok();
    }
}
