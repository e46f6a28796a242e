//! `export`: pull the remote store into the snapshot file.

use std::path::PathBuf;

use tracing::{info, instrument};

use contentsync_shared::{Collection, Result, Snapshot, SnapshotConfig};
use contentsync_store::{DocumentStore, SnapshotWrite, export_dataset, write_snapshot};

use crate::progress::ProgressReporter;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub snapshot_path: PathBuf,
    pub backup_dir: PathBuf,
    /// Overwrite the snapshot. Without it the export is only counted.
    pub apply: bool,
}

impl ExportOptions {
    pub fn from_config(config: &SnapshotConfig, apply: bool) -> Self {
        Self {
            snapshot_path: PathBuf::from(&config.path),
            backup_dir: PathBuf::from(&config.backup_dir),
            apply,
        }
    }
}

#[derive(Debug)]
pub struct ExportResult {
    pub dataset: Snapshot,
    /// Present when the snapshot was written.
    pub write: Option<SnapshotWrite>,
}

#[instrument(skip_all, fields(apply = options.apply))]
pub async fn export(
    store: &dyn DocumentStore,
    options: &ExportOptions,
    progress: &dyn ProgressReporter,
) -> Result<ExportResult> {
    progress.phase("Exporting remote store");
    let dataset = export_dataset(store).await?;
    for collection in Collection::ALL {
        progress.collection(collection.as_str(), dataset.records(collection).len());
    }

    let write = if options.apply {
        progress.phase("Writing snapshot");
        Some(write_snapshot(
            &options.snapshot_path,
            &options.backup_dir,
            &dataset,
        )?)
    } else {
        info!(records = dataset.record_count(), "dry run; snapshot not written");
        None
    };

    progress.done(&[]);
    Ok(ExportResult { dataset, write })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use contentsync_store::{MemoryStore, load_snapshot};
    use serde_json::json;

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("cs-export-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn seeded_store() -> MemoryStore {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "programs": [{"id": "p1", "slug": "lab", "title": "Lab"}],
            "pages": {"home": {"title": "Home"}},
            "settings": {"siteName": "Example"}
        }))
        .unwrap();
        MemoryStore::from_snapshot(&snapshot)
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let dir = temp_dir();
        let options = ExportOptions {
            snapshot_path: dir.join("content.json"),
            backup_dir: dir.join("backups"),
            apply: false,
        };

        let result = export(&seeded_store(), &options, &SilentProgress).await.unwrap();
        assert!(result.write.is_none());
        assert_eq!(result.dataset.programs.len(), 1);
        assert!(!options.snapshot_path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn apply_backs_up_then_replaces() {
        let dir = temp_dir();
        let options = ExportOptions {
            snapshot_path: dir.join("content.json"),
            backup_dir: dir.join("backups"),
            apply: true,
        };
        std::fs::write(&options.snapshot_path, r#"{"programs": []}"#).unwrap();

        let result = export(&seeded_store(), &options, &SilentProgress).await.unwrap();
        let write = result.write.unwrap();
        let backup = write.backup.unwrap();
        assert_eq!(
            std::fs::read_to_string(backup).unwrap(),
            r#"{"programs": []}"#
        );

        let written = load_snapshot(&options.snapshot_path).unwrap();
        assert_eq!(written, result.dataset);
        assert_eq!(written.pages["home"], json!({"title": "Home"}));

        std::fs::remove_dir_all(&dir).ok();
    }
}
