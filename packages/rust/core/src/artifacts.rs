//! Report artifacts on disk.
//!
//! Every report lands in the reports directory as `<name>.json` and
//! `<name>.md`, each written atomically (temp file, then rename) and
//! checksummed.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use contentsync_reports::{Report, ReportMeta, render};
use contentsync_shared::{ReportsConfig, Result};
use contentsync_store::write_atomic;

/// Metadata for a single artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// A job's structured result plus the files its report was written to.
#[derive(Debug, Clone)]
pub struct JobReport<R> {
    pub report: R,
    pub artifacts: Vec<ArtifactMeta>,
}

/// Fresh run metadata: a UUID v7 run id and the current time.
pub fn new_run(dry_run: bool) -> ReportMeta {
    ReportMeta {
        run_id: Uuid::now_v7().to_string(),
        generated_at: Utc::now(),
        dry_run,
    }
}

/// Renders reports and writes them under one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    max_listed: usize,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, max_listed: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_listed,
        }
    }

    pub fn from_config(config: &ReportsConfig) -> Self {
        Self::new(&config.output_dir, config.max_listed)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render `report` and write both files. Returns their metadata, JSON
    /// first.
    #[instrument(skip_all, fields(report = report.name(), run_id = %meta.run_id))]
    pub fn write<R: Report>(&self, report: &R, meta: &ReportMeta) -> Result<Vec<ArtifactMeta>> {
        let rendered = render(report, meta, self.max_listed)?;

        let metas = vec![
            write_artifact(
                &self.output_dir,
                &format!("{}.json", rendered.name),
                &rendered.json,
            )?,
            write_artifact(
                &self.output_dir,
                &format!("{}.md", rendered.name),
                &rendered.markdown,
            )?,
        ];

        info!(
            dir = %self.output_dir.display(),
            files = metas.len(),
            "report written"
        );
        Ok(metas)
    }
}

/// Write one file atomically and checksum it.
fn write_artifact(dir: &Path, filename: &str, content: &str) -> Result<ArtifactMeta> {
    write_atomic(&dir.join(filename), content.as_bytes())?;

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    debug!(file = %filename, size = content.len(), "wrote artifact");

    Ok(ArtifactMeta {
        filename: filename.to_string(),
        sha256: hash,
        size_bytes: content.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentsync_consistency::ParityReport;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cs-artifacts-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn writes_json_and_markdown() {
        let dir = temp_dir();
        let writer = ReportWriter::new(dir.join("reports"), 200);
        let meta = new_run(true);

        let metas = writer.write(&ParityReport::default(), &meta).unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].filename, "parity-report.json");
        assert_eq!(metas[1].filename, "parity-report.md");
        assert!(metas.iter().all(|m| m.sha256.len() == 64));

        let json = std::fs::read_to_string(dir.join("reports/parity-report.json")).unwrap();
        assert_eq!(json.len(), metas[0].size_bytes);
        assert!(json.contains(&meta.run_id));

        let md = std::fs::read_to_string(dir.join("reports/parity-report.md")).unwrap();
        assert!(md.starts_with("# Parity Report"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = temp_dir();
        let writer = ReportWriter::new(&dir, 200);
        writer.write(&ParityReport::default(), &new_run(false)).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(new_run(true).run_id, new_run(true).run_id);
    }
}
