//! Report rendering.
//!
//! Every report renders twice: a JSON document with full detail and a
//! Markdown summary with counts and capped itemized listings. Rendering is
//! pure; writing the files is the caller's business.

mod markdown;
mod migration;
mod render;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use contentsync_shared::{ContentSyncError, Result};

pub use markdown::{Markdown, truncation_line};
pub use migration::{CollectionMigration, MigrationReport};

/// Run metadata stamped on every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeta {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
}

/// A structured result that can be rendered as a report.
pub trait Report: Serialize {
    /// File stem of the rendered artifacts.
    fn name(&self) -> &'static str;

    fn title(&self) -> &'static str;

    /// Body of the Markdown rendering, after the title and run metadata.
    fn write_markdown(&self, md: &mut Markdown);
}

/// A report rendered in both formats.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub name: String,
    pub json: String,
    pub markdown: String,
}

#[derive(Serialize)]
struct Envelope<'a, R: Serialize> {
    meta: &'a ReportMeta,
    report: &'a R,
}

/// Render `report` as pretty JSON and as Markdown.
pub fn render<R: Report>(report: &R, meta: &ReportMeta, max_listed: usize) -> Result<RenderedReport> {
    let json = serde_json::to_string_pretty(&Envelope { meta, report }).map_err(|e| {
        ContentSyncError::validation(format!("failed to serialize {}: {e}", report.name()))
    })?;

    let mut md = Markdown::new(max_listed);
    md.heading(1, report.title()).paragraph(&format!(
        "Run `{}` at {}{}",
        meta.run_id,
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        if meta.dry_run { " (dry run)" } else { "" }
    ));
    report.write_markdown(&mut md);

    Ok(RenderedReport {
        name: report.name().to_string(),
        json,
        markdown: md.finish(),
    })
}
