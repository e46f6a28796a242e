//! Markdown bodies for each report type.

use contentsync_consistency::{CoverageReport, ParityReport, StructureReport};
use contentsync_testimonials::ProcessingSummary;
use serde_json::Value;

use crate::markdown::Markdown;
use crate::migration::MigrationReport;
use crate::Report;

/// Compact one-line rendering of a JSON value for listings.
fn inline(value: Option<&Value>) -> String {
    const MAX: usize = 80;
    let Some(value) = value else {
        return "(absent)".to_string();
    };
    let text = value.to_string();
    if text.chars().count() > MAX {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}…")
    } else {
        text
    }
}

impl Report for ParityReport {
    fn name(&self) -> &'static str {
        "parity-report"
    }

    fn title(&self) -> &'static str {
        "Parity Report"
    }

    fn write_markdown(&self, md: &mut Markdown) {
        md.heading(2, "Summary").counts([
            ("Missing in snapshot", self.missing_in_json.len()),
            ("Missing in remote store", self.missing_in_firestore.len()),
            ("Field mismatches", self.field_mismatches.len()),
            ("Extra fields in snapshot", self.extra_fields_in_json.len()),
        ]);

        if self.is_clean() {
            md.paragraph("Remote store and snapshot are in parity.");
            return;
        }

        md.heading(2, "Details")
            .listing(
                "Missing in snapshot",
                self.missing_in_json
                    .iter()
                    .map(|m| format!("`{}/{}`", m.collection, m.id))
                    .collect::<Vec<_>>(),
            )
            .listing(
                "Missing in remote store",
                self.missing_in_firestore
                    .iter()
                    .map(|m| format!("`{}/{}`", m.collection, m.id))
                    .collect::<Vec<_>>(),
            )
            .listing(
                "Field mismatches",
                self.field_mismatches
                    .iter()
                    .map(|m| {
                        format!(
                            "`{}/{}` `{}`: remote {} vs snapshot {}",
                            m.collection,
                            m.id,
                            m.field,
                            inline(m.remote.as_ref()),
                            inline(m.snapshot.as_ref())
                        )
                    })
                    .collect::<Vec<_>>(),
            )
            .listing(
                "Extra fields in snapshot",
                self.extra_fields_in_json
                    .iter()
                    .map(|e| format!("`{}/{}` `{}`", e.collection, e.id, e.field))
                    .collect::<Vec<_>>(),
            );
    }
}

impl Report for CoverageReport {
    fn name(&self) -> &'static str {
        "coverage-report"
    }

    fn title(&self) -> &'static str {
        "Reference Coverage Report"
    }

    fn write_markdown(&self, md: &mut Markdown) {
        md.paragraph(&format!("**Coverage: {}%**", self.coverage))
            .counts([
                ("References discovered", self.references),
                ("Records referenced", self.used_count),
                ("Orphaned records", self.orphan_count),
                ("Dangling links", self.dangling_links.len()),
            ])
            .listing(
                "Dangling links",
                self.dangling_links
                    .iter()
                    .map(|d| {
                        format!(
                            "`{}` → `{}` ({} `{}` does not exist)",
                            d.page, d.link, d.kind, d.target
                        )
                    })
                    .collect::<Vec<_>>(),
            )
            .listing(
                "Orphans",
                self.orphans
                    .iter()
                    .map(|o| format!("`{}/{}`", o.collection, o.id))
                    .collect::<Vec<_>>(),
            );
    }
}

impl Report for StructureReport {
    fn name(&self) -> &'static str {
        "structure-report"
    }

    fn title(&self) -> &'static str {
        "Database Structure Report"
    }

    fn write_markdown(&self, md: &mut Markdown) {
        md.heading(2, "Collections").counts(
            self.collections
                .iter()
                .map(|c| (c.name.as_str(), c.document_count)),
        );

        for collection in &self.collections {
            if collection.fields.is_empty() {
                continue;
            }
            md.heading(2, &collection.name).listing(
                "Fields",
                collection
                    .fields
                    .iter()
                    .map(|(path, stats)| {
                        let types: Vec<String> = stats
                            .types
                            .iter()
                            .map(|(t, n)| format!("{} {n}", t.as_str()))
                            .collect();
                        format!(
                            "`{path}`: in {}/{} documents ({})",
                            stats.present,
                            collection.document_count,
                            types.join(", ")
                        )
                    })
                    .collect::<Vec<_>>(),
            );
        }
    }
}

impl Report for MigrationReport {
    fn name(&self) -> &'static str {
        "migration-report"
    }

    fn title(&self) -> &'static str {
        "Migration Report"
    }

    fn write_markdown(&self, md: &mut Markdown) {
        let mode = match (self.applied, self.pushed) {
            (true, true) => "applied to snapshot and pushed to remote store",
            (true, false) => "applied to snapshot",
            _ => "not applied",
        };
        md.paragraph(&format!("Source: {}. Result: {mode}.", self.source));

        if let Some(backup) = &self.snapshot_backup {
            md.paragraph(&format!("Snapshot backup: `{backup}`"));
        }
        if let Some(backup) = &self.remote_backup {
            md.paragraph(&format!("Remote backup: `{backup}`"));
        }

        md.heading(2, "Collections").counts(
            self.collections
                .iter()
                .flat_map(|c| {
                    [
                        (c.collection.as_str(), c.input),
                        ("  after merge", c.output),
                    ]
                }),
        );

        md.heading(2, "FAQ normalization")
            .counts(self.faq_changes.iter().map(|(change, n)| (change.as_str(), *n)));

        if !self.mappings.is_empty() {
            md.heading(2, "Legacy field mappings")
                .counts(self.mappings.iter().map(|(mapping, n)| (mapping.as_str(), *n)));
        }

        md.heading(2, "Findings")
            .listing(
                "Normalized records",
                self.normalized
                    .iter()
                    .map(|a| {
                        let mappings: Vec<&str> = a.mappings.iter().map(|m| m.as_str()).collect();
                        format!("`{}`: faq {}; {}", a.id, a.faq, mappings.join(", "))
                    })
                    .collect::<Vec<_>>(),
            )
            .listing(
                "Duplicates merged",
                self.duplicates
                    .iter()
                    .map(|d| {
                        format!(
                            "`{}/{}`: kept `{}`, merged {}",
                            d.collection,
                            d.slug,
                            d.kept_id,
                            d.merged_ids
                                .iter()
                                .map(|id| format!("`{id}`"))
                                .collect::<Vec<_>>()
                                .join(", ")
                        )
                    })
                    .collect::<Vec<_>>(),
            )
            .listing(
                "Dropped records (no slug or id)",
                self.dropped
                    .iter()
                    .map(|d| format!("`{}` record #{}", d.collection, d.index))
                    .collect::<Vec<_>>(),
            )
            .listing(
                "Validation issues",
                self.validation_issues
                    .iter()
                    .map(|i| format!("`{}/{}` `{}`: {}", i.collection, i.id, i.field, i.message))
                    .collect::<Vec<_>>(),
            )
            .listing(
                "Failures",
                self.failures
                    .iter()
                    .map(|f| format!("`{}/{}`: {}", f.collection, f.id, f.error))
                    .collect::<Vec<_>>(),
            );
    }
}

impl Report for ProcessingSummary {
    fn name(&self) -> &'static str {
        "testimonials-report"
    }

    fn title(&self) -> &'static str {
        "Testimonial Processing Report"
    }

    fn write_markdown(&self, md: &mut Markdown) {
        md.counts([
            ("Processed", self.processed),
            ("Translated", self.translated),
            ("Failed", self.failed),
            ("Skipped (current version)", self.skipped),
        ])
        .listing(
            "Outcomes",
            self.outcomes
                .iter()
                .map(|o| {
                    let state = serde_json::to_value(o.state)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default();
                    format!(
                        "`{}`: {} ({}){}",
                        o.id,
                        state,
                        o.language,
                        if o.written { "" } else { ", not written" }
                    )
                })
                .collect::<Vec<_>>(),
        )
        .listing(
            "Failures",
            self.failures
                .iter()
                .map(|f| format!("`{}`: {}", f.id, f.error))
                .collect::<Vec<_>>(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReportMeta, render};
    use contentsync_consistency::{DanglingLink, MissingRecord, Orphan};
    use contentsync_shared::Collection;
    use serde_json::json;

    fn meta() -> ReportMeta {
        ReportMeta {
            run_id: "run-1".into(),
            generated_at: "2026-03-04T05:06:07Z".parse().unwrap(),
            dry_run: true,
        }
    }

    #[test]
    fn clean_parity_report() {
        let rendered = render(&ParityReport::default(), &meta(), 200).unwrap();
        assert_eq!(rendered.name, "parity-report");
        assert!(rendered.markdown.starts_with("# Parity Report"));
        assert!(rendered.markdown.contains("Run `run-1` at 2026-03-04 05:06:07 UTC (dry run)"));
        assert!(rendered.markdown.contains("in parity"));

        let json: Value = serde_json::from_str(&rendered.json).unwrap();
        assert_eq!(json["meta"]["runId"], "run-1");
        assert_eq!(json["report"]["missingInJson"], json!([]));
    }

    #[test]
    fn long_listings_are_truncated_in_markdown_only() {
        let report = ParityReport {
            missing_in_json: (0..250)
                .map(|i| MissingRecord {
                    collection: "programs".into(),
                    id: format!("p{i}"),
                })
                .collect(),
            ..Default::default()
        };
        let rendered = render(&report, &meta(), 200).unwrap();
        assert!(rendered.markdown.contains("`programs/p199`"));
        assert!(!rendered.markdown.contains("`programs/p200`"));
        assert!(rendered.markdown.contains("...and 50 more"));

        let json: Value = serde_json::from_str(&rendered.json).unwrap();
        assert_eq!(json["report"]["missingInJson"].as_array().unwrap().len(), 250);
    }

    #[test]
    fn coverage_markdown_lists_findings() {
        let report = CoverageReport {
            references: 3,
            used_count: 8,
            orphan_count: 2,
            coverage: 80,
            dangling_links: vec![DanglingLink {
                page: "navigation".into(),
                link: "/programs/ghost".into(),
                kind: "program".into(),
                target: "ghost".into(),
            }],
            orphans: vec![Orphan {
                collection: Collection::Testimonials,
                id: "t9".into(),
            }],
        };
        let rendered = render(&report, &meta(), 200).unwrap();
        assert!(rendered.markdown.contains("**Coverage: 80%**"));
        assert!(rendered.markdown.contains("`/programs/ghost`"));
        assert!(rendered.markdown.contains("`testimonials/t9`"));

        let json: Value = serde_json::from_str(&rendered.json).unwrap();
        assert_eq!(json["report"]["danglingLinks"][0]["type"], "program");
    }

    #[test]
    fn migration_markdown_shows_duplicates() {
        let report = MigrationReport {
            source: "snapshot".into(),
            duplicates: vec![contentsync_consistency::DuplicateMerge {
                collection: Collection::Programs,
                slug: "x".into(),
                kept_id: "a".into(),
                merged_ids: vec!["b".into()],
            }],
            ..Default::default()
        };
        let rendered = render(&report, &meta(), 200).unwrap();
        assert!(rendered.markdown.contains("`programs/x`: kept `a`, merged `b`"));
        assert!(rendered.markdown.contains("Result: not applied."));
    }

    #[test]
    fn long_values_are_shortened_inline() {
        let long = json!("x".repeat(200));
        assert!(inline(Some(&long)).ends_with('…'));
        assert_eq!(inline(None), "(absent)");
    }
}
