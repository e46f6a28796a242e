//! `testimonials`: language annotation and translation against the remote
//! store.

use std::sync::Arc;

use tracing::instrument;

use contentsync_shared::Result;
use contentsync_store::DocumentStore;
use contentsync_testimonials::{
    LanguageDetector, ProcessingSummary, ProcessorOptions, TestimonialProcessor, Translator,
};

use crate::artifacts::{JobReport, ReportWriter, new_run};
use crate::progress::ProgressReporter;

#[instrument(skip_all, fields(dry_run = options.dry_run, force = options.force))]
pub async fn process_testimonials(
    store: Arc<dyn DocumentStore>,
    detector: Arc<dyn LanguageDetector>,
    translator: Arc<dyn Translator>,
    options: ProcessorOptions,
    writer: &ReportWriter,
    progress: &dyn ProgressReporter,
) -> Result<JobReport<ProcessingSummary>> {
    let meta = new_run(options.dry_run);

    progress.phase("Processing testimonials");
    let summary = TestimonialProcessor::new(store, detector, translator, options)
        .run()
        .await?;
    progress.collection("testimonials", summary.processed);

    let artifacts = writer.write(&summary, &meta)?;

    progress.done(&artifacts);

    Ok(JobReport {
        report: summary,
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use async_trait::async_trait;
    use contentsync_shared::{ContentSyncError, Snapshot};
    use contentsync_store::MemoryStore;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;

    struct SpanishWhenAccented;

    impl LanguageDetector for SpanishWhenAccented {
        fn detect(&self, text: &str) -> Option<String> {
            Some(if text.contains('í') { "spa" } else { "eng" }.to_string())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl Translator for Unavailable {
        async fn translate(&self, _text: &str, _target: &str) -> contentsync_shared::Result<String> {
            Err(ContentSyncError::Translation("HTTP 503: unavailable".into()))
        }
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cs-testimonials-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn failed_translation_keeps_original_text() {
        let dir = temp_dir();
        let seed: Snapshot = serde_json::from_value(json!({
            "testimonials": [
                {"id": "t1", "text": "Una experiencia increíble para todo el equipo"},
                {"id": "t2", "text": "An incredible experience for the whole team"}
            ]
        }))
        .unwrap();
        let store = Arc::new(MemoryStore::from_snapshot(&seed));
        let options = ProcessorOptions {
            batch_size: 5,
            batch_delay: Duration::ZERO,
            target_language: "en".into(),
            dry_run: false,
            force: false,
        };
        let writer = ReportWriter::new(dir.join("reports"), 200);

        let result = process_testimonials(
            store.clone(),
            Arc::new(SpanishWhenAccented),
            Arc::new(Unavailable),
            options,
            &writer,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.report.processed, 2);
        assert_eq!(result.report.translated, 0);
        assert_eq!(result.report.failed, 1);

        let t1 = store.get("testimonials", "t1").await.unwrap().unwrap();
        assert_eq!(t1["language"], "spa");
        assert_eq!(t1["translatedText"], t1["text"]);
        assert_eq!(t1["processingStatus"]["translated"], false);
        assert!(t1["processingStatus"]["error"].is_string());

        assert_eq!(result.artifacts[0].filename, "testimonials-report.json");
        std::fs::remove_dir_all(&dir).ok();
    }
}
