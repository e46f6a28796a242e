//! Batched language detection and translation over the testimonials collection.
//!
//! Per record:
//!
//! ```text
//! unprocessed -> language-detected -> translated
//!                                  \-> translation-failed
//! ```
//!
//! Only Spanish text moves past `language-detected`. Records in a batch run
//! concurrently and independently; batches run in sequence with a fixed
//! delay between them. A failed record is reported once and never retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use contentsync_normalize::normalize_testimonial;
use contentsync_shared::{Collection, ProcessingStatus, RecordFailure, Result, TranslationConfig};
use contentsync_store::DocumentStore;

use crate::detect::{LanguageDetector, UNKNOWN_LANGUAGE, detect_language, is_spanish};
use crate::translate::Translator;

/// Version stamped into `processingStatus`. Records already at this version
/// are skipped unless forced.
pub const PROCESSING_VERSION: &str = "1.0";

/// Appended to every machine translation.
pub const TRANSLATION_MARKER: &str = " (Translated from Spanish)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingState {
    Unprocessed,
    LanguageDetected,
    Translated,
    TranslationFailed,
}

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub target_language: String,
    /// Compute and log everything, write nothing.
    pub dry_run: bool,
    /// Reprocess records already at [`PROCESSING_VERSION`].
    pub force: bool,
}

impl ProcessorOptions {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            target_language: config.target_language.clone(),
            dry_run: true,
            force: false,
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialOutcome {
    pub id: String,
    pub state: ProcessingState,
    pub language: String,
    pub translated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the annotated record was persisted.
    pub written: bool,
}

/// Final tally of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSummary {
    pub dry_run: bool,
    pub processed: usize,
    pub translated: usize,
    /// Records with at least one failure.
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<TestimonialOutcome>,
    pub failures: Vec<RecordFailure>,
}

/// Shared per-run collaborators, cloned into every record task.
struct Context {
    store: Arc<dyn DocumentStore>,
    detector: Arc<dyn LanguageDetector>,
    translator: Arc<dyn Translator>,
    target_language: String,
    dry_run: bool,
}

/// A parsed record waiting to be processed.
struct Pending {
    id: String,
    text: String,
    document: Value,
}

pub struct TestimonialProcessor {
    context: Arc<Context>,
    options: ProcessorOptions,
}

impl TestimonialProcessor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        detector: Arc<dyn LanguageDetector>,
        translator: Arc<dyn Translator>,
        options: ProcessorOptions,
    ) -> Self {
        let context = Arc::new(Context {
            store,
            detector,
            translator,
            target_language: options.target_language.clone(),
            dry_run: options.dry_run,
        });
        Self { context, options }
    }

    /// Process every testimonial in the store.
    ///
    /// Only a failure to list the collection is an error; everything per
    /// record ends up in the summary.
    #[instrument(skip_all, fields(dry_run = self.options.dry_run, force = self.options.force))]
    pub async fn run(&self) -> Result<ProcessingSummary> {
        let collection = Collection::Testimonials.as_str();
        let documents = self.context.store.list(collection).await?;

        let mut summary = ProcessingSummary {
            dry_run: self.options.dry_run,
            ..Default::default()
        };
        let mut pending = Vec::new();

        for document in documents {
            let id = document
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let testimonial = match normalize_testimonial(&document) {
                Ok(t) => t,
                Err(e) => {
                    warn!(%id, error = %e, "unreadable testimonial");
                    summary.failed += 1;
                    summary.failures.push(RecordFailure::new(collection, id, e));
                    continue;
                }
            };

            let current = testimonial
                .processing_status
                .as_ref()
                .is_some_and(|s| s.processing_version == PROCESSING_VERSION);
            if current && !self.options.force {
                debug!(%id, "already processed at current version");
                summary.skipped += 1;
                continue;
            }

            pending.push(Pending {
                id,
                text: testimonial.text,
                document,
            });
        }

        info!(
            pending = pending.len(),
            skipped = summary.skipped,
            batch_size = self.options.batch_size,
            "processing testimonials"
        );

        let batch_size = self.options.batch_size.max(1);
        let batch_count = pending.len().div_ceil(batch_size);
        let mut queue = pending.into_iter();

        for batch_index in 0..batch_count {
            if batch_index > 0 && !self.options.batch_delay.is_zero() {
                tokio::time::sleep(self.options.batch_delay).await;
            }

            let handles: Vec<_> = queue
                .by_ref()
                .take(batch_size)
                .map(|record| {
                    let id = record.id.clone();
                    let context = Arc::clone(&self.context);
                    (id, tokio::spawn(process_record(context, record)))
                })
                .collect();

            for (id, handle) in handles {
                let (outcome, failure) = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        summary.failed += 1;
                        summary
                            .failures
                            .push(RecordFailure::new(collection, id, format!("task failed: {e}")));
                        continue;
                    }
                };

                summary.processed += 1;
                if outcome.translated {
                    summary.translated += 1;
                }
                if let Some(failure) = failure {
                    summary.failed += 1;
                    summary.failures.push(failure);
                }
                summary.outcomes.push(outcome);
            }

            debug!(batch = batch_index + 1, of = batch_count, "batch complete");
        }

        info!(
            processed = summary.processed,
            translated = summary.translated,
            failed = summary.failed,
            skipped = summary.skipped,
            "testimonial processing complete"
        );
        Ok(summary)
    }
}

/// Annotate one record and persist it unless this is a dry run.
async fn process_record(
    context: Arc<Context>,
    record: Pending,
) -> (TestimonialOutcome, Option<RecordFailure>) {
    let collection = Collection::Testimonials.as_str();
    let Pending {
        id,
        text,
        mut document,
    } = record;

    let language = detect_language(context.detector.as_ref(), &text);
    let mut state = ProcessingState::LanguageDetected;
    let mut translated_text = None;
    let mut error = None;

    if is_spanish(&language) {
        match context
            .translator
            .translate(&text, &context.target_language)
            .await
        {
            Ok(translation) => {
                translated_text = Some(format!("{translation}{TRANSLATION_MARKER}"));
                state = ProcessingState::Translated;
            }
            Err(e) => {
                warn!(%id, error = %e, "translation failed; keeping original text");
                translated_text = Some(text.clone());
                error = Some(e.to_string());
                state = ProcessingState::TranslationFailed;
            }
        }
    }

    let translated = state == ProcessingState::Translated;
    let status = ProcessingStatus {
        language_detected: language != UNKNOWN_LANGUAGE,
        translated,
        last_processed: Utc::now(),
        processing_version: PROCESSING_VERSION.to_string(),
        error: error.clone(),
    };

    if let Value::Object(map) = &mut document {
        map.insert("language".into(), Value::String(language.clone()));
        if let Some(t) = translated_text {
            map.insert("translatedText".into(), Value::String(t));
        }
        map.insert(
            "processingStatus".into(),
            serde_json::to_value(&status).unwrap_or_default(),
        );
    }

    debug!(%id, %language, ?state, "testimonial annotated");

    let mut failure = error
        .as_ref()
        .map(|e| RecordFailure::new(collection, id.clone(), e));
    let mut written = false;

    if !context.dry_run {
        match context.store.put(collection, &id, &document).await {
            Ok(()) => written = true,
            Err(e) => {
                warn!(%id, error = %e, "failed to write testimonial");
                // A write failure outranks a translation failure in the report.
                failure = Some(RecordFailure::new(collection, id.clone(), e));
            }
        }
    }

    let outcome = TestimonialOutcome {
        id,
        state,
        language,
        translated,
        error,
        written,
    };
    (outcome, failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use contentsync_shared::ContentSyncError;
    use contentsync_store::MemoryStore;
    use serde_json::json;

    /// Detects by marker words so tests stay independent of trigram models.
    struct KeywordDetector;

    impl LanguageDetector for KeywordDetector {
        fn detect(&self, text: &str) -> Option<String> {
            if text.contains("excelente") || text.contains("programa") {
                Some("spa".into())
            } else if text.contains("great") {
                Some("eng".into())
            } else {
                None
            }
        }
    }

    /// Translates by prefixing, failing for texts containing "falla".
    #[derive(Default)]
    struct FakeTranslator {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        async fn translate(&self, text: &str, target: &str) -> Result<String> {
            self.calls.lock().unwrap().push(text.to_string());
            if text.contains("falla") {
                return Err(ContentSyncError::Translation("HTTP 500: backend error".into()));
            }
            Ok(format!("[{target}] {text}"))
        }
    }

    fn options(dry_run: bool) -> ProcessorOptions {
        ProcessorOptions {
            batch_size: 2,
            batch_delay: Duration::from_millis(1),
            target_language: "en".into(),
            dry_run,
            force: false,
        }
    }

    fn seeded_store() -> MemoryStore {
        let snapshot: contentsync_shared::Snapshot = serde_json::from_value(json!({
            "testimonials": [
                {"id": "t1", "text": "Un programa excelente para líderes"},
                {"id": "t2", "text": "A great program for leaders and teams"},
                {"id": "t3", "text": "Ok!"},
                {"id": "t4", "text": "El programa falla a veces pero vale la pena"}
            ]
        }))
        .unwrap();
        MemoryStore::from_snapshot(&snapshot)
    }

    fn processor(
        store: Arc<MemoryStore>,
        translator: Arc<FakeTranslator>,
        options: ProcessorOptions,
    ) -> TestimonialProcessor {
        TestimonialProcessor::new(store, Arc::new(KeywordDetector), translator, options)
    }

    #[tokio::test]
    async fn annotates_and_translates_spanish_only() {
        let store = Arc::new(seeded_store());
        let translator = Arc::new(FakeTranslator::default());
        let summary = processor(store.clone(), translator.clone(), options(false))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.translated, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(translator.calls.lock().unwrap().len(), 2);

        let t1 = store.get("testimonials", "t1").await.unwrap().unwrap();
        assert_eq!(t1["language"], "spa");
        assert_eq!(
            t1["translatedText"],
            format!("[en] Un programa excelente para líderes{TRANSLATION_MARKER}")
        );
        assert_eq!(t1["processingStatus"]["translated"], true);
        assert_eq!(t1["processingStatus"]["processingVersion"], PROCESSING_VERSION);

        let t2 = store.get("testimonials", "t2").await.unwrap().unwrap();
        assert_eq!(t2["language"], "eng");
        assert!(t2.get("translatedText").is_none());
        assert_eq!(t2["processingStatus"]["translated"], false);

        let t3 = store.get("testimonials", "t3").await.unwrap().unwrap();
        assert_eq!(t3["language"], UNKNOWN_LANGUAGE);
        assert_eq!(t3["processingStatus"]["languageDetected"], false);
    }

    #[tokio::test]
    async fn failed_translation_falls_back_to_original() {
        let store = Arc::new(seeded_store());
        let summary = processor(store.clone(), Arc::new(FakeTranslator::default()), options(false))
            .run()
            .await
            .unwrap();

        let t4 = store.get("testimonials", "t4").await.unwrap().unwrap();
        assert_eq!(t4["translatedText"], t4["text"]);
        assert_eq!(t4["processingStatus"]["translated"], false);
        assert!(
            t4["processingStatus"]["error"]
                .as_str()
                .unwrap()
                .contains("backend error")
        );

        let outcome = summary.outcomes.iter().find(|o| o.id == "t4").unwrap();
        assert_eq!(outcome.state, ProcessingState::TranslationFailed);
        assert!(outcome.written);
        assert_eq!(summary.failures[0].id, "t4");
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let store = Arc::new(seeded_store());
        let summary = processor(store.clone(), Arc::new(FakeTranslator::default()), options(true))
            .run()
            .await
            .unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.processed, 4);
        assert!(summary.outcomes.iter().all(|o| !o.written));
        let t1 = store.get("testimonials", "t1").await.unwrap().unwrap();
        assert!(t1.get("language").is_none());
    }

    #[tokio::test]
    async fn current_version_is_skipped_unless_forced() {
        let store = Arc::new(seeded_store());
        let translator = Arc::new(FakeTranslator::default());
        processor(store.clone(), translator.clone(), options(false))
            .run()
            .await
            .unwrap();

        let second = processor(store.clone(), translator.clone(), options(false))
            .run()
            .await
            .unwrap();
        assert_eq!(second.skipped, 4);
        assert_eq!(second.processed, 0);

        let forced = processor(
            store.clone(),
            translator,
            ProcessorOptions {
                force: true,
                ..options(false)
            },
        )
        .run()
        .await
        .unwrap();
        assert_eq!(forced.processed, 4);
    }

    #[tokio::test]
    async fn write_failure_does_not_stop_siblings() {
        let store = Arc::new(seeded_store().with_failing_write("testimonials", "t2"));
        let summary = processor(store.clone(), Arc::new(FakeTranslator::default()), options(false))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.failed, 2);
        let t2 = summary.outcomes.iter().find(|o| o.id == "t2").unwrap();
        assert!(!t2.written);

        let t3 = store.get("testimonials", "t3").await.unwrap().unwrap();
        assert!(t3.get("processingStatus").is_some());
    }
}
