//! Translation lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use contentsync_shared::{ContentSyncError, Result, TranslationConfig, validate_translation_key};

/// HTTP timeout for one translation call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User-Agent string for translation requests.
const USER_AGENT: &str = concat!("contentsync/", env!("CARGO_PKG_VERSION"));

/// `(text, target language) -> translated text`.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// Google Cloud Translation v2 client, authenticated with an API key.
pub struct GoogleTranslator {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl GoogleTranslator {
    /// Build from `[translation]` config, reading the API key from the
    /// environment. A missing key is a config error.
    pub fn from_config(config: &TranslationConfig) -> Result<Self> {
        let api_key = validate_translation_key(config)?;
        Self::new(config, api_key)
    }

    pub fn new(config: &TranslationConfig, api_key: String) -> Result<Self> {
        let endpoint = Url::parse(&format!(
            "{}/language/translate/v2",
            config.base_url.trim_end_matches('/')
        ))
        .map_err(|e| {
            ContentSyncError::config(format!(
                "invalid translation base_url '{}': {e}",
                config.base_url
            ))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ContentSyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "q": text, "target": target_language, "format": "text" }))
            .send()
            .await
            .map_err(|e| ContentSyncError::Network(format!("translation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(300).collect();
            return Err(ContentSyncError::Translation(format!(
                "HTTP {status}: {excerpt}"
            )));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| ContentSyncError::Translation(format!("unexpected response: {e}")))?;

        let translated = parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| ContentSyncError::Translation("response had no translations".into()))?;

        debug!(chars = translated.len(), "translated");
        Ok(translated)
    }
}
