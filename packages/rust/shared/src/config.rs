//! Application configuration for contentsync.
//!
//! User config lives at `~/.contentsync/contentsync.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets never live in the file: only the names of the env vars holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ContentSyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentsync";

// ---------------------------------------------------------------------------
// Config structs (matching contentsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote document store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Static snapshot settings.
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Translation service and batching settings.
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Report output settings.
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Reference discovery settings.
    #[serde(default)]
    pub references: ReferencesConfig,
}

/// `[store]` section.
///
/// Built once per run and handed to every function that touches the remote
/// store; there is no process-wide client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Firestore REST endpoint root.
    #[serde(default = "default_store_base_url")]
    pub base_url: String,

    /// Name of the env var holding the Google Cloud project id.
    #[serde(default = "default_project_id_env")]
    pub project_id_env: String,

    /// Name of the env var holding an OAuth2 access token.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Firestore database id.
    #[serde(default = "default_database")]
    pub database: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
            project_id_env: default_project_id_env(),
            access_token_env: default_access_token_env(),
            database: default_database(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_store_base_url() -> String {
    "https://firestore.googleapis.com".into()
}
fn default_project_id_env() -> String {
    "FIRESTORE_PROJECT_ID".into()
}
fn default_access_token_env() -> String {
    "FIRESTORE_ACCESS_TOKEN".into()
}
fn default_database() -> String {
    "(default)".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[snapshot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Path to the snapshot JSON file.
    #[serde(default = "default_snapshot_path")]
    pub path: String,

    /// Directory receiving timestamped backups before any overwrite.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
            backup_dir: default_backup_dir(),
        }
    }
}

fn default_snapshot_path() -> String {
    "data/content.json".into()
}
fn default_backup_dir() -> String {
    "data/backups".into()
}

/// `[translation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Translation API endpoint root.
    #[serde(default = "default_translation_base_url")]
    pub base_url: String,

    /// Name of the env var holding the translation API key.
    #[serde(default = "default_translation_key_env")]
    pub api_key_env: String,

    /// Language every Spanish testimonial is translated into.
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Records processed concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Fixed pause between batches, in milliseconds.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: default_translation_base_url(),
            api_key_env: default_translation_key_env(),
            target_language: default_target_language(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

fn default_translation_base_url() -> String {
    "https://translation.googleapis.com".into()
}
fn default_translation_key_env() -> String {
    "GOOGLE_TRANSLATE_API_KEY".into()
}
fn default_target_language() -> String {
    "en".into()
}
fn default_batch_size() -> usize {
    5
}
fn default_batch_delay_ms() -> u64 {
    1000
}

/// `[reports]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Directory report artifacts are written to.
    #[serde(default = "default_reports_dir")]
    pub output_dir: String,

    /// Maximum itemized entries per Markdown section.
    #[serde(default = "default_max_listed")]
    pub max_listed: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_reports_dir(),
            max_listed: default_max_listed(),
        }
    }
}

fn default_reports_dir() -> String {
    "reports".into()
}
fn default_max_listed() -> usize {
    200
}

/// `[references]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferencesConfig {
    /// Also treat any string whose field path mentions an offering type or
    /// `slug` as a reference, on top of the declared reference fields.
    #[serde(default)]
    pub path_heuristics: bool,
}

// ---------------------------------------------------------------------------
// Resolved credentials
// ---------------------------------------------------------------------------

/// Store credentials resolved from the environment.
#[derive(Clone)]
pub struct StoreCredentials {
    pub project_id: String,
    pub access_token: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("project_id", &self.project_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContentSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentsync/contentsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentSyncError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ContentSyncError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContentSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ContentSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContentSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a required, non-empty env var or fail with a config error.
fn required_env(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ContentSyncError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Resolve the remote store credentials named by `[store]`.
pub fn validate_store_credentials(config: &StoreConfig) -> Result<StoreCredentials> {
    let project_id = required_env(&config.project_id_env, "Firestore project id")?;
    let access_token = required_env(&config.access_token_env, "Firestore access token")?;
    Ok(StoreCredentials {
        project_id,
        access_token,
    })
}

/// Resolve the translation API key named by `[translation]`.
pub fn validate_translation_key(config: &TranslationConfig) -> Result<String> {
    required_env(&config.api_key_env, "Translation API key")
}

/// Check the snapshot file exists before a job that needs it starts.
pub fn validate_snapshot_exists(config: &SnapshotConfig) -> Result<PathBuf> {
    let path = PathBuf::from(&config.path);
    if !path.is_file() {
        return Err(ContentSyncError::config(format!(
            "snapshot file not found at '{}'",
            path.display()
        )));
    }
    Ok(path)
}
