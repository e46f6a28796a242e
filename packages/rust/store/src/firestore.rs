//! Firestore REST v1 implementation of [`DocumentStore`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};
use url::Url;

use contentsync_shared::{
    ContentSyncError, Result, StoreConfig, StoreCredentials, validate_store_credentials,
};

use crate::codec::{decode_fields, encode_fields_preserving};
use crate::{DocumentStore, with_id, without_id};

/// User-Agent string for store requests.
const USER_AGENT: &str = concat!("contentsync/", env!("CARGO_PKG_VERSION"));

/// Documents requested per list page.
const PAGE_SIZE: &str = "300";

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreDocument {
    /// Convert to `{id, ...fields}`; the id is the last segment of `name`.
    fn into_plain(self) -> Result<Value> {
        let id = self.name.rsplit('/').next().unwrap_or_default().to_string();
        let fields = decode_fields(&self.fields)?;
        Ok(with_id(&id, Value::Object(fields)))
    }
}

/// Firestore document store over the REST API, authenticated with a bearer token.
pub struct FirestoreStore {
    client: Client,
    documents_root: Url,
    access_token: String,
}

impl FirestoreStore {
    /// Build a store from `[store]` config, resolving credentials from the
    /// environment. Missing credentials are a config error.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let credentials = validate_store_credentials(config)?;
        Self::new(config, credentials)
    }

    pub fn new(config: &StoreConfig, credentials: StoreCredentials) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            ContentSyncError::config(format!("invalid store base_url '{}': {e}", config.base_url))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ContentSyncError::Network(format!("failed to build HTTP client: {e}")))?;

        let root = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            base.as_str().trim_end_matches('/'),
            credentials.project_id,
            config.database
        );
        let documents_root = Url::parse(&root)
            .map_err(|e| ContentSyncError::config(format!("invalid store root '{root}': {e}")))?;

        Ok(Self {
            client,
            documents_root,
            access_token: credentials.access_token,
        })
    }

    fn collection_url(&self, collection: &str) -> Result<String> {
        self.url_for(&[collection])
    }

    /// Both parts are percent-encoded as single path segments.
    fn document_url(&self, collection: &str, id: &str) -> Result<String> {
        self.url_for(&[collection, id])
    }

    fn url_for(&self, segments: &[&str]) -> Result<String> {
        let mut url = self.documents_root.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ContentSyncError::config(format!(
                    "store root '{}' cannot take path segments",
                    self.documents_root
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    /// The raw document at `url`, or `None` on 404.
    async fn fetch(&self, url: &str) -> Result<Option<FirestoreDocument>> {
        let response = self.send(self.client.get(url), url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(url, response).await);
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| ContentSyncError::parse(format!("{url}: {e}")))
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<reqwest::Response> {
        request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ContentSyncError::Network(format!("{url}: {e}")))
    }
}

/// Turn a non-success response into a store error carrying a body excerpt.
async fn status_error(url: &str, response: reqwest::Response) -> ContentSyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
    ContentSyncError::Store(format!("{url}: HTTP {status}: {excerpt}"))
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    #[instrument(skip(self))]
    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let url = self.collection_url(collection)?;
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = self.send(request, &url).await?;
            if !response.status().is_success() {
                return Err(status_error(&url, response).await);
            }

            let page: ListDocumentsResponse = response
                .json()
                .await
                .map_err(|e| ContentSyncError::parse(format!("{url}: {e}")))?;

            debug!(count = page.documents.len(), "fetched page of documents");
            for doc in page.documents {
                documents.push(doc.into_plain()?);
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(documents)
    }

    #[instrument(skip(self))]
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let url = self.document_url(collection, id)?;
        self.fetch(&url)
            .await?
            .map(FirestoreDocument::into_plain)
            .transpose()
    }

    #[instrument(skip(self, document))]
    async fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let url = self.document_url(collection, id)?;
        let Value::Object(map) = without_id(document) else {
            return Err(ContentSyncError::validation(format!(
                "document {collection}/{id} is not a JSON object"
            )));
        };

        // Unchanged fields go back with their stored wire type.
        let stored = self
            .fetch(&url)
            .await?
            .map(|doc| doc.fields)
            .unwrap_or_default();
        let body = json!({ "fields": encode_fields_preserving(&map, &stored) });

        // PATCH without an update mask replaces the whole document.
        let response = self
            .send(self.client.patch(&url).json(&body), &url)
            .await?;
        if !response.status().is_success() {
            return Err(status_error(&url, response).await);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "firestore"
    }
}
