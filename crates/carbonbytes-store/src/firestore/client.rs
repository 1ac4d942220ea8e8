//! HTTP client for the Firestore REST API.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use carbonbytes_core::config::store::FirestoreConfig;
use carbonbytes_core::error::{AppError, ErrorKind};
use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::document_store::{DocumentStore, Subscription, SubscriptionSender};
use carbonbytes_core::types::{Document, Patch, Query, WriteMode};

use crate::collections::checked_path;

use super::query::structured_query;
use super::value::{decode_fields, encode_fields};

/// Firestore-backed document store.
#[derive(Clone)]
pub struct FirestoreDocumentStore {
    http: Client,
    /// `{base}/projects/{p}/databases/{d}/documents`
    documents_url: String,
    /// `projects/{p}/databases/{d}/documents`, used in document names.
    documents_name: String,
    api_key: Option<String>,
    id_token: Option<String>,
    poll_interval: Duration,
}

impl fmt::Debug for FirestoreDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreDocumentStore")
            .field("documents_url", &self.documents_url)
            .field("authenticated", &self.id_token.is_some())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl FirestoreDocumentStore {
    /// Build a client from configuration. The ID token, if any, is read
    /// from the environment variable named by `id_token_env`.
    pub fn new(config: &FirestoreConfig) -> AppResult<Self> {
        if config.project_id.trim().is_empty() {
            return Err(AppError::configuration(
                "store.firestore.project_id is required",
            ));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Failed to build HTTP client: {e}"),
                e,
            )
        })?;

        let documents_name = format!(
            "projects/{}/databases/{}/documents",
            config.project_id, config.database
        );
        let id_token = std::env::var(&config.id_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());

        info!(
            project = %config.project_id,
            database = %config.database,
            authenticated = id_token.is_some(),
            "Firestore store configured"
        );

        Ok(Self {
            http,
            documents_url: format!(
                "{}/{}",
                config.base_url.trim_end_matches('/'),
                documents_name
            ),
            documents_name,
            api_key: config.api_key.clone(),
            id_token,
            poll_interval: config.poll_interval(),
        })
    }

    /// Replace the bearer token (e.g. after the identity provider refreshed it).
    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }

    fn url(&self, suffix: &str) -> String {
        match &self.api_key {
            Some(key) => format!("{}{suffix}?key={key}", self.documents_url),
            None => format!("{}{suffix}", self.documents_url),
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        self.url(&format!("/{collection}/{id}"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.id_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        self.authorize(request).send().await.map_err(transport_error)
    }

    /// Build the `commit` body for a single write.
    fn commit_body(&self, collection: &str, id: &str, patch: &Patch, mode: WriteMode) -> Value {
        let mut write = json!({
            "update": {
                "name": format!("{}/{collection}/{id}", self.documents_name),
                "fields": encode_fields(patch.fields()),
            },
        });
        if mode != WriteMode::Replace {
            let paths: Vec<&String> = patch.fields().keys().collect();
            write["updateMask"] = json!({ "fieldPaths": paths });
        }
        if mode == WriteMode::Update {
            write["currentDocument"] = json!({ "exists": true });
        }
        if !patch.server_timestamp_fields().is_empty() {
            write["updateTransforms"] = patch
                .server_timestamp_fields()
                .iter()
                .map(|field| json!({ "fieldPath": field, "setToServerValue": "REQUEST_TIME" }))
                .collect();
        }
        json!({ "writes": [write] })
    }

    async fn fetch(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        let response = self
            .send(self.http.get(self.document_url(collection, id)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = json_body(response).await?;
        Ok(Some(parse_document(&body)?))
    }

    async fn run_query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>> {
        let response = self
            .send(
                self.http
                    .post(self.url(":runQuery"))
                    .json(&structured_query(collection, query)),
            )
            .await?;
        let body = json_body(response).await?;
        let rows = body.as_array().cloned().unwrap_or_default();
        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(parse_document)
            .collect()
    }
}

/// Map a transport-level failure.
fn transport_error(err: reqwest::Error) -> AppError {
    let kind = if err.is_decode() {
        ErrorKind::Serialization
    } else {
        ErrorKind::Transient
    };
    AppError::with_source(kind, format!("Store request failed: {err}"), err)
}

/// Map an unsuccessful HTTP status onto the error taxonomy.
pub fn status_error(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}"));
    let kind = match status {
        // A failed `exists` precondition means the document went away.
        StatusCode::NOT_FOUND | StatusCode::PRECONDITION_FAILED => ErrorKind::NotFound,
        StatusCode::FORBIDDEN => ErrorKind::PermissionDenied,
        StatusCode::UNAUTHORIZED => ErrorKind::Authentication,
        StatusCode::CONFLICT => ErrorKind::Conflict,
        StatusCode::BAD_REQUEST => ErrorKind::Validation,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => ErrorKind::Transient,
        s if s.is_server_error() => ErrorKind::Transient,
        _ => ErrorKind::Internal,
    };
    AppError::new(kind, message)
}

async fn json_body(response: Response) -> AppResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }
    response.json::<Value>().await.map_err(transport_error)
}

/// Decode a REST `Document` resource.
pub fn parse_document(resource: &Value) -> AppResult<Document> {
    let name = resource["name"]
        .as_str()
        .ok_or_else(|| AppError::new(ErrorKind::Serialization, "Document without a name"))?;
    let id = name.rsplit('/').next().unwrap_or(name);
    let fields = resource
        .get("fields")
        .and_then(Value::as_object)
        .map(decode_fields)
        .unwrap_or_default();
    Ok(Document::new(id, fields))
}

/// Poll `fetch` every `interval` and forward snapshots that differ from the
/// last one delivered, starting from `delivered`, until the subscriber leaves.
fn spawn_poller<T, F, Fut>(
    tx: SubscriptionSender<T>,
    interval: Duration,
    label: String,
    delivered: T,
    fetch: F,
) where
    T: PartialEq + Clone + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<T>> + Send,
{
    tokio::spawn(async move {
        let mut last = Some(delivered);
        let mut failing = false;
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            match fetch().await {
                Ok(snapshot) => {
                    failing = false;
                    if last.as_ref() != Some(&snapshot) {
                        last = Some(snapshot.clone());
                        if tx.send(Ok(snapshot)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    // Report the first failure of a streak only.
                    if !failing {
                        warn!(target = %label, error = %e, "Subscription poll failed");
                        failing = true;
                        if tx.send(Err(e)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        debug!(target = %label, "Subscription poller stopped");
    });
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        checked_path(collection, id)?;
        self.fetch(collection, id).await
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
        mode: WriteMode,
    ) -> AppResult<()> {
        checked_path(collection, id)?;
        let body = self.commit_body(collection, id, &patch, mode);
        let response = self
            .send(self.http.post(self.url(":commit")).json(&body))
            .await?;
        json_body(response).await?;
        debug!(collection, id, ?mode, "Document committed");
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>> {
        self.run_query(collection, query).await
    }

    async fn watch(
        &self,
        collection: &str,
        id: &str,
    ) -> AppResult<Subscription<Option<Document>>> {
        checked_path(collection, id)?;
        // Surface permission and auth failures to the caller up front.
        let first = self.fetch(collection, id).await?;
        let (tx, sub) = Subscription::channel(16);
        let _ = tx.try_send(Ok(first.clone()));

        let store = self.clone();
        let (c, i) = (collection.to_string(), id.to_string());
        let label = format!("{c}/{i}");
        spawn_poller(tx, self.poll_interval, label, first, move || {
            let store = store.clone();
            let (c, i) = (c.clone(), i.clone());
            async move { store.fetch(&c, &i).await }
        });
        Ok(sub)
    }

    async fn watch_query(
        &self,
        collection: &str,
        query: &Query,
    ) -> AppResult<Subscription<Vec<Document>>> {
        let first = self.run_query(collection, query).await?;
        let (tx, sub) = Subscription::channel(16);
        let _ = tx.try_send(Ok(first.clone()));

        let store = self.clone();
        let collection = collection.to_string();
        let query = query.clone();
        let label = collection.clone();
        spawn_poller(tx, self.poll_interval, label, first, move || {
            let store = store.clone();
            let (collection, query) = (collection.clone(), query.clone());
            async move { store.run_query(&collection, &query).await }
        });
        Ok(sub)
    }

    async fn health_check(&self) -> AppResult<bool> {
        let response = self
            .send(self.http.post(self.url(":runQuery")).json(&structured_query(
                "machines",
                &Query::new().limit(1),
            )))
            .await?;
        Ok(response.status().is_success())
    }
}
