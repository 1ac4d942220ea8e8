//! In-memory document store backed by dashmap.
//!
//! Besides serving local runs, this store is the fake the session and
//! service tests drive: it can deny reads or writes per collection or per
//! document, fail the next N operations, add latency, and records every
//! write it was asked to perform.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use carbonbytes_core::config::store::MemoryStoreConfig;
use carbonbytes_core::error::{AppError, ErrorKind};
use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::document_store::{DocumentStore, Subscription};
use carbonbytes_core::types::{Document, Fields, Patch, Query, WriteMode};

use crate::collections::{checked_path, collection_rule, document_path};

use super::query::evaluate;

/// A write the store was asked to perform.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Target collection.
    pub collection: String,
    /// Target document.
    pub id: String,
    /// Requested mode.
    pub mode: WriteMode,
    /// Patch fields with server timestamps resolved.
    pub fields: Fields,
    /// `None` if the write was applied, otherwise why it was rejected.
    pub rejected: Option<ErrorKind>,
}

impl WriteRecord {
    /// Whether the write was applied.
    pub fn applied(&self) -> bool {
        self.rejected.is_none()
    }
}

#[derive(Debug, Clone)]
struct Change {
    collection: String,
    id: String,
}

#[derive(Debug, Default)]
struct Controls {
    denied_reads: HashSet<String>,
    denied_writes: HashSet<String>,
    failing_reads: Vec<ErrorKind>,
    failing_writes: Vec<ErrorKind>,
    latency: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    docs: DashMap<(String, String), Fields>,
    changes: broadcast::Sender<Change>,
    controls: Mutex<Controls>,
    write_log: Mutex<Vec<WriteRecord>>,
    reads: AtomicU64,
    buffer: usize,
}

/// Cloneable handle to a shared in-memory document store.
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new(&MemoryStoreConfig::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_denied(rules: &HashSet<String>, collection: &str, id: &str) -> bool {
    rules.contains(&document_path(collection, id)) || rules.contains(&collection_rule(collection))
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new(config: &MemoryStoreConfig) -> Self {
        let buffer = config.subscription_buffer.max(1);
        let (changes, _) = broadcast::channel(buffer * 4);
        Self {
            inner: Arc::new(Inner {
                docs: DashMap::new(),
                changes,
                controls: Mutex::new(Controls::default()),
                write_log: Mutex::new(Vec::new()),
                reads: AtomicU64::new(0),
                buffer,
            }),
        }
    }

    /// Create a store and load its configured seed file, if any.
    pub fn from_config(config: &MemoryStoreConfig) -> AppResult<Self> {
        let store = Self::new(config);
        if let Some(path) = &config.seed_file {
            let count = store.seed_file(path)?;
            info!(path = %path, documents = count, "Seeded in-memory store");
        }
        Ok(store)
    }

    // ── Seeding and direct access ───────────────────────────

    /// Load documents shaped as `{"collection": {"id": {fields}}}`.
    /// Returns the number of documents inserted.
    pub fn seed(&self, data: &Value) -> AppResult<usize> {
        let Value::Object(collections) = data else {
            return Err(AppError::validation("Seed data must be a JSON object"));
        };
        let mut count = 0;
        for (collection, docs) in collections {
            let Value::Object(docs) = docs else {
                return Err(AppError::validation(format!(
                    "Seed collection '{collection}' must be an object of documents"
                )));
            };
            for (id, fields) in docs {
                let Value::Object(fields) = fields else {
                    return Err(AppError::validation(format!(
                        "Seed document '{collection}/{id}' must be an object"
                    )));
                };
                checked_path(collection, id)?;
                self.insert(collection, id, fields.clone());
                count += 1;
            }
        }
        Ok(count)
    }

    /// Load a JSON seed file.
    pub fn seed_file(&self, path: impl AsRef<Path>) -> AppResult<usize> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let data: Value = serde_json::from_str(&raw)?;
        self.seed(&data)
    }

    /// Write a document directly, bypassing rules, faults and the write
    /// log. Subscribers are notified. Stands in for other clients.
    pub fn insert(&self, collection: &str, id: &str, fields: Fields) {
        self.inner
            .docs
            .insert((collection.to_string(), id.to_string()), fields);
        self.notify(collection, id);
    }

    /// Merge fields into a document directly (creating it if absent).
    pub fn patch(&self, collection: &str, id: &str, fields: Fields) {
        self.inner
            .docs
            .entry((collection.to_string(), id.to_string()))
            .or_default()
            .extend(fields);
        self.notify(collection, id);
    }

    /// Delete a document directly. Returns whether it existed.
    pub fn delete(&self, collection: &str, id: &str) -> bool {
        let removed = self
            .inner
            .docs
            .remove(&(collection.to_string(), id.to_string()))
            .is_some();
        if removed {
            self.notify(collection, id);
        }
        removed
    }

    /// Current fields of a document, without counting a read.
    pub fn raw(&self, collection: &str, id: &str) -> Option<Fields> {
        self.inner
            .docs
            .get(&(collection.to_string(), id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .count()
    }

    /// Whether a collection holds no documents.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    // ── Access rules ────────────────────────────────────────

    /// Reject writes to a document, or to a whole collection if `id` is `None`.
    pub fn deny_writes(&self, collection: &str, id: Option<&str>) {
        lock(&self.inner.controls)
            .denied_writes
            .insert(rule_key(collection, id));
    }

    /// Reject reads of a document, or of a whole collection if `id` is `None`.
    pub fn deny_reads(&self, collection: &str, id: Option<&str>) {
        lock(&self.inner.controls)
            .denied_reads
            .insert(rule_key(collection, id));
    }

    /// Remove every access rule.
    pub fn clear_rules(&self) {
        let mut controls = lock(&self.inner.controls);
        controls.denied_reads.clear();
        controls.denied_writes.clear();
    }

    // ── Fault injection ─────────────────────────────────────

    /// Fail the next `n` reads (including subscription set-up) as transient.
    pub fn fail_next_reads(&self, n: usize) {
        self.fail_next_reads_with(n, ErrorKind::Transient);
    }

    /// Fail the next `n` reads with the given kind.
    pub fn fail_next_reads_with(&self, n: usize, kind: ErrorKind) {
        lock(&self.inner.controls)
            .failing_reads
            .extend(std::iter::repeat_n(kind, n));
    }

    /// Fail the next `n` writes as transient.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_next_writes_with(n, ErrorKind::Transient);
    }

    /// Fail the next `n` writes with the given kind.
    pub fn fail_next_writes_with(&self, n: usize, kind: ErrorKind) {
        lock(&self.inner.controls)
            .failing_writes
            .extend(std::iter::repeat_n(kind, n));
    }

    /// Delay every subsequent operation by `latency`. `None` removes the delay.
    pub fn set_latency(&self, latency: Option<Duration>) {
        lock(&self.inner.controls).latency = latency;
    }

    // ── Inspection ──────────────────────────────────────────

    /// Number of reads served or rejected so far.
    pub fn read_count(&self) -> u64 {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Number of writes attempted so far.
    pub fn write_count(&self) -> usize {
        lock(&self.inner.write_log).len()
    }

    /// Every write attempted so far.
    pub fn write_log(&self) -> Vec<WriteRecord> {
        lock(&self.inner.write_log).clone()
    }

    /// Writes attempted against one document.
    pub fn writes_to(&self, collection: &str, id: &str) -> Vec<WriteRecord> {
        lock(&self.inner.write_log)
            .iter()
            .filter(|w| w.collection == collection && w.id == id)
            .cloned()
            .collect()
    }

    // ── Internals ───────────────────────────────────────────

    fn notify(&self, collection: &str, id: &str) {
        // No receivers is fine.
        let _ = self.inner.changes.send(Change {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    async fn delay(&self) {
        let latency = lock(&self.inner.controls).latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_read(&self, collection: &str, id: Option<&str>) -> AppResult<()> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        let mut controls = lock(&self.inner.controls);
        if !controls.failing_reads.is_empty() {
            let kind = controls.failing_reads.remove(0);
            return Err(AppError::new(kind, "Injected read failure"));
        }
        let denied = match id {
            Some(id) => is_denied(&controls.denied_reads, collection, id),
            None => controls.denied_reads.contains(&collection_rule(collection)),
        };
        if denied {
            return Err(AppError::permission_denied(format!(
                "Missing permission to read '{collection}'"
            )));
        }
        Ok(())
    }

    fn snapshot(&self, collection: &str, id: &str) -> Option<Document> {
        self.raw(collection, id).map(|fields| Document::new(id, fields))
    }

    fn collection_docs(&self, collection: &str) -> Vec<Document> {
        self.inner
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| Document::new(entry.key().1.clone(), entry.value().clone()))
            .collect()
    }

    fn apply(&self, collection: &str, id: &str, fields: &Fields, mode: WriteMode) -> AppResult<()> {
        let key = (collection.to_string(), id.to_string());
        match mode {
            WriteMode::Replace => {
                self.inner.docs.insert(key, fields.clone());
            }
            WriteMode::Merge => {
                self.inner
                    .docs
                    .entry(key)
                    .or_default()
                    .extend(fields.clone());
            }
            WriteMode::Update => match self.inner.docs.get_mut(&key) {
                Some(mut doc) => doc.extend(fields.clone()),
                None => {
                    return Err(AppError::not_found(format!(
                        "No document to update: {}",
                        document_path(collection, id)
                    )));
                }
            },
        }
        Ok(())
    }
}

fn rule_key(collection: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => document_path(collection, id),
        None => collection_rule(collection),
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        self.delay().await;
        self.check_read(collection, Some(id))?;
        Ok(self.snapshot(collection, id))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
        mode: WriteMode,
    ) -> AppResult<()> {
        checked_path(collection, id)?;
        self.delay().await;

        let fields = patch.resolve(Utc::now());
        let result = {
            let mut controls = lock(&self.inner.controls);
            if !controls.failing_writes.is_empty() {
                let kind = controls.failing_writes.remove(0);
                Err(AppError::new(kind, "Injected write failure"))
            } else if is_denied(&controls.denied_writes, collection, id) {
                Err(AppError::permission_denied(format!(
                    "Missing permission to write '{}'",
                    document_path(collection, id)
                )))
            } else {
                drop(controls);
                self.apply(collection, id, &fields, mode)
            }
        };

        lock(&self.inner.write_log).push(WriteRecord {
            collection: collection.to_string(),
            id: id.to_string(),
            mode,
            fields,
            rejected: result.as_ref().err().map(|e| e.kind),
        });

        match &result {
            Ok(()) => {
                debug!(collection, id, ?mode, "Document written");
                self.notify(collection, id);
            }
            Err(e) => debug!(collection, id, error = %e, "Document write rejected"),
        }
        result
    }

    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>> {
        self.delay().await;
        self.check_read(collection, None)?;
        Ok(evaluate(self.collection_docs(collection), query))
    }

    async fn watch(
        &self,
        collection: &str,
        id: &str,
    ) -> AppResult<Subscription<Option<Document>>> {
        self.delay().await;
        self.check_read(collection, Some(id))?;

        // Subscribe before taking the first snapshot so no change is missed.
        let mut changes = self.inner.changes.subscribe();
        let (tx, sub) = Subscription::channel(self.inner.buffer);
        let _ = tx.try_send(Ok(self.snapshot(collection, id)));

        let store = self.clone();
        let (collection, id) = (collection.to_string(), id.to_string());
        tokio::spawn(async move {
            loop {
                let change = tokio::select! {
                    _ = tx.closed() => break,
                    change = changes.recv() => change,
                };
                match change {
                    Ok(change) if change.collection == collection && change.id == id => {}
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(collection = %collection, id = %id, skipped, "Document watcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if tx.send(Ok(store.snapshot(&collection, &id))).await.is_err() {
                    break;
                }
            }
            debug!(collection = %collection, id = %id, "Document watcher closed");
        });
        Ok(sub)
    }

    async fn watch_query(
        &self,
        collection: &str,
        query: &Query,
    ) -> AppResult<Subscription<Vec<Document>>> {
        self.delay().await;
        self.check_read(collection, None)?;

        let mut changes = self.inner.changes.subscribe();
        let (tx, sub) = Subscription::channel(self.inner.buffer);
        let _ = tx.try_send(Ok(evaluate(self.collection_docs(collection), query)));

        let store = self.clone();
        let collection = collection.to_string();
        let query = query.clone();
        tokio::spawn(async move {
            loop {
                let change = tokio::select! {
                    _ = tx.closed() => break,
                    change = changes.recv() => change,
                };
                match change {
                    Ok(change) if change.collection == collection => {}
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                let result = evaluate(store.collection_docs(&collection), &query);
                if tx.send(Ok(result)).await.is_err() {
                    break;
                }
            }
        });
        Ok(sub)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
