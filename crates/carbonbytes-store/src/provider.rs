//! Store manager that dispatches to the configured provider.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use carbonbytes_core::config::store::StoreConfig;
use carbonbytes_core::error::AppError;
use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::document_store::{DocumentStore, Subscription};
use carbonbytes_core::types::{Document, Patch, Query, WriteMode};

/// Store manager that wraps the configured document store provider.
#[derive(Debug, Clone)]
pub struct StoreManager {
    inner: Arc<dyn DocumentStore>,
}

impl StoreManager {
    /// Create a store manager from configuration.
    pub fn new(config: &StoreConfig) -> AppResult<Self> {
        let inner: Arc<dyn DocumentStore> = match config.provider.as_str() {
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory document store");
                Arc::new(crate::memory::MemoryDocumentStore::from_config(
                    &config.memory,
                )?)
            }
            #[cfg(feature = "firestore")]
            "firestore" => {
                info!("Initializing Firestore document store");
                Arc::new(crate::firestore::FirestoreDocumentStore::new(
                    &config.firestore,
                )?)
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown store provider: '{other}'. Supported: memory, firestore"
                )));
            }
        };
        Ok(Self { inner })
    }

    /// Wrap an existing provider (for testing).
    pub fn from_store(store: Arc<dyn DocumentStore>) -> Self {
        Self { inner: store }
    }

    /// Shared handle to the inner provider.
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.inner)
    }
}

#[async_trait]
impl DocumentStore for StoreManager {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
        mode: WriteMode,
    ) -> AppResult<()> {
        self.inner.set(collection, id, patch, mode).await
    }

    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>> {
        self.inner.query(collection, query).await
    }

    async fn watch(
        &self,
        collection: &str,
        id: &str,
    ) -> AppResult<Subscription<Option<Document>>> {
        self.inner.watch(collection, id).await
    }

    async fn watch_query(
        &self,
        collection: &str,
        query: &Query,
    ) -> AppResult<Subscription<Vec<Document>>> {
        self.inner.watch_query(collection, query).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
