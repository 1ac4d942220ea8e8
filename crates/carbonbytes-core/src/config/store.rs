//! Document store provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level document store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store provider: `"memory"` or `"firestore"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// In-memory store configuration.
    #[serde(default)]
    pub memory: MemoryStoreConfig,
    /// Firestore REST configuration.
    #[serde(default)]
    pub firestore: FirestoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            memory: MemoryStoreConfig::default(),
            firestore: FirestoreConfig::default(),
        }
    }
}

/// In-memory store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    /// Optional JSON file with initial documents
    /// (`{"collection": {"id": {fields...}}}`).
    #[serde(default)]
    pub seed_file: Option<String>,
    /// Buffered snapshots per subscription before the slowest is dropped.
    #[serde(default = "default_subscription_buffer")]
    pub subscription_buffer: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            seed_file: None,
            subscription_buffer: default_subscription_buffer(),
        }
    }
}

/// Firestore REST backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirestoreConfig {
    /// REST endpoint root.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Cloud project id.
    #[serde(default)]
    pub project_id: String,
    /// Database id.
    #[serde(default = "default_database")]
    pub database: String,
    /// Web API key appended to requests, if any.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the signed-in user's ID token.
    #[serde(default = "default_token_env")]
    pub id_token_env: String,
    /// Per-request timeout in seconds (0 disables the timeout).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Polling period used to emulate live subscriptions, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_millis: u64,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            project_id: String::new(),
            database: default_database(),
            api_key: None,
            id_token_env: default_token_env(),
            request_timeout_seconds: default_request_timeout(),
            poll_interval_millis: default_poll_interval(),
        }
    }
}

impl FirestoreConfig {
    /// Polling period for subscriptions.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis.max(1))
    }

    /// Request timeout, if enabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_seconds > 0).then(|| Duration::from_secs(self.request_timeout_seconds))
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_subscription_buffer() -> usize {
    64
}

fn default_base_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_token_env() -> String {
    "CARBONBYTES_ID_TOKEN".to_string()
}

fn default_request_timeout() -> u64 {
    0
}

fn default_poll_interval() -> u64 {
    2000
}
