//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section; every field has a default so a missing file still loads.

pub mod dashboard;
pub mod logging;
pub mod scanner;
pub mod session;
pub mod store;

use serde::{Deserialize, Serialize};

pub use self::dashboard::DashboardConfig;
pub use self::logging::LoggingConfig;
pub use self::scanner::{FacingMode, ScannerConfig};
pub use self::session::SessionConfig;
pub use self::store::{FirestoreConfig, MemoryStoreConfig, StoreConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default.toml + environment overlay + `CARBONBYTES__*` variables).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Machine session timing.
    #[serde(default)]
    pub session: SessionConfig,
    /// Code scanner options.
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// Document store provider.
    #[serde(default)]
    pub store: StoreConfig,
    /// Dashboard sizing.
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `{dir}/default` with an environment-specific overlay
    /// `{dir}/{env}` and environment variables prefixed with `CARBONBYTES__`.
    pub fn load(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CARBONBYTES")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a single TOML file, ignoring overlays and environment.
    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), AppError> {
        self.session.validate()?;
        match self.store.provider.as_str() {
            "memory" => Ok(()),
            "firestore" if self.store.firestore.project_id.is_empty() => Err(
                AppError::configuration("store.firestore.project_id is required"),
            ),
            "firestore" => Ok(()),
            other => Err(AppError::configuration(format!(
                "Unknown store provider: '{other}'. Supported: memory, firestore"
            ))),
        }
    }
}
