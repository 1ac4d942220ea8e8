//! Document path builders shared by every provider.
//!
//! Centralising path construction keeps the memory store's access rules
//! and the REST provider's URLs addressing documents the same way.

use carbonbytes_core::error::AppError;
use carbonbytes_core::types::id::validate_key;

// ── Paths ──────────────────────────────────────────────────

/// Relative path of a document: `{collection}/{id}`.
pub fn document_path(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

/// Validate both segments of a document address.
pub fn checked_path(collection: &str, id: &str) -> Result<String, AppError> {
    validate_key(collection)?;
    validate_key(id)?;
    Ok(document_path(collection, id))
}

// ── Rules ──────────────────────────────────────────────────

/// Rule key matching every document of a collection.
pub fn collection_rule(collection: &str) -> String {
    format!("{collection}/*")
}
