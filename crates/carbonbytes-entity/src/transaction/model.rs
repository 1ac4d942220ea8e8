//! Transaction document model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carbonbytes_core::error::AppError;
use carbonbytes_core::types::{Document, MachineId, TransactionId, UserId};

use super::waste::WasteType;

/// A points award for one deposited item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction id (document key).
    pub id: TransactionId,
    /// User credited.
    pub user_id: UserId,
    /// Machine the item went into.
    pub machine_id: Option<MachineId>,
    /// Waste category.
    pub waste_type: WasteType,
    /// Points awarded.
    pub points: i64,
    /// Award time.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTransaction {
    user_id: UserId,
    #[serde(default)]
    machine_id: Option<MachineId>,
    #[serde(default = "default_waste")]
    waste_type: WasteType,
    #[serde(default)]
    points: i64,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

fn default_waste() -> WasteType {
    WasteType::Other
}

impl Transaction {
    /// Decode a transaction from a `transactions` document.
    pub fn from_document(doc: &Document) -> Result<Self, AppError> {
        let id = TransactionId::parse(&doc.id)?;
        let stored: StoredTransaction = doc.decode()?;
        Ok(Self {
            id,
            user_id: stored.user_id,
            machine_id: stored.machine_id,
            waste_type: stored.waste_type,
            points: stored.points,
            timestamp: stored.timestamp,
        })
    }
}
