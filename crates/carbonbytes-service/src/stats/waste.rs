//! Per-category item counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use carbonbytes_entity::transaction::{Transaction, WasteType};

/// Number of deposited items per waste category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WasteBreakdown(BTreeMap<WasteType, u32>);

impl WasteBreakdown {
    /// Count the categories of `transactions`.
    pub fn from_transactions<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut breakdown = Self::default();
        for tx in transactions {
            breakdown.record(tx.waste_type);
        }
        breakdown
    }

    /// Count one item.
    pub fn record(&mut self, waste: WasteType) {
        *self.0.entry(waste).or_insert(0) += 1;
    }

    /// Items in one category.
    pub fn get(&self, waste: WasteType) -> u32 {
        self.0.get(&waste).copied().unwrap_or(0)
    }

    /// Categories with at least one item, in category order.
    pub fn iter(&self) -> impl Iterator<Item = (WasteType, u32)> + '_ {
        self.0.iter().map(|(w, n)| (*w, *n))
    }

    /// Items across all categories.
    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    /// Whether nothing was counted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_total() {
        let mut b = WasteBreakdown::default();
        b.record(WasteType::Plastic);
        b.record(WasteType::Plastic);
        b.record(WasteType::Glass);
        assert_eq!(b.get(WasteType::Plastic), 2);
        assert_eq!(b.get(WasteType::Metal), 0);
        assert_eq!(b.total(), 3);
        assert_eq!(
            b.iter().collect::<Vec<_>>(),
            vec![(WasteType::Plastic, 2), (WasteType::Glass, 1)]
        );
    }

    #[test]
    fn test_serializes_as_map() {
        let mut b = WasteBreakdown::default();
        b.record(WasteType::Paper);
        assert_eq!(serde_json::to_string(&b).unwrap(), r#"{"paper":1}"#);
    }
}
