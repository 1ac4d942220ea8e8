//! Waste categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a deposited item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WasteType {
    /// Paper and cardboard.
    Paper,
    /// Plastics.
    Plastic,
    /// Metals.
    Metal,
    /// Glass.
    Glass,
    /// Organic waste.
    Organic,
    /// Anything the classifier reports that is not listed above.
    #[serde(other)]
    Other,
}

impl WasteType {
    /// Return the category as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Plastic => "plastic",
            Self::Metal => "metal",
            Self::Glass => "glass",
            Self::Organic => "organic",
            Self::Other => "other",
        }
    }

    /// Capitalized label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Paper => "Paper",
            Self::Plastic => "Plastic",
            Self::Metal => "Metal",
            Self::Glass => "Glass",
            Self::Organic => "Organic",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for WasteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
