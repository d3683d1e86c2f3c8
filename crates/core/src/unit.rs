//! Units of measure for stock quantities.

use serde::{Deserialize, Serialize};

/// Unit a stock quantity is counted in.
///
/// Canisters hold bulk units (`Milliliters`, `Grams`, `Pumps`); slot
/// inventory counts discrete `Items`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    #[serde(rename = "ml")]
    Milliliters,
    Grams,
    Pumps,
    Items,
}

impl UnitOfMeasure {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfMeasure::Milliliters => "ml",
            UnitOfMeasure::Grams => "grams",
            UnitOfMeasure::Pumps => "pumps",
            UnitOfMeasure::Items => "items",
        }
    }
}

impl core::fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
