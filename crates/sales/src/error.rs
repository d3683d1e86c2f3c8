//! Sale failure model.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vendstock_core::StockError;

/// Result type for sale orchestration.
pub type SaleResult<T> = Result<T, SaleError>;

/// Where in a sale attempt a failure occurred.
///
/// An attempt moves `Validating -> Reserving -> Committing`; the receipt is
/// the completed outcome and [`SaleError`] the aborted one. No phase writes
/// to the store before commit succeeds, so an error in any phase means the
/// attempt left no trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalePhase {
    /// Reading reference data and checking stock levels.
    Validating,
    /// Staging conditional decrements and audit entries on the transaction.
    Reserving,
    /// Applying the transaction under the store's write lock.
    Committing,
}

impl fmt::Display for SalePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::Validating => "validating",
            Self::Reserving => "reserving",
            Self::Committing => "committing",
        };
        f.write_str(phase)
    }
}

/// A sale attempt that aborted, carrying the phase it died in.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("sale aborted while {phase}: {source}")]
pub struct SaleError {
    pub phase: SalePhase,
    #[source]
    pub source: StockError,
}

impl SaleError {
    pub fn validating(source: StockError) -> Self {
        Self {
            phase: SalePhase::Validating,
            source,
        }
    }

    pub fn reserving(source: StockError) -> Self {
        Self {
            phase: SalePhase::Reserving,
            source,
        }
    }

    pub fn committing(source: StockError) -> Self {
        Self {
            phase: SalePhase::Committing,
            source,
        }
    }

    /// The underlying stock failure, independent of the phase wrapper.
    pub fn kind(&self) -> &StockError {
        &self.source
    }

    /// Whether re-running the whole sale as a fresh attempt may succeed.
    ///
    /// Mirrors [`StockError::is_retryable`]: only lost races qualify, and a
    /// retried sale gets a new transaction id rather than replaying this one.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_carries_its_phase() {
        let err = SaleError::reserving(StockError::insufficient(3, 1));
        assert_eq!(err.phase, SalePhase::Reserving);
        assert_eq!(err.kind(), &StockError::insufficient(3, 1));
        assert_eq!(
            err.to_string(),
            "sale aborted while reserving: insufficient stock: requested 3, available 1"
        );
    }

    #[test]
    fn only_lost_races_are_retryable() {
        assert!(SaleError::committing(StockError::conflict("canister beat us")).is_retryable());
        assert!(!SaleError::validating(StockError::not_found("recipe")).is_retryable());
        assert!(!SaleError::reserving(StockError::insufficient(10, 2)).is_retryable());
    }
}
