//! Stock error model.

use thiserror::Error;

/// Result type used across the stock domain.
pub type StockResult<T> = Result<T, StockError>;

/// Unified error for ledger, sale and forecast operations.
///
/// Keep this focused on deterministic stock outcomes (validation, guard
/// failures, lost races). `Storage` is the one infrastructure escape hatch:
/// a poisoned lock or corrupted store state, never a business decision.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A value failed validation (malformed, missing or out of range input).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stock guard failed: the requested quantity exceeds what is on hand.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    /// A conditional update lost a race with another writer.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// A structural invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The sale was already refunded.
    #[error("sale already refunded: {0}")]
    AlreadyRefunded(String),

    /// The backing store failed (poisoned lock, corrupt state).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl StockError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn insufficient(requested: u32, available: u32) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrentModification(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn already_refunded(transaction_id: impl Into<String>) -> Self {
        Self::AlreadyRefunded(transaction_id.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether retrying the same operation against fresh state may succeed.
    ///
    /// Only lost races qualify; validation and guard failures are
    /// deterministic and retrying them is wasted work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}
