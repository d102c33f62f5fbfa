//! Ledger error model.

use thiserror::Error;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Typed failure of a ledger or catalog operation.
///
/// Every variant is surfaced to the caller as-is; presentation code decides how
/// to phrase it for the user. `Store` always means the in-flight unit of work
/// was rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Input failed validation (non-positive quantity, empty name, duplicate name,
    /// delete blocked by a reference).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A withdrawal or send-to-recharge asked for more than is on hand.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// The operation is not valid for the record's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No authenticated user, or the user lacks the required permission.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Underlying persistence failure.
    #[error("store error: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    /// Quantity available when this is an `InsufficientStock` error.
    pub fn available(&self) -> Option<i64> {
        match self {
            Self::InsufficientStock { available, .. } => Some(*available),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_carries_available_quantity() {
        let err = LedgerError::insufficient_stock(15, 10);
        assert_eq!(err.available(), Some(10));
        assert_eq!(
            err.to_string(),
            "insufficient stock: requested 15, available 10"
        );
    }

    #[test]
    fn other_variants_have_no_available_quantity() {
        assert_eq!(LedgerError::validation("x").available(), None);
        assert_eq!(LedgerError::not_found("model 3").to_string(), "not found: model 3");
    }
}
