//! Mapping of SQLx errors onto the ledger error taxonomy.
//!
//! | SQLx error | LedgerError |
//! |---|---|
//! | unique violation | `Validation` (caller supplies the domain message) |
//! | foreign key violation | `Validation` ("referenced by other records") |
//! | check violation | `Validation` |
//! | anything else | `Store` |

use tonerledger_core::LedgerError;

/// Map an SQLx error raised during `operation`.
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            LedgerError::validation(format!(
                "{operation}: record is referenced by other records"
            ))
        }
        sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
            LedgerError::validation(format!("{operation}: {}", db_err.message()))
        }
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            LedgerError::validation(format!("{operation}: duplicate value"))
        }
        sqlx::Error::PoolClosed => {
            LedgerError::store(format!("connection pool closed in {operation}"))
        }
        _ => {
            tracing::error!(operation, error = %err, "database error");
            LedgerError::store(format!("database error in {operation}: {err}"))
        }
    }
}

/// Like [`map_sqlx_error`], but phrases unique violations as `"{what} already exists"`.
pub fn map_unique(operation: &str, what: &str, err: sqlx::Error) -> LedgerError {
    if is_unique_violation(&err) {
        return LedgerError::validation(format!("{what} already exists"));
    }
    map_sqlx_error(operation, err)
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
