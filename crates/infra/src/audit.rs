//! Audit log.
//!
//! Entries are written on the same connection (and therefore inside the same
//! transaction) as the change they describe, so an audit row exists exactly
//! when the change was committed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};

use tonerledger_core::{LedgerResult, UserId};

use crate::db::{now_ts, parse_ts};
use crate::error::map_sqlx_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    StockIngress,
    StockWithdrawal,
    RechargeSend,
    RechargeReceive,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::StockIngress => "STOCK_INGRESS",
            AuditAction::StockWithdrawal => "STOCK_WITHDRAWAL",
            AuditAction::RechargeSend => "RECHARGE_SEND",
            AuditAction::RechargeReceive => "RECHARGE_RECEIVE",
        }
    }
}

/// One audit row as read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub action: String,
    pub table: String,
    pub record_id: Option<i64>,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Append an audit row using the caller's connection or transaction.
pub async fn record(
    conn: &mut SqliteConnection,
    user_id: UserId,
    action: AuditAction,
    table: &str,
    record_id: Option<i64>,
    detail: &str,
) -> LedgerResult<()> {
    sqlx::query(
        "INSERT INTO auditoria (usuario_id, accion, tabla, registro_id, detalle, fecha)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(user_id.get())
    .bind(action.as_str())
    .bind(table)
    .bind(record_id)
    .bind(detail)
    .bind(now_ts())
    .execute(conn)
    .await
    .map_err(|e| map_sqlx_error("write_audit", e))?;
    Ok(())
}

/// Read side of the audit log.
#[derive(Debug, Clone)]
pub struct AuditLog {
    pool: SqlitePool,
}

impl AuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent entries first.
    pub async fn recent(&self, limit: u32) -> LedgerResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            "SELECT id, usuario_id, accion, tabla, registro_id, detalle, fecha
             FROM auditoria
             ORDER BY id DESC
             LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_audit", e))?;

        rows.into_iter().map(row_to_entry).collect()
    }

    /// Entries about one record, oldest first.
    pub async fn for_record(&self, table: &str, record_id: i64) -> LedgerResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            "SELECT id, usuario_id, accion, tabla, registro_id, detalle, fecha
             FROM auditoria
             WHERE tabla = ?1 AND registro_id = ?2
             ORDER BY id ASC",
        )
        .bind(table)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_audit_for_record", e))?;

        rows.into_iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> LedgerResult<AuditEntry> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_audit", e);
    let at: String = row.try_get("fecha").map_err(get)?;
    Ok(AuditEntry {
        id: row.try_get("id").map_err(get)?,
        user_id: row
            .try_get::<Option<i64>, _>("usuario_id")
            .map_err(get)?
            .map(UserId::new),
        action: row.try_get("accion").map_err(get)?,
        table: row.try_get("tabla").map_err(get)?,
        record_id: row.try_get("registro_id").map_err(get)?,
        detail: row.try_get("detalle").map_err(get)?,
        at: parse_ts(&at)?,
    })
}
