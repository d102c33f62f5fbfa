//! Read-only report queries over the ledger.
//!
//! Rows are denormalized (brand/model/vendor names joined in) because they
//! feed tables and exports directly. Every filter is a bound parameter; the
//! `(?n IS NULL OR col = ?n)` form keeps one statement per report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use tonerledger_core::{BrandId, LedgerError, LedgerResult, ModelId, MovementId, RechargeId, VendorId};
use tonerledger_inventory::{MovementKind, RechargeStatus};

use crate::db::{fmt_ts, parse_ts};
use crate::error::map_sqlx_error;

/// Movement listing filter. The date range is inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementFilter {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub brand_id: Option<BrandId>,
    pub model_id: Option<ModelId>,
    pub kind: Option<MovementKind>,
}

impl MovementFilter {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            brand_id: None,
            model_id: None,
            kind: None,
        }
    }

    pub fn brand(mut self, brand_id: BrandId) -> Self {
        self.brand_id = Some(brand_id);
        self
    }

    pub fn model(mut self, model_id: ModelId) -> Self {
        self.model_id = Some(model_id);
        self
    }

    pub fn kind(mut self, kind: MovementKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockReportRow {
    pub model_id: ModelId,
    pub brand: String,
    pub model: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementReportRow {
    pub id: MovementId,
    pub occurred_at: DateTime<Utc>,
    pub brand: String,
    pub model: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub responsible: Option<String>,
    pub sector: Option<String>,
    pub vendor: Option<String>,
    pub notes: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RechargeReportRow {
    pub id: RechargeId,
    pub status: RechargeStatus,
    pub brand: String,
    pub model: String,
    pub vendor: String,
    pub quantity: i64,
    pub sent_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    pub received_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelMovementTotals {
    pub model_id: ModelId,
    pub brand: String,
    pub model: String,
    /// Ingress plus receive-from-recharge.
    pub total_in: i64,
    /// Withdrawal plus send-to-recharge.
    pub total_out: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorRechargeTotals {
    pub vendor_id: VendorId,
    pub vendor: String,
    pub status: RechargeStatus,
    pub records: i64,
    pub quantity: i64,
}

/// Stored stock compared with the net of the model's movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockConsistency {
    pub model_id: ModelId,
    pub stored: i64,
    pub computed: i64,
}

impl StockConsistency {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.computed
    }

    /// `stored - computed`.
    pub fn drift(&self) -> i64 {
        self.stored - self.computed
    }
}

#[derive(Debug, Clone)]
pub struct ReportQueries {
    pool: SqlitePool,
}

impl ReportQueries {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every model with its quantity (0 when never stocked), by brand then model.
    pub async fn list_stock(&self) -> LedgerResult<Vec<StockReportRow>> {
        self.stock_rows(None).await
    }

    /// Models whose quantity is at or below `threshold`.
    pub async fn low_stock(&self, threshold: i64) -> LedgerResult<Vec<StockReportRow>> {
        self.stock_rows(Some(threshold)).await
    }

    async fn stock_rows(&self, threshold: Option<i64>) -> LedgerResult<Vec<StockReportRow>> {
        let rows = sqlx::query(
            "SELECT mo.id AS model_id, ma.nombre AS brand, mo.nombre AS model,
                    COALESCE(s.cantidad, 0) AS quantity
             FROM modelos_toner mo
             JOIN marcas ma ON ma.id = mo.id_marca
             LEFT JOIN stock_toner s ON s.id_modelo = mo.id
             WHERE (?1 IS NULL OR COALESCE(s.cantidad, 0) <= ?1)
             ORDER BY ma.nombre ASC, mo.nombre ASC",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stock", e))?;

        rows.iter()
            .map(|row| -> LedgerResult<StockReportRow> {
                let get = |e: sqlx::Error| map_sqlx_error("decode_stock_row", e);
                Ok(StockReportRow {
                    model_id: ModelId::new(row.try_get("model_id").map_err(get)?),
                    brand: row.try_get("brand").map_err(get)?,
                    model: row.try_get("model").map_err(get)?,
                    quantity: row.try_get("quantity").map_err(get)?,
                })
            })
            .collect()
    }

    /// Movements matching `filter`, newest first.
    pub async fn list_movements(&self, filter: &MovementFilter) -> LedgerResult<Vec<MovementReportRow>> {
        ensure_range(filter.from, filter.to)?;

        let rows = sqlx::query(
            "SELECT mv.id, mv.fecha, ma.nombre AS brand, mo.nombre AS model, mv.tipo,
                    mv.cantidad, r.nombre AS responsible, se.nombre AS sector,
                    e.nombre AS vendor, mv.observaciones, u.username
             FROM movimientos_toner mv
             JOIN modelos_toner mo ON mo.id = mv.id_modelo
             JOIN marcas ma ON ma.id = mo.id_marca
             JOIN usuarios u ON u.id = mv.usuario_id
             LEFT JOIN responsables r ON r.id = mv.id_responsable
             LEFT JOIN sectores se ON se.id = mv.id_sector
             LEFT JOIN empresas_recarga e ON e.id = mv.id_empresa_recarga
             WHERE mv.fecha >= ?1 AND mv.fecha <= ?2
               AND (?3 IS NULL OR mo.id_marca = ?3)
               AND (?4 IS NULL OR mv.id_modelo = ?4)
               AND (?5 IS NULL OR mv.tipo = ?5)
             ORDER BY mv.fecha DESC, mv.id DESC",
        )
        .bind(fmt_ts(filter.from))
        .bind(fmt_ts(filter.to))
        .bind(filter.brand_id.map(BrandId::get))
        .bind(filter.model_id.map(ModelId::get))
        .bind(filter.kind.map(MovementKind::code))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter()
            .map(|row| -> LedgerResult<MovementReportRow> {
                let get = |e: sqlx::Error| map_sqlx_error("decode_movement_row", e);
                let at: String = row.try_get("fecha").map_err(get)?;
                let kind: String = row.try_get("tipo").map_err(get)?;
                Ok(MovementReportRow {
                    id: MovementId::new(row.try_get("id").map_err(get)?),
                    occurred_at: parse_ts(&at)?,
                    brand: row.try_get("brand").map_err(get)?,
                    model: row.try_get("model").map_err(get)?,
                    kind: MovementKind::from_code(&kind)?,
                    quantity: row.try_get("cantidad").map_err(get)?,
                    responsible: row.try_get("responsible").map_err(get)?,
                    sector: row.try_get("sector").map_err(get)?,
                    vendor: row.try_get("vendor").map_err(get)?,
                    notes: row.try_get("observaciones").map_err(get)?,
                    username: row.try_get("username").map_err(get)?,
                })
            })
            .collect()
    }

    /// Recharge records, optionally of one status, newest send first.
    pub async fn list_recharges(
        &self,
        status: Option<RechargeStatus>,
    ) -> LedgerResult<Vec<RechargeReportRow>> {
        let rows = sqlx::query(
            "SELECT rc.id, rc.estado, ma.nombre AS brand, mo.nombre AS model,
                    e.nombre AS vendor, mv.cantidad, rc.fecha_envio, rc.fecha_recepcion,
                    u.username AS received_by, rc.observaciones
             FROM recargas_toner rc
             JOIN movimientos_toner mv ON mv.id = rc.id_movimiento_envio
             JOIN modelos_toner mo ON mo.id = mv.id_modelo
             JOIN marcas ma ON ma.id = mo.id_marca
             JOIN empresas_recarga e ON e.id = rc.id_empresa_recarga
             LEFT JOIN usuarios u ON u.id = rc.usuario_recepcion
             WHERE (?1 IS NULL OR rc.estado = ?1)
             ORDER BY rc.fecha_envio DESC, rc.id DESC",
        )
        .bind(status.map(RechargeStatus::code))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_recharges", e))?;

        rows.iter()
            .map(|row| -> LedgerResult<RechargeReportRow> {
                let get = |e: sqlx::Error| map_sqlx_error("decode_recharge_row", e);
                let status: String = row.try_get("estado").map_err(get)?;
                let sent_at: String = row.try_get("fecha_envio").map_err(get)?;
                let received_at: Option<String> = row.try_get("fecha_recepcion").map_err(get)?;
                Ok(RechargeReportRow {
                    id: RechargeId::new(row.try_get("id").map_err(get)?),
                    status: RechargeStatus::from_code(&status)?,
                    brand: row.try_get("brand").map_err(get)?,
                    model: row.try_get("model").map_err(get)?,
                    vendor: row.try_get("vendor").map_err(get)?,
                    quantity: row.try_get("cantidad").map_err(get)?,
                    sent_at: parse_ts(&sent_at)?,
                    received_at: received_at.as_deref().map(parse_ts).transpose()?,
                    received_by: row.try_get("received_by").map_err(get)?,
                    notes: row.try_get("observaciones").map_err(get)?,
                })
            })
            .collect()
    }

    /// Per-model inbound and outbound totals for movements in `[from, to]`.
    /// Models without movements in the range are omitted.
    pub async fn movement_totals_by_model(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<ModelMovementTotals>> {
        ensure_range(from, to)?;

        let rows = sqlx::query(
            "SELECT mo.id AS model_id, ma.nombre AS brand, mo.nombre AS model,
                    COALESCE(SUM(CASE WHEN mv.tipo IN (?3, ?4) THEN mv.cantidad END), 0) AS total_in,
                    COALESCE(SUM(CASE WHEN mv.tipo IN (?5, ?6) THEN mv.cantidad END), 0) AS total_out
             FROM movimientos_toner mv
             JOIN modelos_toner mo ON mo.id = mv.id_modelo
             JOIN marcas ma ON ma.id = mo.id_marca
             WHERE mv.fecha >= ?1 AND mv.fecha <= ?2
             GROUP BY mo.id, ma.nombre, mo.nombre
             ORDER BY ma.nombre ASC, mo.nombre ASC",
        )
        .bind(fmt_ts(from))
        .bind(fmt_ts(to))
        .bind(MovementKind::Ingress.code())
        .bind(MovementKind::ReceiveFromRecharge.code())
        .bind(MovementKind::Withdrawal.code())
        .bind(MovementKind::SendToRecharge.code())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement_totals_by_model", e))?;

        rows.iter()
            .map(|row| -> LedgerResult<ModelMovementTotals> {
                let get = |e: sqlx::Error| map_sqlx_error("decode_model_totals", e);
                Ok(ModelMovementTotals {
                    model_id: ModelId::new(row.try_get("model_id").map_err(get)?),
                    brand: row.try_get("brand").map_err(get)?,
                    model: row.try_get("model").map_err(get)?,
                    total_in: row.try_get("total_in").map_err(get)?,
                    total_out: row.try_get("total_out").map_err(get)?,
                })
            })
            .collect()
    }

    /// Record count and sent quantity per (vendor, status).
    pub async fn recharge_totals_by_vendor(
        &self,
        status: Option<RechargeStatus>,
    ) -> LedgerResult<Vec<VendorRechargeTotals>> {
        let rows = sqlx::query(
            "SELECT e.id AS vendor_id, e.nombre AS vendor, rc.estado,
                    COUNT(*) AS records, COALESCE(SUM(mv.cantidad), 0) AS quantity
             FROM recargas_toner rc
             JOIN empresas_recarga e ON e.id = rc.id_empresa_recarga
             JOIN movimientos_toner mv ON mv.id = rc.id_movimiento_envio
             WHERE (?1 IS NULL OR rc.estado = ?1)
             GROUP BY e.id, e.nombre, rc.estado
             ORDER BY e.nombre ASC, rc.estado ASC",
        )
        .bind(status.map(RechargeStatus::code))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("recharge_totals_by_vendor", e))?;

        rows.iter()
            .map(|row| -> LedgerResult<VendorRechargeTotals> {
                let get = |e: sqlx::Error| map_sqlx_error("decode_vendor_totals", e);
                let status: String = row.try_get("estado").map_err(get)?;
                Ok(VendorRechargeTotals {
                    vendor_id: VendorId::new(row.try_get("vendor_id").map_err(get)?),
                    vendor: row.try_get("vendor").map_err(get)?,
                    status: RechargeStatus::from_code(&status)?,
                    records: row.try_get("records").map_err(get)?,
                    quantity: row.try_get("quantity").map_err(get)?,
                })
            })
            .collect()
    }

    /// Recompute a model's stock from its movements. Diagnostic only; never
    /// writes.
    pub async fn verify_stock_consistency(&self, model_id: ModelId) -> LedgerResult<StockConsistency> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT
                 COALESCE((SELECT cantidad FROM stock_toner WHERE id_modelo = mo.id), 0),
                 COALESCE((SELECT SUM(CASE WHEN tipo IN (?2, ?3) THEN cantidad ELSE -cantidad END)
                           FROM movimientos_toner WHERE id_modelo = mo.id), 0)
             FROM modelos_toner mo
             WHERE mo.id = ?1",
        )
        .bind(model_id.get())
        .bind(MovementKind::Ingress.code())
        .bind(MovementKind::ReceiveFromRecharge.code())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("verify_stock_consistency", e))?;

        let (stored, computed) =
            row.ok_or_else(|| LedgerError::not_found(format!("model {model_id}")))?;
        let check = StockConsistency {
            model_id,
            stored,
            computed,
        };
        if !check.is_consistent() {
            tracing::warn!(
                model_id = %model_id,
                stored,
                computed,
                "stock drift detected"
            );
        }
        Ok(check)
    }
}

fn ensure_range(from: DateTime<Utc>, to: DateTime<Utc>) -> LedgerResult<()> {
    if from > to {
        return Err(LedgerError::validation("report start date is after its end date"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_is_stored_minus_computed() {
        let check = StockConsistency {
            model_id: ModelId::new(1),
            stored: 7,
            computed: 10,
        };
        assert!(!check.is_consistent());
        assert_eq!(check.drift(), -3);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::days(1);
        assert!(matches!(ensure_range(now, earlier), Err(LedgerError::Validation(_))));
        assert!(ensure_range(earlier, now).is_ok());
    }
}
