//! Toner stock ledger.
//!
//! The stock row of a model is maintained incrementally: every movement
//! updates it by its signed delta in the same transaction that appends the
//! movement and its audit entry. Nothing here ever recomputes stock from the
//! log (see `ReportQueries::verify_stock_consistency` for the diagnostic).
//!
//! ## Concurrency
//!
//! Writers are serialized by `write_gate`, held for the whole unit of work.
//! Outbound updates are additionally conditional (`WHERE cantidad + delta >= 0`),
//! so a stale read can never drive stock negative even without the gate.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::instrument;

use tonerledger_core::{
    LedgerError, LedgerResult, ModelId, MovementId, RechargeId, ResponsibleId, SectorId, UserId,
    VendorId,
};
use tonerledger_inventory::{
    Movement, MovementKind, NewMovement, RechargeRecord, RechargeStatus, StockLevel,
};

use crate::audit::{self, AuditAction};
use crate::catalog::ensure_row;
use crate::db::{begin, commit, fmt_ts, parse_ts};
use crate::error::map_sqlx_error;
use crate::users::ensure_active;

#[derive(Debug, Clone)]
pub struct TonerLedger {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
}

impl TonerLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append one ingress or withdrawal and apply it to stock.
    ///
    /// Fails without changing anything when the quantity is not positive, a
    /// referenced record is missing, or an outbound movement exceeds stock.
    /// Recharge movements only go through `send_to_recharge` and
    /// `receive_from_recharge`, which pair them with a recharge record.
    #[instrument(
        skip_all,
        fields(
            user_id = %actor,
            model_id = %movement.model_id,
            kind = %movement.kind,
            quantity = movement.quantity
        ),
        err
    )]
    pub async fn record_movement(
        &self,
        actor: UserId,
        movement: NewMovement,
    ) -> LedgerResult<MovementId> {
        if movement.kind.is_recharge() {
            return Err(LedgerError::validation(format!(
                "{} movements must go through the recharge workflow",
                movement.kind
            )));
        }
        movement.validate()?;

        let _gate = self.write_gate.lock().await;
        let mut tx = begin(&self.pool).await?;

        let id = apply_movement(&mut tx, actor, &movement).await?;
        audit::record(
            &mut tx,
            actor,
            audit_action(movement.kind),
            "movimientos_toner",
            Some(id.get()),
            &format!(
                "{} x{} model {}",
                movement.kind, movement.quantity, movement.model_id
            ),
        )
        .await?;

        commit(tx).await?;
        tracing::info!(movement_id = %id, "movement recorded");
        Ok(id)
    }

    /// Ingress shorthand.
    pub async fn load_stock(
        &self,
        actor: UserId,
        model_id: ModelId,
        quantity: i64,
        notes: &str,
    ) -> LedgerResult<MovementId> {
        let movement =
            NewMovement::new(model_id, MovementKind::Ingress, quantity).with_notes(notes);
        self.record_movement(actor, movement).await
    }

    /// Current quantity on hand; 0 for a model that was never stocked.
    pub async fn get_stock(&self, model_id: ModelId) -> LedgerResult<i64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        read_stock(&mut conn, model_id).await
    }

    pub async fn get_movement(&self, id: MovementId) -> LedgerResult<Movement> {
        let row = sqlx::query(
            "SELECT id, id_modelo, tipo, cantidad, id_responsable, id_sector,
                    id_empresa_recarga, observaciones, fecha, usuario_id
             FROM movimientos_toner WHERE id = ?1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_movement", e))?
        .ok_or_else(|| LedgerError::not_found(format!("movement {id}")))?;

        row_to_movement(&row)
    }

    /// Send `quantity` cartridges to `vendor_id` and open a recharge record.
    #[instrument(
        skip_all,
        fields(user_id = %actor, model_id = %model_id, vendor_id = %vendor_id),
        err
    )]
    pub async fn send_to_recharge(
        &self,
        actor: UserId,
        model_id: ModelId,
        quantity: i64,
        vendor_id: VendorId,
        notes: &str,
    ) -> LedgerResult<RechargeId> {
        let movement = NewMovement::new(model_id, MovementKind::SendToRecharge, quantity)
            .with_vendor(vendor_id)
            .with_notes(notes);
        movement.validate()?;

        let _gate = self.write_gate.lock().await;
        let mut tx = begin(&self.pool).await?;

        let movement_id = apply_movement(&mut tx, actor, &movement).await?;
        let res = sqlx::query(
            "INSERT INTO recargas_toner
                (id_movimiento_envio, id_empresa_recarga, estado, fecha_envio)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(movement_id.get())
        .bind(vendor_id.get())
        .bind(RechargeStatus::Sent.code())
        .bind(fmt_ts(Utc::now()))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_recharge", e))?;
        let recharge_id = RechargeId::new(res.last_insert_rowid());

        audit::record(
            &mut tx,
            actor,
            AuditAction::RechargeSend,
            "recargas_toner",
            Some(recharge_id.get()),
            &format!("sent x{quantity} model {model_id} to vendor {vendor_id}"),
        )
        .await?;

        commit(tx).await?;
        tracing::info!(recharge_id = %recharge_id, "recharge sent");
        Ok(recharge_id)
    }

    /// Receive a recharge back: credit the sent quantity and close the record.
    #[instrument(skip_all, fields(user_id = %actor, recharge_id = %recharge_id), err)]
    pub async fn receive_from_recharge(
        &self,
        actor: UserId,
        recharge_id: RechargeId,
        notes: &str,
    ) -> LedgerResult<MovementId> {
        let _gate = self.write_gate.lock().await;
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;

        let mut record = fetch_recharge(&mut tx, recharge_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("recharge {recharge_id}")))?;
        record.ensure_receivable()?;

        let (model_id, quantity, vendor_id): (i64, i64, i64) = sqlx::query_as(
            "SELECT m.id_modelo, m.cantidad, r.id_empresa_recarga
             FROM recargas_toner r
             JOIN movimientos_toner m ON m.id = r.id_movimiento_envio
             WHERE r.id = ?1",
        )
        .bind(recharge_id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_send_movement", e))?;

        let movement = NewMovement::new(
            ModelId::new(model_id),
            MovementKind::ReceiveFromRecharge,
            quantity,
        )
        .with_vendor(VendorId::new(vendor_id))
        .with_notes(notes);
        let movement_id = apply_movement(&mut tx, actor, &movement).await?;

        let notes = Some(notes.trim().to_string()).filter(|n| !n.is_empty());
        record.mark_received(movement_id, actor, Utc::now(), notes)?;

        let res = sqlx::query(
            "UPDATE recargas_toner
             SET estado = ?1, id_movimiento_recepcion = ?2, fecha_recepcion = ?3,
                 usuario_recepcion = ?4, observaciones = ?5
             WHERE id = ?6 AND estado = ?7",
        )
        .bind(record.status.code())
        .bind(movement_id.get())
        .bind(record.received_at.map(fmt_ts))
        .bind(actor.get())
        .bind(&record.notes)
        .bind(recharge_id.get())
        .bind(RechargeStatus::Sent.code())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_recharge", e))?;
        if res.rows_affected() == 0 {
            return Err(LedgerError::invalid_state("recharge already received"));
        }

        audit::record(
            &mut tx,
            actor,
            AuditAction::RechargeReceive,
            "recargas_toner",
            Some(recharge_id.get()),
            &format!("received x{quantity} model {model_id}"),
        )
        .await?;

        commit(tx).await?;
        tracing::info!(movement_id = %movement_id, "recharge received");
        Ok(movement_id)
    }

    pub async fn get_recharge(&self, recharge_id: RechargeId) -> LedgerResult<RechargeRecord> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        fetch_recharge(&mut conn, recharge_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("recharge {recharge_id}")))
    }
}

fn audit_action(kind: MovementKind) -> AuditAction {
    match kind {
        MovementKind::Ingress => AuditAction::StockIngress,
        MovementKind::Withdrawal => AuditAction::StockWithdrawal,
        MovementKind::SendToRecharge => AuditAction::RechargeSend,
        MovementKind::ReceiveFromRecharge => AuditAction::RechargeReceive,
    }
}

/// Check references, apply the stock delta and append the movement, on the
/// caller's transaction. The caller validates `movement` and commits.
async fn apply_movement(
    conn: &mut SqliteConnection,
    actor: UserId,
    movement: &NewMovement,
) -> LedgerResult<MovementId> {
    ensure_active(conn, actor).await?;
    ensure_row(conn, "modelos_toner", movement.model_id.get(), "model").await?;
    if let Some(id) = movement.responsible_id {
        ensure_row(conn, "responsables", id.get(), "responsible").await?;
    }
    if let Some(id) = movement.sector_id {
        ensure_row(conn, "sectores", id.get(), "sector").await?;
    }
    if let Some(id) = movement.vendor_id {
        ensure_row(conn, "empresas_recarga", id.get(), "vendor").await?;
    }

    let current = StockLevel {
        model_id: movement.model_id,
        quantity: read_stock(conn, movement.model_id).await?,
    };
    let next = current.apply(movement.kind, movement.quantity)?;
    let delta = movement.signed_delta();

    if delta > 0 {
        sqlx::query(
            "INSERT INTO stock_toner (id_modelo, cantidad) VALUES (?1, ?2)
             ON CONFLICT (id_modelo) DO UPDATE SET cantidad = cantidad + excluded.cantidad",
        )
        .bind(movement.model_id.get())
        .bind(delta)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("credit_stock", e))?;
    } else {
        let res = sqlx::query(
            "UPDATE stock_toner SET cantidad = cantidad + ?1
             WHERE id_modelo = ?2 AND cantidad + ?1 >= 0",
        )
        .bind(delta)
        .bind(movement.model_id.get())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("debit_stock", e))?;
        if res.rows_affected() == 0 {
            return Err(LedgerError::insufficient_stock(
                movement.quantity,
                current.quantity,
            ));
        }
    }

    let res = sqlx::query(
        "INSERT INTO movimientos_toner
            (id_modelo, tipo, cantidad, id_responsable, id_sector, id_empresa_recarga,
             observaciones, fecha, usuario_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(movement.model_id.get())
    .bind(movement.kind.code())
    .bind(movement.quantity)
    .bind(movement.responsible_id.map(ResponsibleId::get))
    .bind(movement.sector_id.map(SectorId::get))
    .bind(movement.vendor_id.map(VendorId::get))
    .bind(movement.notes.trim())
    .bind(fmt_ts(Utc::now()))
    .bind(actor.get())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;

    tracing::debug!(
        model_id = %movement.model_id,
        before = current.quantity,
        after = next.quantity,
        "stock updated"
    );
    Ok(MovementId::new(res.last_insert_rowid()))
}

pub(crate) async fn read_stock(conn: &mut SqliteConnection, model_id: ModelId) -> LedgerResult<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT cantidad FROM stock_toner WHERE id_modelo = ?1")
        .bind(model_id.get())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("read_stock", e))?;
    Ok(row.map_or(0, |(quantity,)| quantity))
}

async fn fetch_recharge(
    conn: &mut SqliteConnection,
    recharge_id: RechargeId,
) -> LedgerResult<Option<RechargeRecord>> {
    let row = sqlx::query(
        "SELECT id, id_movimiento_envio, id_movimiento_recepcion, estado, fecha_envio,
                fecha_recepcion, usuario_recepcion, observaciones
         FROM recargas_toner WHERE id = ?1",
    )
    .bind(recharge_id.get())
    .fetch_optional(conn)
    .await
    .map_err(|e| map_sqlx_error("get_recharge", e))?;

    row.as_ref().map(row_to_recharge).transpose()
}

pub(crate) fn row_to_recharge(row: &sqlx::sqlite::SqliteRow) -> LedgerResult<RechargeRecord> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_recharge", e);
    let status: String = row.try_get("estado").map_err(get)?;
    let sent_at: String = row.try_get("fecha_envio").map_err(get)?;
    let received_at: Option<String> = row.try_get("fecha_recepcion").map_err(get)?;

    Ok(RechargeRecord {
        id: RechargeId::new(row.try_get("id").map_err(get)?),
        send_movement_id: MovementId::new(row.try_get("id_movimiento_envio").map_err(get)?),
        receive_movement_id: row
            .try_get::<Option<i64>, _>("id_movimiento_recepcion")
            .map_err(get)?
            .map(MovementId::new),
        status: RechargeStatus::from_code(&status)?,
        sent_at: parse_ts(&sent_at)?,
        received_at: received_at.as_deref().map(parse_ts).transpose()?,
        received_by: row
            .try_get::<Option<i64>, _>("usuario_recepcion")
            .map_err(get)?
            .map(UserId::new),
        notes: row.try_get("observaciones").map_err(get)?,
    })
}

pub(crate) fn row_to_movement(row: &sqlx::sqlite::SqliteRow) -> LedgerResult<Movement> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_movement", e);
    let kind: String = row.try_get("tipo").map_err(get)?;
    let at: String = row.try_get("fecha").map_err(get)?;

    Ok(Movement {
        id: MovementId::new(row.try_get("id").map_err(get)?),
        model_id: ModelId::new(row.try_get("id_modelo").map_err(get)?),
        kind: MovementKind::from_code(&kind)?,
        quantity: row.try_get("cantidad").map_err(get)?,
        responsible_id: row
            .try_get::<Option<i64>, _>("id_responsable")
            .map_err(get)?
            .map(ResponsibleId::new),
        sector_id: row
            .try_get::<Option<i64>, _>("id_sector")
            .map_err(get)?
            .map(SectorId::new),
        vendor_id: row
            .try_get::<Option<i64>, _>("id_empresa_recarga")
            .map_err(get)?
            .map(VendorId::new),
        notes: row.try_get("observaciones").map_err(get)?,
        occurred_at: parse_ts(&at)?,
        user_id: UserId::new(row.try_get("usuario_id").map_err(get)?),
    })
}
