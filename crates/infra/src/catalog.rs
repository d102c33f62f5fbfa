//! Catalog repositories: brands, toner models, recharge vendors, responsibles
//! and sectors.
//!
//! Every mutation runs in its own transaction together with its audit row.
//! Duplicate names surface as `Validation("… already exists")`; deletes that
//! would orphan ledger history surface as `Validation("… is referenced …")`.

use sqlx::{Row, SqliteConnection, SqlitePool};

use tonerledger_core::{
    BrandId, LedgerError, LedgerResult, ModelId, ResponsibleId, SectorId, UserId, VendorId,
};
use tonerledger_inventory::{
    normalize_name, Brand, NewVendor, RechargeVendor, Responsible, Sector, TonerModel,
};

use crate::audit::{self, AuditAction};
use crate::db::{begin, commit};
use crate::error::{map_sqlx_error, map_unique};
use crate::users::ensure_active;

/// A single-column name table (`id`, `nombre UNIQUE`).
///
/// `table` is always one of the constants below, never user input.
#[derive(Debug, Clone, Copy)]
struct NameTable {
    table: &'static str,
    label: &'static str,
}

const BRANDS: NameTable = NameTable {
    table: "marcas",
    label: "brand",
};
const RESPONSIBLES: NameTable = NameTable {
    table: "responsables",
    label: "responsible",
};
const SECTORS: NameTable = NameTable {
    table: "sectores",
    label: "sector",
};

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Brands
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_brand(&self, actor: UserId, name: &str) -> LedgerResult<BrandId> {
        self.create_named(BRANDS, actor, name).await.map(BrandId::new)
    }

    pub async fn rename_brand(&self, actor: UserId, id: BrandId, name: &str) -> LedgerResult<()> {
        self.rename_named(BRANDS, actor, id.get(), name).await
    }

    /// Cascades to the brand's models and their stock rows. Fails while any of
    /// those models has ledger movements.
    pub async fn delete_brand(&self, actor: UserId, id: BrandId) -> LedgerResult<()> {
        self.delete_named(BRANDS, actor, id.get()).await
    }

    pub async fn list_brands(&self) -> LedgerResult<Vec<Brand>> {
        Ok(self
            .list_named(BRANDS)
            .await?
            .into_iter()
            .map(|(id, name)| Brand {
                id: BrandId::new(id),
                name,
            })
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Toner models
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_model(
        &self,
        actor: UserId,
        brand_id: BrandId,
        name: &str,
    ) -> LedgerResult<ModelId> {
        let name = normalize_name("model", name)?;
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;
        ensure_row(&mut tx, "marcas", brand_id.get(), "brand").await?;

        let res = sqlx::query("INSERT INTO modelos_toner (id_marca, nombre) VALUES (?1, ?2)")
            .bind(brand_id.get())
            .bind(&name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique("create_model", &format!("model '{name}' for this brand"), e))?;
        let id = res.last_insert_rowid();

        audit::record(
            &mut tx,
            actor,
            AuditAction::Create,
            "modelos_toner",
            Some(id),
            &format!("model '{name}' (brand {brand_id})"),
        )
        .await?;
        commit(tx).await?;

        tracing::info!(model_id = id, brand_id = %brand_id, "toner model created");
        Ok(ModelId::new(id))
    }

    pub async fn rename_model(&self, actor: UserId, id: ModelId, name: &str) -> LedgerResult<()> {
        let name = normalize_name("model", name)?;
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;

        let res = sqlx::query("UPDATE modelos_toner SET nombre = ?1 WHERE id = ?2")
            .bind(&name)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique("rename_model", &format!("model '{name}' for this brand"), e))?;
        if res.rows_affected() == 0 {
            return Err(LedgerError::not_found(format!("model {id}")));
        }

        audit::record(
            &mut tx,
            actor,
            AuditAction::Update,
            "modelos_toner",
            Some(id.get()),
            &format!("renamed to '{name}'"),
        )
        .await?;
        commit(tx).await
    }

    /// Only models without ledger history can be deleted.
    pub async fn delete_model(&self, actor: UserId, id: ModelId) -> LedgerResult<()> {
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;
        ensure_row(&mut tx, "modelos_toner", id.get(), "model").await?;

        let (movements,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM movimientos_toner WHERE id_modelo = ?1")
                .bind(id.get())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("count_model_movements", e))?;
        if movements > 0 {
            return Err(LedgerError::validation(format!(
                "model {id} is referenced by {movements} movements"
            )));
        }

        sqlx::query("DELETE FROM modelos_toner WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_model", e))?;

        audit::record(&mut tx, actor, AuditAction::Delete, "modelos_toner", Some(id.get()), "")
            .await?;
        commit(tx).await
    }

    pub async fn get_model(&self, id: ModelId) -> LedgerResult<TonerModel> {
        let row = sqlx::query("SELECT id, id_marca, nombre FROM modelos_toner WHERE id = ?1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_model", e))?
            .ok_or_else(|| LedgerError::not_found(format!("model {id}")))?;
        row_to_model(&row)
    }

    /// Models ordered by name, optionally restricted to one brand.
    pub async fn list_models(&self, brand_id: Option<BrandId>) -> LedgerResult<Vec<TonerModel>> {
        let rows = sqlx::query(
            "SELECT id, id_marca, nombre
             FROM modelos_toner
             WHERE (?1 IS NULL OR id_marca = ?1)
             ORDER BY nombre ASC",
        )
        .bind(brand_id.map(BrandId::get))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_models", e))?;

        rows.iter().map(row_to_model).collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Recharge vendors
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_vendor(&self, actor: UserId, vendor: &NewVendor) -> LedgerResult<VendorId> {
        let vendor = vendor.normalized()?;
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;

        let res = sqlx::query(
            "INSERT INTO empresas_recarga (nombre, contacto, telefono) VALUES (?1, ?2, ?3)",
        )
        .bind(&vendor.name)
        .bind(&vendor.contact)
        .bind(&vendor.phone)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique("create_vendor", &format!("vendor '{}'", vendor.name), e))?;
        let id = res.last_insert_rowid();

        audit::record(
            &mut tx,
            actor,
            AuditAction::Create,
            "empresas_recarga",
            Some(id),
            &format!("vendor '{}'", vendor.name),
        )
        .await?;
        commit(tx).await?;
        Ok(VendorId::new(id))
    }

    pub async fn update_vendor(
        &self,
        actor: UserId,
        id: VendorId,
        vendor: &NewVendor,
    ) -> LedgerResult<()> {
        let vendor = vendor.normalized()?;
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;

        let res = sqlx::query(
            "UPDATE empresas_recarga SET nombre = ?1, contacto = ?2, telefono = ?3 WHERE id = ?4",
        )
        .bind(&vendor.name)
        .bind(&vendor.contact)
        .bind(&vendor.phone)
        .bind(id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique("update_vendor", &format!("vendor '{}'", vendor.name), e))?;
        if res.rows_affected() == 0 {
            return Err(LedgerError::not_found(format!("vendor {id}")));
        }

        audit::record(
            &mut tx,
            actor,
            AuditAction::Update,
            "empresas_recarga",
            Some(id.get()),
            &format!("vendor '{}'", vendor.name),
        )
        .await?;
        commit(tx).await
    }

    /// Blocked while any recharge record references the vendor, whatever its status.
    pub async fn delete_vendor(&self, actor: UserId, id: VendorId) -> LedgerResult<()> {
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;
        ensure_row(&mut tx, "empresas_recarga", id.get(), "vendor").await?;

        let (recharges,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM recargas_toner WHERE id_empresa_recarga = ?1")
                .bind(id.get())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("count_vendor_recharges", e))?;
        if recharges > 0 {
            return Err(LedgerError::validation(format!(
                "vendor {id} is referenced by {recharges} recharge records"
            )));
        }

        sqlx::query("DELETE FROM empresas_recarga WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_vendor", e))?;

        audit::record(&mut tx, actor, AuditAction::Delete, "empresas_recarga", Some(id.get()), "")
            .await?;
        commit(tx).await
    }

    pub async fn get_vendor(&self, id: VendorId) -> LedgerResult<RechargeVendor> {
        let row = sqlx::query(
            "SELECT id, nombre, contacto, telefono FROM empresas_recarga WHERE id = ?1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_vendor", e))?
        .ok_or_else(|| LedgerError::not_found(format!("vendor {id}")))?;
        row_to_vendor(&row)
    }

    pub async fn list_vendors(&self) -> LedgerResult<Vec<RechargeVendor>> {
        let rows = sqlx::query(
            "SELECT id, nombre, contacto, telefono FROM empresas_recarga ORDER BY nombre ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_vendors", e))?;

        rows.iter().map(row_to_vendor).collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Responsibles & sectors
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_responsible(&self, actor: UserId, name: &str) -> LedgerResult<ResponsibleId> {
        self.create_named(RESPONSIBLES, actor, name)
            .await
            .map(ResponsibleId::new)
    }

    pub async fn rename_responsible(
        &self,
        actor: UserId,
        id: ResponsibleId,
        name: &str,
    ) -> LedgerResult<()> {
        self.rename_named(RESPONSIBLES, actor, id.get(), name).await
    }

    pub async fn delete_responsible(&self, actor: UserId, id: ResponsibleId) -> LedgerResult<()> {
        self.delete_named(RESPONSIBLES, actor, id.get()).await
    }

    pub async fn list_responsibles(&self) -> LedgerResult<Vec<Responsible>> {
        Ok(self
            .list_named(RESPONSIBLES)
            .await?
            .into_iter()
            .map(|(id, name)| Responsible {
                id: ResponsibleId::new(id),
                name,
            })
            .collect())
    }

    pub async fn create_sector(&self, actor: UserId, name: &str) -> LedgerResult<SectorId> {
        self.create_named(SECTORS, actor, name).await.map(SectorId::new)
    }

    pub async fn rename_sector(&self, actor: UserId, id: SectorId, name: &str) -> LedgerResult<()> {
        self.rename_named(SECTORS, actor, id.get(), name).await
    }

    pub async fn delete_sector(&self, actor: UserId, id: SectorId) -> LedgerResult<()> {
        self.delete_named(SECTORS, actor, id.get()).await
    }

    pub async fn list_sectors(&self) -> LedgerResult<Vec<Sector>> {
        Ok(self
            .list_named(SECTORS)
            .await?
            .into_iter()
            .map(|(id, name)| Sector {
                id: SectorId::new(id),
                name,
            })
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Shared name-table operations
    // ─────────────────────────────────────────────────────────────────────

    async fn create_named(&self, t: NameTable, actor: UserId, name: &str) -> LedgerResult<i64> {
        let name = normalize_name(t.label, name)?;
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;

        let res = sqlx::query(&format!("INSERT INTO {} (nombre) VALUES (?1)", t.table))
            .bind(&name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique("create", &format!("{} '{name}'", t.label), e))?;
        let id = res.last_insert_rowid();

        audit::record(
            &mut tx,
            actor,
            AuditAction::Create,
            t.table,
            Some(id),
            &format!("{} '{name}'", t.label),
        )
        .await?;
        commit(tx).await?;
        Ok(id)
    }

    async fn rename_named(&self, t: NameTable, actor: UserId, id: i64, name: &str) -> LedgerResult<()> {
        let name = normalize_name(t.label, name)?;
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;

        let res = sqlx::query(&format!("UPDATE {} SET nombre = ?1 WHERE id = ?2", t.table))
            .bind(&name)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique("rename", &format!("{} '{name}'", t.label), e))?;
        if res.rows_affected() == 0 {
            return Err(LedgerError::not_found(format!("{} {id}", t.label)));
        }

        audit::record(
            &mut tx,
            actor,
            AuditAction::Update,
            t.table,
            Some(id),
            &format!("renamed to '{name}'"),
        )
        .await?;
        commit(tx).await
    }

    async fn delete_named(&self, t: NameTable, actor: UserId, id: i64) -> LedgerResult<()> {
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;
        ensure_row(&mut tx, t.table, id, t.label).await?;

        sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", t.table))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match map_sqlx_error("delete", e) {
                LedgerError::Validation(_) => LedgerError::validation(format!(
                    "{} {id} is referenced by ledger movements",
                    t.label
                )),
                other => other,
            })?;

        audit::record(&mut tx, actor, AuditAction::Delete, t.table, Some(id), "").await?;
        commit(tx).await
    }

    async fn list_named(&self, t: NameTable) -> LedgerResult<Vec<(i64, String)>> {
        sqlx::query_as(&format!("SELECT id, nombre FROM {} ORDER BY nombre ASC", t.table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))
    }
}

/// `NotFound` unless `table` has a row with `id`. `table` must be a constant.
pub(crate) async fn ensure_row(
    conn: &mut SqliteConnection,
    table: &'static str,
    id: i64,
    label: &str,
) -> LedgerResult<()> {
    let found: Option<(i64,)> = sqlx::query_as(&format!("SELECT id FROM {table} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("lookup", e))?;
    match found {
        Some(_) => Ok(()),
        None => Err(LedgerError::not_found(format!("{label} {id}"))),
    }
}

fn row_to_model(row: &sqlx::sqlite::SqliteRow) -> LedgerResult<TonerModel> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_model", e);
    Ok(TonerModel {
        id: ModelId::new(row.try_get("id").map_err(get)?),
        brand_id: BrandId::new(row.try_get("id_marca").map_err(get)?),
        name: row.try_get("nombre").map_err(get)?,
    })
}

fn row_to_vendor(row: &sqlx::sqlite::SqliteRow) -> LedgerResult<RechargeVendor> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_vendor", e);
    Ok(RechargeVendor {
        id: VendorId::new(row.try_get("id").map_err(get)?),
        name: row.try_get("nombre").map_err(get)?,
        contact: row.try_get("contacto").map_err(get)?,
        phone: row.try_get("telefono").map_err(get)?,
    })
}
