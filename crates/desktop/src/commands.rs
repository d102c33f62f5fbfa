//! Commands invoked by the desktop shell.
//!
//! Every command resolves the caller's session token, checks the permission
//! the operation needs, then calls the service with the session's user as the
//! acting user. Errors are returned as [`LedgerError`] for the shell to phrase.

use chrono::{DateTime, Utc};

use tonerledger_auth::permissions::{
    CATALOG_MANAGE, TONER_MOVE, TONER_READ, TONER_RECHARGE, USERS_MANAGE,
};
use tonerledger_auth::{authorize, LoginError, Permission, Role, Session, SessionToken};
use tonerledger_core::{
    BrandId, LedgerError, LedgerResult, ModelId, MovementId, RechargeId, ResponsibleId, SectorId,
    UserId, VendorId,
};
use tonerledger_infra::{
    AuditEntry, ModelMovementTotals, MovementFilter, MovementReportRow, RechargeReportRow,
    StockConsistency, StockReportRow, User, VendorRechargeTotals,
};
use tonerledger_inventory::{
    Brand, MovementKind, NewMovement, NewVendor, RechargeRecord, RechargeStatus, RechargeVendor,
    Responsible, Sector, TonerModel,
};

use crate::state::AppState;
use crate::views::{View, ViewId};

#[derive(Clone)]
pub struct Commands {
    state: AppState,
}

impl Commands {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Resolve the session and check `permission`.
    fn guard(&self, token: &SessionToken, permission: &Permission) -> LedgerResult<Session> {
        let sessions = self
            .state
            .sessions
            .lock()
            .map_err(|_| LedgerError::store("session store lock poisoned"))?;
        let session = sessions.validate(token)?;
        authorize(session, permission)?;
        Ok(session.clone())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────

    /// Verify credentials on a background task and open a session.
    pub async fn login(&self, username: &str, password: &str) -> LedgerResult<SessionToken> {
        let attempt = self.state.login.begin(username, password);
        let (token, _) = attempt.join().await.map_err(login_error)?;
        Ok(token)
    }

    pub fn logout(&self, token: &SessionToken) -> LedgerResult<()> {
        let mut sessions = self
            .state
            .sessions
            .lock()
            .map_err(|_| LedgerError::store("session store lock poisoned"))?;
        if sessions.destroy(token) {
            tracing::info!("logged out");
        }
        Ok(())
    }

    pub fn current_session(&self, token: &SessionToken) -> LedgerResult<Session> {
        self.guard(token, &TONER_READ)
    }

    /// Views the session may open, in menu order.
    pub fn available_views(&self, token: &SessionToken) -> LedgerResult<Vec<View>> {
        let session = self.current_session(token)?;
        Ok(ViewId::ALL
            .into_iter()
            .map(ViewId::build)
            .filter(|view| authorize(&session, &view.required).is_ok())
            .collect())
    }

    pub fn open_view(&self, token: &SessionToken, id: ViewId) -> LedgerResult<View> {
        let view = id.build();
        self.guard(token, &view.required)?;
        Ok(view)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ledger
    // ─────────────────────────────────────────────────────────────────────

    pub async fn record_movement(
        &self,
        token: &SessionToken,
        movement: NewMovement,
    ) -> LedgerResult<MovementId> {
        let session = self.guard(token, &TONER_MOVE)?;
        self.state.ledger.record_movement(session.user_id, movement).await
    }

    pub async fn load_stock(
        &self,
        token: &SessionToken,
        model_id: ModelId,
        quantity: i64,
        notes: &str,
    ) -> LedgerResult<MovementId> {
        let session = self.guard(token, &TONER_MOVE)?;
        self.state
            .ledger
            .load_stock(session.user_id, model_id, quantity, notes)
            .await
    }

    pub async fn withdraw(
        &self,
        token: &SessionToken,
        model_id: ModelId,
        quantity: i64,
        responsible_id: Option<ResponsibleId>,
        sector_id: Option<SectorId>,
        notes: &str,
    ) -> LedgerResult<MovementId> {
        let mut movement =
            NewMovement::new(model_id, MovementKind::Withdrawal, quantity).with_notes(notes);
        movement.responsible_id = responsible_id;
        movement.sector_id = sector_id;
        self.record_movement(token, movement).await
    }

    pub async fn get_stock(&self, token: &SessionToken, model_id: ModelId) -> LedgerResult<i64> {
        self.guard(token, &TONER_READ)?;
        self.state.ledger.get_stock(model_id).await
    }

    pub async fn send_to_recharge(
        &self,
        token: &SessionToken,
        model_id: ModelId,
        quantity: i64,
        vendor_id: VendorId,
        notes: &str,
    ) -> LedgerResult<RechargeId> {
        let session = self.guard(token, &TONER_RECHARGE)?;
        self.state
            .ledger
            .send_to_recharge(session.user_id, model_id, quantity, vendor_id, notes)
            .await
    }

    pub async fn receive_from_recharge(
        &self,
        token: &SessionToken,
        recharge_id: RechargeId,
        notes: &str,
    ) -> LedgerResult<MovementId> {
        let session = self.guard(token, &TONER_RECHARGE)?;
        self.state
            .ledger
            .receive_from_recharge(session.user_id, recharge_id, notes)
            .await
    }

    pub async fn get_recharge(
        &self,
        token: &SessionToken,
        recharge_id: RechargeId,
    ) -> LedgerResult<RechargeRecord> {
        self.guard(token, &TONER_READ)?;
        self.state.ledger.get_recharge(recharge_id).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reports
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_stock(&self, token: &SessionToken) -> LedgerResult<Vec<StockReportRow>> {
        self.guard(token, &TONER_READ)?;
        self.state.reports.list_stock().await
    }

    pub async fn low_stock(
        &self,
        token: &SessionToken,
        threshold: i64,
    ) -> LedgerResult<Vec<StockReportRow>> {
        self.guard(token, &TONER_READ)?;
        self.state.reports.low_stock(threshold).await
    }

    pub async fn list_movements(
        &self,
        token: &SessionToken,
        filter: &MovementFilter,
    ) -> LedgerResult<Vec<MovementReportRow>> {
        self.guard(token, &TONER_READ)?;
        self.state.reports.list_movements(filter).await
    }

    pub async fn list_recharges(
        &self,
        token: &SessionToken,
        status: Option<RechargeStatus>,
    ) -> LedgerResult<Vec<RechargeReportRow>> {
        self.guard(token, &TONER_READ)?;
        self.state.reports.list_recharges(status).await
    }

    pub async fn movement_totals_by_model(
        &self,
        token: &SessionToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<ModelMovementTotals>> {
        self.guard(token, &TONER_READ)?;
        self.state.reports.movement_totals_by_model(from, to).await
    }

    pub async fn recharge_totals_by_vendor(
        &self,
        token: &SessionToken,
        status: Option<RechargeStatus>,
    ) -> LedgerResult<Vec<VendorRechargeTotals>> {
        self.guard(token, &TONER_READ)?;
        self.state.reports.recharge_totals_by_vendor(status).await
    }

    pub async fn verify_stock_consistency(
        &self,
        token: &SessionToken,
        model_id: ModelId,
    ) -> LedgerResult<StockConsistency> {
        self.guard(token, &TONER_READ)?;
        self.state.reports.verify_stock_consistency(model_id).await
    }

    pub async fn recent_audit(
        &self,
        token: &SessionToken,
        limit: u32,
    ) -> LedgerResult<Vec<AuditEntry>> {
        self.guard(token, &USERS_MANAGE)?;
        self.state.audit.recent(limit).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_brands(&self, token: &SessionToken) -> LedgerResult<Vec<Brand>> {
        self.guard(token, &TONER_READ)?;
        self.state.catalog.list_brands().await
    }

    pub async fn create_brand(&self, token: &SessionToken, name: &str) -> LedgerResult<BrandId> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.create_brand(session.user_id, name).await
    }

    pub async fn rename_brand(
        &self,
        token: &SessionToken,
        id: BrandId,
        name: &str,
    ) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.rename_brand(session.user_id, id, name).await
    }

    pub async fn delete_brand(&self, token: &SessionToken, id: BrandId) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.delete_brand(session.user_id, id).await
    }

    pub async fn list_models(
        &self,
        token: &SessionToken,
        brand_id: Option<BrandId>,
    ) -> LedgerResult<Vec<TonerModel>> {
        self.guard(token, &TONER_READ)?;
        self.state.catalog.list_models(brand_id).await
    }

    pub async fn create_model(
        &self,
        token: &SessionToken,
        brand_id: BrandId,
        name: &str,
    ) -> LedgerResult<ModelId> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state
            .catalog
            .create_model(session.user_id, brand_id, name)
            .await
    }

    pub async fn rename_model(
        &self,
        token: &SessionToken,
        id: ModelId,
        name: &str,
    ) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.rename_model(session.user_id, id, name).await
    }

    pub async fn delete_model(&self, token: &SessionToken, id: ModelId) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.delete_model(session.user_id, id).await
    }

    pub async fn list_vendors(&self, token: &SessionToken) -> LedgerResult<Vec<RechargeVendor>> {
        self.guard(token, &TONER_READ)?;
        self.state.catalog.list_vendors().await
    }

    pub async fn create_vendor(
        &self,
        token: &SessionToken,
        vendor: &NewVendor,
    ) -> LedgerResult<VendorId> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.create_vendor(session.user_id, vendor).await
    }

    pub async fn update_vendor(
        &self,
        token: &SessionToken,
        id: VendorId,
        vendor: &NewVendor,
    ) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state
            .catalog
            .update_vendor(session.user_id, id, vendor)
            .await
    }

    pub async fn delete_vendor(&self, token: &SessionToken, id: VendorId) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.delete_vendor(session.user_id, id).await
    }

    pub async fn list_responsibles(&self, token: &SessionToken) -> LedgerResult<Vec<Responsible>> {
        self.guard(token, &TONER_READ)?;
        self.state.catalog.list_responsibles().await
    }

    pub async fn create_responsible(
        &self,
        token: &SessionToken,
        name: &str,
    ) -> LedgerResult<ResponsibleId> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.create_responsible(session.user_id, name).await
    }

    pub async fn rename_responsible(
        &self,
        token: &SessionToken,
        id: ResponsibleId,
        name: &str,
    ) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state
            .catalog
            .rename_responsible(session.user_id, id, name)
            .await
    }

    pub async fn delete_responsible(
        &self,
        token: &SessionToken,
        id: ResponsibleId,
    ) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.delete_responsible(session.user_id, id).await
    }

    pub async fn list_sectors(&self, token: &SessionToken) -> LedgerResult<Vec<Sector>> {
        self.guard(token, &TONER_READ)?;
        self.state.catalog.list_sectors().await
    }

    pub async fn create_sector(&self, token: &SessionToken, name: &str) -> LedgerResult<SectorId> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.create_sector(session.user_id, name).await
    }

    pub async fn rename_sector(
        &self,
        token: &SessionToken,
        id: SectorId,
        name: &str,
    ) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.rename_sector(session.user_id, id, name).await
    }

    pub async fn delete_sector(&self, token: &SessionToken, id: SectorId) -> LedgerResult<()> {
        let session = self.guard(token, &CATALOG_MANAGE)?;
        self.state.catalog.delete_sector(session.user_id, id).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_users(&self, token: &SessionToken) -> LedgerResult<Vec<User>> {
        self.guard(token, &USERS_MANAGE)?;
        self.state.users.list().await
    }

    pub async fn create_user(
        &self,
        token: &SessionToken,
        username: &str,
        full_name: &str,
        role: Role,
        password: &str,
    ) -> LedgerResult<UserId> {
        let session = self.guard(token, &USERS_MANAGE)?;
        self.state
            .users
            .create_user(session.user_id, username, full_name, role, password)
            .await
    }

    pub async fn set_user_active(
        &self,
        token: &SessionToken,
        user_id: UserId,
        active: bool,
    ) -> LedgerResult<()> {
        let session = self.guard(token, &USERS_MANAGE)?;
        self.state
            .users
            .set_active(session.user_id, user_id, active)
            .await
    }
}

fn login_error(err: LoginError) -> LedgerError {
    match err {
        LoginError::InvalidCredentials => LedgerError::unauthorized(err.to_string()),
        LoginError::Cancelled | LoginError::Superseded => LedgerError::invalid_state(err.to_string()),
        LoginError::Backend(msg) => LedgerError::store(msg),
    }
}
