//! Application state shared by every command.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use sqlx::SqlitePool;

use tonerledger_auth::{LoginFlow, SessionStore};
use tonerledger_infra::{
    connect, AppConfig, AuditLog, CatalogRepository, ReportQueries, TonerLedger, UserRepository,
};

/// Stores and services, wired once at startup and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub ledger: TonerLedger,
    pub catalog: CatalogRepository,
    pub reports: ReportQueries,
    pub users: UserRepository,
    pub audit: AuditLog,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub login: LoginFlow,
}

impl AppState {
    /// Wire every service over an already migrated pool.
    pub fn new(pool: SqlitePool, session_ttl: chrono::Duration) -> Self {
        let users = UserRepository::new(pool.clone());
        let sessions = Arc::new(Mutex::new(SessionStore::new(session_ttl)));
        let login = LoginFlow::new(Arc::new(users.clone()), sessions.clone());

        Self {
            ledger: TonerLedger::new(pool.clone()),
            catalog: CatalogRepository::new(pool.clone()),
            reports: ReportQueries::new(pool.clone()),
            audit: AuditLog::new(pool.clone()),
            pool,
            users,
            sessions,
            login,
        }
    }

    /// Open the configured database and wire the services.
    pub async fn bootstrap(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = connect(&config.database)
            .await
            .context("failed to open toner database")?;

        let ttl = chrono::Duration::hours(config.session.ttl_hours.max(1));
        tracing::info!(
            environment = %config.environment,
            session_ttl_hours = ttl.num_hours(),
            "application state ready"
        );
        Ok(Self::new(pool, ttl))
    }
}
