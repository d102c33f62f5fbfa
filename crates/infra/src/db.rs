//! SQLite pool construction and timestamp encoding.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};

use tonerledger_core::{LedgerError, LedgerResult};

use crate::config::DatabaseConfig;
use crate::schema::run_migrations;

/// Open (creating if needed) the database described by `config` and migrate it.
///
/// - WAL journal
/// - foreign keys enforced on every connection
/// - busy timeout so a second writer waits instead of failing
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    if config.path == ":memory:" {
        return connect_in_memory()
            .await
            .context("failed to open in-memory database");
    }

    if let Some(parent) = Path::new(&config.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {parent:?}"))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))
        .with_context(|| format!("invalid database path {:?}", config.path))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open SQLite database at {:?}", config.path))?;

    run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    tracing::info!(
        path = %config.path,
        max_connections = config.max_connections,
        "database ready"
    );
    Ok(pool)
}

/// Isolated in-memory database, migrated. Used by tests and `:memory:` configs.
///
/// The pool holds exactly one connection that is never recycled, since an
/// in-memory SQLite database lives only as long as its connection.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Liveness probe.
pub async fn health_check(pool: &SqlitePool) -> LedgerResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| crate::error::map_sqlx_error("health_check", e))?;
    Ok(())
}

/// Start a unit of work. Dropping the transaction without [`commit`] rolls it back.
pub async fn begin(pool: &SqlitePool) -> LedgerResult<Transaction<'static, Sqlite>> {
    pool.begin()
        .await
        .map_err(|e| crate::error::map_sqlx_error("begin_transaction", e))
}

pub async fn commit(tx: Transaction<'static, Sqlite>) -> LedgerResult<()> {
    tx.commit()
        .await
        .map_err(|e| crate::error::map_sqlx_error("commit_transaction", e))
}

/// Encode a timestamp for storage.
///
/// Fixed precision and a `Z` suffix keep lexical order equal to time order,
/// which the date-range queries rely on.
pub fn fmt_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_ts() -> String {
    fmt_ts(Utc::now())
}

pub fn parse_ts(raw: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::store(format!("invalid stored timestamp '{raw}': {e}")))
}
