//! User accounts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};

use tonerledger_auth::password::{hash_password, validate_password_strength, verify_password};
use tonerledger_auth::{CredentialVerifier, LoginError, Role, VerifiedUser};
use tonerledger_core::{LedgerError, LedgerResult, UserId};
use tonerledger_inventory::normalize_name;

use crate::audit::{self, AuditAction};
use crate::db::{begin, commit, now_ts, parse_ts};
use crate::error::{map_sqlx_error, map_unique};

/// A user account. The password hash never leaves this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Whether no account exists yet (first run).
    pub async fn is_empty(&self) -> LedgerResult<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usuarios")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))?;
        Ok(count == 0)
    }

    /// Create the first administrator. Fails once any user exists.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        full_name: &str,
        password: &str,
    ) -> LedgerResult<UserId> {
        let mut tx = begin(&self.pool).await?;
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usuarios")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))?;
        if count > 0 {
            return Err(LedgerError::invalid_state("an administrator already exists"));
        }

        let id = insert_user(&mut tx, username, full_name, Role::Admin, password).await?;
        commit(tx).await?;
        tracing::info!(user_id = %id, "administrator bootstrapped");
        Ok(id)
    }

    /// Create a user on behalf of `actor`.
    pub async fn create_user(
        &self,
        actor: UserId,
        username: &str,
        full_name: &str,
        role: Role,
        password: &str,
    ) -> LedgerResult<UserId> {
        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;

        let id = insert_user(&mut tx, username, full_name, role, password).await?;
        audit::record(
            &mut tx,
            actor,
            AuditAction::Create,
            "usuarios",
            Some(id.get()),
            &format!("user '{}' with role {role}", username.trim()),
        )
        .await?;

        commit(tx).await?;
        Ok(id)
    }

    pub async fn set_active(&self, actor: UserId, user_id: UserId, active: bool) -> LedgerResult<()> {
        if actor == user_id && !active {
            return Err(LedgerError::validation("a user cannot deactivate themselves"));
        }

        let mut tx = begin(&self.pool).await?;
        ensure_active(&mut tx, actor).await?;

        let res = sqlx::query("UPDATE usuarios SET activo = ?1 WHERE id = ?2")
            .bind(active)
            .bind(user_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_user_active", e))?;
        if res.rows_affected() == 0 {
            return Err(LedgerError::not_found(format!("user {user_id}")));
        }

        audit::record(
            &mut tx,
            actor,
            AuditAction::Update,
            "usuarios",
            Some(user_id.get()),
            if active { "activated" } else { "deactivated" },
        )
        .await?;

        commit(tx).await?;
        Ok(())
    }

    pub async fn find_by_username(&self, username: &str) -> LedgerResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, nombre_completo, rol, activo, creado_en
             FROM usuarios WHERE username = ?1",
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user", e))?;

        row.map(row_to_user).transpose()
    }

    pub async fn list(&self) -> LedgerResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, username, nombre_completo, rol, activo, creado_en
             FROM usuarios ORDER BY username ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;

        rows.into_iter().map(row_to_user).collect()
    }
}

#[async_trait]
impl CredentialVerifier for UserRepository {
    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<VerifiedUser>, LoginError> {
        let row = sqlx::query(
            "SELECT id, username, nombre_completo, rol, password_hash
             FROM usuarios WHERE username = ?1 AND activo = 1",
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LoginError::Backend(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let decode = |e: sqlx::Error| LoginError::Backend(e.to_string());
        let hash: String = row.try_get("password_hash").map_err(decode)?;
        let candidate = password.to_string();

        // argon2 is CPU-bound
        let matches = tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
            .await
            .map_err(|e| LoginError::Backend(e.to_string()))?
            .map_err(|e| LoginError::Backend(e.to_string()))?;
        if !matches {
            return Ok(None);
        }

        let role: String = row.try_get("rol").map_err(decode)?;
        Ok(Some(VerifiedUser {
            user_id: UserId::new(row.try_get("id").map_err(decode)?),
            username: row.try_get("username").map_err(decode)?,
            full_name: row.try_get("nombre_completo").map_err(decode)?,
            role: Role::parse(&role).map_err(|e| LoginError::Backend(e.to_string()))?,
        }))
    }
}

/// Reject writes attributed to an unknown or deactivated user.
pub(crate) async fn ensure_active(conn: &mut SqliteConnection, user_id: UserId) -> LedgerResult<()> {
    let active: Option<(bool,)> = sqlx::query_as("SELECT activo FROM usuarios WHERE id = ?1")
        .bind(user_id.get())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("check_user", e))?;

    match active {
        Some((true,)) => Ok(()),
        Some((false,)) => Err(LedgerError::unauthorized(format!("user {user_id} is inactive"))),
        None => Err(LedgerError::unauthorized(format!("user {user_id} does not exist"))),
    }
}

async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    full_name: &str,
    role: Role,
    password: &str,
) -> LedgerResult<UserId> {
    let username = normalize_name("user", username)?;
    let full_name = full_name.trim();
    validate_password_strength(password)?;

    let pw = password.to_string();
    let hash = tokio::task::spawn_blocking(move || hash_password(&pw))
        .await
        .map_err(|e| LedgerError::store(e.to_string()))?
        .map_err(|e| LedgerError::store(format!("password hashing failed: {e}")))?;

    let res = sqlx::query(
        "INSERT INTO usuarios (username, nombre_completo, rol, password_hash, activo, creado_en)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
    )
    .bind(&username)
    .bind(if full_name.is_empty() { username.as_str() } else { full_name })
    .bind(role.as_str())
    .bind(&hash)
    .bind(now_ts())
    .execute(conn)
    .await
    .map_err(|e| map_unique("create_user", &format!("user '{username}'"), e))?;

    Ok(UserId::new(res.last_insert_rowid()))
}

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> LedgerResult<User> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_user", e);
    let role: String = row.try_get("rol").map_err(get)?;
    let created_at: String = row.try_get("creado_en").map_err(get)?;
    Ok(User {
        id: UserId::new(row.try_get("id").map_err(get)?),
        username: row.try_get("username").map_err(get)?,
        full_name: row.try_get("nombre_completo").map_err(get)?,
        role: Role::parse(&role)?,
        active: row.try_get("activo").map_err(get)?,
        created_at: parse_ts(&created_at)?,
    })
}
