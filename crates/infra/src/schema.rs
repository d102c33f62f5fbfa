//! Schema migrations.
//!
//! Each migration runs once, inside its own transaction, and is recorded in
//! `schema_migrations`. Append new entries; never edit applied ones.

use sqlx::SqlitePool;

use crate::db::now_ts;

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "users_and_audit",
        statements: &[
            "CREATE TABLE IF NOT EXISTS usuarios (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT    NOT NULL UNIQUE,
                nombre_completo TEXT    NOT NULL,
                rol             TEXT    NOT NULL CHECK (rol IN ('admin', 'operator', 'viewer')),
                password_hash   TEXT    NOT NULL,
                activo          INTEGER NOT NULL DEFAULT 1,
                creado_en       TEXT    NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS auditoria (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                usuario_id  INTEGER REFERENCES usuarios(id) ON DELETE SET NULL,
                accion      TEXT    NOT NULL,
                tabla       TEXT    NOT NULL,
                registro_id INTEGER,
                detalle     TEXT    NOT NULL DEFAULT '',
                fecha       TEXT    NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_auditoria_fecha ON auditoria(fecha)",
        ],
    },
    Migration {
        version: 2,
        name: "toner_catalog",
        statements: &[
            "CREATE TABLE IF NOT EXISTS marcas (
                id     INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre TEXT    NOT NULL UNIQUE
            )",
            "CREATE TABLE IF NOT EXISTS modelos_toner (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                id_marca INTEGER NOT NULL REFERENCES marcas(id) ON DELETE CASCADE,
                nombre   TEXT    NOT NULL,
                UNIQUE (id_marca, nombre)
            )",
            "CREATE TABLE IF NOT EXISTS empresas_recarga (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre   TEXT    NOT NULL UNIQUE,
                contacto TEXT    NOT NULL DEFAULT '',
                telefono TEXT    NOT NULL DEFAULT ''
            )",
            "CREATE TABLE IF NOT EXISTS responsables (
                id     INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre TEXT    NOT NULL UNIQUE
            )",
            "CREATE TABLE IF NOT EXISTS sectores (
                id     INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre TEXT    NOT NULL UNIQUE
            )",
        ],
    },
    Migration {
        version: 3,
        name: "toner_ledger",
        statements: &[
            "CREATE TABLE IF NOT EXISTS stock_toner (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                id_modelo INTEGER NOT NULL UNIQUE REFERENCES modelos_toner(id) ON DELETE CASCADE,
                cantidad  INTEGER NOT NULL DEFAULT 0 CHECK (cantidad >= 0)
            )",
            "CREATE TABLE IF NOT EXISTS movimientos_toner (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                id_modelo          INTEGER NOT NULL REFERENCES modelos_toner(id) ON DELETE RESTRICT,
                tipo               TEXT    NOT NULL
                    CHECK (tipo IN ('ingreso', 'retiro', 'envio_recarga', 'recepcion_recarga')),
                cantidad           INTEGER NOT NULL CHECK (cantidad > 0),
                id_responsable     INTEGER REFERENCES responsables(id) ON DELETE RESTRICT,
                id_sector          INTEGER REFERENCES sectores(id) ON DELETE RESTRICT,
                id_empresa_recarga INTEGER REFERENCES empresas_recarga(id) ON DELETE RESTRICT,
                observaciones      TEXT    NOT NULL DEFAULT '',
                fecha              TEXT    NOT NULL,
                usuario_id         INTEGER NOT NULL REFERENCES usuarios(id) ON DELETE RESTRICT
            )",
            "CREATE INDEX IF NOT EXISTS idx_movimientos_modelo ON movimientos_toner(id_modelo)",
            "CREATE INDEX IF NOT EXISTS idx_movimientos_fecha ON movimientos_toner(fecha)",
            "CREATE TABLE IF NOT EXISTS recargas_toner (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                id_movimiento_envio     INTEGER NOT NULL UNIQUE
                    REFERENCES movimientos_toner(id) ON DELETE RESTRICT,
                id_movimiento_recepcion INTEGER UNIQUE
                    REFERENCES movimientos_toner(id) ON DELETE RESTRICT,
                id_empresa_recarga      INTEGER NOT NULL
                    REFERENCES empresas_recarga(id) ON DELETE RESTRICT,
                estado                  TEXT    NOT NULL DEFAULT 'enviado'
                    CHECK (estado IN ('enviado', 'recibido', 'cancelado')),
                fecha_envio             TEXT    NOT NULL,
                fecha_recepcion         TEXT,
                usuario_recepcion       INTEGER REFERENCES usuarios(id) ON DELETE RESTRICT,
                observaciones           TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_recargas_estado ON recargas_toner(estado)",
        ],
    },
];

/// Apply every migration not yet recorded.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            name       TEXT    NOT NULL,
            applied_at TEXT    NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    for migration in MIGRATIONS {
        let applied: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM schema_migrations WHERE version = ?1")
                .bind(migration.version)
                .fetch_optional(pool)
                .await?;
        if applied.is_some() {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(now_ts())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(version = migration.version, name = migration.name, "migration applied");
    }

    Ok(())
}
