//! Desktop entry point.
//!
//! Loads configuration, opens the database and, on first run, creates the
//! administrator from `TONER_ADMIN_USER` / `TONER_ADMIN_PASSWORD`. Prints the
//! current stock as JSON.

use anyhow::Context;

use tonerledger_desktop::AppState;
use tonerledger_infra::AppConfig;
use tonerledger_observability::LogOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    tonerledger_observability::init(&LogOptions {
        json: config.logging.json,
        level: config.logging.level.clone(),
    });

    let state = AppState::bootstrap(&config).await?;

    if state.users.is_empty().await? {
        match std::env::var("TONER_ADMIN_PASSWORD") {
            Ok(password) => {
                let username =
                    std::env::var("TONER_ADMIN_USER").unwrap_or_else(|_| "admin".to_string());
                state
                    .users
                    .bootstrap_admin(&username, "Administrator", &password)
                    .await
                    .context("failed to create the administrator")?;
            }
            Err(_) => {
                tracing::warn!("no users exist; set TONER_ADMIN_PASSWORD to create the administrator");
            }
        }
    }

    let stock = state.reports.list_stock().await?;
    println!("{}", serde_json::to_string_pretty(&stock)?);
    Ok(())
}
