//! `tonerledger-desktop`
//!
//! **Responsibility:** the thin shell around the toner ledger.
//!
//! This crate provides:
//! - Application state wiring (pool, services, sessions, login)
//! - Session-checked commands for every ledger, catalog and report operation
//! - The view registry
//!
//! Business rules live in `tonerledger-inventory` and `tonerledger-infra`.

pub mod commands;
pub mod state;
pub mod views;

pub use commands::Commands;
pub use state::AppState;
pub use views::{View, ViewId};
