//! Infrastructure layer: SQLite persistence, configuration and the ledger
//! services built on them.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod reports;
pub mod schema;
pub mod users;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use catalog::CatalogRepository;
pub use config::AppConfig;
pub use db::{connect, connect_in_memory};
pub use ledger::TonerLedger;
pub use reports::{
    MovementFilter, MovementReportRow, ModelMovementTotals, RechargeReportRow, ReportQueries,
    StockConsistency, StockReportRow, VendorRechargeTotals,
};
pub use users::{User, UserRepository};
