//! Toner inventory domain.
//!
//! Business rules for the stock ledger, implemented as deterministic domain
//! logic (no IO, no SQL, no UI). Persistence lives in `tonerledger-infra`.

pub mod catalog;
pub mod movement;
pub mod recharge;
pub mod stock;

pub use catalog::{normalize_name, Brand, NewVendor, RechargeVendor, Responsible, Sector, TonerModel};
pub use movement::{Movement, MovementKind, NewMovement};
pub use recharge::{RechargeRecord, RechargeStatus};
pub use stock::{net_quantity, StockLevel};
