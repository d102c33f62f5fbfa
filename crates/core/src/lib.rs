//! `tonerledger-core`: shared building blocks for the toner ledger.
//!
//! Identifiers and the error taxonomy used by every other crate. No IO here.

pub mod error;
pub mod id;

pub use error::{LedgerError, LedgerResult};
pub use id::{
    BrandId, ModelId, MovementId, RechargeId, ResponsibleId, SectorId, UserId, VendorId,
};
