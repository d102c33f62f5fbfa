//! Recharge lifecycle: one batch of cartridges sent to a vendor and received back.
//!
//! ```text
//! Sent --(receive)--> Received
//! ```
//!
//! `Cancelled` can be stored and listed but no transition leads to it yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tonerledger_core::{LedgerError, LedgerResult, MovementId, RechargeId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RechargeStatus {
    #[serde(rename = "enviado")]
    Sent,
    #[serde(rename = "recibido")]
    Received,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl RechargeStatus {
    pub const ALL: [RechargeStatus; 3] = [
        RechargeStatus::Sent,
        RechargeStatus::Received,
        RechargeStatus::Cancelled,
    ];

    pub fn code(self) -> &'static str {
        match self {
            RechargeStatus::Sent => "enviado",
            RechargeStatus::Received => "recibido",
            RechargeStatus::Cancelled => "cancelado",
        }
    }

    pub fn from_code(code: &str) -> LedgerResult<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| LedgerError::validation(format!("unknown recharge status '{code}'")))
    }

    pub fn can_transition_to(self, next: RechargeStatus) -> bool {
        matches!((self, next), (RechargeStatus::Sent, RechargeStatus::Received))
    }
}

impl core::fmt::Display for RechargeStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// Tracks one batch at an external vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RechargeRecord {
    pub id: RechargeId,
    pub send_movement_id: MovementId,
    pub receive_movement_id: Option<MovementId>,
    pub status: RechargeStatus,
    pub sent_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    pub received_by: Option<UserId>,
    pub notes: Option<String>,
}

impl RechargeRecord {
    /// Fails unless the record is still waiting at the vendor.
    pub fn ensure_receivable(&self) -> LedgerResult<()> {
        match self.status {
            RechargeStatus::Sent => Ok(()),
            RechargeStatus::Received => {
                Err(LedgerError::invalid_state("recharge already received"))
            }
            RechargeStatus::Cancelled => Err(LedgerError::invalid_state("recharge was cancelled")),
        }
    }

    /// Apply the `Sent -> Received` transition.
    pub fn mark_received(
        &mut self,
        receive_movement_id: MovementId,
        received_by: UserId,
        received_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> LedgerResult<()> {
        self.ensure_receivable()?;
        debug_assert!(self.status.can_transition_to(RechargeStatus::Received));

        self.status = RechargeStatus::Received;
        self.receive_movement_id = Some(receive_movement_id);
        self.received_by = Some(received_by);
        self.received_at = Some(received_at);
        self.notes = notes;
        Ok(())
    }
}
