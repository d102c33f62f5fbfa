use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tonerledger_core::{
    LedgerError, LedgerResult, ModelId, MovementId, ResponsibleId, SectorId, UserId, VendorId,
};

/// Kind of a ledger movement. Determines the sign applied to stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    #[serde(rename = "ingreso")]
    Ingress,
    #[serde(rename = "retiro")]
    Withdrawal,
    #[serde(rename = "envio_recarga")]
    SendToRecharge,
    #[serde(rename = "recepcion_recarga")]
    ReceiveFromRecharge,
}

impl MovementKind {
    pub const ALL: [MovementKind; 4] = [
        MovementKind::Ingress,
        MovementKind::Withdrawal,
        MovementKind::SendToRecharge,
        MovementKind::ReceiveFromRecharge,
    ];

    /// Storage code of the kind.
    pub fn code(self) -> &'static str {
        match self {
            MovementKind::Ingress => "ingreso",
            MovementKind::Withdrawal => "retiro",
            MovementKind::SendToRecharge => "envio_recarga",
            MovementKind::ReceiveFromRecharge => "recepcion_recarga",
        }
    }

    pub fn from_code(code: &str) -> LedgerResult<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.code() == code)
            .ok_or_else(|| LedgerError::validation(format!("unknown movement kind '{code}'")))
    }

    /// +1 for kinds that add stock, -1 for kinds that remove it.
    pub fn sign(self) -> i64 {
        match self {
            MovementKind::Ingress | MovementKind::ReceiveFromRecharge => 1,
            MovementKind::Withdrawal | MovementKind::SendToRecharge => -1,
        }
    }

    pub fn signed_delta(self, quantity: i64) -> i64 {
        self.sign() * quantity
    }

    /// Outbound kinds require enough stock on hand.
    pub fn is_outbound(self) -> bool {
        self.sign() < 0
    }

    pub fn is_recharge(self) -> bool {
        matches!(
            self,
            MovementKind::SendToRecharge | MovementKind::ReceiveFromRecharge
        )
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// A movement that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub model_id: ModelId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub responsible_id: Option<ResponsibleId>,
    pub sector_id: Option<SectorId>,
    pub vendor_id: Option<VendorId>,
    pub notes: String,
}

impl NewMovement {
    pub fn new(model_id: ModelId, kind: MovementKind, quantity: i64) -> Self {
        Self {
            model_id,
            kind,
            quantity,
            responsible_id: None,
            sector_id: None,
            vendor_id: None,
            notes: String::new(),
        }
    }

    pub fn with_responsible(mut self, responsible_id: ResponsibleId) -> Self {
        self.responsible_id = Some(responsible_id);
        self
    }

    pub fn with_sector(mut self, sector_id: SectorId) -> Self {
        self.sector_id = Some(sector_id);
        self
    }

    pub fn with_vendor(mut self, vendor_id: VendorId) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Signed change this movement applies to stock.
    pub fn signed_delta(&self) -> i64 {
        self.kind.signed_delta(self.quantity)
    }

    /// Validate everything that can be checked without the store.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.quantity <= 0 {
            return Err(LedgerError::validation("quantity must be greater than zero"));
        }
        match (self.kind.is_recharge(), self.vendor_id) {
            (true, None) => Err(LedgerError::validation(
                "a recharge vendor must be selected for recharge movements",
            )),
            (false, Some(_)) => Err(LedgerError::validation(
                "a recharge vendor only applies to recharge movements",
            )),
            _ => Ok(()),
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub model_id: ModelId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub responsible_id: Option<ResponsibleId>,
    pub sector_id: Option<SectorId>,
    pub vendor_id: Option<VendorId>,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
    pub user_id: UserId,
}

impl Movement {
    pub fn signed_delta(&self) -> i64 {
        self.kind.signed_delta(self.quantity)
    }
}
