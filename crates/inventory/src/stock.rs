use serde::{Deserialize, Serialize};

use tonerledger_core::{LedgerError, LedgerResult, ModelId};

use crate::movement::{Movement, MovementKind};

/// On-hand quantity for one toner model. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub model_id: ModelId,
    pub quantity: i64,
}

impl StockLevel {
    /// Level of a model that was never stocked.
    pub fn empty(model_id: ModelId) -> Self {
        Self {
            model_id,
            quantity: 0,
        }
    }

    /// Whether `quantity` units can leave stock.
    pub fn ensure_available(&self, quantity: i64) -> LedgerResult<()> {
        if self.quantity < quantity {
            return Err(LedgerError::insufficient_stock(quantity, self.quantity));
        }
        Ok(())
    }

    /// Level after applying one movement; the receiver is left untouched.
    pub fn apply(&self, kind: MovementKind, quantity: i64) -> LedgerResult<StockLevel> {
        if quantity <= 0 {
            return Err(LedgerError::validation("quantity must be greater than zero"));
        }
        if kind.is_outbound() {
            self.ensure_available(quantity)?;
        }
        let quantity = self
            .quantity
            .checked_add(kind.signed_delta(quantity))
            .ok_or_else(|| LedgerError::validation("quantity out of range"))?;
        Ok(StockLevel {
            model_id: self.model_id,
            quantity,
        })
    }
}

/// Net quantity of a set of movements: what the stock level must equal.
pub fn net_quantity<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> i64 {
    movements.into_iter().map(Movement::signed_delta).sum()
}
