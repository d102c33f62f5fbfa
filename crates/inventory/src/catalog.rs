//! Catalog records referenced by the ledger: brands, models, vendors,
//! responsibles and sectors.

use serde::{Deserialize, Serialize};

use tonerledger_core::{
    BrandId, LedgerError, LedgerResult, ModelId, ResponsibleId, SectorId, VendorId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
}

/// A purchasable toner cartridge type. Unique per (brand, name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonerModel {
    pub id: ModelId,
    pub brand_id: BrandId,
    pub name: String,
}

/// External company that recharges cartridges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RechargeVendor {
    pub id: VendorId,
    pub name: String,
    pub contact: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responsible {
    pub id: ResponsibleId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub name: String,
}

/// Vendor fields as entered, before persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVendor {
    pub name: String,
    pub contact: String,
    pub phone: String,
}

impl NewVendor {
    /// Trimmed copy, with the name required.
    pub fn normalized(&self) -> LedgerResult<NewVendor> {
        Ok(NewVendor {
            name: normalize_name("vendor", &self.name)?,
            contact: self.contact.trim().to_string(),
            phone: self.phone.trim().to_string(),
        })
    }
}

/// Trim a display name and reject it when empty.
pub fn normalize_name(label: &str, raw: &str) -> LedgerResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(format!("{label} name cannot be empty")));
    }
    Ok(trimmed.to_string())
}
