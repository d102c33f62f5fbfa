use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "toner.move"). The wildcard `"*"`
/// grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

/// View stock, movements, recharges and reports.
pub const TONER_READ: Permission = Permission::from_static("toner.read");
/// Record ingress and withdrawal movements.
pub const TONER_MOVE: Permission = Permission::from_static("toner.move");
/// Send to and receive from recharge.
pub const TONER_RECHARGE: Permission = Permission::from_static("toner.recharge");
/// Create, edit and delete brands, models, vendors, responsibles and sectors.
pub const CATALOG_MANAGE: Permission = Permission::from_static("catalog.manage");
/// Create users and change their status.
pub const USERS_MANAGE: Permission = Permission::from_static("users.manage");

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub const fn wildcard() -> Self {
        Self::from_static("*")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
