use serde::{Deserialize, Serialize};

use tonerledger_core::{LedgerError, LedgerResult};

use crate::permissions::{self, Permission};

/// Role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Everything, including catalog and user management.
    Admin,
    /// Moves stock and handles recharges.
    Operator,
    /// Read-only access to stock and reports.
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> LedgerResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            "viewer" => Ok(Role::Viewer),
            other => Err(LedgerError::validation(format!("unknown role '{other}'"))),
        }
    }

    /// Permissions granted by this role.
    pub fn permissions(self) -> Vec<Permission> {
        match self {
            Role::Admin => vec![Permission::wildcard()],
            Role::Operator => vec![
                permissions::TONER_READ,
                permissions::TONER_MOVE,
                permissions::TONER_RECHARGE,
            ],
            Role::Viewer => vec![permissions::TONER_READ],
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse(" Admin ").unwrap(), Role::Admin);
        assert_eq!(Role::parse("OPERATOR").unwrap(), Role::Operator);
        assert!(Role::parse("root").is_err());
    }
}
