use thiserror::Error;

use tonerledger_core::LedgerError;

use crate::{Permission, Session};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not logged in")]
    Unauthenticated,

    #[error("session expired, log in again")]
    SessionExpired,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

impl From<AuthzError> for LedgerError {
    fn from(err: AuthzError) -> Self {
        LedgerError::unauthorized(err.to_string())
    }
}

/// Check that the session's role grants `required`.
///
/// - No IO
/// - No panics
pub fn authorize(session: &Session, required: &Permission) -> Result<(), AuthzError> {
    let granted = session
        .role
        .permissions()
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %session.user_id,
            role = %session.role,
            permission = %required,
            "authorization denied"
        );
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use tonerledger_core::UserId;

    use super::*;
    use crate::permissions::{CATALOG_MANAGE, TONER_MOVE, TONER_READ, TONER_RECHARGE};
    use crate::Role;

    fn session(role: Role) -> Session {
        let now = Utc::now();
        Session {
            user_id: UserId::new(9),
            username: "u".into(),
            full_name: "U".into(),
            role,
            login_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn admin_wildcard_grants_everything() {
        let s = session(Role::Admin);
        for p in [TONER_READ, TONER_MOVE, TONER_RECHARGE, CATALOG_MANAGE] {
            assert!(authorize(&s, &p).is_ok());
        }
    }

    #[test]
    fn operator_cannot_manage_catalog() {
        let s = session(Role::Operator);
        assert!(authorize(&s, &TONER_MOVE).is_ok());
        assert_eq!(
            authorize(&s, &CATALOG_MANAGE).unwrap_err(),
            AuthzError::Forbidden("catalog.manage".into())
        );
    }

    #[test]
    fn viewer_is_read_only() {
        let s = session(Role::Viewer);
        assert!(authorize(&s, &TONER_READ).is_ok());
        assert!(authorize(&s, &TONER_MOVE).is_err());
        assert!(authorize(&s, &TONER_RECHARGE).is_err());
    }

    #[test]
    fn converts_into_ledger_unauthorized() {
        let err: LedgerError = AuthzError::Unauthenticated.into();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
    }
}
