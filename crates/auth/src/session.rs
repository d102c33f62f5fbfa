use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tonerledger_core::UserId;

use crate::authorize::AuthzError;
use crate::Role;

/// Opaque session token handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An authenticated user's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub login_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// In-memory session table.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: HashMap<SessionToken, Session>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: HashMap::new(),
        }
    }

    /// Open a session and return its token.
    pub fn create(
        &mut self,
        user_id: UserId,
        username: String,
        full_name: String,
        role: Role,
    ) -> SessionToken {
        let token = SessionToken::generate();
        let now = Utc::now();
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                username,
                full_name,
                role,
                login_at: now,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// Look up a live session.
    pub fn validate(&self, token: &SessionToken) -> Result<&Session, AuthzError> {
        match self.sessions.get(token) {
            None => Err(AuthzError::Unauthenticated),
            Some(s) if s.is_expired_at(Utc::now()) => Err(AuthzError::SessionExpired),
            Some(s) => Ok(s),
        }
    }

    /// Logout.
    pub fn destroy(&mut self, token: &SessionToken) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop expired sessions; returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(store: &mut SessionStore) -> SessionToken {
        store.create(UserId::new(1), "ana".into(), "Ana Paz".into(), Role::Operator)
    }

    #[test]
    fn created_session_validates() {
        let mut store = SessionStore::new(Duration::hours(8));
        let token = open(&mut store);
        let session = store.validate(&token).unwrap();
        assert_eq!(session.user_id, UserId::new(1));
        assert_eq!(session.role, Role::Operator);
    }

    #[test]
    fn unknown_token_is_unauthenticated() {
        let store = SessionStore::new(Duration::hours(8));
        let err = store.validate(&SessionToken::from("nope".to_string())).unwrap_err();
        assert_eq!(err, AuthzError::Unauthenticated);
    }

    #[test]
    fn expired_session_is_rejected_and_purged() {
        let mut store = SessionStore::new(Duration::seconds(-1));
        let token = open(&mut store);
        assert_eq!(store.validate(&token).unwrap_err(), AuthzError::SessionExpired);
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn destroy_logs_out() {
        let mut store = SessionStore::new(Duration::hours(8));
        let token = open(&mut store);
        assert!(store.destroy(&token));
        assert!(store.validate(&token).is_err());
        assert!(!store.destroy(&token));
    }
}
