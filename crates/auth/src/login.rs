//! Login as a background task with a single join point.
//!
//! Credential checks (password hashing, store lookup) run on a spawned task so
//! the caller stays responsive. The attempt's [`LoginAttempt::join`] is the
//! only place a session is created: a cancelled attempt, or one superseded by a
//! newer `begin`, never touches the session store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;

use tonerledger_core::UserId;

use crate::{Role, SessionStore, SessionToken};

/// Identity confirmed by a [`CredentialVerifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("login cancelled")]
    Cancelled,

    #[error("login superseded by a newer attempt")]
    Superseded,

    #[error("credential check failed: {0}")]
    Backend(String),
}

/// Checks a username/password pair against some user source.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(None)` when the credentials do not match an active user.
    async fn verify(&self, username: &str, password: &str)
        -> Result<Option<VerifiedUser>, LoginError>;
}

/// Starts login attempts against a shared session store.
#[derive(Clone)]
pub struct LoginFlow {
    verifier: Arc<dyn CredentialVerifier>,
    sessions: Arc<Mutex<SessionStore>>,
    generation: Arc<AtomicU64>,
}

impl LoginFlow {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, sessions: Arc<Mutex<SessionStore>>) -> Self {
        Self {
            verifier,
            sessions,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawn a credential check. Any earlier attempt still in flight becomes
    /// superseded.
    pub fn begin(&self, username: impl Into<String>, password: impl Into<String>) -> LoginAttempt {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let username = username.into();
        let password = password.into();
        let verifier = self.verifier.clone();

        tracing::debug!(%username, generation, "login attempt started");

        let handle = tokio::spawn(async move { verifier.verify(&username, &password).await });

        LoginAttempt {
            handle,
            generation,
            current: self.generation.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

/// One in-flight login.
pub struct LoginAttempt {
    handle: JoinHandle<Result<Option<VerifiedUser>, LoginError>>,
    generation: u64,
    current: Arc<AtomicU64>,
    sessions: Arc<Mutex<SessionStore>>,
}

impl LoginAttempt {
    /// Abort the credential check. The attempt can no longer produce a session.
    pub fn cancel(self) {
        self.handle.abort();
        tracing::debug!(generation = self.generation, "login attempt cancelled");
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the check and, on success, open the session.
    pub async fn join(self) -> Result<(SessionToken, VerifiedUser), LoginError> {
        let outcome = match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => return Err(LoginError::Cancelled),
            Err(e) => return Err(LoginError::Backend(e.to_string())),
        };

        let user = match outcome? {
            Some(user) => user,
            None => {
                tracing::info!(generation = self.generation, "login rejected");
                return Err(LoginError::InvalidCredentials);
            }
        };

        if self.current.load(Ordering::SeqCst) != self.generation {
            return Err(LoginError::Superseded);
        }

        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| LoginError::Backend(e.to_string()))?;
        let token = sessions.create(
            user.user_id,
            user.username.clone(),
            user.full_name.clone(),
            user.role,
        );
        tracing::info!(user_id = %user.user_id, username = %user.username, "login succeeded");
        Ok((token, user))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use super::*;

    struct FixedVerifier {
        delay: StdDuration,
    }

    #[async_trait]
    impl CredentialVerifier for FixedVerifier {
        async fn verify(
            &self,
            username: &str,
            password: &str,
        ) -> Result<Option<VerifiedUser>, LoginError> {
            tokio::time::sleep(self.delay).await;
            if password != "secret-pass" {
                return Ok(None);
            }
            Ok(Some(VerifiedUser {
                user_id: UserId::new(1),
                username: username.to_string(),
                full_name: "Test User".into(),
                role: Role::Operator,
            }))
        }
    }

    fn flow(delay_ms: u64) -> (LoginFlow, Arc<Mutex<SessionStore>>) {
        let sessions = Arc::new(Mutex::new(SessionStore::new(Duration::hours(8))));
        let verifier = Arc::new(FixedVerifier {
            delay: StdDuration::from_millis(delay_ms),
        });
        (LoginFlow::new(verifier, sessions.clone()), sessions)
    }

    #[tokio::test]
    async fn successful_login_opens_a_session() {
        let (flow, sessions) = flow(0);
        let (token, user) = flow.begin("ana", "secret-pass").join().await.unwrap();
        assert_eq!(user.role, Role::Operator);
        let store = sessions.lock().unwrap();
        assert_eq!(store.validate(&token).unwrap().username, "ana");
    }

    #[tokio::test]
    async fn wrong_password_opens_nothing() {
        let (flow, sessions) = flow(0);
        let err = flow.begin("ana", "wrong").join().await.unwrap_err();
        assert_eq!(err, LoginError::InvalidCredentials);
        assert!(sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn superseded_attempt_does_not_create_a_session() {
        let (flow, sessions) = flow(20);
        let first = flow.begin("ana", "secret-pass");
        let second = flow.begin("ana", "secret-pass");

        assert_eq!(first.join().await.unwrap_err(), LoginError::Superseded);
        assert!(sessions.lock().unwrap().is_empty());

        second.join().await.unwrap();
        assert_eq!(sessions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_attempt_leaves_store_untouched() {
        let (flow, sessions) = flow(200);
        flow.begin("ana", "secret-pass").cancel();
        tokio::time::sleep(StdDuration::from_millis(250)).await;
        assert!(sessions.lock().unwrap().is_empty());
    }
}
