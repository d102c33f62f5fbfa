//! `tonerledger-auth`: who is acting, and what they may do.
//!
//! Decoupled from storage: credential lookup is injected through
//! [`CredentialVerifier`], implemented by `tonerledger-infra`.

pub mod authorize;
pub mod login;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod session;

pub use authorize::{authorize, AuthzError};
pub use login::{CredentialVerifier, LoginAttempt, LoginError, LoginFlow, VerifiedUser};
pub use permissions::Permission;
pub use roles::Role;
pub use session::{Session, SessionStore, SessionToken};
