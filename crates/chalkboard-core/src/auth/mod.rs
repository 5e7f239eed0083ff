//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `Session`: the authenticated identity (username, role, bearer token)
//! - `CredentialStore`: durable storage for the session record (file or OS keychain)
//! - `AccountTable`: the demo accounts a login is checked against
//! - `SessionManager`: the single source of truth for who is logged in
//!
//! The session record is persisted immediately on login, read once at
//! startup, and removed on logout or when the API rejects the token.

pub mod accounts;
pub mod credentials;
pub mod manager;
pub mod session;

pub use accounts::{decode_claims, Account, AccountTable, TokenClaims};
pub use credentials::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
pub use manager::{LoginError, SessionManager};
pub use session::{AuthState, RecordError, Role, Session, SessionRecord};
