//! The session state machine.
//!
//! `SessionManager` is constructed once at startup and shared by `Arc`
//! with the request pipeline and the UI. It is the only writer of the
//! credential store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::accounts::{decode_claims, AccountTable};
use super::credentials::CredentialStore;
use super::session::{AuthState, Role, Session};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Deliberately the same for unknown users and wrong passwords
    #[error("Invalid credentials")]
    InvalidCredentials,
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    accounts: AccountTable,
    session: RwLock<Option<Session>>,
    state: watch::Sender<AuthState>,
    restored: AtomicBool,
}

impl SessionManager {
    /// Create a manager over the demo accounts. Starts in `Loading`.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_accounts(store, AccountTable::demo())
    }

    pub fn with_accounts(store: Arc<dyn CredentialStore>, accounts: AccountTable) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            store,
            accounts,
            session: RwLock::new(None),
            state,
            restored: AtomicBool::new(false),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.session.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Recompute the published state from the in-memory session
    fn publish(&self) {
        let next = if !self.restored.load(Ordering::SeqCst) {
            AuthState::Loading
        } else {
            match self.read().as_ref() {
                Some(session) => AuthState::Authenticated(session.role),
                None => AuthState::Unauthenticated,
            }
        };
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(?prev, ?next, "Auth state changed");
        }
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Read the persisted session. Runs once; later calls are no-ops.
    ///
    /// Unreadable, partial or inconsistent records are cleared from storage
    /// and leave the session absent. Never fails.
    pub fn restore(&self) -> AuthState {
        if self.restored.load(Ordering::SeqCst) {
            debug!("Session already restored, skipping");
            return self.state();
        }

        let restored = match self.store.load() {
            Ok(Some(raw)) => match Session::from_stored(&raw, Utc::now()) {
                Ok(session) => {
                    info!(username = %session.username, role = %session.role, "Restored session");
                    Some(session)
                }
                Err(e) => {
                    warn!(error = %e, "Discarding stored session");
                    self.clear_store();
                    None
                }
            },
            Ok(None) => {
                debug!("No stored session");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                self.clear_store();
                None
            }
        };

        {
            let mut current = self.write();
            // A login that raced ahead of restore wins
            if current.is_none() {
                *current = restored;
            }
        }
        self.restored.store(true, Ordering::SeqCst);
        self.publish();
        self.state()
    }

    /// Check credentials against the account table and start a session.
    pub fn login(&self, username: &str, password: &str) -> Result<Session, LoginError> {
        let username = username.trim().to_lowercase();
        let password = password.trim();

        let account = match self.accounts.verify(&username, password) {
            Some(account) => account,
            None => {
                info!("Login rejected");
                return Err(LoginError::InvalidCredentials);
            }
        };

        let display_name = decode_claims(&account.token)
            .and_then(|c| c.name)
            .unwrap_or_else(|| account.role.to_string());

        let session = Session {
            username: account.username.clone(),
            display_name,
            role: account.role,
            token: account.token.clone(),
            issued_at: Utc::now(),
        };

        match serde_json::to_string(&session.to_record()) {
            Ok(record) => {
                if let Err(e) = self.store.save(&record) {
                    warn!(error = %e, "Failed to save session");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize session"),
        }

        *self.write() = Some(session.clone());
        self.publish();
        info!(username = %session.username, role = %session.role, "Login successful");
        Ok(session)
    }

    /// End the session. Idempotent.
    pub fn logout(&self) {
        let had_session = self.write().take().is_some();
        self.clear_store();
        self.publish();
        if had_session {
            info!("Logged out");
        }
    }

    /// End the session because the API rejected its token.
    pub fn invalidate(&self) {
        let had_session = self.write().take().is_some();
        self.clear_store();
        self.publish();
        if had_session {
            warn!("Session invalidated by authentication failure");
        }
    }

    /// End the session only if `token` is still the one in use.
    ///
    /// Returns false and leaves storage alone while the stored session has
    /// not been read yet, or when another session replaced the one the
    /// rejected request carried. `None` matches the anonymous state.
    pub fn invalidate_token(&self, token: Option<&str>) -> bool {
        if !self.restored.load(Ordering::SeqCst) {
            debug!("Rejection before restore, keeping stored session");
            return false;
        }

        let had_session = {
            let mut current = self.write();
            if current.as_ref().map(|s| s.token.as_str()) != token {
                debug!("Rejection for a superseded token, ignoring");
                return false;
            }
            current.take().is_some()
        };

        self.clear_store();
        self.publish();
        if had_session {
            warn!("Session invalidated by authentication failure");
        }
        true
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Watch auth state transitions
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state() == AuthState::Loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    pub fn is_professor(&self) -> bool {
        self.role() == Some(Role::Professor)
    }

    pub fn is_student(&self) -> bool {
        self.role() == Some(Role::Student)
    }

    pub fn role(&self) -> Option<Role> {
        self.read().as_ref().map(|s| s.role)
    }

    /// Bearer token of the active session
    pub fn current_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    pub fn current_session(&self) -> Option<Session> {
        self.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::accounts::{PROFESSOR_TOKEN, STUDENT_TOKEN};
    use crate::auth::credentials::MemoryCredentialStore;

    fn manager_with(store: &Arc<MemoryCredentialStore>) -> SessionManager {
        SessionManager::new(store.clone())
    }

    #[test]
    fn test_starts_loading_until_restore() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        assert!(manager.is_loading());
        assert_eq!(manager.restore(), AuthState::Unauthenticated);
        assert!(!manager.is_loading());
    }

    #[test]
    fn test_restore_valid_record() {
        let record = format!(
            r#"{{"username":"professor","role":"professor","token":"{}"}}"#,
            PROFESSOR_TOKEN
        );
        let store = Arc::new(MemoryCredentialStore::with_record(record));
        let manager = manager_with(&store);

        assert_eq!(manager.restore(), AuthState::Authenticated(Role::Professor));
        assert!(manager.is_professor());
        assert_eq!(manager.current_token().as_deref(), Some(PROFESSOR_TOKEN));
        assert!(store.snapshot().is_some());
    }

    #[test]
    fn test_restore_discards_bad_records_and_clears_storage() {
        let bad = [
            "{",
            r#"{"username":"aluno","token":"t"}"#,
            r#"{"username":"aluno","role":"aluno"}"#,
            r#"{"role":"aluno","token":"t"}"#,
        ];
        for raw in bad {
            let store = Arc::new(MemoryCredentialStore::with_record(raw));
            let manager = manager_with(&store);
            assert_eq!(manager.restore(), AuthState::Unauthenticated, "record: {}", raw);
            assert!(manager.current_session().is_none());
            assert!(store.snapshot().is_none(), "storage kept: {}", raw);
        }
    }

    #[test]
    fn test_restore_runs_once() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        manager.restore();

        // A record appearing later is not picked up by a second restore
        let record = format!(
            r#"{{"username":"aluno","role":"aluno","token":"{}"}}"#,
            STUDENT_TOKEN
        );
        store.save(&record).unwrap();
        assert_eq!(manager.restore(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_login_professor_and_student() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        manager.restore();

        let session = manager.login("professor", "1234").unwrap();
        assert_eq!(session.role, Role::Professor);
        assert_eq!(session.display_name, "Matheus");
        assert_eq!(manager.state(), AuthState::Authenticated(Role::Professor));
        assert!(manager.is_professor());
        assert!(!manager.is_student());

        let stored = store.snapshot().unwrap();
        let back = Session::from_stored(&stored, Utc::now()).unwrap();
        assert_eq!(back.token, PROFESSOR_TOKEN);

        let session = manager.login("aluno", "1234").unwrap();
        assert_eq!(session.role, Role::Student);
        assert_eq!(manager.state(), AuthState::Authenticated(Role::Student));
        assert!(manager.is_student());
    }

    #[test]
    fn test_login_normalizes_input() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        manager.restore();

        let session = manager.login("  PROFESSOR ", " 1234 ").unwrap();
        assert_eq!(session.username, "professor");
    }

    #[test]
    fn test_login_failure_is_generic_and_side_effect_free() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        manager.restore();

        let wrong_password = manager.login("professor", "wrong").unwrap_err();
        let unknown_user = manager.login("unknown", "1234").unwrap_err();
        assert_eq!(wrong_password, unknown_user);
        assert_eq!(wrong_password.to_string(), "Invalid credentials");

        assert_eq!(manager.state(), AuthState::Unauthenticated);
        assert!(manager.current_token().is_none());
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_failed_login_keeps_existing_session() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        manager.restore();
        manager.login("aluno", "1234").unwrap();

        assert!(manager.login("aluno", "nope").is_err());
        assert!(manager.is_student());
        assert!(store.snapshot().is_some());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        manager.restore();
        manager.login("professor", "1234").unwrap();

        manager.logout();
        assert!(manager.current_token().is_none());
        assert!(store.snapshot().is_none());
        assert_eq!(manager.state(), AuthState::Unauthenticated);

        manager.logout();
        assert!(manager.current_token().is_none());
        assert!(store.snapshot().is_none());
        assert_eq!(manager.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_predicates_false_without_session() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        assert!(!manager.is_professor());
        assert!(!manager.is_student());
        assert!(manager.current_token().is_none());
    }

    #[test]
    fn test_rejection_while_loading_keeps_stored_session() {
        let record = format!(
            r#"{{"username":"professor","role":"professor","token":"{}"}}"#,
            PROFESSOR_TOKEN
        );
        let store = Arc::new(MemoryCredentialStore::with_record(record));
        let manager = manager_with(&store);

        // An anonymous request rejected before restore must not wipe storage
        assert!(!manager.invalidate_token(None));
        assert!(store.snapshot().is_some());
        assert!(manager.is_loading());

        assert_eq!(manager.restore(), AuthState::Authenticated(Role::Professor));
    }

    #[test]
    fn test_rejection_of_superseded_token_is_ignored() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        manager.restore();
        manager.login("aluno", "1234").unwrap();

        // Sent anonymously or under another account
        assert!(!manager.invalidate_token(None));
        assert!(!manager.invalidate_token(Some(PROFESSOR_TOKEN)));
        assert!(manager.is_student());
        assert!(store.snapshot().is_some());

        assert!(manager.invalidate_token(Some(STUDENT_TOKEN)));
        assert_eq!(manager.state(), AuthState::Unauthenticated);
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_anonymous_rejection_after_restore_is_acted_on() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        manager.restore();
        assert!(manager.invalidate_token(None));
        assert_eq!(manager.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_subscribers_see_transitions() {
        let store = Arc::new(MemoryCredentialStore::default());
        let manager = manager_with(&store);
        let rx = manager.subscribe();
        assert_eq!(*rx.borrow(), AuthState::Loading);

        manager.restore();
        assert_eq!(*rx.borrow(), AuthState::Unauthenticated);

        manager.login("aluno", "1234").unwrap();
        assert_eq!(*rx.borrow(), AuthState::Authenticated(Role::Student));

        manager.invalidate();
        assert_eq!(*rx.borrow(), AuthState::Unauthenticated);
    }
}
