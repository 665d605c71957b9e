use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use crate::models::UserRecord;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot establish a session with an empty token")]
    EmptyToken,
}

/// An authenticated session: a non-empty bearer token and the user it belongs to.
///
/// The unauthenticated state is the absence of a `Session`, so a token
/// without a user (or the reverse) cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: UserRecord,
}

impl Session {
    pub fn new(token: String, user: UserRecord) -> Result<Self, SessionError> {
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        Ok(Self { token, user })
    }
}

/// Authoritative in-memory session, shared by the navigator and the
/// outbound client. Mutated only through `login` and `logout`.
pub struct SessionState {
    current: RwLock<Option<Session>>,
    /// Serializes transitions so disk writes land in the same order as
    /// memory updates; readers only ever wait on `current`.
    transition: Mutex<()>,
    store: CredentialStore,
}

impl SessionState {
    /// Seed the session from the credential store. Reads the store once.
    pub fn restore(store: CredentialStore) -> Self {
        let current = store.load();
        match current {
            Some(ref session) => {
                info!(username = %session.user.username, role = %session.user.role, "Restored session")
            }
            None => debug!("Starting unauthenticated"),
        }
        Self {
            current: RwLock::new(current),
            transition: Mutex::new(()),
            store,
        }
    }

    /// Start unauthenticated without reading the store.
    pub fn new(store: CredentialStore) -> Self {
        Self {
            current: RwLock::new(None),
            transition: Mutex::new(()),
            store,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Establish a session. Token and user change together, in memory and
    /// on disk; a failed save leaves nothing persisted.
    pub fn login(&self, token: String, user: UserRecord) -> Result<(), SessionError> {
        let session = Session::new(token, user)?;
        let _transition = self.begin_transition();

        if let Err(e) = self.store.save(&session) {
            warn!(error = %e, "Failed to persist session");
        }

        info!(username = %session.user.username, role = %session.user.role, "Logged in");
        *self.write() = Some(session);
        Ok(())
    }

    /// Return to the unauthenticated state.
    /// Returns `false` (and touches nothing) if there was no session.
    pub fn logout(&self) -> bool {
        let _transition = self.begin_transition();
        let previous = self.write().take();
        self.finish_logout(previous)
    }

    /// Log out only if the session still holds `token`.
    ///
    /// Used when a request made with `token` is rejected: a later login
    /// must not be undone by a stale failure, and several failures with the
    /// same token clear the session once.
    pub fn logout_if_current(&self, token: &str) -> bool {
        let _transition = self.begin_transition();
        let previous = {
            let mut current = self.write();
            match current.as_ref() {
                Some(session) if session.token == token => current.take(),
                _ => None,
            }
        };
        self.finish_logout(previous)
    }

    fn finish_logout(&self, previous: Option<Session>) -> bool {
        let Some(previous) = previous else {
            return false;
        };
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
        info!(username = %previous.user.username, "Logged out");
        true
    }

    pub fn current_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.read().as_ref().map(|s| s.user.clone())
    }

    /// Consistent copy of the whole session
    pub fn snapshot(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::credentials::{CredentialBackend, MemoryBackend, TOKEN_KEY, USER_KEY};
    use crate::models::Role;
    use crate::test_support::{FlakyBackend, SharedBackend};

    fn store(backend: &Arc<MemoryBackend>) -> CredentialStore {
        CredentialStore::new(Box::new(SharedBackend(backend.clone())))
    }

    fn user(role: Role) -> UserRecord {
        UserRecord::new(1, "ada", role)
    }

    fn assert_consistent(state: &SessionState) {
        // Token and user are present together or absent together
        assert_eq!(state.current_token().is_some(), state.current_user().is_some());
        if let Some(token) = state.current_token() {
            assert!(!token.is_empty());
        }
    }

    #[test]
    fn test_starts_unauthenticated() {
        let state = SessionState::new(CredentialStore::in_memory());
        assert!(!state.is_authenticated());
        assert_eq!(state.current_token(), None);
        assert_eq!(state.current_user(), None);
    }

    #[test]
    fn test_login_sets_both_fields() {
        let state = SessionState::new(CredentialStore::in_memory());
        state.login("abc123".to_string(), user(Role::User)).unwrap();
        assert_eq!(state.current_token().as_deref(), Some("abc123"));
        assert_eq!(state.current_user(), Some(user(Role::User)));
        assert_consistent(&state);
    }

    #[test]
    fn test_login_rejects_empty_token() {
        let state = SessionState::new(CredentialStore::in_memory());
        assert_eq!(
            state.login(String::new(), user(Role::User)),
            Err(SessionError::EmptyToken)
        );
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_logout_clears_state_and_store() {
        let backend = Arc::new(MemoryBackend::new());
        let state = SessionState::new(store(&backend));
        state.login("abc123".to_string(), user(Role::User)).unwrap();
        assert!(backend.get(TOKEN_KEY).unwrap().is_some());

        assert!(state.logout());
        assert!(!state.is_authenticated());
        assert_consistent(&state);
        assert_eq!(backend.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(backend.get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let state = SessionState::new(CredentialStore::in_memory());
        assert!(!state.logout());
        state.login("abc123".to_string(), user(Role::User)).unwrap();
        assert!(state.logout());
        assert!(!state.logout());
        assert_consistent(&state);
    }

    #[test]
    fn test_logout_if_current() {
        let state = SessionState::new(CredentialStore::in_memory());
        state.login("old".to_string(), user(Role::User)).unwrap();
        state.login("new".to_string(), user(Role::Admin)).unwrap();

        // A failure carrying the replaced token leaves the new session alone
        assert!(!state.logout_if_current("old"));
        assert_eq!(state.current_token().as_deref(), Some("new"));

        assert!(state.logout_if_current("new"));
        assert!(!state.logout_if_current("new"));
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_restore_round_trip() {
        let backend = Arc::new(MemoryBackend::new());
        let first = SessionState::new(store(&backend));
        first.login("abc123".to_string(), user(Role::Admin)).unwrap();

        let second = SessionState::restore(store(&backend));
        assert_eq!(
            second.snapshot(),
            Some(Session::new("abc123".to_string(), user(Role::Admin)).unwrap())
        );
    }

    #[test]
    fn test_restore_after_logout_is_unauthenticated() {
        let backend = Arc::new(MemoryBackend::new());
        let first = SessionState::new(store(&backend));
        first.login("abc123".to_string(), user(Role::User)).unwrap();
        first.logout();

        assert!(!SessionState::restore(store(&backend)).is_authenticated());
    }

    #[test]
    fn test_failed_save_does_not_restore_previous_user() {
        let backend = Arc::new(MemoryBackend::new());
        let flaky = FlakyBackend::new(backend.clone());
        let state = SessionState::new(CredentialStore::new(Box::new(flaky.clone())));
        state
            .login("admintoken".to_string(), UserRecord::new(1, "root", Role::Admin))
            .unwrap();

        flaky.fail_set(USER_KEY);
        state
            .login("usertoken".to_string(), UserRecord::new(2, "bob", Role::User))
            .unwrap();
        assert_eq!(state.current_token().as_deref(), Some("usertoken"));
        assert_eq!(state.current_user().map(|u| u.role), Some(Role::User));

        // The restart must not pair bob's token with root's record
        assert_eq!(SessionState::restore(store(&backend)).snapshot(), None);
    }

    #[test]
    fn test_failed_clear_does_not_resurrect_session() {
        let backend = Arc::new(MemoryBackend::new());
        let flaky = FlakyBackend::new(backend.clone());
        let state = SessionState::new(CredentialStore::new(Box::new(flaky.clone())));
        state.login("abc123".to_string(), user(Role::User)).unwrap();

        flaky.fail_remove(TOKEN_KEY);
        assert!(state.logout());
        assert!(!state.is_authenticated());
        assert_consistent(&state);

        assert!(!SessionState::restore(store(&backend)).is_authenticated());
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_state() {
        let state = Arc::new(SessionState::new(CredentialStore::in_memory()));

        let writer = {
            let state = state.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    state.login(format!("token-{i}"), user(Role::User)).unwrap();
                    state.logout();
                }
            })
        };

        for _ in 0..500 {
            let snapshot = state.snapshot();
            if let Some(session) = snapshot {
                assert!(!session.token.is_empty());
            }
        }
        writer.join().unwrap();
        assert_consistent(&state);
    }
}
