//! The session store: single source of truth for the current credential.
//!
//! The store is an explicit context object. Clones share state, so the
//! login flow, the route guard and the API client all observe the same
//! session.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::models::{Session, User};
use crate::storage::{LocalStorage, TOKEN_KEY, USER_KEY};

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<User>,
}

#[derive(Clone)]
pub struct SessionStore {
    storage: LocalStorage,
    state: Arc<Mutex<SessionState>>,
}

impl SessionStore {
    /// Create a store, restoring whatever session local storage holds.
    pub fn new(storage: LocalStorage) -> Result<Self> {
        let token = storage.get_item(TOKEN_KEY)?;
        let user = match storage.get_item(USER_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| tracing::warn!("Ignoring unreadable stored user: {}", e))
                .ok(),
            None => None,
        };

        Ok(Self {
            storage,
            state: Arc::new(Mutex::new(SessionState { token, user })),
        })
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Persist a new session, replacing any previous one.
    pub fn login(&self, token: &str, user: User) -> Result<()> {
        self.storage.set_item(TOKEN_KEY, token)?;
        self.storage
            .set_item(USER_KEY, &serde_json::to_string(&user)?)?;

        let mut state = self.state.lock().expect("session lock poisoned");
        state.token = Some(token.to_string());
        state.user = Some(user);
        tracing::info!("Session started");
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.storage.remove_item(TOKEN_KEY)?;
        self.storage.remove_item(USER_KEY)?;

        let mut state = self.state.lock().expect("session lock poisoned");
        state.token = None;
        state.user = None;
        tracing::info!("Session cleared");
        Ok(())
    }

    /// Whether a token is present in storage.
    ///
    /// This is an existence check only; the token is not validated.
    pub fn check_auth(&self) -> Result<bool> {
        Ok(self
            .storage
            .get_item(TOKEN_KEY)?
            .is_some_and(|token| !token.is_empty()))
    }

    /// Token used for outgoing requests. Read from storage so a token written
    /// by the callback page fallback is picked up without a reload.
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self.storage.get_item(TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    pub fn user(&self) -> Option<User> {
        self.state.lock().expect("session lock poisoned").user.clone()
    }

    pub fn current(&self) -> Option<Session> {
        let state = self.state.lock().expect("session lock poisoned");
        match (&state.token, &state.user) {
            (Some(token), Some(user)) => Some(Session {
                token: token.clone(),
                user: user.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    #[test]
    fn clones_share_state() {
        let store = SessionStore::new(LocalStorage::open_memory().unwrap()).unwrap();
        let other = store.clone();

        store.login("token-1", user()).unwrap();

        assert_eq!(other.current().map(|s| s.token), Some("token-1".to_string()));
    }

    #[test]
    fn empty_token_counts_as_logged_out() {
        let storage = LocalStorage::open_memory().unwrap();
        storage.set_item(TOKEN_KEY, "").unwrap();
        let store = SessionStore::new(storage).unwrap();

        assert!(!store.check_auth().unwrap());
        assert!(store.token().unwrap().is_none());
    }

    #[test]
    fn unreadable_stored_user_is_ignored() {
        let storage = LocalStorage::open_memory().unwrap();
        storage.set_item(TOKEN_KEY, "token-1").unwrap();
        storage.set_item(USER_KEY, "not json").unwrap();

        let store = SessionStore::new(storage).unwrap();

        assert!(store.check_auth().unwrap());
        assert!(store.user().is_none());
        assert!(store.current().is_none());
    }
}
