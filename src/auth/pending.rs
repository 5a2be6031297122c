//! The pending-auth fallback.
//!
//! When the callback page cannot reach the window that opened it, it leaves
//! the login result in local storage. The main window consumes that record
//! on load and whenever it regains focus.

use anyhow::Result;

use crate::models::{PendingAuth, Session};
use crate::session::SessionStore;
use crate::storage::{LocalStorage, PENDING_AUTH_KEY, TOKEN_KEY};

/// Write the fallback record (and the token itself) to storage.
pub fn store_pending_auth(storage: &LocalStorage, pending: &PendingAuth) -> Result<()> {
    storage.set_item(TOKEN_KEY, &pending.token)?;
    storage.set_item(PENDING_AUTH_KEY, &serde_json::to_string(pending)?)?;
    tracing::info!("Stored pending login for the main window");
    Ok(())
}

/// Consume a pending-auth record, if one exists, and commit it as the
/// current session.
///
/// The record is removed before the session is committed, so it is applied
/// at most once. A malformed record is discarded.
pub fn reconcile_pending_auth(session: &SessionStore) -> Result<Option<Session>> {
    let storage = session.storage();
    let Some(raw) = storage.get_item(PENDING_AUTH_KEY)? else {
        return Ok(None);
    };
    storage.remove_item(PENDING_AUTH_KEY)?;

    let pending: PendingAuth = match serde_json::from_str(&raw) {
        Ok(pending) => pending,
        Err(e) => {
            tracing::error!("Failed to parse pending auth: {}", e);
            return Ok(None);
        }
    };

    tracing::info!("Found pending auth in local storage");
    let session_data = pending.into_session();
    session.login(&session_data.token, session_data.user.clone())?;
    Ok(Some(session_data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(LocalStorage::open_memory().unwrap()).unwrap()
    }

    #[test]
    fn record_is_committed_once_and_removed() {
        let session = store();
        store_pending_auth(
            session.storage(),
            &PendingAuth {
                token: "token-1".to_string(),
                user_id: "user-1".to_string(),
                email: "ada@example.com".to_string(),
            },
        )
        .unwrap();

        let committed = reconcile_pending_auth(&session).unwrap().unwrap();
        assert_eq!(committed.user.email, "ada@example.com");
        assert_eq!(session.current(), Some(committed));
        assert!(session.storage().get_item(PENDING_AUTH_KEY).unwrap().is_none());

        assert!(reconcile_pending_auth(&session).unwrap().is_none());
    }

    #[test]
    fn malformed_record_is_discarded() {
        let session = store();
        session
            .storage()
            .set_item(PENDING_AUTH_KEY, "{\"token\":")
            .unwrap();

        assert!(reconcile_pending_auth(&session).unwrap().is_none());
        assert!(session.storage().get_item(PENDING_AUTH_KEY).unwrap().is_none());
        assert!(!session.check_auth().unwrap());
    }
}
