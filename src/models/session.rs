use serde::{Deserialize, Serialize};

/// The authenticated user, as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// A backend-issued credential together with its user.
///
/// At most one session exists at a time; it lives in the session store and
/// is mirrored to local storage so it survives restarts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Login result left in local storage by the callback page when it could
/// not reach the window that opened it.
///
/// The main window consumes it on load and on focus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingAuth {
    pub token: String,
    pub user_id: String,
    pub email: String,
}

impl PendingAuth {
    pub fn into_session(self) -> Session {
        Session {
            token: self.token,
            user: User {
                id: self.user_id,
                email: self.email,
            },
        }
    }
}

/// Response of `GET /api/auth/google`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlResponse {
    #[serde(default)]
    pub auth_url: Option<String>,
}
