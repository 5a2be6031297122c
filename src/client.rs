//! HTTP client for the AI Agent backend.
//!
//! Every request carries `Authorization: Bearer <token>` when the session
//! store holds a token. The token is read per request, never cached.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::models::*;
use crate::session::SessionStore;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: please log in again")]
    Unauthorized(String),

    #[error("Server error: {status}: {body}")]
    Server { status: StatusCode, body: String },

    #[error("Local storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Message to show the user: the backend's `message` field when it sent
    /// one, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        let body = match self {
            Self::NotFound(body)
            | Self::BadRequest(body)
            | Self::Unauthorized(body)
            | Self::Server { body, .. } => body,
            _ => return fallback.to_string(),
        };
        backend_message(body).unwrap_or_else(|| fallback.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn backend_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()?
        .message
        .filter(|m| !m.is_empty())
}

/// HTTP client for the AI Agent API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    session: SessionStore,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with the bearer token attached when logged in.
    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        let token = self
            .session
            .token()
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req)
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = self.check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Pass a successful response through; turn any other status into an
    /// error carrying the response body.
    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(body)),
            StatusCode::BAD_REQUEST => Err(ClientError::BadRequest(body)),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized(body)),
            _ => Err(ClientError::Server { status, body }),
        }
    }

    // ============================================================
    // Auth
    // ============================================================

    /// Ask the backend where to send the user to sign in with Google.
    pub async fn get_auth_url(&self) -> Result<AuthUrlResponse, ClientError> {
        let response = self
            .request(reqwest::Method::GET, "/api/auth/google")?
            .send()
            .await?;
        self.handle_response(response).await
    }

    // ============================================================
    // Profile
    // ============================================================

    pub async fn get_profile(&self) -> Result<Profile, ClientError> {
        let response = self
            .request(reqwest::Method::GET, "/api/profile")?
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Replace the stored profile with `data`. The response body is not
    /// inspected; any success status counts.
    pub async fn update_profile(&self, data: &ProfileData) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::PUT, "/api/profile")?
            .json(data)
            .send()
            .await?;
        self.check_status(response).await?;
        Ok(())
    }

    // ============================================================
    // Feed
    // ============================================================

    pub async fn get_feed(&self, query: &FeedQuery) -> Result<FeedResponse, ClientError> {
        let response = self
            .request(reqwest::Method::GET, "/api/feed")?
            .query(query)
            .send()
            .await?;
        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_backend_message() {
        let err = ClientError::Server {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: r#"{"message":"Feed service unavailable"}"#.to_string(),
        };
        assert_eq!(err.user_message("Failed to load feed"), "Feed service unavailable");
    }

    #[test]
    fn user_message_falls_back_for_plain_bodies() {
        let err = ClientError::Server {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream timed out".to_string(),
        };
        assert_eq!(err.user_message("Failed to load feed"), "Failed to load feed");
        assert_eq!(
            ClientError::Unauthorized(String::new()).user_message("Failed to load profile"),
            "Failed to load profile"
        );
    }
}
