//! The OAuth callback page.
//!
//! The backend redirects the login window to `/auth/callback` with either
//! `token`, `email` and `userId`, or `error`. The page reports the result to
//! the window that opened it and closes itself shortly after, whether or not
//! the report got through. A successful login that can't be delivered is
//! parked in local storage as a pending-auth record.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use super::channel::{AuthMessage, MessagePort};
use super::pending::store_pending_auth;
use super::popup::WindowHandle;
use crate::models::{PendingAuth, User};
use crate::storage::LocalStorage;

pub const NO_AUTH_DATA_MESSAGE: &str = "No authentication data received";

/// Query parameters of the callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub token: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub error: Option<String>,
}

/// What the callback URL says happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    Error(String),
    Success(PendingAuth),
    /// Neither an error nor a complete set of credentials.
    Missing,
}

impl CallbackParams {
    pub fn result(&self) -> CallbackResult {
        if let Some(error) = present(&self.error) {
            return CallbackResult::Error(error.to_string());
        }
        match (present(&self.token), present(&self.email), present(&self.user_id)) {
            (Some(token), Some(email), Some(user_id)) => CallbackResult::Success(PendingAuth {
                token: token.to_string(),
                user_id: user_id.to_string(),
                email: email.to_string(),
            }),
            _ => CallbackResult::Missing,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// How the callback page got its result to the main window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Posted through the opener's message port.
    Posted,
    /// Opener unreachable; written to local storage instead.
    StoredPending,
    /// Opener unreachable and there is nothing worth storing.
    Dropped,
}

/// Report the callback result to `opener`, falling back to local storage
/// for successful logins.
pub fn notify_opener(
    params: &CallbackParams,
    opener: Option<&MessagePort>,
    origin: &str,
    storage: &LocalStorage,
) -> anyhow::Result<Delivery> {
    let reachable = opener.filter(|port| port.is_open());

    match params.result() {
        CallbackResult::Error(error) => {
            tracing::info!("Auth error: {}", error);
            Ok(post_or_drop(reachable, &AuthMessage::Error { error: Some(error) }, origin))
        }
        CallbackResult::Missing => {
            tracing::info!("No auth data received");
            let message = AuthMessage::Error {
                error: Some(NO_AUTH_DATA_MESSAGE.to_string()),
            };
            Ok(post_or_drop(reachable, &message, origin))
        }
        CallbackResult::Success(pending) => {
            let message = AuthMessage::Success {
                token: pending.token.clone(),
                user: User {
                    id: pending.user_id.clone(),
                    email: pending.email.clone(),
                },
            };
            let posted = reachable
                .map(|port| port.post_message(&message, origin).is_ok())
                .unwrap_or(false);
            if posted {
                tracing::info!("Message sent to opener");
                return Ok(Delivery::Posted);
            }

            tracing::info!("No opener available, using local storage fallback");
            store_pending_auth(storage, &pending)?;
            Ok(Delivery::StoredPending)
        }
    }
}

fn post_or_drop(opener: Option<&MessagePort>, message: &AuthMessage, origin: &str) -> Delivery {
    match opener.map(|port| port.post_message(message, origin)) {
        Some(Ok(())) => Delivery::Posted,
        Some(Err(e)) => {
            tracing::error!("Failed to send message to opener: {}", e);
            Delivery::Dropped
        }
        None => Delivery::Dropped,
    }
}

/// Shared state of the callback page.
#[derive(Clone)]
pub struct CallbackContext {
    /// Port to the window that opened the login popup, if any.
    pub opener: Option<MessagePort>,
    pub storage: LocalStorage,
    /// Origin this page is served from; stamped on every posted message.
    pub origin: String,
    /// The login window itself, closed once the page is done.
    pub window: WindowHandle,
    pub close_delay: Duration,
}

pub fn callback_router(ctx: CallbackContext) -> Router {
    Router::new()
        .route("/auth/callback", get(auth_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn auth_callback(
    State(ctx): State<CallbackContext>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<String>, (StatusCode, String)> {
    schedule_close(ctx.window.clone(), ctx.close_delay);

    notify_opener(&params, ctx.opener.as_ref(), &ctx.origin, &ctx.storage).map_err(|e| {
        tracing::error!("Callback page failed: {:#}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        )
    })?;

    Ok(Html(render_page(&params.result())))
}

/// Close the window after `delay`, regardless of how delivery went.
fn schedule_close(window: WindowHandle, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        window.close();
    });
}

fn render_page(result: &CallbackResult) -> String {
    let headline = match result {
        CallbackResult::Success(_) => "Authentication successful!".to_string(),
        CallbackResult::Error(error) => format!("Authentication failed: {}", escape_html(error)),
        CallbackResult::Missing => NO_AUTH_DATA_MESSAGE.to_string(),
    };
    format!(
        "<!doctype html>\n<html><head><title>AI Agent</title></head><body>\
         <p>{}</p><p>This window will close automatically...</p>\
         <script>setTimeout(() => window.close(), 2000)</script></body></html>",
        headline
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> CallbackParams {
        let mut params = CallbackParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "token" => params.token = value,
                "email" => params.email = value,
                "userId" => params.user_id = value,
                "error" => params.error = value,
                _ => unreachable!(),
            }
        }
        params
    }

    #[test]
    fn error_wins_over_credentials() {
        let result = params(&[("token", "t"), ("email", "e"), ("userId", "u"), ("error", "denied")])
            .result();
        assert_eq!(result, CallbackResult::Error("denied".to_string()));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let result = params(&[("token", ""), ("email", "e"), ("userId", "u")]).result();
        assert_eq!(result, CallbackResult::Missing);
    }

    #[test]
    fn page_escapes_provider_errors() {
        let page = render_page(&CallbackResult::Error("<script>".to_string()));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("This window will close automatically"));
    }
}
