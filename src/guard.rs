//! Routes and the guard that gates the authenticated ones.

use anyhow::Result;
use chrono::Utc;

use crate::models::User;
use crate::session::SessionStore;
use crate::token;

/// The views of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    AuthCallback,
    Dashboard,
    Profile,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::AuthCallback => "/auth/callback",
            Self::Dashboard => "/",
            Self::Profile => "/profile",
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Dashboard | Self::Profile)
    }
}

/// Outcome of evaluating the guard for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the requested route.
    Render { route: Route, user: Option<User> },
    /// Navigate elsewhere instead, replacing the current entry.
    Redirect(Route),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteGuard {
    /// Also redirect when the stored token's `exp` claim has passed.
    check_expiry: bool,
}

impl RouteGuard {
    pub fn new(check_expiry: bool) -> Self {
        Self { check_expiry }
    }

    pub fn evaluate(&self, route: Route, session: &SessionStore) -> Result<GuardDecision> {
        if !route.is_protected() {
            return Ok(GuardDecision::Render { route, user: None });
        }

        let authenticated = match session.token()? {
            Some(token) if self.check_expiry => !token::is_token_expired(&token, Utc::now()),
            Some(_) => session.check_auth()?,
            None => false,
        };
        tracing::debug!(route = route.path(), authenticated, "route guard evaluated");

        if authenticated {
            Ok(GuardDecision::Render {
                route,
                user: session.user(),
            })
        } else {
            Ok(GuardDecision::Redirect(Route::Login))
        }
    }
}
