//! The application context.
//!
//! [`App`] owns the configuration, the session store and the API client,
//! and hands them to the route guard, the views and the login flow. It also
//! carries the window lifecycle hooks: [`App::on_load`] and
//! [`App::on_focus`] consume any pending-auth record.

use std::future::Future;

use anyhow::{Context, Result};
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::auth::{
    callback_router, message_channel, reconcile_pending_auth, CallbackContext, FlowSettings,
    LoginError, LoginFlow, LoginOutcome, OriginAllowList, PopupOpener, WindowHandle,
};
use crate::client::ApiClient;
use crate::config::Config;
use crate::models::Session;
use crate::session::SessionStore;
use crate::storage::LocalStorage;

pub use crate::guard::{GuardDecision, Route, RouteGuard};

pub struct App {
    config: Config,
    session: SessionStore,
    client: ApiClient,
    guard: RouteGuard,
}

impl App {
    /// Open the app on the configured (or platform default) storage.
    pub fn open(config: Config) -> Result<Self> {
        let storage = LocalStorage::open_in(config.data_dir.as_deref())?;
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: Config, storage: LocalStorage) -> Result<Self> {
        let session = SessionStore::new(storage)?;
        let client = ApiClient::new(config.api_url.clone(), session.clone());
        let guard = RouteGuard::new(config.check_token_expiry);
        Ok(Self {
            config,
            session,
            client,
            guard,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Startup hook: pick up a login left behind by the callback page.
    pub fn on_load(&self) -> Result<Option<Session>> {
        reconcile_pending_auth(&self.session)
    }

    /// Focus hook. Same reconciliation as on load.
    pub fn on_focus(&self) -> Result<Option<Session>> {
        reconcile_pending_auth(&self.session)
    }

    pub fn navigate(&self, route: Route) -> Result<GuardDecision> {
        self.guard.evaluate(route, &self.session)
    }

    pub fn logout(&self) -> Result<()> {
        self.session.logout()
    }

    /// Run a full popup login.
    ///
    /// Serves the callback page on the trusted origin for the duration of the
    /// flow, opens the popup through `opener`, and waits for the first
    /// terminal event. When the flow ends without a session, focus returns to
    /// the main window and a pending-auth record is picked up if the callback
    /// page left one.
    pub async fn login<O: PopupOpener>(
        &self,
        opener: O,
        window: WindowHandle,
    ) -> Result<LoginOutcome, LoginError> {
        let origin = self.config.trusted_origin.clone();
        let (port, listener) = message_channel(OriginAllowList::single(&origin));

        let ctx = CallbackContext {
            opener: Some(port),
            storage: self.session.storage().clone(),
            origin: origin.clone(),
            window,
            close_delay: self.config.callback_close_delay(),
        };
        let tcp = bind_origin(&origin).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(tcp, callback_router(ctx))
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let mut flow = LoginFlow::new(
            opener,
            self.session.clone(),
            listener,
            FlowSettings::from_config(&self.config),
        );
        let result = match flow.begin(&self.client).await {
            Ok(()) => flow.run().await,
            Err(e) => Err(e),
        };
        drop(flow);

        let _ = shutdown_tx.send(());
        match server.await {
            Ok(Err(e)) => tracing::warn!("Callback server error: {}", e),
            Err(e) => tracing::warn!("Callback server task failed: {}", e),
            Ok(Ok(())) => {}
        }

        let outcome = result?.unwrap_or(LoginOutcome::Cancelled);
        if matches!(outcome, LoginOutcome::Success(_)) {
            return Ok(outcome);
        }
        match self.on_focus()? {
            Some(session) => Ok(LoginOutcome::Success(session)),
            None => Ok(outcome),
        }
    }

    /// Serve the callback page with no opener until `shutdown` resolves.
    /// Logins that arrive are parked as pending-auth records.
    pub async fn serve_callback(
        &self,
        window: WindowHandle,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let origin = self.config.trusted_origin.clone();
        let ctx = CallbackContext {
            opener: None,
            storage: self.session.storage().clone(),
            origin: origin.clone(),
            window,
            close_delay: self.config.callback_close_delay(),
        };
        let tcp = bind_origin(&origin).await?;
        tracing::info!("Callback page listening on {}/auth/callback", origin);

        axum::serve(tcp, callback_router(ctx))
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Host and port the callback page is served on, taken from the trusted
/// origin.
pub fn origin_address(origin: &str) -> Result<(String, u16)> {
    let url = Url::parse(origin).with_context(|| format!("Invalid trusted origin: {}", origin))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Trusted origin has no host: {}", origin))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow::anyhow!("Trusted origin has no port: {}", origin))?;
    Ok((host, port))
}

async fn bind_origin(origin: &str) -> Result<TcpListener> {
    let (host, port) = origin_address(origin)?;
    TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to listen on {}", origin))
}
