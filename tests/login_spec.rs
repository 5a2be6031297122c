use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agent_console::app::{App, GuardDecision, Route};
use agent_console::auth::*;
use agent_console::config::Config;
use agent_console::storage::LocalStorage;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

const AUTH_URL: &str = "https://accounts.example.com/o/oauth2/auth";
const SIGNED_IN: &str = "token=token-1&email=ada%40example.com&userId=user-1";

/// Serve `router` on a loopback port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// An origin on a port nobody is listening on yet.
async fn free_origin() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    format!("http://127.0.0.1:{}", port)
}

async fn backend_with_auth_url(auth_url: Option<&'static str>) -> String {
    serve(Router::new().route(
        "/api/auth/google",
        get(move || async move { Json(json!({ "authUrl": auth_url })) }),
    ))
    .await
}

async fn app(api_url: String) -> App {
    let config = Config {
        api_url,
        trusted_origin: free_origin().await,
        ..Config::default()
    };
    App::with_storage(config, LocalStorage::open_memory().unwrap()).unwrap()
}

/// Stands in for the browser: instead of visiting the provider it sends the
/// login window straight to the callback page with `query`.
struct RedirectingOpener {
    callback: String,
    query: &'static str,
    opened: Arc<AtomicBool>,
}

impl RedirectingOpener {
    fn new(app: &App, query: &'static str) -> Self {
        Self {
            callback: format!("{}/auth/callback", app.config().trusted_origin),
            query,
            opened: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl PopupOpener for RedirectingOpener {
    fn open(&self, url: &str, name: &str, _features: &PopupFeatures) -> Option<Box<dyn Popup>> {
        assert_eq!(url, AUTH_URL);
        assert_eq!(name, "google-auth");
        self.opened.store(true, Ordering::SeqCst);

        let target = format!("{}?{}", self.callback, self.query);
        tokio::spawn(async move {
            reqwest::get(target).await.unwrap();
        });
        Some(Box::new(WindowHandle::new()))
    }
}

mod login {
    use super::*;

    #[tokio::test]
    async fn completes_through_the_callback_page() {
        let app = app(backend_with_auth_url(Some(AUTH_URL)).await).await;
        let opener = RedirectingOpener::new(&app, SIGNED_IN);
        let opened = opener.opened.clone();

        let outcome = app.login(opener, WindowHandle::new()).await.unwrap();

        assert!(opened.load(Ordering::SeqCst));
        let LoginOutcome::Success(session) = outcome else {
            panic!("expected success, got {:?}", outcome);
        };
        assert_eq!(session.token, "token-1");
        assert_eq!(session.user.email, "ada@example.com");
        assert!(app.session().check_auth().unwrap());
        assert!(matches!(
            app.navigate(Route::Dashboard).unwrap(),
            GuardDecision::Render { .. }
        ));
    }

    #[tokio::test]
    async fn reports_provider_errors() {
        let app = app(backend_with_auth_url(Some(AUTH_URL)).await).await;
        let opener = RedirectingOpener::new(&app, "error=access_denied");

        let outcome = app.login(opener, WindowHandle::new()).await.unwrap();

        assert_eq!(outcome, LoginOutcome::Failed("access_denied".to_string()));
        assert!(!app.session().check_auth().unwrap());
    }

    #[tokio::test]
    async fn fails_without_an_auth_url() {
        let app = app(backend_with_auth_url(None).await).await;
        let opener = RedirectingOpener::new(&app, "");
        let opened = opener.opened.clone();

        let err = app.login(opener, WindowHandle::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "No auth URL received from server");
        assert!(!opened.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn releases_the_callback_port_afterwards() {
        let app = app(backend_with_auth_url(Some(AUTH_URL)).await).await;
        let opener = RedirectingOpener::new(&app, "error=access_denied");
        app.login(opener, WindowHandle::new()).await.unwrap();

        let opener = RedirectingOpener::new(&app, SIGNED_IN);
        let outcome = app.login(opener, WindowHandle::new()).await.unwrap();

        assert!(matches!(outcome, LoginOutcome::Success(_)));
    }
}
