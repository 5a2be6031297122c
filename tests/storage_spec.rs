use agent_console::auth::{reconcile_pending_auth, store_pending_auth};
use agent_console::guard::{GuardDecision, Route, RouteGuard};
use agent_console::models::*;
use agent_console::session::SessionStore;
use agent_console::storage::{LocalStorage, PENDING_AUTH_KEY, TOKEN_KEY, USER_KEY};
use speculate2::speculate;

fn test_user() -> User {
    User {
        id: "user-1".to_string(),
        email: "ada@example.com".to_string(),
    }
}

speculate! {
    before {
        let storage = LocalStorage::open_memory().expect("Failed to create in-memory storage");
    }

    describe "local storage" {
        it "returns None for a missing key" {
            assert!(storage.get_item("nope").expect("Query failed").is_none());
        }

        it "overwrites an existing value" {
            storage.set_item("theme", "dark").expect("Failed to set");
            storage.set_item("theme", "light").expect("Failed to set");

            assert_eq!(storage.get_item("theme").unwrap(), Some("light".to_string()));
            assert_eq!(storage.keys().unwrap(), vec!["theme".to_string()]);
        }

        it "reports whether a removed key existed" {
            storage.set_item("theme", "dark").unwrap();

            assert!(storage.remove_item("theme").unwrap());
            assert!(!storage.remove_item("theme").unwrap());
        }

        it "keeps values across reopen" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            {
                let on_disk = LocalStorage::open_in(Some(dir.path())).unwrap();
                on_disk.set_item(TOKEN_KEY, "token-1").unwrap();
            }

            let reopened = LocalStorage::open_in(Some(dir.path())).unwrap();
            assert_eq!(reopened.get_item(TOKEN_KEY).unwrap(), Some("token-1".to_string()));
        }

        it "can be migrated twice" {
            storage.migrate().expect("Second migration failed");
        }
    }

    describe "session store" {
        it "starts logged out on empty storage" {
            let session = SessionStore::new(storage.clone()).unwrap();

            assert!(!session.check_auth().unwrap());
            assert!(session.current().is_none());
        }

        it "persists token and user on login" {
            let session = SessionStore::new(storage.clone()).unwrap();
            session.login("token-1", test_user()).unwrap();

            assert_eq!(storage.get_item(TOKEN_KEY).unwrap(), Some("token-1".to_string()));
            assert!(storage.get_item(USER_KEY).unwrap().is_some());
            assert_eq!(session.user(), Some(test_user()));
        }

        it "replaces a previous session on login" {
            let session = SessionStore::new(storage.clone()).unwrap();
            session.login("token-1", test_user()).unwrap();
            session.login("token-2", User {
                id: "user-2".to_string(),
                email: "grace@example.com".to_string(),
            }).unwrap();

            assert_eq!(session.token().unwrap(), Some("token-2".to_string()));
            assert_eq!(session.user().unwrap().email, "grace@example.com");
        }

        it "restores the session from storage" {
            SessionStore::new(storage.clone()).unwrap().login("token-1", test_user()).unwrap();

            let restored = SessionStore::new(storage.clone()).unwrap();
            assert_eq!(restored.current(), Some(Session {
                token: "token-1".to_string(),
                user: test_user(),
            }));
        }

        it "shares state between clones" {
            let session = SessionStore::new(storage.clone()).unwrap();
            let other = session.clone();
            session.login("token-1", test_user()).unwrap();

            assert_eq!(other.user(), Some(test_user()));
            other.logout().unwrap();
            assert!(session.user().is_none());
        }

        it "clears storage on logout" {
            let session = SessionStore::new(storage.clone()).unwrap();
            session.login("token-1", test_user()).unwrap();
            session.logout().unwrap();

            assert!(!session.check_auth().unwrap());
            assert!(storage.get_item(TOKEN_KEY).unwrap().is_none());
            assert!(storage.get_item(USER_KEY).unwrap().is_none());
        }

        it "treats a token written by another writer as authenticated" {
            let session = SessionStore::new(storage.clone()).unwrap();
            storage.set_item(TOKEN_KEY, "token-1").unwrap();

            assert!(session.check_auth().unwrap());
        }

        it "treats an empty token as logged out" {
            storage.set_item(TOKEN_KEY, "").unwrap();
            let session = SessionStore::new(storage.clone()).unwrap();

            assert!(!session.check_auth().unwrap());
        }
    }

    describe "pending auth" {
        it "is committed on reconcile and consumed" {
            let session = SessionStore::new(storage.clone()).unwrap();
            store_pending_auth(&storage, &PendingAuth {
                token: "token-1".to_string(),
                user_id: "user-1".to_string(),
                email: "ada@example.com".to_string(),
            }).unwrap();

            let committed = reconcile_pending_auth(&session).unwrap();
            assert_eq!(committed.map(|s| s.user), Some(test_user()));
            assert!(storage.get_item(PENDING_AUTH_KEY).unwrap().is_none());
            assert!(reconcile_pending_auth(&session).unwrap().is_none());
        }

        it "discards a malformed record" {
            let session = SessionStore::new(storage.clone()).unwrap();
            storage.set_item(PENDING_AUTH_KEY, "{not json").unwrap();

            assert!(reconcile_pending_auth(&session).unwrap().is_none());
            assert!(storage.get_item(PENDING_AUTH_KEY).unwrap().is_none());
            assert!(session.user().is_none());
        }
    }

    describe "route guard" {
        it "redirects protected routes to login when logged out" {
            let session = SessionStore::new(storage.clone()).unwrap();
            let guard = RouteGuard::default();

            for route in [Route::Dashboard, Route::Profile] {
                assert_eq!(
                    guard.evaluate(route, &session).unwrap(),
                    GuardDecision::Redirect(Route::Login)
                );
            }
        }

        it "renders public routes without a session" {
            let session = SessionStore::new(storage.clone()).unwrap();
            let guard = RouteGuard::default();

            assert_eq!(
                guard.evaluate(Route::AuthCallback, &session).unwrap(),
                GuardDecision::Render { route: Route::AuthCallback, user: None }
            );
        }

        it "renders protected routes once logged in" {
            let session = SessionStore::new(storage.clone()).unwrap();
            session.login("opaque-token", test_user()).unwrap();

            assert_eq!(
                RouteGuard::default().evaluate(Route::Profile, &session).unwrap(),
                GuardDecision::Render { route: Route::Profile, user: Some(test_user()) }
            );
        }

        it "rejects a token without expiry when expiry is enforced" {
            let session = SessionStore::new(storage.clone()).unwrap();
            session.login("opaque-token", test_user()).unwrap();

            assert_eq!(
                RouteGuard::new(true).evaluate(Route::Dashboard, &session).unwrap(),
                GuardDecision::Redirect(Route::Login)
            );
        }
    }
}
