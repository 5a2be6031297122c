//! Terminal client for the AI Agent backend.
//!
//! The crate mirrors a small browser client: a popup-based Google login,
//! a personalized feed and a profile form. Browser facilities are given
//! native carriers:
//!
//! - [`storage::LocalStorage`]: durable key/value storage (SQLite).
//! - [`auth::Popup`]: the login window, opened in the system browser.
//! - [`auth::MessagePort`] / [`auth::MessageListener`]: cross-window messages
//!   with an origin allow-list.
//! - [`auth::callback_router`]: the `/auth/callback` page, served on the
//!   trusted origin's loopback address.
//!
//! [`app::App`] ties these together and is the context object handed to
//! views, the route guard and the login flow.

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod guard;
pub mod models;
pub mod session;
pub mod storage;
pub mod token;
pub mod views;
