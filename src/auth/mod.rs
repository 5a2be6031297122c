//! Popup-based Google login.
//!
//! - [`flow`]: the state machine in the main window.
//! - [`channel`]: typed cross-window messages with an origin allow-list.
//! - [`popup`]: login windows.
//! - [`callback`]: the page the provider redirects the popup to.
//! - [`pending`]: the local-storage fallback and its reconciliation.

pub mod callback;
pub mod channel;
pub mod flow;
pub mod pending;
pub mod popup;

pub use callback::{
    callback_router, notify_opener, CallbackContext, CallbackParams, CallbackResult, Delivery,
    NO_AUTH_DATA_MESSAGE,
};
pub use channel::{message_channel, AuthMessage, MessageListener, MessagePort, OriginAllowList};
pub use flow::{FlowSettings, FlowState, LoginError, LoginFlow, LoginOutcome, TIMEOUT_MESSAGE};
pub use pending::{reconcile_pending_auth, store_pending_auth};
pub use popup::{Popup, PopupFeatures, PopupOpener, SystemBrowser, WindowGeometry, WindowHandle};
