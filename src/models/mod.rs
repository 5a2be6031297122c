//! Data models exchanged with the AI Agent backend.
//!
//! - [`Session`] / [`User`]: the current credential, owned by
//!   [`crate::session::SessionStore`].
//! - [`PendingAuth`]: fallback record written by the callback page when the
//!   opener can't be reached.
//! - [`FeedItem`] / [`FeedResponse`]: read-only projections of the feed.
//! - [`Profile`] / [`ProfileData`]: the editable profile form.

mod feed;
mod profile;
mod session;

pub use feed::*;
pub use profile::*;
pub use session::*;
