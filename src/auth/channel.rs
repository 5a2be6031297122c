//! Cross-window messaging between the callback page and the login flow.
//!
//! A [`MessagePort`] plays the role of `window.opener.postMessage`: it stamps
//! each message with the sender's origin. The [`MessageListener`] drops
//! anything whose origin is not on its [`OriginAllowList`] before decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::User;

/// Messages the callback page sends to the window that opened it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum AuthMessage {
    #[serde(rename = "GOOGLE_AUTH_SUCCESS")]
    Success { token: String, user: User },
    #[serde(rename = "GOOGLE_AUTH_ERROR")]
    Error {
        #[serde(default)]
        error: Option<String>,
    },
}

/// A raw message as delivered: sender origin plus untyped payload.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub origin: String,
    pub data: serde_json::Value,
}

/// Origins a listener accepts messages from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAllowList {
    origins: Vec<String>,
}

impl OriginAllowList {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            origins: origins
                .into_iter()
                .map(|o| normalize_origin(o.as_ref()))
                .collect(),
        }
    }

    pub fn single(origin: &str) -> Self {
        Self::new([origin])
    }

    /// Exact match after dropping a trailing slash.
    pub fn allows(&self, origin: &str) -> bool {
        let origin = normalize_origin(origin);
        self.origins.iter().any(|o| *o == origin)
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("the receiving window is gone")]
pub struct PortClosed;

/// Create a connected port/listener pair.
pub fn message_channel(allow: OriginAllowList) -> (MessagePort, MessageListener) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MessagePort { tx }, MessageListener { rx, allow })
}

/// Sending half, handed to the callback page as its `opener`.
#[derive(Debug, Clone)]
pub struct MessagePort {
    tx: mpsc::UnboundedSender<MessageEvent>,
}

impl MessagePort {
    /// Whether the receiving window still exists.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Post `message`, stamped with the sender's own `origin`.
    pub fn post_message(&self, message: &AuthMessage, origin: &str) -> Result<(), PortClosed> {
        let data = serde_json::to_value(message).map_err(|_| PortClosed)?;
        self.post_raw(data, origin)
    }

    /// Post an arbitrary payload.
    pub fn post_raw(&self, data: serde_json::Value, origin: &str) -> Result<(), PortClosed> {
        self.tx
            .send(MessageEvent {
                origin: origin.to_string(),
                data,
            })
            .map_err(|_| PortClosed)
    }
}

/// Receiving half, owned by the login flow.
#[derive(Debug)]
pub struct MessageListener {
    rx: mpsc::UnboundedReceiver<MessageEvent>,
    allow: OriginAllowList,
}

impl MessageListener {
    /// Wait for the next accepted message. Returns `None` once every port
    /// has been dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<AuthMessage> {
        loop {
            let event = self.rx.recv().await?;
            if let Some(message) = self.accept(event) {
                return Some(message);
            }
        }
    }

    /// Take the next queued, accepted message without waiting.
    pub fn try_recv(&mut self) -> Option<AuthMessage> {
        while let Ok(event) = self.rx.try_recv() {
            if let Some(message) = self.accept(event) {
                return Some(message);
            }
        }
        None
    }

    fn accept(&self, event: MessageEvent) -> Option<AuthMessage> {
        if !self.allow.allows(&event.origin) {
            tracing::warn!("Received message from untrusted origin: {}", event.origin);
            return None;
        }

        match serde_json::from_value(event.data) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("Ignoring malformed auth message: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUSTED: &str = "http://localhost:5173";

    #[test]
    fn messages_use_browser_wire_shape() {
        let message = AuthMessage::Success {
            token: "t".to_string(),
            user: User {
                id: "u".to_string(),
                email: "e@x.io".to_string(),
            },
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "GOOGLE_AUTH_SUCCESS");
        assert_eq!(value["user"]["email"], "e@x.io");

        let error: AuthMessage =
            serde_json::from_value(serde_json::json!({"type": "GOOGLE_AUTH_ERROR"})).unwrap();
        assert_eq!(error, AuthMessage::Error { error: None });
    }

    #[test]
    fn allow_list_ignores_trailing_slash() {
        let allow = OriginAllowList::single("http://localhost:5173/");
        assert!(allow.allows(TRUSTED));
        assert!(!allow.allows("http://localhost:5174"));
        assert!(!allow.allows("https://localhost:5173"));
    }

    #[test]
    fn untrusted_and_malformed_messages_are_dropped() {
        let (port, mut listener) = message_channel(OriginAllowList::single(TRUSTED));
        let error = AuthMessage::Error {
            error: Some("denied".to_string()),
        };

        port.post_message(&error, "https://evil.example").unwrap();
        let unknown = serde_json::json!({"type": "SOMETHING_ELSE"});
        port.post_raw(unknown, TRUSTED).unwrap();
        port.post_message(&error, TRUSTED).unwrap();

        assert_eq!(listener.try_recv(), Some(error));
        assert_eq!(listener.try_recv(), None);
    }

    #[test]
    fn recv_waits_past_untrusted_messages() {
        let (port, mut listener) = message_channel(OriginAllowList::single(TRUSTED));
        let mut recv = tokio_test::task::spawn(listener.recv());

        let denied = AuthMessage::Error { error: None };
        port.post_message(&denied, "https://evil.example").unwrap();
        tokio_test::assert_pending!(recv.poll());

        port.post_message(&denied, TRUSTED).unwrap();
        assert!(recv.is_woken());
        assert_eq!(
            tokio_test::assert_ready!(recv.poll()),
            Some(AuthMessage::Error { error: None })
        );
    }

    #[test]
    fn port_reports_closed_listener() {
        let (port, listener) = message_channel(OriginAllowList::single(TRUSTED));
        assert!(port.is_open());
        drop(listener);

        assert!(!port.is_open());
        assert_eq!(
            port.post_message(&AuthMessage::Error { error: None }, TRUSTED),
            Err(PortClosed)
        );
    }
}
