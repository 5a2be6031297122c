//! The popup login flow.
//!
//! ```text
//! idle -> awaiting_popup -> (success | error | timed_out | cancelled) -> idle
//! ```
//!
//! While awaiting, the flow owns three resources: the popup handle, the
//! timeout and the closed-window poll interval. They live together in one
//! [`ActiveLogin`] and every terminal transition drops it, so no exit path
//! can leave a timer or window reference behind. Whichever terminal event
//! arrives first wins; anything after that finds the flow idle and is
//! ignored.

use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};

use super::channel::{AuthMessage, MessageListener};
use super::popup::{Popup, PopupFeatures, PopupOpener, WindowGeometry, POPUP_NAME};
use crate::client::{ApiClient, ClientError};
use crate::config::{Config, MIN_POLL_INTERVAL};
use crate::models::Session;
use crate::session::SessionStore;

pub const TIMEOUT_MESSAGE: &str = "Authentication timeout. Please try again.";
const DEFAULT_ERROR_MESSAGE: &str = "Authentication failed";

/// Failures that keep a login from starting or completing.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("{0}")]
    Network(#[from] ClientError),

    #[error("No auth URL received from server")]
    NoAuthUrl,

    #[error("Popup blocked by browser. Please allow popups for this site.")]
    PopupBlocked,

    #[error("A login is already in progress")]
    InProgress,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// How a started login ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The session was committed to the store.
    Success(Session),
    /// The provider or callback page reported an error.
    Failed(String),
    TimedOut,
    /// The user closed the popup. Not an error.
    Cancelled,
}

impl LoginOutcome {
    /// Text to show the user, if the outcome warrants one.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Failed(message) => Some(message.clone()),
            Self::TimedOut => Some(TIMEOUT_MESSAGE.to_string()),
            Self::Success(_) | Self::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingPopup,
}

/// Inputs that drive the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Message(AuthMessage),
    Timeout,
    Poll,
    /// Every message port was dropped; nothing more can arrive.
    ChannelClosed,
}

#[derive(Debug, Clone, Copy)]
pub struct FlowSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub popup_width: u32,
    pub popup_height: u32,
    pub parent: WindowGeometry,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.auth_timeout(),
            poll_interval: config.poll_interval(),
            popup_width: config.popup_width,
            popup_height: config.popup_height,
            parent: WindowGeometry::default(),
        }
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct ActiveLogin {
    popup: Box<dyn Popup>,
    timeout: Pin<Box<Sleep>>,
    poll: Interval,
}

pub struct LoginFlow<O: PopupOpener> {
    opener: O,
    session: SessionStore,
    listener: MessageListener,
    settings: FlowSettings,
    active: Option<ActiveLogin>,
    channel_open: bool,
}

impl<O: PopupOpener> LoginFlow<O> {
    pub fn new(
        opener: O,
        session: SessionStore,
        listener: MessageListener,
        settings: FlowSettings,
    ) -> Self {
        Self {
            opener,
            session,
            listener,
            settings,
            active: None,
            channel_open: true,
        }
    }

    pub fn state(&self) -> FlowState {
        if self.active.is_some() {
            FlowState::AwaitingPopup
        } else {
            FlowState::Idle
        }
    }

    /// Fetch the authorization URL from the backend and open the popup.
    pub async fn begin(&mut self, client: &ApiClient) -> Result<(), LoginError> {
        if self.active.is_some() {
            return Err(LoginError::InProgress);
        }
        let response = client.get_auth_url().await?;
        self.start(response.auth_url.as_deref())
    }

    /// Open the popup on `auth_url` and arm the timeout and poll interval.
    pub fn start(&mut self, auth_url: Option<&str>) -> Result<(), LoginError> {
        if self.active.is_some() {
            return Err(LoginError::InProgress);
        }
        let url = auth_url
            .filter(|url| !url.is_empty())
            .ok_or(LoginError::NoAuthUrl)?;

        self.discard_stale();

        let features = PopupFeatures::centered(
            &self.settings.parent,
            self.settings.popup_width,
            self.settings.popup_height,
        );
        let popup = self
            .opener
            .open(url, POPUP_NAME, &features)
            .ok_or(LoginError::PopupBlocked)?;

        let poll_interval = self.settings.poll_interval.max(MIN_POLL_INTERVAL);
        let mut poll = interval_at(Instant::now() + poll_interval, poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.active = Some(ActiveLogin {
            popup,
            timeout: Box::pin(sleep(self.settings.timeout)),
            poll,
        });
        tracing::info!("Waiting for authentication in login window");
        Ok(())
    }

    /// Drop messages queued before the current flow started. Returns how
    /// many were dropped.
    pub fn discard_stale(&mut self) -> usize {
        let mut dropped = 0;
        while self.listener.try_recv().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!("Discarded {} stale auth message(s)", dropped);
        }
        dropped
    }

    /// Wait for the flow to resolve. Returns `None` if no login is in
    /// progress.
    pub async fn run(&mut self) -> Result<Option<LoginOutcome>, LoginError> {
        while let Some(event) = self.next_event().await {
            if let Some(outcome) = self.dispatch(event)? {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    async fn next_event(&mut self) -> Option<FlowEvent> {
        let channel_open = self.channel_open;
        let active = self.active.as_mut()?;
        let listener = &mut self.listener;

        let event = tokio::select! {
            message = listener.recv(), if channel_open => match message {
                Some(message) => FlowEvent::Message(message),
                None => FlowEvent::ChannelClosed,
            },
            _ = active.timeout.as_mut() => FlowEvent::Timeout,
            _ = active.poll.tick() => FlowEvent::Poll,
        };
        Some(event)
    }

    /// Apply one event. Returns the outcome if the event resolved the flow.
    pub fn dispatch(&mut self, event: FlowEvent) -> Result<Option<LoginOutcome>, LoginError> {
        if event == FlowEvent::ChannelClosed {
            self.channel_open = false;
            return Ok(None);
        }
        if self.active.is_none() {
            if let FlowEvent::Message(_) = event {
                tracing::debug!("Ignoring auth message: no login in progress");
            }
            return Ok(None);
        }

        match event {
            FlowEvent::Message(AuthMessage::Success { token, user }) => {
                if token.is_empty() {
                    tracing::warn!("Ignoring success message without a token");
                    return Ok(None);
                }
                self.release(true);
                self.session.login(&token, user.clone())?;
                tracing::info!("Authentication successful via window message");
                Ok(Some(LoginOutcome::Success(Session { token, user })))
            }
            FlowEvent::Message(AuthMessage::Error { error }) => {
                let message = error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
                tracing::error!("Authentication error: {}", message);
                self.release(true);
                Ok(Some(LoginOutcome::Failed(message)))
            }
            FlowEvent::Timeout => {
                tracing::warn!("Authentication timed out");
                self.release(true);
                Ok(Some(LoginOutcome::TimedOut))
            }
            FlowEvent::Poll => {
                let closed = self
                    .active
                    .as_ref()
                    .is_some_and(|active| active.popup.is_closed());
                if !closed {
                    return Ok(None);
                }
                tracing::info!("Login window closed before authentication completed");
                self.release(false);
                Ok(Some(LoginOutcome::Cancelled))
            }
            FlowEvent::ChannelClosed => Ok(None),
        }
    }

    /// Drop the popup handle, the timeout and the poll interval together.
    fn release(&mut self, close_popup: bool) {
        if let Some(mut active) = self.active.take() {
            if close_popup && !active.popup.is_closed() {
                active.popup.close();
            }
        }
    }
}

impl<O: PopupOpener> Drop for LoginFlow<O> {
    fn drop(&mut self) {
        self.release(true);
    }
}
