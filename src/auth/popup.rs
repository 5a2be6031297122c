//! Login popup windows.
//!
//! The flow only needs to open a window, ask whether it is still open and
//! close it. [`SystemBrowser`] implements that on top of the user's default
//! browser: the window counts as closed once the callback page closes
//! itself or the user aborts from the terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Name given to the login window.
pub const POPUP_NAME: &str = "google-auth";

/// A window opened by the login flow.
pub trait Popup: Send {
    fn is_closed(&self) -> bool;
    fn close(&mut self);
}

/// Something that can open login windows. `None` means the window was
/// refused (blocked).
pub trait PopupOpener {
    fn open(&self, url: &str, name: &str, features: &PopupFeatures) -> Option<Box<dyn Popup>>;
}

/// Position and size of the parent window, in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub screen_x: i32,
    pub screen_y: i32,
    pub outer_width: u32,
    pub outer_height: u32,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            screen_x: 0,
            screen_y: 0,
            outer_width: 1280,
            outer_height: 800,
        }
    }
}

/// Fixed-size popup placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
}

impl PopupFeatures {
    /// Center a `width` x `height` popup over `parent`.
    pub fn centered(parent: &WindowGeometry, width: u32, height: u32) -> Self {
        let left = parent.screen_x + (parent.outer_width as i32 - width as i32) / 2;
        let top = parent.screen_y + (parent.outer_height as i32 - height as i32) / 2;
        Self {
            width,
            height,
            left,
            top,
        }
    }

    /// `window.open` feature string.
    pub fn to_feature_string(&self) -> String {
        format!(
            "width={},height={},left={},top={},popup=yes",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Shared open/closed flag of a window.
///
/// Clones observe and control the same window, so the callback page can
/// close the window the flow is polling.
#[derive(Debug, Clone, Default)]
pub struct WindowHandle {
    closed: Arc<AtomicBool>,
}

impl WindowHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Popup for WindowHandle {
    fn is_closed(&self) -> bool {
        WindowHandle::is_closed(self)
    }

    fn close(&mut self) {
        WindowHandle::close(self)
    }
}

/// Opens login windows in the user's default browser.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser {
    window: WindowHandle,
}

impl SystemBrowser {
    pub fn new(window: WindowHandle) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &WindowHandle {
        &self.window
    }
}

impl PopupOpener for SystemBrowser {
    fn open(&self, url: &str, name: &str, features: &PopupFeatures) -> Option<Box<dyn Popup>> {
        tracing::debug!(name, features = %features.to_feature_string(), "opening login window");
        match open::that(url) {
            Ok(()) => Some(Box::new(self.window.clone())),
            Err(e) => {
                tracing::warn!("Failed to open browser: {}", e);
                None
            }
        }
    }
}
