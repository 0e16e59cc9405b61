//! Single-slot pending message for the presentation layer.

use parking_lot::Mutex;

/// Fallback text when an error carries no message.
const UNKNOWN_ERROR: &str = "Unknown error";

/// Holds at most one unread message. A new message replaces an unread one.
#[derive(Debug, Default)]
pub struct Notification {
    slot: Mutex<Option<String>>,
}

impl Notification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pending message, overwriting any unread one.
    pub fn raise(&self, message: impl Into<String>) -> String {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = UNKNOWN_ERROR.to_string();
        }
        *self.slot.lock() = Some(message.clone());
        message
    }

    /// Current pending message, if any.
    pub fn pending(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    /// Clear the slot after the message was shown. Returns what was cleared.
    pub fn acknowledge(&self) -> Option<String> {
        self.slot.lock().take()
    }
}
