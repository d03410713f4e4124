//! Session lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`StreamSession`](crate::StreamSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No link and no reconnect pending. Terminal once reached after a shutdown request.
    Disconnected,
    /// Link being opened, or opened but not yet subscribed.
    Connecting,
    /// Subscribe message sent; frames are being dispatched.
    Subscribed,
    /// Shutdown requested; the next link close ends the session.
    ClosingRequested,
}

impl SessionState {
    /// Whether frames received in this state are dispatched to the transform pool.
    pub fn dispatches_frames(self) -> bool {
        matches!(self, SessionState::Subscribed | SessionState::ClosingRequested)
    }

    /// Whether the session driver has stopped in this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Disconnected)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Subscribed => "subscribed",
            SessionState::ClosingRequested => "closing-requested",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_disconnected_is_terminal() {
        assert!(SessionState::Disconnected.is_terminal());
        assert!(!SessionState::Connecting.is_terminal());
        assert!(!SessionState::Subscribed.is_terminal());
        assert!(!SessionState::ClosingRequested.is_terminal());
    }

    #[test]
    fn frames_flow_while_subscribed_or_closing() {
        assert!(SessionState::Subscribed.dispatches_frames());
        assert!(SessionState::ClosingRequested.dispatches_frames());
        assert!(!SessionState::Connecting.dispatches_frames());
        assert_eq!(SessionState::ClosingRequested.to_string(), "closing-requested");
    }
}
