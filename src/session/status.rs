//! Shared session state and counters

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::watch;

use crate::types::SessionState;

/// State, shutdown flag and counters shared by the session handle, the
/// driver task and the transform workers.
#[derive(Debug)]
pub(crate) struct SessionStatus {
    state: watch::Sender<SessionState>,
    shutdown: AtomicBool,
    pub(crate) counters: Counters,
}

impl SessionStatus {
    pub(crate) fn new() -> Arc<Self> {
        let (state, _rx) = watch::channel(SessionState::Disconnected);
        Arc::new(Self { state, shutdown: AtomicBool::new(false), counters: Counters::default() })
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Set the shutdown flag. Returns `true` for the first request.
    ///
    /// The flag is never cleared. A live session moves to `ClosingRequested`;
    /// a session that already reached `Disconnected` stays there.
    pub(crate) fn request_shutdown(&self) -> bool {
        let mut first = false;
        self.state.send_modify(|state| {
            first = !self.shutdown.swap(true, Ordering::SeqCst);
            if !state.is_terminal() {
                *state = SessionState::ClosingRequested;
            }
        });
        first
    }

    /// Move to `next`, returning the state actually stored.
    ///
    /// Once shutdown is requested every transition except the final
    /// `Disconnected` is pinned to `ClosingRequested`. Flag and state are
    /// updated under the same watch lock so a concurrent shutdown request
    /// cannot be overwritten.
    pub(crate) fn transition(&self, next: SessionState) -> SessionState {
        let mut stored = next;
        self.state.send_modify(|state| {
            stored = if !next.is_terminal() && self.shutdown_requested() {
                SessionState::ClosingRequested
            } else {
                next
            };
            *state = stored;
        });
        stored
    }
}

/// Monotonic session counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) frames_received: AtomicU64,
    pub(crate) frames_rendered: AtomicU64,
    pub(crate) frames_malformed: AtomicU64,
    pub(crate) frames_dropped: AtomicU64,
    pub(crate) transform_failures: AtomicU64,
    pub(crate) connect_attempts: AtomicU64,
    pub(crate) reconnects: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            transform_failures: self.transform_failures.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Messages received on the link (valid or not).
    pub frames_received: u64,
    /// Matrices published to subscribers.
    pub frames_rendered: u64,
    /// Messages rejected as malformed.
    pub frames_malformed: u64,
    /// Valid frames dropped because every worker was busy.
    pub frames_dropped: u64,
    /// Frames that failed inside the transform.
    pub transform_failures: u64,
    /// Connect attempts, including the first.
    pub connect_attempts: u64,
    /// Reconnects triggered by a link close or a failed attempt.
    pub reconnects: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_pins_state_until_disconnected() {
        let status = SessionStatus::new();
        assert_eq!(status.transition(SessionState::Subscribed), SessionState::Subscribed);

        assert!(status.request_shutdown());
        assert!(!status.request_shutdown());
        assert_eq!(status.state(), SessionState::ClosingRequested);

        assert_eq!(status.transition(SessionState::Connecting), SessionState::ClosingRequested);
        assert_eq!(status.transition(SessionState::Subscribed), SessionState::ClosingRequested);
        assert!(status.shutdown_requested());

        assert_eq!(status.transition(SessionState::Disconnected), SessionState::Disconnected);
        status.request_shutdown();
        assert_eq!(status.state(), SessionState::Disconnected);
    }

    #[test]
    fn counters_snapshot() {
        let status = SessionStatus::new();
        Counters::bump(&status.counters.frames_received);
        Counters::bump(&status.counters.frames_received);
        assert_eq!(Counters::bump(&status.counters.reconnects), 1);

        let stats = status.counters.snapshot();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.frames_dropped, 0);
    }
}
