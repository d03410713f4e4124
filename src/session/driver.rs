//! Session driver: owns the transport and runs the connection state machine

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::pool::FrameJob;
use super::status::{Counters, SessionStatus};
use crate::OverlayError;
use crate::config::ReconnectPolicy;
use crate::protocol::{SubscribeMessage, decode_frame};
use crate::transport::{LinkEvent, Transport};
use crate::types::SessionState;

/// What the run loop should do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Keep reading link events.
    Continue,
    /// The connect attempt failed; treat it like a link close.
    Reconnect,
    /// The session is over.
    Stop,
}

/// Drives one logical connection to the device
///
/// State machine:
///
/// ```text
/// Disconnected --start--> Connecting --connect ok + subscribe sent--> Subscribed
/// Subscribed   --message--> Subscribed          (frame queued for the pool)
/// Subscribed/Connecting --closed--> Connecting  (connect + subscribe again)
/// ClosingRequested --closed--> Disconnected     (terminal)
/// ```
///
/// Link errors are logged and otherwise ignored; only the close that follows
/// them triggers a reconnect. Unreadable messages count as malformed frames.
pub(crate) struct SessionDriver<T: Transport> {
    transport: T,
    subscribe: SubscribeMessage,
    reconnect: ReconnectPolicy,
    status: Arc<SessionStatus>,
    jobs: mpsc::Sender<FrameJob>,
    cancel: CancellationToken,
    /// Arrival counter for inbound messages
    sequence: u64,
    /// Consecutive failed connect attempts
    failures: u32,
}

impl<T: Transport> SessionDriver<T> {
    pub(crate) fn new(
        transport: T,
        subscribe: SubscribeMessage,
        reconnect: ReconnectPolicy,
        status: Arc<SessionStatus>,
        jobs: mpsc::Sender<FrameJob>,
        cancel: CancellationToken,
    ) -> Self {
        Self { transport, subscribe, reconnect, status, jobs, cancel, sequence: 0, failures: 0 }
    }

    /// Run until shutdown completes or the session is cancelled.
    pub(crate) async fn run(mut self) {
        let endpoint = self.transport.endpoint();
        info!(endpoint = %endpoint, event_id = self.subscribe.event_id(), "Session driver started");

        let mut step = self.open().await;
        loop {
            step = match step {
                Step::Stop => break,
                Step::Reconnect => self.on_link_closed("connect attempt failed").await,
                Step::Continue => {
                    let event = tokio::select! {
                        _ = self.cancel.cancelled() => {
                            info!("Session cancelled");
                            break;
                        }
                        event = self.transport.next_event() => event,
                    };
                    self.handle(event).await
                }
            };
        }

        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "Error while closing link");
        }
        self.status.transition(SessionState::Disconnected);

        let stats = self.status.counters.snapshot();
        info!(
            endpoint = %endpoint,
            frames = stats.frames_received,
            reconnects = stats.reconnects,
            "Session driver ended"
        );
    }

    /// Handle one link event.
    pub(crate) async fn handle(&mut self, event: LinkEvent) -> Step {
        match event {
            LinkEvent::Message(text) => {
                self.dispatch(&text);
                Step::Continue
            }
            LinkEvent::Ping => {
                trace!("Ping");
                Step::Continue
            }
            LinkEvent::Error(e) => {
                error!(endpoint = %self.transport.endpoint(), error = %e, "Link error");
                Step::Continue
            }
            LinkEvent::Malformed(e) => {
                if let Some(sequence) = self.accept_message() {
                    Counters::bump(&self.status.counters.frames_malformed);
                    warn!(sequence, error = %e, "Dropping unreadable frame");
                }
                Step::Continue
            }
            LinkEvent::Closed { reason } => self.on_link_closed(&reason).await,
        }
    }

    /// Connect and subscribe, honoring the reconnect policy's delay.
    pub(crate) async fn open(&mut self) -> Step {
        if self.failures > 0 {
            if let Some(delay) = self.reconnect.delay(self.failures) {
                debug!(?delay, attempt = self.failures, "Delaying reconnect");
                tokio::select! {
                    _ = self.cancel.cancelled() => return Step::Stop,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        self.status.transition(SessionState::Connecting);
        let attempt = Counters::bump(&self.status.counters.connect_attempts);

        let connected = tokio::select! {
            _ = self.cancel.cancelled() => return Step::Stop,
            result = self.transport.connect() => result,
        };
        if let Err(e) = connected {
            self.failures = self.failures.saturating_add(1);
            warn!(attempt, failures = self.failures, error = %e, "Connect failed");
            // Immediate reconnects still let other tasks run between attempts.
            tokio::task::yield_now().await;
            return Step::Reconnect;
        }
        self.failures = 0;

        let message = match self.subscribe.to_json() {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Failed to encode subscribe message");
                return Step::Continue;
            }
        };
        debug!(message = %message, "Sending subscribe message");
        match self.transport.send(message).await {
            Ok(()) => {
                let state = self.status.transition(SessionState::Subscribed);
                info!(event_id = self.subscribe.event_id(), attempt, state = %state, "Subscribed");
            }
            Err(e) => {
                // Stay in Connecting; the close that follows drives the reconnect.
                error!(error = %e, "Failed to send subscribe message");
            }
        }
        Step::Continue
    }

    async fn on_link_closed(&mut self, reason: &str) -> Step {
        let closed = OverlayError::link_closed(reason);
        if self.status.shutdown_requested() {
            info!(error = %closed, "Shutdown requested, not reconnecting");
            self.status.transition(SessionState::Disconnected);
            return Step::Stop;
        }

        let reconnects = Counters::bump(&self.status.counters.reconnects);
        info!(error = %closed, reconnects, retryable = closed.is_retryable(), "Reconnecting");
        self.open().await
    }

    /// Number an inbound message. `None` when it arrived before subscription.
    fn accept_message(&mut self) -> Option<u64> {
        self.sequence += 1;
        let sequence = self.sequence;
        Counters::bump(&self.status.counters.frames_received);

        if !self.status.state().dispatches_frames() {
            debug!(sequence, "Ignoring message received before subscription");
            return None;
        }
        Some(sequence)
    }

    /// Parse a message on the receive path and queue it for the pool.
    fn dispatch(&mut self, text: &str) {
        let Some(sequence) = self.accept_message() else { return };

        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                Counters::bump(&self.status.counters.frames_malformed);
                warn!(sequence, error = %e, "Dropping malformed frame");
                return;
            }
        };

        match self.jobs.try_send(FrameJob { sequence, frame }) {
            Ok(()) => trace!(sequence, "Frame queued"),
            Err(TrySendError::Full(job)) => {
                Counters::bump(&self.status.counters.frames_dropped);
                warn!(sequence = job.sequence, "Transform workers saturated, dropping frame");
            }
            Err(TrySendError::Closed(job)) => {
                Counters::bump(&self.status.counters.frames_dropped);
                debug!(sequence = job.sequence, "Transform pool stopped, dropping frame");
            }
        }
    }
}
