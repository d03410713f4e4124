//! Transport trait for device links

use crate::{OverlayError, Result};

/// Something that happened on the link.
#[derive(Debug)]
pub enum LinkEvent {
    /// A message body (JSON text).
    Message(String),
    /// Ping/pong keepalive. Acknowledged by the transport, otherwise ignored.
    Ping,
    /// Transport-level failure. Does not by itself end the link; a
    /// [`LinkEvent::Closed`] follows if the link is gone.
    Error(OverlayError),
    /// A message arrived but could not be read as text. Counted and dropped
    /// like any other malformed frame.
    Malformed(OverlayError),
    /// The link is closed.
    Closed { reason: String },
}

/// Trait for links to a beamforming device
///
/// Transports abstract over the wire (WebSocket, in-memory test doubles) and
/// own exactly one connection at a time. The session driver is the only
/// caller and never calls methods concurrently.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Open a new connection, replacing any previous one.
    ///
    /// Credentials are attached before the handshake. No timeout is applied
    /// here; a hung connect lasts until the underlying socket fails.
    async fn connect(&mut self) -> Result<()>;

    /// Send one text message on the open connection.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Wait for the next link event.
    ///
    /// Returns [`LinkEvent::Closed`] once the connection is gone; calling it
    /// again without reconnecting keeps returning `Closed`.
    async fn next_event(&mut self) -> LinkEvent;

    /// Close the connection gracefully. Closing an already closed link is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Human readable endpoint for logs.
    fn endpoint(&self) -> String;
}
