//! JSON wire messages exchanged with the device.
//!
//! Inbound beamforming messages look like
//! `{"event_id": 0, "gain": 2, "bf": [ ...1200 floats... ]}` and outbound
//! subscriptions like `{"type": "subscribe", "id": 0}`.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::{Gain, RawFrame};
use crate::{OverlayError, Result};

/// Inbound beamforming message as sent by the device.
///
/// All three fields are required; unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameMessage {
    pub event_id: i32,
    pub gain: i32,
    #[serde(rename = "bf")]
    pub samples: Vec<f32>,
}

impl FrameMessage {
    /// Parse a message body.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate the sample count and split the message into its parts.
    pub fn into_frame(self) -> Result<DecodedFrame> {
        let raw = RawFrame::new(self.samples)?;
        Ok(DecodedFrame { event_id: self.event_id, gain: Gain(self.gain), raw })
    }
}

/// A validated inbound frame ready for transformation.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub event_id: i32,
    pub gain: Gain,
    pub raw: RawFrame,
}

/// Parse and validate one inbound message.
///
/// Any missing field or a sample array of the wrong length yields
/// [`OverlayError::MalformedFrame`].
pub fn decode_frame(text: &str) -> Result<DecodedFrame> {
    let message = FrameMessage::from_json(text)?;
    trace!(
        event_id = message.event_id,
        gain = message.gain,
        samples = message.samples.len(),
        "Decoded frame message"
    );
    message.into_frame()
}

/// Outbound subscription request for one device event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscribeMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    id: i32,
}

impl SubscribeMessage {
    pub fn new(event_id: i32) -> Self {
        Self { kind: "subscribe", id: event_id }
    }

    pub fn event_id(&self) -> i32 {
        self.id
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| OverlayError::Encode {
            context: "subscribe message".to_string(),
            source,
        })
    }
}
