//! Test utilities: scripted transports and frame fixtures
//!
//! Shared by unit tests, integration tests and benchmarks so that none of
//! them needs a real device on the network.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::transport::{LinkEvent, Transport};
use crate::types::{FRAME_COLS, FRAME_LEN};
use crate::{OverlayError, Result};

/// Endpoint reported by [`ScriptedTransport`].
pub const SCRIPTED_ENDPOINT: &str = "scripted://device";

/// Calls made on a [`ScriptedTransport`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Send(String),
    Close,
}

/// In-memory transport whose inbound events are pushed by a test.
///
/// Events are delivered in the order they are pushed. Once the script has
/// nothing left and its handle is dropped, `next_event` never resolves, which
/// keeps the driver parked until it is cancelled.
#[derive(Debug)]
pub struct ScriptedTransport {
    events: mpsc::UnboundedReceiver<LinkEvent>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
    connect_failures: Arc<AtomicUsize>,
    send_failures: Arc<AtomicUsize>,
    connected: bool,
}

/// Test-side handle of a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    events: mpsc::UnboundedSender<LinkEvent>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
    connect_failures: Arc<AtomicUsize>,
    send_failures: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> (Self, ScriptHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let connect_failures = Arc::new(AtomicUsize::new(0));
        let send_failures = Arc::new(AtomicUsize::new(0));

        let transport = Self {
            events: rx,
            calls: Arc::clone(&calls),
            connect_failures: Arc::clone(&connect_failures),
            send_failures: Arc::clone(&send_failures),
            connected: false,
        };
        let handle = ScriptHandle { events: tx, calls, connect_failures, send_failures };
        (transport, handle)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

/// Consume one unit from a failure budget, returning whether one was left.
fn take_failure(budget: &AtomicUsize) -> bool {
    budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.record(TransportCall::Connect);
        if take_failure(&self.connect_failures) {
            return Err(OverlayError::connect_failed(SCRIPTED_ENDPOINT));
        }
        self.connected = true;
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.record(TransportCall::Send(text));
        if take_failure(&self.send_failures) {
            return Err(OverlayError::link_failed("scripted send failure"));
        }
        Ok(())
    }

    async fn next_event(&mut self) -> LinkEvent {
        match self.events.recv().await {
            Some(event) => {
                if matches!(event, LinkEvent::Closed { .. }) {
                    self.connected = false;
                }
                event
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.record(TransportCall::Close);
        self.connected = false;
        Ok(())
    }

    fn endpoint(&self) -> String {
        SCRIPTED_ENDPOINT.to_string()
    }
}

impl ScriptHandle {
    pub fn push(&self, event: LinkEvent) {
        // The transport may already be gone at the end of a test.
        let _ = self.events.send(event);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.push(LinkEvent::Message(text.into()));
    }

    pub fn close(&self, reason: &str) {
        self.push(LinkEvent::Closed { reason: reason.to_string() });
    }

    /// Make the next `count` connect attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` sends fail.
    pub fn fail_next_sends(&self, count: usize) {
        self.send_failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn connect_count(&self) -> usize {
        self.calls().iter().filter(|call| **call == TransportCall::Connect).count()
    }

    /// Poll until `predicate` holds for the recorded calls, or panic after
    /// `timeout`.
    pub async fn wait_for_calls<F>(&self, timeout: Duration, predicate: F) -> Vec<TransportCall>
    where
        F: Fn(&[TransportCall]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let calls = self.calls();
            if predicate(&calls) {
                return calls;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for transport calls, saw {calls:?}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Subscribe message the driver sends for `event_id`.
pub fn subscribe_json(event_id: i32) -> String {
    format!(r#"{{"type":"subscribe","id":{event_id}}}"#)
}

/// Build a device message body.
pub fn frame_json(event_id: i32, gain: i32, samples: &[f32]) -> String {
    serde_json::json!({ "event_id": event_id, "gain": gain, "bf": samples }).to_string()
}

/// Silent frame with a single loud sample at (`row`, `col`).
pub fn peak_samples(row: usize, col: usize, value: f32) -> Vec<f32> {
    let mut samples = vec![0.0; FRAME_LEN];
    samples[row * FRAME_COLS + col] = value;
    samples
}

/// Frame whose level rises smoothly from the top-left corner, as a device
/// pointed at a single off-axis source would report.
pub fn gradient_samples(peak: f32) -> Vec<f32> {
    (0..FRAME_LEN)
        .map(|i| {
            let row = (i / FRAME_COLS) as f32;
            let col = (i % FRAME_COLS) as f32;
            peak * (1.0 + row + col) / 69.0
        })
        .collect()
}
