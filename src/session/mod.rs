//! Long-lived streaming session against a beamforming device.
//!
//! A [`StreamSession`] spawns two tasks on the current tokio runtime:
//!
//! - the **driver** owns the [`Transport`], connects, subscribes, parses
//!   inbound frames and reconnects whenever the link closes
//! - the **transform pool** receives parsed frames over a bounded channel and
//!   runs [`FrameTransform`] on the blocking thread pool, so slow matrix work
//!   never delays the next network message
//!
//! Finished matrices are published on a latest-wins watch channel and exposed
//! as a stream through [`StreamSession::subscribe`].

mod driver;
mod pool;
mod status;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::protocol::SubscribeMessage;
use crate::stream::ThrottleExt;
use crate::transform::FrameTransform;
use crate::transport::Transport;
use crate::transports::WebSocketTransport;
use crate::types::{IntensityFrame, ParamsHandle, SessionState, UpdateRate};
use crate::{OverlayError, Result};

use driver::SessionDriver;
use pool::TransformPool;
use status::SessionStatus;

pub use status::SessionStats;

/// Owned handle to a running session.
///
/// Dropping the handle cancels the session.
pub struct StreamSession {
    /// State, shutdown flag and counters
    status: Arc<SessionStatus>,

    /// Windowing parameters shared with the workers
    params: ParamsHandle,

    /// Latest finished matrix
    frames: watch::Receiver<Option<Arc<IntensityFrame>>>,

    /// Cancellation token for stopping the driver
    cancel: CancellationToken,

    driver: Option<JoinHandle<()>>,
    pool: Option<JoinHandle<()>>,
    endpoint: String,
}

impl StreamSession {
    /// Start a session over WebSocket using `config`.
    ///
    /// Must be called from within a tokio runtime. Returns immediately; the
    /// connection is established in the background and retried until it
    /// succeeds or the session is shut down.
    pub fn start(config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        Self::start_with_transport(WebSocketTransport::from_config(config), config)
    }

    /// Start a session over a custom transport.
    ///
    /// Device address and credentials in `config` are ignored; the transport
    /// carries its own.
    pub fn start_with_transport<T: Transport>(
        transport: T,
        config: &SessionConfig,
    ) -> Result<Self> {
        config.validate_pipeline()?;

        let endpoint = transport.endpoint();
        let params = ParamsHandle::new(config.visualization);
        let transform = FrameTransform::new(config.target, params.clone())?;
        let status = SessionStatus::new();

        let (jobs_tx, jobs_rx) = mpsc::channel(config.queue_capacity);
        let (frame_tx, frame_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let pool = TransformPool::spawn(
            jobs_rx,
            transform,
            config.workers,
            Arc::new(frame_tx),
            Arc::clone(&status),
        );

        let driver = SessionDriver::new(
            transport,
            SubscribeMessage::new(config.event_id),
            config.reconnect,
            Arc::clone(&status),
            jobs_tx,
            cancel.clone(),
        );
        let driver = tokio::spawn(driver.run());

        info!(
            endpoint = %endpoint,
            event_id = config.event_id,
            target = ?config.target,
            "Stream session started"
        );

        Ok(Self {
            status,
            params,
            frames: frame_rx,
            cancel,
            driver: Some(driver),
            pool: Some(pool),
            endpoint,
        })
    }

    /// Stop reconnecting once the current link closes.
    ///
    /// The link itself stays open and frames keep flowing until the device
    /// or the network closes it. Transforms already running complete.
    pub fn request_shutdown(&self) {
        if self.status.request_shutdown() {
            info!(endpoint = %self.endpoint, "Shutdown requested, session ends at next link close");
        }
    }

    /// Request shutdown and close the link now.
    pub fn close(&self) {
        self.request_shutdown();
        self.cancel.cancel();
    }

    /// Wait for the driver and the transform pool to finish.
    pub async fn join(mut self) -> Result<()> {
        if let Some(driver) = self.driver.take() {
            driver
                .await
                .map_err(|source| OverlayError::Task { task: "session driver", source })?;
        }
        if let Some(pool) = self.pool.take() {
            pool.await.map_err(|source| OverlayError::Task { task: "transform pool", source })?;
        }
        Ok(())
    }

    /// Subscribe to finished matrices.
    ///
    /// The stream yields the latest matrix (if any) immediately, then each
    /// new one; a subscriber slower than the frame rate sees the newest frame
    /// rather than a backlog. The stream ends when the session does.
    pub fn subscribe(
        &self,
        rate: UpdateRate,
    ) -> impl Stream<Item = Arc<IntensityFrame>> + Send + Unpin + 'static {
        let frames = WatchStream::new(self.frames.clone()).filter_map(|opt| async move { opt });

        match rate.throttle_interval() {
            None => frames.boxed(),
            Some(interval) => frames.throttle(interval).boxed(),
        }
    }

    /// Latest finished matrix, if any.
    pub fn latest(&self) -> Option<Arc<IntensityFrame>> {
        self.frames.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    /// Stream of state changes, starting with the current state.
    pub fn state_updates(&self) -> impl Stream<Item = SessionState> + Send + Unpin + 'static {
        WatchStream::new(self.status.watch())
    }

    /// Windowing parameters, adjustable at any time between frames.
    pub fn params(&self) -> &ParamsHandle {
        &self.params
    }

    pub fn stats(&self) -> SessionStats {
        self.status.counters.snapshot()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.status.shutdown_requested()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        debug!("Dropping stream session");
        // Cancel tasks on drop for clean shutdown
        self.cancel.cancel();
    }
}
