//! Visualization tunables shared between the owning process and transform workers

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Thresholds applied during dynamic windowing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationParams {
    /// Absolute floor in dB; anything below renders as zero.
    pub threshold_db: f32,
    /// Width of the window kept below the frame peak, in dB.
    pub range_db: f32,
}

impl VisualizationParams {
    pub const DEFAULT_THRESHOLD_DB: f32 = 40.0;
    pub const DEFAULT_RANGE_DB: f32 = 3.0;

    pub fn new(threshold_db: f32, range_db: f32) -> Self {
        Self { threshold_db, range_db }
    }
}

impl Default for VisualizationParams {
    fn default() -> Self {
        Self { threshold_db: Self::DEFAULT_THRESHOLD_DB, range_db: Self::DEFAULT_RANGE_DB }
    }
}

/// Shared, reconfigurable [`VisualizationParams`].
///
/// Both values live behind a single watch channel, so a worker's
/// [`snapshot`](Self::snapshot) always sees a pair written by one update and
/// never a threshold from one write mixed with a range from another.
#[derive(Debug, Clone)]
pub struct ParamsHandle {
    tx: Arc<watch::Sender<VisualizationParams>>,
}

impl ParamsHandle {
    pub fn new(initial: VisualizationParams) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Consistent copy of the current parameters.
    pub fn snapshot(&self) -> VisualizationParams {
        *self.tx.borrow()
    }

    /// Replace both parameters at once.
    pub fn set(&self, params: VisualizationParams) {
        self.tx.send_replace(params);
    }

    pub fn set_threshold(&self, threshold_db: f32) {
        self.tx.send_modify(|p| p.threshold_db = threshold_db);
    }

    pub fn set_range(&self, range_db: f32) {
        self.tx.send_modify(|p| p.range_db = range_db);
    }

    /// Receiver notified on every parameter change.
    pub fn watch(&self) -> watch::Receiver<VisualizationParams> {
        self.tx.subscribe()
    }
}

impl Default for ParamsHandle {
    fn default() -> Self {
        Self::new(VisualizationParams::default())
    }
}
