//! Worker pool running frame transforms off the receive path

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::status::{Counters, SessionStatus};
use crate::protocol::DecodedFrame;
use crate::transform::FrameTransform;
use crate::types::IntensityFrame;

/// A parsed frame queued for transformation.
#[derive(Debug)]
pub(crate) struct FrameJob {
    pub sequence: u64,
    pub frame: DecodedFrame,
}

pub(crate) type FrameSender = Arc<watch::Sender<Option<Arc<IntensityFrame>>>>;

/// Consumes queued frames and runs up to `workers` transforms at once on the
/// blocking thread pool.
///
/// Finished matrices are published in completion order, which may differ
/// from arrival order under load. Transforms already running when the queue
/// closes are allowed to finish before the pool task ends.
pub(crate) struct TransformPool;

impl TransformPool {
    pub(crate) fn spawn(
        jobs: mpsc::Receiver<FrameJob>,
        transform: FrameTransform,
        workers: usize,
        output: FrameSender,
        status: Arc<SessionStatus>,
    ) -> JoinHandle<()> {
        tokio::spawn(Self::dispatch(jobs, transform, workers.max(1), output, status))
    }

    async fn dispatch(
        mut jobs: mpsc::Receiver<FrameJob>,
        transform: FrameTransform,
        workers: usize,
        output: FrameSender,
        status: Arc<SessionStatus>,
    ) {
        info!(workers, target = ?transform.target(), "Transform pool started");
        let permits = Arc::new(Semaphore::new(workers));

        while let Some(job) = jobs.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let transform = transform.clone();
            let output = Arc::clone(&output);
            let status = Arc::clone(&status);

            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                Self::run_job(job, &transform, &output, &status);
            });
        }

        // Wait for in-flight transforms
        if permits.acquire_many(workers as u32).await.is_err() {
            debug!("Transform pool semaphore closed while draining");
        }
        info!("Transform pool stopped");
    }

    fn run_job(
        job: FrameJob,
        transform: &FrameTransform,
        output: &FrameSender,
        status: &SessionStatus,
    ) {
        let FrameJob { sequence, frame } = job;

        match transform.apply(&frame.raw, frame.gain) {
            Ok(matrix) => {
                Counters::bump(&status.counters.frames_rendered);
                trace!(
                    sequence,
                    event_id = frame.event_id,
                    nonzero = matrix.count_nonzero(),
                    "Frame rendered"
                );
                output.send_replace(Some(Arc::new(IntensityFrame {
                    event_id: frame.event_id,
                    sequence,
                    gain: frame.gain.0,
                    matrix,
                })));
            }
            Err(e) => {
                Counters::bump(&status.counters.transform_failures);
                warn!(sequence, event_id = frame.event_id, error = %e, "Frame transform failed");
            }
        }
    }
}
