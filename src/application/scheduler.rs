//! Segment scheduler
//!
//! Runs exactly one capture segment: acquires the device, streams frames into
//! the segment's sink until the timer fires, releases the device, finalizes
//! the artifact, signals completion and hands the artifact to delivery.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::delivery::DeliveryClient;
use super::jobs::{JobReport, JobSpawner};
use super::ports::{
    ArtifactError, ArtifactStore, AudioSource, AudioSourceError, CaptureStream, SegmentSink,
};
use crate::domain::recording::Duration;
use crate::domain::session::{CaptureSession, InvalidStateTransition, SessionState};

/// Errors that keep a segment from starting
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Audio device unavailable: {0}")]
    Device(#[from] AudioSourceError),

    #[error("Cannot create artifact: {0}")]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),

    #[error("Device task failed: {0}")]
    Join(String),
}

/// Timing shared by every segment of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentTiming {
    /// How long each segment captures
    pub segment: Duration,
    /// Pause after releasing the device before the next segment may acquire it
    pub settle: Duration,
}

impl Default for SegmentTiming {
    fn default() -> Self {
        Self {
            segment: Duration::default_segment(),
            settle: Duration::default_settle(),
        }
    }
}

/// Completion signal emitted once a segment has released the device and
/// finalized its artifact (successfully or not)
#[derive(Debug, Clone)]
pub struct SegmentCompletion {
    pub index: u64,
    pub artifact: PathBuf,
    /// `Delivering` when the artifact was handed off, `Failed` otherwise
    pub state: SessionState,
    pub failure: Option<String>,
    /// Audio bytes written to the artifact
    pub captured_bytes: u64,
}

/// Owns one segment's lifecycle
pub struct SegmentScheduler {
    session: CaptureSession,
    source: Arc<dyn AudioSource>,
    artifacts: Arc<dyn ArtifactStore>,
    delivery: Arc<DeliveryClient>,
    jobs: JobSpawner,
    timing: SegmentTiming,
}

impl SegmentScheduler {
    pub fn new(
        session: CaptureSession,
        source: Arc<dyn AudioSource>,
        artifacts: Arc<dyn ArtifactStore>,
        delivery: Arc<DeliveryClient>,
        jobs: JobSpawner,
        timing: SegmentTiming,
    ) -> Self {
        Self {
            session,
            source,
            artifacts,
            delivery,
            jobs,
            timing,
        }
    }

    /// Acquire the device, start capturing and arm the segment timer.
    ///
    /// Returns the receiver of this segment's completion signal. Failing to
    /// acquire the device or create the artifact is an error for the caller.
    pub async fn start(mut self) -> Result<oneshot::Receiver<SegmentCompletion>, SchedulerError> {
        let index = self.session.index();
        self.session.start_recording()?;

        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        // Owned by the capture stream; dropped when the stream is closed
        let on_frame = Box::new(move |bytes: &[u8]| {
            let _ = frame_tx.send(bytes.to_vec());
        });

        let source = Arc::clone(&self.source);
        let format = self.session.format();
        let opened = tokio::task::spawn_blocking(move || source.open(format, on_frame))
            .await
            .map_err(|e| SchedulerError::Join(e.to_string()))
            .and_then(|result| result.map_err(SchedulerError::from));
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                error!(segment = index, "failed to acquire audio device: {}", e);
                let _ = self.session.fail(e.to_string());
                return Err(e);
            }
        };

        let sink = match self
            .artifacts
            .create(self.session.artifact_path(), format)
        {
            Ok(sink) => sink,
            Err(e) => {
                error!(segment = index, "failed to create artifact: {}", e);
                if let Err(close_err) = release(stream).await {
                    warn!(segment = index, "device release failed: {}", close_err);
                }
                let _ = self.session.fail(e.to_string());
                return Err(e.into());
            }
        };

        info!(
            segment = index,
            artifact = %self.session.artifact_path().display(),
            duration = %self.timing.segment,
            "recording started"
        );

        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(self.capture(stream, sink, frame_rx, done_tx));
        Ok(done_rx)
    }

    /// Frame pump plus the timer-expiry sequence
    async fn capture(
        mut self,
        stream: Box<dyn CaptureStream>,
        mut sink: Box<dyn SegmentSink>,
        mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
        done: oneshot::Sender<SegmentCompletion>,
    ) {
        let index = self.session.index();
        let mut write_error: Option<ArtifactError> = None;

        let timer = tokio::time::sleep(self.timing.segment.as_std());
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => break,
                chunk = frames.recv() => match chunk {
                    Some(bytes) => append(sink.as_mut(), &bytes, &mut write_error, index),
                    None => {
                        warn!(segment = index, "device stopped delivering frames early");
                        break;
                    }
                },
            }
        }

        // Timer expired: stop and release the device. Closing drops the frame
        // callback, so nothing new can arrive after this point.
        if let Err(e) = release(stream).await {
            warn!(segment = index, "device release failed: {}", e);
        }
        while let Ok(bytes) = frames.try_recv() {
            append(sink.as_mut(), &bytes, &mut write_error, index);
        }
        debug!(segment = index, "device released");

        transition(&mut self.session, CaptureSession::begin_finalize);
        let finalized = match (write_error, sink.finalize()) {
            (Some(e), _) | (None, Err(e)) => Err(e),
            (None, Ok(())) => Ok(()),
        };
        let captured_bytes = sink.data_len();
        drop(sink);

        match &finalized {
            Ok(()) => info!(segment = index, bytes = captured_bytes, "segment finalized"),
            Err(e) => {
                error!(segment = index, "segment artifact is unusable: {}", e);
                let reason = e.to_string();
                transition(&mut self.session, |s| s.fail(reason));
            }
        }

        // Let the driver finish releasing before the next segment reacquires
        tokio::time::sleep(self.timing.settle.as_std()).await;

        if finalized.is_ok() {
            transition(&mut self.session, CaptureSession::begin_delivery);
        }

        let completion = SegmentCompletion {
            index,
            artifact: self.session.artifact_path().to_path_buf(),
            state: self.session.state(),
            failure: self.session.failure().map(str::to_string),
            captured_bytes,
        };
        if done.send(completion).is_err() {
            warn!(segment = index, "nobody is waiting for the completion signal");
        }

        if finalized.is_ok() {
            self.spawn_delivery();
        }
    }

    fn spawn_delivery(self) {
        let Self {
            mut session,
            delivery,
            jobs,
            ..
        } = self;
        let index = session.index();
        let label = format!("deliver segment {}", index);

        jobs.spawn(label, Some(index), async move {
            let artifact = session.artifact_path().to_path_buf();
            let result = delivery.deliver(index, &artifact).await;
            match &result {
                Ok(_) => transition(&mut session, CaptureSession::complete),
                Err(e) => {
                    let reason = e.to_string();
                    transition(&mut session, |s| s.fail(reason));
                }
            }
            info!(segment = index, state = %session.state(), "segment done");
            JobReport::Delivery {
                segment: index,
                result,
            }
        });
    }
}

async fn release(stream: Box<dyn CaptureStream>) -> Result<(), AudioSourceError> {
    tokio::task::spawn_blocking(move || stream.close())
        .await
        .map_err(|e| AudioSourceError::CloseFailed(e.to_string()))?
}

fn append(
    sink: &mut dyn SegmentSink,
    bytes: &[u8],
    write_error: &mut Option<ArtifactError>,
    index: u64,
) {
    // After the first failure keep draining frames but stop writing
    if write_error.is_some() {
        return;
    }
    if let Err(e) = sink.append(bytes) {
        error!(segment = index, "write failed: {}", e);
        *write_error = Some(e);
    }
}

fn transition<F>(session: &mut CaptureSession, step: F)
where
    F: FnOnce(&mut CaptureSession) -> Result<(), InvalidStateTransition>,
{
    let from = session.state();
    match step(session) {
        Ok(()) => debug!(
            segment = session.index(),
            "state {} -> {}",
            from,
            session.state()
        ),
        Err(e) => warn!("{}", e),
    }
}
