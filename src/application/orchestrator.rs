//! Run orchestration use case
//!
//! Chains capture segments back to back: segment N+1 is created only after
//! segment N has released the device and signalled completion. Deliveries
//! and the store-clearing request run as supervised background jobs and are
//! collected before the run returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use super::delivery::DeliveryClient;
use super::jobs::{JobReport, JobSpawner, JobSupervisor};
use super::ports::{
    ArtifactStore, AudioSource, AudioSourceError, PlaybackError, Player, StoreAdmin,
    TransportError,
};
use super::scheduler::{SchedulerError, SegmentCompletion, SegmentScheduler, SegmentTiming};
use crate::domain::delivery::DeliveryReport;
use crate::domain::recording::{AudioFormat, FormatRange};
use crate::domain::session::{CaptureSession, SessionState};

/// Errors that stop the whole run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Segment count must be at least 1")]
    InvalidSegmentCount,

    #[error("Cannot query audio device: {0}")]
    Capabilities(#[source] AudioSourceError),

    #[error("Audio device reports no usable capture format")]
    NoSupportedFormat,

    #[error("Cannot create output directory {path}: {message}")]
    OutputDir { path: PathBuf, message: String },

    #[error("Segment {index} could not start: {source}")]
    Segment {
        index: u64,
        #[source]
        source: SchedulerError,
    },

    #[error("Segment {0} ended without signalling completion")]
    CompletionLost(u64),
}

/// Settings fixed for the duration of a run
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Directory receiving `sample<index>.wav` artifacts
    pub output_dir: PathBuf,
    pub timing: SegmentTiming,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            timing: SegmentTiming::default(),
        }
    }
}

/// Bookkeeping for one segment of the run
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub index: u64,
    pub artifact: PathBuf,
    pub state: SessionState,
    pub failure: Option<String>,
    /// Audio bytes captured into the artifact
    pub captured_bytes: u64,
    /// Upload attempts made for this segment
    pub attempts: usize,
}

impl From<SegmentCompletion> for SessionRecord {
    fn from(completion: SegmentCompletion) -> Self {
        Self {
            index: completion.index,
            artifact: completion.artifact,
            state: completion.state,
            failure: completion.failure,
            captured_bytes: completion.captured_bytes,
            attempts: 0,
        }
    }
}

/// The run context: current index plus the audit trail of sessions
#[derive(Debug)]
pub struct Run {
    total: u64,
    current_index: u64,
    format: AudioFormat,
    sessions: Vec<SessionRecord>,
}

impl Run {
    pub fn new(total: u64, format: AudioFormat) -> Self {
        Self {
            total,
            current_index: 0,
            format,
            sessions: Vec::new(),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current_index(&self) -> u64 {
        self.current_index
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    pub fn is_finished(&self) -> bool {
        self.current_index >= self.total
    }

    /// Record the completed segment and move on to the next index
    fn advance(&mut self, completion: SegmentCompletion) {
        self.sessions.push(completion.into());
        self.current_index += 1;
    }

    /// Fold a background job's outcome into the session it belongs to
    fn apply(&mut self, report: &JobReport) {
        match report {
            JobReport::Delivery { segment, result } => {
                if let Some(record) = self.session_mut(*segment) {
                    match result {
                        Ok(delivery) => {
                            record.state = SessionState::Completed;
                            record.attempts = delivery.attempt_count();
                        }
                        Err(e) => {
                            record.state = SessionState::Failed;
                            record.failure = Some(e.to_string());
                            record.attempts = e.attempts();
                        }
                    }
                }
            }
            JobReport::Crashed {
                segment: Some(segment),
                reason,
                ..
            } => {
                if let Some(record) = self.session_mut(*segment) {
                    record.state = SessionState::Failed;
                    record.failure = Some(reason.clone());
                }
            }
            JobReport::Crashed { segment: None, .. } | JobReport::StoreCleared(_) => {}
        }
    }

    fn session_mut(&mut self, index: u64) -> Option<&mut SessionRecord> {
        self.sessions.iter_mut().find(|s| s.index == index)
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub format: AudioFormat,
    pub sessions: Vec<SessionRecord>,
    /// Reports of segments whose upload was accepted
    pub deliveries: Vec<DeliveryReport>,
    /// Outcome of the store-clearing request, if one was made
    pub store_cleared: Option<Result<String, TransportError>>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(SessionState::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(SessionState::Failed)
    }

    fn count(&self, state: SessionState) -> usize {
        self.sessions.iter().filter(|s| s.state == state).count()
    }
}

/// Callbacks for progress updates
#[derive(Default)]
#[allow(clippy::type_complexity)]
pub struct RunCallbacks {
    /// Called with (index, total) before a segment acquires the device
    pub on_segment_start: Option<Box<dyn Fn(u64, u64) + Send + Sync>>,
    /// Called when a segment has released the device and finalized
    pub on_segment_complete: Option<Box<dyn Fn(&SegmentCompletion) + Send + Sync>>,
}

/// Drives a full multi-segment run
pub struct Orchestrator {
    source: Arc<dyn AudioSource>,
    artifacts: Arc<dyn ArtifactStore>,
    delivery: Arc<DeliveryClient>,
    player: Arc<dyn Player>,
    store_admin: Option<Arc<dyn StoreAdmin>>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn AudioSource>,
        artifacts: Arc<dyn ArtifactStore>,
        delivery: Arc<DeliveryClient>,
        player: Arc<dyn Player>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            artifacts,
            delivery,
            player,
            store_admin: None,
            settings,
        }
    }

    /// Clear the remote store in the background when the run starts
    pub fn with_store_admin(mut self, admin: Arc<dyn StoreAdmin>) -> Self {
        self.store_admin = Some(admin);
        self
    }

    /// Capture `total` segments while looping `reference` on the output device.
    ///
    /// Returns once the last segment has finalized, playback is stopped and
    /// every background job has reported.
    pub async fn run(
        &self,
        total: u64,
        reference: &Path,
        callbacks: RunCallbacks,
    ) -> Result<RunSummary, RunError> {
        if total == 0 {
            return Err(RunError::InvalidSegmentCount);
        }

        let capabilities = query_capabilities(Arc::clone(&self.source))
            .await
            .map_err(RunError::Capabilities)?;
        let format = AudioFormat::negotiate(&capabilities).ok_or(RunError::NoSupportedFormat)?;
        info!(%format, segments = total, "capture format negotiated");

        let output_dir = &self.settings.output_dir;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| RunError::OutputDir {
                path: output_dir.clone(),
                message: e.to_string(),
            })?;

        let supervisor = JobSupervisor::new();
        if let Some(admin) = &self.store_admin {
            spawn_store_clear(&supervisor.spawner(), Arc::clone(admin));
        }

        let playing = match start_playback(Arc::clone(&self.player), reference).await {
            Ok(()) => {
                info!(reference = %reference.display(), "reference playback started");
                true
            }
            Err(e) => {
                warn!("reference playback unavailable, capturing without it: {}", e);
                false
            }
        };

        let mut run = Run::new(total, format);
        let captured = self.capture_all(&mut run, &supervisor, &callbacks).await;

        if playing {
            match stop_playback(Arc::clone(&self.player)).await {
                Ok(()) => info!("reference playback stopped"),
                Err(e) => warn!("failed to stop reference playback: {}", e),
            }
        }

        // Outstanding uploads still report even when capture was cut short
        let reports = supervisor.wait_all().await;
        captured?;

        let mut deliveries = Vec::new();
        let mut store_cleared = None;
        for report in reports {
            run.apply(&report);
            match report {
                JobReport::Delivery {
                    result: Ok(delivery),
                    ..
                } => deliveries.push(delivery),
                JobReport::StoreCleared(result) => store_cleared = Some(result),
                _ => {}
            }
        }
        deliveries.sort_by_key(|d| d.segment);

        let summary = RunSummary {
            format,
            sessions: run.sessions,
            deliveries,
            store_cleared,
        };
        info!(
            completed = summary.completed(),
            failed = summary.failed(),
            "run finished"
        );
        Ok(summary)
    }

    /// Capture segments one at a time until the run is finished
    async fn capture_all(
        &self,
        run: &mut Run,
        supervisor: &JobSupervisor,
        callbacks: &RunCallbacks,
    ) -> Result<(), RunError> {
        while !run.is_finished() {
            let index = run.current_index();
            if let Some(ref cb) = callbacks.on_segment_start {
                cb(index, run.total());
            }

            let session = CaptureSession::new(index, &self.settings.output_dir, run.format());
            let scheduler = SegmentScheduler::new(
                session,
                Arc::clone(&self.source),
                Arc::clone(&self.artifacts),
                Arc::clone(&self.delivery),
                supervisor.spawner(),
                self.settings.timing,
            );

            let done = scheduler.start().await.map_err(|source| {
                error!(segment = index, "aborting run: {}", source);
                RunError::Segment { index, source }
            })?;
            // The receiver is consumed here, so each signal is handled once
            let completion = done.await.map_err(|_| RunError::CompletionLost(index))?;

            if let Some(ref cb) = callbacks.on_segment_complete {
                cb(&completion);
            }
            run.advance(completion);
        }
        Ok(())
    }
}

fn spawn_store_clear(jobs: &JobSpawner, admin: Arc<dyn StoreAdmin>) {
    jobs.spawn("clear remote store", None, async move {
        let result = admin.clear_all().await;
        match &result {
            Ok(confirmation) => info!(response = %confirmation.trim(), "remote store cleared"),
            Err(e) => warn!("failed to clear remote store: {}", e),
        }
        JobReport::StoreCleared(result)
    });
}

// Blocking device and output-stream calls, run on the blocking pool

async fn query_capabilities(
    source: Arc<dyn AudioSource>,
) -> Result<Vec<FormatRange>, AudioSourceError> {
    tokio::task::spawn_blocking(move || source.capabilities())
        .await
        .map_err(|e| AudioSourceError::Capabilities(e.to_string()))?
}

async fn start_playback(player: Arc<dyn Player>, reference: &Path) -> Result<(), PlaybackError> {
    let reference = reference.to_path_buf();
    tokio::task::spawn_blocking(move || player.play(&reference))
        .await
        .map_err(|e| PlaybackError::PlaybackFailed(e.to_string()))?
}

async fn stop_playback(player: Arc<dyn Player>) -> Result<(), PlaybackError> {
    tokio::task::spawn_blocking(move || player.stop())
        .await
        .map_err(|e| PlaybackError::PlaybackFailed(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{
        DeviceEvent, FakeAudioSource, MemoryArtifactStore, PlayerEvent, RecordingPlayer,
        ScriptedTransport,
    };
    use crate::domain::delivery::UploadMode;
    use crate::domain::recording::Duration;
    use crate::infrastructure::artifact::WavArtifactStore;
    use async_trait::async_trait;

    struct MockStoreAdmin;

    #[async_trait]
    impl StoreAdmin for MockStoreAdmin {
        async fn clear_all(&self) -> Result<String, TransportError> {
            Ok("All files cleared".to_string())
        }
    }

    fn settings(dir: &Path) -> RunSettings {
        RunSettings {
            output_dir: dir.to_path_buf(),
            timing: SegmentTiming {
                segment: Duration::from_millis(40),
                settle: Duration::from_millis(5),
            },
        }
    }

    fn orchestrator(
        dir: &Path,
        source: Arc<FakeAudioSource>,
        transport: Arc<ScriptedTransport>,
        player: Arc<RecordingPlayer>,
    ) -> Orchestrator {
        Orchestrator::new(
            source,
            Arc::new(WavArtifactStore::new()),
            Arc::new(DeliveryClient::new(transport, UploadMode::Digest)),
            player,
            settings(dir),
        )
    }

    #[tokio::test]
    async fn run_creates_exactly_total_sessions_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeAudioSource::new();
        let transport = ScriptedTransport::always_ok();
        let player = RecordingPlayer::new();

        let summary = orchestrator(dir.path(), source.clone(), transport.clone(), player)
            .run(3, Path::new("reference.wav"), RunCallbacks::default())
            .await
            .unwrap();

        let indices: Vec<u64> = summary.sessions.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(summary.completed(), 3);
        assert_eq!(summary.deliveries.len(), 3);
        assert_eq!(transport.calls(), 3);
        for session in &summary.sessions {
            assert!(session.artifact.exists());
            assert_eq!(session.attempts, 1);
        }
    }

    #[tokio::test]
    async fn device_is_never_held_by_two_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeAudioSource::new();

        orchestrator(
            dir.path(),
            source.clone(),
            ScriptedTransport::always_ok(),
            RecordingPlayer::new(),
        )
        .run(4, Path::new("reference.wav"), RunCallbacks::default())
        .await
        .unwrap();

        let events = source.events();
        assert_eq!(events.len(), 8);
        for pair in events.chunks(2) {
            assert_eq!(pair, [DeviceEvent::Acquired, DeviceEvent::Released]);
        }
        assert_eq!(source.overlapping_opens(), 0);
        assert!(!source.is_held());
    }

    #[tokio::test]
    async fn single_segment_run_delivers_once_and_stops_playback() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::always_ok();
        let player = RecordingPlayer::new();

        let summary = orchestrator(
            dir.path(),
            FakeAudioSource::new(),
            transport.clone(),
            player.clone(),
        )
        .run(1, Path::new("reference.wav"), RunCallbacks::default())
        .await
        .unwrap();

        assert_eq!(summary.sessions.len(), 1);
        assert_eq!(summary.deliveries[0].attempt_count(), 1);
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            player.events(),
            vec![
                PlayerEvent::Play(PathBuf::from("reference.wav")),
                PlayerEvent::Stop
            ]
        );
    }

    #[tokio::test]
    async fn zero_segments_is_rejected_before_anything_starts() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeAudioSource::new();
        let player = RecordingPlayer::new();

        let err = orchestrator(
            dir.path(),
            source.clone(),
            ScriptedTransport::always_ok(),
            player.clone(),
        )
        .run(0, Path::new("reference.wav"), RunCallbacks::default())
        .await
        .unwrap_err();

        assert!(matches!(err, RunError::InvalidSegmentCount));
        assert!(source.events().is_empty());
        assert!(player.events().is_empty());
    }

    #[tokio::test]
    async fn failed_deliveries_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::always_ok();
        let delivery = DeliveryClient::new(transport.clone(), UploadMode::Digest).with_max_bytes(10);
        let orchestrator = Orchestrator::new(
            FakeAudioSource::new(),
            Arc::new(WavArtifactStore::new()),
            Arc::new(delivery),
            RecordingPlayer::new(),
            settings(dir.path()),
        );

        let summary = orchestrator
            .run(2, Path::new("reference.wav"), RunCallbacks::default())
            .await
            .unwrap();

        assert_eq!(summary.sessions.len(), 2);
        assert_eq!(summary.failed(), 2);
        assert!(summary.deliveries.is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn finalize_failure_keeps_the_run_advancing() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeAudioSource::new();
        let orchestrator = Orchestrator::new(
            source.clone(),
            MemoryArtifactStore::failing_finalize_for(0),
            Arc::new(DeliveryClient::new(
                ScriptedTransport::always_ok(),
                UploadMode::Digest,
            )),
            RecordingPlayer::new(),
            settings(dir.path()),
        );

        let summary = orchestrator
            .run(2, Path::new("reference.wav"), RunCallbacks::default())
            .await
            .unwrap();

        assert_eq!(summary.sessions.len(), 2);
        assert_eq!(summary.sessions[0].state, SessionState::Failed);
        assert!(summary.sessions[0]
            .failure
            .as_deref()
            .unwrap()
            .contains("no space left"));
        assert_eq!(source.events().len(), 4);
    }

    #[tokio::test]
    async fn playback_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let player = RecordingPlayer::broken();

        let summary = orchestrator(
            dir.path(),
            FakeAudioSource::new(),
            ScriptedTransport::always_ok(),
            player.clone(),
        )
        .run(1, Path::new("missing.wav"), RunCallbacks::default())
        .await
        .unwrap();

        assert_eq!(summary.completed(), 1);
        // Nothing was playing, so nothing is stopped
        assert!(player.events().is_empty());
    }

    #[tokio::test]
    async fn unavailable_device_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();

        let err = orchestrator(
            dir.path(),
            FakeAudioSource::unavailable(),
            ScriptedTransport::always_ok(),
            RecordingPlayer::new(),
        )
        .run(2, Path::new("reference.wav"), RunCallbacks::default())
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            RunError::Capabilities(AudioSourceError::NoDevice)
        ));
    }

    #[tokio::test]
    async fn store_is_cleared_in_the_background() {
        let dir = tempfile::tempdir().unwrap();

        let summary = orchestrator(
            dir.path(),
            FakeAudioSource::new(),
            ScriptedTransport::always_ok(),
            RecordingPlayer::new(),
        )
        .with_store_admin(Arc::new(MockStoreAdmin))
        .run(1, Path::new("reference.wav"), RunCallbacks::default())
        .await
        .unwrap();

        assert!(matches!(summary.store_cleared, Some(Ok(ref text)) if text == "All files cleared"));
    }

    #[tokio::test]
    async fn callbacks_see_every_segment() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let dir = tempfile::tempdir().unwrap();
        let started = Arc::new(AtomicU64::new(0));
        let completed = Arc::new(AtomicU64::new(0));
        let started_cb = Arc::clone(&started);
        let completed_cb = Arc::clone(&completed);
        let callbacks = RunCallbacks {
            on_segment_start: Some(Box::new(move |_, total| {
                assert_eq!(total, 2);
                started_cb.fetch_add(1, Ordering::SeqCst);
            })),
            on_segment_complete: Some(Box::new(move |_: &SegmentCompletion| {
                completed_cb.fetch_add(1, Ordering::SeqCst);
            })),
        };

        orchestrator(
            dir.path(),
            FakeAudioSource::new(),
            ScriptedTransport::always_ok(),
            RecordingPlayer::new(),
        )
        .run(2, Path::new("reference.wav"), callbacks)
        .await
        .unwrap();

        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(completed.load(Ordering::SeqCst), 2);
    }

    /// Records the thread of every blocking call before delegating
    struct ThreadTracker<T> {
        inner: Arc<T>,
        threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl<T> ThreadTracker<T> {
        fn new(inner: Arc<T>) -> Arc<Self> {
            Arc::new(Self {
                inner,
                threads: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn record(&self) {
            self.threads.lock().unwrap().push(std::thread::current().id());
        }

        fn threads(&self) -> Vec<std::thread::ThreadId> {
            self.threads.lock().unwrap().clone()
        }
    }

    impl AudioSource for ThreadTracker<FakeAudioSource> {
        fn capabilities(&self) -> Result<Vec<FormatRange>, AudioSourceError> {
            self.record();
            self.inner.capabilities()
        }

        fn open(
            &self,
            format: AudioFormat,
            on_frame: crate::application::ports::FrameCallback,
        ) -> Result<Box<dyn crate::application::ports::CaptureStream>, AudioSourceError> {
            self.inner.open(format, on_frame)
        }
    }

    impl Player for ThreadTracker<RecordingPlayer> {
        fn play(&self, path: &Path) -> Result<(), PlaybackError> {
            self.record();
            self.inner.play(path)
        }

        fn stop(&self) -> Result<(), PlaybackError> {
            self.record();
            self.inner.stop()
        }
    }

    #[tokio::test]
    async fn device_and_playback_calls_stay_off_the_runtime_thread() {
        let dir = tempfile::tempdir().unwrap();
        let source = ThreadTracker::new(FakeAudioSource::new());
        let player = ThreadTracker::new(RecordingPlayer::new());

        Orchestrator::new(
            source.clone(),
            Arc::new(WavArtifactStore::new()),
            Arc::new(DeliveryClient::new(
                ScriptedTransport::always_ok(),
                UploadMode::Digest,
            )),
            player.clone(),
            settings(dir.path()),
        )
        .run(1, Path::new("reference.wav"), RunCallbacks::default())
        .await
        .unwrap();

        let runtime_thread = std::thread::current().id();
        assert_eq!(source.threads().len(), 1);
        assert_eq!(player.threads().len(), 2);
        for id in source.threads().into_iter().chain(player.threads()) {
            assert_ne!(id, runtime_thread);
        }
        assert_eq!(
            player.inner.events(),
            vec![
                PlayerEvent::Play(PathBuf::from("reference.wav")),
                PlayerEvent::Stop
            ]
        );
    }
}
