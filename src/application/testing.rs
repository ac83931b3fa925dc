//! In-process stand-ins for the pipeline's ports, shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration as StdDuration;

use async_trait::async_trait;

use super::ports::{
    ArtifactError, ArtifactStore, AudioSource, AudioSourceError, CaptureStream, FrameCallback,
    IngestTransport, PlaybackError, Player, SegmentSink, TransportError, TransportResponse,
    UploadPayload,
};
use crate::domain::recording::{AudioFormat, FormatRange};
use crate::domain::session::artifact_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Acquired,
    Released,
}

/// Device that emits a fixed chunk every few milliseconds on its own thread
/// and refuses a second concurrent open.
pub struct FakeAudioSource {
    available: bool,
    held: Arc<AtomicBool>,
    overlapping: AtomicUsize,
    events: Arc<Mutex<Vec<DeviceEvent>>>,
    chunk: Vec<u8>,
    interval: StdDuration,
}

impl FakeAudioSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: true,
            held: Arc::new(AtomicBool::new(false)),
            overlapping: AtomicUsize::new(0),
            events: Arc::new(Mutex::new(Vec::new())),
            chunk: (0u8..16).collect(),
            interval: StdDuration::from_millis(5),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            available: false,
            held: Arc::new(AtomicBool::new(false)),
            overlapping: AtomicUsize::new(0),
            events: Arc::new(Mutex::new(Vec::new())),
            chunk: vec![0; 4],
            interval: StdDuration::from_millis(5),
        })
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Opens attempted while another stream held the device
    pub fn overlapping_opens(&self) -> usize {
        self.overlapping.load(Ordering::SeqCst)
    }

    pub fn chunk(&self) -> &[u8] {
        &self.chunk
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk.len()
    }
}

impl AudioSource for FakeAudioSource {
    fn capabilities(&self) -> Result<Vec<FormatRange>, AudioSourceError> {
        if !self.available {
            return Err(AudioSourceError::NoDevice);
        }
        Ok(vec![FormatRange {
            channels: 2,
            min_sample_rate: 8_000,
            max_sample_rate: 48_000,
        }])
    }

    fn open(
        &self,
        _format: AudioFormat,
        mut on_frame: FrameCallback,
    ) -> Result<Box<dyn CaptureStream>, AudioSourceError> {
        if !self.available {
            return Err(AudioSourceError::NoDevice);
        }
        if self.held.swap(true, Ordering::SeqCst) {
            self.overlapping.fetch_add(1, Ordering::SeqCst);
            return Err(AudioSourceError::Busy);
        }
        self.events.lock().unwrap().push(DeviceEvent::Acquired);

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let chunk = self.chunk.clone();
        let interval = self.interval;
        let thread = std::thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                on_frame(&chunk);
                std::thread::sleep(interval);
            }
        });

        Ok(Box::new(FakeStream {
            stop,
            thread: Some(thread),
            held: Arc::clone(&self.held),
            events: Arc::clone(&self.events),
        }))
    }
}

struct FakeStream {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    held: Arc<AtomicBool>,
    events: Arc<Mutex<Vec<DeviceEvent>>>,
}

impl CaptureStream for FakeStream {
    fn close(mut self: Box<Self>) -> Result<(), AudioSourceError> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| AudioSourceError::CloseFailed("capture thread panicked".into()))?;
        }
        self.events.lock().unwrap().push(DeviceEvent::Released);
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Artifact store that keeps finalized artifacts in memory
pub struct MemoryArtifactStore {
    created: Mutex<Vec<PathBuf>>,
    finalized: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    fail_create: bool,
    fail_finalize: Option<String>,
}

impl MemoryArtifactStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Vec::new()),
            finalized: Arc::new(Mutex::new(HashMap::new())),
            fail_create: false,
            fail_finalize: None,
        })
    }

    pub fn failing_create() -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Vec::new()),
            finalized: Arc::new(Mutex::new(HashMap::new())),
            fail_create: true,
            fail_finalize: None,
        })
    }

    /// Finalize of segment `index` reports a write failure
    pub fn failing_finalize_for(index: u64) -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Vec::new()),
            finalized: Arc::new(Mutex::new(HashMap::new())),
            fail_create: false,
            fail_finalize: Some(artifact_name(index)),
        })
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.created.lock().unwrap().clone()
    }

    pub fn finalized(&self, path: &Path) -> Option<Vec<u8>> {
        self.finalized.lock().unwrap().get(path).cloned()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn create(
        &self,
        path: &Path,
        _format: AudioFormat,
    ) -> Result<Box<dyn SegmentSink>, ArtifactError> {
        if self.fail_create {
            return Err(ArtifactError::CreateFailed {
                path: path.to_path_buf(),
                message: "read-only file system".into(),
            });
        }
        self.created.lock().unwrap().push(path.to_path_buf());

        let fail = self
            .fail_finalize
            .as_deref()
            .is_some_and(|name| path.ends_with(name));
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            data: Vec::new(),
            done: false,
            fail,
            finalized: Arc::clone(&self.finalized),
        }))
    }
}

struct MemorySink {
    path: PathBuf,
    data: Vec<u8>,
    done: bool,
    fail: bool,
    finalized: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl SegmentSink for MemorySink {
    fn append(&mut self, bytes: &[u8]) -> Result<(), ArtifactError> {
        if self.done {
            return Err(ArtifactError::AlreadyFinalized(self.path.clone()));
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ArtifactError> {
        if self.done {
            return Err(ArtifactError::AlreadyFinalized(self.path.clone()));
        }
        self.done = true;
        if self.fail {
            return Err(ArtifactError::WriteFailed {
                path: self.path.clone(),
                message: "no space left on device".into(),
            });
        }
        self.finalized
            .lock()
            .unwrap()
            .insert(self.path.clone(), self.data.clone());
        Ok(())
    }

    fn data_len(&self) -> u64 {
        self.data.len() as u64
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Transport that replays scripted results, then acknowledges everything
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: AtomicUsize,
    digests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            digests: Mutex::new(Vec::new()),
        })
    }

    pub fn always_ok() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse {
            status,
            body: body.to_string(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn digests(&self) -> Vec<String> {
        self.digests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IngestTransport for ScriptedTransport {
    async fn send(&self, payload: &UploadPayload) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.digests.lock().unwrap().push(payload.digest.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Self::response(200, "OK")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Play(PathBuf),
    Stop,
}

/// Player that only records what it was asked to do
pub struct RecordingPlayer {
    events: Mutex<Vec<PlayerEvent>>,
    fail_play: bool,
}

impl RecordingPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            fail_play: false,
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            fail_play: true,
        })
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Player for RecordingPlayer {
    fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        if self.fail_play {
            return Err(PlaybackError::DeviceNotAvailable("no output device".into()));
        }
        self.events
            .lock()
            .unwrap()
            .push(PlayerEvent::Play(path.to_path_buf()));
        Ok(())
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        self.events.lock().unwrap().push(PlayerEvent::Stop);
        Ok(())
    }
}
