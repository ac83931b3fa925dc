//! Rodio-based reference player
//!
//! Loops a sound file on the default output device until stopped. The
//! output stream is not `Send`, so it lives on a dedicated playback thread.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use rodio::{Decoder, OutputStream, Sink, Source};
use tracing::{debug, warn};

use crate::application::ports::{PlaybackError, Player};

struct Playback {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// Player implementation using rodio
pub struct RodioPlayer {
    current: Mutex<Option<Playback>>,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn take_current(&self) -> Option<Playback> {
        match self.current.lock() {
            Ok(mut current) => current.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Player for RodioPlayer {
    fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        // Restarting replaces whatever was looping before
        self.stop()?;

        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let path = path.to_path_buf();

        let thread = std::thread::spawn(move || match open_loop(&path) {
            Ok((_stream, sink)) => {
                let _ = ready_tx.send(Ok(()));
                let _ = stop_rx.recv();
                sink.stop();
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                let playback = Playback { stop_tx, thread };
                match self.current.lock() {
                    Ok(mut current) => *current = Some(playback),
                    Err(poisoned) => *poisoned.into_inner() = Some(playback),
                }
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(PlaybackError::PlaybackFailed(
                    "playback thread exited during setup".into(),
                ))
            }
        }
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        let Some(playback) = self.take_current() else {
            return Ok(());
        };
        let _ = playback.stop_tx.send(());
        playback
            .thread
            .join()
            .map_err(|_| PlaybackError::PlaybackFailed("playback thread panicked".into()))?;
        debug!("playback thread joined");
        Ok(())
    }
}

impl Drop for RodioPlayer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
    }
}

/// Decode `path` and start looping it on the default output device
fn open_loop(path: &Path) -> Result<(OutputStream, Sink), PlaybackError> {
    let load_failed = |message: String| PlaybackError::LoadFailed {
        path: path.display().to_string(),
        message,
    };

    let file = File::open(path).map_err(|e| load_failed(e.to_string()))?;
    let source = Decoder::new(BufReader::new(file)).map_err(|e| load_failed(e.to_string()))?;

    let (stream, handle) = OutputStream::try_default()
        .map_err(|e| PlaybackError::DeviceNotAvailable(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::PlaybackFailed(e.to_string()))?;
    sink.append(source.repeat_infinite());

    Ok((stream, sink))
}
