//! Default input device via cpal
//!
//! `cpal::Stream` is not `Send`, so each open capture lives on its own
//! device thread. The thread builds the stream, reports whether that worked,
//! then parks until the stream is closed and drops it there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tracing::{debug, warn};

use crate::application::ports::{AudioSource, AudioSourceError, CaptureStream, FrameCallback};
use crate::domain::recording::{AudioFormat, FormatRange};

/// Audio source on the host's default input device
pub struct CpalAudioSource {
    /// Set while a capture stream is open
    held: Arc<AtomicBool>,
}

impl CpalAudioSource {
    pub fn new() -> Self {
        Self {
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    fn input_device() -> Result<cpal::Device, AudioSourceError> {
        let host = cpal::default_host();
        host.default_input_device()
            .ok_or(AudioSourceError::NoDevice)
    }

    /// Pick the native sample format for `format`, preferring i16 over f32
    fn sample_format_for(
        device: &cpal::Device,
        format: AudioFormat,
    ) -> Result<SampleFormat, AudioSourceError> {
        let configs = device
            .supported_input_configs()
            .map_err(|e| AudioSourceError::OpenFailed(format!("Failed to get configs: {}", e)))?;

        let mut chosen = None;
        for config in configs {
            let fits = config.channels() == format.channels
                && config.min_sample_rate().0 <= format.sample_rate
                && config.max_sample_rate().0 >= format.sample_rate;
            match config.sample_format() {
                SampleFormat::I16 if fits => return Ok(SampleFormat::I16),
                SampleFormat::F32 if fits => chosen = Some(SampleFormat::F32),
                _ => {}
            }
        }

        chosen.ok_or_else(|| {
            AudioSourceError::OpenFailed(format!("Device does not support {}", format))
        })
    }

    /// Build and start the stream on the current thread
    fn build_stream(
        format: AudioFormat,
        on_frame: FrameCallback,
    ) -> Result<cpal::Stream, AudioSourceError> {
        let device = Self::input_device()?;
        let sample_format = Self::sample_format_for(&device, format)?;
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut on_frame = on_frame;
        let mut bytes = Vec::new();
        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    encode_pcm16(data.iter().copied(), &mut bytes);
                    on_frame(&bytes);
                },
                |err| warn!("audio stream error: {}", err),
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    encode_pcm16(data.iter().map(|&s| f32_to_i16(s)), &mut bytes);
                    on_frame(&bytes);
                },
                |err| warn!("audio stream error: {}", err),
                None,
            ),
            other => {
                return Err(AudioSourceError::OpenFailed(format!(
                    "Unsupported sample format {:?}",
                    other
                )))
            }
        }
        .map_err(|e| AudioSourceError::OpenFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioSourceError::OpenFailed(e.to_string()))?;
        Ok(stream)
    }
}

impl Default for CpalAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for CpalAudioSource {
    fn capabilities(&self) -> Result<Vec<FormatRange>, AudioSourceError> {
        let device = Self::input_device()?;
        let configs = device
            .supported_input_configs()
            .map_err(|e| AudioSourceError::Capabilities(e.to_string()))?;

        let mut ranges: Vec<FormatRange> = Vec::new();
        for config in configs {
            if !matches!(config.sample_format(), SampleFormat::I16 | SampleFormat::F32) {
                continue;
            }
            let range = FormatRange {
                channels: config.channels(),
                min_sample_rate: config.min_sample_rate().0,
                max_sample_rate: config.max_sample_rate().0,
            };
            if !ranges.contains(&range) {
                ranges.push(range);
            }
        }
        debug!(?ranges, "input device capabilities");
        Ok(ranges)
    }

    fn open(
        &self,
        format: AudioFormat,
        on_frame: FrameCallback,
    ) -> Result<Box<dyn CaptureStream>, AudioSourceError> {
        if self.held.swap(true, Ordering::SeqCst) {
            return Err(AudioSourceError::Busy);
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioSourceError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let held = Arc::clone(&self.held);

        let thread = std::thread::spawn(move || {
            match Self::build_stream(format, on_frame) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Returns on close or when the handle is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
            held.store(false, Ordering::SeqCst);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalCaptureStream {
                stop_tx,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                self.held.store(false, Ordering::SeqCst);
                Err(AudioSourceError::OpenFailed(
                    "device thread exited during setup".into(),
                ))
            }
        }
    }
}

struct CpalCaptureStream {
    stop_tx: mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureStream for CpalCaptureStream {
    fn close(mut self: Box<Self>) -> Result<(), AudioSourceError> {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| AudioSourceError::CloseFailed("device thread panicked".into()))?;
        }
        Ok(())
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Serialize samples as little-endian PCM into `out`, replacing its contents
fn encode_pcm16(samples: impl Iterator<Item = i16>, out: &mut Vec<u8>) {
    out.clear();
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}
