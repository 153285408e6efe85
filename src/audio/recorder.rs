//! Capture-only recording into a preallocated buffer
//!
//! The capture callback never blocks: it takes the buffer with `try_lock`
//! and drops the block if the control thread holds it. Recording stops
//! growing at capacity and the overflow is flagged.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::backend::{AudioBackend, AudioStream, CaptureCallback, DeviceError, FaultFlag};
use crate::config::{AudioConfig, ConfigError};
use crate::dsp::{measure_pcm, LevelCell};
use crate::wav::{write_wav_file, WavError, WavHeader};

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Wav(#[from] WavError),

    #[error("Nothing has been recorded")]
    Empty,

    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: RecorderState,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Fixed-capacity interleaved sample store
#[derive(Debug)]
pub struct RecordingBuffer {
    samples: Vec<i16>,
    capacity: usize,
}

impl RecordingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append as much of `block` as fits; returns the count stored
    pub fn append(&mut self, block: &[i16]) -> usize {
        let room = self.capacity - self.samples.len();
        let take = block.len().min(room);
        self.samples.extend_from_slice(&block[..take]);
        take
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }
}

#[derive(Debug)]
struct RecorderShared {
    active: AtomicBool,
    paused: AtomicBool,
    buffer: Mutex<RecordingBuffer>,
    level: LevelCell,
    truncated: AtomicBool,
    contention: AtomicU64,
    recorded: AtomicUsize,
}

impl RecorderShared {
    fn lock_buffer(&self) -> MutexGuard<'_, RecordingBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Capture callback feeding the recording buffer
struct RecorderTap {
    shared: Arc<RecorderShared>,
    channels: usize,
}

impl CaptureCallback for RecorderTap {
    fn capture(&mut self, input: Option<&[i16]>, frame_count: usize) {
        let shared = &*self.shared;
        if !shared.active.load(Ordering::Acquire) || shared.paused.load(Ordering::Acquire) {
            return;
        }
        let Some(input) = input else {
            return;
        };
        let block = &input[..(frame_count * self.channels).min(input.len())];

        shared.level.publish(measure_pcm(block));

        match shared.buffer.try_lock() {
            Ok(mut buffer) => {
                if buffer.append(block) < block.len() {
                    shared.truncated.store(true, Ordering::Relaxed);
                }
                shared.recorded.store(buffer.len(), Ordering::Release);
            }
            Err(_) => {
                shared.contention.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Records the capture device until stopped or full
pub struct Recorder<B: AudioBackend> {
    backend: B,
    config: AudioConfig,
    shared: Arc<RecorderShared>,
    fault: FaultFlag,
    stream: Option<B::Stream>,
    state: RecorderState,
}

impl<B: AudioBackend> Recorder<B> {
    /// Validate the capture settings and allocate the full recording buffer
    ///
    /// Playback settings are not checked; the recorder never opens an
    /// output device.
    pub fn new(backend: B, config: &AudioConfig) -> Result<Self, RecorderError> {
        config.validate_capture()?;
        let capacity = config.recording_capacity();

        Ok(Self {
            backend,
            config: config.clone(),
            shared: Arc::new(RecorderShared {
                active: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                buffer: Mutex::new(RecordingBuffer::with_capacity(capacity)),
                level: LevelCell::new(),
                truncated: AtomicBool::new(false),
                contention: AtomicU64::new(0),
                recorded: AtomicUsize::new(0),
            }),
            fault: Arc::new(AtomicBool::new(false)),
            stream: None,
            state: RecorderState::Idle,
        })
    }

    /// Begin a new recording, discarding any previous one
    pub fn start(&mut self) -> Result<(), RecorderError> {
        match self.state {
            RecorderState::Idle | RecorderState::Stopped => {}
            state => {
                return Err(RecorderError::InvalidState {
                    action: "start recording",
                    state,
                })
            }
        }

        self.shared.lock_buffer().clear();
        self.shared.recorded.store(0, Ordering::Release);
        self.shared.truncated.store(false, Ordering::Relaxed);
        self.shared.paused.store(false, Ordering::Release);
        self.shared.level.clear();
        self.fault.store(false, Ordering::Release);

        let tap = RecorderTap {
            shared: Arc::clone(&self.shared),
            channels: self.config.capture_channels as usize,
        };
        let mut stream =
            self.backend
                .open_capture(&self.config.device_config(), Box::new(tap), Arc::clone(&self.fault))?;

        self.shared.active.store(true, Ordering::Release);
        if let Err(e) = stream.start() {
            self.shared.active.store(false, Ordering::Release);
            log::warn!("Recording start failed: {}", e);
            return Err(e.into());
        }

        self.stream = Some(stream);
        self.state = RecorderState::Recording;
        log::info!(
            "Recording started ({} Hz, {} channel(s), {} s max)",
            self.config.sample_rate,
            self.config.capture_channels,
            self.config.recording_seconds
        );
        Ok(())
    }

    /// Keep the device open but drop incoming audio
    pub fn pause(&mut self) -> Result<(), RecorderError> {
        if self.state != RecorderState::Recording {
            return Err(RecorderError::InvalidState {
                action: "pause",
                state: self.state,
            });
        }
        self.shared.paused.store(true, Ordering::Release);
        self.state = RecorderState::Paused;
        log::info!("Recording paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), RecorderError> {
        if self.state != RecorderState::Paused {
            return Err(RecorderError::InvalidState {
                action: "resume",
                state: self.state,
            });
        }
        self.shared.paused.store(false, Ordering::Release);
        self.state = RecorderState::Recording;
        log::info!("Recording resumed");
        Ok(())
    }

    /// Close the device; the recording stays available for `save`
    pub fn stop(&mut self) {
        if !matches!(self.state, RecorderState::Recording | RecorderState::Paused) {
            return;
        }

        self.shared.active.store(false, Ordering::Release);
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.stop() {
                log::warn!("Failed to stop capture stream: {}", e);
            }
        }
        self.shared.level.clear();
        self.state = RecorderState::Stopped;
        log::info!("Recording stopped ({} samples)", self.recorded_samples());
    }

    /// Write the recording as a 16-bit WAV file
    pub fn save(&self, path: &Path) -> Result<WavHeader, RecorderError> {
        if self.state != RecorderState::Stopped {
            return Err(RecorderError::InvalidState {
                action: "save",
                state: self.state,
            });
        }

        let buffer = self.shared.lock_buffer();
        if buffer.is_empty() {
            return Err(RecorderError::Empty);
        }
        let header = write_wav_file(
            path,
            self.config.capture_channels,
            self.config.sample_rate,
            buffer.as_slice(),
        )?;
        log::info!("Saved recording to {}", path.display());
        Ok(header)
    }

    /// Current state; a stream error stops the recording
    pub fn poll(&mut self) -> RecorderState {
        if matches!(self.state, RecorderState::Recording | RecorderState::Paused)
            && self.fault.load(Ordering::Acquire)
        {
            log::error!("Capture stream reported an error; recording stopped");
            self.stop();
        }
        self.state
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Fraction of the buffer filled
    pub fn progress(&self) -> f32 {
        match self.capacity() {
            0 => 1.0,
            capacity => self.recorded_samples() as f32 / capacity as f32,
        }
    }

    pub fn is_full(&self) -> bool {
        self.recorded_samples() >= self.capacity()
    }

    /// Interleaved samples recorded so far
    pub fn recorded_samples(&self) -> usize {
        self.shared.recorded.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.config.recording_capacity()
    }

    /// Whether input was lost because the buffer was full
    pub fn truncated(&self) -> bool {
        self.shared.truncated.load(Ordering::Relaxed)
    }

    /// Blocks dropped because the buffer was locked
    pub fn contention_count(&self) -> u64 {
        self.shared.contention.load(Ordering::Relaxed)
    }

    pub fn level(&self) -> &LevelCell {
        &self.shared.level
    }
}

impl<B: AudioBackend> Drop for Recorder<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
