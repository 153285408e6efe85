//! Device abstraction consumed by sessions and the recorder
//!
//! A backend opens a stream and drives an injected callback on its own
//! real-time thread. Dropping the stream closes the device; no callback
//! runs after the drop returns.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No audio device found")]
    NoDevice,

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device does not support {0}")]
    UnsupportedConfig(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),

    #[error("Failed to pause stream: {0}")]
    PauseStream(String),
}

/// Set by a backend when the running stream reports an error
pub type FaultFlag = Arc<AtomicBool>;

/// What a stream is opened with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub capture_channels: u16,
    pub playback_channels: u16,
    /// `None` selects the host default
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    /// Capture frames that may queue between the capture and playback sides
    pub capture_buffer_frames: usize,
}

/// Full-duplex block processor, called once per device period
pub trait DuplexCallback: Send + 'static {
    /// Fill `output` (interleaved, playback channels) from `input`
    /// (interleaved, capture channels). `input` is `None` when no capture
    /// data is available. `output` must be fully written before returning.
    fn process(&mut self, output: &mut [i16], input: Option<&[i16]>, frame_count: usize);
}

/// Capture-only block consumer
pub trait CaptureCallback: Send + 'static {
    fn capture(&mut self, input: Option<&[i16]>, frame_count: usize);
}

/// An opened device stream
pub trait AudioStream {
    fn start(&mut self) -> Result<(), DeviceError>;
    fn stop(&mut self) -> Result<(), DeviceError>;
}

/// Something that can open duplex and capture streams
pub trait AudioBackend {
    type Stream: AudioStream;

    fn open_duplex(
        &self,
        config: &DeviceConfig,
        callback: Box<dyn DuplexCallback>,
        fault: FaultFlag,
    ) -> Result<Self::Stream, DeviceError>;

    fn open_capture(
        &self,
        config: &DeviceConfig,
        callback: Box<dyn CaptureCallback>,
        fault: FaultFlag,
    ) -> Result<Self::Stream, DeviceError>;
}
