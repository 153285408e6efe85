//! Audio devices, live sessions and recording

pub mod backend;
pub mod buffer;
pub mod device;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod recorder;
pub mod session;

pub use backend::{
    AudioBackend, AudioStream, CaptureCallback, DeviceConfig, DeviceError, DuplexCallback,
    FaultFlag,
};
pub use buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
pub use device::{list_input_devices, list_output_devices, CpalBackend, CpalStream, DeviceInfo};
pub use input::{AudioDeviceInfo, AudioInput};
pub use output::AudioOutput;
pub use pipeline::{FramePipeline, SessionControl};
pub use recorder::{Recorder, RecorderError, RecorderState, RecordingBuffer};
pub use session::{Session, SessionError, SessionState};
