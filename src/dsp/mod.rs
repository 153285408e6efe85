//! Per-frame signal processing: mixing, framing, metering, suppression

pub mod biquad;
pub mod framer;
pub mod level;
pub mod mixer;
pub mod noise_suppressor;
pub mod rnnoise;
pub mod suppression;
pub mod voice_band;

pub use biquad::{Biquad, BiquadType, Coefficients};
pub use framer::{Frame, Framer};
pub use level::{measure, measure_pcm, LevelCell};
pub use mixer::{downmix, expand, float_to_pcm, ChannelLayout, PCM_SCALE};
pub use noise_suppressor::{create_checked, ModelError, ModelFactory, SuppressionModel};
pub use rnnoise::{RnnoiseFactory, RnnoiseModel, RNNOISE_FRAME_SIZE, RNNOISE_SAMPLE_RATE};
pub use suppression::{FilterMode, StageOutput, StageState, SuppressionStage};
pub use voice_band::VoiceBandFilter;
