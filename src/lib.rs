//! rnnoise-duplex - real-time RNNoise denoising for live and recorded audio
//!
//! Processing chain: Capture → Framer (downmix) → Level → RNNoise → int16 clamp → Playback
//!
//! The same framer and suppression stage drive the offline WAV path in
//! [`batch`].

pub mod audio;
pub mod batch;
pub mod config;
pub mod dsp;
pub mod pcm;
pub mod wav;

// Re-export main types
pub use audio::{CpalBackend, Recorder, RecorderState, Session, SessionState};
pub use batch::{BatchJob, BatchOptions, BatchStatus};
pub use config::AudioConfig;
pub use dsp::{FilterMode, RnnoiseFactory};
