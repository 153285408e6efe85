//! Suppression stage: model ownership, warm-up and bypass
//!
//! The first frame after a model is attached only primes the model; its
//! output is never forwarded. Toggling from bypass back to suppression
//! clears the voice-band filter so stale history does not click.

use serde::{Deserialize, Serialize};

use super::noise_suppressor::{ModelError, SuppressionModel};
use super::voice_band::VoiceBandFilter;

/// Whether frames go through the model
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Bypass,
    #[default]
    Suppress,
}

impl FilterMode {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Bypass => 0,
            Self::Suppress => 1,
        }
    }

    /// Unknown values read as `Suppress`
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Bypass,
            _ => Self::Suppress,
        }
    }
}

/// Model lifecycle as seen by the stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageState {
    Uninitialized,
    WarmingUp,
    Active,
}

/// Result of pushing one frame through the stage
#[derive(Debug, PartialEq)]
pub enum StageOutput<'a> {
    /// Emit these samples (int16 domain, not yet clamped)
    Forward(&'a [f32]),
    /// Emit nothing for this frame
    Suppressed,
}

pub struct SuppressionStage {
    model: Option<Box<dyn SuppressionModel>>,
    state: StageState,
    voice_band: Option<VoiceBandFilter>,
    last_mode: FilterMode,
    model_input: Vec<f32>,
    model_output: Vec<f32>,
    frame_size: usize,
}

impl SuppressionStage {
    pub fn new(frame_size: usize, voice_band: Option<VoiceBandFilter>) -> Self {
        Self {
            model: None,
            state: StageState::Uninitialized,
            voice_band,
            last_mode: FilterMode::Suppress,
            model_input: vec![0.0; frame_size],
            model_output: vec![0.0; frame_size],
            frame_size,
        }
    }

    /// Take ownership of a freshly created model and start warming up
    pub fn attach(&mut self, model: Box<dyn SuppressionModel>) -> Result<(), ModelError> {
        if model.frame_size() != self.frame_size {
            return Err(ModelError::FrameSizeMismatch {
                model: model.frame_size(),
                configured: self.frame_size,
            });
        }
        self.model = Some(model);
        self.state = StageState::WarmingUp;
        Ok(())
    }

    /// Hand the model back and return to `Uninitialized`
    pub fn release(&mut self) -> Option<Box<dyn SuppressionModel>> {
        self.state = StageState::Uninitialized;
        self.model.take()
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Track mode changes; a return to `Suppress` resets auxiliary filters
    pub fn set_mode(&mut self, mode: FilterMode) {
        if mode == FilterMode::Suppress && self.last_mode == FilterMode::Bypass {
            if let Some(filter) = self.voice_band.as_mut() {
                filter.reset();
            }
        }
        self.last_mode = mode;
    }

    /// Process one full frame of mono int16-domain samples
    pub fn process<'a>(&'a mut self, frame: &'a [f32], mode: FilterMode) -> StageOutput<'a> {
        debug_assert_eq!(frame.len(), self.frame_size);
        self.set_mode(mode);

        if mode == FilterMode::Bypass {
            return StageOutput::Forward(frame);
        }

        let Some(model) = self.model.as_mut() else {
            return StageOutput::Suppressed;
        };

        self.model_input.copy_from_slice(frame);
        if let Some(filter) = self.voice_band.as_mut() {
            filter.process_inplace(&mut self.model_input);
        }
        model.process_frame(&self.model_input, &mut self.model_output);

        match self.state {
            StageState::WarmingUp => {
                self.state = StageState::Active;
                StageOutput::Suppressed
            }
            _ => StageOutput::Forward(&self.model_output),
        }
    }
}
