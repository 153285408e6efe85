//! Optional band-limiting ahead of the suppression model
//!
//! A high-pass removes rumble and DC, a low-pass trims hiss above the voice
//! band. Both operate on int16-domain floats.

use super::biquad::{Biquad, BiquadType};

/// Butterworth Q for both sections
const SECTION_Q: f64 = 0.707;

/// High-pass followed by low-pass
#[derive(Clone, Debug)]
pub struct VoiceBandFilter {
    highpass: Biquad,
    lowpass: Biquad,
}

impl VoiceBandFilter {
    pub fn new(low_cut_hz: f64, high_cut_hz: f64, sample_rate: f64) -> Self {
        Self {
            highpass: Biquad::new(BiquadType::HighPass, low_cut_hz, SECTION_Q, sample_rate),
            lowpass: Biquad::new(BiquadType::LowPass, high_cut_hz, SECTION_Q, sample_rate),
        }
    }

    pub fn process_inplace(&mut self, frame: &mut [f32]) {
        self.highpass.process_block_inplace(frame);
        self.lowpass.process_block_inplace(frame);
    }

    /// Forget filter history
    pub fn reset(&mut self) {
        self.highpass.reset();
        self.lowpass.reset();
    }

    pub fn band(&self) -> (f64, f64) {
        (self.highpass.frequency(), self.lowpass.frequency())
    }
}
