//! Second-order IIR sections for the voice-band pre-filter
//!
//! Transposed direct form II with f64 state, fed int16-domain f32 samples.

use std::f64::consts::PI;

/// Supported responses
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BiquadType {
    HighPass,
    LowPass,
}

/// Normalized coefficients (a0 = 1)
///
/// H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coefficients {
    pub b: [f64; 3],
    pub a: [f64; 2],
}

impl Coefficients {
    /// RBJ cookbook design for a cutoff at `cutoff_hz`
    pub fn design(kind: BiquadType, cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let b = match kind {
            BiquadType::HighPass => {
                let edge = (1.0 + cos_w0) / 2.0;
                [edge, -2.0 * edge, edge]
            }
            BiquadType::LowPass => {
                let edge = (1.0 - cos_w0) / 2.0;
                [edge, 2.0 * edge, edge]
            }
        };

        let a0 = 1.0 + alpha;
        Self {
            b: b.map(|coef| coef / a0),
            a: [-2.0 * cos_w0 / a0, (1.0 - alpha) / a0],
        }
    }
}

/// One filter section with its own delay line
#[derive(Clone, Debug)]
pub struct Biquad {
    coefficients: Coefficients,
    state: [f64; 2],
    cutoff_hz: f64,
}

impl Biquad {
    /// Create a filter with a cleared delay line
    ///
    /// # Arguments
    /// * `kind` - High-pass or low-pass response
    /// * `cutoff_hz` - -3 dB point in Hz, below Nyquist
    /// * `q` - Resonance; 0.707 gives a Butterworth response
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(kind: BiquadType, cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        Self {
            coefficients: Coefficients::design(kind, cutoff_hz, q, sample_rate),
            state: [0.0; 2],
            cutoff_hz,
        }
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let Coefficients { b, a } = self.coefficients;
        let x = input as f64;
        let y = b[0] * x + self.state[0];
        self.state[0] = b[1] * x - a[0] * y + self.state[1];
        self.state[1] = b[2] * x - a[1] * y;
        y as f32
    }

    pub fn process_block_inplace(&mut self, buffer: &mut [f32]) {
        buffer
            .iter_mut()
            .for_each(|sample| *sample = self.process_sample(*sample));
    }

    /// Zero the delay line; coefficients are kept
    pub fn reset(&mut self) {
        self.state = [0.0; 2];
    }

    pub fn frequency(&self) -> f64 {
        self.cutoff_hz
    }
}
