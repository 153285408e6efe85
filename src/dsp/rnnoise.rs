//! RNNoise model backed by nnnoiseless

use nnnoiseless::DenoiseState;

use super::noise_suppressor::{ModelError, ModelFactory, SuppressionModel};

/// RNNoise frame size (10ms at 48kHz)
pub const RNNOISE_FRAME_SIZE: usize = 480;

/// Sample rate RNNoise was trained for
pub const RNNOISE_SAMPLE_RATE: u32 = 48000;

/// One RNNoise instance
///
/// Expects int16-domain input, which is what the mixer produces.
pub struct RnnoiseModel {
    denoiser: Box<DenoiseState<'static>>,
}

impl RnnoiseModel {
    pub fn new() -> Self {
        Self {
            denoiser: DenoiseState::new(),
        }
    }
}

impl Default for RnnoiseModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SuppressionModel for RnnoiseModel {
    fn frame_size(&self) -> usize {
        RNNOISE_FRAME_SIZE
    }

    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        // Voice probability is unused
        let _ = self.denoiser.process_frame(output, input);
    }

    fn name(&self) -> &'static str {
        "rnnoise"
    }
}

/// Factory for [`RnnoiseModel`]
#[derive(Clone, Copy, Debug, Default)]
pub struct RnnoiseFactory;

impl ModelFactory for RnnoiseFactory {
    fn create(&self) -> Result<Box<dyn SuppressionModel>, ModelError> {
        Ok(Box::new(RnnoiseModel::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rnnoise_frame_size() {
        assert_eq!(RNNOISE_FRAME_SIZE, 480);
        let model = RnnoiseFactory.create().unwrap();
        assert_eq!(model.frame_size(), 480);
        assert_eq!(model.name(), "rnnoise");
    }

    #[test]
    fn test_rnnoise_silence_stays_quiet() {
        let mut model = RnnoiseModel::new();
        let input = [0.0f32; RNNOISE_FRAME_SIZE];
        let mut output = [1.0f32; RNNOISE_FRAME_SIZE];

        for _ in 0..10 {
            model.process_frame(&input, &mut output);
        }
        assert!(output.iter().all(|s| s.is_finite() && s.abs() < 1.0));
    }

    #[test]
    fn test_rnnoise_output_is_finite_for_full_scale_input() {
        let mut model = RnnoiseModel::new();
        let input: Vec<f32> = (0..RNNOISE_FRAME_SIZE)
            .map(|i| if i % 2 == 0 { 32767.0 } else { -32768.0 })
            .collect();
        let mut output = vec![0.0f32; RNNOISE_FRAME_SIZE];

        for _ in 0..5 {
            model.process_frame(&input, &mut output);
            assert!(output.iter().all(|s| s.is_finite()));
        }
    }
}
