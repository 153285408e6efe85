//! Noise suppression model abstraction
//!
//! A model consumes exactly one frame per call and keeps adaptive state
//! between calls. Dropping the boxed model releases it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to create suppression model: {0}")]
    Create(String),

    #[error("Model frame size {model} does not match configured frame size {configured}")]
    FrameSizeMismatch { model: usize, configured: usize },
}

/// Frame-based noise suppression model
///
/// Input and output are int16-domain floats, `frame_size()` samples each.
pub trait SuppressionModel: Send {
    /// Samples per frame this model requires
    fn frame_size(&self) -> usize;

    /// Denoise one frame
    fn process_frame(&mut self, input: &[f32], output: &mut [f32]);

    /// Human-readable model name
    fn name(&self) -> &'static str;
}

/// Creates fresh model instances, one per session or batch job
pub trait ModelFactory {
    fn create(&self) -> Result<Box<dyn SuppressionModel>, ModelError>;
}

/// Create a model and check it agrees with the framer's frame size
pub fn create_checked<F: ModelFactory + ?Sized>(
    factory: &F,
    frame_size: usize,
) -> Result<Box<dyn SuppressionModel>, ModelError> {
    let model = factory.create()?;
    if model.frame_size() != frame_size {
        return Err(ModelError::FrameSizeMismatch {
            model: model.frame_size(),
            configured: frame_size,
        });
    }
    Ok(model)
}
