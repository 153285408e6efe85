//! Fixed-size reframing of irregular callback blocks
//!
//! Device callbacks arrive in whatever period the driver picked. The
//! suppression model needs exactly one frame at a time, so mixed samples
//! are accumulated in a carry buffer and handed out frame by frame.

use super::mixer::{mix_block, ChannelLayout};

/// One model-sized frame of mono samples
///
/// `samples` always holds a full frame. Only the final frame emitted by
/// [`Framer::flush`] has `valid < samples.len()`; the rest is zero padding.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub samples: &'a [f32],
    pub valid: usize,
}

impl<'a> Frame<'a> {
    /// Samples that came from the input stream, without padding
    pub fn valid_samples(&self) -> &'a [f32] {
        &self.samples[..self.valid]
    }

    /// Whether this frame was zero-padded
    pub fn is_padded(&self) -> bool {
        self.valid < self.samples.len()
    }
}

/// Accumulates mixed samples into fixed frames
pub struct Framer {
    carry: Vec<f32>,
    frame_size: usize,
}

impl Framer {
    /// Create a framer; the carry buffer is allocated once here
    pub fn new(frame_size: usize) -> Self {
        Self {
            carry: Vec::with_capacity(frame_size),
            frame_size,
        }
    }

    /// Mix an interleaved block to mono and emit every completed frame
    ///
    /// Frames are emitted in sample order. Samples that do not complete a
    /// frame stay in the carry buffer for the next call.
    pub fn push<F>(&mut self, block: &[i16], layout: ChannelLayout, mut on_frame: F)
    where
        F: FnMut(Frame<'_>),
    {
        for sample in mix_block(block, layout) {
            self.carry.push(sample);
            if self.carry.len() == self.frame_size {
                on_frame(Frame {
                    samples: &self.carry,
                    valid: self.frame_size,
                });
                self.carry.clear();
            }
        }
    }

    /// Zero-pad and emit the remainder as one final frame
    ///
    /// Returns `false` when there was nothing to flush.
    pub fn flush<F>(&mut self, mut on_frame: F) -> bool
    where
        F: FnMut(Frame<'_>),
    {
        if self.carry.is_empty() {
            return false;
        }

        let valid = self.carry.len();
        self.carry.resize(self.frame_size, 0.0);
        on_frame(Frame {
            samples: &self.carry,
            valid,
        });
        self.carry.clear();
        true
    }

    /// Drop any carried samples
    pub fn reset(&mut self) {
        self.carry.clear();
    }

    /// Mono samples waiting for the next frame
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}
