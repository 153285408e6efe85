//! RMS level metering and lock-free level hand-off
//!
//! The audio thread publishes into a [`LevelCell`]; a UI or host thread
//! polls it. Only the latest value is kept, older ones are overwritten.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::mixer::PCM_SCALE;

/// RMS of int16-domain samples, normalized to [0.0, 1.0]
///
/// Empty input measures as silence.
pub fn measure(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    ((rms / PCM_SCALE as f64) as f32).min(1.0)
}

/// Same measure over raw PCM
pub fn measure_pcm(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    ((rms / PCM_SCALE as f64) as f32).min(1.0)
}

/// Single-slot, latest-value-wins level mailbox
///
/// The level is stored as f32 bits in an `AtomicU32`, so neither side ever
/// blocks. A freshness flag lets the reader tell a new value from a stale one.
#[derive(Debug)]
pub struct LevelCell {
    bits: AtomicU32,
    fresh: AtomicBool,
}

impl LevelCell {
    pub fn new() -> Self {
        Self {
            bits: AtomicU32::new(0.0_f32.to_bits()),
            fresh: AtomicBool::new(false),
        }
    }

    /// Overwrite the current level (audio thread)
    #[inline]
    pub fn publish(&self, level: f32) {
        self.bits.store(level.to_bits(), Ordering::Relaxed);
        self.fresh.store(true, Ordering::Release);
    }

    /// Take the level if one was published since the last take
    pub fn take(&self) -> Option<f32> {
        if self.fresh.swap(false, Ordering::Acquire) {
            Some(f32::from_bits(self.bits.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    /// Last published level, fresh or not
    pub fn latest(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Back to silence with nothing pending
    pub fn clear(&self) {
        self.bits.store(0.0_f32.to_bits(), Ordering::Relaxed);
        self.fresh.store(false, Ordering::Release);
    }
}

impl Default for LevelCell {
    fn default() -> Self {
        Self::new()
    }
}
