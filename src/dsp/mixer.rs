//! Channel mixing and int16 <-> float conversion
//!
//! All mixing happens in the int16 domain the suppression model expects:
//! floats produced here span roughly [-32768, 32767], not [-1.0, 1.0].

/// Scale between int16 PCM and normalized float
pub const PCM_SCALE: f32 = 32768.0;

/// Interleaving of a PCM block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// Map a channel count onto a supported layout
    pub fn from_count(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            _ => None,
        }
    }

    /// Samples per interleaved frame
    pub fn channels(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// Stereo to mono downmix: `l + r/2`
///
/// The right channel is halved with truncating integer division before the
/// sum, so the result may exceed the int16 range. Callers clamp on the way
/// back out with [`float_to_pcm`].
#[inline]
pub fn downmix(l: i16, r: i16) -> f32 {
    (l as i32 + r as i32 / 2) as f32
}

/// Mix one interleaved frame to a mono sample
#[inline]
pub fn mix_frame(frame: &[i16], layout: ChannelLayout) -> f32 {
    match layout {
        ChannelLayout::Mono => frame[0] as f32,
        ChannelLayout::Stereo => downmix(frame[0], frame[1]),
    }
}

/// Iterate the mono samples of an interleaved block
///
/// A trailing partial frame is ignored.
pub fn mix_block(block: &[i16], layout: ChannelLayout) -> impl Iterator<Item = f32> + '_ {
    block
        .chunks_exact(layout.channels())
        .map(move |frame| mix_frame(frame, layout))
}

/// Write one mono sample to every channel of an output frame
#[inline]
pub fn expand(mono: i16, frame: &mut [i16]) {
    frame.fill(mono);
}

/// Float (int16 domain) to int16: clamp to [-32768, 32767], then truncate
#[inline]
pub fn float_to_pcm(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    sample.clamp(-32768.0, 32767.0) as i16
}

/// int16 to normalized float in [-1.0, 1.0)
#[inline]
pub fn pcm_to_normalized(sample: i16) -> f32 {
    sample as f32 / PCM_SCALE
}

/// Normalized float to int16 with the same clamping rule as [`float_to_pcm`]
#[inline]
pub fn normalized_to_pcm(sample: f32) -> i16 {
    float_to_pcm(sample * PCM_SCALE)
}
