//! WAV files: strict header parsing and hound-backed writing
//!
//! Input is only understood in the plain layout: RIFF/WAVE, a 16-byte `fmt `
//! chunk with PCM format 1, then the `data` chunk. Anything else is rejected.
//! Output goes through `hound`, which writes that same layout for 16-bit mono
//! and stereo.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Header length in bytes
pub const HEADER_LEN: usize = 44;

/// WAVE_FORMAT_PCM
pub const PCM_FORMAT: u16 = 1;

const FMT_CHUNK_LEN: u32 = 16;

#[derive(Error, Debug)]
pub enum WavError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("File is shorter than a WAV header")]
    TruncatedHeader,

    #[error("Not a WAV file: expected '{expected}' tag, found '{found}'")]
    BadTag { expected: &'static str, found: String },

    #[error("Unsupported WAV encoding {0} (only PCM is supported)")]
    UnsupportedEncoding(u16),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error("Inconsistent WAV header: {0}")]
    Inconsistent(String),

    #[error("WAV encoder error: {0}")]
    Encode(#[from] hound::Error),

    #[error("Output {0} is the input file; refusing to overwrite it")]
    OverwritesInput(PathBuf),
}

/// Fields of a canonical PCM header
///
/// `file_size`, `byte_rate` and `block_align` are derived, not stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Length of the sample data in bytes
    pub data_size: u32,
}

impl WavHeader {
    /// 16-bit PCM header
    pub fn pcm16(channels: u16, sample_rate: u32, data_size: u32) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample: 16,
            data_size,
        }
    }

    /// RIFF chunk size: everything after the first 8 bytes
    pub fn file_size(&self) -> u32 {
        self.data_size.wrapping_add(HEADER_LEN as u32 - 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(self.block_align() as u32)
    }

    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.bits_per_sample / 8)
    }

    /// Individual samples across all channels
    pub fn sample_count(&self) -> u64 {
        match self.bits_per_sample / 8 {
            0 => 0,
            width => self.data_size as u64 / width as u64,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(b"RIFF");
        bytes[4..8].copy_from_slice(&self.file_size().to_le_bytes());
        bytes[8..12].copy_from_slice(b"WAVE");
        bytes[12..16].copy_from_slice(b"fmt ");
        bytes[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        bytes[20..22].copy_from_slice(&PCM_FORMAT.to_le_bytes());
        bytes[22..24].copy_from_slice(&self.channels.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        bytes[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        bytes[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        bytes[36..40].copy_from_slice(b"data");
        bytes[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self, WavError> {
        expect_tag(bytes, 0, "RIFF")?;
        expect_tag(bytes, 8, "WAVE")?;
        expect_tag(bytes, 12, "fmt ")?;
        expect_tag(bytes, 36, "data")?;

        let fmt_len = u32_at(bytes, 16);
        if fmt_len != FMT_CHUNK_LEN {
            return Err(WavError::Inconsistent(format!(
                "fmt chunk is {} bytes, expected {}",
                fmt_len, FMT_CHUNK_LEN
            )));
        }

        let format = u16_at(bytes, 20);
        if format != PCM_FORMAT {
            return Err(WavError::UnsupportedEncoding(format));
        }

        let header = Self {
            channels: u16_at(bytes, 22),
            sample_rate: u32_at(bytes, 24),
            bits_per_sample: u16_at(bytes, 34),
            data_size: u32_at(bytes, 40),
        };

        if header.channels == 0 {
            return Err(WavError::Inconsistent("zero channels".to_string()));
        }
        if header.bits_per_sample == 0 || header.bits_per_sample % 8 != 0 {
            return Err(WavError::UnsupportedFormat(format!(
                "{}-bit samples",
                header.bits_per_sample
            )));
        }

        let file_size = u32_at(bytes, 4);
        if file_size != header.file_size() {
            return Err(WavError::Inconsistent(format!(
                "RIFF size {} does not match data size {}",
                file_size, header.data_size
            )));
        }
        let byte_rate = u32_at(bytes, 28);
        if byte_rate != header.byte_rate() {
            return Err(WavError::Inconsistent(format!(
                "byte rate {}, expected {}",
                byte_rate,
                header.byte_rate()
            )));
        }
        let block_align = u16_at(bytes, 32);
        if block_align != header.block_align() {
            return Err(WavError::Inconsistent(format!(
                "block align {}, expected {}",
                block_align,
                header.block_align()
            )));
        }

        Ok(header)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, WavError> {
        let mut bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => WavError::TruncatedHeader,
            _ => WavError::Io(e),
        })?;
        Self::from_bytes(&bytes)
    }

    /// Reject anything that is not 16-bit PCM with the given layout
    pub fn require_format(&self, channels: u16, sample_rate: u32) -> Result<(), WavError> {
        if self.channels != channels {
            return Err(WavError::UnsupportedFormat(format!(
                "{} channel(s), expected {}",
                self.channels, channels
            )));
        }
        if self.sample_rate != sample_rate {
            return Err(WavError::UnsupportedFormat(format!(
                "{} Hz, expected {} Hz",
                self.sample_rate, sample_rate
            )));
        }
        if self.bits_per_sample != 16 {
            return Err(WavError::UnsupportedFormat(format!(
                "{}-bit samples, expected 16-bit",
                self.bits_per_sample
            )));
        }
        Ok(())
    }
}

/// Encoder settings for 16-bit integer PCM
pub fn pcm16_spec(channels: u16, sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Fail if `output` names the same file as `input`
///
/// Creating the output truncates it, so writing over the input would lose
/// the audio before it is read. A missing output can never be the input.
pub fn ensure_distinct(input: &Path, output: &Path) -> Result<(), WavError> {
    let source = fs::canonicalize(input)?;
    match fs::canonicalize(output) {
        Ok(target) if target == source => Err(WavError::OverwritesInput(output.to_path_buf())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write a complete 16-bit WAV file, removing it again on failure
///
/// # Arguments
/// * `path` - Destination, created or truncated
/// * `channels` - Interleaved channel count, 1 or 2
/// * `sample_rate` - Sample rate in Hz
/// * `samples` - Interleaved int16 samples
///
/// # Returns
/// The header describing what was written
pub fn write_wav_file(
    path: &Path,
    channels: u16,
    sample_rate: u32,
    samples: &[i16],
) -> Result<WavHeader, WavError> {
    if !(1..=2).contains(&channels) {
        return Err(WavError::UnsupportedFormat(format!(
            "{} channels in a 16-bit PCM header",
            channels
        )));
    }
    let data_size = samples
        .len()
        .checked_mul(2)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|&n| n <= u32::MAX - (HEADER_LEN as u32 - 8))
        .ok_or_else(|| WavError::Inconsistent(format!("{} samples do not fit", samples.len())))?;

    let result = (|| -> Result<(), WavError> {
        let mut writer = hound::WavWriter::create(path, pcm16_spec(channels, sample_rate))?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    })();

    if result.is_err() {
        discard_partial(path);
    }
    result.map(|()| WavHeader::pcm16(channels, sample_rate, data_size))
}

/// Remove an output file left behind by a failed write
pub(crate) fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::warn!("Removed incomplete output {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::error!("Failed to remove incomplete output {}: {}", path.display(), e),
    }
}

fn expect_tag(bytes: &[u8], offset: usize, expected: &'static str) -> Result<(), WavError> {
    let found = &bytes[offset..offset + 4];
    if found == expected.as_bytes() {
        Ok(())
    } else {
        Err(WavError::BadTag {
            expected,
            found: String::from_utf8_lossy(found).into_owned(),
        })
    }
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
