//! Raw headerless int16 PCM <-> WAV conversion
//!
//! Both directions are a header plus a sample-for-sample copy. Failed
//! conversions remove whatever output they created, and neither direction
//! will write over its own input.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::dsp::RNNOISE_SAMPLE_RATE;
use crate::wav::{discard_partial, ensure_distinct, pcm16_spec, WavError, WavHeader, HEADER_LEN};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Wav(#[from] WavError),

    #[error("Input is empty")]
    Empty,

    #[error("Input is {0} bytes, not a whole number of 16-bit sample frames")]
    OddLength(u64),

    #[error("Input is {0} bytes, too large for a WAV file")]
    TooLarge(u64),

    #[error("Expected {expected} bytes of sample data, found {actual}")]
    Truncated { expected: u64, actual: u64 },
}

/// Wrap a raw PCM file in a 16-bit WAV header
///
/// # Arguments
/// * `input` - Headerless little-endian int16 samples
/// * `output` - Destination WAV file; must not be `input`
/// * `channels` - Interleaved channel count, 1 or 2
/// * `sample_rate` - Rate recorded in the header, in Hz
///
/// # Returns
/// The header of the written file
pub fn pcm_to_wav(
    input: &Path,
    output: &Path,
    channels: u16,
    sample_rate: u32,
) -> Result<WavHeader, ConvertError> {
    ensure_distinct(input, output)?;
    if !(1..=2).contains(&channels) {
        return Err(WavError::UnsupportedFormat(format!("{} channels", channels)).into());
    }

    let file = File::open(input)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Err(ConvertError::Empty);
    }
    if len % (2 * channels as u64) != 0 {
        return Err(ConvertError::OddLength(len));
    }
    let data_size = u32::try_from(len)
        .ok()
        .filter(|&n| n <= u32::MAX - (HEADER_LEN as u32 - 8))
        .ok_or(ConvertError::TooLarge(len))?;

    let header = WavHeader::pcm16(channels, sample_rate, data_size);
    let mut reader = BufReader::new(file);

    let result = (|| -> Result<(), ConvertError> {
        let mut writer =
            hound::WavWriter::create(output, pcm16_spec(channels, sample_rate)).map_err(WavError::from)?;
        let mut sample = [0u8; 2];
        for copied in (0..len).step_by(2) {
            match reader.read_exact(&mut sample) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(ConvertError::Truncated {
                        expected: len,
                        actual: copied,
                    })
                }
                Err(e) => return Err(e.into()),
            }
            writer
                .write_sample(i16::from_le_bytes(sample))
                .map_err(WavError::from)?;
        }
        writer.finalize().map_err(WavError::from)?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            log::info!(
                "Wrote {} ({} bytes of {} Hz / {} ch PCM)",
                output.display(),
                len,
                sample_rate,
                channels
            );
            Ok(header)
        }
        Err(e) => {
            discard_partial(output);
            Err(e)
        }
    }
}

/// Strip the header from a mono 16-bit 48 kHz WAV file
pub fn wav_to_pcm(input: &Path, output: &Path) -> Result<WavHeader, ConvertError> {
    ensure_distinct(input, output)?;
    let mut reader = BufReader::new(File::open(input)?);
    let header = WavHeader::read_from(&mut reader)?;
    header.require_format(1, RNNOISE_SAMPLE_RATE)?;

    let expected = header.data_size as u64;
    let result = (|| -> Result<(), ConvertError> {
        let mut writer = BufWriter::new(File::create(output)?);
        let copied = io::copy(&mut (&mut reader).take(expected), &mut writer)?;
        if copied != expected {
            return Err(ConvertError::Truncated {
                expected,
                actual: copied,
            });
        }
        writer.flush()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            log::info!("Wrote {} ({} bytes of PCM)", output.display(), expected);
            Ok(header)
        }
        Err(e) => {
            discard_partial(output);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_pcm_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("in.pcm");
        let wav = dir.path().join("out.wav");
        let back = dir.path().join("back.pcm");

        let bytes: Vec<u8> = (0..960u32).map(|i| (i * 7) as u8).collect();
        fs::write(&raw, &bytes).unwrap();

        let header = pcm_to_wav(&raw, &wav, 1, 48000).unwrap();
        assert_eq!(header.data_size, 960);
        assert_eq!(fs::metadata(&wav).unwrap().len(), 44 + 960);

        wav_to_pcm(&wav, &back).unwrap();
        assert_eq!(fs::read(&back).unwrap(), bytes);
    }

    #[test]
    fn test_pcm_to_wav_rejects_odd_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("in.pcm");
        let wav = dir.path().join("out.wav");

        fs::write(&raw, [1u8, 2, 3]).unwrap();
        assert!(matches!(
            pcm_to_wav(&raw, &wav, 1, 48000),
            Err(ConvertError::OddLength(3))
        ));
        assert!(!wav.exists());

        fs::write(&raw, []).unwrap();
        assert!(matches!(
            pcm_to_wav(&raw, &wav, 1, 48000),
            Err(ConvertError::Empty)
        ));
        assert!(!wav.exists());
    }

    #[test]
    fn test_wav_to_pcm_rejects_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("stereo.wav");
        let raw = dir.path().join("out.pcm");

        let mut bytes = WavHeader::pcm16(2, 48000, 8).to_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        fs::write(&wav, bytes).unwrap();

        assert!(matches!(
            wav_to_pcm(&wav, &raw),
            Err(ConvertError::Wav(WavError::UnsupportedFormat(_)))
        ));
        assert!(!raw.exists());
    }

    #[test]
    fn test_wav_to_pcm_truncated_data_removes_output() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("short.wav");
        let raw = dir.path().join("out.pcm");

        let mut bytes = WavHeader::pcm16(1, 48000, 100).to_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 40]);
        fs::write(&wav, bytes).unwrap();

        assert!(matches!(
            wav_to_pcm(&wav, &raw),
            Err(ConvertError::Truncated {
                expected: 100,
                actual: 40
            })
        ));
        assert!(!raw.exists());
    }
}
