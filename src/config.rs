//! Pipeline configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//! Validation runs before any device or model is touched.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio::backend::DeviceConfig;
use crate::dsp::{ChannelLayout, FilterMode, VoiceBandFilter, RNNOISE_FRAME_SIZE, RNNOISE_SAMPLE_RATE};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No {0} device selected")]
    NoDeviceSelected(&'static str),

    #[error("Unsupported sample rate {0} Hz (only 48000 Hz is supported)")]
    UnsupportedSampleRate(u32),

    #[error("Unsupported {direction} channel count {channels} (expected 1 or 2)")]
    UnsupportedChannels {
        direction: &'static str,
        channels: u16,
    },

    #[error("Frame size must be greater than zero")]
    ZeroFrameSize,

    #[error("Invalid voice band {low_cut_hz} Hz - {high_cut_hz} Hz")]
    InvalidVoiceBand { low_cut_hz: f64, high_cut_hz: f64 },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Optional high-pass/low-pass ahead of the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoiceBandConfig {
    pub enabled: bool,
    pub low_cut_hz: f64,
    pub high_cut_hz: f64,
}

impl Default for VoiceBandConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            low_cut_hz: 80.0,
            high_cut_hz: 8000.0,
        }
    }
}

impl VoiceBandConfig {
    /// Build the filter if enabled
    pub fn build(&self, sample_rate: u32) -> Option<VoiceBandFilter> {
        self.enabled
            .then(|| VoiceBandFilter::new(self.low_cut_hz, self.high_cut_hz, sample_rate as f64))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Samples per model frame
    pub frame_size: usize,
    pub capture_channels: u16,
    pub playback_channels: u16,
    /// Device names; `None` means the host default
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    /// Mode a new session starts in
    pub filter_mode: FilterMode,
    pub voice_band: VoiceBandConfig,
    /// Largest device period the pipeline queues without dropping
    pub max_block_frames: usize,
    /// Capture-to-playback hand-off capacity
    pub capture_buffer_ms: u32,
    /// Recorder capacity
    pub recording_seconds: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: RNNOISE_SAMPLE_RATE,
            frame_size: RNNOISE_FRAME_SIZE,
            capture_channels: 2,
            playback_channels: 2,
            input_device: None,
            output_device: None,
            filter_mode: FilterMode::Suppress,
            voice_band: VoiceBandConfig::default(),
            max_block_frames: 8192,
            capture_buffer_ms: 200,
            recording_seconds: 300,
        }
    }
}

impl AudioConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check everything that can be checked without opening a device
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_capture()?;
        self.playback_layout()?;
        if is_blank(&self.output_device) {
            return Err(ConfigError::NoDeviceSelected("output"));
        }
        Ok(())
    }

    /// Capture-side checks only; playback settings are ignored
    pub fn validate_capture(&self) -> Result<(), ConfigError> {
        if self.sample_rate != RNNOISE_SAMPLE_RATE {
            return Err(ConfigError::UnsupportedSampleRate(self.sample_rate));
        }
        if self.frame_size == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        self.capture_layout()?;
        if is_blank(&self.input_device) {
            return Err(ConfigError::NoDeviceSelected("input"));
        }

        if self.voice_band.enabled {
            let nyquist = self.sample_rate as f64 / 2.0;
            let VoiceBandConfig {
                low_cut_hz,
                high_cut_hz,
                ..
            } = self.voice_band;
            if !(low_cut_hz > 0.0 && low_cut_hz < high_cut_hz && high_cut_hz < nyquist) {
                return Err(ConfigError::InvalidVoiceBand {
                    low_cut_hz,
                    high_cut_hz,
                });
            }
        }

        Ok(())
    }

    pub fn capture_layout(&self) -> Result<ChannelLayout, ConfigError> {
        ChannelLayout::from_count(self.capture_channels).ok_or(ConfigError::UnsupportedChannels {
            direction: "capture",
            channels: self.capture_channels,
        })
    }

    pub fn playback_layout(&self) -> Result<ChannelLayout, ConfigError> {
        ChannelLayout::from_count(self.playback_channels).ok_or(ConfigError::UnsupportedChannels {
            direction: "playback",
            channels: self.playback_channels,
        })
    }

    /// Device-facing subset of the configuration
    pub fn device_config(&self) -> DeviceConfig {
        let capture_buffer_frames =
            (self.sample_rate as usize * self.capture_buffer_ms as usize / 1000).max(self.frame_size);
        DeviceConfig {
            sample_rate: self.sample_rate,
            capture_channels: self.capture_channels,
            playback_channels: self.playback_channels,
            input_device: self.input_device.clone(),
            output_device: self.output_device.clone(),
            capture_buffer_frames,
        }
    }

    /// Recorder capacity in interleaved samples
    pub fn recording_capacity(&self) -> usize {
        self.recording_seconds as usize * self.sample_rate as usize * self.capture_channels as usize
    }
}

fn is_blank(name: &Option<String>) -> bool {
    name.as_deref().is_some_and(|n| n.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AudioConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.frame_size, 480);
        assert_eq!(config.capture_layout().unwrap(), ChannelLayout::Stereo);
        assert_eq!(config.filter_mode, FilterMode::Suppress);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AudioConfig::from_toml_str("").unwrap();
        assert_eq!(config, AudioConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let config = AudioConfig::from_toml_str(
            r#"
            capture_channels = 1
            filter_mode = "bypass"
            input_device = "USB Mic"

            [voice_band]
            enabled = true
            low_cut_hz = 120.0
            "#,
        )
        .unwrap();

        assert_eq!(config.capture_layout().unwrap(), ChannelLayout::Mono);
        assert_eq!(config.filter_mode, FilterMode::Bypass);
        assert_eq!(config.input_device.as_deref(), Some("USB Mic"));
        assert!(config.voice_band.enabled);
        assert_eq!(config.voice_band.low_cut_hz, 120.0);
        assert_eq!(config.voice_band.high_cut_hz, 8000.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = AudioConfig::from_toml_str("sample_rte = 48000").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_failures() {
        let config = AudioConfig {
            sample_rate: 44100,
            ..AudioConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedSampleRate(44100))
        ));

        let config = AudioConfig {
            playback_channels: 6,
            ..AudioConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedChannels {
                direction: "playback",
                channels: 6
            })
        ));

        let config = AudioConfig {
            output_device: Some("  ".to_string()),
            ..AudioConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoDeviceSelected("output"))
        ));

        let config = AudioConfig {
            frame_size: 0,
            ..AudioConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroFrameSize)));

        let mut config = AudioConfig::default();
        config.voice_band = VoiceBandConfig {
            enabled: true,
            low_cut_hz: 9000.0,
            high_cut_hz: 8000.0,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidVoiceBand { .. })
        ));
    }

    #[test]
    fn test_capture_validation_ignores_playback() {
        let config = AudioConfig {
            output_device: Some(String::new()),
            playback_channels: 6,
            ..AudioConfig::default()
        };
        config.validate_capture().unwrap();
        assert!(config.validate().is_err());

        let config = AudioConfig {
            input_device: Some(" ".to_string()),
            ..AudioConfig::default()
        };
        assert!(matches!(
            config.validate_capture(),
            Err(ConfigError::NoDeviceSelected("input"))
        ));
    }

    #[test]
    fn test_device_config_derivation() {
        let config = AudioConfig {
            capture_buffer_ms: 100,
            input_device: Some("Mic".into()),
            ..AudioConfig::default()
        };
        let device = config.device_config();
        assert_eq!(device.capture_buffer_frames, 4800);
        assert_eq!(device.input_device.as_deref(), Some("Mic"));
        assert_eq!(device.output_device, None);
    }

    #[test]
    fn test_recording_capacity() {
        let config = AudioConfig {
            capture_channels: 1,
            recording_seconds: 2,
            ..AudioConfig::default()
        };
        assert_eq!(config.recording_capacity(), 96000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AudioConfig::load(Path::new("/nonexistent/denoise.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
