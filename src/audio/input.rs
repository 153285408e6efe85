//! Audio capture using cpal
//!
//! The device runs an f32 stream at the session rate; blocks are converted
//! to interleaved int16 and handed to a sink on the capture thread.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};
use std::sync::atomic::Ordering;

use super::backend::{CaptureCallback, DeviceConfig, DeviceError, FaultFlag};
use super::buffer::AudioProducer;
use crate::dsp::mixer::normalized_to_pcm;

/// Name and format of an opened stream
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Running capture stream
pub struct AudioInput {
    stream: Stream,
    device_info: AudioDeviceInfo,
}

impl AudioInput {
    /// Capture into a ring buffer read by the playback side
    pub fn to_ring(
        device: &Device,
        config: &DeviceConfig,
        mut producer: AudioProducer<i16>,
        fault: FaultFlag,
    ) -> Result<Self, DeviceError> {
        Self::build(device, config, fault, move |block: &[i16]| {
            producer.write(block);
        })
    }

    /// Capture straight into a callback
    pub fn to_callback(
        device: &Device,
        config: &DeviceConfig,
        mut callback: Box<dyn CaptureCallback>,
        fault: FaultFlag,
    ) -> Result<Self, DeviceError> {
        let channels = config.capture_channels as usize;
        Self::build(device, config, fault, move |block: &[i16]| {
            callback.capture(Some(block), block.len() / channels);
        })
    }

    fn build<S>(
        device: &Device,
        config: &DeviceConfig,
        fault: FaultFlag,
        mut sink: S,
    ) -> Result<Self, DeviceError>
    where
        S: FnMut(&[i16]) + Send + 'static,
    {
        let name = device
            .name()
            .map_err(|e| DeviceError::DeviceName(e.to_string()))?;

        let supported = device
            .supported_input_configs()
            .map_err(|e| DeviceError::UnsupportedConfig(e.to_string()))?;
        let stream_config = find_stream_config(supported, config.capture_channels, config.sample_rate)
            .ok_or_else(|| {
                DeviceError::UnsupportedConfig(format!(
                    "{} capture channel(s) at {} Hz on '{}'",
                    config.capture_channels, config.sample_rate, name
                ))
            })?;

        // Grows only if the driver hands us a bigger period than before
        let mut scratch: Vec<i16> = Vec::with_capacity(8192);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if scratch.len() < data.len() {
                        scratch.resize(data.len(), 0);
                    }
                    let block = &mut scratch[..data.len()];
                    for (dst, &src) in block.iter_mut().zip(data) {
                        *dst = normalized_to_pcm(src);
                    }
                    sink(block);
                },
                move |err| {
                    log::error!("Audio input error: {}", err);
                    fault.store(true, Ordering::Release);
                },
                None,
            )
            .map_err(|e| DeviceError::BuildStream(e.to_string()))?;

        Ok(Self {
            stream,
            device_info: AudioDeviceInfo {
                name,
                sample_rate: config.sample_rate,
                channels: config.capture_channels,
            },
        })
    }

    pub fn start(&self) -> Result<(), DeviceError> {
        self.stream
            .play()
            .map_err(|e| DeviceError::PlayStream(e.to_string()))
    }

    pub fn pause(&self) -> Result<(), DeviceError> {
        self.stream
            .pause()
            .map_err(|e| DeviceError::PauseStream(e.to_string()))
    }

    pub fn device_info(&self) -> &AudioDeviceInfo {
        &self.device_info
    }
}

/// Pick a supported range with the right channel count that covers the rate
pub(crate) fn find_stream_config(
    configs: impl Iterator<Item = SupportedStreamConfigRange>,
    channels: u16,
    sample_rate: u32,
) -> Option<StreamConfig> {
    configs
        .filter(|c| c.channels() == channels)
        .find(|c| c.min_sample_rate().0 <= sample_rate && sample_rate <= c.max_sample_rate().0)
        .map(|c| c.with_sample_rate(SampleRate(sample_rate)).config())
}
