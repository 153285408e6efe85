//! Audio playback using cpal, driving the duplex callback
//!
//! cpal has no duplex stream, so the playback callback acts as the duplex
//! period: it drains one block of captured samples from the ring buffer,
//! runs the injected processor, and converts its int16 output for the device.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream};
use std::sync::atomic::Ordering;

use super::backend::{DeviceConfig, DeviceError, DuplexCallback, FaultFlag};
use super::buffer::AudioConsumer;
use super::input::{find_stream_config, AudioDeviceInfo};
use crate::dsp::mixer::pcm_to_normalized;

/// Running playback stream
pub struct AudioOutput {
    stream: Stream,
    device_info: AudioDeviceInfo,
}

impl AudioOutput {
    pub fn new(
        device: &Device,
        config: &DeviceConfig,
        mut consumer: AudioConsumer<i16>,
        mut callback: Box<dyn DuplexCallback>,
        fault: FaultFlag,
    ) -> Result<Self, DeviceError> {
        let name = device
            .name()
            .map_err(|e| DeviceError::DeviceName(e.to_string()))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| DeviceError::UnsupportedConfig(e.to_string()))?;
        let stream_config =
            find_stream_config(supported, config.playback_channels, config.sample_rate).ok_or_else(
                || {
                    DeviceError::UnsupportedConfig(format!(
                        "{} playback channel(s) at {} Hz on '{}'",
                        config.playback_channels, config.sample_rate, name
                    ))
                },
            )?;

        let in_channels = config.capture_channels as usize;
        let out_channels = config.playback_channels as usize;
        // Keep capture latency bounded when the capture clock runs ahead
        let backlog_limit = consumer.capacity() / 2;

        let mut input_scratch: Vec<i16> = Vec::with_capacity(8192);
        let mut output_scratch: Vec<i16> = Vec::with_capacity(8192);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / out_channels;
                    let in_len = frames * in_channels;
                    if input_scratch.len() < in_len {
                        input_scratch.resize(in_len, 0);
                    }
                    if output_scratch.len() < data.len() {
                        output_scratch.resize(data.len(), 0);
                    }

                    let backlog = consumer.len();
                    if backlog > backlog_limit {
                        let excess = backlog - backlog_limit;
                        consumer.discard(excess - excess % in_channels);
                    }

                    let input = if consumer.is_empty() {
                        None
                    } else {
                        consumer.read_or_silence(&mut input_scratch[..in_len]);
                        Some(&input_scratch[..in_len])
                    };

                    let output = &mut output_scratch[..data.len()];
                    callback.process(output, input, frames);

                    for (dst, &src) in data.iter_mut().zip(output.iter()) {
                        *dst = pcm_to_normalized(src);
                    }
                },
                move |err| {
                    log::error!("Audio output error: {}", err);
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
                channels: config.playback_channels,
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
