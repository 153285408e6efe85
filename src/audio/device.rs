//! Audio device enumeration and the cpal backend

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use super::backend::{
    AudioBackend, AudioStream, CaptureCallback, DeviceConfig, DeviceError, DuplexCallback,
    FaultFlag,
};
use super::buffer::AudioRingBuffer;
use super::input::AudioInput;
use super::output::AudioOutput;

/// Information about an audio device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// List all available input (microphone) devices
pub fn list_input_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| DeviceError::DeviceName(e.to_string()))?
        .filter_map(|device| {
            device.name().ok().map(|name| DeviceInfo {
                is_default: default_name.as_ref() == Some(&name),
                name,
            })
        })
        .collect();

    Ok(devices)
}

/// List all available output devices
pub fn list_output_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .map_err(|e| DeviceError::DeviceName(e.to_string()))?
        .filter_map(|device| {
            device.name().ok().map(|name| DeviceInfo {
                is_default: default_name.as_ref() == Some(&name),
                name,
            })
        })
        .collect();

    Ok(devices)
}

fn find_input_device(host: &Host, name: Option<&str>) -> Result<Device, DeviceError> {
    match name {
        None => host.default_input_device().ok_or(DeviceError::NoDevice),
        Some(name) => host
            .input_devices()
            .map_err(|e| DeviceError::DeviceName(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| DeviceError::DeviceNotFound(name.to_string())),
    }
}

fn find_output_device(host: &Host, name: Option<&str>) -> Result<Device, DeviceError> {
    match name {
        None => host.default_output_device().ok_or(DeviceError::NoDevice),
        Some(name) => host
            .output_devices()
            .map_err(|e| DeviceError::DeviceName(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| DeviceError::DeviceNotFound(name.to_string())),
    }
}

/// Backend over the platform's default cpal host
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture stream plus, for duplex, the playback stream that drives processing
pub struct CpalStream {
    input: AudioInput,
    output: Option<AudioOutput>,
}

impl AudioStream for CpalStream {
    fn start(&mut self) -> Result<(), DeviceError> {
        self.input.start()?;
        if let Some(output) = &self.output {
            if let Err(e) = output.start() {
                let _ = self.input.pause();
                return Err(e);
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        let input = self.input.pause();
        if let Some(output) = &self.output {
            output.pause()?;
        }
        input
    }
}

impl AudioBackend for CpalBackend {
    type Stream = CpalStream;

    fn open_duplex(
        &self,
        config: &DeviceConfig,
        callback: Box<dyn DuplexCallback>,
        fault: FaultFlag,
    ) -> Result<CpalStream, DeviceError> {
        let input_device = find_input_device(&self.host, config.input_device.as_deref())?;
        let output_device = find_output_device(&self.host, config.output_device.as_deref())?;

        let ring = AudioRingBuffer::<i16>::new(
            config.capture_buffer_frames * config.capture_channels as usize,
        );
        let (producer, consumer) = ring.split();

        let input = AudioInput::to_ring(&input_device, config, producer, fault.clone())?;
        let output = AudioOutput::new(&output_device, config, consumer, callback, fault)?;

        log::info!(
            "Opened duplex stream: '{}' -> '{}'",
            input.device_info().name,
            output.device_info().name
        );

        Ok(CpalStream {
            input,
            output: Some(output),
        })
    }

    fn open_capture(
        &self,
        config: &DeviceConfig,
        callback: Box<dyn CaptureCallback>,
        fault: FaultFlag,
    ) -> Result<CpalStream, DeviceError> {
        let input_device = find_input_device(&self.host, config.input_device.as_deref())?;
        let input = AudioInput::to_callback(&input_device, config, callback, fault)?;

        log::info!("Opened capture stream: '{}'", input.device_info().name);

        Ok(CpalStream {
            input,
            output: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // No devices on CI is fine; enumeration must not panic
        let _ = list_input_devices();
        let _ = list_output_devices();
    }

    #[test]
    fn test_unknown_device_name() {
        let host = cpal::default_host();
        let result = find_input_device(&host, Some("definitely-not-a-real-device-name"));
        assert!(result.is_err());
    }
}
