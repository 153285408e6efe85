//! In-process fakes for the device backend and the suppression model
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rnnoise_duplex::audio::{
    AudioBackend, AudioStream, CaptureCallback, DeviceConfig, DeviceError, DuplexCallback,
    FaultFlag,
};
use rnnoise_duplex::dsp::{ModelError, ModelFactory, SuppressionModel};

/// Ordered record of lifecycle events across fakes
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<&'static str>>>);

impl Events {
    pub fn push(&self, event: &'static str) {
        self.0.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.snapshot().iter().position(|e| *e == event)
    }
}

/// Shared device state; the test drives callbacks through it
#[derive(Default)]
pub struct FakeDevice {
    duplex: Mutex<Option<Box<dyn DuplexCallback>>>,
    capture: Mutex<Option<Box<dyn CaptureCallback>>>,
    fault: Mutex<Option<FaultFlag>>,
    running: AtomicBool,
    pub fail_open: AtomicBool,
    pub fail_start: AtomicBool,
    pub opened: AtomicUsize,
    pub last_config: Mutex<Option<DeviceConfig>>,
    pub events: Events,
}

impl FakeDevice {
    /// Run one duplex period; false if no stream is running
    pub fn run_duplex(&self, output: &mut [i16], input: Option<&[i16]>, frame_count: usize) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        match self.duplex.lock().unwrap().as_mut() {
            Some(callback) => {
                callback.process(output, input, frame_count);
                true
            }
            None => false,
        }
    }

    /// Run one capture period; false if no stream is running
    pub fn run_capture(&self, input: &[i16], frame_count: usize) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        match self.capture.lock().unwrap().as_mut() {
            Some(callback) => {
                callback.capture(Some(input), frame_count);
                true
            }
            None => false,
        }
    }

    /// Simulate the device reporting a stream error
    pub fn raise_fault(&self) {
        if let Some(flag) = self.fault.lock().unwrap().as_ref() {
            flag.store(true, Ordering::Release);
        }
    }

    pub fn has_stream(&self) -> bool {
        self.duplex.lock().unwrap().is_some() || self.capture.lock().unwrap().is_some()
    }
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub device: Arc<FakeDevice>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Events) -> Self {
        Self {
            device: Arc::new(FakeDevice {
                events,
                ..FakeDevice::default()
            }),
        }
    }

    fn open(&self, config: &DeviceConfig, fault: FaultFlag) -> Result<FakeStream, DeviceError> {
        if self.device.fail_open.load(Ordering::SeqCst) {
            return Err(DeviceError::BuildStream("fake open failure".to_string()));
        }
        self.device.opened.fetch_add(1, Ordering::SeqCst);
        *self.device.last_config.lock().unwrap() = Some(config.clone());
        *self.device.fault.lock().unwrap() = Some(fault);
        self.device.events.push("stream opened");
        Ok(FakeStream {
            device: Arc::clone(&self.device),
        })
    }
}

impl AudioBackend for FakeBackend {
    type Stream = FakeStream;

    fn open_duplex(
        &self,
        config: &DeviceConfig,
        callback: Box<dyn DuplexCallback>,
        fault: FaultFlag,
    ) -> Result<FakeStream, DeviceError> {
        let stream = self.open(config, fault)?;
        *self.device.duplex.lock().unwrap() = Some(callback);
        Ok(stream)
    }

    fn open_capture(
        &self,
        config: &DeviceConfig,
        callback: Box<dyn CaptureCallback>,
        fault: FaultFlag,
    ) -> Result<FakeStream, DeviceError> {
        let stream = self.open(config, fault)?;
        *self.device.capture.lock().unwrap() = Some(callback);
        Ok(stream)
    }
}

pub struct FakeStream {
    device: Arc<FakeDevice>,
}

impl AudioStream for FakeStream {
    fn start(&mut self) -> Result<(), DeviceError> {
        if self.device.fail_start.load(Ordering::SeqCst) {
            return Err(DeviceError::PlayStream("fake start failure".to_string()));
        }
        self.device.running.store(true, Ordering::SeqCst);
        self.device.events.push("stream started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.device.running.store(false, Ordering::SeqCst);
        self.device.events.push("stream stopped");
        Ok(())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.device.running.store(false, Ordering::SeqCst);
        self.device.events.push("stream closed");
        let duplex = self.device.duplex.lock().unwrap().take();
        let capture = self.device.capture.lock().unwrap().take();
        drop(duplex);
        drop(capture);
    }
}

/// Identity model that tracks how many instances are alive
pub struct CountingModel {
    frame_size: usize,
    live: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    events: Events,
}

impl SuppressionModel for CountingModel {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        output.copy_from_slice(input);
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

impl Drop for CountingModel {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.events.push("model dropped");
    }
}

#[derive(Clone)]
pub struct CountingFactory {
    pub frame_size: usize,
    pub created: Arc<AtomicUsize>,
    pub live: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
    pub events: Events,
}

impl CountingFactory {
    pub fn new(events: Events) -> Self {
        Self::with_frame_size(480, events)
    }

    pub fn with_frame_size(frame_size: usize, events: Events) -> Self {
        Self {
            frame_size,
            created: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            events,
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelFactory for CountingFactory {
    fn create(&self) -> Result<Box<dyn SuppressionModel>, ModelError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        self.events.push("model created");
        Ok(Box::new(CountingModel {
            frame_size: self.frame_size,
            live: Arc::clone(&self.live),
            calls: Arc::clone(&self.calls),
            events: self.events.clone(),
        }))
    }
}

pub struct FailingFactory;

impl ModelFactory for FailingFactory {
    fn create(&self) -> Result<Box<dyn SuppressionModel>, ModelError> {
        Err(ModelError::Create("fake model failure".to_string()))
    }
}

/// Interleaved stereo block with the same value on both channels
pub fn stereo_block(value: i16, frames: usize) -> Vec<i16> {
    vec![value; frames * 2]
}
