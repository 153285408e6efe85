//! Live duplex session lifecycle
//!
//! Idle → Starting → Running → Stopping → Stopped. A failed start rolls back
//! whatever it allocated and lands in Idle. A stream error while running
//! moves the session to Failed until `stop()` cleans up.
//!
//! The model lives inside the pipeline, and the pipeline lives inside the
//! device stream. Stopping clears the "may process" flag, then stops and
//! drops the stream. Once the drop returns no callback can run, and the
//! model has been dropped with the pipeline.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use super::backend::{AudioBackend, AudioStream, DeviceError};
use super::pipeline::{FramePipeline, SessionControl};
use crate::config::{AudioConfig, ConfigError};
use crate::dsp::{create_checked, FilterMode, LevelCell, ModelError, ModelFactory};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One live denoising session over a backend
pub struct Session<B: AudioBackend, F: ModelFactory> {
    backend: B,
    factory: F,
    state: SessionState,
    control: Arc<SessionControl>,
    stream: Option<B::Stream>,
    dropped: Arc<AtomicU64>,
    last_error: Option<String>,
}

impl<B: AudioBackend, F: ModelFactory> Session<B, F> {
    pub fn new(backend: B, factory: F) -> Self {
        Self {
            backend,
            factory,
            state: SessionState::Idle,
            control: Arc::new(SessionControl::new(FilterMode::Suppress)),
            stream: None,
            dropped: Arc::new(AtomicU64::new(0)),
            last_error: None,
        }
    }

    /// Open the device and start processing
    ///
    /// On error nothing allocated by this call survives and the session
    /// is back in `Idle`.
    pub fn start(&mut self, config: &AudioConfig) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle | SessionState::Stopped => {}
            state => {
                return Err(SessionError::InvalidState {
                    action: "start",
                    state,
                })
            }
        }

        // Configuration errors leave no trace, not even a state change
        config.validate()?;

        self.state = SessionState::Starting;
        match self.try_start(config) {
            Ok(()) => {
                self.state = SessionState::Running;
                self.last_error = None;
                log::info!(
                    "Session running ({} Hz, {} in / {} out channels, {:?})",
                    config.sample_rate,
                    config.capture_channels,
                    config.playback_channels,
                    self.control.filter_mode()
                );
                Ok(())
            }
            Err(e) => {
                log::warn!("Session start failed, rolled back: {}", e);
                self.state = SessionState::Idle;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn try_start(&mut self, config: &AudioConfig) -> Result<(), SessionError> {
        let model = create_checked(&self.factory, config.frame_size)?;
        log::debug!("Created {} model", model.name());

        // The configured mode wins over anything set while idle
        self.control.set_filter_mode(config.filter_mode);
        self.control.clear_fault();
        self.control.level().clear();

        let pipeline = FramePipeline::new(config, Arc::clone(&self.control), model)?;
        let dropped = pipeline.dropped_counter();

        // Dropping `pipeline` or `stream` on any error below releases the model
        let mut stream = self.backend.open_duplex(
            &config.device_config(),
            Box::new(pipeline),
            self.control.fault_flag(),
        )?;
        stream.start()?;

        self.control.set_processing(true);
        self.dropped = dropped;
        self.stream = Some(stream);
        Ok(())
    }

    /// Stop processing and release the device and model
    ///
    /// Stopping a session that is not running is a no-op.
    pub fn stop(&mut self) {
        if !matches!(self.state, SessionState::Running | SessionState::Failed) {
            return;
        }

        self.state = SessionState::Stopping;
        self.control.set_processing(false);

        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.stop() {
                log::warn!("Failed to stop audio stream: {}", e);
            }
            drop(stream);
        }

        self.control.level().clear();
        self.control.clear_fault();
        self.state = SessionState::Stopped;
        log::info!("Session stopped");
    }

    /// Current state, promoting Running to Failed after a stream error
    pub fn poll(&mut self) -> SessionState {
        if self.state == SessionState::Running && self.control.is_faulted() {
            log::error!("Audio stream reported an error; session failed");
            self.control.set_processing(false);
            self.last_error = Some("audio stream error".to_string());
            self.state = SessionState::Failed;
        }
        self.state
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Switch between suppression and bypass; safe while running
    pub fn set_filter_mode(&self, mode: FilterMode) {
        self.control.set_filter_mode(mode);
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.control.filter_mode()
    }

    /// Latest level from the audio thread
    pub fn level(&self) -> &LevelCell {
        self.control.level()
    }

    /// Processed samples lost to a full output queue
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Reason for the most recent failed start or stream failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl<B: AudioBackend, F: ModelFactory> Drop for Session<B, F> {
    fn drop(&mut self) {
        self.stop();
    }
}
