//! Per-callback processing chain
//!
//! Device block → Framer (downmix) → level → SuppressionStage → int16 clamp →
//! output queue → expand to playback channels. The queue absorbs the
//! mismatch between device periods and model frames; underruns play silence.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use super::backend::{DuplexCallback, FaultFlag};
use super::buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
use super::session::SessionError;
use crate::config::AudioConfig;
use crate::dsp::{
    expand, float_to_pcm, measure, ChannelLayout, FilterMode, Framer, LevelCell, StageOutput,
    SuppressionModel, SuppressionStage,
};

/// State shared between the control thread and the audio thread
///
/// Every field is a single atomic word; nothing here can block either side.
#[derive(Debug)]
pub struct SessionControl {
    processing: AtomicBool,
    filter_mode: AtomicU8,
    faulted: FaultFlag,
    level: LevelCell,
}

impl SessionControl {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            processing: AtomicBool::new(false),
            filter_mode: AtomicU8::new(mode.as_u8()),
            faulted: Arc::new(AtomicBool::new(false)),
            level: LevelCell::new(),
        }
    }

    /// "May process" flag read at the top of every callback
    pub fn set_processing(&self, processing: bool) {
        self.processing.store(processing, Ordering::Release);
    }

    #[inline]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn set_filter_mode(&self, mode: FilterMode) {
        self.filter_mode.store(mode.as_u8(), Ordering::Release);
    }

    #[inline]
    pub fn filter_mode(&self) -> FilterMode {
        FilterMode::from_u8(self.filter_mode.load(Ordering::Acquire))
    }

    /// Flag handed to the backend for stream errors
    pub fn fault_flag(&self) -> FaultFlag {
        Arc::clone(&self.faulted)
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    pub fn clear_fault(&self) {
        self.faulted.store(false, Ordering::Release);
    }

    pub fn level(&self) -> &LevelCell {
        &self.level
    }
}

/// Duplex callback that owns the model for the lifetime of one session
pub struct FramePipeline {
    control: Arc<SessionControl>,
    capture: ChannelLayout,
    playback: ChannelLayout,
    framer: Framer,
    stage: SuppressionStage,
    queue_in: AudioProducer<i16>,
    queue_out: AudioConsumer<i16>,
}

impl FramePipeline {
    /// Build a pipeline around a freshly created model
    ///
    /// Everything the callback touches is allocated here.
    pub fn new(
        config: &AudioConfig,
        control: Arc<SessionControl>,
        model: Box<dyn SuppressionModel>,
    ) -> Result<Self, SessionError> {
        let capture = config.capture_layout()?;
        let playback = config.playback_layout()?;

        let mut stage =
            SuppressionStage::new(config.frame_size, config.voice_band.build(config.sample_rate));
        stage.attach(model)?;

        let queue = AudioRingBuffer::new(config.max_block_frames + 2 * config.frame_size);
        let (queue_in, queue_out) = queue.split();

        Ok(Self {
            control,
            capture,
            playback,
            framer: Framer::new(config.frame_size),
            stage,
            queue_in,
            queue_out,
        })
    }

    /// Samples dropped because the output queue was full
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        self.queue_in.dropped_counter()
    }
}

impl DuplexCallback for FramePipeline {
    fn process(&mut self, output: &mut [i16], input: Option<&[i16]>, frame_count: usize) {
        if !self.control.is_processing() {
            output.fill(0);
            return;
        }
        let Some(input) = input else {
            output.fill(0);
            return;
        };

        let mode = self.control.filter_mode();
        let in_len = (frame_count * self.capture.channels()).min(input.len());

        let Self {
            control,
            capture,
            framer,
            stage,
            queue_in,
            ..
        } = &mut *self;
        framer.push(&input[..in_len], *capture, |frame| {
            control.level().publish(measure(frame.valid_samples()));
            if let StageOutput::Forward(samples) = stage.process(frame.samples, mode) {
                for &sample in &samples[..frame.valid] {
                    queue_in.write_one(float_to_pcm(sample));
                }
            }
        });

        let out_len = (frame_count * self.playback.channels()).min(output.len());
        let (active, rest) = output.split_at_mut(out_len);
        for out_frame in active.chunks_mut(self.playback.channels()) {
            expand(self.queue_out.read_one().unwrap_or(0), out_frame);
        }
        rest.fill(0);
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if let Some(model) = self.stage.release() {
            log::debug!("Releasing {} model", model.name());
        }
    }
}
