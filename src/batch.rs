//! Offline WAV denoising
//!
//! A [`BatchJob`] runs the same framer and suppression stage as the live
//! pipeline, one frame per [`BatchJob::step`], so a host can interleave it
//! with its own event loop and report progress.

use hound::WavWriter;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{AudioConfig, VoiceBandConfig};
use crate::dsp::{
    create_checked, float_to_pcm, ChannelLayout, FilterMode, Framer, ModelError, ModelFactory,
    StageOutput, SuppressionStage, RNNOISE_FRAME_SIZE, RNNOISE_SAMPLE_RATE,
};
use crate::wav::{discard_partial, ensure_distinct, pcm16_spec, WavError, WavHeader};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Wav(#[from] WavError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Input ended after {available} of {expected} samples")]
    Truncated { expected: u64, available: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    pub filter_mode: FilterMode,
    pub voice_band: VoiceBandConfig,
    pub frame_size: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            filter_mode: FilterMode::Suppress,
            voice_band: VoiceBandConfig::default(),
            frame_size: RNNOISE_FRAME_SIZE,
        }
    }
}

impl From<&AudioConfig> for BatchOptions {
    fn from(config: &AudioConfig) -> Self {
        Self {
            filter_mode: config.filter_mode,
            voice_band: config.voice_band.clone(),
            frame_size: config.frame_size,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed_samples: u64,
    pub total_samples: u64,
}

impl BatchProgress {
    /// Fraction in [0, 1]; an empty input counts as done
    pub fn fraction(&self) -> f64 {
        if self.total_samples == 0 {
            1.0
        } else {
            self.processed_samples as f64 / self.total_samples as f64
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchSummary {
    pub input_samples: u64,
    pub output_samples: u64,
    /// Frames pushed through the stage, including the padded tail
    pub frames: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchStatus {
    InProgress(BatchProgress),
    Complete(BatchSummary),
}

/// One input file being denoised into one output file
pub struct BatchJob {
    reader: BufReader<File>,
    writer: Option<WavWriter<BufWriter<File>>>,
    output: PathBuf,
    framer: Framer,
    stage: SuppressionStage,
    mode: FilterMode,
    read_bytes: Vec<u8>,
    block: Vec<i16>,
    processed: Vec<i16>,
    total_samples: u64,
    input_samples: u64,
    output_samples: u64,
    frames: u64,
    summary: Option<BatchSummary>,
}

impl BatchJob {
    /// Validate the input and prepare the output
    ///
    /// The input must be mono 16-bit 48 kHz PCM. Format problems, and an
    /// output that names the input file, are reported before the model is
    /// created or the output is touched.
    ///
    /// # Arguments
    /// * `input` - Source WAV file
    /// * `output` - Destination WAV file, created or truncated
    /// * `factory` - Creates the model; called once, after validation
    /// * `options` - Filter mode, voice-band settings and frame size
    pub fn open<F: ModelFactory + ?Sized>(
        input: &Path,
        output: &Path,
        factory: &F,
        options: &BatchOptions,
    ) -> Result<Self, BatchError> {
        ensure_distinct(input, output)?;
        let mut reader = BufReader::new(File::open(input)?);
        let header = WavHeader::read_from(&mut reader)?;
        if let Err(e) = header.require_format(1, RNNOISE_SAMPLE_RATE) {
            log::warn!("Rejected {}: {}", input.display(), e);
            return Err(e.into());
        }

        let frame_size = options.frame_size;
        let model = create_checked(factory, frame_size)?;
        let mut stage = SuppressionStage::new(frame_size, options.voice_band.build(RNNOISE_SAMPLE_RATE));
        stage.attach(model)?;

        let writer = match WavWriter::create(output, pcm16_spec(1, RNNOISE_SAMPLE_RATE)) {
            Ok(writer) => writer,
            Err(e) => {
                discard_partial(output);
                return Err(WavError::from(e).into());
            }
        };

        log::info!(
            "Denoising {} -> {} ({} samples, {:?})",
            input.display(),
            output.display(),
            header.sample_count(),
            options.filter_mode
        );

        Ok(Self {
            reader,
            writer: Some(writer),
            output: output.to_path_buf(),
            framer: Framer::new(frame_size),
            stage,
            mode: options.filter_mode,
            read_bytes: vec![0; frame_size * 2],
            block: Vec::with_capacity(frame_size),
            processed: Vec::with_capacity(frame_size),
            total_samples: header.sample_count(),
            input_samples: 0,
            output_samples: 0,
            frames: 0,
            summary: None,
        })
    }

    pub fn progress(&self) -> BatchProgress {
        BatchProgress {
            processed_samples: self.input_samples,
            total_samples: self.total_samples,
        }
    }

    /// Process one frame of input
    ///
    /// Once complete, further calls keep returning the same summary. Any
    /// error removes the partial output and ends the job.
    pub fn step(&mut self) -> Result<BatchStatus, BatchError> {
        if let Some(summary) = self.summary {
            return Ok(BatchStatus::Complete(summary));
        }
        if self.writer.is_none() {
            return Err(BatchError::Io(io::Error::new(
                io::ErrorKind::Other,
                "batch job already failed",
            )));
        }

        match self.advance() {
            Ok(status) => Ok(status),
            Err(e) => {
                log::warn!("Batch job failed: {}", e);
                self.abort();
                Err(e)
            }
        }
    }

    /// Step until done, reporting progress after every frame
    pub fn run<P: FnMut(BatchProgress)>(mut self, mut on_progress: P) -> Result<BatchSummary, BatchError> {
        loop {
            match self.step()? {
                BatchStatus::InProgress(progress) => on_progress(progress),
                BatchStatus::Complete(summary) => {
                    on_progress(self.progress());
                    return Ok(summary);
                }
            }
        }
    }

    /// Abandon the job and remove the partial output
    pub fn cancel(mut self) {
        if self.summary.is_none() {
            log::info!("Batch job cancelled");
            self.abort();
        }
    }

    fn advance(&mut self) -> Result<BatchStatus, BatchError> {
        let remaining = self.total_samples - self.input_samples;
        if remaining == 0 {
            return self.finish();
        }

        let want = remaining.min(self.framer.frame_size() as u64) as usize;
        let got = read_up_to(&mut self.reader, &mut self.read_bytes[..want * 2])?;
        if got < want * 2 {
            return Err(BatchError::Truncated {
                expected: self.total_samples,
                available: self.input_samples + (got / 2) as u64,
            });
        }

        self.block.clear();
        self.block.extend(
            self.read_bytes[..got]
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );
        self.input_samples += want as u64;

        let Self {
            framer,
            stage,
            mode,
            block,
            processed,
            frames,
            ..
        } = &mut *self;
        processed.clear();
        framer.push(&block[..], ChannelLayout::Mono, |frame| {
            *frames += 1;
            if let StageOutput::Forward(samples) = stage.process(frame.samples, *mode) {
                processed.extend(samples[..frame.valid].iter().map(|&s| float_to_pcm(s)));
            }
        });
        self.write_processed()?;

        let progress = self.progress();
        log::debug!("Batch progress {:.1}%", progress.fraction() * 100.0);
        Ok(BatchStatus::InProgress(progress))
    }

    fn finish(&mut self) -> Result<BatchStatus, BatchError> {
        let Self {
            framer,
            stage,
            mode,
            processed,
            frames,
            ..
        } = &mut *self;
        processed.clear();
        framer.flush(|frame| {
            *frames += 1;
            if let StageOutput::Forward(samples) = stage.process(frame.samples, *mode) {
                processed.extend(samples[..frame.valid].iter().map(|&s| float_to_pcm(s)));
            }
        });
        self.write_processed()?;

        if let Some(writer) = self.writer.take() {
            // hound patches the RIFF and data sizes here
            if let Err(e) = writer.finalize() {
                discard_partial(&self.output);
                return Err(WavError::from(e).into());
            }
        }

        let summary = BatchSummary {
            input_samples: self.input_samples,
            output_samples: self.output_samples,
            frames: self.frames,
        };
        log::info!(
            "Wrote {} ({} of {} samples, {} frames)",
            self.output.display(),
            summary.output_samples,
            summary.input_samples,
            summary.frames
        );
        if let Some(model) = self.stage.release() {
            log::debug!("Releasing {} model", model.name());
        }
        self.summary = Some(summary);
        Ok(BatchStatus::Complete(summary))
    }

    fn write_processed(&mut self) -> Result<(), BatchError> {
        if let Some(writer) = self.writer.as_mut() {
            for &sample in &self.processed {
                writer.write_sample(sample).map_err(WavError::from)?;
            }
            self.output_samples += self.processed.len() as u64;
        }
        Ok(())
    }

    fn abort(&mut self) {
        if self.writer.take().is_some() {
            discard_partial(&self.output);
        }
    }
}

impl Drop for BatchJob {
    fn drop(&mut self) {
        if self.summary.is_none() {
            self.abort();
        }
    }
}

/// Like `read_exact`, but reports how much was read at end of file
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
