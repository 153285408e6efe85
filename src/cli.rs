//! Command-line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Real-time RNNoise denoising between a microphone and an output device
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List audio input and output devices
    Devices,

    /// Denoise the microphone live to an output device
    Live(LiveCommand),

    /// Record the microphone to a WAV file
    Record(RecordCommand),

    /// Denoise a mono 48 kHz WAV file
    Denoise(DenoiseCommand),

    /// Wrap raw 16-bit PCM in a WAV header
    PcmToWav(PcmToWavCommand),

    /// Strip the header from a mono 48 kHz WAV file
    WavToPcm(WavToPcmCommand),
}

/// Settings shared by the device commands
#[derive(Parser, Debug)]
pub struct DeviceArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input device name (see `devices`)
    #[arg(short, long)]
    pub input: Option<String>,

    /// Capture a single channel instead of stereo
    #[arg(long)]
    pub mono: bool,
}

#[derive(Parser, Debug)]
pub struct LiveCommand {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Output device name (see `devices`)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Start with suppression bypassed
    #[arg(long)]
    pub bypass: bool,

    /// Band-limit the voice before the model
    #[arg(long)]
    pub voice_band: bool,

    /// Stop after this many seconds
    #[arg(long)]
    pub seconds: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct RecordCommand {
    /// WAV file to write
    pub output: PathBuf,

    #[command(flatten)]
    pub device: DeviceArgs,

    /// Maximum recording length
    #[arg(long)]
    pub seconds: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct DenoiseCommand {
    /// Mono 16-bit 48 kHz WAV input
    pub input: PathBuf,

    /// WAV file to write
    pub output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Copy the audio without running the model
    #[arg(long)]
    pub bypass: bool,

    /// Band-limit the voice before the model
    #[arg(long)]
    pub voice_band: bool,
}

#[derive(Parser, Debug)]
pub struct PcmToWavCommand {
    pub input: PathBuf,
    pub output: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub channels: u16,

    #[arg(long, default_value_t = 48000)]
    pub sample_rate: u32,
}

#[derive(Parser, Debug)]
pub struct WavToPcmCommand {
    pub input: PathBuf,
    pub output: PathBuf,
}
