//! rnnoise-duplex command-line host

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod cli;
use cli::{Cli, Commands, DenoiseCommand, DeviceArgs, LiveCommand, RecordCommand};

use rnnoise_duplex::audio::{list_input_devices, list_output_devices, CpalBackend, DeviceInfo};
use rnnoise_duplex::batch::{BatchJob, BatchOptions};
use rnnoise_duplex::{
    pcm, AudioConfig, FilterMode, Recorder, RecorderState, RnnoiseFactory, Session, SessionState,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const METER_WIDTH: usize = 40;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => list_devices(),
        Commands::Live(cmd) => run_live(cmd),
        Commands::Record(cmd) => run_record(cmd),
        Commands::Denoise(cmd) => run_denoise(cmd),
        Commands::PcmToWav(cmd) => {
            pcm::pcm_to_wav(&cmd.input, &cmd.output, cmd.channels, cmd.sample_rate)
                .with_context(|| format!("Failed to convert {}", cmd.input.display()))?;
            Ok(())
        }
        Commands::WavToPcm(cmd) => {
            pcm::wav_to_pcm(&cmd.input, &cmd.output)
                .with_context(|| format!("Failed to convert {}", cmd.input.display()))?;
            Ok(())
        }
    }
}

fn list_devices() -> Result<()> {
    fn print(title: &str, devices: &[DeviceInfo]) {
        println!("{}:", title);
        for device in devices {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("  - {}{}", device.name, marker);
        }
    }

    print("Input devices", &list_input_devices().context("Failed to list input devices")?);
    print("Output devices", &list_output_devices().context("Failed to list output devices")?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AudioConfig> {
    match path {
        Some(path) => AudioConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AudioConfig::default()),
    }
}

fn apply_device_args(config: &mut AudioConfig, args: &DeviceArgs) {
    if let Some(input) = &args.input {
        config.input_device = Some(input.clone());
    }
    if args.mono {
        config.capture_channels = 1;
    }
}

/// Set by Ctrl+C; polled by the host loops
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl+C handler")?;
    Ok(running)
}

fn draw_meter(label: &str, level: f32) {
    let filled = ((level.clamp(0.0, 1.0) * METER_WIDTH as f32).round() as usize).min(METER_WIDTH);
    print!(
        "\r{} [{}{}] {:>5.1}%",
        label,
        "#".repeat(filled),
        " ".repeat(METER_WIDTH - filled),
        level * 100.0
    );
    let _ = std::io::stdout().flush();
}

fn run_live(cmd: LiveCommand) -> Result<()> {
    let mut config = load_config(cmd.device.config.as_deref())?;
    apply_device_args(&mut config, &cmd.device);
    if let Some(output) = &cmd.output {
        config.output_device = Some(output.clone());
    }
    if cmd.bypass {
        config.filter_mode = FilterMode::Bypass;
    }
    if cmd.voice_band {
        config.voice_band.enabled = true;
    }

    let running = interrupt_flag()?;
    let deadline = cmd.seconds.map(|s| Instant::now() + Duration::from_secs(s));

    let mut session = Session::new(CpalBackend::new(), RnnoiseFactory);
    session.start(&config).context("Failed to start live session")?;
    info!("Denoising live... Press Ctrl+C to stop.");

    let mut level = 0.0;
    while running.load(Ordering::Relaxed) && deadline.map_or(true, |d| Instant::now() < d) {
        std::thread::sleep(POLL_INTERVAL);

        if session.poll() == SessionState::Failed {
            println!();
            let reason = session.last_error().unwrap_or("unknown error").to_string();
            session.stop();
            bail!("Live session failed: {}", reason);
        }
        if let Some(latest) = session.level().take() {
            level = latest;
        }
        draw_meter("in", level);
    }
    println!();

    let dropped = session.dropped_samples();
    session.stop();
    if dropped > 0 {
        log::warn!("{} processed samples were dropped by a full output queue", dropped);
    }
    Ok(())
}

fn run_record(cmd: RecordCommand) -> Result<()> {
    let mut config = load_config(cmd.device.config.as_deref())?;
    apply_device_args(&mut config, &cmd.device);
    if let Some(seconds) = cmd.seconds {
        config.recording_seconds = seconds;
    }

    let running = interrupt_flag()?;

    let mut recorder = Recorder::new(CpalBackend::new(), &config).context("Failed to set up recorder")?;
    recorder.start().context("Failed to start recording")?;
    info!("Recording... Press Ctrl+C to stop.");

    while running.load(Ordering::Relaxed) && !recorder.is_full() {
        std::thread::sleep(POLL_INTERVAL);
        if recorder.poll() == RecorderState::Stopped {
            println!();
            log::error!("Capture stream failed; saving what was recorded");
            break;
        }
        draw_meter("rec", recorder.level().latest());
    }
    println!();

    recorder.stop();
    if recorder.truncated() {
        log::warn!("Recording reached its {} s limit", config.recording_seconds);
    }
    recorder
        .save(&cmd.output)
        .with_context(|| format!("Failed to save {}", cmd.output.display()))?;
    Ok(())
}

fn run_denoise(cmd: DenoiseCommand) -> Result<()> {
    let config = load_config(cmd.config.as_deref())?;
    let mut options = BatchOptions::from(&config);
    if cmd.bypass {
        options.filter_mode = FilterMode::Bypass;
    }
    if cmd.voice_band {
        options.voice_band.enabled = true;
    }

    let job = BatchJob::open(&cmd.input, &cmd.output, &RnnoiseFactory, &options)
        .with_context(|| format!("Failed to open {}", cmd.input.display()))?;

    let mut last_percent = u32::MAX;
    let summary = job
        .run(|progress| {
            let percent = (progress.fraction() * 100.0) as u32;
            if percent != last_percent {
                last_percent = percent;
                print!("\rDenoising {:>3}%", percent);
                let _ = std::io::stdout().flush();
            }
        })
        .with_context(|| format!("Failed to denoise {}", cmd.input.display()))?;
    println!();

    info!(
        "Wrote {} samples to {}",
        summary.output_samples,
        cmd.output.display()
    );
    Ok(())
}
