//! ByteStep Player - headless byte-step convergence synthesis
//!
//! This is the main entry point. It:
//! 1. Loads the player config and scans the sample directory
//! 2. Starts the cpal output stream, which owns the engine
//! 3. Spawns the coordinator service that keeps every lane fed
//! 4. Prints lane levels until Enter is pressed
//!
//! ## Command line flags
//!
//! - `--config <path>`: config file (default `~/.config/bytestep/player.yaml`)
//! - `--samples <dir>`: override the sample directory
//! - `--lanes <n>`: override the lane count
//! - `--seed <n>`: seed every random choice
//! - `--list-devices`: print output devices and exit

mod config;
mod source;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytestep_core::audio::{list_output_devices, start_audio_system};
use bytestep_core::coordinator::{CoordinatorCommand, CoordinatorEvent, CoordinatorService, LevelReport};
use bytestep_core::engine::{command_channel, ByteStepEngine};
use bytestep_core::source::SampleSource;
use clap::Parser;
use crossbeam::channel::{self, Receiver};

use config::PlayerConfig;
use source::DirectorySampleSource;

/// Coordinator events buffered for the status thread
const EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
#[command(name = "bytestep-player")]
#[command(about = "Headless byte-step convergence player")]
struct Args {
    /// Config file (default ~/.config/bytestep/player.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the sample directory
    #[arg(long)]
    samples: Option<PathBuf>,

    /// Override the lane count
    #[arg(long)]
    lanes: Option<usize>,

    /// Seed every random choice
    #[arg(long)]
    seed: Option<u64>,

    /// Print output devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Args {
    fn apply(&self, config: &mut PlayerConfig) {
        if let Some(dir) = &self.samples {
            config.sample_dir = dir.clone();
        }
        if let Some(lanes) = self.lanes {
            config.engine.lanes = lanes;
        }
        if self.seed.is_some() {
            config.engine.seed = self.seed;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if args.list_devices {
        for device in list_output_devices()? {
            println!("{} ({} ch)", device, device.max_channels);
        }
        return Ok(());
    }

    log::info!("bytestep-player starting up");

    let config_path = args.config.clone().unwrap_or_else(config::default_config_file);
    let mut config = config::load(&config_path);
    args.apply(&mut config);

    let mut source = DirectorySampleSource::open(&config.sample_dir, config.engine.seed)
        .with_context(|| format!("No usable samples in {:?}", config.sample_dir))?;
    let initial = source
        .fetch_sample()
        .context("Failed to load the start-up sample")?
        .into_stereo();

    let engine_config = &config.engine;
    let (engine, lane_events) = ByteStepEngine::new(
        engine_config.lane_count(),
        engine_config.convergence_params(),
        engine_config.mixer,
    );
    let atomics = engine.lane_atomics();
    let (command_tx, command_rx) = command_channel();

    let audio = start_audio_system(&engine_config.audio, engine, command_rx)
        .context("Failed to start audio output")?;
    if audio.sample_rate() != initial.sample_rate() {
        log::warn!(
            "Output runs at {}Hz but samples are {}Hz; playback speed will be off",
            audio.sample_rate(),
            initial.sample_rate()
        );
    }

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                      ByteStep Player                         ║");
    println!("║           {} lanes, {:>5} Hz, {:>5.1} ms latency                ║",
        engine_config.lane_count(), audio.sample_rate(), audio.latency_ms());
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("Press Enter to stop.");
    println!();

    let (event_tx, event_rx) = channel::bounded(EVENT_QUEUE_CAPACITY);
    let mut coordinator = CoordinatorService::spawn(
        engine_config.coordinator_config(),
        command_tx,
        lane_events,
        atomics,
        Box::new(source),
        Some(event_tx),
    );
    coordinator
        .send(CoordinatorCommand::Bootstrap(initial))
        .context("Coordinator service is not running")?;

    let status_interval = Duration::from_millis(config.status_interval_ms);
    let status = thread::Builder::new()
        .name("bytestep-status".to_string())
        .spawn(move || run_status(event_rx, status_interval))
        .context("Failed to spawn status thread")?;

    let mut line = String::new();
    if let Err(e) = std::io::stdin().read_line(&mut line) {
        log::warn!("stdin unavailable ({}), stopping", e);
    }

    log::info!("Shutting down");
    coordinator.shutdown();
    drop(audio);
    // The status thread ends once the service drops its event sender
    if status.join().is_err() {
        log::error!("Status thread panicked");
    }
    Ok(())
}

/// Log coordinator activity and print a level line every `interval`
fn run_status(events: Receiver<CoordinatorEvent>, interval: Duration) {
    let mut last_print = Instant::now();
    let mut deliveries = 0u64;

    for event in events {
        match event {
            CoordinatorEvent::ServiceStarted => log::info!("Coordinator running"),
            CoordinatorEvent::ServiceStopped => log::info!("Coordinator stopped"),
            CoordinatorEvent::Notification(notification) => {
                log::debug!("{:?}", notification);
            }
            CoordinatorEvent::PairDelivered { .. } => deliveries += 1,
            CoordinatorEvent::Levels(report) => {
                if !interval.is_zero() && last_print.elapsed() >= interval {
                    last_print = Instant::now();
                    println!("{}  pairs {}", format_levels(&report), deliveries);
                }
            }
        }
    }
}

fn format_levels(report: &LevelReport) -> String {
    report
        .lanes
        .iter()
        .map(|l| {
            format!(
                "L{} {} {:>5.1}% rms {:.3} pk {:.3}",
                l.lane + 1,
                if l.playing { '>' } else { '.' },
                l.progress,
                l.rms,
                l.peak
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytestep_core::coordinator::LaneLevel;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("bytestep-player").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_args() {
        let args = parse(&["--samples", "/tmp/s", "--lanes", "4", "--seed", "9"]).unwrap();
        assert_eq!(args.samples, Some(PathBuf::from("/tmp/s")));
        assert_eq!(args.lanes, Some(4));
        assert_eq!(args.seed, Some(9));
        assert!(!args.list_devices);

        assert!(parse(&["--list-devices"]).unwrap().list_devices);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse(&["--lanes"]).is_err());
        assert!(parse(&["--lanes", "many"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }

    #[test]
    fn test_args_override_config() {
        let mut config = PlayerConfig::default();
        let args = parse(&["--samples", "/data", "--lanes", "2"]).unwrap();
        args.apply(&mut config);

        assert_eq!(config.sample_dir, PathBuf::from("/data"));
        assert_eq!(config.engine.lanes, 2);
        assert_eq!(config.engine.seed, None);
    }

    #[test]
    fn test_format_levels() {
        let report = LevelReport {
            lanes: vec![
                LaneLevel { lane: 0, rms: 0.25, peak: 0.5, progress: 96.0, round: 3, playing: true },
                LaneLevel { lane: 1, rms: 0.0, peak: 0.0, progress: 0.0, round: 0, playing: false },
            ],
        };
        let line = format_levels(&report);
        assert!(line.starts_with("L1 >  96.0%"));
        assert!(line.contains(" | L2 ."));
    }
}
