use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{error, info};

use cribwatch::{
    AudioChunk, AudioSource, CameraSession, CribwatchConfig, EventBus, Frame, FrameFormat,
    MonitorEvent, MonitoringCoordinator, NullClassifierProvider, NullPoseEstimator,
    SyntheticAudioSource, SyntheticCameraSession,
};

#[derive(Parser, Debug)]
#[command(name = "cribwatch")]
#[command(about = "On-device infant sleep monitor with position, movement, and crying detection")]
#[command(version)]
#[command(long_about = "Runs the cribwatch monitoring core: position, movement, and crying \
detection over camera frames and audio chunks, with debounced safety alerts. Without a real \
capture stack attached this binary drives the pipeline from synthetic sources, which is useful \
for validating configuration and observing the alert lifecycle.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cribwatch.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the monitor")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't start monitoring
    #[arg(long, help = "Perform dry run - initialize the pipeline but don't start it")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting cribwatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match CribwatchConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate()?;

    // The binary ships no device plumbing: monitoring runs against
    // synthetic capture collaborators.
    let camera = Arc::new(SyntheticCameraSession::new());
    let audio = Arc::new(SyntheticAudioSource::new());
    let event_bus = EventBus::new(config.system.event_bus_capacity);

    let mut coordinator = MonitoringCoordinator::new(
        config.clone(),
        Arc::clone(&camera) as Arc<dyn CameraSession>,
        Arc::clone(&audio) as Arc<dyn AudioSource>,
        Arc::new(NullClassifierProvider),
        Arc::new(NullPoseEstimator),
        event_bus.clone(),
    );

    if args.dry_run {
        info!("Dry run mode - pipeline initialized but not started");
        println!("✓ Dry run completed successfully - pipeline initialized");
        return Ok(());
    }

    coordinator.start().await?;
    let capabilities = coordinator.capabilities();
    info!(
        "Detection capabilities: position {:?}, crying {:?}, face coverage {:?}",
        capabilities.position_detection,
        capabilities.crying_detection,
        capabilities.face_coverage_detection
    );

    // Feed the pipeline: a mostly-static scene with slight sensor noise
    // and a quiet room.
    let feeder_camera = Arc::clone(&camera);
    let feeder_audio = Arc::clone(&audio);
    let (width, height) = config.camera.resolution;
    let frame_period = Duration::from_millis((1000 / config.camera.fps.max(1) as u64).max(1));
    let chunk_samples = config.audio.buffer_size;
    let sample_rate = config.audio.sample_rate;

    let feeder = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(frame_period);
        let mut frame_id = 0u64;

        loop {
            ticker.tick().await;
            frame_id += 1;

            let luma = 96 + (frame_id % 3) as u8;
            feeder_camera.set_frame(Frame::new(
                frame_id,
                SystemTime::now(),
                vec![luma; (width * height) as usize],
                width,
                height,
                FrameFormat::Gray8,
            ));

            feeder_audio.push(&AudioChunk::new(
                SystemTime::now(),
                vec![0.0; chunk_samples],
                sample_rate,
            ));
        }
    });

    let mut receiver = event_bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            match &event {
                MonitorEvent::AlertRaised { alert } => {
                    println!("! {} - {}", alert.kind.title(), alert.kind.description());
                }
                MonitorEvent::StatusChanged {
                    position, movement, ..
                } => {
                    println!(
                        "  status: {} / {}",
                        position.display_value(),
                        movement.display_value()
                    );
                }
                _ => {}
            }
        }
    });

    info!("Monitoring running - press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    feeder.abort();
    coordinator.stop().await;
    printer.abort();

    let metrics = coordinator.metrics();
    info!(
        "Session summary: {} ticks, {} frames analyzed, {} alerts",
        metrics.ticks, metrics.frames_analyzed, metrics.alerts_raised
    );

    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cribwatch={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Cribwatch Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&CribwatchConfig::default())?);
    Ok(())
}
