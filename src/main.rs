use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;

use earshot::DoubleBuffer;
use earshot::audio::{AudioCapture, list_input_devices};
use earshot::config::{ChannelRole, DoaConfig, PeakPolarity, Spacing};
use earshot::output::{OutputFormat, create_formatter};
use earshot::pipeline::{DiagnosticsEmitter, Orchestrator};
use earshot::tracking::LogActuator;

#[derive(Parser, Debug)]
#[command(name = "earshot")]
#[command(about = "Track the bearing of a sound source with two microphones", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Input device name (substring match); default device if omitted
    #[arg(short = 'd', long)]
    device: Option<String>,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Diagnostic line format
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Emit a diagnostic line every N frames
    #[arg(short = 'k', long)]
    period: Option<usize>,

    /// Microphone spacing (e.g., "0.12", "12cm")
    #[arg(long)]
    spacing: Option<Spacing>,

    /// Speed of sound in m/s
    #[arg(long)]
    sound_speed: Option<f32>,

    /// Smoothing factor in (0, 1)
    #[arg(long)]
    alpha: Option<f32>,

    /// Peak search convention
    #[arg(long, value_enum)]
    polarity: Option<PeakPolarity>,

    /// Swap microphone channels
    #[arg(short = 's', long)]
    swap_channels: bool,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f32>,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if args.list_devices {
        for name in list_input_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = build_config(&args)?;

    eprintln!("=== earshot - GCC-PHAT bearing tracker ===");
    eprintln!(
        "Sample rate: {} Hz, frame: {} samples ({:.1} ms), FFT: {}",
        config.acquisition.sample_rate,
        config.acquisition.frame_len,
        config.acquisition.buffer_period().as_secs_f64() * 1e3,
        config.estimator.fft_len
    );
    eprintln!(
        "Mic spacing: {:.3} m, max lag: ±{} samples",
        config.geometry.mic_distance_m,
        config.max_lag_samples()
    );
    eprintln!(
        "Gate: peak >= {}, ratio >= {}, polarity {:?}",
        config.estimator.peak_floor, config.estimator.ratio_floor, config.estimator.peak_polarity
    );
    eprintln!();

    let (producer, consumer) = DoubleBuffer::<f32>::from_config(&config.acquisition)?;
    let (emitter, records) = DiagnosticsEmitter::channel(&config.diagnostics);

    let formatter = create_formatter(args.format, args.verbose > 0);
    let printer = std::thread::spawn(move || {
        if let Some(header) = formatter.header() {
            println!("{}", header);
        }
        for record in records.iter() {
            println!("{}", formatter.format(&record));
        }
    });

    let mut orch = Orchestrator::new(&config, consumer, LogActuator::new(), emitter)?;

    let running = Arc::new(AtomicBool::new(true));
    if let Some(secs) = args.duration {
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs_f32(secs.max(0.0)));
            running.store(false, Ordering::Relaxed);
        });
    }

    eprintln!("Starting audio capture...");
    let capture = AudioCapture::new(&config.acquisition, producer, args.device.as_deref())?;

    let frames = orch.run(&running, Duration::from_millis(1))?;

    drop(capture);
    let deadline_misses = orch.deadline_misses();
    let dropped = orch.diagnostics().dropped();
    drop(orch);
    let _ = printer.join();

    eprintln!(
        "Processed {} frames ({} over deadline, {} diagnostics dropped)",
        frames, deadline_misses, dropped
    );
    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<DoaConfig> {
    let mut config = match &args.config {
        Some(path) => DoaConfig::load(path)?,
        None => DoaConfig::default(),
    };

    if let Some(spacing) = args.spacing {
        config.geometry.mic_distance_m = spacing.as_meters();
    }
    if let Some(c) = args.sound_speed {
        config.geometry.sound_speed_mps = c;
    }
    if let Some(alpha) = args.alpha {
        config.tracker.alpha = alpha;
    }
    if let Some(polarity) = args.polarity {
        config.estimator.peak_polarity = polarity;
    }
    if let Some(period) = args.period {
        config.diagnostics.period_frames = period;
    }
    if args.swap_channels {
        config.acquisition.mic1_channel = ChannelRole::Right;
    }

    config.validate()?;
    Ok(config)
}
