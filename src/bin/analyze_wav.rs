use clap::Parser;
use rolling_stats::Stats;
use serde::Serialize;
use std::path::{Path, PathBuf};

use earshot::DoubleBuffer;
use earshot::audio::{AudioSource, WavFileSource};
use earshot::config::{ChannelRole, DoaConfig, PeakPolarity, Spacing};
use earshot::output::{OutputFormat, create_formatter};
use earshot::pipeline::{DiagnosticsEmitter, Orchestrator};
use earshot::tracking::RecordingActuator;

#[derive(Parser, Debug)]
#[command(name = "analyze_wav")]
#[command(about = "Replay stereo WAV files through the GCC-PHAT bearing tracker", long_about = None)]
struct Args {
    /// WAV files to analyze
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Summary format: text, csv, json
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: SummaryFormat,

    /// Print periodic diagnostic lines to stderr in this format
    #[arg(short = 'd', long, value_enum)]
    diagnostics: Option<OutputFormat>,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Swap microphone channels
    #[arg(short = 's', long)]
    swap_channels: bool,

    /// Microphone spacing (e.g., "0.12", "12cm")
    #[arg(long)]
    spacing: Option<Spacing>,

    /// Speed of sound in m/s
    #[arg(long)]
    sound_speed: Option<f32>,

    /// Minimum correlation peak for a valid estimate
    #[arg(long)]
    peak_floor: Option<f32>,

    /// Minimum primary/secondary peak ratio for a valid estimate
    #[arg(long)]
    ratio_floor: Option<f32>,

    /// Peak search convention
    #[arg(long, value_enum)]
    polarity: Option<PeakPolarity>,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SummaryFormat {
    Text,
    Csv,
    Json,
}

#[derive(Debug, Clone, Serialize)]
struct StatsSummary {
    count: usize,
    mean: f32,
    std_dev: f32,
    min: f32,
    max: f32,
}

impl StatsSummary {
    fn from_stats(stats: &Stats<f32>) -> Option<Self> {
        if stats.count == 0 {
            return None;
        }
        Some(Self {
            count: stats.count,
            mean: stats.mean,
            std_dev: stats.std_dev,
            min: stats.min,
            max: stats.max,
        })
    }
}

#[derive(Debug, Clone, Serialize, Default)]
struct FileAnalysis {
    filename: String,
    sample_rate: u32,
    frames: usize,
    valid_frames: usize,
    angle: Option<StatsSummary>,
    peak: Option<StatsSummary>,
    ratio: Option<StatsSummary>,
    final_smoothed_angle: f32,
    final_servo_angle: f32,
    deadline_misses: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
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
    if let Some(floor) = args.peak_floor {
        config.estimator.peak_floor = floor;
    }
    if let Some(floor) = args.ratio_floor {
        config.estimator.ratio_floor = floor;
    }
    if let Some(polarity) = args.polarity {
        config.estimator.peak_polarity = polarity;
    }
    if args.swap_channels {
        config.acquisition.mic1_channel = ChannelRole::Right;
    }

    let results: Vec<FileAnalysis> = args
        .files
        .iter()
        .map(|path| analyze_file(path, &config, args.diagnostics))
        .collect();

    match args.format {
        SummaryFormat::Text => print_text(&results, &config),
        SummaryFormat::Csv => print_csv(&results),
        SummaryFormat::Json => print_json(&results)?,
    }

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn analyze_file(path: &Path, config: &DoaConfig, diagnostics: Option<OutputFormat>) -> FileAnalysis {
    match analyze_file_impl(path, config, diagnostics) {
        Ok(analysis) => analysis,
        Err(e) => FileAnalysis {
            filename: file_name(path),
            error: Some(e.to_string()),
            ..Default::default()
        },
    }
}

fn analyze_file_impl(
    path: &Path,
    config: &DoaConfig,
    diagnostics: Option<OutputFormat>,
) -> anyhow::Result<FileAnalysis> {
    let mut source: Box<dyn AudioSource> =
        Box::new(WavFileSource::new(path, config.acquisition.frame_len)?);

    // Geometry is fixed but the rate follows the recording
    let mut config = config.clone();
    config.acquisition.sample_rate = source.sample_rate();
    config.validate()?;

    let (mut producer, consumer) = DoubleBuffer::<f32>::from_config(&config.acquisition)?;
    let (emitter, records) = match diagnostics {
        Some(_) => {
            let (emitter, rx) = DiagnosticsEmitter::channel(&config.diagnostics);
            (emitter, Some(rx))
        }
        None => (DiagnosticsEmitter::disabled(), None),
    };
    let formatter = diagnostics.map(|format| create_formatter(format, true));
    if let Some(header) = formatter.as_ref().and_then(|f| f.header()) {
        eprintln!("{}", header);
    }

    let mut orch = Orchestrator::new(&config, consumer, RecordingActuator::new(), emitter)?;

    let mut angle_stats: Stats<f32> = Stats::new();
    let mut peak_stats: Stats<f32> = Stats::new();
    let mut ratio_stats: Stats<f32> = Stats::new();
    let mut frames = 0;

    while let Some(chunk) = source.next_buffer()? {
        producer.write(&chunk);

        while let Some(outcome) = orch.poll()? {
            frames += 1;
            peak_stats.update(outcome.estimate.peak_magnitude);
            ratio_stats.update(outcome.estimate.peak_ratio);
            if outcome.estimate.valid {
                angle_stats.update(outcome.estimate.angle_deg);
            }
        }

        if let (Some(rx), Some(formatter)) = (&records, &formatter) {
            for record in rx.try_iter() {
                eprintln!("{}", formatter.format(&record));
            }
        }
    }

    Ok(FileAnalysis {
        filename: file_name(path),
        sample_rate: config.acquisition.sample_rate,
        frames,
        valid_frames: angle_stats.count,
        angle: StatsSummary::from_stats(&angle_stats),
        peak: StatsSummary::from_stats(&peak_stats),
        ratio: StatsSummary::from_stats(&ratio_stats),
        final_smoothed_angle: orch.smoothed_angle(),
        final_servo_angle: orch.command().angle_deg,
        deadline_misses: orch.deadline_misses(),
        error: None,
    })
}

fn print_text(results: &[FileAnalysis], config: &DoaConfig) {
    eprintln!(
        "Mic spacing: {:.3} m, c = {:.1} m/s, mic1 = {:?}, polarity = {:?}",
        config.geometry.mic_distance_m,
        config.geometry.sound_speed_mps,
        config.acquisition.mic1_channel,
        config.estimator.peak_polarity
    );
    eprintln!();

    println!(
        "{:<40} {:>8} {:>8} {:>10} {:>8} {:>8} {:>10}",
        "File", "Frames", "Valid", "Bearing", "Std", "Peak", "Smoothed"
    );
    println!("{}", "-".repeat(98));

    for result in results {
        if let Some(ref err) = result.error {
            println!("{:<40} ERROR: {}", result.filename, err);
            continue;
        }

        let bearing = result
            .angle
            .as_ref()
            .map(|s| format!("{:.1}°", s.mean))
            .unwrap_or_else(|| "-".to_string());
        let std = result
            .angle
            .as_ref()
            .map(|s| format!("{:.1}°", s.std_dev))
            .unwrap_or_else(|| "-".to_string());
        let peak = result
            .peak
            .as_ref()
            .map(|s| format!("{:.3}", s.mean))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<40} {:>8} {:>8} {:>10} {:>8} {:>8} {:>9.1}°",
            result.filename,
            result.frames,
            result.valid_frames,
            bearing,
            std,
            peak,
            result.final_smoothed_angle
        );
    }

    for result in results {
        if result.error.is_some() {
            continue;
        }

        if let Some(ref angle) = result.angle {
            eprintln!();
            eprintln!("Bearing statistics for {}:", result.filename);
            eprintln!("  Mean: {:.1}°", angle.mean);
            eprintln!("  Std dev: {:.1}°", angle.std_dev);
            eprintln!("  Min: {:.1}°", angle.min);
            eprintln!("  Max: {:.1}°", angle.max);
            eprintln!("  Range: {:.1}°", angle.max - angle.min);
            eprintln!("  Servo: {:.0}°", result.final_servo_angle);
        }
        if let Some(ref ratio) = result.ratio {
            eprintln!("  Peak ratio: {:.2} ± {:.2}", ratio.mean, ratio.std_dev);
        }
        if result.deadline_misses > 0 {
            eprintln!("  Deadline misses: {}", result.deadline_misses);
        }
    }
}

fn print_csv(results: &[FileAnalysis]) {
    println!(
        "filename,sample_rate,frames,valid_frames,bearing_mean,bearing_std,peak_mean,ratio_mean,smoothed,servo,deadline_misses,error"
    );
    for result in results {
        let bearing_mean = result
            .angle
            .as_ref()
            .map(|s| format!("{:.2}", s.mean))
            .unwrap_or_default();
        let bearing_std = result
            .angle
            .as_ref()
            .map(|s| format!("{:.2}", s.std_dev))
            .unwrap_or_default();
        let peak_mean = result
            .peak
            .as_ref()
            .map(|s| format!("{:.4}", s.mean))
            .unwrap_or_default();
        let ratio_mean = result
            .ratio
            .as_ref()
            .map(|s| format!("{:.3}", s.mean))
            .unwrap_or_default();
        let error = result.error.as_deref().unwrap_or("");

        println!(
            "{},{},{},{},{},{},{},{},{:.2},{:.1},{},{}",
            result.filename,
            result.sample_rate,
            result.frames,
            result.valid_frames,
            bearing_mean,
            bearing_std,
            peak_mean,
            ratio_mean,
            result.final_smoothed_angle,
            result.final_servo_angle,
            result.deadline_misses,
            error
        );
    }
}

fn print_json(results: &[FileAnalysis]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    println!("{}", json);
    Ok(())
}
