use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use earshot::config::{DoaConfig, Spacing};
use earshot::dsp::AngleEstimator;
use earshot::simulation::{NoiseConfig, generate_noisy_test_signal};
use earshot::{WavEncoding, save_wav};

#[derive(Parser, Debug)]
#[command(name = "generate_wav")]
#[command(about = "Synthesize two-microphone recordings of a source at known bearings")]
struct Args {
    /// Bearings in degrees: list ("-30,0,45") or sweep ("-90:90:15")
    #[arg(short, long, default_value = "-90:90:15", allow_hyphen_values = true)]
    bearings: String,

    /// Output directory
    #[arg(short, long, default_value = "data/synthetic")]
    output_dir: PathBuf,

    /// Tracker configuration (TOML); supplies sample rate and geometry
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Impairments (TOML with optional [additive] and [reflection] tables)
    #[arg(short, long)]
    noise: Option<PathBuf>,

    /// Recordings per bearing, each with its own seed
    #[arg(short, long, default_value_t = 1)]
    trials: u32,

    /// Base seed; trial seeds are derived from it
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Length of each recording in seconds
    #[arg(short, long, default_value_t = 1.0)]
    duration: f32,

    /// Microphone spacing override (e.g., "0.12", "12cm")
    #[arg(long)]
    spacing: Option<Spacing>,

    /// AWGN SNR in dB, replacing the noise file's setting
    #[arg(long, allow_hyphen_values = true)]
    snr: Option<f32>,

    /// Invert microphone 2 polarity
    #[arg(long)]
    invert: bool,

    /// Sample encoding of the written files
    #[arg(long, value_enum, default_value = "float32")]
    encoding: WavEncoding,

    /// Output filename prefix
    #[arg(long, default_value = "synth")]
    prefix: String,

    /// Also write manifest.json describing every file
    #[arg(long)]
    manifest: bool,
}

#[derive(Debug, Serialize)]
struct Recording {
    file: String,
    bearing_deg: f32,
    lag_samples: f32,
    trial: u32,
    seed: u64,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    sample_rate: u32,
    mic_distance_m: f32,
    sound_speed_mps: f32,
    max_lag_samples: usize,
    duration: f32,
    noise: &'a NoiseConfig,
    recordings: Vec<Recording>,
}

/// Expand a bearing list or an inclusive `start:end:step` sweep
fn parse_bearings(s: &str) -> Result<Vec<f32>> {
    let bearings = match s.split(':').collect::<Vec<_>>().as_slice() {
        [start, end, step] => {
            let start: f32 = start.trim().parse().context("Invalid sweep start")?;
            let end: f32 = end.trim().parse().context("Invalid sweep end")?;
            let step: f32 = step.trim().parse().context("Invalid sweep step")?;
            if step <= 0.0 || !step.is_finite() {
                anyhow::bail!("Sweep step must be positive");
            }
            let count = ((end - start) / step + 1e-3).floor();
            if count < 0.0 {
                anyhow::bail!("Sweep end {} is below start {}", end, start);
            }
            (0..=count as u32).map(|i| start + i as f32 * step).collect()
        }
        [list] => list
            .split(',')
            .map(|p| p.trim().parse::<f32>().context("Invalid bearing value"))
            .collect::<Result<Vec<_>>>()?,
        _ => anyhow::bail!("Expected a bearing list or 'start:end:step'"),
    };

    if let Some(b) = bearings.iter().find(|b| !(-90.0..=90.0).contains(*b)) {
        anyhow::bail!("Bearing {} is outside -90..90", b);
    }
    Ok(bearings)
}

fn load_noise(path: Option<&Path>) -> Result<NoiseConfig> {
    let Some(path) = path else {
        return Ok(NoiseConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn file_name(prefix: &str, bearing: f32, trial: u32) -> String {
    let sign = if bearing < 0.0 { 'm' } else { 'p' };
    format!("{}_{}{:05.1}_t{:02}.wav", prefix, sign, bearing.abs(), trial)
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut config = match &args.config {
        Some(path) => DoaConfig::load(path)?,
        None => DoaConfig::default(),
    };
    if let Some(spacing) = args.spacing {
        config.geometry.mic_distance_m = spacing.as_meters();
    }
    config.validate()?;

    let mut noise = load_noise(args.noise.as_deref())?;
    if let Some(snr_db) = args.snr {
        noise = noise.with_awgn(snr_db);
    }
    if args.invert {
        noise = noise.with_inverted_channel2();
    }

    let bearings = parse_bearings(&args.bearings)?;
    fs::create_dir_all(&args.output_dir).context("Failed to create output directory")?;

    let sample_rate = config.acquisition.sample_rate;
    let angle = AngleEstimator::from_config(&config.geometry, sample_rate);
    let total = bearings.len() * args.trials as usize;
    let mut recordings = Vec::with_capacity(total);

    for (index, &bearing) in bearings.iter().enumerate() {
        for trial in 0..args.trials {
            let seed = args.seed + (index as u64) * 1000 + trial as u64;
            let signal = generate_noisy_test_signal(
                args.duration,
                sample_rate,
                bearing,
                &config.geometry,
                &noise.clone().with_seed(seed),
            );

            let file = file_name(&args.prefix, bearing, trial);
            save_wav(args.output_dir.join(&file), &signal, sample_rate, args.encoding)
                .with_context(|| format!("Failed to write {}", file))?;

            recordings.push(Recording {
                file,
                bearing_deg: bearing,
                lag_samples: angle.lag_for_angle(bearing),
                trial,
                seed,
            });
            eprint!("\rGenerating: {}/{}", recordings.len(), total);
        }
    }
    eprintln!();

    if args.manifest {
        let manifest = Manifest {
            sample_rate,
            mic_distance_m: config.geometry.mic_distance_m,
            sound_speed_mps: config.geometry.sound_speed_mps,
            max_lag_samples: config.max_lag_samples(),
            duration: args.duration,
            noise: &noise,
            recordings,
        };
        let path = args.output_dir.join("manifest.json");
        let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
        fs::write(&path, json).context("Failed to write manifest")?;
        eprintln!("Manifest written to: {}", path.display());
    }

    eprintln!("Generated {} files in {}", total, args.output_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearing_list() {
        assert_eq!(parse_bearings("-30, 0,45").unwrap(), vec![-30.0, 0.0, 45.0]);
    }

    #[test]
    fn test_parse_bearing_sweep_is_inclusive() {
        assert_eq!(
            parse_bearings("-90:90:45").unwrap(),
            vec![-90.0, -45.0, 0.0, 45.0, 90.0]
        );
        assert_eq!(parse_bearings("0:1:0.1").unwrap().len(), 11);
    }

    #[test]
    fn test_parse_bearings_rejects_bad_input() {
        assert!(parse_bearings("0:10:0").is_err());
        assert!(parse_bearings("10:0:5").is_err());
        assert!(parse_bearings("0:10").is_err());
        assert!(parse_bearings("0,95").is_err());
        assert!(parse_bearings("north").is_err());
    }

    #[test]
    fn test_file_names_sort_by_sign() {
        assert_eq!(file_name("synth", -7.5, 0), "synth_m007.5_t00.wav");
        assert_eq!(file_name("synth", 45.0, 3), "synth_p045.0_t03.wav");
    }

    #[test]
    fn test_noise_file_tables() {
        let noise: NoiseConfig = toml::from_str(
            "invert_channel2 = true\n[additive]\nsnr_db = 6.0\n[reflection]\nbearing_degrees = -20.0\namplitude_ratio = 0.4\n",
        )
        .unwrap();
        assert!(noise.invert_channel2);
        assert_eq!(noise.additive.unwrap().snr_db, 6.0);
        let reflection = noise.reflection.unwrap();
        assert_eq!(reflection.amplitude_ratio, 0.4);
        assert_eq!(reflection.extra_delay_samples, 0.0);
    }
}
