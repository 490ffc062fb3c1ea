mod csv;
mod json;
mod text;

use chrono::Utc;

use crate::dsp::EstimationResult;

pub use self::csv::CsvFormatter;
pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// One periodic diagnostic sample of the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticRecord {
    pub frame_index: u64,
    pub lag: f32,
    pub time_delta: f32,
    pub angle_deg: f32,
    pub peak_magnitude: f32,
    pub peak_ratio: f32,
    pub smoothed_angle: f32,
    pub valid: bool,
}

impl DiagnosticRecord {
    pub fn new(frame_index: u64, estimate: &EstimationResult, smoothed_angle: f32) -> Self {
        Self {
            frame_index,
            lag: estimate.sub_sample_lag,
            time_delta: estimate.time_delta,
            angle_deg: estimate.angle_deg,
            peak_magnitude: estimate.peak_magnitude,
            peak_ratio: estimate.peak_ratio,
            smoothed_angle,
            valid: estimate.valid,
        }
    }
}

pub trait Formatter: Send {
    fn format(&self, record: &DiagnosticRecord) -> String;

    fn header(&self) -> Option<&'static str> {
        None
    }
}

pub fn create_formatter(format: OutputFormat, verbose: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(verbose)),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

pub fn iso8601_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
