use super::{DiagnosticRecord, Formatter};

pub struct TextFormatter {
    verbose: bool,
}

impl TextFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &DiagnosticRecord) -> String {
        let line = format!(
            "lag:{:.2} dt:{:.6} theta:{:.1} peak:{:.3} ratio:{:.2} smooth:{:.1} {}",
            record.lag,
            record.time_delta,
            record.angle_deg,
            record.peak_magnitude,
            record.peak_ratio,
            record.smoothed_angle,
            if record.valid { "OK" } else { "SKIP" }
        );
        if self.verbose {
            format!("[{}] {}", record.frame_index, line)
        } else {
            line
        }
    }
}
