use super::{DiagnosticRecord, Formatter, iso8601_timestamp};

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &DiagnosticRecord) -> String {
        format!(
            r#"{{"ts":"{}","frame":{},"lag":{:.2},"dt":{:.6},"theta":{:.1},"peak":{:.3},"ratio":{:.2},"smooth":{:.1},"valid":{}}}"#,
            iso8601_timestamp(),
            record.frame_index,
            finite_or_zero(record.lag),
            finite_or_zero(record.time_delta),
            finite_or_zero(record.angle_deg),
            finite_or_zero(record.peak_magnitude),
            finite_or_zero(record.peak_ratio),
            finite_or_zero(record.smoothed_angle),
            record.valid
        )
    }
}

// JSON has no NaN/inf literals
fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}
