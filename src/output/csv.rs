use super::{DiagnosticRecord, Formatter, iso8601_timestamp};

pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format(&self, record: &DiagnosticRecord) -> String {
        format!(
            "{},{},{:.2},{:.6},{:.1},{:.3},{:.2},{:.1},{}",
            iso8601_timestamp(),
            record.frame_index,
            record.lag,
            record.time_delta,
            record.angle_deg,
            record.peak_magnitude,
            record.peak_ratio,
            record.smoothed_angle,
            record.valid as u8
        )
    }

    fn header(&self) -> Option<&'static str> {
        Some("ts,frame,lag,dt,theta,peak,ratio,smooth,valid")
    }
}
