//! Utility functions for the arena steward

use chrono::{DateTime, Utc};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Render a time control as the conventional "minutes+increment" label
///
/// Fractional-minute initial times use the unicode vulgar fractions the arena
/// UI shows for sub-minute bullet controls.
pub fn format_time_control(initial_time: u32, increment: u32) -> String {
    let initial = match initial_time {
        15 => "¼".to_string(),
        30 => "½".to_string(),
        45 => "¾".to_string(),
        _ if initial_time % 60 == 0 => (initial_time / 60).to_string(),
        _ => format!("{:.2}", f64::from(initial_time) / 60.0),
    };
    format!("{}+{}", initial, increment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time_control() {
        assert_eq!(format_time_control(180, 2), "3+2");
        assert_eq!(format_time_control(60, 0), "1+0");
        assert_eq!(format_time_control(30, 0), "½+0");
        assert_eq!(format_time_control(15, 1), "¼+1");
        assert_eq!(format_time_control(90, 0), "1.50+0");
    }
}
