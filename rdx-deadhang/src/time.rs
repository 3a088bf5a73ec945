//! Human-facing time formatting helpers.

use crate::common::Seconds;

/// Formats seconds as `MM:SS`, e.g. `150` becomes `"02:30"`.
pub fn format_clock(seconds: Seconds) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Formats a duration for display, e.g. `150` becomes `"2 min 30 s"`.
pub fn format_duration(seconds: Seconds) -> String {
    let minutes = seconds / 60;
    let rest = seconds % 60;
    match (minutes, rest) {
        (0, s) => format!("{s} s"),
        (m, 0) => format!("{m} min"),
        (m, s) => format!("{m} min {s} s"),
    }
}

/// Parses `MM:SS` (or a bare number of seconds) into seconds.
///
/// Returns `None` for anything that is not a non-negative clock value.
pub fn parse_clock(input: &str) -> Option<Seconds> {
    let input = input.trim();
    match input.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: Seconds = minutes.trim().parse().ok()?;
            let seconds: Seconds = seconds.trim().parse().ok()?;
            if seconds >= 60 {
                return None;
            }
            minutes.checked_mul(60)?.checked_add(seconds)
        }
        None => input.parse().ok(),
    }
}

/// Percentage of `total` already elapsed when `current` seconds remain.
pub fn time_progress(current: Seconds, total: Seconds) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let done = f64::from(total.saturating_sub(current));
    (done / f64::from(total) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_format_pads_both_fields() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(9), "00:09");
        assert_eq!(format_clock(150), "02:30");
        assert_eq!(format_clock(3600), "60:00");
    }

    #[test]
    fn duration_format_drops_empty_units() {
        assert_eq!(format_duration(45), "45 s");
        assert_eq!(format_duration(120), "2 min");
        assert_eq!(format_duration(150), "2 min 30 s");
    }

    #[test]
    fn parse_accepts_clock_and_bare_seconds() {
        assert_eq!(parse_clock("02:30"), Some(150));
        assert_eq!(parse_clock(" 1:05 "), Some(65));
        assert_eq!(parse_clock("45"), Some(45));
        assert_eq!(parse_clock("1:75"), None);
        assert_eq!(parse_clock("-3"), None);
        assert_eq!(parse_clock("abc"), None);
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(time_progress(10, 0), 0.0);
        assert_eq!(time_progress(30, 60), 50.0);
        assert_eq!(time_progress(0, 60), 100.0);
        assert_eq!(time_progress(90, 60), 0.0);
    }
}
