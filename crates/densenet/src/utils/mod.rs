//! Utility functions.

use std::time::Duration;

/// Seed libtorch's generators (weight init, dropout).
///
/// Rust-side generators are seeded from the run configuration directly.
pub fn set_seed(_seed: u64) {
    #[cfg(feature = "torch")]
    tch::manual_seed(_seed as i64);
}

/// Abbreviate parameter counts for display
pub fn abbreviate(num: u64) -> String {
    match num {
        0..=999 => num.to_string(),
        1_000..=999_999 => format!("{:.2}K", num as f64 / 1e3),
        1_000_000..=999_999_999 => format!("{:.2}M", num as f64 / 1e6),
        _ => format!("{:.2}B", num as f64 / 1e9),
    }
}

/// Format an elapsed time as `1h 02m 03s`, `4m 05s` or `6.7s`.
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate(500), "500");
        assert_eq!(abbreviate(769_162), "769.16K");
        assert_eq!(abbreviate(15_300_000), "15.30M");
        assert_eq!(abbreviate(2_000_000_000), "2.00B");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(6_700)), "6.7s");
        assert_eq!(format_duration(Duration::from_secs(245)), "4m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
