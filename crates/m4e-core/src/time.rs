//! Wall-clock helpers.
//!
//! Persistent timestamps (cache records, packet times) are milliseconds since
//! the Unix epoch. Durations that never leave the process use `Instant`.

use chrono::Utc;

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Clocks set before 1970 read as zero.
pub fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Converts a number of days to milliseconds, saturating on overflow.
pub fn days_to_millis(days: u64) -> u64 {
    days.saturating_mul(MILLIS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn days_convert_to_millis() {
        assert_eq!(days_to_millis(0), 0);
        assert_eq!(days_to_millis(1), 86_400_000);
        assert_eq!(days_to_millis(30), 2_592_000_000);
        assert_eq!(days_to_millis(u64::MAX), u64::MAX);
    }
}
