//! Last-sync stamp rendering.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// US short date/time, e.g. `10/18/2026, 3:05 PM`.
pub const SHORT_DATETIME: &str = "%-m/%-d/%Y, %-I:%M %p";

/// Render `now` in `zone` using [`SHORT_DATETIME`].
///
/// The sheet parses this with user-entered semantics, so it stays a real
/// date value on the destination side.
pub fn render_stamp(now: DateTime<Utc>, zone: Tz) -> String {
    now.with_timezone(&zone).format(SHORT_DATETIME).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    #[test]
    fn summer_time_is_utc_minus_four() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 19, 5, 0).unwrap();
        assert_eq!(render_stamp(now, New_York), "10/18/2026, 3:05 PM");
    }

    #[test]
    fn winter_time_is_utc_minus_five() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 5, 30, 0).unwrap();
        assert_eq!(render_stamp(now, New_York), "1/5/2026, 12:30 AM");
    }
}
