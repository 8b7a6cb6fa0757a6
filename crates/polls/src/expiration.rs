//! `D:HH:mm` poll duration parsing.

use std::sync::LazyLock;

use {
    chrono::{DateTime, TimeDelta, Utc},
    regex::Regex,
};

static DURATION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+):([01]?\d|2[0-4]):([0-5]?\d)$").ok());

/// Parse a `D:HH:mm` duration: any number of days, 0–24 hours and 0–59
/// minutes. Hours and minutes may drop their leading zero. The whole message
/// must match after trimming.
///
/// Returns `None` for malformed input and for day counts too large to
/// represent.
#[must_use]
pub fn parse_expiration(text: &str) -> Option<TimeDelta> {
    let caps = DURATION_RE.as_ref()?.captures(text.trim())?;
    let days: i64 = caps.get(1)?.as_str().parse().ok()?;
    let hours: i64 = caps.get(2)?.as_str().parse().ok()?;
    let minutes: i64 = caps.get(3)?.as_str().parse().ok()?;

    TimeDelta::try_days(days)?
        .checked_add(&TimeDelta::try_hours(hours)?)?
        .checked_add(&TimeDelta::try_minutes(minutes)?)
}

/// Absolute expiry for a `D:HH:mm` message sent at `now`.
#[must_use]
pub fn expiry_from(now: DateTime<Utc>, text: &str) -> Option<DateTime<Utc>> {
    now.checked_add_signed(parse_expiration(text)?)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("2:03:15", 2, 3, 15)]
    #[case("0:00:05", 0, 0, 5)]
    #[case("1:2:3", 1, 2, 3)]
    #[case("10:24:59", 10, 24, 59)]
    #[case("365:0:0", 365, 0, 0)]
    #[case(" 3:04:05 \n", 3, 4, 5)]
    fn parses_valid_durations(
        #[case] input: &str,
        #[case] days: i64,
        #[case] hours: i64,
        #[case] minutes: i64,
    ) {
        let expected =
            TimeDelta::days(days) + TimeDelta::hours(hours) + TimeDelta::minutes(minutes);
        assert_eq!(parse_expiration(input), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("tomorrow")]
    #[case("1:25:00")]
    #[case("1:00:60")]
    #[case("1:00")]
    #[case("-1:00:00")]
    #[case("1:00:00 please")]
    #[case("a1:00:00")]
    #[case("99999999999999999999:00:00")]
    #[case("9999999999999:00:00")]
    fn rejects_malformed_durations(#[case] input: &str) {
        assert_eq!(parse_expiration(input), None);
    }

    #[test]
    fn expiry_is_offset_from_now() {
        let now = Utc::now();
        let at = expiry_from(now, "2:03:15").unwrap();
        assert_eq!(
            at - now,
            TimeDelta::days(2) + TimeDelta::hours(3) + TimeDelta::minutes(15)
        );
    }
}
