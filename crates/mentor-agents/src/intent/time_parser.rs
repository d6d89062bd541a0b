//! Natural language time expression parsing.
//!
//! Extracts a requested appointment time ("tomorrow at 3pm", "next monday
//! morning", "in 2 hours", "2025-03-10 14:30") from free text. All times are
//! interpreted in UTC relative to the supplied `now`.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use regex::Regex;

struct TimePatterns {
    relative: Regex,
    iso_date: Regex,
    today: Regex,
    tomorrow: Regex,
    weekday: Regex,
    clock: Regex,
    hour_meridiem: Regex,
    at_hour: Regex,
    noon: Regex,
    morning: Regex,
    afternoon: Regex,
    evening: Regex,
}

static TIME_PATTERNS: LazyLock<TimePatterns> = LazyLock::new(|| TimePatterns {
    relative: Regex::new(r"(?i)\bin\s+(\d{1,4})\s*(minutes?|mins?|hours?|hrs?|days?|weeks?)\b")
        .unwrap(),
    iso_date: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})").unwrap(),
    today: Regex::new(r"(?i)\btoday\b").unwrap(),
    tomorrow: Regex::new(r"(?i)\btomorrow\b").unwrap(),
    weekday: Regex::new(
        r"(?i)\b(next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .unwrap(),
    clock: Regex::new(r"(?i)(?:\b|T)(\d{1,2}):(\d{2})\s*(am|pm)?\b").unwrap(),
    hour_meridiem: Regex::new(r"(?i)\b(\d{1,2})\s*(am|pm)\b").unwrap(),
    at_hour: Regex::new(r"(?i)\bat\s+(\d{1,2})\b").unwrap(),
    noon: Regex::new(r"(?i)\bnoon\b").unwrap(),
    morning: Regex::new(r"(?i)\bmorning\b").unwrap(),
    afternoon: Regex::new(r"(?i)\bafternoon\b").unwrap(),
    evening: Regex::new(r"(?i)\bevening\b").unwrap(),
});

/// Hour used when a day is named without a time of day.
const DEFAULT_HOUR: u32 = 9;

/// Parse the first recognisable time expression in `text`.
///
/// Returns `None` when the text names neither a day nor a time, or when the
/// numbers are out of range. The result may lie in the past (an explicit
/// date that has passed, or "today at 8am" after 8am); a bare time of day
/// that has already passed today rolls over to tomorrow.
pub fn parse_time_expression(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let p = &*TIME_PATTERNS;

    if let Some(caps) = p.relative.captures(text) {
        let amount: i64 = caps[1].parse().ok()?;
        let unit = caps[2].to_lowercase();
        let delta = if unit.starts_with("min") {
            Duration::minutes(amount)
        } else if unit.starts_with('h') {
            Duration::hours(amount)
        } else if unit.starts_with('d') {
            Duration::days(amount)
        } else {
            Duration::weeks(amount)
        };
        return Some(now + delta);
    }

    let date = parse_date(text, now)?;
    let time = parse_time_of_day(text)?;

    match (date, time) {
        (None, None) => None,
        (Some(d), Some(t)) => Some(Utc.from_utc_datetime(&d.and_time(t))),
        (Some(d), None) => Some(Utc.from_utc_datetime(&d.and_time(hms(DEFAULT_HOUR, 0)?))),
        (None, Some(t)) => {
            let today = now.date_naive();
            let candidate = Utc.from_utc_datetime(&today.and_time(t));
            if candidate <= now {
                Some(candidate + Duration::days(1))
            } else {
                Some(candidate)
            }
        }
    }
}

/// `Some(None)` when no day is named; `None` when a named date is invalid.
fn parse_date(text: &str, now: DateTime<Utc>) -> Option<Option<NaiveDate>> {
    let p = &*TIME_PATTERNS;
    let today = now.date_naive();

    if let Some(caps) = p.iso_date.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).map(Some);
    }
    if p.tomorrow.is_match(text) {
        return Some(today.succ_opt());
    }
    if p.today.is_match(text) {
        return Some(Some(today));
    }
    if let Some(caps) = p.weekday.captures(text) {
        let target = parse_weekday(&caps[2])?;
        let current = today.weekday().num_days_from_monday() as i64;
        let wanted = target.num_days_from_monday() as i64;
        let mut ahead = (wanted - current).rem_euclid(7);
        if ahead == 0 {
            ahead = 7;
        }
        return Some(Some(today + Duration::days(ahead)));
    }
    Some(None)
}

/// `Some(None)` when no time of day is named; `None` when it is out of range.
fn parse_time_of_day(text: &str) -> Option<Option<NaiveTime>> {
    let p = &*TIME_PATTERNS;

    if let Some(caps) = p.clock.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        let hour = match caps.get(3) {
            Some(m) => to_24h(hour, m.as_str())?,
            None => hour,
        };
        return hms(hour, minute).map(Some);
    }
    if let Some(caps) = p.hour_meridiem.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        return hms(to_24h(hour, &caps[2])?, 0).map(Some);
    }
    // A bare "at N" is read as a 24-hour clock: "at 5" is 05:00, "at 17" is 17:00.
    if let Some(caps) = p.at_hour.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        return hms(hour, 0).map(Some);
    }
    if p.noon.is_match(text) {
        return hms(12, 0).map(Some);
    }
    if p.morning.is_match(text) {
        return hms(9, 0).map(Some);
    }
    if p.afternoon.is_match(text) {
        return hms(14, 0).map(Some);
    }
    if p.evening.is_match(text) {
        return hms(18, 0).map(Some);
    }
    Some(None)
}

fn to_24h(hour: u32, meridiem: &str) -> Option<u32> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    let pm = meridiem.eq_ignore_ascii_case("pm");
    Some(match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    })
}

fn hms(hour: u32, minute: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    name.to_lowercase().parse::<Weekday>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wednesday 2025-01-15 10:00 UTC.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn parse(text: &str) -> Option<DateTime<Utc>> {
        parse_time_expression(text, now())
    }

    #[test]
    fn test_tomorrow_at_3pm() {
        assert_eq!(parse("book me tomorrow at 3pm"), Some(at(2025, 1, 16, 15, 0)));
    }

    #[test]
    fn test_today_with_clock_time() {
        assert_eq!(parse("today at 15:30"), Some(at(2025, 1, 15, 15, 30)));
        assert_eq!(parse("today at 9:15am"), Some(at(2025, 1, 15, 9, 15)));
    }

    #[test]
    fn test_bare_time_rolls_forward_when_passed() {
        assert_eq!(parse("at 11am please"), Some(at(2025, 1, 15, 11, 0)));
        assert_eq!(parse("at 8am please"), Some(at(2025, 1, 16, 8, 0)));
    }

    #[test]
    fn test_weekday_names() {
        // 2025-01-15 is a Wednesday.
        assert_eq!(parse("next monday at 2pm"), Some(at(2025, 1, 20, 14, 0)));
        assert_eq!(parse("friday afternoon"), Some(at(2025, 1, 17, 14, 0)));
        assert_eq!(parse("wednesday"), Some(at(2025, 1, 22, DEFAULT_HOUR, 0)));
    }

    #[test]
    fn test_relative_offsets() {
        assert_eq!(parse("in 30 minutes"), Some(now() + Duration::minutes(30)));
        assert_eq!(parse("in 2 hours"), Some(now() + Duration::hours(2)));
        assert_eq!(parse("in 3 days"), Some(now() + Duration::days(3)));
        assert_eq!(parse("in 1 week"), Some(now() + Duration::weeks(1)));
    }

    #[test]
    fn test_iso_dates() {
        assert_eq!(parse("2025-03-10 14:30"), Some(at(2025, 3, 10, 14, 30)));
        assert_eq!(parse("2025-03-10T08:05"), Some(at(2025, 3, 10, 8, 5)));
        assert_eq!(parse("on 2025-03-10"), Some(at(2025, 3, 10, DEFAULT_HOUR, 0)));
    }

    #[test]
    fn test_past_dates_are_returned_as_is() {
        assert_eq!(parse("2020-01-01 10:00"), Some(at(2020, 1, 1, 10, 0)));
        assert_eq!(parse("today at 8am"), Some(at(2025, 1, 15, 8, 0)));
    }

    #[test]
    fn test_parts_of_day() {
        assert_eq!(parse("tomorrow morning"), Some(at(2025, 1, 16, 9, 0)));
        assert_eq!(parse("tomorrow at noon"), Some(at(2025, 1, 16, 12, 0)));
        assert_eq!(parse("tomorrow evening"), Some(at(2025, 1, 16, 18, 0)));
    }

    #[test]
    fn test_bare_hour_is_24_hour_clock() {
        assert_eq!(parse("tomorrow at 5"), Some(at(2025, 1, 16, 5, 0)));
        assert_eq!(parse("tomorrow at 17"), Some(at(2025, 1, 16, 17, 0)));
        assert_eq!(parse("tomorrow at 25"), None);
    }

    #[test]
    fn test_meridiem_edges() {
        assert_eq!(parse("tomorrow at 12am"), Some(at(2025, 1, 16, 0, 0)));
        assert_eq!(parse("tomorrow at 12pm"), Some(at(2025, 1, 16, 12, 0)));
    }

    #[test]
    fn test_no_time_expression() {
        assert_eq!(parse("I want to book an appointment"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert_eq!(parse("tomorrow at 25:00"), None);
        assert_eq!(parse("tomorrow at 13pm"), None);
        assert_eq!(parse("2025-02-30"), None);
    }
}
