use std::fmt::{Display, Formatter};

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

const ISO_MIDNIGHT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const ISO_NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const ISO_DAY_FORMAT: &str = "%Y-%m-%d";

/// Inclusive interval of calendar days.
///
/// Either endpoint may be missing: only `from` set means the selection is still
/// pending. Consumers only act on complete ranges (`from <= to`), see
/// [`DateRange::is_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(day: NaiveDate) -> Self {
        Self::new(Some(day), Some(day))
    }

    pub fn pending(from: NaiveDate) -> Self {
        Self::new(Some(from), None)
    }

    /// Builds a complete range from two days given in any order.
    pub fn between(first: NaiveDate, second: NaiveDate) -> Self {
        Self::new(Some(first.min(second)), Some(first.max(second)))
    }

    /// Builds a range from two instants, truncating each to its local calendar day.
    pub fn from_instants<Tz: TimeZone>(from: &DateTime<Tz>, to: &DateTime<Tz>) -> Self {
        Self::new(Some(normalize_to_midnight(from)), Some(normalize_to_midnight(to)))
    }

    /// Parses both endpoints from ISO-8601 text. Returns `None` when either one is
    /// not a real calendar date, so a half-valid range is never produced.
    pub fn parse_iso(from: &str, to: &str) -> Option<Self> {
        let from = parse_iso_day(from)?;
        let to = parse_iso_day(to)?;
        Some(Self::new(Some(from), Some(to)))
    }

    pub fn is_complete(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from <= to)
    }

    pub fn is_pending(&self) -> bool {
        self.from.is_some() && self.to.is_none()
    }

    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from <= to => Some((from, to)),
            _ => None,
        }
    }

    /// Number of days covered, counting both endpoints.
    pub fn day_count(&self) -> Option<i64> {
        self.bounds().map(|(from, to)| inclusive_days(from, to))
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.bounds()
            .map(|(from, to)| day >= from && day <= to)
            .unwrap_or(false)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let (from, count) = match self.bounds() {
            Some((from, to)) => (from, inclusive_days(from, to)),
            None => (NaiveDate::MIN, 0),
        };
        (0..count).map(move |offset| from + Duration::days(offset))
    }

    pub fn shift_days(&self, days: i64) -> Self {
        let shift = |day: NaiveDate| day + Duration::days(days);
        Self::new(self.from.map(shift), self.to.map(shift))
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from == to => write!(f, "{}", from.format(ISO_DAY_FORMAT)),
            (Some(from), Some(to)) => write!(
                f,
                "{} .. {}",
                from.format(ISO_DAY_FORMAT),
                to.format(ISO_DAY_FORMAT)
            ),
            (Some(from), None) => write!(f, "{} .. ?", from.format(ISO_DAY_FORMAT)),
            (None, Some(to)) => write!(f, "? .. {}", to.format(ISO_DAY_FORMAT)),
            (None, None) => write!(f, "(no range)"),
        }
    }
}

/// Truncates an instant to the calendar day it falls on in the local timezone.
pub fn normalize_to_midnight<Tz: TimeZone>(instant: &DateTime<Tz>) -> NaiveDate {
    instant.with_timezone(&Local).date_naive()
}

pub fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

pub fn to_iso_string(day: NaiveDate) -> String {
    midnight(day).format(ISO_MIDNIGHT_FORMAT).to_string()
}

/// Accepts `YYYY-MM-DD`, naive `YYYY-MM-DDTHH:MM:SS[.fff]` and RFC 3339 text.
pub fn parse_iso_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(normalize_to_midnight(&instant));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, ISO_NAIVE_FORMAT) {
        return Some(naive.date());
    }
    NaiveDate::parse_from_str(raw, ISO_DAY_FORMAT).ok()
}

pub fn inclusive_days(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days() + 1
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).expect("next year date should be valid")
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).expect("next month date should be valid")
    };
    (first_of_next - Duration::days(1)).day()
}

pub fn first_day_of_month(day: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(day.year(), day.month(), 1).expect("first day of month must be valid")
}

pub fn last_day_of_month(day: NaiveDate) -> NaiveDate {
    let last = days_in_month(day.year(), day.month());
    NaiveDate::from_ymd_opt(day.year(), day.month(), last).expect("last day of month must be valid")
}

/// Monday of the week containing `day`.
pub fn start_of_week(day: NaiveDate) -> NaiveDate {
    let days_from_monday = day.weekday().num_days_from_monday() as i64;
    day - Duration::days(days_from_monday)
}

/// Sunday of the week containing `day`.
pub fn end_of_week(day: NaiveDate) -> NaiveDate {
    start_of_week(day) + Duration::days(6)
}

pub fn shift_month(day: NaiveDate, delta: i32) -> NaiveDate {
    let total_months = day.year() * 12 + day.month0() as i32 + delta;
    let year = total_months.div_euclid(12);
    let month = total_months.rem_euclid(12) as u32 + 1;
    let target_day = day.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, target_day).expect("shifted month date must be valid")
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Local, NaiveDate, TimeZone, Weekday};

    use super::{
        days_in_month, end_of_week, parse_iso_day, shift_month, start_of_week, to_iso_string,
        DateRange,
    };

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date should be valid")
    }

    #[test]
    fn between_orders_endpoints() {
        let range = DateRange::between(day(2025, 9, 10), day(2025, 9, 5));
        assert_eq!(range.from, Some(day(2025, 9, 5)));
        assert_eq!(range.to, Some(day(2025, 9, 10)));
        assert!(range.is_complete());
        assert_eq!(range.day_count(), Some(6));
    }

    #[test]
    fn pending_and_reversed_ranges_are_not_complete() {
        assert!(DateRange::pending(day(2025, 9, 5)).is_pending());
        assert!(!DateRange::pending(day(2025, 9, 5)).is_complete());
        let reversed = DateRange::new(Some(day(2025, 9, 10)), Some(day(2025, 9, 5)));
        assert!(!reversed.is_complete());
        assert_eq!(reversed.day_count(), None);
        assert_eq!(reversed.days().count(), 0);
    }

    #[test]
    fn parses_all_supported_iso_shapes() {
        assert_eq!(parse_iso_day("2025-09-15"), Some(day(2025, 9, 15)));
        assert_eq!(parse_iso_day("2025-09-15T00:00:00.000"), Some(day(2025, 9, 15)));
        assert_eq!(parse_iso_day("2025-09-15T18:30:00"), Some(day(2025, 9, 15)));
        assert!(parse_iso_day("2025-09-15T12:00:00Z").is_some());
        assert_eq!(parse_iso_day("2025-02-30"), None);
        assert_eq!(parse_iso_day("not a date"), None);
        assert_eq!(parse_iso_day(""), None);
    }

    #[test]
    fn parse_iso_rejects_whole_range_when_one_endpoint_is_bad() {
        assert!(DateRange::parse_iso("2025-09-01", "garbage").is_none());
        let parsed = DateRange::parse_iso("2025-09-01", "2025-09-07").expect("range should parse");
        assert_eq!(parsed, DateRange::between(day(2025, 9, 1), day(2025, 9, 7)));
    }

    #[test]
    fn iso_string_round_trips() {
        let value = to_iso_string(day(2024, 2, 29));
        assert_eq!(value, "2024-02-29T00:00:00.000");
        assert_eq!(parse_iso_day(&value), Some(day(2024, 2, 29)));
    }

    #[test]
    fn instants_keep_calendar_day_regardless_of_time_of_day() {
        let morning = Local
            .with_ymd_and_hms(2025, 9, 15, 0, 0, 1)
            .single()
            .expect("local morning should exist");
        let evening = Local
            .with_ymd_and_hms(2025, 9, 15, 23, 59, 59)
            .single()
            .expect("local evening should exist");
        let range = DateRange::from_instants(&morning, &evening);
        assert_eq!(range, DateRange::single(day(2025, 9, 15)));
    }

    #[test]
    fn week_bounds_are_monday_first() {
        let sunday = day(2025, 9, 7);
        assert_eq!(start_of_week(sunday), day(2025, 9, 1));
        assert_eq!(start_of_week(sunday).weekday(), Weekday::Mon);
        assert_eq!(end_of_week(day(2025, 9, 1)), sunday);
    }

    #[test]
    fn month_helpers_handle_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(shift_month(day(2024, 1, 31), 1), day(2024, 2, 29));
        assert_eq!(shift_month(day(2025, 1, 15), -1), day(2024, 12, 15));
        assert_eq!(shift_month(day(2025, 11, 30), 14), day(2027, 1, 30));
    }

    #[test]
    fn shift_days_moves_both_endpoints() {
        let range = DateRange::between(day(2025, 9, 1), day(2025, 9, 7)).shift_days(-7);
        assert_eq!(range, DateRange::between(day(2025, 8, 25), day(2025, 8, 31)));
        assert!(range.contains(day(2025, 8, 28)));
        assert!(!range.contains(day(2025, 9, 1)));
    }
}
