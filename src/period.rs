use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::range::{
    end_of_week, first_day_of_month, inclusive_days, last_day_of_month, shift_month,
    start_of_week, DateRange,
};

const WEEK_DAYS: i64 = 7;
const CUSTOM_MIN_DAYS: i64 = 2;
const CUSTOM_MAX_DAYS: i64 = 365;

/// Calendar shortcut buttons. Every key except `Custom` resolves to a fixed range
/// anchored on the current day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeriodKey {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    Custom,
}

impl PeriodKey {
    pub const ALL: [PeriodKey; 7] = [
        PeriodKey::Today,
        PeriodKey::Yesterday,
        PeriodKey::ThisWeek,
        PeriodKey::LastWeek,
        PeriodKey::ThisMonth,
        PeriodKey::LastMonth,
        PeriodKey::Custom,
    ];

    pub fn id(self) -> &'static str {
        match self {
            PeriodKey::Today => "today",
            PeriodKey::Yesterday => "yesterday",
            PeriodKey::ThisWeek => "thisWeek",
            PeriodKey::LastWeek => "lastWeek",
            PeriodKey::ThisMonth => "thisMonth",
            PeriodKey::LastMonth => "lastMonth",
            PeriodKey::Custom => "custom",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PeriodKey::Today => "Today",
            PeriodKey::Yesterday => "Yesterday",
            PeriodKey::ThisWeek => "This week",
            PeriodKey::LastWeek => "Last week",
            PeriodKey::ThisMonth => "This month",
            PeriodKey::LastMonth => "Last month",
            PeriodKey::Custom => "Custom",
        }
    }

    /// Resolves the shortcut against `today`. `Custom` has no range of its own.
    pub fn range(self, today: NaiveDate) -> Option<DateRange> {
        let range = match self {
            PeriodKey::Today => DateRange::single(today),
            PeriodKey::Yesterday => DateRange::single(today - Duration::days(1)),
            PeriodKey::ThisWeek => DateRange::between(start_of_week(today), end_of_week(today)),
            PeriodKey::LastWeek => {
                let anchor = start_of_week(today) - Duration::days(WEEK_DAYS);
                DateRange::between(anchor, end_of_week(anchor))
            }
            PeriodKey::ThisMonth => {
                DateRange::between(first_day_of_month(today), last_day_of_month(today))
            }
            PeriodKey::LastMonth => {
                let anchor = shift_month(first_day_of_month(today), -1);
                DateRange::between(anchor, last_day_of_month(anchor))
            }
            PeriodKey::Custom => return None,
        };
        Some(range)
    }

    /// First shortcut whose range equals `range`, `Custom` when none does.
    pub fn detect(range: &DateRange, today: NaiveDate) -> PeriodKey {
        PeriodKey::ALL
            .into_iter()
            .find(|key| key.range(today).as_ref() == Some(range))
            .unwrap_or(PeriodKey::Custom)
    }
}

impl Display for PeriodKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PeriodKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().replace(['-', '_'], "").to_ascii_lowercase();
        PeriodKey::ALL
            .into_iter()
            .find(|key| key.id().to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown period: {raw}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeriodClassification {
    SingleDay,
    CompleteWeek,
    CompleteMonth,
    CustomRange,
    Invalid,
}

impl PeriodClassification {
    pub fn label(self) -> &'static str {
        match self {
            PeriodClassification::SingleDay => "single day",
            PeriodClassification::CompleteWeek => "complete week",
            PeriodClassification::CompleteMonth => "complete month",
            PeriodClassification::CustomRange => "custom range",
            PeriodClassification::Invalid => "invalid",
        }
    }

    pub fn is_valid(self) -> bool {
        self != PeriodClassification::Invalid
    }
}

impl Display for PeriodClassification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Assigns exactly one category to `range`. Rules are evaluated in order and the
/// first match wins, so a Monday-Sunday span is a week even though its length
/// also fits the custom bounds.
pub fn classify(range: &DateRange) -> PeriodClassification {
    let Some((from, to)) = range.bounds() else {
        return PeriodClassification::Invalid;
    };

    if from == to {
        return PeriodClassification::SingleDay;
    }
    if spans_complete_week(from, to) {
        return PeriodClassification::CompleteWeek;
    }
    if spans_complete_month(from, to) {
        return PeriodClassification::CompleteMonth;
    }
    if spans_custom_length(from, to) {
        return PeriodClassification::CustomRange;
    }
    PeriodClassification::Invalid
}

pub fn is_single_day(range: &DateRange) -> bool {
    classify(range) == PeriodClassification::SingleDay
}

pub fn is_complete_week(range: &DateRange) -> bool {
    classify(range) == PeriodClassification::CompleteWeek
}

pub fn is_complete_month(range: &DateRange) -> bool {
    classify(range) == PeriodClassification::CompleteMonth
}

pub fn is_custom_range(range: &DateRange) -> bool {
    classify(range) == PeriodClassification::CustomRange
}

fn spans_complete_week(from: NaiveDate, to: NaiveDate) -> bool {
    if inclusive_days(from, to) != WEEK_DAYS {
        return false;
    }
    // Both anchors are accepted: the grid can be laid out Monday-first or Sunday-first.
    matches!(
        (from.weekday(), to.weekday()),
        (Weekday::Mon, Weekday::Sun) | (Weekday::Sun, Weekday::Sat)
    )
}

fn spans_complete_month(from: NaiveDate, to: NaiveDate) -> bool {
    from.day() == 1
        && from.year() == to.year()
        && from.month() == to.month()
        && to == last_day_of_month(from)
}

fn spans_custom_length(from: NaiveDate, to: NaiveDate) -> bool {
    (CUSTOM_MIN_DAYS..=CUSTOM_MAX_DAYS).contains(&inclusive_days(from, to))
}

/// The range a comparison card sets against `range`: the period of the same
/// kind that immediately precedes it.
pub fn previous_period(range: &DateRange) -> Option<DateRange> {
    let (from, to) = range.bounds()?;
    match classify(range) {
        PeriodClassification::SingleDay | PeriodClassification::CompleteWeek => {
            Some(range.shift_days(-inclusive_days(from, to)))
        }
        PeriodClassification::CompleteMonth => {
            let anchor = shift_month(from, -1);
            Some(DateRange::between(anchor, last_day_of_month(anchor)))
        }
        PeriodClassification::CustomRange => {
            let span = inclusive_days(from, to);
            Some(DateRange::between(
                from - Duration::days(span),
                from - Duration::days(1),
            ))
        }
        PeriodClassification::Invalid => None,
    }
}

/// Comparison widgets of the dashboard. Each one renders only for its own
/// classification and prefixes its cache keys with [`ComparisonCard::component_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonCard {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl ComparisonCard {
    pub const ALL: [ComparisonCard; 4] = [
        ComparisonCard::Daily,
        ComparisonCard::Weekly,
        ComparisonCard::Monthly,
        ComparisonCard::Custom,
    ];

    pub fn component_name(self) -> &'static str {
        match self {
            ComparisonCard::Daily => "daily-comparison",
            ComparisonCard::Weekly => "weekly-comparison",
            ComparisonCard::Monthly => "monthly-comparison",
            ComparisonCard::Custom => "custom-comparison",
        }
    }

    pub fn expected_classification(self) -> PeriodClassification {
        match self {
            ComparisonCard::Daily => PeriodClassification::SingleDay,
            ComparisonCard::Weekly => PeriodClassification::CompleteWeek,
            ComparisonCard::Monthly => PeriodClassification::CompleteMonth,
            ComparisonCard::Custom => PeriodClassification::CustomRange,
        }
    }

    pub fn renders_for(self, range: &DateRange) -> bool {
        classify(range) == self.expected_classification()
    }

    /// The single card shown for `range`, if any.
    pub fn for_range(range: &DateRange) -> Option<ComparisonCard> {
        let classification = classify(range);
        ComparisonCard::ALL
            .into_iter()
            .find(|card| card.expected_classification() == classification)
    }
}
