use chrono::{Datelike, NaiveDate};

use crate::period::PeriodKey;
use crate::range::{days_in_month, first_day_of_month, shift_month, DateRange};

/// Progress of a range picked on the calendar grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Empty,
    PendingStart(NaiveDate),
    Complete { from: NaiveDate, to: NaiveDate },
}

impl Selection {
    pub fn range(&self) -> DateRange {
        match *self {
            Selection::Empty => DateRange::empty(),
            Selection::PendingStart(start) => DateRange::pending(start),
            Selection::Complete { from, to } => DateRange::new(Some(from), Some(to)),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Selection::Complete { .. })
    }

    fn complete(range: DateRange) -> Self {
        match range.bounds() {
            Some((from, to)) => Selection::Complete { from, to },
            None => Selection::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarEvent {
    DayClicked(NaiveDate),
    PeriodShortcutSelected(PeriodKey),
}

/// Pure transition of the click protocol: the first click starts a pending
/// range, the second completes it with the endpoints ordered, and any click on
/// a complete range starts over. Shortcuts jump straight to their range;
/// `Custom` changes nothing.
pub fn transition(selection: Selection, event: CalendarEvent, today: NaiveDate) -> Selection {
    match (selection, event) {
        (Selection::PendingStart(start), CalendarEvent::DayClicked(day)) => Selection::Complete {
            from: start.min(day),
            to: start.max(day),
        },
        (_, CalendarEvent::DayClicked(day)) => Selection::PendingStart(day),
        (current, CalendarEvent::PeriodShortcutSelected(key)) => match key.range(today) {
            Some(range) => Selection::complete(range),
            None => current,
        },
    }
}

/// How a single day should be drawn relative to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayMark {
    Outside,
    Pending,
    Start,
    Inside,
    End,
    Single,
}

/// Calendar widget state: the selection, the month on screen and the active
/// shortcut.
#[derive(Debug, Clone)]
pub struct CalendarController {
    selection: Selection,
    visible_month: NaiveDate,
    period: PeriodKey,
    awaiting_manual: bool,
    today: NaiveDate,
}

impl CalendarController {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            selection: Selection::Empty,
            visible_month: first_day_of_month(today),
            period: PeriodKey::Custom,
            awaiting_manual: false,
            today,
        }
    }

    /// Seeds the controller with a range that is already applied elsewhere.
    pub fn with_range(range: &DateRange, today: NaiveDate) -> Self {
        let mut controller = Self::new(today);
        if let Some((from, _)) = range.bounds() {
            controller.selection = Selection::complete(*range);
            controller.visible_month = first_day_of_month(from);
            controller.period = PeriodKey::detect(range, today);
        }
        controller
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected_range(&self) -> DateRange {
        self.selection.range()
    }

    pub fn visible_month(&self) -> NaiveDate {
        self.visible_month
    }

    pub fn period(&self) -> PeriodKey {
        self.period
    }

    pub fn is_awaiting_manual(&self) -> bool {
        self.awaiting_manual
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Moves the anchor used by shortcuts, e.g. after midnight.
    pub fn set_today(&mut self, today: NaiveDate) {
        self.today = today;
    }

    /// Applies a shortcut and returns its range. `Custom` keeps the selection and
    /// waits for manual clicks.
    pub fn handle_period_change(&mut self, key: PeriodKey) -> Option<DateRange> {
        self.period = key;
        self.selection = transition(
            self.selection,
            CalendarEvent::PeriodShortcutSelected(key),
            self.today,
        );

        let range = key.range(self.today);
        match range.and_then(|range| range.from) {
            Some(from) => {
                self.visible_month = first_day_of_month(from);
                self.awaiting_manual = false;
            }
            None => self.awaiting_manual = true,
        }
        range
    }

    /// Like [`Self::handle_period_change`], committing the resulting range
    /// through `on_apply` without waiting for a confirm action.
    pub fn handle_period_change_and_apply(
        &mut self,
        key: PeriodKey,
        on_apply: impl FnOnce(DateRange),
    ) -> Option<DateRange> {
        let range = self.handle_period_change(key);
        if let Some(range) = range {
            on_apply(range);
        }
        range
    }

    /// Feeds a click on `day_number` of the visible month. Manual selections are
    /// never applied here; the caller confirms them.
    pub fn handle_day_click(&mut self, day_number: u32) -> Selection {
        let year = self.visible_month.year();
        let month = self.visible_month.month();
        debug_assert!(
            (1..=days_in_month(year, month)).contains(&day_number),
            "day {day_number} is outside {year}-{month:02}"
        );
        let Some(day) = NaiveDate::from_ymd_opt(year, month, day_number) else {
            return self.selection;
        };

        self.selection = transition(self.selection, CalendarEvent::DayClicked(day), self.today);
        self.period = PeriodKey::Custom;
        self.awaiting_manual = !self.selection.is_complete();
        self.selection
    }

    pub fn handle_previous_month(&mut self) {
        self.visible_month = shift_month(self.visible_month, -1);
    }

    pub fn handle_next_month(&mut self) {
        self.visible_month = shift_month(self.visible_month, 1);
    }

    pub fn mark(&self, day: NaiveDate) -> DayMark {
        match self.selection {
            Selection::Empty => DayMark::Outside,
            Selection::PendingStart(start) if start == day => DayMark::Pending,
            Selection::PendingStart(_) => DayMark::Outside,
            Selection::Complete { from, to } if from == to && day == from => DayMark::Single,
            Selection::Complete { from, .. } if day == from => DayMark::Start,
            Selection::Complete { to, .. } if day == to => DayMark::End,
            Selection::Complete { from, to } if day > from && day < to => DayMark::Inside,
            Selection::Complete { .. } => DayMark::Outside,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::period::PeriodKey;
    use crate::range::DateRange;

    use super::{transition, CalendarController, CalendarEvent, DayMark, Selection};

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date should be valid")
    }

    #[test]
    fn second_click_completes_and_orders_the_range() {
        let mut calendar = CalendarController::new(day(2025, 9, 20));
        assert_eq!(calendar.handle_day_click(10), Selection::PendingStart(day(2025, 9, 10)));
        assert!(calendar.is_awaiting_manual());
        assert_eq!(
            calendar.handle_day_click(5),
            Selection::Complete {
                from: day(2025, 9, 5),
                to: day(2025, 9, 10)
            }
        );
        assert!(!calendar.is_awaiting_manual());
        assert_eq!(calendar.period(), PeriodKey::Custom);
    }

    #[test]
    fn clicking_the_same_day_twice_selects_one_day() {
        let mut calendar = CalendarController::new(day(2025, 9, 20));
        calendar.handle_day_click(12);
        assert_eq!(
            calendar.handle_day_click(12),
            Selection::Complete {
                from: day(2025, 9, 12),
                to: day(2025, 9, 12)
            }
        );
        assert_eq!(calendar.selected_range(), DateRange::single(day(2025, 9, 12)));
    }

    #[test]
    fn click_after_complete_starts_over() {
        let today = day(2025, 9, 20);
        let complete = Selection::Complete {
            from: day(2025, 9, 1),
            to: day(2025, 9, 7),
        };
        assert_eq!(
            transition(complete, CalendarEvent::DayClicked(day(2025, 9, 3)), today),
            Selection::PendingStart(day(2025, 9, 3))
        );
    }

    #[test]
    fn complete_states_are_always_ordered() {
        let today = day(2025, 9, 20);
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut selection = Selection::Empty;
        for _ in 0..2_000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let offset = (seed % 90) as i64;
            let clicked = day(2025, 7, 1) + chrono::Duration::days(offset);
            selection = transition(selection, CalendarEvent::DayClicked(clicked), today);
            if let Selection::Complete { from, to } = selection {
                assert!(from <= to, "{from} > {to}");
            }
        }
    }

    #[test]
    fn shortcut_completes_and_moves_visible_month() {
        let mut calendar = CalendarController::new(day(2025, 10, 3));
        let mut applied = Vec::new();
        let range = calendar.handle_period_change_and_apply(PeriodKey::LastMonth, |range| {
            applied.push(range)
        });

        let expected = DateRange::between(day(2025, 9, 1), day(2025, 9, 30));
        assert_eq!(range, Some(expected));
        assert_eq!(applied, vec![expected]);
        assert_eq!(calendar.selected_range(), expected);
        assert_eq!(calendar.visible_month(), day(2025, 9, 1));
        assert_eq!(calendar.period(), PeriodKey::LastMonth);
    }

    #[test]
    fn custom_shortcut_keeps_selection_and_waits_for_clicks() {
        let mut calendar = CalendarController::new(day(2025, 9, 20));
        calendar.handle_day_click(4);
        let mut applied = false;
        let range = calendar.handle_period_change_and_apply(PeriodKey::Custom, |_| applied = true);
        assert_eq!(range, None);
        assert!(!applied);
        assert_eq!(calendar.selection(), Selection::PendingStart(day(2025, 9, 4)));
        assert!(calendar.is_awaiting_manual());
    }

    #[test]
    fn repeated_shortcut_is_idempotent() {
        let mut calendar = CalendarController::new(day(2025, 9, 17));
        let first = calendar.handle_period_change(PeriodKey::ThisWeek);
        let second = calendar.handle_period_change(PeriodKey::ThisWeek);
        assert_eq!(first, second);
        assert_eq!(first, Some(DateRange::between(day(2025, 9, 15), day(2025, 9, 21))));
    }

    #[test]
    fn month_navigation_crosses_years() {
        let mut calendar = CalendarController::new(day(2025, 1, 31));
        calendar.handle_previous_month();
        assert_eq!(calendar.visible_month(), day(2024, 12, 1));
        calendar.handle_next_month();
        calendar.handle_next_month();
        assert_eq!(calendar.visible_month(), day(2025, 2, 1));
        assert_eq!(calendar.handle_day_click(28), Selection::PendingStart(day(2025, 2, 28)));
    }

    #[test]
    fn seeds_from_an_applied_range() {
        let today = day(2025, 9, 17);
        let week = DateRange::between(day(2025, 9, 8), day(2025, 9, 14));
        let calendar = CalendarController::with_range(&week, today);
        assert_eq!(calendar.period(), PeriodKey::LastWeek);
        assert_eq!(calendar.selected_range(), week);
        assert_eq!(calendar.mark(day(2025, 9, 8)), DayMark::Start);
        assert_eq!(calendar.mark(day(2025, 9, 10)), DayMark::Inside);
        assert_eq!(calendar.mark(day(2025, 9, 14)), DayMark::End);
        assert_eq!(calendar.mark(day(2025, 9, 15)), DayMark::Outside);
    }
}
