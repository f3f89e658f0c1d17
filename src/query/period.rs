use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::date_util::{end_of_day_micros, last_day_of_month, monday_of};

/// Calendar unit a window covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
}

impl std::fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PeriodUnit::Day => "day",
            PeriodUnit::Week => "week",
            PeriodUnit::Month => "month",
        };
        f.write_str(s)
    }
}

/// Absolute, inclusive `[start, end]` instants a period selector resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodWindow {
    pub unit: PeriodUnit,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PeriodWindow {
    /// Resolve `offset` units away from the unit containing `now`.
    ///
    /// - Day: the calendar day, `00:00:00.000000` to `23:59:59.999999`.
    /// - Week: Monday `00:00:00` to the following Sunday `23:59:59.999999`.
    /// - Month: the first day `00:00:00` to the last day `23:59:59`.
    ///
    /// Positive offsets move forward in time. Every integer offset is valid.
    pub fn compute(unit: PeriodUnit, now: NaiveDateTime, offset: i32) -> Self {
        match unit {
            PeriodUnit::Day => Self::day(now.date() + Duration::days(offset as i64)),
            PeriodUnit::Week => Self::week_starting(monday_of(now.date()) + Duration::weeks(offset as i64)),
            PeriodUnit::Month => {
                let (year, month) = shift_month(now.year(), now.month(), offset);
                Self::month(year, month)
            }
        }
    }

    /// The single calendar day `d`.
    pub fn day(d: NaiveDate) -> Self {
        PeriodWindow {
            unit: PeriodUnit::Day,
            start: d.and_time(NaiveTime::MIN),
            end: d.and_time(end_of_day_micros()),
        }
    }

    /// The ISO week (Monday through Sunday) containing `d`.
    pub fn week_of(d: NaiveDate) -> Self {
        Self::week_starting(monday_of(d))
    }

    fn week_starting(monday: NaiveDate) -> Self {
        PeriodWindow {
            unit: PeriodUnit::Week,
            start: monday.and_time(NaiveTime::MIN),
            end: (monday + Duration::days(6)).and_time(end_of_day_micros()),
        }
    }

    /// The calendar month `month` of `year`. Months outside 1..=12 are
    /// wrapped with the corresponding year adjustment.
    pub fn month(year: i32, month: u32) -> Self {
        let (year, month) = shift_month(year, 1, month as i32 - 1);
        let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
        let last = last_day_of_month(year, month);
        PeriodWindow {
            unit: PeriodUnit::Month,
            start: first.and_time(NaiveTime::MIN),
            end: last.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)),
        }
    }

    /// The most recent ISO week whose Sunday end is at or before `at`.
    pub fn last_completed_week(at: NaiveDateTime) -> Self {
        let current = Self::week_of(at.date());
        if current.end <= at {
            current
        } else {
            current.previous()
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }

    /// Canonical label: `2024-03`, `2024-W11`, or `2024-03-15`.
    pub fn label(&self) -> String {
        let d = self.start.date();
        match self.unit {
            PeriodUnit::Day => d.format("%Y-%m-%d").to_string(),
            PeriodUnit::Week => {
                let iw = d.iso_week();
                format!("{}-W{:02}", iw.year(), iw.week())
            }
            PeriodUnit::Month => format!("{}-{:02}", d.year(), d.month()),
        }
    }

    /// The window of the same unit immediately before this one.
    pub fn previous(&self) -> Self {
        Self::compute(self.unit, self.start, -1)
    }

    /// The window of the same unit immediately after this one.
    pub fn next(&self) -> Self {
        Self::compute(self.unit, self.start, 1)
    }
}

impl std::fmt::Display for PeriodWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{} .. {}]", self.label(), self.start, self.end)
    }
}

/// `month + offset`, wrapped into 1..=12 with the year carried.
fn shift_month(year: i32, month: u32, offset: i32) -> (i32, u32) {
    let mut target = month as i32 + offset;
    let mut year = year;
    while target < 1 {
        target += 12;
        year -= 1;
    }
    while target > 12 {
        target -= 12;
        year += 1;
    }
    (year, target as u32)
}

/// Shorthand for `PeriodWindow::compute`.
pub fn compute_window(unit: PeriodUnit, now: NaiveDateTime, offset: i32) -> PeriodWindow {
    PeriodWindow::compute(unit, now, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_window_current() {
        let w = compute_window(PeriodUnit::Month, at(2024, 3, 15, 10, 30, 0), 0);
        assert_eq!(w.start, at(2024, 3, 1, 0, 0, 0));
        assert_eq!(w.end, at(2024, 3, 31, 23, 59, 59));
        assert_eq!(w.label(), "2024-03");
    }

    #[test]
    fn test_week_window_current() {
        let w = compute_window(PeriodUnit::Week, at(2024, 3, 15, 10, 30, 0), 0);
        assert_eq!(w.start, at(2024, 3, 11, 0, 0, 0));
        assert_eq!(w.end, date(2024, 3, 17).and_time(end_of_day_micros()));
        assert_eq!(w.start.weekday(), Weekday::Mon);
        assert_eq!(w.end.weekday(), Weekday::Sun);
        assert_eq!(w.label(), "2024-W11");
    }

    #[test]
    fn test_day_window() {
        let w = compute_window(PeriodUnit::Day, at(2024, 3, 15, 10, 30, 0), 0);
        assert_eq!(w.start, at(2024, 3, 15, 0, 0, 0));
        assert_eq!(w.end, date(2024, 3, 15).and_time(end_of_day_micros()));

        let y = compute_window(PeriodUnit::Day, at(2024, 3, 1, 0, 0, 0), -1);
        assert_eq!(y.start.date(), date(2024, 2, 29));
    }

    #[test]
    fn test_month_end_is_last_calendar_day_for_all_offsets() {
        let now = at(2024, 3, 15, 12, 0, 0);
        for offset in -30..=30 {
            let w = compute_window(PeriodUnit::Month, now, offset);
            let end = w.end.date();
            let next = end + Duration::days(1);
            assert_eq!(next.day(), 1, "offset {offset}: {end} is not a month end");
            assert_eq!(end.month(), w.start.month());
            assert_eq!(end.year(), w.start.year());
            assert_eq!(w.start.day(), 1);
            assert!(w.start <= w.end);
        }
    }

    #[test]
    fn test_month_lengths_including_leap_february() {
        let feb_2024 = compute_window(PeriodUnit::Month, at(2024, 3, 15, 0, 0, 0), -1);
        assert_eq!(feb_2024.end.date(), date(2024, 2, 29));

        let feb_2023 = compute_window(PeriodUnit::Month, at(2023, 3, 15, 0, 0, 0), -1);
        assert_eq!(feb_2023.end.date(), date(2023, 2, 28));

        let april = compute_window(PeriodUnit::Month, at(2024, 3, 15, 0, 0, 0), 1);
        assert_eq!(april.end.date(), date(2024, 4, 30));
    }

    #[test]
    fn test_month_year_rollover() {
        let dec = compute_window(PeriodUnit::Month, at(2024, 1, 10, 0, 0, 0), -1);
        assert_eq!(dec.start, at(2023, 12, 1, 0, 0, 0));
        assert_eq!(dec.end, at(2023, 12, 31, 23, 59, 59));

        let jan = compute_window(PeriodUnit::Month, at(2024, 12, 10, 0, 0, 0), 1);
        assert_eq!(jan.start, at(2025, 1, 1, 0, 0, 0));

        let far_back = compute_window(PeriodUnit::Month, at(2024, 3, 10, 0, 0, 0), -27);
        assert_eq!(far_back.start, at(2021, 12, 1, 0, 0, 0));
    }

    #[test]
    fn test_week_window_every_weekday_including_sunday() {
        // 2024-03-11 (Mon) .. 2024-03-17 (Sun)
        for day in 11..=17 {
            let w = compute_window(PeriodUnit::Week, at(2024, 3, day, 23, 0, 0), 0);
            assert_eq!(w.start, at(2024, 3, 11, 0, 0, 0), "day {day}");
            assert_eq!(w.end.date(), date(2024, 3, 17));
            assert_eq!(w.end.time(), end_of_day_micros());
        }
    }

    #[test]
    fn test_week_offsets_span_year_boundary() {
        // 2025-01-01 is a Wednesday; its week starts Monday 2024-12-30
        let w = compute_window(PeriodUnit::Week, at(2025, 1, 1, 9, 0, 0), 0);
        assert_eq!(w.start.date(), date(2024, 12, 30));
        assert_eq!(w.end.date(), date(2025, 1, 5));

        let prev = compute_window(PeriodUnit::Week, at(2025, 1, 1, 9, 0, 0), -1);
        assert_eq!(prev.start.date(), date(2024, 12, 23));
        assert_eq!(prev.end.date(), date(2024, 12, 29));

        let next = compute_window(PeriodUnit::Week, at(2025, 1, 1, 9, 0, 0), 1);
        assert_eq!(next.start.date(), date(2025, 1, 6));
    }

    #[test]
    fn test_consecutive_weeks_are_contiguous() {
        let w = PeriodWindow::week_of(date(2024, 3, 15));
        let n = w.next();
        assert_eq!(n.start, (w.end.date() + Duration::days(1)).and_time(NaiveTime::MIN));
        assert_eq!(n.previous(), w);
    }

    #[test]
    fn test_last_completed_week() {
        let week_11 = PeriodWindow::week_of(date(2024, 3, 11));

        // Saturday night: the current week still has Sunday to go
        let sat = PeriodWindow::last_completed_week(at(2024, 3, 16, 23, 59, 0));
        assert_eq!(sat, week_11.previous());

        // Late Sunday is still inside the week
        let sun = PeriodWindow::last_completed_week(at(2024, 3, 17, 23, 59, 59));
        assert_eq!(sun, week_11.previous());

        // Exactly at the week's end, and any time the following Monday
        assert_eq!(PeriodWindow::last_completed_week(week_11.end), week_11);
        assert_eq!(
            PeriodWindow::last_completed_week(at(2024, 3, 18, 0, 0, 0)),
            week_11
        );
        assert_eq!(
            PeriodWindow::last_completed_week(at(2024, 3, 20, 12, 0, 0)),
            week_11
        );
    }

    #[test]
    fn test_last_completed_week_across_year() {
        let w = PeriodWindow::last_completed_week(at(2025, 1, 1, 9, 0, 0));
        assert_eq!(w.start.date(), date(2024, 12, 23));
        assert_eq!(w.end.date(), date(2024, 12, 29));
    }

    #[test]
    fn test_month_constructor_wraps() {
        assert_eq!(PeriodWindow::month(2024, 13), PeriodWindow::month(2025, 1));
        assert_eq!(PeriodWindow::month(2024, 0), PeriodWindow::month(2023, 12));
    }

    #[test]
    fn test_compute_does_not_depend_on_time_of_day() {
        let morning = compute_window(PeriodUnit::Month, at(2024, 3, 31, 0, 0, 0), 0);
        let night = compute_window(PeriodUnit::Month, at(2024, 3, 31, 23, 59, 59), 0);
        assert_eq!(morning, night);
    }
}
