use std::sync::LazyLock;

use chrono::{Datelike, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::query::period::{PeriodUnit, PeriodWindow};

static RE_RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(day|week|month)(?::([+-]?\d{1,4}))?$").unwrap());
static RE_MONTH_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^m(\d{1,2})$").unwrap());

/// Month offsets below this are taken to mean the same month one year later.
pub const MONTH_LOOKBACK_LIMIT: i32 = -6;

/// A period relative to "now": a unit plus a signed count of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodSelector {
    pub unit: PeriodUnit,
    pub offset: i32,
}

impl PeriodSelector {
    pub fn new(unit: PeriodUnit, offset: i32) -> Self {
        Self { unit, offset }
    }

    pub fn current(unit: PeriodUnit) -> Self {
        Self { unit, offset: 0 }
    }

    /// Select a month by its month-of-year number (1-12), relative to the
    /// month `now` falls in.
    pub fn from_month_number(target: u32, now: NaiveDateTime) -> Result<Self> {
        let offset = month_offset_from_number(target, now.month())?;
        Ok(Self::new(PeriodUnit::Month, offset))
    }

    /// Parse a selector string.
    ///
    /// Supported formats:
    /// - `today` / `wtd` / `mtd`: current day, week, month
    /// - `day`, `week`, `month`: same as offset 0
    /// - `day:-1`, `week:2`, `month:-3`: signed offsets
    /// - `m7`: July, resolved against the month of `now`
    pub fn parse(s: &str, now: NaiveDateTime) -> Result<Self> {
        let s = s.trim().to_lowercase();

        match s.as_str() {
            "today" => return Ok(Self::current(PeriodUnit::Day)),
            "wtd" => return Ok(Self::current(PeriodUnit::Week)),
            "mtd" => return Ok(Self::current(PeriodUnit::Month)),
            _ => {}
        }

        if let Some(caps) = RE_RELATIVE.captures(&s) {
            let unit = match &caps[1] {
                "day" => PeriodUnit::Day,
                "week" => PeriodUnit::Week,
                _ => PeriodUnit::Month,
            };
            let offset = match caps.get(2) {
                Some(m) => m
                    .as_str()
                    .parse::<i32>()
                    .map_err(|_| Error::InvalidSelector(format!("bad offset: {s}")))?,
                None => 0,
            };
            return Ok(Self::new(unit, offset));
        }

        if let Some(caps) = RE_MONTH_NUMBER.captures(&s) {
            let target: u32 = caps[1]
                .parse()
                .map_err(|_| Error::InvalidSelector(format!("bad month: {s}")))?;
            return Self::from_month_number(target, now);
        }

        Err(Error::InvalidSelector(format!("unrecognized selector: {s}")))
    }

    pub fn window(&self, now: NaiveDateTime) -> PeriodWindow {
        PeriodWindow::compute(self.unit, now, self.offset)
    }
}

/// Signed month offset for a requested month-of-year number.
///
/// `target - current`, with offsets below `-6` moved forward a year so the
/// selectable range is a rolling year around the current month.
pub fn month_offset_from_number(target: u32, current: u32) -> Result<i32> {
    if !(1..=12).contains(&target) {
        return Err(Error::InvalidSelector(format!(
            "month must be between 1 and 12, got {target}"
        )));
    }
    if !(1..=12).contains(&current) {
        return Err(Error::InvalidSelector(format!(
            "current month must be between 1 and 12, got {current}"
        )));
    }
    Ok(normalize_month_offset(target as i32 - current as i32))
}

pub fn normalize_month_offset(offset: i32) -> i32 {
    if offset < MONTH_LOOKBACK_LIMIT {
        offset + 12
    } else {
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_month_offset_from_number() {
        assert_eq!(month_offset_from_number(3, 3).unwrap(), 0);
        assert_eq!(month_offset_from_number(2, 3).unwrap(), -1);
        // January asking for July: +6 is within range, no adjustment
        assert_eq!(month_offset_from_number(7, 1).unwrap(), 6);
        // December asking for January: -11 moves forward a year
        assert_eq!(month_offset_from_number(1, 12).unwrap(), 1);
        // -6 is the boundary and is kept
        assert_eq!(month_offset_from_number(1, 7).unwrap(), -6);
        assert_eq!(month_offset_from_number(1, 8).unwrap(), 5);
    }

    #[test]
    fn test_month_offset_rejects_out_of_range() {
        assert!(matches!(
            month_offset_from_number(0, 3),
            Err(Error::InvalidSelector(_))
        ));
        assert!(matches!(
            month_offset_from_number(13, 3),
            Err(Error::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_january_requesting_july_is_current_year() {
        let now = at(2025, 1, 20);
        let sel = PeriodSelector::from_month_number(7, now).unwrap();
        assert_eq!(sel.offset, 6);
        let w = sel.window(now);
        assert_eq!(w.start.date(), NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(w.end.date(), NaiveDate::from_ymd_opt(2025, 7, 31).unwrap());
    }

    #[test]
    fn test_normalized_window_matches_offset_plus_twelve() {
        for current in 1..=12u32 {
            let now = at(2024, current, 10);
            for target in 1..=12u32 {
                let raw = target as i32 - current as i32;
                let sel = PeriodSelector::from_month_number(target, now).unwrap();
                if raw < -6 {
                    assert_eq!(
                        sel.window(now),
                        PeriodWindow::compute(PeriodUnit::Month, now, raw + 12)
                    );
                } else {
                    assert_eq!(sel.window(now), PeriodWindow::compute(PeriodUnit::Month, now, raw));
                }
                assert_eq!(sel.window(now).start.month(), target);
            }
        }
    }

    #[test]
    fn test_parse_relative() {
        let now = at(2024, 3, 15);
        assert_eq!(
            PeriodSelector::parse("month", now).unwrap(),
            PeriodSelector::new(PeriodUnit::Month, 0)
        );
        assert_eq!(
            PeriodSelector::parse("month:-3", now).unwrap(),
            PeriodSelector::new(PeriodUnit::Month, -3)
        );
        assert_eq!(
            PeriodSelector::parse("week:+2", now).unwrap(),
            PeriodSelector::new(PeriodUnit::Week, 2)
        );
        assert_eq!(
            PeriodSelector::parse("Day:-1", now).unwrap(),
            PeriodSelector::new(PeriodUnit::Day, -1)
        );
    }

    #[test]
    fn test_parse_shorthands() {
        let now = at(2024, 3, 15);
        assert_eq!(
            PeriodSelector::parse("today", now).unwrap().unit,
            PeriodUnit::Day
        );
        assert_eq!(
            PeriodSelector::parse("wtd", now).unwrap().unit,
            PeriodUnit::Week
        );
        assert_eq!(
            PeriodSelector::parse("mtd", now).unwrap().unit,
            PeriodUnit::Month
        );
        assert_eq!(PeriodSelector::parse("m1", now).unwrap().offset, -2);
        // December is +9 from March; only offsets below -6 wrap
        assert_eq!(PeriodSelector::parse("m12", now).unwrap().offset, 9);
    }

    #[test]
    fn test_parse_invalid() {
        let now = at(2024, 3, 15);
        assert!(PeriodSelector::parse("garbage", now).is_err());
        assert!(PeriodSelector::parse("year:1", now).is_err());
        assert!(PeriodSelector::parse("m13", now).is_err());
        assert!(PeriodSelector::parse("month:abc", now).is_err());
    }
}
