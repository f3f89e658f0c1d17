use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Storage format for every timestamp column. Fixed width, so text
/// comparison in SQL orders the same way as the instants themselves.
pub const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Get the last day of a given month: the first day of the following month
/// minus one day.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    first_day_of_next_month(year, month) - Duration::days(1)
}

fn first_day_of_next_month(year: i32, month: u32) -> NaiveDate {
    let (y, m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(NaiveDate::MAX)
}

/// ISO weekday number: Monday = 1 ... Sunday = 7.
pub fn iso_weekday(d: NaiveDate) -> u32 {
    d.weekday().number_from_monday()
}

/// The Monday that starts the ISO week containing `d`.
pub fn monday_of(d: NaiveDate) -> NaiveDate {
    d - Duration::days(iso_weekday(d) as i64 - 1)
}

/// `23:59:59.999999`, the last representable microsecond of a day.
pub fn end_of_day_micros() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

pub fn to_sql_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(SQL_TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts the full storage format as well as
/// second-precision and bare-date values written by hand.
pub fn parse_sql_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, SQL_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Parse a weekday name or three-letter abbreviation, case-insensitive.
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    s.trim().parse::<Weekday>().ok()
}

pub fn month_label(m: u32) -> &'static str {
    match m {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2025, 1), d(2025, 1, 31));
        assert_eq!(last_day_of_month(2025, 2), d(2025, 2, 28));
        assert_eq!(last_day_of_month(2024, 2), d(2024, 2, 29)); // Leap year
        assert_eq!(last_day_of_month(1900, 2), d(1900, 2, 28));
        assert_eq!(last_day_of_month(2000, 2), d(2000, 2, 29));
        assert_eq!(last_day_of_month(2025, 4), d(2025, 4, 30));
        assert_eq!(last_day_of_month(2025, 12), d(2025, 12, 31));
    }

    #[test]
    fn test_monday_of() {
        // 2024-03-11 is a Monday
        for day in 11..=17 {
            assert_eq!(monday_of(d(2024, 3, day)), d(2024, 3, 11));
        }
        assert_eq!(monday_of(d(2024, 3, 18)), d(2024, 3, 18));
        // Sunday belongs to the week that started six days earlier
        assert_eq!(iso_weekday(d(2024, 3, 17)), 7);
    }

    #[test]
    fn test_sql_timestamp_is_fixed_width() {
        let a = d(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap();
        let b = d(2024, 3, 1).and_time(end_of_day_micros());
        assert_eq!(to_sql_timestamp(&a), "2024-03-01 00:00:00.000000");
        assert_eq!(to_sql_timestamp(&b), "2024-03-01 23:59:59.999999");
        assert!(to_sql_timestamp(&a) < to_sql_timestamp(&b));
    }

    #[test]
    fn test_parse_sql_timestamp() {
        let expected = d(2024, 3, 1).and_hms_micro_opt(8, 30, 0, 250_000).unwrap();
        assert_eq!(
            parse_sql_timestamp("2024-03-01 08:30:00.250000"),
            Some(expected)
        );
        assert_eq!(
            parse_sql_timestamp("2024-03-01"),
            Some(d(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(parse_sql_timestamp("garbage"), None);
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("saturday"), Some(Weekday::Sat));
        assert_eq!(parse_weekday("Wed"), Some(Weekday::Wed));
        assert_eq!(parse_weekday("someday"), None);
    }
}
