//! Date utility functions for the chart time scale
//!
//! View-mode aware date arithmetic: columns are counted in calendar
//! boundaries (days, weeks, months, years) for calendar units and linearly
//! for sub-day units, so variable-length months stay visually uniform.
//! Also holds the calendar working-day check and the serde date codec.

use chrono::{
    DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday,
};
use serde::Serialize;

use crate::error::{GanttError, Result};
use crate::types::{Calendar, CalendarException, Task, ViewMode};

/// Smallest number of columns the grid renders
pub const MINIMUM_DISPLAYED_TIME_UNIT: usize = 30;

const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse the date formats the host is allowed to send
///
/// Accepts `YYYY-MM-DD`, naive date-times with `T` or a space separator and
/// RFC 3339 strings (converted to UTC).
pub fn parse_date(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(date);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|d| d.naive_utc())
        .map_err(|_| GanttError::InvalidDate(value.to_string()))
}

pub fn format_date(date: &NaiveDateTime) -> String {
    date.format(OUTPUT_FORMAT).to_string()
}

/// Milliseconds since the Unix epoch, as JS `Date.getTime()` reports them
pub fn from_millis(ms: i64) -> Result<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms)
        .map(|d| d.naive_utc())
        .ok_or_else(|| GanttError::InvalidDate(ms.to_string()))
}

/// Serde codec for `NaiveDateTime` fields
///
/// Reads ISO strings or epoch milliseconds, always writes
/// `YYYY-MM-DDTHH:MM:SS`.
pub mod serde_date {
    use std::fmt;

    use chrono::NaiveDateTime;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_date(date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DateVisitor)
    }

    struct DateVisitor;

    impl<'de> Visitor<'de> for DateVisitor {
        type Value = NaiveDateTime;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an ISO date string or epoch milliseconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            super::parse_date(v).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            super::from_millis(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            let ms = i64::try_from(v).map_err(E::custom)?;
            super::from_millis(ms).map_err(E::custom)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            super::from_millis(v as i64).map_err(E::custom)
        }
    }
}

pub fn start_of_day(date: NaiveDateTime) -> NaiveDateTime {
    date.date().and_time(NaiveTime::MIN)
}

/// Start of the current UTC day
pub fn today() -> NaiveDateTime {
    start_of_day(chrono::Utc::now().naive_utc())
}

/// Day index in the calendar convention (0=Sunday, 1=Monday, etc.)
pub fn weekday_index(date: &NaiveDate) -> u32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// Check if a date is a working day based on the calendar
pub fn is_work_day(date: &NaiveDate, calendar: &Calendar) -> bool {
    // Check exceptions first
    let date_str = date.format("%Y-%m-%d").to_string();

    if let Some(exception) = calendar.exceptions.get(&date_str) {
        return match exception {
            CalendarException::Rule { working, .. } => *working,
            // String exceptions are non-working days
            CalendarException::Holiday(_) => false,
        };
    }

    calendar.working_days.contains(&weekday_index(date))
}

/// Sub-day units advance linearly; returns the unit length in hours
fn hours_per_unit(view_mode: ViewMode) -> Option<i64> {
    match view_mode {
        ViewMode::Hour => Some(1),
        ViewMode::QuarterDay => Some(6),
        ViewMode::HalfDay => Some(12),
        _ => None,
    }
}

fn days_per_unit(view_mode: ViewMode) -> Option<i64> {
    match view_mode {
        ViewMode::Day => Some(1),
        ViewMode::TwoDays => Some(2),
        ViewMode::Week => Some(7),
        _ => None,
    }
}

fn months_per_unit(view_mode: ViewMode) -> Option<i64> {
    match view_mode {
        ViewMode::Month => Some(1),
        ViewMode::QuarterYear => Some(3),
        ViewMode::Year => Some(12),
        _ => None,
    }
}

/// Date of the column `offset` units away from `start`
pub fn date_by_offset(start: NaiveDateTime, offset: i64, view_mode: ViewMode) -> NaiveDateTime {
    if let Some(hours) = hours_per_unit(view_mode) {
        return start + TimeDelta::hours(hours * offset);
    }

    if let Some(days) = days_per_unit(view_mode) {
        return start + TimeDelta::days(days * offset);
    }

    let months = months_per_unit(view_mode).unwrap_or(1) * offset;
    let shifted = if months >= 0 {
        u32::try_from(months)
            .ok()
            .and_then(|m| start.checked_add_months(Months::new(m)))
    } else {
        u32::try_from(-months)
            .ok()
            .and_then(|m| start.checked_sub_months(Months::new(m)))
    };
    shifted.unwrap_or(start)
}

/// Number of whole columns between `start` and `date`
///
/// Negative when `date` precedes `start`. The result `n` always satisfies
/// `date_by_offset(start, n) <= date < date_by_offset(start, n + 1)`.
pub fn dates_diff(start: NaiveDateTime, date: NaiveDateTime, view_mode: ViewMode) -> i64 {
    let mut n = if let Some(hours) = hours_per_unit(view_mode) {
        (date - start).num_minutes().div_euclid(hours * 60)
    } else if let Some(days) = days_per_unit(view_mode) {
        (date - start).num_minutes().div_euclid(days * 24 * 60)
    } else {
        let step = months_per_unit(view_mode).unwrap_or(1);
        let months = i64::from(date.year() - start.year()) * 12 + i64::from(date.month())
            - i64::from(start.month());
        months.div_euclid(step)
    };

    // Month lengths and sub-minute remainders make the first guess off by one
    while n > i64::MIN && date_by_offset(start, n, view_mode) > date {
        n -= 1;
    }
    while date_by_offset(start, n + 1, view_mode) <= date {
        n += 1;
    }
    n
}

/// Columns between two dates including the fraction of the current column
pub fn fractional_offset(start: NaiveDateTime, date: NaiveDateTime, view_mode: ViewMode) -> f64 {
    let index = dates_diff(start, date, view_mode);
    let cell_start = date_by_offset(start, index, view_mode);
    let cell_end = date_by_offset(start, index + 1, view_mode);
    let cell_ms = (cell_end - cell_start).num_milliseconds();

    let fraction = if cell_ms > 0 {
        (date - cell_start).num_milliseconds() as f64 / cell_ms as f64
    } else {
        0.0
    };

    index as f64 + fraction
}

/// Floor of a date to the start of its column unit
///
/// Weeks start on Monday.
pub fn start_of_unit(date: NaiveDateTime, view_mode: ViewMode) -> NaiveDateTime {
    let day = start_of_day(date);

    match view_mode {
        ViewMode::Hour | ViewMode::QuarterDay | ViewMode::HalfDay => {
            let step = hours_per_unit(view_mode).unwrap_or(1) as u32;
            let hour = date.hour() - date.hour() % step;
            day + TimeDelta::hours(i64::from(hour))
        }
        ViewMode::Day | ViewMode::TwoDays => day,
        ViewMode::Week => {
            day - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()))
        }
        ViewMode::Month | ViewMode::QuarterYear | ViewMode::Year => {
            let month = match view_mode {
                ViewMode::Month => date.month(),
                ViewMode::QuarterYear => date.month() - (date.month() - 1) % 3,
                _ => 1,
            };
            NaiveDate::from_ymd_opt(date.year(), month, 1)
                .map(|d| d.and_time(NaiveTime::MIN))
                .unwrap_or(day)
        }
    }
}

/// Columns appended after the latest task end
fn trailing_units(view_mode: ViewMode) -> i64 {
    match view_mode {
        ViewMode::Hour => 24,
        ViewMode::QuarterDay => 12,
        ViewMode::HalfDay => 6,
        ViewMode::Day => 19,
        ViewMode::TwoDays => 10,
        ViewMode::Week => 6,
        ViewMode::Month => 12,
        ViewMode::QuarterYear => 4,
        ViewMode::Year => 2,
    }
}

/// Time span covered by the chart
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    /// Date of the first column
    #[serde(with = "serde_date")]
    pub start_date: NaiveDateTime,

    /// Earliest task start
    #[serde(with = "serde_date")]
    pub min_task_date: NaiveDateTime,

    /// Number of columns
    pub dates_length: usize,
}

impl DateRange {
    pub fn svg_width(&self, column_width: f64) -> f64 {
        self.dates_length.max(MINIMUM_DISPLAYED_TIME_UNIT) as f64 * column_width
    }
}

/// Compute the chart range over the dated tasks
///
/// Empty rows are ignored. Without any dated task the range starts at the
/// current day.
pub fn gantt_date_range<'a, I>(tasks: I, view_mode: ViewMode, pre_steps_count: u32) -> DateRange
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut bounds: Option<(NaiveDateTime, NaiveDateTime)> = None;

    for task in tasks.into_iter().filter(|t| !t.is_empty()) {
        bounds = Some(match bounds {
            None => (task.start, task.end),
            Some((min, max)) => (min.min(task.start), max.max(task.end)),
        });
    }

    let (min_task_date, max_task_date) = bounds.unwrap_or_else(|| {
        let now = today();
        (now, now)
    });

    let start_date = date_by_offset(
        start_of_unit(min_task_date, view_mode),
        -i64::from(pre_steps_count),
        view_mode,
    );
    let end_date = date_by_offset(
        start_of_unit(max_task_date, view_mode),
        trailing_units(view_mode),
        view_mode,
    );

    let dates_length = dates_diff(start_date, end_date, view_mode).max(0) as usize;

    DateRange {
        start_date,
        min_task_date,
        dates_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, day};

    #[test]
    fn parses_every_accepted_format() {
        assert_eq!(parse_date("2024-01-05").unwrap(), day(2024, 1, 5));
        assert_eq!(parse_date("2024-01-05T10:30:00").unwrap(), at(2024, 1, 5, 10, 30));
        assert_eq!(parse_date("2024-01-05 10:30:00").unwrap(), at(2024, 1, 5, 10, 30));
        assert_eq!(parse_date("2024-01-05T10:30").unwrap(), at(2024, 1, 5, 10, 30));
        assert_eq!(
            parse_date("2024-01-05T10:30:00+02:00").unwrap(),
            at(2024, 1, 5, 8, 30)
        );
        assert!(matches!(parse_date("5/1/2024"), Err(GanttError::InvalidDate(_))));
    }

    #[test]
    fn serde_codec_accepts_millis() {
        #[derive(serde::Deserialize)]
        struct Holder {
            #[serde(with = "serde_date")]
            date: NaiveDateTime,
        }

        let holder: Holder = serde_json::from_str(r#"{"date": 1704067200000}"#).unwrap();
        assert_eq!(holder.date, day(2024, 1, 1));
    }

    #[test]
    fn months_are_counted_by_boundary() {
        let start = day(2024, 1, 1);
        assert_eq!(dates_diff(start, day(2024, 2, 29), ViewMode::Month), 1);
        assert_eq!(dates_diff(start, day(2024, 3, 1), ViewMode::Month), 2);
        assert_eq!(dates_diff(start, day(2023, 12, 31), ViewMode::Month), -1);
        assert_eq!(dates_diff(start, day(2024, 7, 1), ViewMode::QuarterYear), 2);
        assert_eq!(dates_diff(start, day(2026, 6, 1), ViewMode::Year), 2);
    }

    #[test]
    fn linear_units_floor() {
        let start = day(2024, 1, 1);
        assert_eq!(dates_diff(start, at(2024, 1, 1, 13, 0), ViewMode::HalfDay), 2);
        assert_eq!(dates_diff(start, at(2023, 12, 31, 23, 0), ViewMode::Day), -1);
        assert_eq!(dates_diff(start, day(2024, 1, 15), ViewMode::Week), 2);
    }

    #[test]
    fn offset_round_trips_with_diff() {
        let start = day(2024, 1, 1);
        for mode in [ViewMode::Hour, ViewMode::Day, ViewMode::Week, ViewMode::Month, ViewMode::Year] {
            let date = date_by_offset(start, 7, mode);
            assert_eq!(dates_diff(start, date, mode), 7, "{mode:?}");
        }
    }

    #[test]
    fn fraction_of_current_column() {
        let start = day(2024, 1, 1);
        let offset = fractional_offset(start, at(2024, 1, 3, 12, 0), ViewMode::Day);
        assert!((offset - 2.5).abs() < 1e-9);
    }

    #[test]
    fn unit_floors() {
        let date = at(2024, 5, 15, 14, 20);
        assert_eq!(start_of_unit(date, ViewMode::QuarterDay), at(2024, 5, 15, 12, 0));
        assert_eq!(start_of_unit(date, ViewMode::Week), day(2024, 5, 13));
        assert_eq!(start_of_unit(date, ViewMode::QuarterYear), day(2024, 4, 1));
        assert_eq!(start_of_unit(date, ViewMode::Year), day(2024, 1, 1));
    }

    #[test]
    fn date_range_pads_both_sides() {
        let tasks = vec![
            Task::new("a", day(2024, 1, 3), day(2024, 1, 5)),
            Task::new("b", day(2024, 1, 4), day(2024, 1, 10)),
            Task::empty("placeholder"),
        ];

        let range = gantt_date_range(&tasks, ViewMode::Day, 1);
        assert_eq!(range.start_date, day(2024, 1, 2));
        assert_eq!(range.min_task_date, day(2024, 1, 3));
        // Jan 2 through Jan 29 exclusive
        assert_eq!(range.dates_length, 27);
        assert_eq!(range.svg_width(60.0), 30.0 * 60.0);
    }

    #[test]
    fn calendar_exceptions_override_weekdays() {
        let mut calendar = Calendar::default();
        calendar
            .exceptions
            .insert("2024-01-01".into(), CalendarException::Holiday("New Year".into()));
        calendar.exceptions.insert(
            "2024-01-06".into(),
            CalendarException::Rule {
                working: true,
                description: None,
            },
        );

        assert!(!is_work_day(&day(2024, 1, 1).date(), &calendar));
        assert!(is_work_day(&day(2024, 1, 2).date(), &calendar));
        assert!(is_work_day(&day(2024, 1, 6).date(), &calendar));
        assert!(!is_work_day(&day(2024, 1, 7).date(), &calendar));
    }
}
