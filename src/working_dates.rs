//! Working-date adjustment
//!
//! Dragged dates are first rounded by the host's rounding policy, then moved
//! off holidays in the direction that keeps or extends the task. Dependency
//! enforcement re-anchors a task next to its source while keeping its
//! inclusive working-day count, walking day by day over the holiday policy.
//!
//! Working-day arithmetic is day granular: the day is moved and the
//! time of day of the task is kept.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{DateMoveStep, GanttConfig};
use crate::date_utils::{is_work_day, start_of_day};
use crate::types::{BarMoveAction, Calendar, DateExtremity, Dependency, Task, ViewMode};

/// Upper bound of a single working-day walk (ten years of days)
const MAX_WORKDAY_SCAN: usize = 3660;

/// Time scale context handed to holiday predicates
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateSetup {
    pub view_mode: ViewMode,
    #[serde(with = "crate::date_utils::serde_date")]
    pub reference_date: NaiveDateTime,
    pub pre_steps_count: u32,
}

/// Decides which days are not worked
///
/// Must be a pure function of its inputs.
pub trait HolidayPolicy {
    fn is_holiday(&self, date: NaiveDateTime, setup: &DateSetup, extremity: DateExtremity) -> bool;
}

impl HolidayPolicy for Calendar {
    fn is_holiday(&self, date: NaiveDateTime, _setup: &DateSetup, _extremity: DateExtremity) -> bool {
        !is_work_day(&date.date(), self)
    }
}

/// Every day is a working day
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

impl HolidayPolicy for NoHolidays {
    fn is_holiday(&self, _date: NaiveDateTime, _setup: &DateSetup, _extremity: DateExtremity) -> bool {
        false
    }
}

impl<F> HolidayPolicy for F
where
    F: Fn(NaiveDateTime, &DateSetup, DateExtremity) -> bool,
{
    fn is_holiday(&self, date: NaiveDateTime, setup: &DateSetup, extremity: DateExtremity) -> bool {
        self(date, setup, extremity)
    }
}

/// Rounds raw drag positions; must be idempotent
pub trait RoundingPolicy {
    fn round(
        &self,
        date: NaiveDateTime,
        view_mode: ViewMode,
        extremity: DateExtremity,
        action: BarMoveAction,
    ) -> NaiveDateTime;
}

/// Rounds to the nearest multiple of the configured step
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRounding(pub DateMoveStep);

impl RoundingPolicy for DefaultRounding {
    fn round(
        &self,
        date: NaiveDateTime,
        _view_mode: ViewMode,
        _extremity: DateExtremity,
        _action: BarMoveAction,
    ) -> NaiveDateTime {
        let step = self.0.duration().num_milliseconds();
        if step <= 0 {
            return date;
        }

        let ms = date.and_utc().timestamp_millis();
        let rest = ms.rem_euclid(step);
        let offset = if rest * 2 >= step { step - rest } else { -rest };
        date + TimeDelta::milliseconds(offset)
    }
}

impl<F> RoundingPolicy for F
where
    F: Fn(NaiveDateTime, ViewMode, DateExtremity, BarMoveAction) -> NaiveDateTime,
{
    fn round(
        &self,
        date: NaiveDateTime,
        view_mode: ViewMode,
        extremity: DateExtremity,
        action: BarMoveAction,
    ) -> NaiveDateTime {
        self(date, view_mode, extremity, action)
    }
}

/// Holiday and rounding policies bound to one time scale
pub struct WorkingCalendar<'p> {
    holidays: &'p dyn HolidayPolicy,
    rounding: &'p dyn RoundingPolicy,
    setup: DateSetup,
}

fn day_of(date: NaiveDateTime, time_source: NaiveDateTime) -> NaiveDateTime {
    date.date().and_time(time_source.time())
}

impl<'p> WorkingCalendar<'p> {
    pub fn new(
        holidays: &'p dyn HolidayPolicy,
        rounding: &'p dyn RoundingPolicy,
        setup: DateSetup,
    ) -> Self {
        Self {
            holidays,
            rounding,
            setup,
        }
    }

    /// Calendar honouring `is_adjust_to_working_dates`
    ///
    /// With adjustment off every day counts as worked.
    pub fn for_config(
        config: &GanttConfig,
        holidays: &'p dyn HolidayPolicy,
        rounding: &'p dyn RoundingPolicy,
        setup: DateSetup,
    ) -> Self {
        if config.is_adjust_to_working_dates {
            Self::new(holidays, rounding, setup)
        } else {
            Self::new(&NoHolidays, rounding, setup)
        }
    }

    pub fn setup(&self) -> &DateSetup {
        &self.setup
    }

    pub fn is_holiday(&self, date: NaiveDateTime, extremity: DateExtremity) -> bool {
        self.holidays.is_holiday(date, &self.setup, extremity)
    }

    pub fn round(
        &self,
        date: NaiveDateTime,
        extremity: DateExtremity,
        action: BarMoveAction,
    ) -> NaiveDateTime {
        self.rounding.round(date, self.setup.view_mode, extremity, action)
    }

    /// Walk from the day of `date` while it is a holiday
    fn walk(&self, date: NaiveDateTime, forward: bool, extremity: DateExtremity) -> NaiveDateTime {
        let step = if forward {
            TimeDelta::days(1)
        } else {
            TimeDelta::days(-1)
        };
        let mut day = start_of_day(date);

        for _ in 0..MAX_WORKDAY_SCAN {
            if !self.is_holiday(day, extremity) {
                return day;
            }
            day += step;
        }

        warn!(date = %date, "no working day found within the scan limit");
        start_of_day(date)
    }

    /// Start of the first working day at or after `date`
    pub fn same_or_next_work_start(&self, date: NaiveDateTime) -> NaiveDateTime {
        self.walk(date, true, DateExtremity::StartOfTask)
    }

    /// Start of the first working day strictly after the day of `date`
    pub fn next_work_start(&self, date: NaiveDateTime) -> NaiveDateTime {
        self.same_or_next_work_start(start_of_day(date) + TimeDelta::days(1))
    }

    /// Last working day at or before `date`
    pub fn same_or_prev_work_end(&self, date: NaiveDateTime) -> NaiveDateTime {
        self.walk(date, false, DateExtremity::EndOfTask)
    }

    fn same_or_prev_work_start(&self, date: NaiveDateTime) -> NaiveDateTime {
        self.walk(date, false, DateExtremity::StartOfTask)
    }

    fn same_or_next_work_end(&self, date: NaiveDateTime) -> NaiveDateTime {
        self.walk(date, true, DateExtremity::EndOfTask)
    }

    /// Working days from the day of `start` to the day of `end`, inclusive
    ///
    /// Never less than one.
    pub fn work_days_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> usize {
        let last = start_of_day(end);
        let mut day = start_of_day(start);
        let mut count = 0;

        for _ in 0..MAX_WORKDAY_SCAN {
            if day > last {
                break;
            }
            if !self.is_holiday(day, DateExtremity::StartOfTask) {
                count += 1;
            }
            day += TimeDelta::days(1);
        }

        count.max(1)
    }

    /// Day on which a task starting on `start` ends after `work_days`
    pub fn end_by_duration(&self, start: NaiveDateTime, work_days: usize) -> NaiveDateTime {
        self.count_days(start, work_days, true)
    }

    /// Day on which a task ending on `end` starts, `work_days` long
    pub fn start_by_duration(&self, end: NaiveDateTime, work_days: usize) -> NaiveDateTime {
        self.count_days(end, work_days, false)
    }

    fn count_days(&self, from: NaiveDateTime, work_days: usize, forward: bool) -> NaiveDateTime {
        let step = if forward {
            TimeDelta::days(1)
        } else {
            TimeDelta::days(-1)
        };
        let extremity = if forward {
            DateExtremity::EndOfTask
        } else {
            DateExtremity::StartOfTask
        };

        let mut day = start_of_day(from);
        let mut remaining = work_days.saturating_sub(1);

        for _ in 0..MAX_WORKDAY_SCAN {
            if remaining == 0 {
                return day;
            }
            day += step;
            if !self.is_holiday(day, extremity) {
                remaining -= 1;
            }
        }

        warn!(from = %from, work_days, "working-day count exceeded the scan limit");
        day
    }

    /// Dates of `dependent` once placed against `source` through `dependency`
    ///
    /// The inclusive working-day count of the dependent is preserved.
    pub fn enforce_dependency(
        &self,
        source: &Task,
        dependent: &Task,
        dependency: &Dependency,
    ) -> (NaiveDateTime, NaiveDateTime) {
        let work_days = self.work_days_between(dependent.start, dependent.end);

        let anchor_start = |day: NaiveDateTime| {
            let start = day_of(day, dependent.start);
            let end = day_of(self.end_by_duration(day, work_days), dependent.end);
            (start, end.max(start))
        };
        let anchor_end = |day: NaiveDateTime| {
            let end = day_of(day, dependent.end);
            let start = day_of(self.start_by_duration(day, work_days), dependent.start);
            (start.min(end), end)
        };

        match (dependency.source_target, dependency.own_target) {
            (DateExtremity::EndOfTask, DateExtremity::StartOfTask) => {
                anchor_start(self.next_work_start(source.end))
            }
            (DateExtremity::StartOfTask, DateExtremity::StartOfTask) => {
                anchor_start(self.same_or_next_work_start(source.start))
            }
            (DateExtremity::EndOfTask, DateExtremity::EndOfTask) => {
                anchor_end(self.same_or_prev_work_end(source.end))
            }
            (DateExtremity::StartOfTask, DateExtremity::EndOfTask) => {
                anchor_end(self.same_or_prev_work_end(source.start))
            }
        }
    }

    /// Round a dragged task and move it off holidays
    ///
    /// `changed` carries the dragged dates, `original` the task before the
    /// gesture. Applying the adjustment to its own output changes nothing.
    pub fn adjust_task_to_working_dates(
        &self,
        action: BarMoveAction,
        changed: &Task,
        original: &Task,
    ) -> Task {
        match action {
            BarMoveAction::Progress => changed.clone(),

            BarMoveAction::Move => {
                let start = self.round(changed.start, DateExtremity::StartOfTask, action);
                let end = changed.end + (start - changed.start);

                if !self.is_holiday(start, DateExtremity::StartOfTask)
                    && !self.is_holiday(end, DateExtremity::EndOfTask)
                {
                    return changed.with_dates(start, end);
                }

                let work_days = self.work_days_between(original.start, original.end);
                let start_day = self.same_or_next_work_start(start);
                let new_start = day_of(start_day, start);
                let new_end = day_of(self.end_by_duration(start_day, work_days), end);
                changed.with_dates(new_start, new_end.max(new_start))
            }

            BarMoveAction::Start => {
                let mut start = self.round(changed.start, DateExtremity::StartOfTask, action);
                if self.is_holiday(start, DateExtremity::StartOfTask) {
                    start = day_of(self.same_or_prev_work_start(start), start);
                }
                changed.with_dates(start.min(changed.end), changed.end)
            }

            BarMoveAction::End => {
                let mut end = self.round(changed.end, DateExtremity::EndOfTask, action);
                if self.is_holiday(end, DateExtremity::EndOfTask) {
                    end = day_of(self.same_or_next_work_end(end), end);
                }
                changed.with_dates(changed.start, end.max(changed.start))
            }
        }
    }
}
