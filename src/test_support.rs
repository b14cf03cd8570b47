//! Shared fixtures for unit tests

use chrono::{NaiveDate, NaiveDateTime};

use crate::cascade::{handle_date_change, DateChangeOutcome};
use crate::change_metadata::{get_change_metadata, ChangeAction, ChangeContext, ChangeMetadata};
use crate::config::GanttConfig;
use crate::coordinates::CoordinateMap;
use crate::dependencies::{build_dependency_graph, GraphOptions};
use crate::error::Result;
use crate::hierarchy::{build_hierarchy, TaskLookup};
use crate::types::{BarMoveAction, Task, ViewMode};
use crate::working_dates::{DateSetup, DefaultRounding, NoHolidays, WorkingCalendar};

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid test date")
}

pub fn day(year: i32, month: u32, d: u32) -> NaiveDateTime {
    at(year, month, d, 0, 0)
}

pub fn setup() -> DateSetup {
    DateSetup {
        view_mode: ViewMode::Day,
        reference_date: day(2024, 1, 1),
        pre_steps_count: 1,
    }
}

/// Task list plus config, with every calendar day worked
pub struct Fixture {
    pub tasks: Vec<Task>,
    pub config: GanttConfig,
}

impl Fixture {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            config: GanttConfig::default(),
        }
    }

    pub fn with_context<R>(&self, f: impl FnOnce(&ChangeContext<'_>) -> R) -> R {
        let lookup = TaskLookup::new(&self.tasks);
        let hierarchy = build_hierarchy(&self.tasks);
        let coordinates = CoordinateMap::new();
        let graph = build_dependency_graph(
            &self.tasks,
            &lookup,
            &coordinates,
            GraphOptions {
                full_row_height: self.config.full_row_height(),
                rtl: self.config.rtl,
                compute_margins: false,
            },
        );
        let rounding = DefaultRounding(self.config.date_move_step);
        let calendar = WorkingCalendar::new(&NoHolidays, &rounding, setup());

        let ctx = ChangeContext {
            tasks: &self.tasks,
            lookup: &lookup,
            hierarchy: &hierarchy,
            graph: &graph,
            calendar: &calendar,
            config: &self.config,
        };
        f(&ctx)
    }

    pub fn metadata(&self, action: &ChangeAction) -> Result<ChangeMetadata> {
        self.with_context(|ctx| get_change_metadata(action, ctx))
    }

    pub fn date_change(
        &self,
        action: BarMoveAction,
        changed: &Task,
        original: &Task,
    ) -> Result<DateChangeOutcome> {
        self.with_context(|ctx| handle_date_change(ctx, action, changed, original))
    }
}
