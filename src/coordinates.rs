//! Coordinate mapping
//!
//! Converts task dates and row positions into pixel geometry. x is measured
//! in columns of the current view mode (calendar-boundary aware), y in
//! stacked comparison-level rows.

use std::collections::HashMap;

use chrono::{NaiveDateTime, TimeDelta};

use crate::config::GanttConfig;
use crate::date_utils::{date_by_offset, fractional_offset, DateRange};
use crate::types::{LevelMap, Task, TaskCoordinates, TaskType, ViewMode};
use crate::visibility::{RowIndex, VisibleTasks};

pub type CoordinateMap<'a> = LevelMap<HashMap<&'a str, TaskCoordinates>>;

/// Inputs of the coordinate computation that do not depend on the task
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateParams {
    pub start_date: NaiveDateTime,
    pub view_mode: ViewMode,
    pub rtl: bool,
    pub column_width: f64,
    pub row_height: f64,
    pub full_row_height: f64,
    pub task_height: f64,
    pub task_y_offset: f64,
    /// Width of the whole timeline, the mirror axis under RTL
    pub total_width: f64,
}

impl CoordinateParams {
    pub fn new(config: &GanttConfig, range: &DateRange) -> Self {
        Self {
            start_date: range.start_date,
            view_mode: config.view_mode,
            rtl: config.rtl,
            column_width: config.distances.column_width,
            row_height: config.distances.row_height,
            full_row_height: config.full_row_height(),
            task_height: config.task_height(),
            task_y_offset: config.task_y_offset(),
            total_width: range.svg_width(config.distances.column_width),
        }
    }

    pub fn x_from_date(&self, date: NaiveDateTime) -> f64 {
        let x = fractional_offset(self.start_date, date, self.view_mode) * self.column_width;
        if self.rtl {
            self.total_width - x
        } else {
            x
        }
    }

    /// Inverse of [`CoordinateParams::x_from_date`]
    pub fn date_from_x(&self, x: f64) -> NaiveDateTime {
        let x = if self.rtl { self.total_width - x } else { x };
        if self.column_width <= 0.0 {
            return self.start_date;
        }

        let units = x / self.column_width;
        let index = units.floor();
        let cell_start = date_by_offset(self.start_date, index as i64, self.view_mode);
        let cell_end = date_by_offset(self.start_date, index as i64 + 1, self.view_mode);
        let cell_ms = (cell_end - cell_start).num_milliseconds() as f64;

        cell_start + TimeDelta::milliseconds(((units - index) * cell_ms).round() as i64)
    }

    /// Top of a row at the given comparison level
    pub fn level_y(&self, row: usize, level: u32) -> f64 {
        row as f64 * self.full_row_height + self.row_height * f64::from(level.saturating_sub(1))
    }
}

/// Geometry of one task in the given row
pub fn count_task_coordinates(task: &Task, row: usize, params: &CoordinateParams) -> TaskCoordinates {
    let level_y = params.level_y(row, task.comparison_level);
    let y1 = level_y + params.task_y_offset;
    let y2 = y1 + params.task_height;

    let (x1, x2) = if task.task_type == TaskType::Milestone {
        let center = params.x_from_date(task.start);
        let half = params.task_height / 2.0;
        (center - half, center + half)
    } else {
        let from = params.x_from_date(task.start);
        let to = params.x_from_date(task.end);
        (from.min(to), from.max(to))
    };

    let width = x2 - x1;
    let progress_width = width * task.progress.clamp(0.0, 100.0) / 100.0;
    let progress_x = if params.rtl { x2 - progress_width } else { x1 };

    TaskCoordinates {
        x1,
        x2,
        y1,
        y2,
        level_y,
        width,
        progress_width,
        progress_x,
    }
}

/// Coordinates of every visible, dated task that has a row
pub fn map_coordinates<'a>(
    visible: &VisibleTasks<'a>,
    rows: &RowIndex<'a>,
    params: &CoordinateParams,
) -> CoordinateMap<'a> {
    let mut map = CoordinateMap::new();

    for &task in visible.tasks.iter().filter(|t| !t.is_empty()) {
        let Some(row) = rows.row_of(task) else {
            continue;
        };
        map.entry(task.comparison_level)
            .or_default()
            .insert(task.id.as_str(), count_task_coordinates(task, row, params));
    }

    map
}

/// Coordinates of a task, or the all-zero sentinel when it is not mapped
pub fn get_task_coordinates(map: &CoordinateMap<'_>, task: &Task) -> TaskCoordinates {
    get_coordinates_by_id(map, task.comparison_level, &task.id)
}

pub fn get_coordinates_by_id(map: &CoordinateMap<'_>, level: u32, id: &str) -> TaskCoordinates {
    map.get(&level)
        .and_then(|level_map| level_map.get(id))
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build_hierarchy;
    use crate::test_support::{at, day};
    use crate::visibility::{collect_visible, row_indexes};

    fn params(rtl: bool) -> CoordinateParams {
        CoordinateParams {
            start_date: day(2024, 1, 1),
            view_mode: ViewMode::Day,
            rtl,
            column_width: 60.0,
            row_height: 50.0,
            full_row_height: 100.0,
            task_height: 30.0,
            task_y_offset: 10.0,
            total_width: 1800.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn ltr_bar_geometry() {
        let task = Task::new("a", day(2024, 1, 3), at(2024, 1, 5, 12, 0)).with_progress(50.0);
        let c = count_task_coordinates(&task, 2, &params(false));

        assert!(close(c.x1, 120.0));
        assert!(close(c.x2, 270.0));
        assert!(close(c.width, 150.0));
        assert!(close(c.progress_width, 75.0));
        assert!(close(c.progress_x, 120.0));
        assert!(close(c.level_y, 200.0));
        assert!(close(c.y1, 210.0));
        assert!(close(c.y2, 240.0));
    }

    #[test]
    fn rtl_mirrors_x() {
        let task = Task::new("a", day(2024, 1, 3), day(2024, 1, 5)).with_progress(25.0);
        let c = count_task_coordinates(&task, 0, &params(true));

        assert!(close(c.x1, 1800.0 - 240.0));
        assert!(close(c.x2, 1800.0 - 120.0));
        assert!(close(c.progress_width, 30.0));
        assert!(close(c.progress_x, c.x2 - 30.0));
    }

    #[test]
    fn second_level_sits_below_first() {
        let task = Task::new("a", day(2024, 1, 3), day(2024, 1, 5)).with_level(2);
        let c = count_task_coordinates(&task, 1, &params(false));
        assert!(close(c.level_y, 150.0));
    }

    #[test]
    fn milestone_is_square_on_start() {
        let task = Task::new("m", day(2024, 1, 2), day(2024, 1, 2)).with_type(TaskType::Milestone);
        let c = count_task_coordinates(&task, 0, &params(false));
        assert!(close(c.x1, 45.0));
        assert!(close(c.x2, 75.0));
        assert!(close(c.width, 30.0));
    }

    #[test]
    fn x_and_date_are_inverse() {
        for rtl in [false, true] {
            let params = params(rtl);
            let date = at(2024, 1, 7, 18, 0);
            assert_eq!(params.date_from_x(params.x_from_date(date)), date);
        }
    }

    #[test]
    fn unknown_task_gets_sentinel() {
        let tasks = vec![
            Task::new("a", day(2024, 1, 2), day(2024, 1, 4)),
            Task::empty("gap"),
        ];
        let hierarchy = build_hierarchy(&tasks);
        let visible = collect_visible(&hierarchy).unwrap();
        let rows = row_indexes(&visible, 1);
        let map = map_coordinates(&visible, &rows, &params(false));

        assert!(close(get_task_coordinates(&map, &tasks[0]).x1, 60.0));
        assert_eq!(get_task_coordinates(&map, &tasks[1]), TaskCoordinates::default());
        let deleted = Task::new("deleted", day(2024, 1, 2), day(2024, 1, 4));
        assert_eq!(get_task_coordinates(&map, &deleted), TaskCoordinates::default());
    }
}
