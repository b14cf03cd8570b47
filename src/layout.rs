//! Snapshot layout
//!
//! Everything derived from one committed task list: hierarchy, visibility,
//! row and nested indexes, date range, coordinates, dependency graph and
//! the optional overlays. Rebuilt from scratch after every commit.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::change_metadata::ChangeContext;
use crate::config::GanttConfig;
use crate::coordinates::{get_task_coordinates, map_coordinates, CoordinateMap, CoordinateParams};
use crate::critical_path::{compute_critical_path, CriticalPath};
use crate::date_utils::{gantt_date_range, serde_date, DateRange};
use crate::dependencies::{build_dependency_graph, DependencyGraph, GraphOptions, MarginMap, Point};
use crate::error::Result;
use crate::hierarchy::{
    build_hierarchy, child_out_of_parent_warnings, nested_indexes, Hierarchy, NestedPosition,
    OutOfParent, TaskLookup,
};
use crate::types::{DateExtremity, LevelMap, Task, TaskCoordinates, TaskType};
use crate::visibility::{collect_visible, row_indexes, RowIndex, VisibleTasks};
use crate::working_dates::{DateSetup, WorkingCalendar};

pub struct GanttLayout<'a> {
    pub tasks: &'a [Task],
    pub config: &'a GanttConfig,
    pub lookup: TaskLookup<'a>,
    pub hierarchy: Hierarchy<'a>,
    pub visible: VisibleTasks<'a>,
    pub rows: RowIndex<'a>,
    pub nested: LevelMap<HashMap<String, NestedPosition>>,
    pub range: DateRange,
    pub params: CoordinateParams,
    pub coordinates: CoordinateMap<'a>,
    pub graph: DependencyGraph<'a>,
    /// Empty unless `is_show_critical_path`
    pub critical_path: CriticalPath<'a>,
    /// Empty unless `is_show_dependency_warnings`
    pub dependency_warnings: MarginMap<'a>,
    /// Empty unless `is_show_child_out_of_parent_warnings`
    pub child_warnings: LevelMap<HashMap<String, OutOfParent>>,
}

impl<'a> GanttLayout<'a> {
    pub fn new(tasks: &'a [Task], config: &'a GanttConfig) -> Result<Self> {
        let lookup = TaskLookup::new(tasks);
        let hierarchy = build_hierarchy(tasks);
        let visible = collect_visible(&hierarchy)?;
        let rows = row_indexes(&visible, config.comparison_levels);
        let nested = nested_indexes(&hierarchy)?;

        let range = gantt_date_range(
            visible.tasks.iter().copied(),
            config.view_mode,
            config.pre_steps_count,
        );
        let params = CoordinateParams::new(config, &range);
        let coordinates = map_coordinates(&visible, &rows, &params);

        let graph = build_dependency_graph(
            tasks,
            &lookup,
            &coordinates,
            GraphOptions {
                full_row_height: config.full_row_height(),
                rtl: config.rtl,
                compute_margins: config.needs_margins(),
            },
        );

        let critical_path = if config.is_show_critical_path {
            compute_critical_path(&hierarchy, &lookup, &graph)?
        } else {
            CriticalPath::default()
        };
        let dependency_warnings = if config.is_show_dependency_warnings {
            graph.warnings()
        } else {
            MarginMap::new()
        };
        let child_warnings = if config.is_show_child_out_of_parent_warnings {
            child_out_of_parent_warnings(tasks, &lookup)
        } else {
            LevelMap::new()
        };

        debug!(
            tasks = tasks.len(),
            visible = visible.len(),
            critical = critical_path.len(),
            "layout derived"
        );

        Ok(Self {
            tasks,
            config,
            lookup,
            hierarchy,
            visible,
            rows,
            nested,
            range,
            params,
            coordinates,
            graph,
            critical_path,
            dependency_warnings,
            child_warnings,
        })
    }

    pub fn date_setup(&self) -> DateSetup {
        DateSetup {
            view_mode: self.config.view_mode,
            reference_date: self.range.start_date,
            pre_steps_count: self.config.pre_steps_count,
        }
    }

    /// Change context over this snapshot
    pub fn context<'s>(&'s self, calendar: &'s WorkingCalendar<'s>) -> ChangeContext<'s> {
        ChangeContext {
            tasks: self.tasks,
            lookup: &self.lookup,
            hierarchy: &self.hierarchy,
            graph: &self.graph,
            calendar,
            config: self.config,
        }
    }

    pub fn coordinates_of(&self, task: &Task) -> TaskCoordinates {
        get_task_coordinates(&self.coordinates, task)
    }

    pub fn svg_width(&self) -> f64 {
        self.range.svg_width(self.config.distances.column_width)
    }

    pub fn full_height(&self) -> f64 {
        self.rows.max_level_length as f64 * self.config.full_row_height()
    }

    /// Task drawn at a global row
    pub fn task_at_global_row(&self, global_row: usize) -> Option<&'a Task> {
        self.rows.global_row_to_task.get(&global_row).copied()
    }

    /// Owned snapshot of everything a renderer draws
    pub fn render_frame(&self) -> RenderFrame {
        let rows = self
            .visible
            .tasks
            .iter()
            .filter_map(|&task| {
                let row = self.rows.row_of(task)?;
                let level = task.comparison_level;
                let nested = self.nested.get(&level).and_then(|m| m.get(&task.id));

                Some(RenderRow {
                    id: task.id.clone(),
                    name: task.name.clone(),
                    comparison_level: level,
                    task_type: task.task_type,
                    row,
                    depth: nested.map_or(0, |n| n.depth),
                    number: nested.map(|n| n.path.clone()).unwrap_or_default(),
                    coordinates: self.coordinates_of(task),
                    has_children: self.hierarchy.has_children(task),
                    hide_children: task.hide_children,
                    is_disabled: task.is_disabled,
                    is_critical: self.critical_path.is_critical(task),
                    has_dependency_warning: self
                        .dependency_warnings
                        .get(&level)
                        .is_some_and(|m| m.contains_key(task.id.as_str())),
                    out_of_parent: self
                        .child_warnings
                        .get(&level)
                        .and_then(|m| m.get(&task.id))
                        .copied(),
                })
            })
            .collect();

        let mut arrows = Vec::new();
        for task in &self.visible.tasks {
            let level = task.comparison_level;
            for arrow in self.graph.arrows_of(task) {
                let source_id = arrow.source.id.as_str();
                arrows.push(RenderArrow {
                    comparison_level: level,
                    source_id: source_id.to_string(),
                    dependent_id: task.id.clone(),
                    source_target: arrow.dependency.source_target,
                    own_target: arrow.dependency.own_target,
                    from: arrow.from,
                    to: arrow.to,
                    container_y: arrow.container_y,
                    container_height: arrow.container_height,
                    is_critical: self
                        .critical_path
                        .is_critical_dependency(level, &task.id, source_id),
                    is_warning: arrow.margin.is_some_and(|m| m < 0)
                        && self.config.is_show_dependency_warnings,
                });
            }
        }

        RenderFrame {
            start_date: self.range.start_date,
            dates_length: self.range.dates_length,
            svg_width: self.svg_width(),
            full_height: self.full_height(),
            rows,
            arrows,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderRow {
    pub id: String,
    pub name: String,
    pub comparison_level: u32,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub row: usize,
    pub depth: usize,
    /// Outline number such as `1.2`
    pub number: String,
    pub coordinates: TaskCoordinates,
    pub has_children: bool,
    pub hide_children: bool,
    pub is_disabled: bool,
    pub is_critical: bool,
    pub has_dependency_warning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_of_parent: Option<OutOfParent>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderArrow {
    pub comparison_level: u32,
    pub source_id: String,
    pub dependent_id: String,
    pub source_target: DateExtremity,
    pub own_target: DateExtremity,
    pub from: Point,
    pub to: Point,
    pub container_y: f64,
    pub container_height: f64,
    pub is_critical: bool,
    pub is_warning: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    #[serde(with = "serde_date")]
    pub start_date: NaiveDateTime,
    pub dates_length: usize,
    pub svg_width: f64,
    pub full_height: f64,
    pub rows: Vec<RenderRow>,
    pub arrows: Vec<RenderArrow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::day;
    use crate::types::Dependency;

    fn tasks() -> Vec<Task> {
        vec![
            Task::new("p", day(2024, 1, 1), day(2024, 1, 5)).with_type(TaskType::Project),
            Task::new("a", day(2024, 1, 1), day(2024, 1, 3)).with_parent("p"),
            Task::new("b", day(2024, 1, 3), day(2024, 1, 6))
                .with_parent("p")
                .with_dependency(Dependency::finish_to_start("a")),
            Task::new("c", day(2024, 1, 2), day(2024, 1, 4))
                .with_dependency(Dependency::finish_to_start("b")),
        ]
    }

    #[test]
    fn derives_every_map() {
        let tasks = tasks();
        let config = GanttConfig {
            is_show_critical_path: true,
            is_show_dependency_warnings: true,
            is_show_child_out_of_parent_warnings: true,
            ..GanttConfig::default()
        };
        let layout = GanttLayout::new(&tasks, &config).unwrap();

        assert_eq!(layout.visible.len(), 4);
        assert_eq!(layout.range.start_date, day(2023, 12, 31));
        assert_eq!(layout.coordinates_of(&tasks[1]).x1, 60.0);
        assert_eq!(layout.full_height(), 200.0);
        assert_eq!(layout.task_at_global_row(2).map(|t| t.id.as_str()), Some("b"));

        // a -> b is tight, b -> c violated
        assert!(layout.critical_path.is_critical(&tasks[0]));
        assert!(layout.critical_path.is_critical(&tasks[3]));
        assert!(layout.dependency_warnings[&1].contains_key("c"));
        assert!(layout.child_warnings[&1]["b"].end);
    }

    #[test]
    fn overlays_are_off_by_default() {
        let tasks = tasks();
        let config = GanttConfig::default();
        let layout = GanttLayout::new(&tasks, &config).unwrap();

        assert!(layout.critical_path.is_empty());
        assert!(layout.graph.margins.is_empty());
        assert!(layout.child_warnings.is_empty());
        assert_eq!(layout.graph.arrows_of(&tasks[3]).len(), 1);
    }

    #[test]
    fn render_frame_lists_rows_and_arrows() {
        let mut tasks = tasks();
        tasks[0].hide_children = true;
        let config = GanttConfig {
            is_show_dependency_warnings: true,
            ..GanttConfig::default()
        };
        let layout = GanttLayout::new(&tasks, &config).unwrap();
        let frame = layout.render_frame();

        let ids: Vec<&str> = frame.rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["p", "c"]);
        assert_eq!(frame.rows[1].row, 1);
        assert_eq!(frame.rows[1].number, "2");
        assert!(frame.rows[0].has_children);
        // b is collapsed away, so is its arrow to c
        assert!(frame.arrows.is_empty());

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["rows"][0]["type"], "project");
        assert_eq!(json["startDate"], "2023-12-31T00:00:00");
    }
}
