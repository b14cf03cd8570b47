//! Dependency graph
//!
//! Dependencies are embedded in the dependent task and resolve their source
//! by id at the same comparison level. This module builds the forward arrow
//! map used for rendering, the reverse dependents map used by the cascade
//! and the critical path, and the signed margins of every edge.

use std::collections::HashMap;

use serde::Serialize;

use crate::coordinates::CoordinateMap;
use crate::hierarchy::TaskLookup;
use crate::types::{DateExtremity, Dependency, LevelMap, Task, TaskCoordinates};

/// Signed slack of a dependency in milliseconds
///
/// The distance from the source endpoint to the dependent endpoint the link
/// connects: FS is `dependent.start - source.end`, SS
/// `dependent.start - source.start`, FF `dependent.end - source.end` and SF
/// `dependent.end - source.start`. Negative means violated.
pub fn dependency_margin(source: &Task, dependent: &Task, dependency: &Dependency) -> i64 {
    (dependent.date_of(dependency.own_target) - source.date_of(dependency.source_target))
        .num_milliseconds()
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Anchor of an arrow on a bar
///
/// The start of a bar is its left edge in LTR and its right edge in RTL.
pub fn anchor_point(coordinates: &TaskCoordinates, extremity: DateExtremity, rtl: bool) -> Point {
    let at_left = matches!(
        (extremity, rtl),
        (DateExtremity::StartOfTask, false) | (DateExtremity::EndOfTask, true)
    );
    Point {
        x: if at_left { coordinates.x1 } else { coordinates.x2 },
        y: (coordinates.y1 + coordinates.y2) / 2.0,
    }
}

/// A resolved, renderable dependency of a visible task
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyArrow<'a> {
    pub source: &'a Task,
    pub dependency: &'a Dependency,
    pub from: Point,
    pub to: Point,
    /// Top of the box spanning both rows
    pub container_y: f64,
    pub container_height: f64,
    /// Present when margins are computed
    pub margin: Option<i64>,
}

/// Reverse edge: `task` depends on the keyed source through `dependency`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DependentEdge<'a> {
    pub task: &'a Task,
    pub dependency: &'a Dependency,
}

pub type MarginMap<'a> = LevelMap<HashMap<&'a str, HashMap<&'a str, i64>>>;

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph<'a> {
    /// dependent id → arrows to its sources
    pub dependencies: LevelMap<HashMap<&'a str, Vec<DependencyArrow<'a>>>>,
    /// source id → tasks depending on it
    pub dependents: LevelMap<HashMap<&'a str, Vec<DependentEdge<'a>>>>,
    /// dependent id → source id → margin
    pub margins: MarginMap<'a>,
}

/// Inputs that only affect arrow geometry and margin computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphOptions {
    pub full_row_height: f64,
    pub rtl: bool,
    pub compute_margins: bool,
}

/// Resolve every dependency of the task list
///
/// Self references, edges touching empty rows and edges to missing sources
/// are ignored. Dependents cover all tasks; arrows only the tasks that have
/// coordinates.
pub fn build_dependency_graph<'a>(
    tasks: &'a [Task],
    lookup: &TaskLookup<'a>,
    coordinates: &CoordinateMap<'a>,
    options: GraphOptions,
) -> DependencyGraph<'a> {
    let mut graph = DependencyGraph::default();

    for task in tasks.iter().filter(|t| !t.is_empty()) {
        let level = task.comparison_level;

        for dependency in &task.dependencies {
            if dependency.source_id == task.id {
                continue;
            }
            let Some(source) = lookup
                .get(level, &dependency.source_id)
                .filter(|s| !s.is_empty())
            else {
                continue;
            };

            graph
                .dependents
                .entry(level)
                .or_default()
                .entry(source.id.as_str())
                .or_default()
                .push(DependentEdge { task, dependency });

            let margin = options
                .compute_margins
                .then(|| dependency_margin(source, task, dependency));
            if let Some(margin) = margin {
                graph
                    .margins
                    .entry(level)
                    .or_default()
                    .entry(task.id.as_str())
                    .or_default()
                    .entry(source.id.as_str())
                    .and_modify(|kept| *kept = (*kept).min(margin))
                    .or_insert(margin);
            }

            let level_coordinates = coordinates.get(&level);
            let (Some(own), Some(from)) = (
                level_coordinates.and_then(|m| m.get(task.id.as_str())),
                level_coordinates.and_then(|m| m.get(source.id.as_str())),
            ) else {
                continue;
            };

            let top = own.level_y.min(from.level_y);
            let bottom = own.level_y.max(from.level_y) + options.full_row_height;

            graph
                .dependencies
                .entry(level)
                .or_default()
                .entry(task.id.as_str())
                .or_default()
                .push(DependencyArrow {
                    source,
                    dependency,
                    from: anchor_point(from, dependency.source_target, options.rtl),
                    to: anchor_point(own, dependency.own_target, options.rtl),
                    container_y: top,
                    container_height: bottom - top,
                    margin,
                });
        }
    }

    graph
}

impl<'a> DependencyGraph<'a> {
    pub fn dependents_of(&self, task: &Task) -> &[DependentEdge<'a>] {
        self.dependents
            .get(&task.comparison_level)
            .and_then(|map| map.get(task.id.as_str()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn arrows_of(&self, task: &Task) -> &[DependencyArrow<'a>] {
        self.dependencies
            .get(&task.comparison_level)
            .and_then(|map| map.get(task.id.as_str()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn margin(&self, level: u32, dependent: &str, source: &str) -> Option<i64> {
        self.margins
            .get(&level)
            .and_then(|map| map.get(dependent))
            .and_then(|sources| sources.get(source))
            .copied()
    }

    /// Violated edges: dependent → source → negative margin
    pub fn warnings(&self) -> MarginMap<'a> {
        let mut warnings = MarginMap::new();

        for (level, dependents) in &self.margins {
            for (dependent, sources) in dependents {
                let violated: HashMap<&'a str, i64> = sources
                    .iter()
                    .filter(|(_, margin)| **margin < 0)
                    .map(|(source, margin)| (*source, *margin))
                    .collect();
                if !violated.is_empty() {
                    warnings
                        .entry(*level)
                        .or_default()
                        .insert(*dependent, violated);
                }
            }
        }

        warnings
    }
}
