//! Visible task collection and row numbering
//!
//! Walks the hierarchy depth-first respecting collapse state. The walk output
//! is the render order; row indexes number it per comparison level.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{GanttError, Result};
use crate::hierarchy::Hierarchy;
use crate::types::{LevelMap, Task};

/// Render order plus the id → position mirror
#[derive(Debug, Default, Clone)]
pub struct VisibleTasks<'a> {
    pub tasks: Vec<&'a Task>,
    pub mirror: LevelMap<HashMap<&'a str, usize>>,
}

impl<'a> VisibleTasks<'a> {
    pub fn is_visible(&self, task: &Task) -> bool {
        self.position(task.comparison_level, &task.id).is_some()
    }

    pub fn position(&self, level: u32, id: &str) -> Option<usize> {
        self.mirror.get(&level).and_then(|map| map.get(id)).copied()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Pre-order walk from each level's roots, ascending levels
///
/// A task with `hide_children` is listed but its subtree is not.
pub fn collect_visible<'a>(hierarchy: &Hierarchy<'a>) -> Result<VisibleTasks<'a>> {
    let mut visible = VisibleTasks::default();

    for level in hierarchy.levels() {
        let mut visited: HashSet<&'a str> = HashSet::new();
        let mut stack: Vec<&'a Task> = hierarchy.roots_at(level).iter().rev().copied().collect();

        while let Some(task) = stack.pop() {
            if !visited.insert(task.id.as_str()) {
                return Err(GanttError::cycle(level, &task.id));
            }

            visible
                .mirror
                .entry(level)
                .or_default()
                .insert(task.id.as_str(), visible.tasks.len());
            visible.tasks.push(task);

            if !task.hide_children {
                stack.extend(hierarchy.children_of(task).iter().rev().copied());
            }
        }
    }

    Ok(visible)
}

/// Row numbering of the visible tasks
///
/// Each comparison level is numbered independently; one visible row stacks
/// `comparison_levels` bars, so the global row of `(level, row)` is
/// `row * comparison_levels + level - 1`.
#[derive(Debug, Default, Clone)]
pub struct RowIndex<'a> {
    pub task_to_row: LevelMap<HashMap<&'a str, usize>>,
    pub row_to_task: LevelMap<Vec<&'a Task>>,
    pub global_row_to_task: BTreeMap<usize, &'a Task>,
    /// Rows of the longest level
    pub max_level_length: usize,
}

impl<'a> RowIndex<'a> {
    pub fn row_of(&self, task: &Task) -> Option<usize> {
        self.task_to_row
            .get(&task.comparison_level)
            .and_then(|map| map.get(task.id.as_str()))
            .copied()
    }

    pub fn task_at(&self, level: u32, row: usize) -> Option<&'a Task> {
        self.row_to_task
            .get(&level)
            .and_then(|rows| rows.get(row))
            .copied()
    }
}

/// Number visible rows; levels above `comparison_levels` get no row
pub fn row_indexes<'a>(visible: &VisibleTasks<'a>, comparison_levels: u32) -> RowIndex<'a> {
    let comparison_levels = comparison_levels.max(1);
    let mut index = RowIndex::default();

    for &task in &visible.tasks {
        let level = task.comparison_level;
        if level == 0 || level > comparison_levels {
            continue;
        }

        let rows = index.row_to_task.entry(level).or_default();
        let row = rows.len();
        rows.push(task);

        index
            .task_to_row
            .entry(level)
            .or_default()
            .insert(task.id.as_str(), row);

        let global_row = row * comparison_levels as usize + (level - 1) as usize;
        index.global_row_to_task.insert(global_row, task);
    }

    index.max_level_length = index.row_to_task.values().map(Vec::len).max().unwrap_or(0);
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build_hierarchy;
    use crate::test_support::day;
    use pretty_assertions::assert_eq;

    fn names(tasks: &[&Task]) -> Vec<String> {
        tasks
            .iter()
            .map(|t| format!("{}@{}", t.id, t.comparison_level))
            .collect()
    }

    fn tasks() -> Vec<Task> {
        let d = day(2024, 1, 1);
        vec![
            Task::new("p", d, d),
            Task::new("a", d, d).with_parent("p"),
            Task::new("a1", d, d).with_parent("a"),
            Task::new("b", d, d).with_parent("p"),
            Task::new("q", d, d),
            Task::new("p", d, d).with_level(2),
            Task::new("q", d, d).with_level(2),
            Task::new("r", d, d).with_level(3),
        ]
    }

    #[test]
    fn pre_order_per_level() {
        let tasks = tasks();
        let hierarchy = build_hierarchy(&tasks);
        let visible = collect_visible(&hierarchy).unwrap();

        assert_eq!(
            names(&visible.tasks),
            vec!["p@1", "a@1", "a1@1", "b@1", "q@1", "p@2", "q@2", "r@3"]
        );
        assert_eq!(visible.position(1, "b"), Some(3));
        assert_eq!(visible.position(2, "q"), Some(6));
    }

    #[test]
    fn collapsed_parent_hides_subtree_only() {
        let mut tasks = tasks();
        tasks[1].hide_children = true;
        let hierarchy = build_hierarchy(&tasks);
        let visible = collect_visible(&hierarchy).unwrap();

        assert!(visible.is_visible(&tasks[1]));
        assert!(!visible.is_visible(&tasks[2]));
        assert!(visible.is_visible(&tasks[3]));
    }

    #[test]
    fn rows_per_level_and_global_rows() {
        let tasks = tasks();
        let hierarchy = build_hierarchy(&tasks);
        let visible = collect_visible(&hierarchy).unwrap();
        let rows = row_indexes(&visible, 2);

        assert_eq!(rows.row_of(&tasks[3]), Some(3));
        assert_eq!(rows.row_of(&tasks[6]), Some(1));
        assert_eq!(rows.row_of(&tasks[7]), None);
        assert_eq!(rows.task_at(2, 0).map(|t| t.id.as_str()), Some("p"));
        assert_eq!(rows.global_row_to_task[&3].comparison_level, 2);
        assert_eq!(rows.global_row_to_task[&8].id, "q");
        assert_eq!(rows.max_level_length, 5);
    }
}
