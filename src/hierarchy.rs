//! Task hierarchy indexing
//!
//! Tasks reference their parent by id only. Everything here is derived from
//! the flat task list: child/root adjacency per comparison level, the global
//! index lookup used to write suggestions back, and the nested numbering.
//! All maps borrow the task slice and are rebuilt on every committed change.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{GanttError, Result};
use crate::types::{LevelMap, Task};

/// Parent/child adjacency per comparison level
#[derive(Debug, Default, Clone)]
pub struct Hierarchy<'a> {
    children: LevelMap<HashMap<&'a str, Vec<&'a Task>>>,
    roots: LevelMap<Vec<&'a Task>>,
}

/// Build the hierarchy of a flat task list
///
/// A task whose parent does not exist at its level is treated as a root.
pub fn build_hierarchy<'a, I>(tasks: I) -> Hierarchy<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    build_hierarchy_with(tasks, |_| false)
}

/// Build the hierarchy, forcing tasks matching `is_root` to be roots
///
/// Used when inserting a subtree: the inserted top-level rows still point at
/// their old parents and must not be attached to them.
pub fn build_hierarchy_with<'a, I, F>(tasks: I, is_root: F) -> Hierarchy<'a>
where
    I: IntoIterator<Item = &'a Task>,
    F: Fn(&Task) -> bool,
{
    let tasks: Vec<&'a Task> = tasks.into_iter().collect();

    let mut ids: LevelMap<HashSet<&'a str>> = LevelMap::new();
    for task in &tasks {
        ids.entry(task.comparison_level)
            .or_default()
            .insert(task.id.as_str());
    }

    let mut hierarchy = Hierarchy::default();

    for task in tasks {
        let level = task.comparison_level;
        let parent = task
            .parent
            .as_deref()
            .filter(|parent| ids.get(&level).is_some_and(|set| set.contains(parent)));

        match parent {
            Some(parent) if !is_root(task) => {
                hierarchy
                    .children
                    .entry(level)
                    .or_default()
                    .entry(parent)
                    .or_default()
                    .push(task);
            }
            _ => {
                hierarchy.roots.entry(level).or_default().push(task);
            }
        }
    }

    hierarchy
}

impl<'a> Hierarchy<'a> {
    /// Comparison levels present, ascending
    pub fn levels(&self) -> impl Iterator<Item = u32> + '_ {
        let mut levels: Vec<u32> = self
            .roots
            .keys()
            .chain(self.children.keys())
            .copied()
            .collect();
        levels.sort_unstable();
        levels.dedup();
        levels.into_iter()
    }

    pub fn roots_at(&self, level: u32) -> &[&'a Task] {
        self.roots.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children_of_id(&self, level: u32, id: &str) -> &[&'a Task] {
        self.children
            .get(&level)
            .and_then(|map| map.get(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn children_of(&self, task: &Task) -> &[&'a Task] {
        self.children_of_id(task.comparison_level, &task.id)
    }

    pub fn has_children(&self, task: &Task) -> bool {
        !self.children_of(task).is_empty()
    }

    /// All descendants in pre-order
    pub fn descendants(&self, task: &Task) -> Result<Vec<&'a Task>> {
        let level = task.comparison_level;
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(task.id.as_str());

        let mut result = Vec::new();
        let mut stack: Vec<&'a Task> = self.children_of(task).iter().rev().copied().collect();

        while let Some(current) = stack.pop() {
            if !visited.insert(current.id.as_str()) {
                return Err(GanttError::cycle(level, &current.id));
            }
            result.push(current);
            stack.extend(self.children_of(current).iter().rev().copied());
        }

        Ok(result)
    }

    /// Earliest start and latest end over the non-empty descendants
    ///
    /// Empty rows are skipped together with their subtrees. `None` when the
    /// task has no dated descendants.
    pub fn child_boundaries(&self, task: &Task) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let level = task.comparison_level;
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(task.id.as_str());

        let mut bounds: Option<(NaiveDateTime, NaiveDateTime)> = None;
        let mut stack: Vec<&'a Task> = self.children_of(task).to_vec();

        while let Some(current) = stack.pop() {
            if !visited.insert(current.id.as_str()) {
                return Err(GanttError::cycle(level, &current.id));
            }
            if current.is_empty() {
                continue;
            }

            bounds = Some(match bounds {
                None => (current.start, current.end),
                Some((min, max)) => (min.min(current.start), max.max(current.end)),
            });
            stack.extend(self.children_of(current).iter().copied());
        }

        Ok(bounds)
    }
}

/// Level → id → (global index, task)
///
/// Global indexes are positions in the flat input list, the positions
/// suggestions are written back to.
#[derive(Debug, Default, Clone)]
pub struct TaskLookup<'a> {
    levels: LevelMap<HashMap<&'a str, (usize, &'a Task)>>,
}

impl<'a> TaskLookup<'a> {
    pub fn new(tasks: &'a [Task]) -> Self {
        let mut levels: LevelMap<HashMap<&'a str, (usize, &'a Task)>> = LevelMap::new();
        for (index, task) in tasks.iter().enumerate() {
            levels
                .entry(task.comparison_level)
                .or_default()
                .insert(task.id.as_str(), (index, task));
        }
        Self { levels }
    }

    pub fn get(&self, level: u32, id: &str) -> Option<&'a Task> {
        self.levels
            .get(&level)
            .and_then(|map| map.get(id))
            .map(|(_, task)| *task)
    }

    pub fn contains(&self, level: u32, id: &str) -> bool {
        self.get(level, id).is_some()
    }

    /// Global index of a task
    ///
    /// Missing levels and ids are caller bugs and reported as errors.
    pub fn index_of(&self, level: u32, id: &str) -> Result<usize> {
        let map = self
            .levels
            .get(&level)
            .ok_or(GanttError::LevelNotFound(level))?;
        map.get(id)
            .map(|(index, _)| *index)
            .ok_or_else(|| GanttError::index_not_found(level, id))
    }

    pub fn global_index(&self, task: &Task) -> Result<usize> {
        self.index_of(task.comparison_level, &task.id)
    }

    /// Snapshot version of a task
    pub fn resolve(&self, task: &Task) -> Option<&'a Task> {
        self.get(task.comparison_level, &task.id)
    }

    pub fn parent_of(&self, task: &Task) -> Option<&'a Task> {
        task.parent
            .as_deref()
            .and_then(|parent| self.get(task.comparison_level, parent))
    }

    /// Ancestors, nearest first
    pub fn ancestors(&self, task: &Task) -> Result<Vec<&'a Task>> {
        let level = task.comparison_level;
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(task.id.as_str());

        let mut result = Vec::new();
        let mut current = self.parent_of(task);

        while let Some(parent) = current {
            if !visited.insert(parent.id.as_str()) {
                return Err(GanttError::cycle(level, &parent.id));
            }
            result.push(parent);
            current = self.parent_of(parent);
        }

        Ok(result)
    }

    /// Whether `ancestor` is a strict ancestor of `task`
    pub fn is_descendant(&self, ancestor: &Task, task: &Task) -> Result<bool> {
        if ancestor.comparison_level != task.comparison_level {
            return Ok(false);
        }
        Ok(self
            .ancestors(task)?
            .iter()
            .any(|parent| parent.id == ancestor.id))
    }
}

/// Depth and outline number (`"1.2.3"`) of a task
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NestedPosition {
    pub depth: usize,
    pub path: String,
}

/// Outline numbering over the full hierarchy
///
/// Collapsed parents do not renumber their subtrees.
pub fn nested_indexes(hierarchy: &Hierarchy<'_>) -> Result<LevelMap<HashMap<String, NestedPosition>>> {
    let mut result = LevelMap::new();

    for level in hierarchy.levels() {
        let mut map: HashMap<String, NestedPosition> = HashMap::new();
        let mut stack: Vec<(&Task, usize, String)> = hierarchy
            .roots_at(level)
            .iter()
            .enumerate()
            .rev()
            .map(|(i, task)| (*task, 0, (i + 1).to_string()))
            .collect();

        while let Some((task, depth, path)) = stack.pop() {
            if map.contains_key(&task.id) {
                return Err(GanttError::cycle(level, &task.id));
            }
            for (i, child) in hierarchy.children_of(task).iter().enumerate().rev() {
                stack.push((*child, depth + 1, format!("{}.{}", path, i + 1)));
            }
            map.insert(task.id.clone(), NestedPosition { depth, path });
        }

        result.insert(level, map);
    }

    Ok(result)
}

/// Which side of a child sticks out of its parent
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutOfParent {
    pub start: bool,
    pub end: bool,
}

/// Children that start before or end after their parent
pub fn child_out_of_parent_warnings(
    tasks: &[Task],
    lookup: &TaskLookup<'_>,
) -> LevelMap<HashMap<String, OutOfParent>> {
    let mut result: LevelMap<HashMap<String, OutOfParent>> = LevelMap::new();

    for task in tasks.iter().filter(|t| !t.is_empty()) {
        let Some(parent) = lookup.parent_of(task).filter(|p| !p.is_empty()) else {
            continue;
        };

        let warning = OutOfParent {
            start: task.start < parent.start,
            end: task.end > parent.end,
        };
        if warning.start || warning.end {
            result
                .entry(task.comparison_level)
                .or_default()
                .insert(task.id.clone(), warning);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::day;
    use pretty_assertions::assert_eq;

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    fn tree() -> Vec<Task> {
        vec![
            Task::new("p", day(2024, 1, 1), day(2024, 1, 10)).disabled(),
            Task::new("a", day(2024, 1, 1), day(2024, 1, 3)).with_parent("p"),
            Task::new("b", day(2024, 1, 4), day(2024, 1, 12)).with_parent("p"),
            Task::new("a1", day(2023, 12, 30), day(2024, 1, 2)).with_parent("a"),
            Task::new("q", day(2024, 2, 1), day(2024, 2, 2)),
            Task::new("orphan", day(2024, 2, 1), day(2024, 2, 2)).with_parent("missing"),
            Task::new("p", day(2024, 1, 1), day(2024, 1, 2)).with_level(2),
        ]
    }

    #[test]
    fn groups_by_level_and_parent() {
        let tasks = tree();
        let hierarchy = build_hierarchy(&tasks);

        assert_eq!(ids(hierarchy.roots_at(1)), vec!["p", "q", "orphan"]);
        assert_eq!(ids(hierarchy.roots_at(2)), vec!["p"]);
        assert_eq!(ids(hierarchy.children_of_id(1, "p")), vec!["a", "b"]);
        assert_eq!(ids(hierarchy.children_of_id(2, "p")), Vec::<String>::new());
        assert_eq!(hierarchy.levels().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn filter_forces_roots() {
        let tasks = tree();
        let hierarchy = build_hierarchy_with(&tasks, |t| t.id == "a");

        assert_eq!(ids(hierarchy.roots_at(1)), vec!["p", "a", "q", "orphan"]);
        assert_eq!(ids(hierarchy.children_of_id(1, "p")), vec!["b"]);
        assert_eq!(ids(hierarchy.children_of_id(1, "a")), vec!["a1"]);
    }

    #[test]
    fn descendants_in_pre_order() {
        let tasks = tree();
        let hierarchy = build_hierarchy(&tasks);
        let descendants = hierarchy.descendants(&tasks[0]).unwrap();
        assert_eq!(ids(&descendants), vec!["a", "a1", "b"]);
    }

    #[test]
    fn boundaries_skip_empty_subtrees() {
        let mut tasks = tree();
        tasks.push(Task::empty("gap").with_parent("p"));
        tasks.push(Task::new("hidden", day(2020, 1, 1), day(2030, 1, 1)).with_parent("gap"));
        let hierarchy = build_hierarchy(&tasks);

        assert_eq!(
            hierarchy.child_boundaries(&tasks[0]).unwrap(),
            Some((day(2023, 12, 30), day(2024, 1, 12)))
        );
        assert_eq!(hierarchy.child_boundaries(&tasks[4]).unwrap(), None);
    }

    #[test]
    fn parent_cycles_are_reported() {
        let tasks = vec![
            Task::new("x", day(2024, 1, 1), day(2024, 1, 2)).with_parent("y"),
            Task::new("y", day(2024, 1, 1), day(2024, 1, 2)).with_parent("x"),
        ];
        let hierarchy = build_hierarchy(&tasks);
        let lookup = TaskLookup::new(&tasks);

        assert!(hierarchy.roots_at(1).is_empty());
        assert!(matches!(
            hierarchy.descendants(&tasks[0]),
            Err(GanttError::CycleDetected { .. })
        ));
        assert!(matches!(
            lookup.ancestors(&tasks[0]),
            Err(GanttError::CycleDetected { .. })
        ));
    }

    #[test]
    fn lookup_errors_distinguish_level_and_id() {
        let tasks = tree();
        let lookup = TaskLookup::new(&tasks);

        assert_eq!(lookup.index_of(1, "b").unwrap(), 2);
        assert_eq!(lookup.index_of(2, "p").unwrap(), 6);
        assert_eq!(lookup.index_of(3, "p"), Err(GanttError::LevelNotFound(3)));
        assert_eq!(
            lookup.index_of(1, "nope"),
            Err(GanttError::index_not_found(1, "nope"))
        );
    }

    #[test]
    fn ancestry() {
        let tasks = tree();
        let lookup = TaskLookup::new(&tasks);

        assert_eq!(ids(&lookup.ancestors(&tasks[3]).unwrap()), vec!["a", "p"]);
        assert!(lookup.is_descendant(&tasks[0], &tasks[3]).unwrap());
        assert!(!lookup.is_descendant(&tasks[3], &tasks[0]).unwrap());
        assert!(!lookup.is_descendant(&tasks[6], &tasks[3]).unwrap());
    }

    #[test]
    fn outline_numbers() {
        let tasks = tree();
        let hierarchy = build_hierarchy(&tasks);
        let nested = nested_indexes(&hierarchy).unwrap();

        let level = &nested[&1];
        assert_eq!(level["p"], NestedPosition { depth: 0, path: "1".into() });
        assert_eq!(level["b"], NestedPosition { depth: 1, path: "1.2".into() });
        assert_eq!(level["a1"], NestedPosition { depth: 2, path: "1.1.1".into() });
        assert_eq!(level["orphan"].path, "3");
    }

    #[test]
    fn children_sticking_out() {
        let tasks = tree();
        let lookup = TaskLookup::new(&tasks);
        let warnings = child_out_of_parent_warnings(&tasks, &lookup);

        let level = &warnings[&1];
        assert_eq!(level["b"], OutOfParent { start: false, end: true });
        assert_eq!(level["a1"], OutOfParent { start: true, end: false });
        assert!(!level.contains_key("a"));
        assert!(!level.contains_key("orphan"));
    }
}
