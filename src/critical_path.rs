//! Critical path marking
//!
//! A dependency edge is critical when its margin is zero or negative, and
//! both of its ends are then critical. Criticality spreads along the
//! hierarchy: the ancestors of a critical task span it and its descendants
//! drive it, so both are marked too.

use std::collections::{HashMap, HashSet};

use crate::dependencies::DependencyGraph;
use crate::error::Result;
use crate::hierarchy::{Hierarchy, TaskLookup};
use crate::types::{LevelMap, Task};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CriticalPath<'a> {
    pub tasks: LevelMap<HashSet<&'a str>>,
    /// dependent id → sources joined by a critical edge
    pub dependencies: LevelMap<HashMap<&'a str, HashSet<&'a str>>>,
    /// Minimum margin over each dependent's incoming edges
    pub slack: LevelMap<HashMap<&'a str, i64>>,
}

impl<'a> CriticalPath<'a> {
    pub fn is_critical(&self, task: &Task) -> bool {
        self.tasks
            .get(&task.comparison_level)
            .is_some_and(|set| set.contains(task.id.as_str()))
    }

    pub fn is_critical_dependency(&self, level: u32, dependent: &str, source: &str) -> bool {
        self.dependencies
            .get(&level)
            .and_then(|map| map.get(dependent))
            .is_some_and(|sources| sources.contains(source))
    }

    pub fn slack_of(&self, task: &Task) -> Option<i64> {
        self.slack
            .get(&task.comparison_level)
            .and_then(|map| map.get(task.id.as_str()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.tasks.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Critical tasks and edges of every level
///
/// Reads the margins of the graph, so it is empty unless margins were
/// computed.
pub fn compute_critical_path<'a>(
    hierarchy: &Hierarchy<'a>,
    lookup: &TaskLookup<'a>,
    graph: &DependencyGraph<'a>,
) -> Result<CriticalPath<'a>> {
    let mut critical = CriticalPath::default();

    for (&level, dependents) in &graph.margins {
        let mut direct: Vec<&'a str> = Vec::new();

        for (&dependent, sources) in dependents {
            for (&source, &margin) in sources {
                let slack = critical
                    .slack
                    .entry(level)
                    .or_default()
                    .entry(dependent)
                    .or_insert(margin);
                *slack = (*slack).min(margin);

                if margin <= 0 {
                    direct.push(dependent);
                    direct.push(source);
                    critical
                        .dependencies
                        .entry(level)
                        .or_default()
                        .entry(dependent)
                        .or_default()
                        .insert(source);
                }
            }
        }

        let mut marked: HashSet<&'a str> = HashSet::new();
        for id in direct {
            if !marked.insert(id) {
                continue;
            }
            let Some(task) = lookup.get(level, id) else {
                continue;
            };

            let related = lookup
                .ancestors(task)?
                .into_iter()
                .chain(hierarchy.descendants(task)?);
            for other in related.filter(|t| !t.is_empty()) {
                critical
                    .tasks
                    .entry(level)
                    .or_default()
                    .insert(other.id.as_str());
            }
            critical.tasks.entry(level).or_default().insert(id);
        }
    }

    Ok(critical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::CoordinateMap;
    use crate::dependencies::{build_dependency_graph, GraphOptions};
    use crate::hierarchy::build_hierarchy;
    use crate::test_support::day;
    use crate::types::{DateExtremity, Dependency};

    fn critical_ids(tasks: &[Task]) -> Vec<String> {
        let hierarchy = build_hierarchy(tasks);
        let lookup = TaskLookup::new(tasks);
        let graph = build_dependency_graph(
            tasks,
            &lookup,
            &CoordinateMap::new(),
            GraphOptions {
                full_row_height: 50.0,
                rtl: false,
                compute_margins: true,
            },
        );
        let critical = compute_critical_path(&hierarchy, &lookup, &graph).unwrap();
        let mut ids: Vec<String> = tasks
            .iter()
            .filter(|t| critical.is_critical(t))
            .map(|t| t.id.clone())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn tight_edges_and_hierarchy() {
        let tasks = vec![
            Task::new("project", day(2024, 1, 1), day(2024, 1, 20)),
            Task::new("a", day(2024, 1, 1), day(2024, 1, 5)).with_parent("project"),
            Task::new("b", day(2024, 1, 5), day(2024, 1, 9))
                .with_parent("project")
                .with_dependency(Dependency::finish_to_start("a")),
            Task::new("b1", day(2024, 1, 5), day(2024, 1, 6)).with_parent("b"),
            Task::new("c", day(2024, 1, 12), day(2024, 1, 15))
                .with_parent("project")
                .with_dependency(Dependency::finish_to_start("b")),
            Task::new("lonely", day(2024, 1, 1), day(2024, 1, 2)),
        ];

        assert_eq!(critical_ids(&tasks), vec!["a", "b", "b1", "project"]);
    }

    #[test]
    fn slack_is_the_minimum_margin() {
        let tasks = vec![
            Task::new("a", day(2024, 1, 1), day(2024, 1, 5)),
            Task::new("b", day(2024, 1, 1), day(2024, 1, 3)),
            Task::new("c", day(2024, 1, 7), day(2024, 1, 9))
                .with_dependency(Dependency::finish_to_start("a"))
                .with_dependency(Dependency::finish_to_start("b")),
        ];
        let hierarchy = build_hierarchy(&tasks);
        let lookup = TaskLookup::new(&tasks);
        let graph = build_dependency_graph(
            &tasks,
            &lookup,
            &CoordinateMap::new(),
            GraphOptions {
                full_row_height: 50.0,
                rtl: false,
                compute_margins: true,
            },
        );
        let critical = compute_critical_path(&hierarchy, &lookup, &graph).unwrap();

        assert_eq!(
            critical.slack_of(&tasks[2]),
            Some(chrono::TimeDelta::days(2).num_milliseconds())
        );
        assert!(critical.is_empty());
    }

    #[test]
    fn violated_edge_is_critical_next_to_a_slack_one() {
        let tasks = vec![
            Task::new("a", day(2024, 1, 1), day(2024, 1, 5)),
            Task::new("b", day(2024, 1, 3), day(2024, 1, 10))
                .with_dependency(Dependency::finish_to_start("a"))
                .with_dependency(Dependency::new(
                    "a",
                    DateExtremity::StartOfTask,
                    DateExtremity::StartOfTask,
                )),
        ];
        assert_eq!(critical_ids(&tasks), vec!["a", "b"]);
    }

    #[test]
    fn adding_an_edge_only_adds() {
        let mut tasks = vec![
            Task::new("a", day(2024, 1, 1), day(2024, 1, 5)),
            Task::new("b", day(2024, 1, 5), day(2024, 1, 9))
                .with_dependency(Dependency::finish_to_start("a")),
            Task::new("c", day(2024, 1, 2), day(2024, 1, 4)),
        ];
        let before = critical_ids(&tasks);
        tasks[2].dependencies.push(Dependency::finish_to_start("b"));
        let after = critical_ids(&tasks);

        assert_eq!(before, vec!["a", "b"]);
        assert_eq!(after, vec!["a", "b", "c"]);
    }
}
