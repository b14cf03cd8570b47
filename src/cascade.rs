//! Date-change gesture pipeline
//!
//! A dragged bar goes through the working-date adjuster and the child fit,
//! then either through plain change metadata or through the cascade: the
//! set of tasks reachable from the moved one (children and dependents) is
//! collected first and then re-placed in topological order, so chained
//! dependencies move consistently. A moved root carries the set along by
//! its own delta and constraints can only push a member later; a resized
//! root leaves slack dependents where they are.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::TimeDelta;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::change_metadata::{
    fit_parents, get_change_metadata, place_by_dependencies, ChangeAction, ChangeContext,
    ChangeMetadata, Draft,
};
use crate::dependencies::DependencyGraph;
use crate::error::{GanttError, Result};
use crate::fit::constrain_task_to_children;
use crate::hierarchy::Hierarchy;
use crate::types::{BarMoveAction, Task, TaskIndex, TaskKey};

/// Result of a date-change gesture
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateChangeOutcome {
    /// The dragged task after adjustment; the caller writes it itself
    pub task: Task,
    pub metadata: ChangeMetadata,
}

/// Tasks reached from `root` through children and dependents
///
/// Depth-first, children before dependents, same comparison level only.
/// The root comes first. Its own children are skipped when
/// `include_root_children` is false (a resized parent keeps its contents).
pub fn collect_cascade_set<'a>(
    root: &'a Task,
    hierarchy: &Hierarchy<'a>,
    graph: &DependencyGraph<'a>,
    include_children: bool,
    include_root_children: bool,
) -> Vec<&'a Task> {
    let mut visited: HashSet<TaskKey> = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![root];

    while let Some(task) = stack.pop() {
        if !visited.insert(task.key()) {
            continue;
        }
        order.push(task);

        // pushed in reverse so children pop first
        for edge in graph.dependents_of(task).iter().rev() {
            if !edge.task.is_empty() && !visited.contains(&edge.task.key()) {
                stack.push(edge.task);
            }
        }

        let is_root = std::ptr::eq(task, root);
        if include_children && (include_root_children || !is_root) {
            for child in hierarchy.children_of(task).iter().rev() {
                if !child.is_empty() && !visited.contains(&child.key()) {
                    stack.push(*child);
                }
            }
        }
    }

    order
}

/// Kahn order over the cascade subgraph, ties broken by walk order
///
/// Nodes left on a cycle are appended in walk order.
fn topological_order<'a>(
    set: &[&'a Task],
    hierarchy: &Hierarchy<'a>,
    graph: &DependencyGraph<'a>,
    include_children: bool,
    include_root_children: bool,
) -> Vec<&'a Task> {
    let position: HashMap<TaskKey, usize> = set
        .iter()
        .enumerate()
        .map(|(i, task)| (task.key(), i))
        .collect();

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); set.len()];
    let mut in_degree = vec![0usize; set.len()];

    for (i, task) in set.iter().enumerate() {
        let children = (include_children && (include_root_children || i != 0))
            .then(|| hierarchy.children_of(task))
            .unwrap_or(&[]);
        let targets = children
            .iter()
            .copied()
            .chain(graph.dependents_of(task).iter().map(|edge| edge.task));

        for target in targets {
            // edges into the root are ignored, its value is fixed
            match position.get(&target.key()) {
                Some(&j) if j != 0 && j != i => {
                    successors[i].push(j);
                    in_degree[j] += 1;
                }
                _ => {}
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..set.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut done = vec![false; set.len()];
    let mut order = Vec::with_capacity(set.len());

    while let Some(i) = ready.pop_first() {
        done[i] = true;
        order.push(set[i]);
        for &j in &successors[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if order.len() < set.len() {
        let stuck: Vec<&str> = (0..set.len())
            .filter(|&i| !done[i])
            .map(|i| set[i].id.as_str())
            .collect();
        warn!(tasks = ?stuck, "dependency cycle inside the cascade set");
        order.extend((0..set.len()).filter(|&i| !done[i]).map(|i| set[i]));
    }

    order
}

/// Run a drag gesture end to end
///
/// `changed` carries the raw dragged dates of `original`, which must be part
/// of the snapshot.
pub fn handle_date_change(
    ctx: &ChangeContext<'_>,
    action: BarMoveAction,
    changed: &Task,
    original: &Task,
) -> Result<DateChangeOutcome> {
    let config = ctx.config;
    let snapshot = ctx
        .lookup
        .resolve(original)
        .ok_or_else(|| GanttError::index_not_found(original.comparison_level, &original.id))?;

    let mut task = ctx
        .calendar
        .adjust_task_to_working_dates(action, changed, snapshot);
    if config.fit_start_end_to_parent {
        let boundaries = ctx.hierarchy.child_boundaries(snapshot)?;
        task = constrain_task_to_children(action, &task, boundaries, config);
    }

    if action == BarMoveAction::Progress {
        let metadata = get_change_metadata(&ChangeAction::Change { task: task.clone() }, ctx)?;
        return Ok(DateChangeOutcome { task, metadata });
    }

    if !config.cascade_dependencies {
        let metadata = get_change_metadata(
            &ChangeAction::ChangeStartAndEnd {
                task: task.clone(),
                original_task: snapshot.clone(),
            },
            ctx,
        )?;
        return Ok(DateChangeOutcome { task, metadata });
    }

    let metadata = cascade(ctx, action, &task, snapshot)?;
    Ok(DateChangeOutcome { task, metadata })
}

fn cascade<'a>(
    ctx: &ChangeContext<'a>,
    action: BarMoveAction,
    task: &Task,
    snapshot: &'a Task,
) -> Result<ChangeMetadata> {
    let config = ctx.config;
    let include_children = config.is_move_childs_with_parent;
    let include_root_children = !action.is_resize();

    let set = collect_cascade_set(
        snapshot,
        ctx.hierarchy,
        ctx.graph,
        include_children,
        include_root_children,
    );
    let order = topological_order(
        &set,
        ctx.hierarchy,
        ctx.graph,
        include_children,
        include_root_children,
    );
    let members: HashSet<TaskKey> = set.iter().map(|t| t.key()).collect();

    // the whole set travels with a moved root; a resize only pushes
    let baseline = match action {
        BarMoveAction::Move => task.start - snapshot.start,
        _ => TimeDelta::zero(),
    };

    let mut draft = Draft::new(ctx);
    draft.lock(task.clone());

    for node in order.into_iter().filter(|t| !std::ptr::eq(*t, snapshot)) {
        let level = node.comparison_level;
        let Some(current) = draft.current_of(node).cloned() else {
            continue;
        };

        // hierarchy first: a child follows its moved parent
        let by_parent = node
            .parent
            .as_deref()
            .filter(|_| include_children)
            .filter(|parent| members.contains(&(level, parent.to_string())))
            .filter(|parent| include_root_children || *parent != snapshot.id)
            .and_then(|parent| {
                let before = ctx.lookup.get(level, parent)?;
                let after = draft.current(level, parent)?;
                let delta = after.start - before.start;
                Some((node.start + delta, node.end + delta))
            });

        let by_dependencies = place_by_dependencies(&draft, &current);

        // latest start wins, never earlier than the shifted dates
        let (start, end) = [by_parent, by_dependencies]
            .into_iter()
            .flatten()
            .fold((node.start + baseline, node.end + baseline), |best, candidate| {
                if candidate.0 > best.0 {
                    candidate
                } else {
                    best
                }
            });

        if (start, end) != (current.start, current.end) {
            trace!(id = %node.id, start = %start, end = %end, "cascade");
            draft.suggest(current.with_dates(start, end))?;
        }
    }

    let seeds: Vec<Task> = set
        .iter()
        .filter_map(|t| draft.current_of(t).cloned())
        .collect();
    fit_parents(&mut draft, &seeds)?;

    debug!(
        id = %snapshot.id,
        cascade = set.len(),
        suggestions = draft.suggestion_count(),
        "cascade computed"
    );

    let task_indexes = vec![TaskIndex {
        task: task.clone(),
        index: ctx.lookup.global_index(snapshot)?,
    }];
    let dependent_tasks = ctx
        .graph
        .dependents_of(snapshot)
        .iter()
        .map(|edge| edge.task.clone())
        .collect();
    let parents = ctx
        .lookup
        .ancestors(snapshot)?
        .into_iter()
        .cloned()
        .collect();

    Ok(ChangeMetadata {
        dependent_tasks,
        task_indexes,
        parents,
        suggestions: draft.into_suggestions(),
    })
}
