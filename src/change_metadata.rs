//! Change metadata
//!
//! Turns one proposed change into the full set of derived mutations.
//! Every computation reads a single snapshot of the task list; proposed
//! values are kept in a draft overlay so later steps see earlier ones.
//! The output is a batch of suggestions keyed by global index.

use std::collections::{HashMap, HashSet};

use chrono::TimeDelta;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::GanttConfig;
use crate::dependencies::DependencyGraph;
use crate::error::{GanttError, Result};
use crate::fit::{fit_parent_dates, ProgressRollup};
use crate::hierarchy::{Hierarchy, TaskLookup};
use crate::types::{LevelMap, Suggestion, Task, TaskIndex};
use crate::working_dates::WorkingCalendar;

/// A proposed change, consumed once
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ChangeAction {
    /// Overwrite a single task
    #[serde(rename = "change")]
    Change { task: Task },

    /// Dates changed by a gesture; `original_task` gives the delta
    #[serde(rename = "change_start_and_end")]
    ChangeStartAndEnd { task: Task, original_task: Task },

    /// Insert `descendants` under `parent`
    #[serde(rename = "add-childs")]
    AddChilds { parent: Task, descendants: Vec<Task> },

    /// Remove tasks together with their subtrees
    #[serde(rename = "delete")]
    Delete { tasks: Vec<Task> },

    #[serde(rename = "move-before")]
    MoveBefore { target: Task, task_for_move: Task },

    #[serde(rename = "move-after")]
    MoveAfter { target: Task, task_for_move: Task },

    /// Reparent `childs` under `parent`
    #[serde(rename = "move-inside")]
    MoveInside { parent: Task, childs: Vec<Task> },
}

impl ChangeAction {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeAction::Change { .. } => "change",
            ChangeAction::ChangeStartAndEnd { .. } => "change_start_and_end",
            ChangeAction::AddChilds { .. } => "add-childs",
            ChangeAction::Delete { .. } => "delete",
            ChangeAction::MoveBefore { .. } => "move-before",
            ChangeAction::MoveAfter { .. } => "move-after",
            ChangeAction::MoveInside { .. } => "move-inside",
        }
    }
}

/// Everything a change is computed against
pub struct ChangeContext<'a> {
    pub tasks: &'a [Task],
    pub lookup: &'a TaskLookup<'a>,
    pub hierarchy: &'a Hierarchy<'a>,
    pub graph: &'a DependencyGraph<'a>,
    pub calendar: &'a WorkingCalendar<'a>,
    pub config: &'a GanttConfig,
}

/// Result of a change computation
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMetadata {
    /// Direct dependents of the changed tasks
    pub dependent_tasks: Vec<Task>,
    /// The changed tasks with their global indexes
    pub task_indexes: Vec<TaskIndex>,
    /// Ancestors of the changed tasks
    pub parents: Vec<Task>,
    /// Derived mutations, ordered by index
    pub suggestions: Vec<Suggestion>,
}

/// Suggestions keyed by global index, last writer wins
#[derive(Debug, Default, Clone)]
pub struct SuggestionBatch {
    entries: IndexMap<usize, Suggestion>,
}

impl SuggestionBatch {
    pub fn push(&mut self, suggestion: Suggestion) {
        self.entries.insert(suggestion.index, suggestion);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_sorted(mut self) -> Vec<Suggestion> {
        self.entries.sort_unstable_keys();
        self.entries.into_values().collect()
    }
}

/// Proposed state on top of the snapshot
pub(crate) struct Draft<'c, 'a> {
    pub(crate) ctx: &'c ChangeContext<'a>,
    overrides: LevelMap<HashMap<String, Task>>,
    removed: LevelMap<HashSet<String>>,
    extra: Vec<Task>,
    /// Parents may differ from the snapshot hierarchy
    structural: bool,
    /// Tasks written by the caller itself; never suggested
    locked: LevelMap<HashSet<String>>,
    batch: SuggestionBatch,
}

impl<'c, 'a> Draft<'c, 'a> {
    pub(crate) fn new(ctx: &'c ChangeContext<'a>) -> Self {
        Self {
            ctx,
            overrides: LevelMap::new(),
            removed: LevelMap::new(),
            extra: Vec::new(),
            structural: false,
            locked: LevelMap::new(),
            batch: SuggestionBatch::default(),
        }
    }

    pub(crate) fn is_removed(&self, level: u32, id: &str) -> bool {
        self.removed.get(&level).is_some_and(|set| set.contains(id))
    }

    pub(crate) fn is_locked(&self, level: u32, id: &str) -> bool {
        self.locked.get(&level).is_some_and(|set| set.contains(id))
    }

    /// Current value of a task
    pub(crate) fn current(&self, level: u32, id: &str) -> Option<&Task> {
        if self.is_removed(level, id) {
            return None;
        }
        if let Some(task) = self.overrides.get(&level).and_then(|map| map.get(id)) {
            return Some(task);
        }
        if let Some(task) = self.ctx.lookup.get(level, id) {
            return Some(task);
        }
        self.extra
            .iter()
            .find(|t| t.comparison_level == level && t.id == id)
    }

    pub(crate) fn current_of(&self, task: &Task) -> Option<&Task> {
        self.current(task.comparison_level, &task.id)
    }

    /// Write a task the caller commits itself
    pub(crate) fn lock(&mut self, task: Task) {
        self.locked
            .entry(task.comparison_level)
            .or_default()
            .insert(task.id.clone());
        self.overrides
            .entry(task.comparison_level)
            .or_default()
            .insert(task.id.clone(), task);
    }

    /// Write a derived task and suggest it
    pub(crate) fn suggest(&mut self, task: Task) -> Result<()> {
        let level = task.comparison_level;
        if self.is_locked(level, &task.id) {
            return Ok(());
        }

        let index = self.ctx.lookup.index_of(level, &task.id)?;
        trace!(id = %task.id, level, index, start = %task.start, end = %task.end, "suggest");
        self.batch.push(Suggestion::for_task(task.clone(), index));
        self.overrides
            .entry(level)
            .or_default()
            .insert(task.id.clone(), task);
        Ok(())
    }

    pub(crate) fn remove(&mut self, task: &Task) {
        self.structural = true;
        self.removed
            .entry(task.comparison_level)
            .or_default()
            .insert(task.id.clone());
    }

    pub(crate) fn add_extra(&mut self, task: Task) {
        self.structural = true;
        self.extra.push(task);
    }

    pub(crate) fn reparent(&mut self, task: &Task, parent: Option<String>) {
        self.structural = true;
        self.lock(Task {
            parent,
            ..task.clone()
        });
    }

    /// Current children of a task, in list order
    pub(crate) fn children(&self, task: &Task) -> Vec<Task> {
        let level = task.comparison_level;

        if !self.structural {
            return self
                .ctx
                .hierarchy
                .children_of(task)
                .iter()
                .filter_map(|child| self.current_of(child))
                .cloned()
                .collect();
        }

        self.ctx
            .tasks
            .iter()
            .filter(|t| t.comparison_level == level)
            .filter_map(|t| self.current_of(t))
            .chain(self.extra.iter().filter(|t| t.comparison_level == level))
            .filter(|t| t.parent.as_deref() == Some(task.id.as_str()))
            .cloned()
            .collect()
    }

    /// Current ancestors of `task`, nearest first
    pub(crate) fn ancestors(&self, task: &Task) -> Result<Vec<Task>> {
        let level = task.comparison_level;
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(task.id.clone());

        let mut result = Vec::new();
        let mut parent_id = task.parent.clone();

        while let Some(id) = parent_id {
            let Some(parent) = self.current(level, &id) else {
                break;
            };
            if !visited.insert(parent.id.clone()) {
                return Err(GanttError::cycle(level, &parent.id));
            }
            parent_id = parent.parent.clone();
            result.push(parent.clone());
        }

        Ok(result)
    }

    pub(crate) fn into_suggestions(self) -> Vec<Suggestion> {
        self.batch.into_sorted()
    }

    pub(crate) fn suggestion_count(&self) -> usize {
        self.batch.len()
    }
}

/// Shift every descendant of `task` by exactly `delta`
///
/// Returns the shifted tasks.
pub(crate) fn shift_descendants(draft: &mut Draft<'_, '_>, task: &Task, delta: TimeDelta) -> Result<Vec<Task>> {
    if delta == TimeDelta::zero() {
        return Ok(Vec::new());
    }

    let mut shifted = Vec::new();
    for descendant in draft.ctx.hierarchy.descendants(task)? {
        if descendant.is_empty() {
            continue;
        }
        let Some(current) = draft.current_of(descendant) else {
            continue;
        };
        let moved = current.shifted(delta);
        draft.suggest(moved.clone())?;
        shifted.push(moved);
    }
    Ok(shifted)
}

/// Dates of `task` satisfying all of its dependencies against the draft
///
/// The placement with the latest start binds. `None` without resolvable
/// dependencies.
pub(crate) fn place_by_dependencies(
    draft: &Draft<'_, '_>,
    task: &Task,
) -> Option<(chrono::NaiveDateTime, chrono::NaiveDateTime)> {
    let mut placement: Option<(chrono::NaiveDateTime, chrono::NaiveDateTime)> = None;

    for dependency in &task.dependencies {
        if dependency.source_id == task.id {
            continue;
        }
        let Some(source) = draft
            .current(task.comparison_level, &dependency.source_id)
            .filter(|s| !s.is_empty())
        else {
            continue;
        };

        let candidate = draft.ctx.calendar.enforce_dependency(source, task, dependency);
        if placement.map_or(true, |(start, _)| candidate.0 > start) {
            placement = Some(candidate);
        }
    }

    placement
}

/// Re-anchor the direct dependents of `sources`
///
/// A re-anchored dependent carries its subtree along when
/// `is_move_childs_with_parent` is set. Tasks in `skip` are left alone.
/// Returns every task written, so their parents can be refitted.
pub(crate) fn reanchor_dependents(
    draft: &mut Draft<'_, '_>,
    sources: &[Task],
    skip: &HashSet<(u32, String)>,
) -> Result<Vec<Task>> {
    let mut written = Vec::new();
    for source in sources {
        let Some(snapshot) = draft.ctx.lookup.resolve(source) else {
            continue;
        };

        for edge in draft.ctx.graph.dependents_of(snapshot) {
            let level = edge.task.comparison_level;
            if skip.contains(&edge.task.key()) || draft.is_locked(level, &edge.task.id) {
                continue;
            }
            let Some(current) = draft.current_of(edge.task).cloned() else {
                continue;
            };
            let Some((start, end)) = place_by_dependencies(draft, &current) else {
                continue;
            };
            if (start, end) == (current.start, current.end) {
                continue;
            }

            let placed = current.with_dates(start, end);
            draft.suggest(placed.clone())?;
            written.push(placed);
            if draft.ctx.config.is_move_childs_with_parent {
                written.extend(shift_descendants(draft, edge.task, start - current.start)?);
            }
        }
    }
    Ok(written)
}

/// Refit every ancestor of `seeds`, deepest first
pub(crate) fn fit_parents(draft: &mut Draft<'_, '_>, seeds: &[Task]) -> Result<()> {
    let mut seen: HashSet<(u32, String)> = HashSet::new();
    let mut parents: Vec<(usize, Task)> = Vec::new();

    for seed in seeds {
        let ancestors = draft.ancestors(seed)?;
        let total = ancestors.len();
        for (i, parent) in ancestors.into_iter().enumerate() {
            if seen.insert(parent.key()) {
                // depth counted from the root
                parents.push((total - i - 1, parent));
            }
        }
    }
    parents.sort_by(|a, b| b.0.cmp(&a.0));

    let config = draft.ctx.config;
    let mut rollup = ProgressRollup::new(config.weighted_progress);

    for (_, parent) in parents {
        let level = parent.comparison_level;
        if draft.is_locked(level, &parent.id) {
            continue;
        }
        let Some(current) = draft.current_of(&parent).cloned() else {
            continue;
        };
        if current.is_empty() {
            continue;
        }

        let children = draft.children(&current);
        let mut next = current.clone();
        if let Some((start, end)) = fit_parent_dates(&current, &children, config) {
            next = next.with_dates(start, end);
        }
        if config.roll_up_progress && !children.is_empty() {
            let children_of = |task: &Task| draft.children(task);
            next.progress = rollup.progress(&current, &children_of)?;
        }

        if next != current {
            draft.suggest(next)?;
        }
    }

    Ok(())
}

fn index_of(ctx: &ChangeContext<'_>, task: &Task) -> Result<TaskIndex> {
    Ok(TaskIndex {
        task: task.clone(),
        index: ctx.lookup.global_index(task)?,
    })
}

fn dependents_of(ctx: &ChangeContext<'_>, tasks: &[Task]) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .filter_map(|t| ctx.lookup.resolve(t))
        .flat_map(|t| ctx.graph.dependents_of(t))
        .filter(|edge| seen.insert(edge.task.key()))
        .map(|edge| edge.task.clone())
        .collect()
}

fn parents_of(ctx: &ChangeContext<'_>, tasks: &[Task]) -> Result<Vec<Task>> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for task in tasks {
        for parent in ctx.lookup.ancestors(task)? {
            if seen.insert(parent.key()) {
                result.push(parent.clone());
            }
        }
    }
    Ok(result)
}

/// Compute the derived mutations of a change
///
/// Every task the action references must be part of the snapshot;
/// otherwise `IndexNotFound` (or `LevelNotFound`) is returned.
pub fn get_change_metadata(action: &ChangeAction, ctx: &ChangeContext<'_>) -> Result<ChangeMetadata> {
    let mut draft = Draft::new(ctx);
    let config = ctx.config;

    let (task_indexes, dependent_tasks, parents) = match action {
        ChangeAction::Change { task } => {
            let indexed = index_of(ctx, task)?;
            let snapshot = ctx
                .lookup
                .resolve(task)
                .ok_or_else(|| GanttError::index_not_found(task.comparison_level, &task.id))?;

            draft.lock(task.clone());
            let mut seeds = vec![task.clone()];
            if (snapshot.start, snapshot.end) != (task.start, task.end) {
                let skip = HashSet::new();
                seeds.extend(reanchor_dependents(&mut draft, std::slice::from_ref(task), &skip)?);
            }
            fit_parents(&mut draft, &seeds)?;

            (
                vec![indexed],
                dependents_of(ctx, std::slice::from_ref(task)),
                parents_of(ctx, std::slice::from_ref(task))?,
            )
        }

        ChangeAction::ChangeStartAndEnd {
            task,
            original_task,
        } => {
            let indexed = index_of(ctx, original_task)?;
            draft.lock(task.clone());

            let delta_start = task.start - original_task.start;
            let delta_end = task.end - original_task.end;

            let mut moved = vec![task.clone()];
            let mut skip = HashSet::new();
            if config.is_move_childs_with_parent && delta_start == delta_end {
                for shifted in shift_descendants(&mut draft, original_task, delta_start)? {
                    skip.insert(shifted.key());
                    moved.push(shifted);
                }
            }

            let reanchored = reanchor_dependents(&mut draft, &moved, &skip)?;
            moved.extend(reanchored);
            fit_parents(&mut draft, &moved)?;

            (
                vec![TaskIndex {
                    task: task.clone(),
                    index: indexed.index,
                }],
                dependents_of(ctx, std::slice::from_ref(original_task)),
                parents_of(ctx, std::slice::from_ref(original_task))?,
            )
        }

        ChangeAction::AddChilds {
            parent,
            descendants,
        } => {
            let indexed = index_of(ctx, parent)?;
            let added: HashSet<&str> = descendants.iter().map(|t| t.id.as_str()).collect();

            let mut top = Vec::new();
            for descendant in descendants {
                let mut task = descendant.clone();
                task.comparison_level = parent.comparison_level;
                let attached = task.parent.as_deref().is_some_and(|p| added.contains(p));
                if !attached {
                    task.parent = Some(parent.id.clone());
                    top.push(task.clone());
                }
                draft.add_extra(task);
            }
            fit_parents(&mut draft, &top)?;

            let mut parents = vec![parent.clone()];
            parents.extend(parents_of(ctx, std::slice::from_ref(parent))?);
            (vec![indexed], Vec::new(), parents)
        }

        ChangeAction::Delete { tasks } => {
            let mut deleted: Vec<TaskIndex> = Vec::new();
            let mut keys = HashSet::new();
            for task in tasks {
                let snapshot = ctx
                    .lookup
                    .resolve(task)
                    .ok_or_else(|| GanttError::index_not_found(task.comparison_level, &task.id))?;
                let subtree = std::iter::once(snapshot).chain(ctx.hierarchy.descendants(snapshot)?);
                for member in subtree {
                    if keys.insert(member.key()) {
                        deleted.push(index_of(ctx, member)?);
                    }
                }
            }
            deleted.sort_by_key(|entry| entry.index);

            for entry in &deleted {
                draft.remove(&entry.task);
            }

            let deleted_tasks: Vec<Task> = deleted.iter().map(|e| e.task.clone()).collect();
            let dependents: Vec<Task> = dependents_of(ctx, &deleted_tasks)
                .into_iter()
                .filter(|t| !keys.contains(&t.key()))
                .collect();

            // dependents lose their links to the deleted tasks
            for dependent in &dependents {
                let mut next = dependent.clone();
                next.dependencies
                    .retain(|d| !keys.contains(&(dependent.comparison_level, d.source_id.clone())));
                draft.suggest(next)?;
            }

            let roots: Vec<Task> = deleted_tasks
                .iter()
                .filter(|t| {
                    t.parent
                        .as_ref()
                        .map_or(true, |p| !keys.contains(&(t.comparison_level, p.clone())))
                })
                .cloned()
                .collect();
            fit_parents(&mut draft, &roots)?;

            let parents = parents_of(ctx, &roots)?;
            (deleted, dependents, parents)
        }

        ChangeAction::MoveBefore {
            target,
            task_for_move,
        }
        | ChangeAction::MoveAfter {
            target,
            task_for_move,
        } => {
            let moved_index = index_of(ctx, task_for_move)?;
            let target_index = index_of(ctx, target)?;
            let target_snapshot = ctx
                .lookup
                .resolve(target)
                .ok_or_else(|| GanttError::index_not_found(target.comparison_level, &target.id))?;

            draft.reparent(task_for_move, target_snapshot.parent.clone());
            let moved = Task {
                parent: target_snapshot.parent.clone(),
                ..task_for_move.clone()
            };
            fit_parents(&mut draft, &[task_for_move.clone(), moved])?;

            let parents = parents_of(ctx, &[task_for_move.clone(), target.clone()])?;
            (vec![moved_index, target_index], Vec::new(), parents)
        }

        ChangeAction::MoveInside { parent, childs } => {
            let mut indexes = vec![index_of(ctx, parent)?];
            let mut seeds = Vec::new();
            for child in childs {
                indexes.push(index_of(ctx, child)?);
                draft.reparent(child, Some(parent.id.clone()));
                seeds.push(child.clone());
                seeds.push(Task {
                    parent: Some(parent.id.clone()),
                    ..child.clone()
                });
            }
            fit_parents(&mut draft, &seeds)?;

            let mut parents = vec![parent.clone()];
            parents.extend(parents_of(ctx, std::slice::from_ref(parent))?);
            parents.extend(parents_of(ctx, childs)?);
            (indexes, Vec::new(), parents)
        }
    };

    debug!(
        action = action.name(),
        suggestions = draft.suggestion_count(),
        "change metadata computed"
    );

    Ok(ChangeMetadata {
        dependent_tasks,
        task_indexes,
        parents,
        suggestions: draft.into_suggestions(),
    })
}
