//! Parent and child fitting
//!
//! Post-pass rules applied after a date change: a resized parent cannot cut
//! into its children, parents grow to cover their children, disabled
//! parents re-span exactly and progress can be rolled up from the leaves.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::config::GanttConfig;
use crate::error::{GanttError, Result};
use crate::types::{BarMoveAction, Task, TaskKey};

/// Keep a resized parent around its children
///
/// Only start/end resizes of the allowed task types are constrained: the
/// start never moves past the earliest child start and the end never before
/// the latest child end. Tasks without children are returned unchanged.
/// In RTL the start handle drives the end date and vice versa.
pub fn constrain_task_to_children(
    action: BarMoveAction,
    task: &Task,
    boundaries: Option<(NaiveDateTime, NaiveDateTime)>,
    config: &GanttConfig,
) -> Task {
    let Some((min_start, max_end)) = boundaries else {
        return task.clone();
    };
    if !config.is_fit_type(task.task_type) {
        return task.clone();
    }

    match (action, config.rtl) {
        (BarMoveAction::Start, false) | (BarMoveAction::End, true) => {
            task.with_dates(task.start.min(min_start), task.end)
        }
        (BarMoveAction::End, false) | (BarMoveAction::Start, true) => {
            task.with_dates(task.start, task.end.max(max_end))
        }
        (BarMoveAction::Move | BarMoveAction::Progress, _) => task.clone(),
    }
}

/// Earliest start and latest end of the dated tasks
pub fn span_of<'t, I>(tasks: I) -> Option<(NaiveDateTime, NaiveDateTime)>
where
    I: IntoIterator<Item = &'t Task>,
{
    tasks
        .into_iter()
        .filter(|t| !t.is_empty())
        .fold(None, |bounds, task| {
            Some(match bounds {
                None => (task.start, task.end),
                Some((min, max)) => (min.min(task.start), max.max(task.end)),
            })
        })
}

/// Average of `(progress, duration)` pairs
///
/// Weighted by duration when asked; falls back to the plain mean when the
/// total duration is zero. `None` for no entries.
pub fn average_progress(entries: &[(f64, NaiveDateTime, NaiveDateTime)], weighted: bool) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }

    let plain = entries.iter().map(|(p, _, _)| p).sum::<f64>() / entries.len() as f64;
    if !weighted {
        return Some(plain);
    }

    let total: i64 = entries
        .iter()
        .map(|(_, start, end)| (*end - *start).num_milliseconds().max(0))
        .sum();
    if total == 0 {
        return Some(plain);
    }

    let sum: f64 = entries
        .iter()
        .map(|(p, start, end)| p * (*end - *start).num_milliseconds().max(0) as f64)
        .sum();
    Some(sum / total as f64)
}

/// New dates of a parent after its children changed
///
/// Disabled parents re-span exactly when `is_update_disabled_parents_on_change`
/// is set; parents of the allowed types only ever expand. `None` when the
/// parent keeps its dates.
pub fn fit_parent_dates(
    parent: &Task,
    children: &[Task],
    config: &GanttConfig,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let (min_start, max_end) = span_of(children)?;

    let fitted = if parent.is_disabled && config.is_update_disabled_parents_on_change {
        (min_start, max_end)
    } else if config.expand_parents_to_fit_children && config.is_fit_type(parent.task_type) {
        (parent.start.min(min_start), parent.end.max(max_end))
    } else {
        return None;
    };

    (fitted != (parent.start, parent.end)).then_some(fitted)
}

/// Memoized bottom-up progress roll-up
///
/// Leaves report their own progress; a parent reports the average of its
/// children's rolled-up progress. Each node is computed once.
#[derive(Debug, Default)]
pub struct ProgressRollup {
    weighted: bool,
    memo: HashMap<TaskKey, f64>,
}

impl ProgressRollup {
    pub fn new(weighted: bool) -> Self {
        Self {
            weighted,
            memo: HashMap::new(),
        }
    }

    /// Rolled-up progress of `task`, reading children through `children_of`
    pub fn progress<F>(&mut self, task: &Task, children_of: &F) -> Result<f64>
    where
        F: Fn(&Task) -> Vec<Task>,
    {
        let mut in_progress = HashSet::new();
        self.visit(task, children_of, &mut in_progress)
    }

    fn visit<F>(&mut self, task: &Task, children_of: &F, in_progress: &mut HashSet<TaskKey>) -> Result<f64>
    where
        F: Fn(&Task) -> Vec<Task>,
    {
        let key = task.key();
        if let Some(progress) = self.memo.get(&key) {
            return Ok(*progress);
        }
        if !in_progress.insert(key.clone()) {
            return Err(GanttError::cycle(task.comparison_level, &task.id));
        }

        let mut entries = Vec::new();
        for child in children_of(task).iter().filter(|c| !c.is_empty()) {
            let progress = self.visit(child, children_of, in_progress)?;
            entries.push((progress, child.start, child.end));
        }

        let progress = average_progress(&entries, self.weighted).unwrap_or(task.progress);
        in_progress.remove(&key);
        self.memo.insert(key, progress);
        Ok(progress)
    }

    /// Forget a node after its children changed
    pub fn invalidate(&mut self, task: &Task) {
        self.memo.remove(&task.key());
    }
}
