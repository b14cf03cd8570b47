//! Engine State Container
//!
//! Owns the committed task list, the config and the host policies. Each
//! gesture handler computes the next list against the current snapshot,
//! commits it and returns it together with a change descriptor.

use std::collections::HashSet;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cascade::handle_date_change;
use crate::change_metadata::{get_change_metadata, ChangeAction, ChangeContext, ChangeMetadata};
use crate::config::GanttConfig;
use crate::error::{GanttError, Result};
use crate::hierarchy::TaskLookup;
use crate::layout::GanttLayout;
use crate::selection::{copy_tasks, SelectionState};
use crate::types::{BarMoveAction, DateExtremity, Dependency, RelationKind, Suggestion, Task, TaskType};
use crate::working_dates::{DefaultRounding, HolidayPolicy, RoundingPolicy, WorkingCalendar};

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeletePayload {
    pub tasks: Vec<Task>,
    pub task_indexes: Vec<usize>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRelationPayload {
    pub task_from: Task,
    pub task_from_index: usize,
    pub task_to: Task,
    pub task_to_index: usize,
}

/// What produced a committed list
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ChangeDescriptor {
    DateChange,
    DateChangeCascade,
    ProgressChange,
    EditTask,
    DeleteTask(DeletePayload),
    MoveTaskBefore,
    MoveTaskAfter,
    MoveTaskInside,
    AddTasks,
    AddRoot,
    FixStartPosition,
    FixEndPosition,
    FixDependencyPosition,
    RelationChange,
    DeleteRelation(DeleteRelationPayload),
    ExpandState,
}

impl ChangeDescriptor {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeDescriptor::DateChange => "date_change",
            ChangeDescriptor::DateChangeCascade => "date_change_cascade",
            ChangeDescriptor::ProgressChange => "progress_change",
            ChangeDescriptor::EditTask => "edit_task",
            ChangeDescriptor::DeleteTask(_) => "delete_task",
            ChangeDescriptor::MoveTaskBefore => "move_task_before",
            ChangeDescriptor::MoveTaskAfter => "move_task_after",
            ChangeDescriptor::MoveTaskInside => "move_task_inside",
            ChangeDescriptor::AddTasks => "add_tasks",
            ChangeDescriptor::AddRoot => "add_root",
            ChangeDescriptor::FixStartPosition => "fix_start_position",
            ChangeDescriptor::FixEndPosition => "fix_end_position",
            ChangeDescriptor::FixDependencyPosition => "fix_dependency_position",
            ChangeDescriptor::RelationChange => "relation_change",
            ChangeDescriptor::DeleteRelation(_) => "delete_relation",
            ChangeDescriptor::ExpandState => "expand_state",
        }
    }
}

/// Next task list plus its descriptor
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskChange {
    pub tasks: Vec<Task>,
    pub descriptor: ChangeDescriptor,
    /// Metadata the list was built from; empty for plain edits
    pub metadata: ChangeMetadata,
}

/// Write every suggestion into `tasks`
pub fn apply_suggestions(tasks: &mut [Task], suggestions: &[Suggestion]) {
    for suggestion in suggestions {
        if let Some(slot) = tasks.get_mut(suggestion.index) {
            *slot = suggestion.applied();
        } else {
            warn!(index = suggestion.index, "suggestion outside the task list");
        }
    }
}

fn first_index(metadata: &ChangeMetadata, task: &Task) -> Result<usize> {
    metadata
        .task_indexes
        .first()
        .map(|entry| entry.index)
        .ok_or_else(|| GanttError::index_not_found(task.comparison_level, &task.id))
}

/// Project state container
#[derive(Default)]
pub struct GanttState {
    tasks: Vec<Task>,
    config: GanttConfig,
    /// Overrides `config.calendar` when set
    holidays: Option<Box<dyn HolidayPolicy>>,
    /// Overrides the step rounding when set
    rounding: Option<Box<dyn RoundingPolicy>>,
    pub selection: SelectionState,
}

impl GanttState {
    pub fn new(tasks: Vec<Task>, config: GanttConfig) -> Self {
        Self {
            tasks,
            config,
            ..Self::default()
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn config(&self) -> &GanttConfig {
        &self.config
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Replace the list wholesale
    pub fn load_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.selection.reset();
    }

    pub fn set_config(&mut self, config: GanttConfig) {
        self.config = config;
    }

    pub fn set_holiday_policy(&mut self, policy: Option<Box<dyn HolidayPolicy>>) {
        self.holidays = policy;
    }

    pub fn set_rounding_policy(&mut self, policy: Option<Box<dyn RoundingPolicy>>) {
        self.rounding = policy;
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.selection.reset();
    }

    pub fn layout(&self) -> Result<GanttLayout<'_>> {
        GanttLayout::new(&self.tasks, &self.config)
    }

    /// Run `f` against a change context over the current snapshot
    pub fn with_context<R>(&self, f: impl FnOnce(&ChangeContext<'_>) -> Result<R>) -> Result<R> {
        let layout = self.layout()?;
        let step_rounding = DefaultRounding(self.config.date_move_step);

        let holidays: &dyn HolidayPolicy = match &self.holidays {
            Some(policy) => policy.as_ref(),
            None => &self.config.calendar,
        };
        let rounding: &dyn RoundingPolicy = match &self.rounding {
            Some(policy) => policy.as_ref(),
            None => &step_rounding,
        };

        let calendar = WorkingCalendar::for_config(&self.config, holidays, rounding, layout.date_setup());
        let ctx = layout.context(&calendar);
        f(&ctx)
    }

    pub fn metadata(&self, action: &ChangeAction) -> Result<ChangeMetadata> {
        self.with_context(|ctx| get_change_metadata(action, ctx))
    }

    fn index_of(&self, task: &Task) -> Result<usize> {
        TaskLookup::new(&self.tasks).index_of(task.comparison_level, &task.id)
    }

    fn commit(&mut self, tasks: Vec<Task>, descriptor: ChangeDescriptor, metadata: ChangeMetadata) -> TaskChange {
        debug!(
            descriptor = descriptor.name(),
            tasks = tasks.len(),
            suggestions = metadata.suggestions.len(),
            "change committed"
        );
        self.tasks = tasks.clone();
        TaskChange {
            tasks,
            descriptor,
            metadata,
        }
    }

    /// Snapshot copy with the suggestions written in
    fn with_suggestions(&self, metadata: &ChangeMetadata) -> Vec<Task> {
        let mut next = self.tasks.clone();
        apply_suggestions(&mut next, &metadata.suggestions);
        next
    }

    /// Drag end of a bar
    pub fn date_change(&mut self, action: BarMoveAction, changed: &Task, original: &Task) -> Result<TaskChange> {
        let outcome = self.with_context(|ctx| handle_date_change(ctx, action, changed, original))?;
        let index = first_index(&outcome.metadata, original)?;

        let mut next = self.with_suggestions(&outcome.metadata);
        next[index] = outcome.task;

        let descriptor = match action {
            BarMoveAction::Progress => ChangeDescriptor::ProgressChange,
            _ if self.config.cascade_dependencies => ChangeDescriptor::DateChangeCascade,
            _ => ChangeDescriptor::DateChange,
        };
        Ok(self.commit(next, descriptor, outcome.metadata))
    }

    pub fn progress_change(&mut self, task: &Task) -> Result<TaskChange> {
        let metadata = self.metadata(&ChangeAction::Change { task: task.clone() })?;
        let index = first_index(&metadata, task)?;

        let mut next = self.with_suggestions(&metadata);
        next[index] = task.clone();
        Ok(self.commit(next, ChangeDescriptor::ProgressChange, metadata))
    }

    /// Overwrite a task with its edited value
    pub fn edit_task(&mut self, task: &Task) -> Result<TaskChange> {
        let metadata = self.metadata(&ChangeAction::Change { task: task.clone() })?;
        let index = first_index(&metadata, task)?;

        let mut next = self.with_suggestions(&metadata);
        next[index] = task.clone();
        Ok(self.commit(next, ChangeDescriptor::EditTask, metadata))
    }

    /// Delete tasks together with their subtrees
    pub fn delete_tasks(&mut self, tasks: &[Task]) -> Result<TaskChange> {
        let metadata = self.metadata(&ChangeAction::Delete { tasks: tasks.to_vec() })?;

        let deleted: HashSet<usize> = metadata.task_indexes.iter().map(|e| e.index).collect();
        let next: Vec<Task> = self
            .with_suggestions(&metadata)
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !deleted.contains(index))
            .map(|(_, task)| task)
            .collect();

        let removed: Vec<Task> = metadata.task_indexes.iter().map(|e| e.task.clone()).collect();
        self.selection.forget(&removed);

        let payload = DeletePayload {
            tasks: tasks.to_vec(),
            task_indexes: metadata.task_indexes.iter().map(|e| e.index).collect(),
        };
        Ok(self.commit(next, ChangeDescriptor::DeleteTask(payload), metadata))
    }

    /// Refuse a move that would put a task under itself
    fn check_move(&self, new_parent: Option<&str>, moved: &Task) -> Result<()> {
        let Some(parent_id) = new_parent else {
            return Ok(());
        };
        let level = moved.comparison_level;
        if parent_id == moved.id {
            return Err(GanttError::cycle(level, &moved.id));
        }

        let lookup = TaskLookup::new(&self.tasks);
        let Some(parent) = lookup.get(level, parent_id) else {
            return Ok(());
        };
        if lookup.is_descendant(moved, parent)? {
            return Err(GanttError::cycle(level, &moved.id));
        }
        Ok(())
    }

    fn move_next_to(&mut self, target: &Task, task_for_move: &Task, after: bool) -> Result<Option<TaskChange>> {
        if target.is_same(task_for_move) {
            return Ok(None);
        }
        let target_index = self.index_of(target)?;
        let new_parent = self.tasks[target_index].parent.clone();
        self.check_move(new_parent.as_deref(), task_for_move)?;

        let action = if after {
            ChangeAction::MoveAfter {
                target: target.clone(),
                task_for_move: task_for_move.clone(),
            }
        } else {
            ChangeAction::MoveBefore {
                target: target.clone(),
                task_for_move: task_for_move.clone(),
            }
        };
        let metadata = self.metadata(&action)?;
        let moved_index = self.index_of(task_for_move)?;

        let mut next = self.with_suggestions(&metadata);
        next.remove(moved_index);
        let is_moved_before = moved_index < target_index;
        let insert_at = match (after, is_moved_before) {
            (true, true) => target_index,
            (true, false) => target_index + 1,
            (false, true) => target_index - 1,
            (false, false) => target_index,
        };
        next.insert(
            insert_at,
            Task {
                parent: new_parent,
                ..task_for_move.clone()
            },
        );

        let descriptor = if after {
            ChangeDescriptor::MoveTaskAfter
        } else {
            ChangeDescriptor::MoveTaskBefore
        };
        Ok(Some(self.commit(next, descriptor, metadata)))
    }

    pub fn move_task_after(&mut self, target: &Task, task_for_move: &Task) -> Result<Option<TaskChange>> {
        self.move_next_to(target, task_for_move, true)
    }

    pub fn move_task_before(&mut self, target: &Task, task_for_move: &Task) -> Result<Option<TaskChange>> {
        self.move_next_to(target, task_for_move, false)
    }

    /// Reparent `childs` under `parent`; the rows land right after it
    pub fn move_tasks_inside(&mut self, parent: &Task, childs: &[Task]) -> Result<TaskChange> {
        for child in childs {
            self.check_move(Some(&parent.id), child)?;
        }

        let metadata = self.metadata(&ChangeAction::MoveInside {
            parent: parent.clone(),
            childs: childs.to_vec(),
        })?;
        let parent_index = first_index(&metadata, parent)?;

        let lookup = TaskLookup::new(&self.tasks);
        let child_indexes: HashSet<usize> = childs
            .iter()
            .filter(|c| c.comparison_level == parent.comparison_level)
            .filter_map(|c| lookup.index_of(c.comparison_level, &c.id).ok())
            .collect();
        let displacement = child_indexes.iter().filter(|&&i| i < parent_index).count();

        let mut next: Vec<Task> = self
            .with_suggestions(&metadata)
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !child_indexes.contains(index))
            .map(|(_, task)| task)
            .collect();

        let start = parent_index - displacement + 1;
        for (offset, child) in childs.iter().enumerate() {
            next.insert(
                start + offset,
                Task {
                    parent: Some(parent.id.clone()),
                    ..child.clone()
                },
            );
        }

        Ok(self.commit(next, ChangeDescriptor::MoveTaskInside, metadata))
    }

    /// Insert `descendants` right after `parent`
    ///
    /// Descendants whose parent is not part of the batch are attached to
    /// `parent`; the rest keep their in-batch parent.
    pub fn add_tasks(&mut self, parent: &Task, descendants: &[Task]) -> Result<TaskChange> {
        let metadata = self.metadata(&ChangeAction::AddChilds {
            parent: parent.clone(),
            descendants: descendants.to_vec(),
        })?;
        let parent_index = first_index(&metadata, parent)?;

        let added: HashSet<&str> = descendants.iter().map(|t| t.id.as_str()).collect();
        let mut next = self.with_suggestions(&metadata);
        for (offset, descendant) in descendants.iter().enumerate() {
            let mut task = descendant.clone();
            task.comparison_level = parent.comparison_level;
            if !task.parent.as_deref().is_some_and(|p| added.contains(p)) {
                task.parent = Some(parent.id.clone());
            }
            next.insert(parent_index + 1 + offset, task);
        }

        Ok(self.commit(next, ChangeDescriptor::AddTasks, metadata))
    }

    /// Append a root task; empty placeholders are not added
    pub fn add_root(&mut self, task: Task) -> Option<TaskChange> {
        if task.task_type == TaskType::Empty {
            return None;
        }
        let mut next = self.tasks.clone();
        next.push(task);
        Some(self.commit(next, ChangeDescriptor::AddRoot, ChangeMetadata::default()))
    }

    /// Add under `parent` when it is part of the list, as a root otherwise
    pub fn add_task(&mut self, parent: Option<&Task>, task: Task) -> Result<Option<TaskChange>> {
        let lookup = TaskLookup::new(&self.tasks);
        match parent.filter(|p| lookup.contains(p.comparison_level, &p.id)) {
            Some(parent) => self.add_tasks(parent, &[task]).map(Some),
            None => Ok(self.add_root(task)),
        }
    }

    pub fn fix_start_position(&mut self, task: &Task, date: NaiveDateTime) -> Result<TaskChange> {
        let index = self.index_of(task)?;
        let mut next = self.tasks.clone();
        next[index] = task.with_dates(date, task.end);
        Ok(self.commit(next, ChangeDescriptor::FixStartPosition, ChangeMetadata::default()))
    }

    pub fn fix_end_position(&mut self, task: &Task, date: NaiveDateTime) -> Result<TaskChange> {
        let index = self.index_of(task)?;
        let mut next = self.tasks.clone();
        next[index] = task.with_dates(task.start, date);
        Ok(self.commit(next, ChangeDescriptor::FixEndPosition, ChangeMetadata::default()))
    }

    /// Shift a task by `delta` to resolve a dependency warning
    pub fn fix_dependency_position(&mut self, task: &Task, delta: TimeDelta) -> Result<TaskChange> {
        let shifted = task.shifted(delta);
        let metadata = self.metadata(&ChangeAction::Change { task: shifted.clone() })?;
        let index = first_index(&metadata, task)?;

        let mut next = self.with_suggestions(&metadata);
        next[index] = shifted;
        Ok(self.commit(next, ChangeDescriptor::FixDependencyPosition, metadata))
    }

    /// Create the relation `from -> to`
    ///
    /// Replaces any dependency of `to` on the same source and drops a
    /// reverse dependency of `from` on `to`. Refused (`None`) across levels,
    /// between a task and its ancestor, or for a kind that is not
    /// authorized.
    pub fn relation_change(
        &mut self,
        from: (&Task, DateExtremity),
        to: (&Task, DateExtremity),
    ) -> Result<Option<TaskChange>> {
        let ((task_from, source_target), (task_to, own_target)) = (from, to);
        let kind = RelationKind::from_targets(source_target, own_target);
        if !self.config.authorized_relations.contains(&kind)
            || task_from.comparison_level != task_to.comparison_level
            || task_from.id == task_to.id
        {
            return Ok(None);
        }

        let lookup = TaskLookup::new(&self.tasks);
        let from_index = lookup.index_of(task_from.comparison_level, &task_from.id)?;
        let to_index = lookup.index_of(task_to.comparison_level, &task_to.id)?;
        if lookup.is_descendant(task_from, task_to)? || lookup.is_descendant(task_to, task_from)? {
            return Ok(None);
        }

        let mut next = self.tasks.clone();
        let dependent = &mut next[to_index];
        dependent.dependencies.retain(|d| d.source_id != task_from.id);
        dependent
            .dependencies
            .push(Dependency::new(task_from.id.clone(), source_target, own_target));
        next[from_index]
            .dependencies
            .retain(|d| d.source_id != task_to.id);

        Ok(Some(self.commit(next, ChangeDescriptor::RelationChange, ChangeMetadata::default())))
    }

    /// Remove the relation `from -> to` (arrow double click)
    pub fn delete_relation(&mut self, task_from: &Task, task_to: &Task) -> Result<Option<TaskChange>> {
        let task_from_index = self.index_of(task_from)?;
        let task_to_index = self.index_of(task_to)?;
        if !self.config.is_delete_dependency_on_double_click {
            return Ok(None);
        }

        let mut next = self.tasks.clone();
        next[task_to_index]
            .dependencies
            .retain(|d| d.source_id != task_from.id);

        let payload = DeleteRelationPayload {
            task_from: task_from.clone(),
            task_from_index,
            task_to: next[task_to_index].clone(),
            task_to_index,
        };
        Ok(Some(self.commit(
            next,
            ChangeDescriptor::DeleteRelation(payload),
            ChangeMetadata::default(),
        )))
    }

    fn expand_with(&mut self, hide_children: impl Fn(&Task) -> bool) -> TaskChange {
        let next = self
            .tasks
            .iter()
            .map(|task| Task {
                hide_children: hide_children(task),
                ..task.clone()
            })
            .collect();
        self.commit(next, ChangeDescriptor::ExpandState, ChangeMetadata::default())
    }

    pub fn toggle_expand(&mut self, task: &Task) -> Result<TaskChange> {
        let index = self.index_of(task)?;
        let hidden = !self.tasks[index].hide_children;
        let mut next = self.tasks.clone();
        next[index].hide_children = hidden;
        Ok(self.commit(next, ChangeDescriptor::ExpandState, ChangeMetadata::default()))
    }

    pub fn collapse_all(&mut self) -> TaskChange {
        self.expand_with(|_| true)
    }

    pub fn expand_all(&mut self) -> TaskChange {
        self.expand_with(|_| false)
    }

    /// Open the roots, collapse everything below them
    pub fn expand_first_level(&mut self) -> TaskChange {
        self.expand_with(|task| task.parent.is_some())
    }

    /// Paste the clipboard under `target`
    ///
    /// Cut tasks are moved inside; copied tasks are duplicated with fresh
    /// ids and added as children. `None` with an empty clipboard.
    pub fn paste(&mut self, target: &Task) -> Result<Option<TaskChange>> {
        let cut = self.selection.cut_tasks(&self.tasks);
        if !cut.is_empty() {
            let change = self.move_tasks_inside(target, &cut)?;
            self.selection.reset_clipboard();
            return Ok(Some(change));
        }

        let copied = self.selection.copied_tasks(&self.tasks);
        if copied.is_empty() {
            return Ok(None);
        }
        let lookup = TaskLookup::new(&self.tasks);
        let copies = copy_tasks(&copied, |level, id| lookup.contains(level, id));
        self.add_tasks(target, &copies).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Modifiers;
    use crate::test_support::day;
    use crate::types::Calendar;
    use pretty_assertions::assert_eq;

    fn ids(tasks: &[Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    fn all_days() -> GanttConfig {
        GanttConfig {
            calendar: Calendar::all_days(),
            ..GanttConfig::default()
        }
    }

    fn flat() -> Vec<Task> {
        ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let start = day(2024, 1, 1 + i as u32 * 2);
                Task::new(*id, start, start + TimeDelta::days(1))
            })
            .collect()
    }

    #[test]
    fn date_change_commits_cascade() {
        let tasks = vec![
            Task::new("A", day(2024, 1, 1), day(2024, 1, 5)),
            Task::new("B", day(2024, 1, 6), day(2024, 1, 10))
                .with_dependency(Dependency::finish_to_start("A")),
        ];
        let mut state = GanttState::new(tasks, all_days());
        let original = state.tasks()[0].clone();
        let changed = original.with_dates(original.start, day(2024, 1, 8));

        let change = state
            .date_change(BarMoveAction::End, &changed, &original)
            .unwrap();

        assert_eq!(change.descriptor, ChangeDescriptor::DateChangeCascade);
        assert_eq!(change.tasks[0].end, day(2024, 1, 8));
        assert_eq!(change.tasks[1].start, day(2024, 1, 9));
        assert_eq!(change.tasks[1].end, day(2024, 1, 13));
        assert_eq!(state.tasks(), &change.tasks[..]);
    }

    #[test]
    fn moves_splice_like_a_list() {
        let mut state = GanttState::new(flat(), all_days());
        let tasks = state.tasks().to_vec();

        let change = state.move_task_after(&tasks[3], &tasks[0]).unwrap().unwrap();
        assert_eq!(ids(&change.tasks), vec!["b", "c", "d", "a"]);

        let tasks = state.tasks().to_vec();
        let change = state.move_task_before(&tasks[0], &tasks[3]).unwrap().unwrap();
        assert_eq!(ids(&change.tasks), vec!["a", "b", "c", "d"]);

        let tasks = state.tasks().to_vec();
        let change = state.move_task_before(&tasks[3], &tasks[1]).unwrap().unwrap();
        assert_eq!(ids(&change.tasks), vec!["a", "c", "b", "d"]);

        let tasks = state.tasks().to_vec();
        assert!(state.move_task_after(&tasks[1], &tasks[1]).unwrap().is_none());
    }

    #[test]
    fn move_inside_places_rows_after_parent() {
        let mut config = all_days();
        config.expand_parents_to_fit_children = false;
        let mut state = GanttState::new(flat(), config);
        let tasks = state.tasks().to_vec();

        let change = state
            .move_tasks_inside(&tasks[2], &[tasks[0].clone(), tasks[3].clone()])
            .unwrap();
        assert_eq!(ids(&change.tasks), vec!["b", "c", "a", "d"]);
        assert_eq!(change.tasks[2].parent.as_deref(), Some("c"));
        assert_eq!(change.tasks[3].parent.as_deref(), Some("c"));
    }

    #[test]
    fn move_under_own_descendant_is_refused() {
        let tasks = vec![
            Task::new("p", day(2024, 1, 1), day(2024, 1, 5)),
            Task::new("c", day(2024, 1, 1), day(2024, 1, 2)).with_parent("p"),
        ];
        let mut state = GanttState::new(tasks.clone(), all_days());
        assert!(matches!(
            state.move_tasks_inside(&tasks[1], &[tasks[0].clone()]),
            Err(GanttError::CycleDetected { .. })
        ));
        assert_eq!(state.tasks(), &tasks[..]);
    }

    #[test]
    fn delete_drops_subtree_and_links() {
        let tasks = vec![
            Task::new("p", day(2024, 1, 1), day(2024, 1, 5)),
            Task::new("c1", day(2024, 1, 1), day(2024, 1, 2)).with_parent("p"),
            Task::new("c2", day(2024, 1, 3), day(2024, 1, 5)).with_parent("p"),
            Task::new("x", day(2024, 1, 6), day(2024, 1, 7))
                .with_dependency(Dependency::finish_to_start("c2")),
        ];
        let mut state = GanttState::new(tasks.clone(), all_days());

        let change = state.delete_tasks(&tasks[..1]).unwrap();
        assert_eq!(ids(&change.tasks), vec!["x"]);
        assert!(change.tasks[0].dependencies.is_empty());
        match change.descriptor {
            ChangeDescriptor::DeleteTask(payload) => assert_eq!(payload.task_indexes, vec![0, 1, 2]),
            other => panic!("unexpected descriptor {:?}", other),
        }
    }

    #[test]
    fn add_children_after_parent() {
        let mut state = GanttState::new(flat(), all_days());
        let tasks = state.tasks().to_vec();
        let child = Task::new("n", day(2024, 1, 3), day(2024, 1, 4));
        let grandchild = Task::new("m", day(2024, 1, 3), day(2024, 1, 4)).with_parent("n");

        let change = state.add_tasks(&tasks[1], &[child, grandchild]).unwrap();
        assert_eq!(ids(&change.tasks), vec!["a", "b", "n", "m", "c", "d"]);
        assert_eq!(change.tasks[2].parent.as_deref(), Some("b"));
        assert_eq!(change.tasks[3].parent.as_deref(), Some("n"));

        let ghost = Task::new("ghost", day(2024, 1, 1), day(2024, 1, 2));
        let root = Task::new("r", day(2024, 1, 1), day(2024, 1, 2));
        let change = state.add_task(Some(&ghost), root).unwrap().unwrap();
        assert_eq!(change.descriptor, ChangeDescriptor::AddRoot);
        assert!(state.add_root(Task::empty("e")).is_none());
    }

    #[test]
    fn relation_rules() {
        let tasks = vec![
            Task::new("p", day(2024, 1, 1), day(2024, 1, 5)),
            Task::new("c", day(2024, 1, 1), day(2024, 1, 2)).with_parent("p"),
            Task::new("x", day(2024, 1, 3), day(2024, 1, 4))
                .with_dependency(Dependency::finish_to_start("y")),
            Task::new("y", day(2024, 1, 6), day(2024, 1, 7)),
        ];
        let mut config = all_days();
        config.authorized_relations = vec![RelationKind::EndToStart, RelationKind::StartToStart];
        let mut state = GanttState::new(tasks.clone(), config);

        let end = DateExtremity::EndOfTask;
        let start = DateExtremity::StartOfTask;

        // ancestor pair and unauthorized kind
        assert!(state.relation_change((&tasks[0], end), (&tasks[1], start)).unwrap().is_none());
        assert!(state.relation_change((&tasks[2], end), (&tasks[3], end)).unwrap().is_none());

        let change = state
            .relation_change((&tasks[2], end), (&tasks[3], start))
            .unwrap()
            .unwrap();
        assert!(change.tasks[2].dependencies.is_empty());
        assert_eq!(change.tasks[3].dependencies, vec![Dependency::finish_to_start("x")]);

        let tasks = state.tasks().to_vec();
        let change = state.delete_relation(&tasks[2], &tasks[3]).unwrap().unwrap();
        assert!(change.tasks[3].dependencies.is_empty());
    }

    #[test]
    fn expand_state_variants() {
        let tasks = vec![
            Task::new("p", day(2024, 1, 1), day(2024, 1, 5)),
            Task::new("c", day(2024, 1, 1), day(2024, 1, 2)).with_parent("p"),
        ];
        let mut state = GanttState::new(tasks.clone(), all_days());

        let flags = |change: &TaskChange| -> Vec<bool> { change.tasks.iter().map(|t| t.hide_children).collect() };
        assert_eq!(flags(&state.collapse_all()), vec![true, true]);
        assert_eq!(flags(&state.expand_first_level()), vec![false, true]);
        assert_eq!(flags(&state.expand_all()), vec![false, false]);
        assert_eq!(flags(&state.toggle_expand(&tasks[0]).unwrap()), vec![true, false]);
    }

    #[test]
    fn paste_copies_under_target() {
        let mut state = GanttState::new(flat(), all_days());
        let tasks = state.tasks().to_vec();
        let visible: Vec<&Task> = tasks.iter().collect();

        state
            .selection
            .select_on_mouse_down(&tasks[0], Modifiers::default(), &visible);
        state.selection.copy_selected();
        let change = state.paste(&tasks[3]).unwrap().unwrap();
        assert_eq!(ids(&change.tasks), vec!["a", "b", "c", "d", "a-copy"]);
        assert_eq!(change.tasks[4].parent.as_deref(), Some("d"));

        state.selection.cut_task(&tasks[1]);
        let change = state.paste(&tasks[0]).unwrap().unwrap();
        assert_eq!(ids(&change.tasks), vec!["a", "b", "c", "d", "a-copy"]);
        assert_eq!(change.tasks[1].parent.as_deref(), Some("a"));
        assert!(!state.selection.has_clipboard());
    }

    #[test]
    fn descriptor_wire_format() {
        let json = serde_json::to_value(ChangeDescriptor::AddRoot).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "add_root" }));

        let json = serde_json::to_value(ChangeDescriptor::DeleteTask(DeletePayload {
            tasks: Vec::new(),
            task_indexes: vec![1],
        }))
        .unwrap();
        assert_eq!(json["payload"]["taskIndexes"], serde_json::json!([1]));
    }
}
