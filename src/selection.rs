//! Selection and clipboard state
//!
//! Selection, copy and cut are kept as id mirrors per comparison level so
//! task values never carry UI flags.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{LevelMap, Task, TaskKey};

/// Modifier keys held on mouse down
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    selected: LevelMap<HashSet<String>>,
    copied: LevelMap<HashSet<String>>,
    cut: LevelMap<HashSet<String>>,
    #[serde(skip)]
    anchor: Option<TaskKey>,
}

fn contains(mirror: &LevelMap<HashSet<String>>, task: &Task) -> bool {
    mirror
        .get(&task.comparison_level)
        .is_some_and(|ids| ids.contains(&task.id))
}

fn insert(mirror: &mut LevelMap<HashSet<String>>, task: &Task) {
    mirror
        .entry(task.comparison_level)
        .or_default()
        .insert(task.id.clone());
}

/// Tasks of `tasks` present in the mirror, in list order
fn pick(mirror: &LevelMap<HashSet<String>>, tasks: &[Task]) -> Vec<Task> {
    tasks.iter().filter(|t| contains(mirror, t)).cloned().collect()
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, task: &Task) -> bool {
        contains(&self.selected, task)
    }

    pub fn is_copied(&self, task: &Task) -> bool {
        contains(&self.copied, task)
    }

    pub fn is_cut(&self, task: &Task) -> bool {
        contains(&self.cut, task)
    }

    pub fn has_clipboard(&self) -> bool {
        !self.copied.is_empty() || !self.cut.is_empty()
    }

    /// Select on mouse down
    ///
    /// A plain click replaces the selection, ctrl toggles the task and shift
    /// selects the rows between the last clicked task and this one on the
    /// same level. `visible` is the render order.
    pub fn select_on_mouse_down(&mut self, task: &Task, modifiers: Modifiers, visible: &[&Task]) {
        if modifiers.shift {
            if let Some(range) = self.shift_range(task, visible) {
                let level = self.selected.entry(task.comparison_level).or_default();
                level.clear();
                level.extend(range);
                return;
            }
        }

        if modifiers.ctrl {
            let level = self.selected.entry(task.comparison_level).or_default();
            if !level.remove(&task.id) {
                level.insert(task.id.clone());
            }
        } else {
            self.selected.clear();
            insert(&mut self.selected, task);
        }
        self.anchor = Some(task.key());
    }

    fn shift_range(&self, task: &Task, visible: &[&Task]) -> Option<Vec<String>> {
        let (level, anchor_id) = self.anchor.as_ref()?;
        if *level != task.comparison_level {
            return None;
        }

        let on_level: Vec<&Task> = visible
            .iter()
            .copied()
            .filter(|t| t.comparison_level == *level)
            .collect();
        let from = on_level.iter().position(|t| t.id == *anchor_id)?;
        let to = on_level.iter().position(|t| t.id == task.id)?;
        let (lo, hi) = if from <= to { (from, to) } else { (to, from) };

        Some(on_level[lo..=hi].iter().map(|t| t.id.clone()).collect())
    }

    pub fn selected_tasks(&self, tasks: &[Task]) -> Vec<Task> {
        pick(&self.selected, tasks)
    }

    pub fn copied_tasks(&self, tasks: &[Task]) -> Vec<Task> {
        pick(&self.copied, tasks)
    }

    pub fn cut_tasks(&self, tasks: &[Task]) -> Vec<Task> {
        pick(&self.cut, tasks)
    }

    pub fn copy_task(&mut self, task: &Task) {
        self.cut.clear();
        self.copied.clear();
        insert(&mut self.copied, task);
    }

    pub fn copy_selected(&mut self) {
        self.cut.clear();
        self.copied = self.selected.clone();
    }

    pub fn cut_task(&mut self, task: &Task) {
        self.copied.clear();
        self.cut.clear();
        insert(&mut self.cut, task);
    }

    pub fn cut_selected(&mut self) {
        self.copied.clear();
        self.cut = self.selected.clone();
    }

    pub fn reset_selection(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    pub fn reset_clipboard(&mut self) {
        self.copied.clear();
        self.cut.clear();
    }

    pub fn reset(&mut self) {
        self.reset_selection();
        self.reset_clipboard();
    }

    /// Drop every mirror entry for removed tasks
    pub fn forget(&mut self, removed: &[Task]) {
        for task in removed {
            for mirror in [&mut self.selected, &mut self.copied, &mut self.cut] {
                if let Some(ids) = mirror.get_mut(&task.comparison_level) {
                    ids.remove(&task.id);
                    if ids.is_empty() {
                        mirror.remove(&task.comparison_level);
                    }
                }
            }
            if self.anchor.as_ref() == Some(&task.key()) {
                self.anchor = None;
            }
        }
    }
}

/// Copy of `tasks` with fresh ids
///
/// New ids are `<id>-copy`, then `<id>-copy-2` and so on, unique against
/// `exists` and the batch itself. Parents and dependencies pointing inside
/// the batch are remapped; links to tasks outside are kept as they are.
pub fn copy_tasks<F>(tasks: &[Task], exists: F) -> Vec<Task>
where
    F: Fn(u32, &str) -> bool,
{
    let mut taken: HashSet<TaskKey> = HashSet::new();
    let mut renamed: HashMap<TaskKey, String> = HashMap::new();

    for task in tasks {
        let level = task.comparison_level;
        let base = format!("{}-copy", task.id);
        let mut candidate = base.clone();
        let mut n = 2;
        while exists(level, &candidate) || taken.contains(&(level, candidate.clone())) {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        taken.insert((level, candidate.clone()));
        renamed.insert(task.key(), candidate);
    }

    tasks
        .iter()
        .map(|task| {
            let level = task.comparison_level;
            let mut copy = task.clone();
            if let Some(id) = renamed.get(&task.key()) {
                copy.id = id.clone();
            }
            if let Some(parent) = &task.parent {
                if let Some(id) = renamed.get(&(level, parent.clone())) {
                    copy.parent = Some(id.clone());
                }
            }
            for dependency in &mut copy.dependencies {
                if let Some(id) = renamed.get(&(level, dependency.source_id.clone())) {
                    dependency.source_id = id.clone();
                }
            }
            copy
        })
        .collect()
}
