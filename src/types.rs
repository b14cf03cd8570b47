//! Type definitions for the Gantt scheduling engine
//!
//! These types mirror the task objects the JS rendering layer hands over.
//! IMPORTANT: Field names use camelCase via serde rename to match JS

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::date_utils::serde_date;

/// Comparison level used when a task does not carry one
pub const DEFAULT_COMPARISON_LEVEL: u32 = 1;

/// Per-comparison-level map. Levels iterate in ascending order.
pub type LevelMap<V> = BTreeMap<u32, V>;

/// Owned `(comparisonLevel, id)` key, used where a map outlives the snapshot borrow
pub type TaskKey = (u32, String);

/// Which endpoint of a task a dependency is attached to
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DateExtremity {
    StartOfTask,
    EndOfTask,
}

impl DateExtremity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateExtremity::StartOfTask => "startOfTask",
            DateExtremity::EndOfTask => "endOfTask",
        }
    }
}

/// Row type of a task
///
/// `Empty` rows are placeholders: they keep a place in the hierarchy but carry
/// no dates and are skipped by every date computation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskType {
    #[default]
    Task,
    Project,
    Milestone,
    Empty,
}

/// Relation kind, named after the (source endpoint, own endpoint) pair
///
/// `EndToStart` is the classic FS link, `StartToStart` SS, `EndToEnd` FF and
/// `StartToEnd` SF.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    StartToStart,
    StartToEnd,
    EndToStart,
    EndToEnd,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::StartToStart,
        RelationKind::StartToEnd,
        RelationKind::EndToStart,
        RelationKind::EndToEnd,
    ];

    pub fn from_targets(source_target: DateExtremity, own_target: DateExtremity) -> Self {
        match (source_target, own_target) {
            (DateExtremity::StartOfTask, DateExtremity::StartOfTask) => RelationKind::StartToStart,
            (DateExtremity::StartOfTask, DateExtremity::EndOfTask) => RelationKind::StartToEnd,
            (DateExtremity::EndOfTask, DateExtremity::StartOfTask) => RelationKind::EndToStart,
            (DateExtremity::EndOfTask, DateExtremity::EndOfTask) => RelationKind::EndToEnd,
        }
    }
}

/// Dependency link between tasks
///
/// Embedded in the dependent task; the source is referenced by id only and
/// resolved at the dependent's comparison level.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Task this one depends on
    pub source_id: String,

    /// Endpoint of the source task the link starts from
    #[serde(default = "default_source_target")]
    pub source_target: DateExtremity,

    /// Endpoint of the dependent task the link arrives at
    #[serde(default = "default_own_target")]
    pub own_target: DateExtremity,
}

impl Dependency {
    /// Finish-to-start link, the default kind
    pub fn finish_to_start(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            source_target: DateExtremity::EndOfTask,
            own_target: DateExtremity::StartOfTask,
        }
    }

    pub fn new(
        source_id: impl Into<String>,
        source_target: DateExtremity,
        own_target: DateExtremity,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_target,
            own_target,
        }
    }

    pub fn kind(&self) -> RelationKind {
        RelationKind::from_targets(self.source_target, self.own_target)
    }
}

fn default_source_target() -> DateExtremity {
    DateExtremity::EndOfTask
}

fn default_own_target() -> DateExtremity {
    DateExtremity::StartOfTask
}

fn default_comparison_level() -> u32 {
    DEFAULT_COMPARISON_LEVEL
}

/// Task entity - the atomic unit of the chart
///
/// Treated as an immutable value: every change produces a new copy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    // === Identity & Hierarchy ===
    /// Unique within a comparison level
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub task_type: TaskType,

    /// Independent overlay of the same id space (baseline vs. actual, ...)
    #[serde(default = "default_comparison_level")]
    pub comparison_level: u32,

    /// Parent task id at the same comparison level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    // === Scheduling ===
    /// Defaults to the epoch for empty rows, which never read it
    #[serde(default, with = "serde_date")]
    pub start: NaiveDateTime,

    #[serde(default, with = "serde_date")]
    pub end: NaiveDateTime,

    /// Percent complete, 0-100
    #[serde(default)]
    pub progress: f64,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    // === UI State ===
    #[serde(default)]
    pub hide_children: bool,

    /// Blocks direct edits; typically set on auto-computed parents
    #[serde(default)]
    pub is_disabled: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            task_type: TaskType::Task,
            comparison_level: DEFAULT_COMPARISON_LEVEL,
            parent: None,
            start,
            end,
            progress: 0.0,
            dependencies: Vec::new(),
            hide_children: false,
            is_disabled: false,
        }
    }

    /// Placeholder row without dates
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            task_type: TaskType::Empty,
            ..Self::new(id, NaiveDateTime::default(), NaiveDateTime::default())
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_level(mut self, comparison_level: u32) -> Self {
        self.comparison_level = comparison_level;
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_disabled = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.task_type == TaskType::Empty
    }

    pub fn key(&self) -> TaskKey {
        (self.comparison_level, self.id.clone())
    }

    pub fn is_same(&self, other: &Task) -> bool {
        self.comparison_level == other.comparison_level && self.id == other.id
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Copy with new dates
    pub fn with_dates(&self, start: NaiveDateTime, end: NaiveDateTime) -> Task {
        Task {
            start,
            end,
            ..self.clone()
        }
    }

    /// Copy moved by `delta`, duration preserved exactly
    pub fn shifted(&self, delta: TimeDelta) -> Task {
        self.with_dates(self.start + delta, self.end + delta)
    }

    pub fn date_of(&self, extremity: DateExtremity) -> NaiveDateTime {
        match extremity {
            DateExtremity::StartOfTask => self.start,
            DateExtremity::EndOfTask => self.end,
        }
    }
}

/// What the user is doing with a bar
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum BarMoveAction {
    Progress,
    End,
    Start,
    Move,
}

impl BarMoveAction {
    pub fn is_resize(&self) -> bool {
        matches!(self, BarMoveAction::Start | BarMoveAction::End)
    }
}

/// Time unit represented by one column
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    Hour,
    QuarterDay,
    HalfDay,
    #[default]
    Day,
    TwoDays,
    Week,
    Month,
    QuarterYear,
    Year,
}

/// Pixel distances of the chart
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Distances {
    pub column_width: f64,
    pub row_height: f64,
    /// Bar height as a percentage of the row height
    pub bar_fill: f64,
    /// Horizontal run of an arrow before it turns
    pub arrow_indent: f64,
}

impl Default for Distances {
    fn default() -> Self {
        Self {
            column_width: 60.0,
            row_height: 50.0,
            bar_fill: 60.0,
            arrow_indent: 20.0,
        }
    }
}

/// Calendar exception for a single date (`YYYY-MM-DD`)
///
/// A plain string is a named non-working day; the object form states
/// explicitly whether the day is worked.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum CalendarException {
    Holiday(String),
    Rule {
        working: bool,
        #[serde(default)]
        description: Option<String>,
    },
}

/// Calendar configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    /// Working days (0=Sun, 1=Mon, ..., 6=Sat)
    #[serde(default = "default_working_days")]
    pub working_days: Vec<u32>,

    /// Date-specific exceptions keyed by `YYYY-MM-DD`
    #[serde(default)]
    pub exceptions: HashMap<String, CalendarException>,
}

fn default_working_days() -> Vec<u32> {
    vec![1, 2, 3, 4, 5]
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            working_days: default_working_days(),
            exceptions: HashMap::new(),
        }
    }
}

impl Calendar {
    /// Every day of the week is worked and there are no exceptions
    pub fn all_days() -> Self {
        Self {
            working_days: (0..7).collect(),
            exceptions: HashMap::new(),
        }
    }
}

/// Pixel geometry of one task bar
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCoordinates {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
    /// Top of the task's row at its comparison level
    pub level_y: f64,
    pub width: f64,
    pub progress_width: f64,
    pub progress_x: f64,
}

/// Atomic proposed mutation: write `task` with `start`/`end` at `index`
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(with = "serde_date")]
    pub start: NaiveDateTime,
    #[serde(with = "serde_date")]
    pub end: NaiveDateTime,
    pub task: Task,
    /// Position in the flat task list
    pub index: usize,
}

impl Suggestion {
    pub fn for_task(task: Task, index: usize) -> Self {
        Self {
            start: task.start,
            end: task.end,
            task,
            index,
        }
    }

    /// Task as it should be written back
    pub fn applied(&self) -> Task {
        self.task.with_dates(self.start, self.end)
    }
}

/// Task paired with its position in the flat list
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskIndex {
    pub task: Task,
    pub index: usize,
}
