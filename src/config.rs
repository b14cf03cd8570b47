//! Chart configuration
//!
//! Every behaviour switch of the engine lives here as a named field with a
//! default, so hosts only send the fields they want to change.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Calendar, Distances, RelationKind, TaskType, ViewMode};

/// Unit of the rounding step used while dragging
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
}

/// Rounding granularity for dragged dates
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DateMoveStep {
    pub value: u32,
    pub time_unit: TimeUnit,
}

impl Default for DateMoveStep {
    fn default() -> Self {
        Self {
            value: 1,
            time_unit: TimeUnit::Day,
        }
    }
}

impl DateMoveStep {
    /// Step length; a zero value is treated as one unit
    pub fn duration(&self) -> TimeDelta {
        let value = i64::from(self.value.max(1));
        match self.time_unit {
            TimeUnit::Minute => TimeDelta::minutes(value),
            TimeUnit::Hour => TimeDelta::hours(value),
            TimeUnit::Day => TimeDelta::days(value),
        }
    }
}

/// Engine configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GanttConfig {
    // === Time scale & geometry ===
    /// Time unit represented by one column
    pub view_mode: ViewMode,

    /// Mirror x coordinates for right-to-left layouts
    pub rtl: bool,

    /// Number of comparison levels stacked in one visible row
    pub comparison_levels: u32,

    /// Columns rendered before the earliest task
    pub pre_steps_count: u32,

    pub distances: Distances,

    /// Granularity of the default rounding policy
    pub date_move_step: DateMoveStep,

    // === Change policies ===
    /// Descendants shift together with a moved parent
    pub is_move_childs_with_parent: bool,

    /// Disabled parents re-span to exactly cover their children
    pub is_update_disabled_parents_on_change: bool,

    /// Date changes propagate transitively through dependents
    pub cascade_dependencies: bool,

    /// Dragged dates snap away from holidays
    pub is_adjust_to_working_dates: bool,

    /// Resizing a parent cannot cut into its children
    pub fit_start_end_to_parent: bool,

    /// Task types the parent fit applies to
    pub allowed_types_for_fit_move: Vec<TaskType>,

    /// Non-disabled parents of allowed types grow to cover their children
    pub expand_parents_to_fit_children: bool,

    /// Ancestors' progress is recomputed from their children
    pub roll_up_progress: bool,

    /// Progress roll-up is weighted by child duration
    pub weighted_progress: bool,

    // === Derived overlays ===
    pub is_show_critical_path: bool,
    pub is_show_dependency_warnings: bool,
    pub is_show_child_out_of_parent_warnings: bool,

    // === Relations ===
    /// Double-clicking an arrow removes the relation
    pub is_delete_dependency_on_double_click: bool,

    /// Relation kinds a user may create by dragging
    pub authorized_relations: Vec<RelationKind>,

    /// Default holiday policy when the host supplies none
    pub calendar: Calendar,
}

impl Default for GanttConfig {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Day,
            rtl: false,
            comparison_levels: 1,
            pre_steps_count: 1,
            distances: Distances::default(),
            date_move_step: DateMoveStep::default(),
            is_move_childs_with_parent: true,
            is_update_disabled_parents_on_change: true,
            cascade_dependencies: true,
            is_adjust_to_working_dates: true,
            fit_start_end_to_parent: true,
            allowed_types_for_fit_move: vec![TaskType::Project],
            expand_parents_to_fit_children: true,
            roll_up_progress: false,
            weighted_progress: true,
            is_show_critical_path: false,
            is_show_dependency_warnings: false,
            is_show_child_out_of_parent_warnings: false,
            is_delete_dependency_on_double_click: true,
            authorized_relations: RelationKind::ALL.to_vec(),
            calendar: Calendar::default(),
        }
    }
}

impl GanttConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn full_row_height(&self) -> f64 {
        self.distances.row_height * f64::from(self.comparison_levels.max(1))
    }

    pub fn task_height(&self) -> f64 {
        self.distances.row_height * self.distances.bar_fill / 100.0
    }

    pub fn task_y_offset(&self) -> f64 {
        (self.distances.row_height - self.task_height()) / 2.0
    }

    pub fn is_fit_type(&self, task_type: TaskType) -> bool {
        self.allowed_types_for_fit_move.contains(&task_type)
    }

    /// Margins are only needed by the overlays that display them
    pub fn needs_margins(&self) -> bool {
        self.is_show_critical_path || self.is_show_dependency_warnings
    }
}
