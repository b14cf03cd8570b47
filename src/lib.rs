//! Gantt Engine - scheduling and layout core for Gantt charts
//!
//! Maintains a hierarchical task forest per comparison level, maps tasks to
//! rows and pixel coordinates, propagates date changes through parents,
//! children and dependencies, and computes the critical path. The crate is
//! usable as a plain Rust library (see [`engine_state::GanttState`]) and
//! exposes a `GanttEngine` class to JavaScript through `wasm-bindgen`.
//!
//! ## Usage from JavaScript
//!
//! ```javascript
//! import init, { GanttEngine } from 'gantt_engine';
//!
//! await init();
//! const engine = new GanttEngine();
//! engine.initialize(tasks, { viewMode: 'day', cascadeDependencies: true });
//! const frame = engine.layout();
//! const change = engine.onDateChange('end', changedTask, originalTask);
//! render(change.tasks);
//! ```
//!
//! Dates cross the boundary as ISO strings (`2024-01-05T00:00:00`) or epoch
//! milliseconds.

pub mod cascade;
pub mod change_metadata;
pub mod config;
pub mod coordinates;
pub mod critical_path;
pub mod date_utils;
pub mod dependencies;
pub mod engine_state;
pub mod error;
pub mod fit;
pub mod hierarchy;
pub mod layout;
pub mod selection;
pub mod types;
pub mod visibility;
pub mod working_dates;
mod utils;

#[cfg(test)]
mod test_support;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use crate::config::GanttConfig;
pub use crate::engine_state::{ChangeDescriptor, GanttState, TaskChange};
pub use crate::error::{GanttError, Result};
pub use crate::layout::{GanttLayout, RenderFrame};
pub use crate::types::{BarMoveAction, DateExtremity, Dependency, Task, TaskType, ViewMode};

use crate::date_utils::format_date;
use crate::working_dates::{DateSetup, HolidayPolicy};

// Import console.log for debugging
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    fn warn(s: &str);
}

/// Log macro for console output
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::log(&format_args!($($t)*).to_string()))
}

fn from_js<T: DeserializeOwned>(value: JsValue, what: &str) -> std::result::Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Failed to deserialize {}: {}", what, e)))
}

fn to_js<T: Serialize>(value: &T, what: &str) -> std::result::Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize {}: {}", what, e)))
}

fn js_error(err: GanttError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn change_to_js(change: Option<TaskChange>) -> std::result::Result<JsValue, JsValue> {
    match change {
        Some(change) => to_js(&change, "change"),
        None => Ok(JsValue::NULL),
    }
}

/// Holiday check backed by a JS function `(isoDate, extremity) => boolean`
struct JsHolidayCheck(js_sys::Function);

impl HolidayPolicy for JsHolidayCheck {
    fn is_holiday(&self, date: NaiveDateTime, _setup: &DateSetup, extremity: DateExtremity) -> bool {
        let date = JsValue::from_str(&format_date(&date));
        let extremity = JsValue::from_str(extremity.as_str());
        match self.0.call2(&JsValue::NULL, &date, &extremity) {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(_) => {
                warn("[WASM] holiday check threw, treating the day as worked");
                false
            }
        }
    }
}

/// The Gantt engine exposed to JavaScript
///
/// Holds the committed task list and config. Every mutating call commits
/// the next list internally and returns `{ tasks, descriptor, metadata }`;
/// refused gestures return `null`.
#[wasm_bindgen]
pub struct GanttEngine {
    state: GanttState,
    initialized: bool,
}

impl GanttEngine {
    fn ensure_initialized(&self) -> std::result::Result<(), JsValue> {
        if self.initialized {
            Ok(())
        } else {
            Err(JsValue::from_str("Engine not initialized"))
        }
    }
}

#[wasm_bindgen]
impl GanttEngine {
    /// Create a new GanttEngine instance
    #[wasm_bindgen(constructor)]
    pub fn new() -> GanttEngine {
        utils::set_panic_hook();
        log("[WASM] GanttEngine created");
        GanttEngine {
            state: GanttState::default(),
            initialized: false,
        }
    }

    /// Initialize the engine with tasks and an optional config
    pub fn initialize(&mut self, tasks_val: JsValue, config_val: JsValue) -> std::result::Result<(), JsValue> {
        let tasks: Vec<Task> = from_js(tasks_val, "tasks")?;
        let config: GanttConfig = if config_val.is_undefined() || config_val.is_null() {
            GanttConfig::default()
        } else {
            from_js(config_val, "config")?
        };

        self.state.load_tasks(tasks);
        self.state.set_config(config);
        self.initialized = true;

        console_log!("[WASM] Engine initialized with {} tasks", self.state.task_count());
        Ok(())
    }

    /// Sync all tasks (bulk replace)
    #[wasm_bindgen(js_name = syncTasks)]
    pub fn sync_tasks(&mut self, tasks_val: JsValue) -> std::result::Result<(), JsValue> {
        let tasks: Vec<Task> = from_js(tasks_val, "tasks")?;
        self.state.load_tasks(tasks);
        console_log!("[WASM] Synced {} tasks", self.state.task_count());
        Ok(())
    }

    #[wasm_bindgen(js_name = updateConfig)]
    pub fn update_config(&mut self, config_val: JsValue) -> std::result::Result<(), JsValue> {
        let config: GanttConfig = from_js(config_val, "config")?;
        self.state.set_config(config);
        log("[WASM] Config updated");
        Ok(())
    }

    /// Replace the calendar with a JS predicate; `null` restores it
    #[wasm_bindgen(js_name = setHolidayCheck)]
    pub fn set_holiday_check(&mut self, check: Option<js_sys::Function>) {
        self.state
            .set_holiday_policy(check.map(|f| Box::new(JsHolidayCheck(f)) as Box<dyn HolidayPolicy>));
    }

    /// Render frame of the current list
    pub fn layout(&self) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let layout = self.state.layout().map_err(js_error)?;
        to_js(&layout.render_frame(), "layout")
    }

    #[wasm_bindgen(js_name = onDateChange)]
    pub fn on_date_change(
        &mut self,
        action_val: JsValue,
        changed_val: JsValue,
        original_val: JsValue,
    ) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let action: BarMoveAction = from_js(action_val, "action")?;
        let changed: Task = from_js(changed_val, "task")?;
        let original: Task = from_js(original_val, "task")?;

        let change = self
            .state
            .date_change(action, &changed, &original)
            .map_err(js_error)?;
        to_js(&change, "change")
    }

    #[wasm_bindgen(js_name = onProgressChange)]
    pub fn on_progress_change(&mut self, task_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let task: Task = from_js(task_val, "task")?;
        let change = self.state.progress_change(&task).map_err(js_error)?;
        to_js(&change, "change")
    }

    #[wasm_bindgen(js_name = editTask)]
    pub fn edit_task(&mut self, task_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let task: Task = from_js(task_val, "task")?;
        let change = self.state.edit_task(&task).map_err(js_error)?;
        to_js(&change, "change")
    }

    #[wasm_bindgen(js_name = deleteTasks)]
    pub fn delete_tasks(&mut self, tasks_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let tasks: Vec<Task> = from_js(tasks_val, "tasks")?;
        let change = self.state.delete_tasks(&tasks).map_err(js_error)?;
        to_js(&change, "change")
    }

    #[wasm_bindgen(js_name = moveTaskBefore)]
    pub fn move_task_before(&mut self, target_val: JsValue, task_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let target: Task = from_js(target_val, "target")?;
        let task: Task = from_js(task_val, "task")?;
        change_to_js(self.state.move_task_before(&target, &task).map_err(js_error)?)
    }

    #[wasm_bindgen(js_name = moveTaskAfter)]
    pub fn move_task_after(&mut self, target_val: JsValue, task_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let target: Task = from_js(target_val, "target")?;
        let task: Task = from_js(task_val, "task")?;
        change_to_js(self.state.move_task_after(&target, &task).map_err(js_error)?)
    }

    #[wasm_bindgen(js_name = moveTasksInside)]
    pub fn move_tasks_inside(&mut self, parent_val: JsValue, childs_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let parent: Task = from_js(parent_val, "parent")?;
        let childs: Vec<Task> = from_js(childs_val, "tasks")?;
        let change = self.state.move_tasks_inside(&parent, &childs).map_err(js_error)?;
        to_js(&change, "change")
    }

    #[wasm_bindgen(js_name = addChilds)]
    pub fn add_childs(&mut self, parent_val: JsValue, descendants_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let parent: Task = from_js(parent_val, "parent")?;
        let descendants: Vec<Task> = from_js(descendants_val, "tasks")?;
        let change = self.state.add_tasks(&parent, &descendants).map_err(js_error)?;
        to_js(&change, "change")
    }

    /// Add a task under `parent`, or as a root when `parent` is null or unknown
    #[wasm_bindgen(js_name = addTask)]
    pub fn add_task(&mut self, parent_val: JsValue, task_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let parent: Option<Task> = from_js(parent_val, "parent")?;
        let task: Task = from_js(task_val, "task")?;
        change_to_js(self.state.add_task(parent.as_ref(), task).map_err(js_error)?)
    }

    #[wasm_bindgen(js_name = relationChange)]
    pub fn relation_change(
        &mut self,
        from_val: JsValue,
        from_target: JsValue,
        to_val: JsValue,
        to_target: JsValue,
    ) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let from: Task = from_js(from_val, "task")?;
        let from_target: DateExtremity = from_js(from_target, "target")?;
        let to: Task = from_js(to_val, "task")?;
        let to_target: DateExtremity = from_js(to_target, "target")?;

        change_to_js(
            self.state
                .relation_change((&from, from_target), (&to, to_target))
                .map_err(js_error)?,
        )
    }

    #[wasm_bindgen(js_name = deleteRelation)]
    pub fn delete_relation(&mut self, from_val: JsValue, to_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let from: Task = from_js(from_val, "task")?;
        let to: Task = from_js(to_val, "task")?;
        change_to_js(self.state.delete_relation(&from, &to).map_err(js_error)?)
    }

    #[wasm_bindgen(js_name = toggleExpand)]
    pub fn toggle_expand(&mut self, task_val: JsValue) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        let task: Task = from_js(task_val, "task")?;
        let change = self.state.toggle_expand(&task).map_err(js_error)?;
        to_js(&change, "change")
    }

    #[wasm_bindgen(js_name = collapseAll)]
    pub fn collapse_all(&mut self) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        to_js(&self.state.collapse_all(), "change")
    }

    #[wasm_bindgen(js_name = expandAll)]
    pub fn expand_all(&mut self) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        to_js(&self.state.expand_all(), "change")
    }

    #[wasm_bindgen(js_name = expandFirstLevel)]
    pub fn expand_first_level(&mut self) -> std::result::Result<JsValue, JsValue> {
        self.ensure_initialized()?;
        to_js(&self.state.expand_first_level(), "change")
    }

    /// Get all tasks as JavaScript array
    #[wasm_bindgen(js_name = getTasks)]
    pub fn get_tasks(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.state.tasks(), "tasks")
    }

    #[wasm_bindgen(js_name = taskCount)]
    pub fn task_count(&self) -> usize {
        self.state.task_count()
    }

    #[wasm_bindgen(js_name = isInitialized)]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Dispose and free resources
    pub fn dispose(&mut self) {
        self.state.clear();
        self.state.set_holiday_policy(None);
        self.initialized = false;
        log("[WASM] Engine disposed");
    }
}

impl Default for GanttEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Module initialization - called when WASM module is loaded
#[wasm_bindgen(start)]
pub fn main() {
    utils::set_panic_hook();
    log("[WASM] Gantt engine module loaded");
}
