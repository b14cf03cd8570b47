//! Error types for the Gantt engine
//!
//! Only programmer/integration errors and malformed host input are errors.
//! Dangling parent or source references are tolerated by the core and never
//! reach this type.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GanttError {
    /// No indexes exist for the comparison level
    #[error("indexes are not found for comparison level {0}")]
    LevelNotFound(u32),

    /// The referenced task is not part of the current task list
    #[error("index is not found for task \"{id}\" at comparison level {level}")]
    IndexNotFound { level: u32, id: String },

    /// A parent chain or hierarchy walk revisited a task
    #[error("cycle detected at task \"{id}\" (comparison level {level})")]
    CycleDetected { level: u32, id: String },

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GanttError {
    pub fn index_not_found(level: u32, id: impl Into<String>) -> Self {
        GanttError::IndexNotFound {
            level,
            id: id.into(),
        }
    }

    pub fn cycle(level: u32, id: impl Into<String>) -> Self {
        GanttError::CycleDetected {
            level,
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for GanttError {
    fn from(e: serde_json::Error) -> Self {
        GanttError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GanttError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_task() {
        let err = GanttError::index_not_found(2, "a");
        assert_eq!(
            err.to_string(),
            "index is not found for task \"a\" at comparison level 2"
        );
        assert_eq!(
            GanttError::cycle(1, "x").to_string(),
            "cycle detected at task \"x\" (comparison level 1)"
        );
    }

    #[test]
    fn json_errors_convert() {
        let err: GanttError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, GanttError::Serialization(_)));
    }
}
