//! Core types for the task board: storage-form records and view-form projections.
//!
//! Storage records mirror the remote store's collections (numeric foreign keys,
//! snake_case columns). View records are what presentation code consumes: every
//! foreign key resolved to a display name and multiplicities expanded.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of any record.
///
/// Server-assigned ids are positive. Temporary ids handed out by the sync
/// engine for optimistic records are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub i64);

impl Id {
    /// True for client-generated placeholder ids that the store has not confirmed.
    pub fn is_temporary(self) -> bool {
        self.0 < 0
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Id)
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Id(value)
    }
}

/// A project. `key` is the immutable prefix of human-readable task keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    /// Maintained by the store; the last sequence number used for a task key.
    pub current_task_number: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A named bucket partitioning a project's tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Id,
    pub project_id: Id,
    pub title: String,
    pub order_index: i64,
    pub color: Option<String>,
    pub created_at: i64,
}

/// Per-project status enumeration entry. Every task references one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: Id,
    pub project_id: Id,
    pub name: String,
    pub position: i64,
    pub color: String,
    pub icon: Option<String>,
}

/// Per-project priority enumeration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPriority {
    pub id: Id,
    pub project_id: Id,
    pub name: String,
    pub position: i64,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Per-project task type enumeration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskType {
    pub id: Id,
    pub project_id: Id,
    pub name: String,
    pub position: i64,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// A person assignable to tasks within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Id,
    pub project_id: Id,
    pub name: String,
    pub email: Option<String>,
    pub color: Option<String>,
    pub position: i64,
}

/// Append-only comment/history entry embedded in a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Id,
    pub task_id: Id,
    pub user_id: Option<Id>,
    pub action: String,
    pub details: Option<String>,
    pub created_at: i64,
}

/// A task as the store holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Id,
    pub project_id: Id,
    pub parent_id: Option<Id>,
    pub section_id: Option<Id>,
    pub assignee_id: Option<Id>,
    /// `PROJECTKEY-N`, assigned by the store.
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub status_id: Id,
    pub priority_id: Option<Id>,
    pub type_id: Option<Id>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// Many-to-many association between tasks and projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProjectLink {
    pub id: Id,
    pub task_id: Id,
    pub project_id: Id,
    pub position: i64,
}

/// A free-form documentation page attached to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiPage {
    pub id: Id,
    pub project_id: Id,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

// =============================================================================
// View form
// =============================================================================

/// A task as presentation code sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: Id,
    pub project_ids: Vec<Id>,
    pub section_id: String,
    pub parent_id: Option<Id>,
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub assignees: Vec<String>,
    pub status: String,
    pub priority: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub due: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_temp: bool,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// A section as presentation code sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    pub id: String,
    pub title: String,
    pub color: Option<String>,
    pub order_index: i64,
}

impl From<&Section> for SectionView {
    fn from(section: &Section) -> Self {
        Self {
            id: section.id.to_string(),
            title: section.title.clone(),
            color: section.color.clone(),
            order_index: section.order_index,
        }
    }
}

/// Caller-supplied fields for a new task, in view form. Unset fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub project_ids: Vec<Id>,
    pub section_id: Option<String>,
    pub parent_id: Option<Id>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignees: Vec<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub due: Option<String>,
    pub completed: Option<bool>,
}

/// A single view-level field edit on a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskField {
    Title(String),
    Description(Option<String>),
    Status(String),
    Priority(String),
    Type(String),
    Section(String),
    Due(Option<String>),
    Completed(bool),
    Assignees(Vec<String>),
    Parent(Option<Id>),
}

impl TaskField {
    /// View-level field name, as presentation code spells it.
    pub fn name(&self) -> &'static str {
        match self {
            TaskField::Title(_) => "title",
            TaskField::Description(_) => "description",
            TaskField::Status(_) => "status",
            TaskField::Priority(_) => "priority",
            TaskField::Type(_) => "type",
            TaskField::Section(_) => "sectionId",
            TaskField::Due(_) => "due",
            TaskField::Completed(_) => "completed",
            TaskField::Assignees(_) => "assignees",
            TaskField::Parent(_) => "parentId",
        }
    }
}

/// Wire format of due dates, in both forms.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a millisecond timestamp to a UTC datetime, clamping garbage to the epoch.
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_ids_are_negative() {
        assert!(Id(-1).is_temporary());
        assert!(!Id(1).is_temporary());
        assert!(!Id(0).is_temporary());
    }

    #[test]
    fn id_parses_from_view_string() {
        assert_eq!("42".parse::<Id>().unwrap(), Id(42));
        assert_eq!(" 7 ".parse::<Id>().unwrap(), Id(7));
        assert!("abc".parse::<Id>().is_err());
    }

    #[test]
    fn task_view_serializes_camel_case() {
        let view = TaskView {
            id: Id(1),
            project_ids: vec![Id(3)],
            section_id: "2".into(),
            parent_id: None,
            key: "PHX-1".into(),
            title: "Design login".into(),
            description: None,
            assignees: vec![],
            status: "Not Started".into(),
            priority: "Unselected".into(),
            task_type: "Bug".into(),
            due: None,
            completed: false,
            created_at: ms_to_datetime(0),
            is_temp: false,
            activities: vec![],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["projectIds"], serde_json::json!([3]));
        assert_eq!(json["sectionId"], "2");
        assert_eq!(json["type"], "Bug");
        assert_eq!(json["isTemp"], false);
    }
}
