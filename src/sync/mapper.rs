//! Translation between storage-form tasks and view-form tasks.
//!
//! Lookups are linear scans over the supplied per-project sets. A miss never
//! fails: status falls back to the first status (or [`DEFAULT_STATUS`]),
//! priority and type fall back to [`UNSELECTED`].

use crate::defaults::{DEFAULT_STATUS, PENDING_KEY, UNSELECTED};
use crate::error::{SyncError, SyncResult};
use crate::store::FieldValue;
use crate::types::{
    DATE_FORMAT, Id, Member, TaskDraft, TaskField, TaskPriority, TaskProjectLink, TaskRecord, TaskStatus,
    TaskType, TaskView, ms_to_datetime, now_ms,
};
use chrono::NaiveDate;
use heck::ToSnakeCase;

/// Storage-form fields derived from a draft. Ids are unresolved (`None`)
/// where the draft named nothing or named the unselected sentinel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoragePayload {
    pub project_id: Option<Id>,
    pub section_id: Option<Id>,
    pub parent_id: Option<Id>,
    pub assignee_id: Option<Id>,
    pub title: String,
    pub description: Option<String>,
    pub status_id: Option<Id>,
    pub priority_id: Option<Id>,
    pub type_id: Option<Id>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
}

/// Resolves a project's foreign keys in both directions.
#[derive(Debug, Clone, Copy)]
pub struct TaskMapper<'a> {
    statuses: &'a [TaskStatus],
    priorities: &'a [TaskPriority],
    types: &'a [TaskType],
    members: &'a [Member],
    default_section: Option<Id>,
}

impl<'a> TaskMapper<'a> {
    pub fn new(
        statuses: &'a [TaskStatus],
        priorities: &'a [TaskPriority],
        types: &'a [TaskType],
    ) -> Self {
        Self {
            statuses,
            priorities,
            types,
            members: &[],
            default_section: None,
        }
    }

    pub fn with_members(mut self, members: &'a [Member]) -> Self {
        self.members = members;
        self
    }

    /// Section reported for tasks whose section is unset.
    pub fn with_default_section(mut self, section: Option<Id>) -> Self {
        self.default_section = section;
        self
    }

    fn status_name(&self, id: Id) -> String {
        self.statuses
            .iter()
            .find(|s| s.id == id)
            .or_else(|| self.statuses.first())
            .map_or_else(|| DEFAULT_STATUS.to_string(), |s| s.name.clone())
    }

    fn priority_name(&self, id: Option<Id>) -> String {
        id.and_then(|id| self.priorities.iter().find(|p| p.id == id))
            .map_or_else(|| UNSELECTED.to_string(), |p| p.name.clone())
    }

    fn type_name(&self, id: Option<Id>) -> String {
        id.and_then(|id| self.types.iter().find(|t| t.id == id))
            .map_or_else(|| UNSELECTED.to_string(), |t| t.name.clone())
    }

    fn status_id(&self, name: &str) -> Option<Id> {
        self.statuses.iter().find(|s| s.name == name).map(|s| s.id)
    }

    fn priority_id(&self, name: &str) -> Option<Id> {
        self.priorities.iter().find(|p| p.name == name).map(|p| p.id)
    }

    fn type_id(&self, name: &str) -> Option<Id> {
        self.types.iter().find(|t| t.name == name).map(|t| t.id)
    }

    fn member_id(&self, name: &str) -> Option<Id> {
        self.members.iter().find(|m| m.name == name).map(|m| m.id)
    }

    /// Storage form to view form. `links` are the task's project links in position order.
    pub fn to_view(&self, task: &TaskRecord, links: &[&TaskProjectLink]) -> TaskView {
        let project_ids = links.iter().map(|l| l.project_id).collect();

        let assignees = task
            .assignee_id
            .and_then(|id| self.members.iter().find(|m| m.id == id))
            .map(|m| m.name.clone())
            .into_iter()
            .collect();

        TaskView {
            id: task.id,
            project_ids,
            section_id: task
                .section_id
                .or(self.default_section)
                .map(|id| id.to_string())
                .unwrap_or_default(),
            parent_id: task.parent_id,
            key: task.key.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            assignees,
            status: self.status_name(task.status_id),
            priority: self.priority_name(task.priority_id),
            task_type: self.type_name(task.type_id),
            due: task.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
            completed: task.completed,
            created_at: ms_to_datetime(task.created_at),
            is_temp: task.id.is_temporary(),
            activities: task.activities.clone(),
        }
    }

    /// View form to storage form.
    pub fn to_storage(&self, draft: &TaskDraft) -> StoragePayload {
        let status_id = draft
            .status
            .as_deref()
            .and_then(|name| self.status_id(name))
            .or_else(|| self.statuses.first().map(|s| s.id));

        let priority_id = match draft.priority.as_deref() {
            None | Some(UNSELECTED) => None,
            Some(name) => self.priority_id(name),
        };
        let type_id = match draft.task_type.as_deref() {
            None | Some(UNSELECTED) => None,
            Some(name) => self.type_id(name),
        };

        StoragePayload {
            project_id: draft.project_ids.first().copied(),
            section_id: draft
                .section_id
                .as_deref()
                .and_then(|s| s.parse::<Id>().ok()),
            parent_id: draft.parent_id,
            assignee_id: draft.assignees.first().and_then(|n| self.member_id(n)),
            title: draft.title.clone().unwrap_or_default(),
            description: draft.description.clone(),
            status_id,
            priority_id,
            type_id,
            due_date: draft
                .due
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok()),
            completed: draft.completed.unwrap_or(false),
        }
    }

    /// Storage column and value for a single view-level edit.
    ///
    /// Names that do not resolve are refused here rather than written as null.
    pub fn field_to_column(&self, field: &TaskField) -> SyncResult<(&'static str, FieldValue)> {
        Ok(match field {
            TaskField::Title(title) => ("title", FieldValue::from(title.as_str())),
            TaskField::Description(text) => ("description", FieldValue::from(text.clone())),
            TaskField::Status(name) => {
                let id = self.status_id(name).ok_or_else(|| {
                    SyncError::invalid_value("status", format!("Unknown status: {}", name))
                })?;
                ("status_id", FieldValue::from(id))
            }
            TaskField::Priority(name) => {
                let id = match name.as_str() {
                    UNSELECTED => None,
                    _ => Some(self.priority_id(name).ok_or_else(|| {
                        SyncError::invalid_value("priority", format!("Unknown priority: {}", name))
                    })?),
                };
                ("priority_id", FieldValue::from(id))
            }
            TaskField::Type(name) => {
                let id = match name.as_str() {
                    UNSELECTED => None,
                    _ => Some(self.type_id(name).ok_or_else(|| {
                        SyncError::invalid_value("type", format!("Unknown type: {}", name))
                    })?),
                };
                ("type_id", FieldValue::from(id))
            }
            TaskField::Section(section) => {
                let id = if section.is_empty() {
                    None
                } else {
                    Some(section.parse::<Id>().map_err(|_| {
                        SyncError::invalid_value("sectionId", format!("Invalid section id: {}", section))
                    })?)
                };
                ("section_id", FieldValue::from(id))
            }
            TaskField::Due(due) => {
                if let Some(d) = due
                    && NaiveDate::parse_from_str(d, DATE_FORMAT).is_err()
                {
                    return Err(SyncError::invalid_value(
                        "due",
                        format!("Due date must be YYYY-MM-DD, got {}", d),
                    ));
                }
                ("due_date", FieldValue::from(due.clone()))
            }
            TaskField::Completed(done) => ("completed", FieldValue::from(*done)),
            TaskField::Assignees(names) => {
                let id = match names.first() {
                    None => None,
                    Some(name) => Some(self.member_id(name).ok_or_else(|| {
                        SyncError::invalid_value("assignees", format!("Unknown member: {}", name))
                    })?),
                };
                ("assignee_id", FieldValue::from(id))
            }
            TaskField::Parent(parent) => ("parent_id", FieldValue::from(*parent)),
        })
    }
}

/// A complete provisional view for a task that has not reached the store yet.
pub fn new_optimistic_view(draft: &TaskDraft, temp_id: Id) -> TaskView {
    TaskView {
        id: temp_id,
        project_ids: draft.project_ids.clone(),
        section_id: draft.section_id.clone().unwrap_or_default(),
        parent_id: draft.parent_id,
        key: PENDING_KEY.to_string(),
        title: draft.title.clone().unwrap_or_default(),
        description: draft.description.clone(),
        assignees: draft.assignees.clone(),
        status: draft
            .status
            .clone()
            .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        priority: draft
            .priority
            .clone()
            .unwrap_or_else(|| UNSELECTED.to_string()),
        task_type: draft
            .task_type
            .clone()
            .unwrap_or_else(|| UNSELECTED.to_string()),
        due: draft.due.clone(),
        completed: draft.completed.unwrap_or(false),
        created_at: ms_to_datetime(now_ms()),
        is_temp: true,
        activities: Vec::new(),
    }
}

impl From<&TaskView> for TaskDraft {
    fn from(view: &TaskView) -> Self {
        Self {
            project_ids: view.project_ids.clone(),
            section_id: Some(view.section_id.clone()).filter(|s| !s.is_empty()),
            parent_id: view.parent_id,
            title: Some(view.title.clone()),
            description: view.description.clone(),
            assignees: view.assignees.clone(),
            status: Some(view.status.clone()),
            priority: Some(view.priority.clone()),
            task_type: Some(view.task_type.clone()),
            due: view.due.clone(),
            completed: Some(view.completed),
        }
    }
}

fn nullable(raw: &str) -> Option<String> {
    match raw.trim() {
        "" | "null" | "none" => None,
        s => Some(s.to_string()),
    }
}

impl TaskField {
    /// Parse a view-level field name and a raw string value.
    ///
    /// Accepts camelCase or snake_case names (`sectionId`, `section_id`, `dueDate`).
    pub fn parse(name: &str, raw: &str) -> SyncResult<Self> {
        let field = match name.to_snake_case().as_str() {
            "title" => TaskField::Title(raw.to_string()),
            "description" => TaskField::Description(nullable(raw)),
            "status" => TaskField::Status(raw.to_string()),
            "priority" => TaskField::Priority(raw.to_string()),
            "type" | "task_type" => TaskField::Type(raw.to_string()),
            "section" | "section_id" => TaskField::Section(nullable(raw).unwrap_or_default()),
            "due" | "due_date" => TaskField::Due(nullable(raw)),
            "completed" => TaskField::Completed(raw.trim().parse().map_err(|_| {
                SyncError::invalid_value("completed", "completed must be true or false")
            })?),
            "assignee" | "assignees" => TaskField::Assignees(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            "parent" | "parent_id" => TaskField::Parent(
                nullable(raw)
                    .map(|s| s.parse::<Id>())
                    .transpose()
                    .map_err(|_| SyncError::invalid_value("parentId", "parentId must be an id"))?,
            ),
            _ => return Err(SyncError::unknown_field(name)),
        };
        Ok(field)
    }
}
