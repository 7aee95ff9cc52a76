//! Row parsing and column metadata for the store's tables.

use crate::store::Collection;
use crate::types::{
    Activity, DATE_FORMAT, Id, Member, Project, Section, TaskPriority, TaskProjectLink, TaskRecord, TaskStatus,
    TaskType, WikiPage,
};
use chrono::NaiveDate;
use rusqlite::Row;

/// Columns a caller may change with a column-scoped update.
pub fn updatable_columns(collection: Collection) -> &'static [&'static str] {
    match collection {
        // `key` is immutable once a project exists
        Collection::Projects => &["name", "description", "color", "icon"],
        Collection::Tasks => &[
            "project_id",
            "parent_id",
            "section_id",
            "assignee_id",
            "title",
            "description",
            "status_id",
            "priority_id",
            "type_id",
            "due_date",
            "completed",
        ],
        Collection::Sections => &["title", "order_index", "color"],
        Collection::TaskStatuses | Collection::TaskPriorities | Collection::TaskTypes => {
            &["name", "position", "color", "icon"]
        }
        Collection::ProjectMembers => &["name", "email", "color", "position"],
        Collection::TaskProjects => &["position"],
        Collection::Wikis => &["title", "content"],
    }
}

/// Foreign-key columns usable as a delete filter.
pub fn filter_columns(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Projects => &[],
        Collection::Tasks => &["project_id", "parent_id", "section_id"],
        Collection::TaskProjects => &["task_id", "project_id"],
        _ => &["project_id"],
    }
}

/// Whether the table carries an `updated_at` column the store maintains.
pub fn tracks_updates(collection: Collection) -> bool {
    matches!(
        collection,
        Collection::Projects | Collection::Tasks | Collection::Wikis
    )
}

fn id(row: &Row, column: &str) -> rusqlite::Result<Id> {
    row.get::<_, i64>(column).map(Id)
}

fn opt_id(row: &Row, column: &str) -> rusqlite::Result<Option<Id>> {
    Ok(row.get::<_, Option<i64>>(column)?.map(Id))
}

pub fn parse_project(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: id(row, "id")?,
        name: row.get("name")?,
        key: row.get("key")?,
        description: row.get("description")?,
        color: row.get("color")?,
        icon: row.get("icon")?,
        current_task_number: row.get("current_task_number")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn parse_section(row: &Row) -> rusqlite::Result<Section> {
    Ok(Section {
        id: id(row, "id")?,
        project_id: id(row, "project_id")?,
        title: row.get("title")?,
        order_index: row.get("order_index")?,
        color: row.get("color")?,
        created_at: row.get("created_at")?,
    })
}

pub fn parse_status(row: &Row) -> rusqlite::Result<TaskStatus> {
    Ok(TaskStatus {
        id: id(row, "id")?,
        project_id: id(row, "project_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
        color: row.get("color")?,
        icon: row.get("icon")?,
    })
}

pub fn parse_priority(row: &Row) -> rusqlite::Result<TaskPriority> {
    Ok(TaskPriority {
        id: id(row, "id")?,
        project_id: id(row, "project_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
        color: row.get("color")?,
        icon: row.get("icon")?,
    })
}

pub fn parse_type(row: &Row) -> rusqlite::Result<TaskType> {
    Ok(TaskType {
        id: id(row, "id")?,
        project_id: id(row, "project_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
        color: row.get("color")?,
        icon: row.get("icon")?,
    })
}

pub fn parse_member(row: &Row) -> rusqlite::Result<Member> {
    Ok(Member {
        id: id(row, "id")?,
        project_id: id(row, "project_id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        color: row.get("color")?,
        position: row.get("position")?,
    })
}

pub fn parse_link(row: &Row) -> rusqlite::Result<TaskProjectLink> {
    Ok(TaskProjectLink {
        id: id(row, "id")?,
        task_id: id(row, "task_id")?,
        project_id: id(row, "project_id")?,
        position: row.get("position")?,
    })
}

pub fn parse_wiki(row: &Row) -> rusqlite::Result<WikiPage> {
    Ok(WikiPage {
        id: id(row, "id")?,
        project_id: id(row, "project_id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn parse_activity(row: &Row) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: id(row, "id")?,
        task_id: id(row, "task_id")?,
        user_id: opt_id(row, "user_id")?,
        action: row.get("action")?,
        details: row.get("details")?,
        created_at: row.get("created_at")?,
    })
}

/// Parse a task row. Activities are attached separately.
pub fn parse_task(row: &Row) -> rusqlite::Result<TaskRecord> {
    let due_date: Option<String> = row.get("due_date")?;
    Ok(TaskRecord {
        id: id(row, "id")?,
        project_id: id(row, "project_id")?,
        parent_id: opt_id(row, "parent_id")?,
        section_id: opt_id(row, "section_id")?,
        assignee_id: opt_id(row, "assignee_id")?,
        key: row.get("key")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status_id: id(row, "status_id")?,
        priority_id: opt_id(row, "priority_id")?,
        type_id: opt_id(row, "type_id")?,
        due_date: due_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        completed: row.get("completed")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        activities: Vec::new(),
    })
}
