//! Remote store contract.
//!
//! The sync engine talks to persistence only through [`RemoteStore`]: ordered
//! bulk select, single-row insert returning the stored row, column-scoped update
//! by id, and delete by id or by a foreign-key filter. Rows cross this boundary
//! already typed; nothing store-specific leaks into the cache.

use crate::types::{
    Id, Member, Project, Section, TaskPriority, TaskProjectLink, TaskRecord, TaskStatus, TaskType,
    WikiPage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Named collections exposed by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Projects,
    Tasks,
    Sections,
    TaskStatuses,
    TaskPriorities,
    TaskTypes,
    ProjectMembers,
    TaskProjects,
    Wikis,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Projects,
        Collection::Tasks,
        Collection::Sections,
        Collection::TaskStatuses,
        Collection::TaskPriorities,
        Collection::TaskTypes,
        Collection::ProjectMembers,
        Collection::TaskProjects,
        Collection::Wikis,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Tasks => "tasks",
            Collection::Sections => "sections",
            Collection::TaskStatuses => "task_statuses",
            Collection::TaskPriorities => "task_priorities",
            Collection::TaskTypes => "task_types",
            Collection::ProjectMembers => "project_members",
            Collection::TaskProjects => "task_projects",
            Collection::Wikis => "wikis",
        }
    }

    /// Sort order used by the bulk load.
    pub fn default_order(&self) -> OrderBy {
        match self {
            Collection::Projects => OrderBy::asc("created_at"),
            Collection::Tasks => OrderBy::desc("created_at"),
            Collection::Sections => OrderBy::asc("order_index"),
            Collection::TaskStatuses | Collection::TaskPriorities | Collection::TaskTypes => {
                OrderBy::asc("position")
            }
            Collection::ProjectMembers | Collection::TaskProjects => OrderBy::asc("position"),
            Collection::Wikis => OrderBy::desc("updated_at"),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Sort column and direction for a bulk select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

/// A scalar column value for updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Interpret as a nullable foreign key.
    pub fn as_id(&self) -> Option<Option<Id>> {
        match self {
            FieldValue::Null => Some(None),
            FieldValue::Integer(v) => Some(Some(Id(*v))),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<Option<&str>> {
        match self {
            FieldValue::Null => Some(None),
            FieldValue::Text(s) => Some(Some(s.as_str())),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Integer(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl From<Option<Id>> for FieldValue {
    fn from(value: Option<Id>) -> Self {
        value.map_or(FieldValue::Null, |id| FieldValue::Integer(id.0))
    }
}

impl From<Id> for FieldValue {
    fn from(value: Id) -> Self {
        FieldValue::Integer(value.0)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Text)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// A typed row of one of the store's collections.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Project(Project),
    Task(TaskRecord),
    Section(Section),
    Status(TaskStatus),
    Priority(TaskPriority),
    Type(TaskType),
    Member(Member),
    Link(TaskProjectLink),
    Wiki(WikiPage),
}

impl Row {
    pub fn collection(&self) -> Collection {
        match self {
            Row::Project(_) => Collection::Projects,
            Row::Task(_) => Collection::Tasks,
            Row::Section(_) => Collection::Sections,
            Row::Status(_) => Collection::TaskStatuses,
            Row::Priority(_) => Collection::TaskPriorities,
            Row::Type(_) => Collection::TaskTypes,
            Row::Member(_) => Collection::ProjectMembers,
            Row::Link(_) => Collection::TaskProjects,
            Row::Wiki(_) => Collection::Wikis,
        }
    }

    pub fn id(&self) -> Id {
        match self {
            Row::Project(r) => r.id,
            Row::Task(r) => r.id,
            Row::Section(r) => r.id,
            Row::Status(r) => r.id,
            Row::Priority(r) => r.id,
            Row::Type(r) => r.id,
            Row::Member(r) => r.id,
            Row::Link(r) => r.id,
            Row::Wiki(r) => r.id,
        }
    }
}

/// Which rows a delete applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// The single row with this id.
    Id(Id),
    /// Every row whose foreign-key column equals the id.
    Column(&'static str, Id),
}

/// Failure of a remote store call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{collection} row {id} not found")]
    NotFound { collection: Collection, id: Id },

    #[error("unknown column '{column}' on {collection}")]
    UnknownColumn {
        collection: Collection,
        column: String,
    },

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("store returned a row of the wrong shape for {0}")]
    UnexpectedRow(Collection),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for remote store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The asynchronous persistence surface consumed by the sync engine.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch every row of a collection in the given order.
    async fn select(&self, collection: Collection, order: OrderBy) -> StoreResult<Vec<Row>>;

    /// Insert one row. The id, and for tasks the key and timestamps, of the
    /// submitted row are ignored; the stored row is returned.
    async fn insert(&self, row: Row) -> StoreResult<Row>;

    /// Set a single column on the row with the given id.
    async fn update(
        &self,
        collection: Collection,
        id: Id,
        column: &str,
        value: FieldValue,
    ) -> StoreResult<()>;

    /// Delete matching rows, returning how many were removed.
    async fn delete(&self, collection: Collection, filter: Filter) -> StoreResult<usize>;
}
