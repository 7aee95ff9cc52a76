//! Structured error types for sync engine operations.
//!
//! Remote-store failures never surface here: the engine absorbs them with a
//! rollback. A `SyncError` is a refusal, raised before any mutation happens.

use crate::types::Id;
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,
    UnknownField,
    ImmutableField,

    // Not found errors
    ProjectNotFound,
    TaskNotFound,
    SectionNotFound,
    RecordNotFound,

    // Refused operations
    RecordPending,
    LastProjectLink,
    FallbackRequired,
    InvalidFallback,
    NoStatuses,

    // Internal errors
    StoreError,
    InternalError,
}

/// Structured error for refused or failed operations.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl SyncError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn unknown_field(field: &str) -> Self {
        Self::new(ErrorCode::UnknownField, format!("Unknown field: {}", field)).with_field(field)
    }

    pub fn immutable_field(field: &str) -> Self {
        Self::new(
            ErrorCode::ImmutableField,
            format!("{} cannot be changed after creation", field),
        )
        .with_field(field)
    }

    pub fn project_not_found(id: Id) -> Self {
        Self::new(ErrorCode::ProjectNotFound, format!("Project not found: {}", id))
    }

    pub fn task_not_found(id: Id) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("Task not found: {}", id))
    }

    pub fn section_not_found(id: Id) -> Self {
        Self::new(ErrorCode::SectionNotFound, format!("Section not found: {}", id))
    }

    pub fn record_not_found(kind: &str, id: Id) -> Self {
        Self::new(
            ErrorCode::RecordNotFound,
            format!("{} not found: {}", kind, id),
        )
    }

    pub fn pending(kind: &str, id: Id) -> Self {
        Self::new(
            ErrorCode::RecordPending,
            format!("{} {} has not been confirmed by the store yet", kind, id),
        )
    }

    pub fn last_link(task_id: Id) -> Self {
        Self::new(
            ErrorCode::LastProjectLink,
            format!("Task {} must belong to at least one project", task_id),
        )
    }

    pub fn fallback_required(section_id: Id, task_count: usize) -> Self {
        Self::new(
            ErrorCode::FallbackRequired,
            format!(
                "Section {} still holds {} task(s); a fallback section is required",
                section_id, task_count
            ),
        )
    }

    pub fn invalid_fallback(section_id: Id, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFallback,
            format!("Cannot use section {} as fallback: {}", section_id, reason),
        )
    }

    pub fn no_statuses(project_id: Id) -> Self {
        Self::new(
            ErrorCode::NoStatuses,
            format!("Project {} has no statuses", project_id),
        )
    }

    pub fn store(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::StoreError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SyncError {}

/// Result type for sync engine operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
