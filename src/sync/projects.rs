//! Project-scoped records: projects, members, enumerations and wiki pages.

use super::{HealKind, ProjectCatalog, SyncEngine};
use crate::defaults::DEFAULT_SECTIONS;
use crate::error::{SyncError, SyncResult};
use crate::store::FieldValue;
use crate::types::{Id, Member, Project, Section, TaskPriority, TaskStatus, TaskType, WikiPage, now_ms};
use tracing::info;

fn required(field: &str, value: &str) -> SyncResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SyncError::missing_field(field));
    }
    Ok(value.to_string())
}

/// Fields for a new project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl SyncEngine {
    /// Refuse work against a project that is unknown or not yet confirmed.
    pub(crate) fn require_project(&self, project_id: Id) -> SyncResult<()> {
        if project_id.is_temporary() {
            return Err(SyncError::pending("project", project_id));
        }
        if !self.read(|cache| cache.projects().contains(project_id)) {
            return Err(SyncError::project_not_found(project_id));
        }
        Ok(())
    }

    /// Create a project and its default statuses, priorities, types and sections.
    ///
    /// Not optimistic: the project appears once the store has assigned its id.
    /// Returns `Ok(None)` if the store refused the insert.
    pub async fn add_project(&self, new: NewProject) -> SyncResult<Option<Project>> {
        let name = required("name", &new.name)?;
        let key = required("key", &new.key)?.to_uppercase();
        if !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SyncError::invalid_value(
                "key",
                "key must be letters and digits only",
            ));
        }
        if self.read(|cache| cache.projects().iter().any(|p| p.key == key)) {
            return Err(SyncError::invalid_value(
                "key",
                format!("key {} is already in use", key),
            ));
        }

        let now = now_ms();
        let draft = Project {
            id: Id(0),
            name,
            key,
            description: new.description,
            color: new.color,
            icon: new.icon,
            current_task_number: 0,
            created_at: now,
            updated_at: now,
        };
        let Some(project) = self.insert_confirmed(draft).await else {
            return Ok(None);
        };

        for kind in [HealKind::Statuses, HealKind::Priorities, HealKind::Types] {
            if self.mark_healed(project.id, kind) {
                self.seed(project.id, kind).await;
            }
        }
        for (order_index, title) in DEFAULT_SECTIONS.iter().enumerate() {
            self.insert_confirmed(Section {
                id: Id(0),
                project_id: project.id,
                title: title.to_string(),
                order_index: order_index as i64,
                color: None,
                created_at: now,
            })
            .await;
        }
        info!(project = %project.id, key = %project.key, "project created");

        if self.active_project().is_none() {
            self.set_active_project(Some(project.id));
        }
        Ok(Some(project))
    }

    /// Change a cosmetic project column. The key is immutable.
    pub async fn update_project(&self, id: Id, column: &str, value: FieldValue) -> SyncResult<()> {
        self.update::<Project>(id, column, value).await
    }

    /// Add an assignable member to a project.
    pub async fn add_member(
        &self,
        project_id: Id,
        name: &str,
        email: Option<String>,
    ) -> SyncResult<Option<Member>> {
        self.require_project(project_id)?;
        let name = required("name", name)?;
        let position = self.read(|cache| {
            cache
                .members()
                .iter()
                .filter(|m| m.project_id == project_id)
                .count()
        }) as i64;
        Ok(self
            .create(Member {
                id: Id(0),
                project_id,
                name,
                email,
                color: None,
                position,
            })
            .await)
    }

    /// Position after the last entry `last` picks out of the project's catalog.
    fn next_position(&self, project_id: Id, last: impl FnOnce(&ProjectCatalog) -> Option<i64>) -> i64 {
        self.read(|cache| last(&cache.catalog(project_id)).map_or(0, |p| p + 1))
    }

    pub async fn add_status(
        &self,
        project_id: Id,
        name: &str,
        color: &str,
    ) -> SyncResult<Option<TaskStatus>> {
        self.require_project(project_id)?;
        let status = TaskStatus {
            id: Id(0),
            project_id,
            name: required("name", name)?,
            position: self.next_position(project_id, |c| c.statuses.last().map(|s| s.position)),
            color: color.to_string(),
            icon: None,
        };
        Ok(self.create(status).await)
    }

    pub async fn add_priority(
        &self,
        project_id: Id,
        name: &str,
        color: Option<String>,
    ) -> SyncResult<Option<TaskPriority>> {
        self.require_project(project_id)?;
        let priority = TaskPriority {
            id: Id(0),
            project_id,
            name: required("name", name)?,
            position: self.next_position(project_id, |c| c.priorities.last().map(|p| p.position)),
            color,
            icon: None,
        };
        Ok(self.create(priority).await)
    }

    pub async fn add_type(
        &self,
        project_id: Id,
        name: &str,
        icon: Option<String>,
    ) -> SyncResult<Option<TaskType>> {
        self.require_project(project_id)?;
        let task_type = TaskType {
            id: Id(0),
            project_id,
            name: required("name", name)?,
            position: self.next_position(project_id, |c| c.types.last().map(|t| t.position)),
            color: None,
            icon,
        };
        Ok(self.create(task_type).await)
    }

    /// Create a wiki page. Not optimistic; the confirmed page is shown first.
    pub async fn add_wiki_page(
        &self,
        project_id: Id,
        title: &str,
        content: &str,
    ) -> SyncResult<Option<WikiPage>> {
        self.require_project(project_id)?;
        let now = now_ms();
        Ok(self
            .insert_confirmed(WikiPage {
                id: Id(0),
                project_id,
                title: required("title", title)?,
                content: content.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await)
    }

    /// Edit a wiki page's title or content in place.
    pub async fn update_wiki_page(&self, id: Id, column: &str, value: FieldValue) -> SyncResult<()> {
        self.update::<WikiPage>(id, column, value).await
    }
}
