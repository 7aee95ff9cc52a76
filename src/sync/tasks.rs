//! Task operations in view terms.
//!
//! Callers speak in view fields (status names, string section ids); the
//! mapper turns each edit into one storage column before the generic engine
//! applies it.

use super::SyncEngine;
use super::mapper::TaskMapper;
use super::views;
use crate::defaults::PENDING_KEY;
use crate::error::{SyncError, SyncResult};
use crate::types::{Id, TaskDraft, TaskField, TaskProjectLink, TaskRecord, TaskView, now_ms};
use tracing::{debug, warn};

impl SyncEngine {
    fn task_record(&self, id: Id) -> SyncResult<TaskRecord> {
        if id.is_temporary() {
            return Err(SyncError::pending("task", id));
        }
        self.read(|cache| cache.tasks().get(id).cloned())
            .ok_or_else(|| SyncError::task_not_found(id))
    }

    /// View form of one cached task.
    pub fn task_view(&self, id: Id) -> Option<TaskView> {
        self.read(|cache| {
            let task = cache.tasks().get(id)?;
            let catalog = cache.catalog(task.project_id);
            let links = cache.links_for_task(id);
            let default_section = cache.sections_for(task.project_id).first().map(|s| s.id);
            Some(
                TaskMapper::new(&catalog.statuses, &catalog.priorities, &catalog.types)
                    .with_members(&catalog.members)
                    .with_default_section(default_section)
                    .to_view(task, &links),
            )
        })
    }

    /// View-form children of a task.
    pub fn subtasks_of(&self, task_id: Id) -> Vec<TaskView> {
        self.read(|cache| views::subtasks_of(cache, task_id))
    }

    /// Create a task optimistically.
    ///
    /// The task (and one link per project) is visible in the cache before the
    /// store is contacted. Unset fields default: first status, first section,
    /// unselected priority and type. With no project ids the active project is
    /// used. Returns `Ok(None)` if the store refused the insert.
    pub async fn add_task(&self, draft: TaskDraft) -> SyncResult<Option<TaskView>> {
        let mut project_ids = draft.project_ids.clone();
        if project_ids.is_empty() {
            project_ids.extend(self.active_project());
        }
        let Some(&canonical) = project_ids.first() else {
            return Err(SyncError::missing_field("projectIds"));
        };
        for project_id in &project_ids {
            self.require_project(*project_id)?;
        }
        if let Some(parent) = draft.parent_id {
            self.task_record(parent)?;
        }

        let (payload, default_section) = self.read(|cache| {
            let catalog = cache.catalog(canonical);
            let payload = TaskMapper::new(&catalog.statuses, &catalog.priorities, &catalog.types)
                .with_members(&catalog.members)
                .to_storage(&draft);
            let default_section = cache.sections_for(canonical).first().map(|s| s.id);
            (payload, default_section)
        });
        let status_id = payload
            .status_id
            .ok_or_else(|| SyncError::no_statuses(canonical))?;
        let section_id = payload.section_id.or(default_section);
        if let Some(section) = section_id {
            if section.is_temporary() {
                return Err(SyncError::pending("section", section));
            }
            if !self.read(|cache| cache.sections().contains(section)) {
                return Err(SyncError::section_not_found(section));
            }
        }

        let temp_id = self.next_temp_id();
        let now = now_ms();
        let task = TaskRecord {
            id: temp_id,
            project_id: canonical,
            parent_id: payload.parent_id,
            section_id,
            assignee_id: payload.assignee_id,
            key: PENDING_KEY.to_string(),
            title: payload.title,
            description: payload.description,
            status_id,
            priority_id: payload.priority_id,
            type_id: payload.type_id,
            due_date: payload.due_date,
            completed: payload.completed,
            created_at: now,
            updated_at: now,
            activities: Vec::new(),
        };
        let links: Vec<TaskProjectLink> = project_ids
            .iter()
            .enumerate()
            .map(|(position, project_id)| TaskProjectLink {
                id: self.next_temp_id(),
                task_id: temp_id,
                project_id: *project_id,
                position: position as i64,
            })
            .collect();

        self.write(|cache| {
            cache.table_mut::<TaskRecord>().insert_new(task.clone());
            for link in &links {
                cache.table_mut::<TaskProjectLink>().insert_new(link.clone());
            }
        });
        debug!(%temp_id, links = links.len(), "optimistic task insert");

        let Some(confirmed) = self.confirm_insert(temp_id, task).await else {
            return Ok(None);
        };

        for link in links {
            // The task id was remapped in place when the task was confirmed. A
            // reload while the task insert was in flight drops the provisional
            // link, so put it back pointing at the confirmed task.
            let pending = self.write(|cache| {
                let table = cache.table_mut::<TaskProjectLink>();
                if let Some(pending) = table.get(link.id) {
                    return pending.clone();
                }
                let restored = TaskProjectLink {
                    task_id: confirmed.id,
                    ..link.clone()
                };
                table.insert_new(restored.clone());
                restored
            });
            if self.confirm_insert(link.id, pending).await.is_none() {
                warn!(task = %confirmed.id, project = %link.project_id, "link insert failed; reloading");
                self.reload().await;
                break;
            }
        }

        Ok(self.task_view(confirmed.id))
    }

    /// Apply one view-level edit to a task.
    pub async fn update_task(&self, id: Id, field: TaskField) -> SyncResult<()> {
        let task = self.task_record(id)?;
        let (column, value) = self.read(|cache| {
            let catalog = cache.catalog(task.project_id);
            TaskMapper::new(&catalog.statuses, &catalog.priorities, &catalog.types)
                .with_members(&catalog.members)
                .field_to_column(&field)
        })?;

        match &field {
            TaskField::Section(_) => {
                if let Some(section) = value.as_id().flatten() {
                    if section.is_temporary() {
                        return Err(SyncError::pending("section", section));
                    }
                    if !self.read(|cache| cache.sections().contains(section)) {
                        return Err(SyncError::section_not_found(section));
                    }
                }
            }
            TaskField::Parent(Some(parent)) => {
                if *parent == id {
                    return Err(SyncError::invalid_value("parentId", "a task cannot be its own parent"));
                }
                self.task_record(*parent)?;
            }
            _ => {}
        }

        self.update::<TaskRecord>(id, column, value).await
    }

    /// Flip completion: status moves to the project's last status when
    /// completing and its first status when reopening, then the flag flips.
    /// Two separate writes; they are not atomic.
    pub async fn toggle_task_completion(&self, id: Id) -> SyncResult<bool> {
        let task = self.task_record(id)?;
        let completing = !task.completed;
        let target = self.read(|cache| {
            let statuses = cache.catalog(task.project_id).statuses;
            let status = if completing {
                statuses.last()
            } else {
                statuses.first()
            };
            status.map(|s| s.name.clone())
        });

        if let Some(status) = target {
            self.update_task(id, TaskField::Status(status)).await?;
        }
        self.update_task(id, TaskField::Completed(completing)).await?;
        Ok(completing)
    }

    /// Delete a task with its links and subtasks.
    pub async fn delete_task(&self, id: Id) -> SyncResult<()> {
        self.task_record(id)?;
        self.remove::<TaskRecord>(id).await
    }

    /// Also show a task in another project. Linking twice is a no-op.
    pub async fn link_task(&self, task_id: Id, project_id: Id) -> SyncResult<Option<TaskProjectLink>> {
        self.task_record(task_id)?;
        self.require_project(project_id)?;

        let (existing, position) = self.read(|cache| {
            let links = cache.links_for_task(task_id);
            let existing = links.iter().find(|l| l.project_id == project_id).map(|l| (*l).clone());
            let position = links.last().map_or(0, |l| l.position + 1);
            (existing, position)
        });
        if existing.is_some() {
            return Ok(existing);
        }

        Ok(self
            .create(TaskProjectLink {
                id: Id(0),
                task_id,
                project_id,
                position,
            })
            .await)
    }

    /// Remove a task from a project. Refused for the task's last link.
    pub async fn unlink_task(&self, task_id: Id, project_id: Id) -> SyncResult<()> {
        self.task_record(task_id)?;
        let link = self
            .read(|cache| {
                cache
                    .links_for_task(task_id)
                    .into_iter()
                    .find(|l| l.project_id == project_id)
                    .map(|l| l.id)
            })
            .ok_or_else(|| SyncError::record_not_found("task link", task_id))?;
        self.remove::<TaskProjectLink>(link).await
    }
}
