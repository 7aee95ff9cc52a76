//! Section create, rename and delete-with-fallback.

use super::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::store::{Collection, FieldValue};
use crate::types::{Id, Section, TaskRecord, now_ms};
use tracing::{debug, warn};

impl SyncEngine {
    /// Append a section to a project.
    pub async fn add_section(&self, project_id: Id, title: &str) -> SyncResult<Option<Section>> {
        self.require_project(project_id)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(SyncError::missing_field("title"));
        }
        let order_index = self.read(|cache| {
            cache
                .sections_for(project_id)
                .last()
                .map_or(0, |s| s.order_index + 1)
        });

        Ok(self
            .create(Section {
                id: Id(0),
                project_id,
                title: title.to_string(),
                order_index,
                color: None,
                created_at: now_ms(),
            })
            .await)
    }

    pub async fn rename_section(&self, id: Id, title: &str) -> SyncResult<()> {
        if title.trim().is_empty() {
            return Err(SyncError::missing_field("title"));
        }
        self.update::<Section>(id, "title", FieldValue::from(title.trim()))
            .await
    }

    /// Delete a section, moving its tasks to `fallback` first.
    ///
    /// An empty section needs no fallback. Otherwise the fallback must be a
    /// different, confirmed section of the same project. Every check happens
    /// before anything is mutated.
    pub async fn delete_section(&self, id: Id, fallback: Option<Id>) -> SyncResult<()> {
        if id.is_temporary() {
            return Err(SyncError::pending("section", id));
        }
        let (section, holding) = self.read(|cache| {
            let section = cache.sections().get(id).cloned();
            (section, cache.tasks_in_section(id))
        });
        let section = section.ok_or_else(|| SyncError::section_not_found(id))?;

        if holding.is_empty() {
            return self.remove::<Section>(id).await;
        }

        let Some(fallback) = fallback else {
            return Err(SyncError::fallback_required(id, holding.len()));
        };
        if fallback == id {
            return Err(SyncError::invalid_fallback(fallback, "it is the section being deleted"));
        }
        if fallback.is_temporary() {
            return Err(SyncError::invalid_fallback(fallback, "it has not been confirmed yet"));
        }
        match self.read(|cache| cache.sections().get(fallback).map(|s| s.project_id)) {
            None => return Err(SyncError::invalid_fallback(fallback, "it does not exist")),
            Some(project) if project != section.project_id => {
                return Err(SyncError::invalid_fallback(fallback, "it belongs to another project"));
            }
            Some(_) => {}
        }
        if let Some(pending) = holding.iter().find(|t| t.is_temporary()) {
            return Err(SyncError::pending("task", *pending));
        }

        // Re-point every task in one cache write, then persist the moves.
        self.write(|cache| {
            for task_id in &holding {
                if let Some(task) = cache.table_mut::<TaskRecord>().get_mut(*task_id) {
                    task.section_id = Some(fallback);
                    task.updated_at = now_ms();
                }
            }
        });
        debug!(section = %id, %fallback, moved = holding.len(), "tasks reassigned");

        for task_id in &holding {
            let moved = self
                .store()
                .update(Collection::Tasks, *task_id, "section_id", FieldValue::from(fallback))
                .await;
            if let Err(err) = moved {
                warn!(task = %task_id, section = %id, error = %err, "task move failed; reloading");
                self.reload().await;
                return Ok(());
            }
        }

        self.remove::<Section>(id).await
    }
}
