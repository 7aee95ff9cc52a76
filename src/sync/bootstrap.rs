//! Initial load, reload and self-heal.
//!
//! After every load each project missing priorities or types gets the
//! default set, and the active project gets default statuses if it has none.
//! The session ledger records every (project, kind) pair it has attempted, so
//! a condition is healed at most once per session even if seeding fails or
//! the cache is reloaded.

use super::{EntityCache, SyncEngine};
use crate::defaults::{DEFAULT_PRIORITIES, DEFAULT_STATUSES, DEFAULT_TYPES, SeedEntry};
use crate::error::{SyncError, SyncResult};
use crate::store::{Collection, Row, StoreResult};
use crate::types::{Id, TaskPriority, TaskStatus, TaskType};
use futures::future::try_join_all;
use tracing::{info, warn};

/// A per-project enumeration the heal routine can seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealKind {
    Statuses,
    Priorities,
    Types,
}

impl HealKind {
    fn defaults(self) -> &'static [SeedEntry] {
        match self {
            HealKind::Statuses => &DEFAULT_STATUSES,
            HealKind::Priorities => &DEFAULT_PRIORITIES,
            HealKind::Types => &DEFAULT_TYPES,
        }
    }

    fn row(self, project_id: Id, position: i64, entry: &SeedEntry) -> Row {
        let (name, color, icon) = *entry;
        let name = name.to_string();
        let icon = icon.map(str::to_string);
        match self {
            HealKind::Statuses => Row::Status(TaskStatus {
                id: Id(0),
                project_id,
                name,
                position,
                color: color.unwrap_or("slate").to_string(),
                icon,
            }),
            HealKind::Priorities => Row::Priority(TaskPriority {
                id: Id(0),
                project_id,
                name,
                position,
                color: color.map(str::to_string),
                icon,
            }),
            HealKind::Types => Row::Type(TaskType {
                id: Id(0),
                project_id,
                name,
                position,
                color: color.map(str::to_string),
                icon,
            }),
        }
    }

    fn present(self, cache: &EntityCache, project_id: Id) -> bool {
        match self {
            HealKind::Statuses => cache.statuses().iter().any(|s| s.project_id == project_id),
            HealKind::Priorities => cache.priorities().iter().any(|p| p.project_id == project_id),
            HealKind::Types => cache.types().iter().any(|t| t.project_id == project_id),
        }
    }
}

impl SyncEngine {
    /// Fetch every collection in parallel and replace the cache, then self-heal.
    pub async fn load_all(&self) -> StoreResult<()> {
        let store = self.store();
        let batches = try_join_all(
            Collection::ALL
                .iter()
                .map(|collection| store.select(*collection, collection.default_order())),
        )
        .await?;

        let fresh = EntityCache::from_rows(batches.into_iter().flatten());
        let (projects, tasks) = (fresh.projects().len(), fresh.tasks().len());

        let active = self.with_session(|session| {
            let revision = session.cache.revision();
            session.cache = fresh;
            session.cache.set_revision(revision);
            if session
                .active_project
                .is_none_or(|id| !session.cache.projects().contains(id))
            {
                session.active_project = session.cache.projects().iter().next().map(|p| p.id);
            }
            session.active_project
        });
        self.write(|_| ());
        info!(projects, tasks, active = ?active, "cache loaded");

        self.heal().await;
        Ok(())
    }

    /// Reload after a failed remote write. Failures are logged, not returned.
    pub async fn reload(&self) {
        if let Err(err) = self.load_all().await {
            warn!(error = %err, "reload failed; cache may be stale");
        }
    }

    /// Make a project active and heal its statuses.
    pub async fn activate_project(&self, project_id: Id) -> SyncResult<()> {
        if !self.read(|cache| cache.projects().contains(project_id)) {
            return Err(SyncError::project_not_found(project_id));
        }
        self.set_active_project(Some(project_id));
        self.heal().await;
        Ok(())
    }

    /// Seed every missing enumeration not already healed this session.
    pub(crate) async fn heal(&self) {
        let plan: Vec<(Id, HealKind)> = self.with_session(|session| {
            let cache = &session.cache;
            let mut plan = Vec::new();
            for project in cache.projects().iter().filter(|p| !p.id.is_temporary()) {
                for kind in [HealKind::Priorities, HealKind::Types] {
                    if !kind.present(cache, project.id) {
                        plan.push((project.id, kind));
                    }
                }
            }
            if let Some(active) = session.active_project
                && !active.is_temporary()
                && !HealKind::Statuses.present(cache, active)
            {
                plan.push((active, HealKind::Statuses));
            }
            plan.retain(|entry| session.healed.insert(*entry));
            plan
        });

        for (project_id, kind) in plan {
            self.seed(project_id, kind).await;
        }
    }

    /// Claim (project, kind) in the ledger so later heals skip it.
    pub(crate) fn mark_healed(&self, project_id: Id, kind: HealKind) -> bool {
        self.with_session(|session| session.healed.insert((project_id, kind)))
    }

    /// Persist the default set for one kind, adding confirmed rows to the cache.
    pub(crate) async fn seed(&self, project_id: Id, kind: HealKind) -> usize {
        info!(project = %project_id, ?kind, "seeding defaults");
        let mut seeded = 0;
        for (position, entry) in kind.defaults().iter().enumerate() {
            let row = kind.row(project_id, position as i64, entry);
            match self.store().insert(row).await {
                Ok(row) => {
                    self.write(|cache| cache.push_row(row));
                    seeded += 1;
                }
                Err(err) => {
                    warn!(project = %project_id, ?kind, error = %err, "seeding failed");
                }
            }
        }
        seeded
    }
}
