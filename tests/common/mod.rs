//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskboard_sync::config::SyncConfig;
use taskboard_sync::db::Database;
use taskboard_sync::store::{
    Collection, FieldValue, Filter, OrderBy, RemoteStore, Row, StoreError, StoreResult,
};
use taskboard_sync::sync::SyncEngine;
use taskboard_sync::sync::projects::NewProject;
use taskboard_sync::types::{Id, Project, TaskDraft};
use tokio::sync::Semaphore;

/// Helper to create a fresh in-memory database for testing.
pub fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

/// One column write that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub collection: Collection,
    pub id: Id,
    pub column: String,
    pub value: FieldValue,
}

/// A store that forwards to SQLite but can hold inserts, refuse writes and
/// records every update it receives.
pub struct FlakyStore {
    db: Database,
    fail_writes: AtomicBool,
    insert_gate: Option<Semaphore>,
    updates: Mutex<Vec<RecordedUpdate>>,
}

impl FlakyStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            fail_writes: AtomicBool::new(false),
            insert_gate: None,
            updates: Mutex::new(Vec::new()),
        }
    }

    /// Every insert waits for a permit from [`FlakyStore::release_inserts`].
    pub fn gated(db: Database) -> Self {
        Self {
            insert_gate: Some(Semaphore::new(0)),
            ..Self::new(db)
        }
    }

    pub fn release_inserts(&self, count: usize) {
        if let Some(gate) = &self.insert_gate {
            gate.add_permits(count);
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn updates_to(&self, column: &str) -> Vec<RecordedUpdate> {
        self.updates()
            .into_iter()
            .filter(|u| u.column == column)
            .collect()
    }

    fn refuse(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn select(&self, collection: Collection, order: OrderBy) -> StoreResult<Vec<Row>> {
        self.db.select(collection, order).await
    }

    async fn insert(&self, row: Row) -> StoreResult<Row> {
        if let Some(gate) = &self.insert_gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.refuse()?;
        self.db.insert(row).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: Id,
        column: &str,
        value: FieldValue,
    ) -> StoreResult<()> {
        self.refuse()?;
        self.updates.lock().unwrap().push(RecordedUpdate {
            collection,
            id,
            column: column.to_string(),
            value: value.clone(),
        });
        self.db.update(collection, id, column, value).await
    }

    async fn delete(&self, collection: Collection, filter: Filter) -> StoreResult<usize> {
        self.refuse()?;
        self.db.delete(collection, filter).await
    }
}

/// Engine over a plain in-memory database.
pub async fn connect(db: &Database) -> SyncEngine {
    SyncEngine::connect(Arc::new(db.clone()), SyncConfig::default())
        .await
        .expect("initial load")
}

/// Engine over a [`FlakyStore`] wrapping `db`.
pub async fn connect_flaky(store: Arc<FlakyStore>) -> SyncEngine {
    SyncEngine::connect(store, SyncConfig::default())
        .await
        .expect("initial load")
}

/// Create a seeded project through a throwaway engine.
pub async fn seed_project(db: &Database, name: &str, key: &str) -> Project {
    let engine = connect(db).await;
    let project = engine
        .add_project(NewProject {
            name: name.into(),
            key: key.into(),
            ..Default::default()
        })
        .await
        .expect("valid project")
        .expect("store accepted project");
    engine.shutdown().await;
    project
}

pub fn draft(project: Id, title: &str) -> TaskDraft {
    TaskDraft {
        project_ids: vec![project],
        title: Some(title.into()),
        ..Default::default()
    }
}

/// Wait for the engine's cache to satisfy `ready`, failing after five seconds.
pub async fn wait_until(engine: &SyncEngine, mut ready: impl FnMut(&SyncEngine) -> bool) {
    let mut rx = engine.subscribe();
    let waiting = async {
        while !ready(engine) {
            rx.changed().await.expect("engine dropped");
        }
    };
    tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .expect("condition not reached");
}
