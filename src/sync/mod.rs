//! Client-side synchronization layer.
//!
//! [`SyncEngine`] owns the entity cache and is the only writer to it. Every
//! mutation is applied to the cache synchronously, before the first await, and
//! then persisted through the [`RemoteStore`]. Remote failures never reach the
//! caller: a failed create evicts its provisional record, a failed update or
//! delete reloads the whole cache from the store.

pub mod bootstrap;
pub mod cache;
pub mod debounce;
pub mod mapper;
pub mod projects;
pub mod sections;
pub mod tasks;
pub mod views;

pub use bootstrap::HealKind;
pub use cache::{EntityCache, ProjectCatalog, Record, SlotKey, Table};
pub use debounce::{Debouncer, WriteKey};
pub use mapper::{StoragePayload, TaskMapper, new_optimistic_view};
pub use views::{ProjectView, SortKey, SortOrder, SortState};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::store::{FieldValue, Filter, RemoteStore};
use crate::types::Id;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Mutable session state guarded by one lock.
#[derive(Debug, Default)]
struct Session {
    cache: EntityCache,
    active_project: Option<Id>,
    /// Missing-data conditions already healed this session.
    healed: HashSet<(Id, HealKind)>,
}

struct Inner {
    store: Arc<dyn RemoteStore>,
    settings: SyncConfig,
    session: Mutex<Session>,
    debouncer: Debouncer,
    next_temp_id: AtomicI64,
    revision: watch::Sender<u64>,
}

/// Shared handle to the cache and mutation engine. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("revision", &self.revision())
            .field("active_project", &self.active_project())
            .field("debouncer", &self.inner.debouncer)
            .finish()
    }
}

impl SyncEngine {
    /// Create an engine with an empty cache. Call [`SyncEngine::load_all`] to populate it.
    pub fn new(store: Arc<dyn RemoteStore>, settings: SyncConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                debouncer: Debouncer::new(settings.debounce_window()),
                store,
                settings,
                session: Mutex::new(Session::default()),
                next_temp_id: AtomicI64::new(-1),
                revision,
            }),
        }
    }

    /// Create an engine and run the initial load.
    pub async fn connect(store: Arc<dyn RemoteStore>, settings: SyncConfig) -> SyncResult<Self> {
        let engine = Self::new(store, settings);
        engine.load_all().await.map_err(SyncError::store)?;
        Ok(engine)
    }

    pub(crate) fn store(&self) -> &dyn RemoteStore {
        self.inner.store.as_ref()
    }

    pub fn settings(&self) -> &SyncConfig {
        &self.inner.settings
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.inner.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read from the cache under the lock.
    pub fn read<T>(&self, f: impl FnOnce(&EntityCache) -> T) -> T {
        f(&self.session().cache)
    }

    /// Mutate the cache and publish a new revision.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&mut EntityCache) -> T) -> T {
        let (result, revision) = {
            let mut session = self.session();
            let result = f(&mut session.cache);
            let revision = session.cache.revision() + 1;
            session.cache.set_revision(revision);
            (result, revision)
        };
        self.inner.revision.send_replace(revision);
        result
    }

    /// Like [`SyncEngine::write`], but publishes only when `f` succeeds.
    /// `f` must validate before it mutates.
    pub(crate) fn try_write<T>(
        &self,
        f: impl FnOnce(&mut EntityCache) -> SyncResult<T>,
    ) -> SyncResult<T> {
        let (result, revision) = {
            let mut session = self.session();
            let result = f(&mut session.cache)?;
            let revision = session.cache.revision() + 1;
            session.cache.set_revision(revision);
            (result, revision)
        };
        self.inner.revision.send_replace(revision);
        Ok(result)
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        f(&mut self.session())
    }

    /// Current cache revision.
    pub fn revision(&self) -> u64 {
        self.read(|cache| cache.revision())
    }

    /// Receiver that observes every new cache revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// An owned copy of the whole cache.
    pub fn snapshot(&self) -> EntityCache {
        self.read(|cache| cache.clone())
    }

    pub fn active_project(&self) -> Option<Id> {
        self.with_session(|s| s.active_project)
    }

    pub(crate) fn set_active_project(&self, project: Option<Id>) {
        self.with_session(|s| s.active_project = project);
        self.write(|_| ());
    }

    /// Projection of the active project under the given sort.
    pub fn project_view(&self, sort: SortState) -> ProjectView {
        let session = self.session();
        views::project_view(&session.cache, session.active_project, sort)
    }

    /// Next temporary id. Strictly decreasing, never positive.
    pub(crate) fn next_temp_id(&self) -> Id {
        Id(self.inner.next_temp_id.fetch_sub(1, Ordering::Relaxed))
    }

    /// Number of debounced writes not yet sent.
    pub fn pending_writes(&self) -> usize {
        self.inner.debouncer.pending()
    }

    /// Send every debounced write now.
    pub async fn flush(&self) {
        self.inner.debouncer.flush().await;
    }

    /// Flush pending writes and drop the cache.
    pub async fn shutdown(&self) {
        self.flush().await;
        self.with_session(|s| {
            s.cache = EntityCache::default();
            s.active_project = None;
        });
        self.write(|_| ());
        info!("sync engine shut down");
    }

    // =========================================================================
    // Generic mutations
    // =========================================================================

    /// Insert optimistically, then confirm with the store.
    ///
    /// Returns the confirmed record, or `None` if the store refused the insert
    /// (the provisional record is evicted in that case).
    pub async fn create<R: Record>(&self, mut draft: R) -> Option<R> {
        let temp_id = self.next_temp_id();
        draft.set_id(temp_id);
        self.write(|cache| {
            cache.table_mut::<R>().insert_new(draft.clone());
        });
        debug!(kind = R::KIND, %temp_id, "optimistic insert");

        self.confirm_insert(temp_id, draft).await
    }

    /// Send a provisional record to the store and reconcile the result.
    pub(crate) async fn confirm_insert<R: Record>(&self, temp_id: Id, draft: R) -> Option<R> {
        let result = self.store().insert(draft.into_row()).await;
        match result.map(R::from_row) {
            Ok(Some(confirmed)) => {
                let id = confirmed.id();
                self.write(|cache| cache.confirm(temp_id, confirmed.clone()));
                debug!(kind = R::KIND, %temp_id, %id, "insert confirmed");
                Some(confirmed)
            }
            Ok(None) => {
                warn!(kind = R::KIND, %temp_id, "store returned a row of another kind; discarding");
                self.evict::<R>(temp_id);
                None
            }
            Err(err) => {
                warn!(kind = R::KIND, %temp_id, error = %err, "remote insert failed; discarding optimistic record");
                self.evict::<R>(temp_id);
                None
            }
        }
    }

    /// Insert without an optimistic step; the record appears once the store confirms it.
    pub(crate) async fn insert_confirmed<R: Record>(&self, record: R) -> Option<R> {
        match self.store().insert(record.into_row()).await.map(R::from_row) {
            Ok(Some(confirmed)) => {
                self.write(|cache| {
                    cache.table_mut::<R>().insert_new(confirmed.clone());
                });
                Some(confirmed)
            }
            Ok(None) => {
                warn!(kind = R::KIND, "store returned a row of another kind");
                None
            }
            Err(err) => {
                warn!(kind = R::KIND, error = %err, "remote insert failed");
                None
            }
        }
    }

    fn evict<R: Record>(&self, id: Id) {
        self.write(|cache| {
            cache.table_mut::<R>().remove(id);
            R::evict_dependents(cache, id);
        });
    }

    /// Set one column on a cached record, then persist it.
    ///
    /// Debounced columns return as soon as the cache is updated; other columns
    /// return after the remote write (or the rollback reload) completes.
    pub async fn update<R: Record>(
        &self,
        id: Id,
        column: &str,
        value: FieldValue,
    ) -> SyncResult<()> {
        if id.is_temporary() {
            return Err(SyncError::pending(R::KIND, id));
        }

        self.try_write(|cache| {
            let record = cache
                .table_mut::<R>()
                .get_mut(id)
                .ok_or_else(|| SyncError::record_not_found(R::KIND, id))?;
            record.set_column(column, &value)
        })?;
        debug!(kind = R::KIND, %id, column, %value, "optimistic update");

        if self.inner.settings.is_debounced(column) {
            let engine = self.clone();
            let key = WriteKey::new(R::COLLECTION, id, column);
            let column = column.to_string();
            self.inner.debouncer.schedule(key, async move {
                engine.persist_update::<R>(id, &column, value).await;
            });
        } else {
            self.persist_update::<R>(id, column, value).await;
        }
        Ok(())
    }

    async fn persist_update<R: Record>(&self, id: Id, column: &str, value: FieldValue) {
        if let Err(err) = self.store().update(R::COLLECTION, id, column, value).await {
            warn!(kind = R::KIND, %id, column, error = %err, "remote update failed; reloading");
            self.reload().await;
        }
    }

    /// Evict a record (and its dependents) from the cache, then delete it remotely.
    pub async fn remove<R: Record>(&self, id: Id) -> SyncResult<()> {
        if id.is_temporary() {
            return Err(SyncError::pending(R::KIND, id));
        }

        self.try_write(|cache| {
            if !cache.table::<R>().contains(id) {
                return Err(SyncError::record_not_found(R::KIND, id));
            }
            R::check_removal(cache, id)?;
            cache.table_mut::<R>().remove(id);
            R::evict_dependents(cache, id);
            Ok(())
        })?;
        self.inner.debouncer.cancel_record(R::COLLECTION, id);
        debug!(kind = R::KIND, %id, "optimistic remove");

        if let Err(err) = self.store().delete(R::COLLECTION, Filter::Id(id)).await {
            warn!(kind = R::KIND, %id, error = %err, "remote delete failed; reloading");
            self.reload().await;
        }
        Ok(())
    }
}
