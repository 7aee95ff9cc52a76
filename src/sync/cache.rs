//! In-memory entity cache.
//!
//! Each entity kind lives in a [`Table`]: an arena of records addressed by a
//! stable slot key, an ordered list of slots, and an id index. Reconciling a
//! temporary id with the server's id re-points the index at the same slot, so
//! the record keeps its position and no remove/insert pair is ever observed.

use crate::error::{SyncError, SyncResult};
use crate::store::{Collection, FieldValue, Row};
use crate::types::{
    DATE_FORMAT, Id, Member, Project, Section, TaskPriority, TaskProjectLink, TaskRecord, TaskStatus, TaskType,
    WikiPage, now_ms,
};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

/// Stable address of a record inside a table, independent of its id.
pub type SlotKey = u64;

/// Ordered arena of records of one kind.
#[derive(Debug, Clone)]
pub struct Table<R> {
    slots: HashMap<SlotKey, R>,
    order: Vec<SlotKey>,
    index: HashMap<Id, SlotKey>,
    next_key: SlotKey,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            order: Vec::new(),
            index: HashMap::new(),
            next_key: 0,
        }
    }
}

impl<R: Record> Table<R> {
    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        let mut table = Self::default();
        for record in records {
            table.push_back(record);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: Id) -> Option<&R> {
        self.index.get(&id).and_then(|key| self.slots.get(key))
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut R> {
        let key = *self.index.get(&id)?;
        self.slots.get_mut(&key)
    }

    /// Slot currently holding the record with this id.
    pub fn slot_of(&self, id: Id) -> Option<SlotKey> {
        self.index.get(&id).copied()
    }

    /// Records in table order.
    pub fn iter(&self) -> impl Iterator<Item = &R> + '_ {
        self.order.iter().filter_map(|key| self.slots.get(key))
    }

    fn allocate(&mut self, record: R) -> SlotKey {
        let key = self.next_key;
        self.next_key += 1;
        self.index.insert(record.id(), key);
        self.slots.insert(key, record);
        key
    }

    pub fn push_back(&mut self, record: R) -> SlotKey {
        let key = self.allocate(record);
        self.order.push(key);
        key
    }

    pub fn push_front(&mut self, record: R) -> SlotKey {
        let key = self.allocate(record);
        self.order.insert(0, key);
        key
    }

    /// Insert a newly created record at the end its kind is displayed at.
    pub fn insert_new(&mut self, record: R) -> SlotKey {
        if R::PREPEND {
            self.push_front(record)
        } else {
            self.push_back(record)
        }
    }

    pub fn remove(&mut self, id: Id) -> Option<R> {
        let key = self.index.remove(&id)?;
        self.order.retain(|k| *k != key);
        self.slots.remove(&key)
    }

    /// Remove every record the predicate rejects, returning the removed ids.
    pub fn retain(&mut self, mut keep: impl FnMut(&R) -> bool) -> Vec<Id> {
        let doomed: Vec<Id> = self.iter().filter(|r| !keep(r)).map(|r| r.id()).collect();
        for id in &doomed {
            self.remove(*id);
        }
        doomed
    }

    /// Swap the record under `provisional` for the confirmed one, in place.
    ///
    /// If the provisional slot is gone (a reload ran meanwhile) the confirmed
    /// record replaces any copy already loaded under its own id, or is inserted
    /// fresh.
    pub fn reconcile(&mut self, provisional: Id, confirmed: R) -> SlotKey {
        let confirmed_id = confirmed.id();
        if let Some(key) = self.index.remove(&provisional) {
            // a reload may already have brought in the confirmed row
            if let Some(dup) = self.index.remove(&confirmed_id) {
                self.order.retain(|k| *k != dup);
                self.slots.remove(&dup);
            }
            self.index.insert(confirmed_id, key);
            self.slots.insert(key, confirmed);
            return key;
        }
        if let Some(key) = self.index.get(&confirmed_id).copied() {
            self.slots.insert(key, confirmed);
            return key;
        }
        self.insert_new(confirmed)
    }
}

// =============================================================================
// Record trait
// =============================================================================

/// A storage-form record the cache and mutation engine can manage generically.
pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Human-readable kind, used in logs and refusals.
    const KIND: &'static str;
    /// Whether new records are shown first (newest-first kinds).
    const PREPEND: bool = false;

    fn id(&self) -> Id;
    fn set_id(&mut self, id: Id);

    /// Apply a column-scoped change. Validates before assigning.
    fn set_column(&mut self, column: &str, value: &FieldValue) -> SyncResult<()>;

    /// Rewrite foreign keys that point at `from` so they point at `to`.
    fn remap_reference(&mut self, _from: Id, _to: Id) {}

    fn into_row(self) -> Row;
    fn from_row(row: Row) -> Option<Self>;

    fn table(cache: &EntityCache) -> &Table<Self>;
    fn table_mut(cache: &mut EntityCache) -> &mut Table<Self>;

    /// Refuse a removal that would break a cache invariant.
    fn check_removal(_cache: &EntityCache, _id: Id) -> SyncResult<()> {
        Ok(())
    }

    /// Evict records that cannot outlive this one.
    fn evict_dependents(_cache: &mut EntityCache, _id: Id) {}
}

macro_rules! impl_record {
    (
        $ty:ty => $variant:ident, $collection:ident, $kind:literal, $field:ident
        $(, prepend = $prepend:literal)?;
        $($body:tt)*
    ) => {
        impl Record for $ty {
            const COLLECTION: Collection = Collection::$collection;
            const KIND: &'static str = $kind;
            $(const PREPEND: bool = $prepend;)?

            fn id(&self) -> Id {
                self.id
            }

            fn set_id(&mut self, id: Id) {
                self.id = id;
            }

            fn into_row(self) -> Row {
                Row::$variant(self)
            }

            fn from_row(row: Row) -> Option<Self> {
                match row {
                    Row::$variant(record) => Some(record),
                    _ => None,
                }
            }

            fn table(cache: &EntityCache) -> &Table<Self> {
                &cache.$field
            }

            fn table_mut(cache: &mut EntityCache) -> &mut Table<Self> {
                &mut cache.$field
            }

            $($body)*
        }
    };
}

// =============================================================================
// Column setters
// =============================================================================

fn text(column: &str, value: &FieldValue) -> SyncResult<String> {
    match value.as_text() {
        Some(Some(s)) => Ok(s.to_string()),
        _ => Err(SyncError::invalid_value(column, format!("{} must be text", column))),
    }
}

fn opt_text(column: &str, value: &FieldValue) -> SyncResult<Option<String>> {
    value
        .as_text()
        .map(|v| v.map(str::to_string))
        .ok_or_else(|| SyncError::invalid_value(column, format!("{} must be text or null", column)))
}

fn integer(column: &str, value: &FieldValue) -> SyncResult<i64> {
    value
        .as_integer()
        .ok_or_else(|| SyncError::invalid_value(column, format!("{} must be an integer", column)))
}

fn id(column: &str, value: &FieldValue) -> SyncResult<Id> {
    match value.as_id() {
        Some(Some(id)) => Ok(id),
        _ => Err(SyncError::invalid_value(column, format!("{} must be an id", column))),
    }
}

fn opt_id(column: &str, value: &FieldValue) -> SyncResult<Option<Id>> {
    value
        .as_id()
        .ok_or_else(|| SyncError::invalid_value(column, format!("{} must be an id or null", column)))
}

fn boolean(column: &str, value: &FieldValue) -> SyncResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| SyncError::invalid_value(column, format!("{} must be a boolean", column)))
}

fn opt_date(column: &str, value: &FieldValue) -> SyncResult<Option<NaiveDate>> {
    match opt_text(column, value)? {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map(Some)
            .map_err(|_| SyncError::invalid_value(column, format!("{} must be YYYY-MM-DD", column))),
    }
}

fn remap(slot: &mut Id, from: Id, to: Id) {
    if *slot == from {
        *slot = to;
    }
}

fn remap_opt(slot: &mut Option<Id>, from: Id, to: Id) {
    if *slot == Some(from) {
        *slot = Some(to);
    }
}

impl_record! {
    Project => Project, Projects, "project", projects;

    fn set_column(&mut self, column: &str, value: &FieldValue) -> SyncResult<()> {
        match column {
            "name" => self.name = text(column, value)?,
            "description" => self.description = opt_text(column, value)?,
            "color" => self.color = opt_text(column, value)?,
            "icon" => self.icon = opt_text(column, value)?,
            "key" => return Err(SyncError::immutable_field(column)),
            _ => return Err(SyncError::unknown_field(column)),
        }
        self.updated_at = now_ms();
        Ok(())
    }

    fn evict_dependents(cache: &mut EntityCache, id: Id) {
        for task in cache.tasks.retain(|t| t.project_id != id) {
            <TaskRecord as Record>::evict_dependents(cache, task);
        }
        cache.sections.retain(|s| s.project_id != id);
        cache.statuses.retain(|s| s.project_id != id);
        cache.priorities.retain(|p| p.project_id != id);
        cache.types.retain(|t| t.project_id != id);
        cache.members.retain(|m| m.project_id != id);
        cache.links.retain(|l| l.project_id != id);
        cache.wikis.retain(|w| w.project_id != id);
    }
}

impl_record! {
    TaskRecord => Task, Tasks, "task", tasks, prepend = true;

    fn set_column(&mut self, column: &str, value: &FieldValue) -> SyncResult<()> {
        match column {
            "project_id" => self.project_id = id(column, value)?,
            "parent_id" => self.parent_id = opt_id(column, value)?,
            "section_id" => self.section_id = opt_id(column, value)?,
            "assignee_id" => self.assignee_id = opt_id(column, value)?,
            "title" => self.title = text(column, value)?,
            "description" => self.description = opt_text(column, value)?,
            "status_id" => self.status_id = id(column, value)?,
            "priority_id" => self.priority_id = opt_id(column, value)?,
            "type_id" => self.type_id = opt_id(column, value)?,
            "due_date" => self.due_date = opt_date(column, value)?,
            "completed" => self.completed = boolean(column, value)?,
            "key" => return Err(SyncError::immutable_field(column)),
            _ => return Err(SyncError::unknown_field(column)),
        }
        self.updated_at = now_ms();
        Ok(())
    }

    fn remap_reference(&mut self, from: Id, to: Id) {
        remap(&mut self.project_id, from, to);
        remap(&mut self.status_id, from, to);
        remap_opt(&mut self.parent_id, from, to);
        remap_opt(&mut self.section_id, from, to);
        remap_opt(&mut self.assignee_id, from, to);
        remap_opt(&mut self.priority_id, from, to);
        remap_opt(&mut self.type_id, from, to);
    }

    fn evict_dependents(cache: &mut EntityCache, id: Id) {
        cache.links.retain(|l| l.task_id != id);
        for child in cache.tasks.retain(|t| t.parent_id != Some(id)) {
            <TaskRecord as Record>::evict_dependents(cache, child);
        }
    }
}

impl_record! {
    Section => Section, Sections, "section", sections;

    fn set_column(&mut self, column: &str, value: &FieldValue) -> SyncResult<()> {
        match column {
            "title" => self.title = text(column, value)?,
            "order_index" => self.order_index = integer(column, value)?,
            "color" => self.color = opt_text(column, value)?,
            _ => return Err(SyncError::unknown_field(column)),
        }
        Ok(())
    }

    fn remap_reference(&mut self, from: Id, to: Id) {
        remap(&mut self.project_id, from, to);
    }

    fn check_removal(cache: &EntityCache, id: Id) -> SyncResult<()> {
        let holding = cache.tasks_in_section(id).len();
        if holding > 0 {
            return Err(SyncError::fallback_required(id, holding));
        }
        Ok(())
    }
}

macro_rules! impl_enumeration {
    ($ty:ty => $variant:ident, $collection:ident, $kind:literal, $field:ident, color = $color:ident) => {
        impl_record! {
            $ty => $variant, $collection, $kind, $field;

            fn set_column(&mut self, column: &str, value: &FieldValue) -> SyncResult<()> {
                match column {
                    "name" => self.name = text(column, value)?,
                    "position" => self.position = integer(column, value)?,
                    "color" => self.color = $color(column, value)?,
                    "icon" => self.icon = opt_text(column, value)?,
                    _ => return Err(SyncError::unknown_field(column)),
                }
                Ok(())
            }

            fn remap_reference(&mut self, from: Id, to: Id) {
                remap(&mut self.project_id, from, to);
            }
        }
    };
}

impl_enumeration!(TaskStatus => Status, TaskStatuses, "status", statuses, color = text);
impl_enumeration!(TaskPriority => Priority, TaskPriorities, "priority", priorities, color = opt_text);
impl_enumeration!(TaskType => Type, TaskTypes, "type", types, color = opt_text);

impl_record! {
    Member => Member, ProjectMembers, "member", members;

    fn set_column(&mut self, column: &str, value: &FieldValue) -> SyncResult<()> {
        match column {
            "name" => self.name = text(column, value)?,
            "email" => self.email = opt_text(column, value)?,
            "color" => self.color = opt_text(column, value)?,
            "position" => self.position = integer(column, value)?,
            _ => return Err(SyncError::unknown_field(column)),
        }
        Ok(())
    }

    fn remap_reference(&mut self, from: Id, to: Id) {
        remap(&mut self.project_id, from, to);
    }
}

impl_record! {
    TaskProjectLink => Link, TaskProjects, "task link", links;

    fn set_column(&mut self, column: &str, value: &FieldValue) -> SyncResult<()> {
        match column {
            "position" => self.position = integer(column, value)?,
            _ => return Err(SyncError::unknown_field(column)),
        }
        Ok(())
    }

    fn remap_reference(&mut self, from: Id, to: Id) {
        remap(&mut self.task_id, from, to);
        remap(&mut self.project_id, from, to);
    }

    fn check_removal(cache: &EntityCache, id: Id) -> SyncResult<()> {
        if let Some(link) = cache.links.get(id)
            && cache.links_for_task(link.task_id).len() <= 1
        {
            return Err(SyncError::last_link(link.task_id));
        }
        Ok(())
    }
}

impl_record! {
    WikiPage => Wiki, Wikis, "wiki page", wikis, prepend = true;

    fn set_column(&mut self, column: &str, value: &FieldValue) -> SyncResult<()> {
        match column {
            "title" => self.title = text(column, value)?,
            "content" => self.content = text(column, value)?,
            _ => return Err(SyncError::unknown_field(column)),
        }
        self.updated_at = now_ms();
        Ok(())
    }

    fn remap_reference(&mut self, from: Id, to: Id) {
        remap(&mut self.project_id, from, to);
    }
}

// =============================================================================
// Entity cache
// =============================================================================

/// The enumerations and members of one project, ordered by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectCatalog {
    pub statuses: Vec<TaskStatus>,
    pub priorities: Vec<TaskPriority>,
    pub types: Vec<TaskType>,
    pub members: Vec<Member>,
}

/// Session-wide cache of storage-form records.
#[derive(Debug, Clone, Default)]
pub struct EntityCache {
    pub(crate) projects: Table<Project>,
    pub(crate) tasks: Table<TaskRecord>,
    pub(crate) sections: Table<Section>,
    pub(crate) statuses: Table<TaskStatus>,
    pub(crate) priorities: Table<TaskPriority>,
    pub(crate) types: Table<TaskType>,
    pub(crate) members: Table<Member>,
    pub(crate) links: Table<TaskProjectLink>,
    pub(crate) wikis: Table<WikiPage>,
    revision: u64,
}

impl EntityCache {
    /// Build a cache from bulk-loaded rows, preserving their order.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let mut cache = Self::default();
        for row in rows {
            cache.push_row(row);
        }
        cache
    }

    /// Append a row to the table of its kind.
    pub(crate) fn push_row(&mut self, row: Row) {
        match row {
            Row::Project(r) => self.projects.push_back(r),
            Row::Task(r) => self.tasks.push_back(r),
            Row::Section(r) => self.sections.push_back(r),
            Row::Status(r) => self.statuses.push_back(r),
            Row::Priority(r) => self.priorities.push_back(r),
            Row::Type(r) => self.types.push_back(r),
            Row::Member(r) => self.members.push_back(r),
            Row::Link(r) => self.links.push_back(r),
            Row::Wiki(r) => self.wikis.push_back(r),
        };
    }

    pub fn table<R: Record>(&self) -> &Table<R> {
        R::table(self)
    }

    pub(crate) fn table_mut<R: Record>(&mut self) -> &mut Table<R> {
        R::table_mut(self)
    }

    /// Monotonic change counter, bumped by the engine on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    pub fn projects(&self) -> &Table<Project> {
        &self.projects
    }

    pub fn tasks(&self) -> &Table<TaskRecord> {
        &self.tasks
    }

    pub fn sections(&self) -> &Table<Section> {
        &self.sections
    }

    pub fn statuses(&self) -> &Table<TaskStatus> {
        &self.statuses
    }

    pub fn priorities(&self) -> &Table<TaskPriority> {
        &self.priorities
    }

    pub fn types(&self) -> &Table<TaskType> {
        &self.types
    }

    pub fn members(&self) -> &Table<Member> {
        &self.members
    }

    pub fn links(&self) -> &Table<TaskProjectLink> {
        &self.links
    }

    pub fn wikis(&self) -> &Table<WikiPage> {
        &self.wikis
    }

    /// Rewrite every foreign key pointing at a temporary id.
    pub(crate) fn remap_references(&mut self, from: Id, to: Id) {
        fn remap_table<R: Record>(table: &mut Table<R>, from: Id, to: Id) {
            for record in table.slots.values_mut() {
                record.remap_reference(from, to);
            }
        }
        remap_table(&mut self.tasks, from, to);
        remap_table(&mut self.sections, from, to);
        remap_table(&mut self.statuses, from, to);
        remap_table(&mut self.priorities, from, to);
        remap_table(&mut self.types, from, to);
        remap_table(&mut self.members, from, to);
        remap_table(&mut self.links, from, to);
        remap_table(&mut self.wikis, from, to);
    }

    /// Replace a provisional record with its confirmed version and follow the id change.
    pub(crate) fn confirm<R: Record>(&mut self, provisional: Id, confirmed: R) {
        let to = confirmed.id();
        R::table_mut(self).reconcile(provisional, confirmed);
        if provisional != to {
            self.remap_references(provisional, to);
        }
    }

    /// Sections of a project ordered by `order_index`.
    pub fn sections_for(&self, project_id: Id) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self
            .sections
            .iter()
            .filter(|s| s.project_id == project_id)
            .collect();
        sections.sort_by_key(|s| s.order_index);
        sections
    }

    /// Links of a task ordered by position; the first is canonical.
    pub fn links_for_task(&self, task_id: Id) -> Vec<&TaskProjectLink> {
        let mut links: Vec<&TaskProjectLink> =
            self.links.iter().filter(|l| l.task_id == task_id).collect();
        links.sort_by_key(|l| l.position);
        links
    }

    /// Ids of tasks (including subtasks) that point at a section.
    pub fn tasks_in_section(&self, section_id: Id) -> Vec<Id> {
        self.tasks
            .iter()
            .filter(|t| t.section_id == Some(section_id))
            .map(|t| t.id)
            .collect()
    }

    /// Owned, position-ordered enumeration sets and members of a project.
    pub fn catalog(&self, project_id: Id) -> ProjectCatalog {
        let mut catalog = ProjectCatalog {
            statuses: self
                .statuses
                .iter()
                .filter(|s| s.project_id == project_id)
                .cloned()
                .collect(),
            priorities: self
                .priorities
                .iter()
                .filter(|p| p.project_id == project_id)
                .cloned()
                .collect(),
            types: self
                .types
                .iter()
                .filter(|t| t.project_id == project_id)
                .cloned()
                .collect(),
            members: self
                .members
                .iter()
                .filter(|m| m.project_id == project_id)
                .cloned()
                .collect(),
        };
        catalog.statuses.sort_by_key(|s| s.position);
        catalog.priorities.sort_by_key(|p| p.position);
        catalog.types.sort_by_key(|t| t.position);
        catalog.members.sort_by_key(|m| m.position);
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: i64, project: i64, order: i64) -> Section {
        Section {
            id: Id(id),
            project_id: Id(project),
            title: format!("S{}", id),
            order_index: order,
            color: None,
            created_at: 0,
        }
    }

    fn task(id: i64, section: Option<i64>) -> TaskRecord {
        TaskRecord {
            id: Id(id),
            project_id: Id(1),
            parent_id: None,
            section_id: section.map(Id),
            assignee_id: None,
            key: format!("PHX-{}", id),
            title: String::new(),
            description: None,
            status_id: Id(1),
            priority_id: None,
            type_id: None,
            due_date: None,
            completed: false,
            created_at: 0,
            updated_at: 0,
            activities: vec![],
        }
    }

    fn link(id: i64, task: i64, project: i64, position: i64) -> TaskProjectLink {
        TaskProjectLink {
            id: Id(id),
            task_id: Id(task),
            project_id: Id(project),
            position,
        }
    }

    #[test]
    fn reconcile_keeps_slot_and_position() {
        let mut table = Table::from_records([section(1, 1, 0), section(2, 1, 1)]);
        table.push_front(section(-1, 1, 2));
        let slot = table.slot_of(Id(-1)).unwrap();

        table.reconcile(Id(-1), section(10, 1, 2));

        assert_eq!(table.slot_of(Id(10)), Some(slot));
        assert!(!table.contains(Id(-1)));
        let ids: Vec<Id> = table.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![Id(10), Id(1), Id(2)]);
    }

    #[test]
    fn reconcile_drops_duplicate_loaded_by_reload() {
        let mut table = Table::from_records([section(-1, 1, 0), section(10, 1, 0)]);

        table.reconcile(Id(-1), section(10, 1, 0));

        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().next().unwrap().id, Id(10));
    }

    #[test]
    fn reconcile_inserts_when_provisional_slot_is_gone() {
        let mut table: Table<TaskRecord> = Table::default();
        table.push_back(task(1, None));

        table.reconcile(Id(-5), task(2, None));

        // tasks are newest-first
        let ids: Vec<Id> = table.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![Id(2), Id(1)]);
    }

    #[test]
    fn confirm_remaps_foreign_keys() {
        let mut cache = EntityCache::default();
        cache.sections.push_back(section(-3, 1, 0));
        cache.tasks.push_back(task(-4, Some(-3)));
        cache.links.push_back(link(-5, -4, 1, 0));

        cache.confirm(Id(-3), section(30, 1, 0));
        cache.confirm(Id(-4), task(40, Some(-3)));

        let t = cache.tasks.get(Id(40)).unwrap();
        assert_eq!(t.section_id, Some(Id(30)));
        assert_eq!(cache.links.get(Id(-5)).unwrap().task_id, Id(40));
    }

    #[test]
    fn section_with_tasks_refuses_removal() {
        let mut cache = EntityCache::default();
        cache.sections.push_back(section(1, 1, 0));
        cache.tasks.push_back(task(1, Some(1)));
        cache.tasks.push_back(task(2, Some(1)));

        let err = Section::check_removal(&cache, Id(1)).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::FallbackRequired);
    }

    #[test]
    fn last_link_refuses_removal() {
        let mut cache = EntityCache::default();
        cache.links.push_back(link(1, 7, 1, 0));
        assert!(TaskProjectLink::check_removal(&cache, Id(1)).is_err());

        cache.links.push_back(link(2, 7, 2, 1));
        assert!(TaskProjectLink::check_removal(&cache, Id(1)).is_ok());
    }

    #[test]
    fn task_eviction_takes_links_and_subtasks() {
        let mut cache = EntityCache::default();
        cache.tasks.push_back(task(1, None));
        let mut child = task(2, None);
        child.parent_id = Some(Id(1));
        cache.tasks.push_back(child);
        cache.links.push_back(link(1, 1, 1, 0));
        cache.links.push_back(link(2, 2, 1, 0));

        cache.tasks.remove(Id(1));
        TaskRecord::evict_dependents(&mut cache, Id(1));

        assert!(cache.tasks.is_empty());
        assert!(cache.links.is_empty());
    }

    #[test]
    fn set_column_rejects_bad_values_without_mutating() {
        let mut t = task(1, None);
        let err = t
            .set_column("due_date", &FieldValue::Text("31/12/2024".into()))
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("due_date"));
        assert_eq!(t.due_date, None);

        t.set_column("due_date", &FieldValue::Text("2024-12-31".into()))
            .unwrap();
        assert_eq!(t.due_date, NaiveDate::from_ymd_opt(2024, 12, 31));

        assert!(t.set_column("key", &FieldValue::Text("X-1".into())).is_err());
    }

    #[test]
    fn catalog_orders_by_position() {
        let mut cache = EntityCache::default();
        for (id, pos) in [(1, 3), (2, 1), (3, 2)] {
            cache.statuses.push_back(TaskStatus {
                id: Id(id),
                project_id: Id(1),
                name: format!("s{}", id),
                position: pos,
                color: "slate".into(),
                icon: None,
            });
        }
        let names: Vec<String> = cache
            .catalog(Id(1))
            .statuses
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["s2", "s3", "s1"]);
    }
}
