//! Derived, read-only projections over an [`EntityCache`] snapshot.
//!
//! Nothing here holds state: every projection is recomputed from the cache it
//! is given, so callers rebuild views whenever the cache revision moves.

use super::cache::{EntityCache, ProjectCatalog};
use super::mapper::TaskMapper;
use crate::types::{
    Id, Member, Project, SectionView, TaskPriority, TaskRecord, TaskStatus, TaskType, TaskView,
    WikiPage,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Field a task list can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Key,
    Title,
    Assignees,
    Status,
    Priority,
    Type,
    Due,
    CreatedAt,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Key => "key",
            SortKey::Title => "title",
            SortKey::Assignees => "assignees",
            SortKey::Status => "status",
            SortKey::Priority => "priority",
            SortKey::Type => "type",
            SortKey::Due => "due",
            SortKey::CreatedAt => "created_at",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "key" => Ok(SortKey::Key),
            "title" => Ok(SortKey::Title),
            "assignee" | "assignees" => Ok(SortKey::Assignees),
            "status" => Ok(SortKey::Status),
            "priority" => Ok(SortKey::Priority),
            "type" => Ok(SortKey::Type),
            "due" | "due_date" => Ok(SortKey::Due),
            "created" | "created_at" | "createdat" => Ok(SortKey::CreatedAt),
            _ => Err(format!(
                "Invalid sort key '{}'. Valid: key, title, assignees, status, priority, type, due, created_at",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// The caller's current sort choice. Defaults to newest-created first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: SortKey::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl SortState {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Same key flips the order; a different key starts ascending.
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.order = match self.order {
                SortOrder::Asc => SortOrder::Desc,
                SortOrder::Desc => SortOrder::Asc,
            };
        } else {
            self.key = key;
            self.order = SortOrder::Asc;
        }
    }
}

/// Everything presentation code needs to render one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub project: Option<Project>,
    pub sections: Vec<SectionView>,
    pub tasks: Vec<TaskView>,
    pub statuses: Vec<TaskStatus>,
    pub priorities: Vec<TaskPriority>,
    pub types: Vec<TaskType>,
    pub members: Vec<Member>,
    pub wiki_pages: Vec<WikiPage>,
    pub sort: SortState,
}

/// Ordered sections of a project; empty when it has none.
pub fn sections_for(cache: &EntityCache, project_id: Id) -> Vec<SectionView> {
    cache
        .sections_for(project_id)
        .into_iter()
        .map(SectionView::from)
        .collect()
}

/// Maps tasks to view form, resolving each against its owning project's sets.
struct ViewMapper<'c> {
    cache: &'c EntityCache,
    catalogs: HashMap<Id, ProjectCatalog>,
    default_section: Option<Id>,
}

impl<'c> ViewMapper<'c> {
    fn new(cache: &'c EntityCache, project_id: Id) -> Self {
        Self {
            cache,
            catalogs: HashMap::new(),
            default_section: cache.sections_for(project_id).first().map(|s| s.id),
        }
    }

    fn view(&mut self, task: &TaskRecord) -> TaskView {
        let cache = self.cache;
        let catalog = self
            .catalogs
            .entry(task.project_id)
            .or_insert_with(|| cache.catalog(task.project_id));
        let links = cache.links_for_task(task.id);
        TaskMapper::new(&catalog.statuses, &catalog.priorities, &catalog.types)
            .with_members(&catalog.members)
            .with_default_section(self.default_section)
            .to_view(task, &links)
    }
}

/// Top-level tasks linked to the project, in cache order and view form.
pub fn visible_tasks(cache: &EntityCache, project_id: Id) -> Vec<TaskView> {
    let linked: HashSet<Id> = cache
        .links()
        .iter()
        .filter(|l| l.project_id == project_id)
        .map(|l| l.task_id)
        .collect();

    let mut mapper = ViewMapper::new(cache, project_id);
    cache
        .tasks()
        .iter()
        .filter(|t| t.parent_id.is_none() && linked.contains(&t.id))
        .map(|t| mapper.view(t))
        .collect()
}

/// Direct children of a task, newest first.
pub fn subtasks_of(cache: &EntityCache, task_id: Id) -> Vec<TaskView> {
    let Some(parent) = cache.tasks().get(task_id) else {
        return Vec::new();
    };
    let mut mapper = ViewMapper::new(cache, parent.project_id);
    let mut children: Vec<TaskView> = cache
        .tasks()
        .iter()
        .filter(|t| t.parent_id == Some(task_id))
        .map(|t| mapper.view(t))
        .collect();
    children.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    children
}

fn sort_value(task: &TaskView, key: SortKey) -> &str {
    match key {
        SortKey::Key => &task.key,
        SortKey::Title => &task.title,
        SortKey::Assignees => task.assignees.first().map_or("", String::as_str),
        SortKey::Status => &task.status,
        SortKey::Priority => &task.priority,
        SortKey::Type => &task.task_type,
        SortKey::Due => task.due.as_deref().unwrap_or(""),
        SortKey::CreatedAt => "",
    }
}

fn compare(a: &TaskView, b: &TaskView, sort: SortState) -> Ordering {
    let newest_first = b.created_at.cmp(&a.created_at);
    match sort.key {
        SortKey::CreatedAt => sort.order.apply(a.created_at.cmp(&b.created_at)),
        key => {
            let ordering = sort_value(a, key).cmp(sort_value(b, key));
            if ordering == Ordering::Equal {
                newest_first
            } else {
                sort.order.apply(ordering)
            }
        }
    }
}

/// Group tasks by section, then sort within each group.
///
/// Groups follow `sections`; tasks in unknown sections come after, grouped
/// in first-appearance order. Sorting never moves a task out of its group.
pub fn sort_tasks(tasks: Vec<TaskView>, sections: &[SectionView], sort: SortState) -> Vec<TaskView> {
    let mut groups: Vec<(String, Vec<TaskView>)> = sections
        .iter()
        .map(|s| (s.id.clone(), Vec::new()))
        .collect();

    for task in tasks {
        match groups.iter_mut().find(|(id, _)| *id == task.section_id) {
            Some((_, group)) => group.push(task),
            None => groups.push((task.section_id.clone(), vec![task])),
        }
    }

    groups
        .into_iter()
        .flat_map(|(_, mut group)| {
            group.sort_by(|a, b| compare(a, b, sort));
            group
        })
        .collect()
}

/// Assemble the full projection of a project.
pub fn project_view(cache: &EntityCache, project_id: Option<Id>, sort: SortState) -> ProjectView {
    let Some(project_id) = project_id else {
        return ProjectView {
            project: None,
            sections: Vec::new(),
            tasks: Vec::new(),
            statuses: Vec::new(),
            priorities: Vec::new(),
            types: Vec::new(),
            members: Vec::new(),
            wiki_pages: Vec::new(),
            sort,
        };
    };

    let sections = sections_for(cache, project_id);
    let tasks = sort_tasks(visible_tasks(cache, project_id), &sections, sort);
    let catalog = cache.catalog(project_id);

    ProjectView {
        project: cache.projects().get(project_id).cloned(),
        sections,
        tasks,
        statuses: catalog.statuses,
        priorities: catalog.priorities,
        types: catalog.types,
        members: catalog.members,
        wiki_pages: cache
            .wikis()
            .iter()
            .filter(|w| w.project_id == project_id)
            .cloned()
            .collect(),
        sort,
    }
}
