//! Integration tests for the sync engine against the SQLite reference store.
//!
//! Covers optimistic creation and reconciliation, rollback on remote failure,
//! debounced writes, section deletion with fallback, project links and
//! self-heal.

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use taskboard_sync::defaults::PENDING_KEY;
use taskboard_sync::error::ErrorCode;
use taskboard_sync::store::{Collection, FieldValue, Filter, RemoteStore, Row};
use taskboard_sync::sync::projects::NewProject;
use taskboard_sync::sync::{SortState, SyncEngine};
use taskboard_sync::types::{Id, Project, TaskField};

fn section_ids(engine: &SyncEngine, project: Id) -> Vec<Id> {
    engine.read(|cache| cache.sections_for(project).iter().map(|s| s.id).collect())
}

mod optimistic_create_tests {
    use super::*;

    #[tokio::test]
    async fn task_is_visible_before_the_store_confirms_it() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let store = Arc::new(FlakyStore::gated(db.clone()));
        let engine = connect_flaky(store.clone()).await;

        let worker = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.add_task(draft(project.id, "Wire login")).await })
        };

        wait_until(&engine, |e| e.read(|cache| !cache.tasks().is_empty())).await;
        let view = engine.project_view(SortState::default());
        assert_eq!(view.tasks.len(), 1);
        let pending = &view.tasks[0];
        assert!(pending.is_temp);
        assert!(pending.id.is_temporary());
        assert_eq!(pending.key, PENDING_KEY);
        assert_eq!(pending.title, "Wire login");
        assert_eq!(pending.status, "Not Started");

        // task, then its link
        store.release_inserts(2);
        let confirmed = worker.await.unwrap().unwrap().expect("store accepted task");

        assert!(!confirmed.is_temp);
        assert!(confirmed.id.get() > 0);
        assert_eq!(confirmed.key, "PHX-1");
        assert_eq!(confirmed.project_ids, vec![project.id]);
    }

    #[tokio::test]
    async fn reload_during_create_keeps_the_task_linked() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let store = Arc::new(FlakyStore::gated(db.clone()));
        let engine = connect_flaky(store.clone()).await;

        let worker = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.add_task(draft(project.id, "Wire login")).await })
        };
        wait_until(&engine, |e| e.read(|cache| !cache.tasks().is_empty())).await;

        // the reload drops the provisional task and its link
        engine.reload().await;
        assert!(engine.read(|cache| cache.tasks().is_empty() && cache.links().is_empty()));

        store.release_inserts(2);
        let confirmed = worker.await.unwrap().unwrap().expect("store accepted task");
        assert_eq!(confirmed.project_ids, vec![project.id]);
        engine.read(|cache| {
            let links = cache.links_for_task(confirmed.id);
            assert_eq!(links.len(), 1);
            assert!(!links[0].id.is_temporary());
        });

        let reloaded = connect(&db).await;
        let view = reloaded.project_view(SortState::default());
        assert_eq!(view.tasks.len(), 1);
        assert_eq!(view.tasks[0].id, confirmed.id);
        assert_eq!(view.tasks[0].project_ids, vec![project.id]);
    }

    #[tokio::test]
    async fn reconciliation_leaves_exactly_one_record() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;

        let task = engine
            .add_task(draft(project.id, "Wire login"))
            .await
            .unwrap()
            .unwrap();

        engine.read(|cache| {
            assert_eq!(cache.tasks().len(), 1);
            assert!(cache.tasks().contains(task.id));
            let links = cache.links_for_task(task.id);
            assert_eq!(links.len(), 1);
            assert!(links.iter().all(|l| !l.id.is_temporary()));
        });

        // A reload brings the same row back; still one record.
        engine.load_all().await.unwrap();
        assert_eq!(engine.read(|cache| cache.tasks().len()), 1);
        assert_eq!(engine.task_view(task.id).unwrap().key, "PHX-1");
    }

    #[tokio::test]
    async fn keys_increase_per_project() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;

        let first = engine.add_task(draft(project.id, "one")).await.unwrap().unwrap();
        let second = engine.add_task(draft(project.id, "two")).await.unwrap().unwrap();

        assert_eq!(first.key, "PHX-1");
        assert_eq!(second.key, "PHX-2");
    }

    #[tokio::test]
    async fn failed_create_evicts_the_optimistic_record() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let store = Arc::new(FlakyStore::new(db.clone()));
        let engine = connect_flaky(store.clone()).await;

        store.fail_writes(true);
        let result = engine.add_task(draft(project.id, "doomed")).await.unwrap();

        assert!(result.is_none());
        engine.read(|cache| {
            assert!(cache.tasks().is_empty());
            assert!(cache.links().is_empty());
        });
    }

    #[tokio::test]
    async fn subtask_requires_existing_parent() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;

        let mut child = draft(project.id, "orphan");
        child.parent_id = Some(Id(404));
        let err = engine.add_task(child).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskNotFound);
    }
}

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn failed_update_is_rolled_back_by_reload() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let store = Arc::new(FlakyStore::new(db.clone()));
        let engine = connect_flaky(store.clone()).await;
        let task = engine.add_task(draft(project.id, "t")).await.unwrap().unwrap();

        store.fail_writes(true);
        engine
            .update_task(task.id, TaskField::Status("Done".into()))
            .await
            .unwrap();

        assert_eq!(engine.task_view(task.id).unwrap().status, "Not Started");
    }

    #[tokio::test]
    async fn unknown_status_is_refused_without_mutation() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;
        let task = engine.add_task(draft(project.id, "t")).await.unwrap().unwrap();
        let revision = engine.revision();

        let err = engine
            .update_task(task.id, TaskField::Status("Blocked".into()))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidFieldValue);
        assert_eq!(engine.revision(), revision);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_title_edits_coalesce_into_one_write() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let store = Arc::new(FlakyStore::new(db.clone()));
        let engine = connect_flaky(store.clone()).await;
        let task = engine.add_task(draft(project.id, "t")).await.unwrap().unwrap();

        for title in ["W", "Wi", "Wire login"] {
            engine
                .update_task(task.id, TaskField::Title(title.into()))
                .await
                .unwrap();
            assert_eq!(engine.task_view(task.id).unwrap().title, title);
            tokio::time::sleep(Duration::from_millis(400)).await;
        }

        // 700ms after the last edit
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.updates_to("title").is_empty());
        assert_eq!(engine.pending_writes(), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let writes = store.updates_to("title");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].value, FieldValue::Text("Wire login".into()));
        assert_eq!(engine.pending_writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_pending_writes() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let store = Arc::new(FlakyStore::new(db.clone()));
        let engine = connect_flaky(store.clone()).await;
        let task = engine.add_task(draft(project.id, "t")).await.unwrap().unwrap();

        engine
            .update_task(task.id, TaskField::Description(Some("notes".into())))
            .await
            .unwrap();
        engine.shutdown().await;

        assert_eq!(store.updates_to("description").len(), 1);
        let reloaded = connect(&db).await;
        assert_eq!(
            reloaded.task_view(task.id).unwrap().description.as_deref(),
            Some("notes")
        );
    }

    #[tokio::test]
    async fn toggle_completion_moves_status_to_the_ends() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;
        let task = engine.add_task(draft(project.id, "t")).await.unwrap().unwrap();

        assert!(engine.toggle_task_completion(task.id).await.unwrap());
        let done = engine.task_view(task.id).unwrap();
        assert!(done.completed);
        assert_eq!(done.status, "Done");

        assert!(!engine.toggle_task_completion(task.id).await.unwrap());
        let reopened = engine.task_view(task.id).unwrap();
        assert!(!reopened.completed);
        assert_eq!(reopened.status, "Not Started");
    }
}

mod delete_tests {
    use super::*;

    #[tokio::test]
    async fn deleting_a_task_removes_subtasks_and_links() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;
        let parent = engine.add_task(draft(project.id, "epic")).await.unwrap().unwrap();
        let mut child = draft(project.id, "story");
        child.parent_id = Some(parent.id);
        let child = engine.add_task(child).await.unwrap().unwrap();
        assert_eq!(engine.subtasks_of(parent.id).len(), 1);

        engine.delete_task(parent.id).await.unwrap();

        engine.read(|cache| {
            assert!(!cache.tasks().contains(parent.id));
            assert!(!cache.tasks().contains(child.id));
            assert!(cache.links().is_empty());
        });
        let reloaded = connect(&db).await;
        assert!(reloaded.read(|cache| cache.tasks().is_empty()));
    }

    #[tokio::test]
    async fn failed_delete_restores_the_record() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let store = Arc::new(FlakyStore::new(db.clone()));
        let engine = connect_flaky(store.clone()).await;
        let task = engine.add_task(draft(project.id, "t")).await.unwrap().unwrap();

        store.fail_writes(true);
        engine.delete_task(task.id).await.unwrap();

        assert!(engine.task_view(task.id).is_some());
    }

    #[tokio::test]
    async fn section_with_tasks_needs_a_fallback() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;
        let sections = section_ids(&engine, project.id);
        let task = engine.add_task(draft(project.id, "t")).await.unwrap().unwrap();
        assert_eq!(task.section_id, sections[0].to_string());

        let err = engine.delete_section(sections[0], None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::FallbackRequired);

        let err = engine
            .delete_section(sections[0], Some(sections[0]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFallback);

        assert_eq!(section_ids(&engine, project.id).len(), 3);
    }

    #[tokio::test]
    async fn section_delete_moves_tasks_to_the_fallback() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;
        let sections = section_ids(&engine, project.id);
        let a = engine.add_task(draft(project.id, "a")).await.unwrap().unwrap();
        let b = engine.add_task(draft(project.id, "b")).await.unwrap().unwrap();

        engine.delete_section(sections[0], Some(sections[2])).await.unwrap();

        assert_eq!(section_ids(&engine, project.id), sections[1..].to_vec());
        for id in [a.id, b.id] {
            assert_eq!(engine.task_view(id).unwrap().section_id, sections[2].to_string());
        }
        let reloaded = connect(&db).await;
        assert_eq!(
            reloaded.task_view(a.id).unwrap().section_id,
            sections[2].to_string()
        );
    }

    #[tokio::test]
    async fn fallback_must_belong_to_the_same_project() {
        let db = setup_db();
        let phoenix = seed_project(&db, "Phoenix", "PHX").await;
        let atlas = seed_project(&db, "Atlas", "ATL").await;
        let engine = connect(&db).await;
        let here = section_ids(&engine, phoenix.id);
        let there = section_ids(&engine, atlas.id);
        engine.add_task(draft(phoenix.id, "t")).await.unwrap().unwrap();

        let err = engine.delete_section(here[0], Some(there[0])).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFallback);
    }

    #[tokio::test]
    async fn empty_section_deletes_without_fallback() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;
        let sections = section_ids(&engine, project.id);

        engine.delete_section(sections[1], None).await.unwrap();
        assert_eq!(section_ids(&engine, project.id).len(), 2);
    }
}

mod link_tests {
    use super::*;

    #[tokio::test]
    async fn last_link_cannot_be_removed() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;
        let task = engine.add_task(draft(project.id, "t")).await.unwrap().unwrap();

        let err = engine.unlink_task(task.id, project.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::LastProjectLink);
        assert_eq!(engine.read(|cache| cache.links_for_task(task.id).len()), 1);
    }

    #[tokio::test]
    async fn linked_task_shows_in_both_projects() {
        let db = setup_db();
        let phoenix = seed_project(&db, "Phoenix", "PHX").await;
        let atlas = seed_project(&db, "Atlas", "ATL").await;
        let engine = connect(&db).await;
        let task = engine.add_task(draft(phoenix.id, "shared")).await.unwrap().unwrap();

        let link = engine.link_task(task.id, atlas.id).await.unwrap().unwrap();
        let again = engine.link_task(task.id, atlas.id).await.unwrap().unwrap();
        assert_eq!(link.id, again.id);

        engine.activate_project(atlas.id).await.unwrap();
        let view = engine.project_view(SortState::default());
        assert_eq!(view.tasks.len(), 1);
        assert_eq!(view.tasks[0].project_ids, vec![phoenix.id, atlas.id]);

        engine.unlink_task(task.id, phoenix.id).await.unwrap();
        assert_eq!(engine.task_view(task.id).unwrap().project_ids, vec![atlas.id]);
    }
}

mod project_tests {
    use super::*;

    #[tokio::test]
    async fn new_project_is_seeded_and_activated() {
        let db = setup_db();
        let engine = connect(&db).await;
        assert_eq!(engine.active_project(), None);

        let project = engine
            .add_project(NewProject {
                name: "Phoenix".into(),
                key: "phx".into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(project.key, "PHX");
        assert_eq!(engine.active_project(), Some(project.id));
        let view = engine.project_view(SortState::default());
        assert_eq!(view.statuses.len(), 3);
        assert_eq!(view.priorities.len(), 3);
        assert_eq!(view.types.len(), 4);
        let titles: Vec<_> = view.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Not Started", "In Progress", "Done"]);
    }

    #[tokio::test]
    async fn duplicate_keys_are_refused() {
        let db = setup_db();
        seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;

        let err = engine
            .add_project(NewProject {
                name: "Other".into(),
                key: "PHX".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("key"));
    }

    #[tokio::test]
    async fn project_key_is_immutable() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;

        let err = engine
            .update_project(project.id, "key", "NEW".into())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ImmutableField);
        engine
            .update_project(project.id, "name", "Phoenix 2".into())
            .await
            .unwrap();
        assert_eq!(
            engine.read(|cache| cache.projects().get(project.id).unwrap().name.clone()),
            "Phoenix 2"
        );
    }

    #[tokio::test]
    async fn assignee_resolves_through_members() {
        let db = setup_db();
        let project = seed_project(&db, "Phoenix", "PHX").await;
        let engine = connect(&db).await;
        engine.add_member(project.id, "Ada", None).await.unwrap().unwrap();

        let mut task = draft(project.id, "t");
        task.assignees = vec!["Ada".into()];
        let task = engine.add_task(task).await.unwrap().unwrap();
        assert_eq!(task.assignees, vec!["Ada".to_string()]);

        engine
            .update_task(task.id, TaskField::Assignees(vec![]))
            .await
            .unwrap();
        assert!(engine.task_view(task.id).unwrap().assignees.is_empty());
    }
}

mod heal_tests {
    use super::*;

    /// A project inserted behind the engine's back, with no enumerations.
    async fn bare_project(db: &taskboard_sync::db::Database) -> Project {
        let row = db
            .insert(Row::Project(Project {
                id: Id(0),
                name: "Bare".into(),
                key: "BARE".into(),
                description: None,
                color: None,
                icon: None,
                current_task_number: 0,
                created_at: 0,
                updated_at: 0,
            }))
            .await
            .unwrap();
        match row {
            Row::Project(project) => project,
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_enumerations_are_seeded_once() {
        let db = setup_db();
        let project = bare_project(&db).await;
        let engine = connect(&db).await;

        let counts = |engine: &SyncEngine| {
            engine.read(|cache| {
                let catalog = cache.catalog(project.id);
                (catalog.statuses.len(), catalog.priorities.len(), catalog.types.len())
            })
        };
        assert_eq!(counts(&engine), (3, 3, 4));

        engine.load_all().await.unwrap();
        assert_eq!(counts(&engine), (3, 3, 4));
    }

    #[tokio::test]
    async fn heal_is_not_retried_within_a_session() {
        let db = setup_db();
        let project = bare_project(&db).await;
        let engine = connect(&db).await;

        db.delete(Collection::TaskPriorities, Filter::Column("project_id", project.id))
            .await
            .unwrap();
        engine.load_all().await.unwrap();

        assert!(engine.read(|cache| cache.catalog(project.id).priorities.is_empty()));
    }

    #[tokio::test]
    async fn inactive_projects_get_no_statuses() {
        let db = setup_db();
        let first = seed_project(&db, "Phoenix", "PHX").await;
        let bare = bare_project(&db).await;
        let engine = connect(&db).await;
        assert_eq!(engine.active_project(), Some(first.id));

        engine.read(|cache| {
            let catalog = cache.catalog(bare.id);
            assert!(catalog.statuses.is_empty());
            assert_eq!(catalog.priorities.len(), 3);
        });

        engine.activate_project(bare.id).await.unwrap();
        assert_eq!(engine.read(|cache| cache.catalog(bare.id).statuses.len()), 3);
    }

    #[tokio::test]
    async fn task_in_project_without_statuses_is_refused() {
        let db = setup_db();
        let seeded = seed_project(&db, "Phoenix", "PHX").await;
        let bare = bare_project(&db).await;
        let engine = connect(&db).await;
        assert_eq!(engine.active_project(), Some(seeded.id));

        let err = engine.add_task(draft(bare.id, "t")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NoStatuses);
    }
}
