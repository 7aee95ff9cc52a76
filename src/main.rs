//! taskboard
//!
//! Command-line front end over the sync engine: each invocation loads the
//! board, performs one operation, flushes pending writes and prints the result.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::sync::Arc;
use taskboard_sync::cli::{AddProjectArgs, AddTaskArgs, BoardArgs, Cli, Command, WikiArgs};
use taskboard_sync::config::Config;
use taskboard_sync::db::Database;
use taskboard_sync::format::{
    OutputFormat, format_board_markdown, format_projects_markdown, format_task_markdown,
    format_wiki_markdown, to_json,
};
use taskboard_sync::logging::{self, LogTarget};
use taskboard_sync::sync::projects::NewProject;
use taskboard_sync::sync::{SortKey, SortOrder, SortState, SyncEngine};
use taskboard_sync::types::{Id, TaskDraft, TaskField};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let target: LogTarget = cli.log.parse()?;
    logging::init(&target, cli.verbose)?;

    let mut config = Config::load_or_default(cli.config.as_deref())?;

    // Override paths from CLI arguments
    if let Some(db_path) = &cli.database {
        config.store.db_path = db_path.clone();
    }
    config.ensure_db_dir()?;

    let db = Database::open(&config.store.db_path)
        .with_context(|| format!("opening {}", config.store.db_path.display()))?;
    info!(db = %config.store.db_path.display(), "database opened");

    let engine = SyncEngine::connect(Arc::new(db), config.sync.clone()).await?;
    if let Some(project) = cli.project {
        engine.activate_project(project).await?;
    }

    let outcome = run(&engine, &config, cli.format, cli.command).await;

    // Send debounced writes before the process exits
    debug!(pending = engine.pending_writes(), "flushing before exit");
    engine.shutdown().await;

    println!("{}", outcome?);
    Ok(())
}

fn active(engine: &SyncEngine) -> Result<Id> {
    engine
        .active_project()
        .ok_or_else(|| anyhow!("no project yet; create one with `taskboard add-project`"))
}

fn board(engine: &SyncEngine, sort: SortState, format: OutputFormat) -> Result<String> {
    let view = engine.project_view(sort);
    Ok(match format {
        OutputFormat::Json => to_json(&view)?,
        OutputFormat::Markdown => format_board_markdown(&view),
    })
}

async fn run(
    engine: &SyncEngine,
    config: &Config,
    format: OutputFormat,
    command: Command,
) -> Result<String> {
    // Newest first for creation time, alphabetical for everything else
    let default_sort = match config.view.default_sort {
        SortKey::CreatedAt => SortState::default(),
        key => SortState::new(key, SortOrder::Asc),
    };

    match command {
        Command::Projects => {
            let projects: Vec<_> =
                engine.read(|cache| cache.projects().iter().cloned().collect());
            Ok(match format {
                OutputFormat::Json => to_json(&projects)?,
                OutputFormat::Markdown => {
                    format_projects_markdown(&projects, engine.active_project())
                }
            })
        }

        Command::AddProject(AddProjectArgs {
            name,
            key,
            description,
            color,
        }) => {
            let project = engine
                .add_project(NewProject {
                    name,
                    key,
                    description,
                    color,
                    icon: None,
                })
                .await?
                .ok_or_else(|| anyhow!("the store rejected the project"))?;
            engine.activate_project(project.id).await?;
            board(engine, default_sort, format)
        }

        Command::Board(BoardArgs { sort, desc }) => {
            let sort = match sort {
                Some(key) => {
                    let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
                    SortState::new(key, order)
                }
                None => default_sort,
            };
            board(engine, sort, format)
        }

        Command::AddTask(AddTaskArgs {
            title,
            description,
            section,
            status,
            priority,
            task_type,
            due,
            assignee,
            parent,
            also,
        }) => {
            let mut project_ids = vec![active(engine)?];
            for project in also {
                if !project_ids.contains(&project) {
                    project_ids.push(project);
                }
            }
            let draft = TaskDraft {
                project_ids,
                section_id: section.map(|s| s.to_string()),
                parent_id: parent,
                title: Some(title),
                description,
                assignees: assignee.into_iter().collect(),
                status,
                priority,
                task_type,
                due,
                completed: None,
            };
            let task = engine
                .add_task(draft)
                .await?
                .ok_or_else(|| anyhow!("the store rejected the task"))?;
            Ok(match format {
                OutputFormat::Json => to_json(&task)?,
                OutputFormat::Markdown => format_task_markdown(&task),
            })
        }

        Command::Set { task, field, value } => {
            let field = TaskField::parse(&field, &value)?;
            engine.update_task(task, field).await?;
            show_task(engine, task, format)
        }

        Command::Toggle { task } => {
            engine.toggle_task_completion(task).await?;
            show_task(engine, task, format)
        }

        Command::Rm { task } => {
            engine.delete_task(task).await?;
            board(engine, default_sort, format)
        }

        Command::AddSection { title } => {
            engine
                .add_section(active(engine)?, &title)
                .await?
                .ok_or_else(|| anyhow!("the store rejected the section"))?;
            board(engine, default_sort, format)
        }

        Command::RenameSection { section, title } => {
            engine.rename_section(section, &title).await?;
            board(engine, default_sort, format)
        }

        Command::RmSection { section, fallback } => {
            engine.delete_section(section, fallback).await?;
            board(engine, default_sort, format)
        }

        Command::Link { task, project } => {
            engine
                .link_task(task, project)
                .await?
                .ok_or_else(|| anyhow!("the store rejected the link"))?;
            show_task(engine, task, format)
        }

        Command::Unlink { task, project } => {
            engine.unlink_task(task, project).await?;
            show_task(engine, task, format)
        }

        Command::AddMember { name, email } => {
            let member = engine
                .add_member(active(engine)?, &name, email)
                .await?
                .ok_or_else(|| anyhow!("the store rejected the member"))?;
            Ok(match format {
                OutputFormat::Json => to_json(&member)?,
                OutputFormat::Markdown => format!("Added member `{}` {}\n", member.id, member.name),
            })
        }

        Command::Wiki(WikiArgs { title, content }) => {
            let project = active(engine)?;
            if let Some(title) = title {
                engine
                    .add_wiki_page(project, &title, &content)
                    .await?
                    .ok_or_else(|| anyhow!("the store rejected the page"))?;
            }
            let pages = engine.project_view(default_sort).wiki_pages;
            Ok(match format {
                OutputFormat::Json => to_json(&pages)?,
                OutputFormat::Markdown => format_wiki_markdown(&pages),
            })
        }
    }
}

fn show_task(engine: &SyncEngine, id: Id, format: OutputFormat) -> Result<String> {
    let Some(task) = engine.task_view(id) else {
        bail!("task {} is no longer on the board", id);
    };
    Ok(match format {
        OutputFormat::Json => to_json(&task)?,
        OutputFormat::Markdown => format_task_markdown(&task),
    })
}
