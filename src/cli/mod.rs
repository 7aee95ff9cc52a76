//! CLI command definitions for taskboard
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use crate::sync::SortKey;
use crate::types::Id;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Task board client: projects, sections and tasks over a synced store
#[derive(Parser, Debug)]
#[command(name = "taskboard", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t, global = true)]
    pub format: OutputFormat,

    /// Project to operate on (defaults to the first project)
    #[arg(short, long, global = true)]
    pub project: Option<Id>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List projects
    Projects,

    /// Create a project with default statuses, priorities, types and sections
    AddProject(AddProjectArgs),

    /// Show the project's board
    Board(BoardArgs),

    /// Create a task
    AddTask(AddTaskArgs),

    /// Set one field of a task (title, description, status, priority, type,
    /// sectionId, due, completed, assignees, parentId)
    Set {
        task: Id,
        field: String,
        value: String,
    },

    /// Toggle a task's completion
    Toggle { task: Id },

    /// Delete a task with its subtasks
    Rm { task: Id },

    /// Append a section to the project
    AddSection { title: String },

    /// Rename a section
    RenameSection { section: Id, title: String },

    /// Delete a section, moving its tasks to a fallback section
    RmSection {
        section: Id,
        /// Section that receives the deleted section's tasks
        #[arg(long)]
        fallback: Option<Id>,
    },

    /// Show a task in another project as well
    Link { task: Id, project: Id },

    /// Remove a task from a project (not its last one)
    Unlink { task: Id, project: Id },

    /// Add an assignable member to the project
    AddMember {
        name: String,
        #[arg(long)]
        email: Option<String>,
    },

    /// List or add wiki pages
    Wiki(WikiArgs),
}

#[derive(Args, Debug)]
pub struct AddProjectArgs {
    pub name: String,

    /// Short key prefixed to task keys, e.g. PHX
    pub key: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug)]
pub struct BoardArgs {
    /// Sort key within sections (key, title, assignees, status, priority, type, due, created_at)
    #[arg(long)]
    pub sort: Option<SortKey>,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,
}

#[derive(Args, Debug)]
pub struct AddTaskArgs {
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Section id (defaults to the project's first section)
    #[arg(long)]
    pub section: Option<Id>,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long = "type")]
    pub task_type: Option<String>,

    /// Due date, YYYY-MM-DD
    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    /// Parent task id, making this a subtask
    #[arg(long)]
    pub parent: Option<Id>,

    /// Additional projects to link the task to
    #[arg(long = "also", value_delimiter = ',')]
    pub also: Vec<Id>,
}

#[derive(Args, Debug)]
pub struct WikiArgs {
    /// Title of a page to add; lists pages when omitted
    pub title: Option<String>,

    /// Page content
    #[arg(long, default_value = "")]
    pub content: String,
}
