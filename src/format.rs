//! Output formatting utilities for markdown and JSON.

use crate::sync::ProjectView;
use crate::types::{Id, Project, TaskView, WikiPage};
use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

/// Render any serializable value as pretty JSON.
pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Format a single task as markdown.
pub fn format_task_markdown(task: &TaskView) -> String {
    let mut md = String::new();

    md.push_str(&format!("## {}: {}\n", task.key, task.title));
    md.push_str(&format!("- **id**: `{}`\n", task.id));
    md.push_str(&format!("- **status**: {}\n", task.status));
    md.push_str(&format!("- **priority**: {}\n", task.priority));
    md.push_str(&format!("- **type**: {}\n", task.task_type));

    if !task.assignees.is_empty() {
        md.push_str(&format!("- **assignees**: {}\n", task.assignees.join(", ")));
    }

    if let Some(ref due) = task.due {
        md.push_str(&format!("- **due**: {}\n", due));
    }

    if let Some(parent_id) = task.parent_id {
        md.push_str(&format!("- **parent_id**: `{}`\n", parent_id));
    }

    if task.project_ids.len() > 1 {
        let ids: Vec<String> = task.project_ids.iter().map(|id| format!("`{}`", id)).collect();
        md.push_str(&format!("- **projects**: {}\n", ids.join(", ")));
    }

    if let Some(ref desc) = task.description {
        md.push_str("\n### Description\n");
        md.push_str(desc);
        md.push('\n');
    }

    md
}

/// Format a task in short form for lists.
fn format_task_short(task: &TaskView) -> String {
    let check = if task.completed { "[x]" } else { "[ ]" };

    let assignee = task
        .assignees
        .first()
        .map(|a| format!(" @{}", a))
        .unwrap_or_default();

    let due = task
        .due
        .as_ref()
        .map(|d| format!(" (due {})", d))
        .unwrap_or_default();

    format!(
        "- {} `{}` {} _{}_{}{}\n",
        check, task.key, task.title, task.status, assignee, due
    )
}

/// Format a project's board as markdown, one heading per section.
pub fn format_board_markdown(view: &ProjectView) -> String {
    let mut md = String::new();

    let Some(ref project) = view.project else {
        md.push_str("No active project.\n");
        return md;
    };

    md.push_str(&format!("# {} ({})\n\n", project.name, project.key));
    md.push_str(&format!(
        "_{} task(s), sorted by {}_\n\n",
        view.tasks.len(),
        view.sort.key
    ));

    for section in &view.sections {
        md.push_str(&format!("## {} `{}`\n\n", section.title, section.id));
        for task in view.tasks.iter().filter(|t| t.section_id == section.id) {
            md.push_str(&format_task_short(task));
        }
        md.push('\n');
    }

    let unsectioned: Vec<&TaskView> = view
        .tasks
        .iter()
        .filter(|t| !view.sections.iter().any(|s| s.id == t.section_id))
        .collect();
    if !unsectioned.is_empty() {
        md.push_str("## Unsectioned\n\n");
        for task in unsectioned {
            md.push_str(&format_task_short(task));
        }
        md.push('\n');
    }

    md
}

/// Format the project list as markdown, marking the active project.
pub fn format_projects_markdown(projects: &[Project], active: Option<Id>) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Projects ({})\n\n", projects.len()));

    for project in projects {
        let marker = if Some(project.id) == active { " *" } else { "" };
        md.push_str(&format!(
            "- `{}` **{}** {}{}\n",
            project.id, project.key, project.name, marker
        ));
    }

    md
}

/// Format wiki pages as markdown.
pub fn format_wiki_markdown(pages: &[WikiPage]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Wiki ({})\n\n", pages.len()));

    for page in pages {
        md.push_str(&format!("## {} `{}`\n\n", page.title, page.id));
        if !page.content.is_empty() {
            md.push_str(&page.content);
            md.push_str("\n\n");
        }
    }

    md
}
