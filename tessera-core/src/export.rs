//! Projecting an annotated document into a single exportable text.
//!
//! Precedence is fixed: a flagged section is removed, a cautioned section
//! keeps its own text, and any other section with comments is replaced by
//! its comment bodies. Plain sections pass through unchanged.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::boundary::ExportSink;
use crate::model::{has_section_comments, Comment, CommentMap};
use crate::segment::SECTION_SEPARATOR;

/// Number of characters kept by [`preview`].
pub const DEFAULT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectInfo {
    pub name: String,
    pub location: String,
    pub manager: String,
    pub status: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskInfo {
    pub title: String,
    pub parent_task: String,
    pub status: String,
    pub priority: String,
    pub assignee: String,
    pub start_date: String,
    pub due_date: String,
}

/// Metadata surrounding the document in a full-context export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportContext {
    pub project: ProjectInfo,
    pub task: TaskInfo,
    /// Comments on the entity as a whole rather than on one section.
    pub thread: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportMode<'a> {
    Document,
    FullContext(&'a ExportContext),
}

/// Build the exported text for `sections`.
///
/// With no flagged section and no section comments the original `document`
/// is returned untouched, byte for byte.
pub fn project<S: AsRef<str>>(
    sections: &[S],
    document: &str,
    flagged: &BTreeSet<usize>,
    caution: &BTreeSet<usize>,
    comments: &CommentMap,
    mode: ExportMode<'_>,
) -> String {
    let body = project_document(sections, document, flagged, caution, comments);
    match mode {
        ExportMode::Document => body,
        ExportMode::FullContext(context) => render_full_context(&body, context),
    }
}

fn project_document<S: AsRef<str>>(
    sections: &[S],
    document: &str,
    flagged: &BTreeSet<usize>,
    caution: &BTreeSet<usize>,
    comments: &CommentMap,
) -> String {
    let any_flagged = flagged.iter().any(|&i| i < sections.len());
    if !any_flagged && !has_section_comments(comments, sections.len()) {
        return document.to_string();
    }

    sections
        .iter()
        .enumerate()
        .filter(|(index, _)| !flagged.contains(index))
        .map(|(index, section)| {
            let thread = comments.get(&index).filter(|thread| !thread.is_empty());
            match thread {
                Some(thread) if !caution.contains(&index) => thread
                    .iter()
                    .map(|c| c.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
                _ => section.as_ref().to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

fn render_full_context(body: &str, context: &ExportContext) -> String {
    let mut out = String::new();

    let project = &context.project;
    let project_lines = [
        ("Project", &project.name),
        ("Location", &project.location),
        ("Manager", &project.manager),
        ("Status", &project.status),
    ];
    push_block(&mut out, "## Project", &project_lines, &project.description);

    let task = &context.task;
    let task_lines = [
        ("Task", &task.title),
        ("Parent task", &task.parent_task),
        ("Status", &task.status),
        ("Priority", &task.priority),
        ("Assignee", &task.assignee),
        ("Start", &task.start_date),
        ("Due", &task.due_date),
    ];
    push_block(&mut out, "## Task", &task_lines, "");

    if !body.trim().is_empty() {
        out.push_str("## Description\n\n");
        out.push_str(body);
        out.push_str("\n\n");
    }

    if !context.thread.is_empty() {
        let mut thread: Vec<&Comment> = context.thread.iter().collect();
        thread.sort_by_key(|c| c.created_at);

        out.push_str(&format!("## Comments ({})\n\n", thread.len()));
        for comment in thread {
            out.push_str(&format!(
                "[{}] {}: {}\n",
                comment.created_at.format("%Y-%m-%d %H:%M"),
                comment.author_name,
                comment.content
            ));
        }
    }

    out.trim_end().to_string()
}

fn push_block(out: &mut String, heading: &str, fields: &[(&str, &String)], description: &str) {
    let present: Vec<_> = fields.iter().filter(|(_, value)| !value.trim().is_empty()).collect();
    if present.is_empty() && description.trim().is_empty() {
        return;
    }

    out.push_str(heading);
    out.push_str("\n\n");
    for (label, value) in present {
        out.push_str(&format!("{label}: {}\n", value.trim()));
    }
    if !description.trim().is_empty() {
        out.push('\n');
        out.push_str(description.trim());
        out.push('\n');
    }
    out.push('\n');
}

/// Short single-line summary of exported text.
pub fn preview(text: &str) -> String {
    preview_with(text, DEFAULT_PREVIEW_CHARS)
}

pub fn preview_with(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

/// How exported text reached the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Delivery {
    Primary,
    Fallback,
    /// Both transports failed; the text is only in the outcome.
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub text: String,
    pub preview: String,
    pub delivery: Delivery,
}

/// Hand `text` to the primary sink, falling back to the secondary one.
pub fn deliver(
    text: String,
    preview: String,
    primary: &mut dyn ExportSink,
    fallback: &mut dyn ExportSink,
) -> ExportOutcome {
    let delivery = match primary.deliver(&text) {
        Ok(()) => Delivery::Primary,
        Err(primary_err) => {
            log::warn!("Primary export transport failed: {primary_err:#}");
            match fallback.deliver(&text) {
                Ok(()) => Delivery::Fallback,
                Err(fallback_err) => {
                    log::warn!("Fallback export transport failed: {fallback_err:#}");
                    Delivery::Inline
                }
            }
        }
    };

    ExportOutcome {
        text,
        preview,
        delivery,
    }
}

/// JSON view of an export, used as a drag payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub entity_type: String,
    pub entity_id: String,
    pub field_name: String,
    pub text: String,
    pub preview: String,
    pub section_count: usize,
    pub flagged_sections: Vec<usize>,
    pub caution_sections: Vec<usize>,
}

pub fn to_json(export: &ExportDocument) -> serde_json::Result<String> {
    serde_json::to_string_pretty(export)
}
