//! services/alchemist/src/export.rs
//!
//! Turns finished pages into files: a plain-text export and a paginated
//! document with a title header and fixed-width sheets.

use book_alchemist_core::domain::Project;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::AppError;

/// Visible separator between pages in the plain-text export.
pub const TEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Sheet break in the paginated document.
pub const SHEET_BREAK: char = '\u{000C}';

#[derive(Debug, Clone, Copy)]
pub struct DocumentLayout {
    /// Maximum characters per line.
    pub columns: usize,
    /// Lines that fit on one sheet, header included.
    pub lines_per_sheet: usize,
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            columns: 80,
            lines_per_sheet: 50,
        }
    }
}

pub fn text_export(pages: &[String]) -> String {
    pages.join(TEXT_SEPARATOR)
}

/// File name stem derived from the title. Whitespace and characters that
/// are not allowed in file names become `_`.
pub fn file_stem(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        return "buch".to_string();
    }
    title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Greedy word wrap of one paragraph. Words longer than a line are split.
fn wrap_paragraph(paragraph: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in paragraph.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > columns {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let head: String = word.chars().take(columns).collect();
            word = word.chars().skip(columns).collect();
            lines.push(head);
        }
        if word.is_empty() {
            continue;
        }
        let needed = if line.is_empty() { 0 } else { line.chars().count() + 1 };
        if needed + word.chars().count() > columns {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Lays the book out on sheets: header, then every page re-flowed, with a
/// blank line between pages and a sheet break whenever a sheet is full.
pub fn paginated_document(title: &str, author: &str, pages: &[String], layout: DocumentLayout) -> String {
    let columns = layout.columns.max(1);
    let budget = layout.lines_per_sheet.max(1);

    let mut body: Vec<String> = vec![title.to_string(), format!("von {}", author), String::new()];
    for page in pages {
        for paragraph in page.split("\n\n") {
            let wrapped = wrap_paragraph(paragraph, columns);
            if wrapped.is_empty() {
                continue;
            }
            body.extend(wrapped);
        }
        body.push(String::new());
    }

    let mut out = String::new();
    for (i, line) in body.iter().enumerate() {
        if i > 0 && i % budget == 0 {
            out.push(SHEET_BREAK);
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Writes both exports of the project into `dir` and returns their paths.
pub async fn write_exports(dir: &Path, project: &Project) -> Result<(PathBuf, PathBuf), AppError> {
    tokio::fs::create_dir_all(dir).await?;
    let stem = file_stem(&project.data.title);

    let text_path = dir.join(format!("{}.txt", stem));
    tokio::fs::write(&text_path, text_export(&project.pages)).await?;

    let document_path = dir.join(format!("{}.book.txt", stem));
    let document = paginated_document(
        &project.data.title,
        &project.data.author,
        &project.pages,
        DocumentLayout::default(),
    );
    tokio::fs::write(&document_path, document).await?;

    info!(project_id = %project.id, pages = project.pages.len(), "Exported to {}", dir.display());
    Ok((text_path, document_path))
}
