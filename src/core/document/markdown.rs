// Renders the structural tree into Markdown and a plain-text companion.
// Both renderers are pure functions of the tree, so repeated runs over the
// same document produce byte-identical output.

use std::collections::HashMap;

use super::document_model::{Block, Span, TableCell};

/// Render the tree as Markdown. Blocks are separated by blank lines,
/// except consecutive list items which stay on adjacent lines; the output
/// ends with a single newline.
pub fn render_markdown(blocks: &[Block]) -> String {
    // One running counter per (list id, depth), scoped to this document.
    let mut counters: HashMap<(String, u8), u64> = HashMap::new();
    let mut out = String::new();
    let mut previous_was_list_item = false;

    for block in blocks {
        let is_list_item = matches!(
            block,
            Block::BulletItem { .. } | Block::NumberedItem { .. }
        );
        let chunk = match block {
            Block::Paragraph { spans } => spans_markdown(spans),
            Block::Heading { level, spans } => format!(
                "{} {}",
                "#".repeat(usize::from(*level)),
                spans_markdown(spans)
            ),
            Block::BulletItem { depth, spans } => {
                format!("{}- {}", indent(*depth), spans_markdown(spans))
            }
            Block::NumberedItem {
                depth,
                list_id,
                spans,
            } => {
                let counter = counters.entry((list_id.clone(), *depth)).or_insert(0);
                *counter += 1;
                format!("{}{}. {}", indent(*depth), counter, spans_markdown(spans))
            }
            Block::Table { rows } => table_markdown(rows),
            Block::Image { reference, alt } => format!("![{alt}]({reference})"),
            Block::HorizontalRule => "---".to_string(),
        };

        if !out.is_empty() {
            if previous_was_list_item && is_list_item {
                out.push('\n');
            } else {
                out.push_str("\n\n");
            }
        }
        out.push_str(&chunk);
        previous_was_list_item = is_list_item;
    }

    if out.is_empty() {
        return out;
    }
    out.push('\n');
    out
}

/// Render the tree as plain text: literal content and block-level line
/// breaks only. Used by hosts for full-text search indexing.
pub fn render_text(blocks: &[Block]) -> String {
    let mut lines: Vec<String> = Vec::new();

    for block in blocks {
        match block {
            Block::Paragraph { spans }
            | Block::Heading { spans, .. }
            | Block::BulletItem { spans, .. }
            | Block::NumberedItem { spans, .. } => lines.push(spans_text(spans)),
            Block::Table { rows } => {
                for row in rows {
                    let cells: Vec<String> = row
                        .iter()
                        .map(cell_text)
                        .filter(|cell| !cell.is_empty())
                        .collect();
                    lines.push(cells.join(" "));
                }
            }
            Block::Image { alt, .. } => {
                if !alt.is_empty() {
                    lines.push(alt.clone());
                }
            }
            Block::HorizontalRule => {}
        }
    }

    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn indent(depth: u8) -> String {
    "  ".repeat(usize::from(depth))
}

fn spans_markdown(spans: &[Span]) -> String {
    spans.iter().map(span_markdown).collect()
}

/// Delimiters nest deterministically: code is innermost, then bold,
/// italic and strikethrough, with the link syntax applied outermost.
fn span_markdown(span: &Span) -> String {
    let mut text = span.text.clone();
    if span.style.code {
        text = format!("`{text}`");
    }
    if span.style.bold {
        text = format!("**{text}**");
    }
    if span.style.italic {
        text = format!("*{text}*");
    }
    if span.style.strikethrough {
        text = format!("~~{text}~~");
    }
    if let Some(url) = &span.style.link {
        text = format!("[{text}]({url})");
    }
    text
}

fn table_markdown(rows: &[Vec<TableCell>]) -> String {
    let mut lines = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(cell_markdown).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            let separator: Vec<&str> = row.iter().map(|_| "---").collect();
            lines.push(format!("| {} |", separator.join(" | ")));
        }
    }
    lines.join("\n")
}

fn cell_markdown(cell: &TableCell) -> String {
    let parts: Vec<String> = cell
        .blocks
        .iter()
        .filter_map(block_inline_markdown)
        .collect();
    parts.join(" ")
}

/// Pipe tables cannot hold block structure, so cell content is flattened
/// to inline Markdown.
fn block_inline_markdown(block: &Block) -> Option<String> {
    match block {
        Block::Paragraph { spans }
        | Block::Heading { spans, .. }
        | Block::BulletItem { spans, .. }
        | Block::NumberedItem { spans, .. } => Some(spans_markdown(spans)),
        Block::Image { reference, alt } => Some(format!("![{alt}]({reference})")),
        Block::Table { rows } => Some(
            rows.iter()
                .flat_map(|row| row.iter().map(cell_markdown))
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Block::HorizontalRule => None,
    }
}

fn spans_text(spans: &[Span]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

fn cell_text(cell: &TableCell) -> String {
    let parts: Vec<String> = cell
        .blocks
        .iter()
        .filter_map(block_inline_text)
        .filter(|part| !part.is_empty())
        .collect();
    parts.join(" ")
}

fn block_inline_text(block: &Block) -> Option<String> {
    match block {
        Block::Paragraph { spans }
        | Block::Heading { spans, .. }
        | Block::BulletItem { spans, .. }
        | Block::NumberedItem { spans, .. } => Some(spans_text(spans)),
        Block::Image { alt, .. } => Some(alt.clone()),
        Block::Table { rows } => Some(
            rows.iter()
                .flat_map(|row| row.iter().map(cell_text))
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Block::HorizontalRule => None,
    }
}
