//! Export of translated documents as JSON or Markdown.

use crate::error::Result;
use crate::model::{TranslatedBlock, TranslatedDocument, TranslatedPage};
use crate::schema::BlockKind;

/// Pretty-printed JSON, readable back as a `TranslatedDocument`
pub fn to_json(doc: &TranslatedDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Wrap text in emphasis markers matching the block's style
fn emphasize(text: &str, bold: bool, italic: bool) -> String {
    match (bold, italic) {
        (true, true) => format!("***{text}***"),
        (true, false) => format!("**{text}**"),
        (false, true) => format!("*{text}*"),
        (false, false) => text.to_string(),
    }
}

/// Code fence one backtick longer than any backtick run inside `text`
fn code_fence(text: &str) -> String {
    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn render_block(block: &TranslatedBlock) -> String {
    let text = block.translated_text.trim();
    let style = &block.style;

    match block.kind {
        BlockKind::Title => format!("# {}", text.replace('\n', " ")),
        BlockKind::Heading => {
            let level = usize::from(block.level.unwrap_or(2).clamp(1, 6));
            format!("{} {}", "#".repeat(level), text.replace('\n', " "))
        }
        BlockKind::ListItem => {
            let indent = "  ".repeat(usize::from(block.level.unwrap_or(1).saturating_sub(1)));
            format!("{indent}- {}", emphasize(text, style.bold, style.italic))
        }
        BlockKind::Code => {
            let fence = code_fence(text);
            format!("{fence}\n{text}\n{fence}")
        }
        BlockKind::Formula => format!("$$\n{text}\n$$"),
        BlockKind::Quote => text
            .lines()
            .map(|line| format!("> {line}"))
            .collect::<Vec<_>>()
            .join("\n"),
        BlockKind::Table => text.to_string(),
        _ => emphasize(text, style.bold, style.italic),
    }
}

fn render_page(page: &TranslatedPage) -> String {
    let mut blocks: Vec<&TranslatedBlock> = page
        .blocks
        .iter()
        .filter(|b| !b.kind.is_furniture() && !b.translated_text.trim().is_empty())
        .collect();
    blocks.sort_by_key(|b| b.reading_order);

    let mut out = String::new();
    let mut previous: Option<BlockKind> = None;
    for block in blocks {
        if let Some(prev) = previous {
            // Consecutive list items form one list
            let tight = prev == BlockKind::ListItem && block.kind == BlockKind::ListItem;
            out.push_str(if tight { "\n" } else { "\n\n" });
        }
        out.push_str(&render_block(block));
        previous = Some(block.kind);
    }
    out
}

/// Markdown rendering: blocks in reading order, page furniture dropped,
/// pages separated by a horizontal rule.
pub fn to_markdown(doc: &TranslatedDocument) -> String {
    let pages: Vec<String> = doc
        .pages
        .iter()
        .map(render_page)
        .filter(|p| !p.is_empty())
        .collect();

    let mut out = pages.join("\n\n---\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
