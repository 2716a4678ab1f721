/// PDF element parsing via `lopdf`.
///
/// Text is extracted page by page, lines are merged into blocks, and every
/// block is classified with the shared text heuristics. A short heading-like
/// line that follows the end of a sentence (or a blank line) becomes its own
/// block so that titles are not swallowed by the surrounding prose.
use std::path::Path;

use lopdf::Document;
use tracing::debug;

use super::classify::classify_text;
use super::{Category, ContentBlock, ElementParser};
use crate::error::FileProcessingError;

/// A heading line is at most this share (in percent) of the following line's width.
const HEADING_WIDTH_PERCENT: usize = 60;

pub struct PdfParser;

impl ElementParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<Vec<ContentBlock>, FileProcessingError> {
        let pdf_error = |message: String| FileProcessingError::Pdf {
            path: path.to_path_buf(),
            message,
        };

        let doc = Document::load(path).map_err(|e| pdf_error(e.to_string()))?;
        let pages = doc.get_pages();

        let mut blocks = Vec::new();
        for page_number in pages.keys() {
            let text = doc
                .extract_text(&[*page_number])
                .map_err(|e| pdf_error(format!("page {page_number}: {e}")))?;
            blocks.extend(segment_page(&text));
        }

        debug!(
            "Parsed {} elements from {} pages of {}",
            blocks.len(),
            pages.len(),
            path.display()
        );
        Ok(blocks)
    }
}

/// Split the raw text of one page into classified blocks.
#[must_use]
pub fn segment_page(text: &str) -> Vec<ContentBlock> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut blocks = Vec::new();
    let mut current = String::new();

    for (i, &line) in lines.iter().enumerate() {
        if line.is_empty() {
            flush(&mut current, &mut blocks);
            continue;
        }

        let category = classify_text(line);
        let standalone = match category {
            Category::Title => is_heading_line(line, lines.get(i + 1).copied()),
            Category::PageNumber | Category::ListItem => true,
            _ => false,
        };
        if standalone && (current.is_empty() || ends_sentence(&current)) {
            flush(&mut current, &mut blocks);
            blocks.push(ContentBlock::new(category, line));
            continue;
        }

        append_line(&mut current, line);
    }
    flush(&mut current, &mut blocks);

    blocks
}

fn flush(current: &mut String, blocks: &mut Vec<ContentBlock>) {
    if current.is_empty() {
        return;
    }
    let text = std::mem::take(current);
    blocks.push(ContentBlock::new(classify_text(&text), text));
}

/// Join a wrapped line onto the block, undoing end-of-line hyphenation.
fn append_line(current: &mut String, line: &str) {
    if current.is_empty() {
        current.push_str(line);
        return;
    }
    let continues_word = line.chars().next().is_some_and(char::is_lowercase);
    if current.ends_with('-') && continues_word {
        current.pop();
    } else {
        current.push(' ');
    }
    current.push_str(line);
}

/// A title-like line is a heading when it stands alone or is clearly
/// shorter than the line after it; otherwise it is the first line of a
/// wrapped paragraph.
fn is_heading_line(line: &str, next: Option<&str>) -> bool {
    if line.ends_with('-') {
        return false;
    }
    match next {
        None => true,
        Some(next) if next.is_empty() => true,
        Some(next) => {
            line.chars().count() * 100 < next.chars().count() * HEADING_WIDTH_PERCENT
        }
    }
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end()
        .ends_with(['.', '!', '?', ':', '"', '“', '”', '»', '«'])
}
