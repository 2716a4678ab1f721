/// DOCX element parsing via `docx-rs`.
///
/// Each body paragraph becomes one element. Heading and title styles map to
/// `Title`, numbered paragraphs to `ListItem`; everything else is classified
/// from its text. Tables are skipped.
use std::path::Path;

use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};
use tracing::debug;

use super::classify::classify_text;
use super::{Category, ContentBlock, ElementParser};
use crate::error::FileProcessingError;

/// Style-id prefixes (lowercase) of heading paragraphs. Localized Word
/// templates store "Überschrift 1" as `berschrift1` and "Titel" as `titel`.
const HEADING_STYLE_PREFIXES: &[&str] = &[
    "heading",
    "title",
    "subtitle",
    "berschrift",
    "uberschrift",
    "titel",
    "untertitel",
];

pub struct DocxParser;

impl ElementParser for DocxParser {
    fn parse(&self, path: &Path) -> Result<Vec<ContentBlock>, FileProcessingError> {
        let bytes = std::fs::read(path).map_err(|source| FileProcessingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let docx = docx_rs::read_docx(&bytes).map_err(|e| FileProcessingError::Docx {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let blocks: Vec<ContentBlock> = docx
            .document
            .children
            .iter()
            .filter_map(|child| match child {
                DocumentChild::Paragraph(paragraph) => paragraph_block(paragraph),
                _ => None,
            })
            .collect();

        debug!("Parsed {} elements from {}", blocks.len(), path.display());
        Ok(blocks)
    }
}

fn paragraph_block(paragraph: &Paragraph) -> Option<ContentBlock> {
    let text = paragraph_text(paragraph);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let style = paragraph
        .property
        .style
        .as_ref()
        .map(|s| s.val.to_lowercase())
        .unwrap_or_default();

    let category = if is_heading_style(&style) {
        Category::Title
    } else if paragraph.has_numbering || style.starts_with("list") {
        Category::ListItem
    } else {
        classify_text(text)
    };

    Some(ContentBlock::new(category, text))
}

fn is_heading_style(style: &str) -> bool {
    HEADING_STYLE_PREFIXES
        .iter()
        .any(|prefix| style.starts_with(prefix))
}

/// Concatenated run text of a paragraph, including hyperlinks.
fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    collect_text(&paragraph.children, &mut out);
    out
}

fn collect_text(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push('\t'),
                        RunChild::Break(_) => out.push(' '),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_text(&link.children, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Run};
    use std::fs::File;

    fn write_docx(path: &Path, paragraphs: &[(&str, Option<&str>)]) {
        let mut docx = Docx::new();
        for (text, style) in paragraphs {
            let mut p = Paragraph::new().add_run(Run::new().add_text(*text));
            if let Some(style) = style {
                p = p.style(style);
            }
            docx = docx.add_paragraph(p);
        }
        let file = File::create(path).unwrap();
        docx.build().pack(file).unwrap();
    }

    #[test]
    fn test_heading_styles_become_titles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brief.docx");
        write_docx(
            &path,
            &[
                ("Die Sammlung", Some("Heading1")),
                (
                    "Das Museum besitzt rund zwanzigtausend Objekte aus drei Jahrhunderten.",
                    None,
                ),
                ("Geschichte", Some("berschrift1")),
                ("Das Haus wurde 1755 erbaut und später erweitert.", None),
            ],
        );

        let blocks = DocxParser.parse(&path).unwrap();
        let categories: Vec<Category> = blocks.iter().map(|b| b.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Title,
                Category::NarrativeText,
                Category::Title,
                Category::NarrativeText,
            ]
        );
        assert_eq!(blocks[0].text, "Die Sammlung");
    }

    #[test]
    fn test_empty_paragraphs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leer.docx");
        write_docx(&path, &[("   ", None), ("Ein ganzer Satz mit Inhalt.", None)]);

        let blocks = DocxParser.parse(&path).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_invalid_docx_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kaputt.docx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = DocxParser.parse(&path).unwrap_err();
        assert!(matches!(err, FileProcessingError::Docx { .. }));
    }

    #[test]
    fn test_missing_docx_is_io_error() {
        let err = DocxParser
            .parse(Path::new("/nonexistent/brief.docx"))
            .unwrap_err();
        assert!(matches!(err, FileProcessingError::Io { .. }));
    }

    #[test]
    fn test_heading_style_prefixes() {
        assert!(is_heading_style("heading2"));
        assert!(is_heading_style("titel"));
        assert!(is_heading_style("berschrift3"));
        assert!(!is_heading_style("standard"));
        assert!(!is_heading_style(""));
    }
}
