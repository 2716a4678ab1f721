//! Content extraction: one supported file in, one markdown-style document out.
//!
//! Parsing is format-specific ([`pdf::PdfParser`], [`docx::DocxParser`]) but
//! every parser yields the same ordered sequence of [`ContentBlock`]s. From
//! there the steps are shared:
//!
//! 1. PDF only: keep the configured element categories
//! 2. keep elements whose detected language equals the target language
//! 3. group elements into [`Section`]s at each `Title`
//! 4. render sections as `# title\nparagraph\nparagraph`, joined by a blank line
pub mod classify;
pub mod docx;
pub mod language;
pub mod pdf;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, normalize_extension};
use crate::error::FileProcessingError;
use language::{LanguageDetector, WhatlangDetector, normalize_language_code};

/// Title used for text that appears before the first heading.
pub const DEFAULT_SECTION_TITLE: &str = "Default";

/// Element category assigned by a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Title,
    NarrativeText,
    ListItem,
    PageNumber,
    #[serde(alias = "UncategorizedText")]
    Uncategorized,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Title => "Title",
            Category::NarrativeText => "NarrativeText",
            Category::ListItem => "ListItem",
            Category::PageNumber => "PageNumber",
            Category::Uncategorized => "Uncategorized",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed text element produced by a parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub category: Category,
    pub text: String,
    /// ISO 639-3 code, set by the language filter.
    pub language: Option<String>,
}

impl ContentBlock {
    pub fn new(category: Category, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
            language: None,
        }
    }
}

/// A heading and the narrative paragraphs under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl Section {
    /// `# <title>\n<paragraphs joined by newline>`
    #[must_use]
    pub fn to_markdown(&self) -> String {
        format!("# {}\n{}", self.title, self.paragraphs.join("\n"))
    }
}

/// Supported input formats, dispatched by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match normalize_extension(ext).as_str() {
            ".pdf" => Some(DocumentFormat::Pdf),
            ".docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }
}

/// Format-specific parsing into an ordered sequence of typed elements.
pub trait ElementParser {
    fn parse(&self, path: &Path) -> Result<Vec<ContentBlock>, FileProcessingError>;
}

/// Converts files into markdown-like text restricted to one language.
pub struct Extractor {
    detector: Box<dyn LanguageDetector>,
    target_language: String,
    pdf_categories: Vec<Category>,
}

impl Extractor {
    /// Build an extractor with the default (`whatlang`) language detector.
    ///
    /// Falls back to the raw configured code when it is not a known ISO code;
    /// `Config::validate` rejects that case up front.
    pub fn from_config(config: &Config) -> Self {
        Self::with_detector(config, Box::new(WhatlangDetector))
    }

    pub fn with_detector(config: &Config, detector: Box<dyn LanguageDetector>) -> Self {
        let target_language = normalize_language_code(&config.language)
            .map(str::to_string)
            .unwrap_or_else(|| config.language.to_lowercase());
        Self {
            detector,
            target_language,
            pdf_categories: config.pdf_categories.clone(),
        }
    }

    /// Extract one file into a markdown string (possibly empty).
    pub fn extract(&self, path: &Path, extension: &str) -> Result<String, FileProcessingError> {
        let format =
            DocumentFormat::from_extension(extension).ok_or_else(|| {
                FileProcessingError::Unsupported {
                    path: path.to_path_buf(),
                    extension: extension.to_string(),
                }
            })?;

        info!("Processing {:?}: {}", format, path.display());

        let blocks = match format {
            DocumentFormat::Pdf => {
                let blocks = pdf::PdfParser.parse(path)?;
                filter_categories(blocks, &self.pdf_categories)
            }
            // DOCX yields mostly textual elements already
            DocumentFormat::Docx => docx::DocxParser.parse(path)?,
        };

        Ok(self.render(blocks))
    }

    /// Language filter, section assembly, and serialization of parsed elements.
    #[must_use]
    pub fn render(&self, blocks: Vec<ContentBlock>) -> String {
        let kept = filter_language(blocks, self.detector.as_ref(), &self.target_language);
        render_markdown(&assemble_sections(&kept))
    }
}

/// Keep only elements whose category is in `allowed`.
#[must_use]
pub fn filter_categories(blocks: Vec<ContentBlock>, allowed: &[Category]) -> Vec<ContentBlock> {
    blocks
        .into_iter()
        .filter(|b| allowed.contains(&b.category))
        .collect()
}

/// Keep only elements detected as `target` (ISO 639-3).
///
/// An element whose language cannot be detected is dropped on its own; the
/// rest of the document is unaffected.
#[must_use]
pub fn filter_language(
    blocks: Vec<ContentBlock>,
    detector: &dyn LanguageDetector,
    target: &str,
) -> Vec<ContentBlock> {
    let total = blocks.len();
    let kept: Vec<ContentBlock> = blocks
        .into_iter()
        .filter_map(|mut block| {
            let lang = detector.detect(&block.text)?;
            if lang != target {
                return None;
            }
            block.language = Some(lang);
            Some(block)
        })
        .collect();
    debug!("Language filtering: {}/{} elements kept", kept.len(), total);
    kept
}

/// Group elements into sections opened by `Title` elements.
///
/// `NarrativeText` before the first title is emitted under
/// [`DEFAULT_SECTION_TITLE`]. Other categories are ignored.
#[must_use]
pub fn assemble_sections(blocks: &[ContentBlock]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current_title: Option<String> = None;
    let mut paragraphs: Vec<String> = Vec::new();

    for block in blocks {
        match block.category {
            Category::Title => {
                match current_title.take() {
                    Some(title) => sections.push(Section {
                        title,
                        paragraphs: std::mem::take(&mut paragraphs),
                    }),
                    None if !paragraphs.is_empty() => sections.push(Section {
                        title: DEFAULT_SECTION_TITLE.to_string(),
                        paragraphs: std::mem::take(&mut paragraphs),
                    }),
                    None => {}
                }
                current_title = Some(block.text.clone());
            }
            Category::NarrativeText => paragraphs.push(block.text.clone()),
            _ => {}
        }
    }

    match current_title {
        Some(title) => sections.push(Section { title, paragraphs }),
        None if !paragraphs.is_empty() => sections.push(Section {
            title: DEFAULT_SECTION_TITLE.to_string(),
            paragraphs,
        }),
        None => {}
    }

    sections
}

/// Serialize sections in order, separated by a blank line.
#[must_use]
pub fn render_markdown(sections: &[Section]) -> String {
    sections
        .iter()
        .map(Section::to_markdown)
        .collect::<Vec<_>>()
        .join("\n\n")
}
