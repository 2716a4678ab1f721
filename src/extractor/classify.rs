//! Text heuristics that assign a [`Category`] to a block of text.
//!
//! Used for every PDF block and for DOCX paragraphs without a heading or
//! list style.
use std::sync::LazyLock;

use regex::Regex;

use super::Category;

/// Titles longer than this are treated as prose.
const MAX_TITLE_WORDS: usize = 12;
const MAX_TITLE_CHARS: usize = 120;
/// Shortest block that can be narrative text.
const MIN_NARRATIVE_WORDS: usize = 4;
/// Narrative text must be mostly letters.
const MIN_ALPHA_RATIO: f32 = 0.5;

static PAGE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:-\s*)?(?:seite|page|s\.)?\s*\d{1,4}(?:\s*(?:/|von|of)\s*\d{1,4})?(?:\s*-)?$")
        .expect("valid page number regex")
});

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[•·▪‣◦\-–—*]|\(?\d{1,3}[.)]|\(?[a-zA-Z][.)])\s+\S")
        .expect("valid list item regex")
});

/// Classify a trimmed block of text.
#[must_use]
pub fn classify_text(text: &str) -> Category {
    let text = text.trim();
    if text.is_empty() {
        return Category::Uncategorized;
    }
    if PAGE_NUMBER.is_match(text) {
        return Category::PageNumber;
    }
    if LIST_ITEM.is_match(text) {
        return Category::ListItem;
    }
    if is_possible_title(text) {
        return Category::Title;
    }
    if is_possible_narrative(text) {
        return Category::NarrativeText;
    }
    Category::Uncategorized
}

/// Short, single-line, mostly letters, does not end like a sentence fragment.
#[must_use]
pub fn is_possible_title(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || text.contains('\n') {
        return false;
    }
    if text.chars().count() > MAX_TITLE_CHARS || word_count(text) > MAX_TITLE_WORDS {
        return false;
    }
    if alpha_ratio(text) < MIN_ALPHA_RATIO {
        return false;
    }
    if text.ends_with(['.', ',', ';']) {
        return false;
    }
    // Headings start with a capital or a section number
    text.chars()
        .next()
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}

/// Several words of mostly alphabetic text that reads like a sentence.
#[must_use]
pub fn is_possible_narrative(text: &str) -> bool {
    let text = text.trim();
    let words = word_count(text);
    if words < MIN_NARRATIVE_WORDS {
        return false;
    }
    if alpha_ratio(text) < MIN_ALPHA_RATIO {
        return false;
    }
    text.ends_with(['.', '!', '?', ':', '"', '“', '”', '»', '«', ')']) || words > MAX_TITLE_WORDS
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn alpha_ratio(text: &str) -> f32 {
    let mut alpha = 0usize;
    let mut total = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if c.is_alphabetic() {
            alpha += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    alpha as f32 / total as f32
}
