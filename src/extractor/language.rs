/// Per-element language detection.
///
/// Detection is best-effort: a detector returns `None` when it cannot decide,
/// and the extractor drops that element.
use std::collections::HashMap;

use whatlang::Lang;

/// ISO 639-1 → ISO 639-3 for the languages most likely in the archive.
const ISO_639_1: &[(&str, &str)] = &[
    ("de", "deu"),
    ("en", "eng"),
    ("fr", "fra"),
    ("it", "ita"),
    ("es", "spa"),
    ("pt", "por"),
    ("nl", "nld"),
    ("da", "dan"),
    ("sv", "swe"),
    ("nb", "nob"),
    ("fi", "fin"),
    ("pl", "pol"),
    ("cs", "ces"),
    ("sk", "slk"),
    ("sl", "slv"),
    ("hu", "hun"),
    ("ro", "ron"),
    ("hr", "hrv"),
    ("ru", "rus"),
    ("uk", "ukr"),
    ("el", "ell"),
    ("tr", "tur"),
    ("la", "lat"),
];

/// Map an ISO 639-1 or 639-3 code to the ISO 639-3 code the detector reports.
#[must_use]
pub fn normalize_language_code(code: &str) -> Option<&'static str> {
    let code = code.trim().to_lowercase();
    let three = match code.len() {
        2 => ISO_639_1
            .iter()
            .find(|(two, _)| *two == code)
            .map(|(_, three)| *three)?,
        _ => code.as_str(),
    };
    Lang::from_code(three).map(|lang| lang.code())
}

/// Something that can guess the language of a text element.
pub trait LanguageDetector: Send + Sync {
    /// ISO 639-3 code of `text`, or `None` if undetectable.
    fn detect(&self, text: &str) -> Option<String>;
}

/// Trigram-based detection via `whatlang`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<String> {
        whatlang::detect(text).map(|info| info.lang().code().to_string())
    }
}

/// Detector backed by a fixed text → language table.
///
/// Texts not in the table are undetectable.
#[derive(Debug, Default, Clone)]
pub struct FixedDetector {
    table: HashMap<String, String>,
    fallback: Option<String>,
}

impl FixedDetector {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(text, lang)| (text.to_string(), lang.to_string()))
                .collect(),
            fallback: None,
        }
    }

    /// Report `lang` for every text.
    pub fn always(lang: &str) -> Self {
        Self {
            table: HashMap::new(),
            fallback: Some(lang.to_string()),
        }
    }
}

impl LanguageDetector for FixedDetector {
    fn detect(&self, text: &str) -> Option<String> {
        self.table
            .get(text)
            .cloned()
            .or_else(|| self.fallback.clone())
    }
}
