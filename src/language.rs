//! Language detection and the supported-language catalog.
//!
//! Detection is a function-word heuristic, not a classifier: for each
//! candidate language it counts whole-word, case-insensitive hits from a
//! short list of very frequent words. The language with the most hits wins.
//! With no hits at all the text is assumed to be English.
//!
//! Ties between nonzero counts go to the language declared first in
//! [`CANDIDATES`] (Spanish, then French, then German).

use crate::error::{RagError, Result};

/// Code returned when no candidate language scores.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Candidate languages with their function words, in tie-break order.
pub const CANDIDATES: &[(&str, &[&str])] = &[
    (
        "es",
        &[
            "el", "la", "los", "las", "de", "del", "que", "y", "en", "un", "una", "es", "por",
            "con", "para", "se", "su", "al", "como", "pero", "más", "este", "está", "son",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "les", "de", "des", "du", "et", "est", "un", "une", "que", "qui", "dans",
            "pour", "pas", "sur", "au", "avec", "ce", "il", "elle", "nous", "vous", "sont",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "zu", "den", "mit", "von",
            "sich", "auf", "für", "im", "dem", "des", "auch", "es", "wir", "sie", "ich", "wird",
        ],
    ),
];

/// Codes and display names accepted as `target_language`.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
    ("nl", "Dutch"),
    ("sv", "Swedish"),
    ("pl", "Polish"),
    ("tr", "Turkish"),
    ("vi", "Vietnamese"),
    ("th", "Thai"),
    ("id", "Indonesian"),
    ("he", "Hebrew"),
];

/// A resolved response language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLanguage {
    pub code: &'static str,
    pub name: &'static str,
}

impl TargetLanguage {
    pub fn is_default(&self) -> bool {
        self.code == DEFAULT_LANGUAGE
    }
}

impl Default for TargetLanguage {
    fn default() -> Self {
        Self {
            code: DEFAULT_LANGUAGE,
            name: "English",
        }
    }
}

/// Count function-word hits for every candidate, in declared order.
pub fn language_scores(text: &str) -> Vec<(&'static str, usize)> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    CANDIDATES
        .iter()
        .map(|(code, function_words)| {
            let hits = words.iter().filter(|w| function_words.contains(*w)).count();
            (*code, hits)
        })
        .collect()
}

/// Best-guess language code for `text`.
pub fn detect_language(text: &str) -> &'static str {
    let mut best = (DEFAULT_LANGUAGE, 0);
    for (code, hits) in language_scores(text) {
        // strict `>` keeps the first-declared language on ties
        if hits > best.1 {
            best = (code, hits);
        }
    }
    best.0
}

/// Display name for a catalog code.
pub fn language_name(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Resolve a requested `target_language`, defaulting to English.
///
/// Codes are trimmed and lower-cased. Unknown codes are a
/// [`RagError::Validation`].
pub fn resolve_target(code: Option<&str>) -> Result<TargetLanguage> {
    let code = match code.map(str::trim) {
        None | Some("") => return Ok(TargetLanguage::default()),
        Some(c) => c.to_lowercase(),
    };

    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(code, name)| TargetLanguage { code: *code, name: *name })
        .ok_or_else(|| RagError::Validation(format!("unsupported target_language: {}", code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_default() {
        let text = "LangChain is a framework for developing applications powered by language models.";
        assert_eq!(detect_language(text), "en");
    }

    #[test]
    fn test_empty_text_is_english() {
        assert_eq!(detect_language(""), "en");
        assert_eq!(detect_language("12345 !!!"), "en");
    }

    #[test]
    fn test_spanish() {
        let text = "El perro come la comida que está en la mesa de la cocina.";
        assert_eq!(detect_language(text), "es");
    }

    #[test]
    fn test_french() {
        let text = "Le chat est dans la maison et il ne veut pas sortir avec nous.";
        assert_eq!(detect_language(text), "fr");
    }

    #[test]
    fn test_german() {
        let text = "Der Hund und die Katze sind nicht im Haus, sie spielen auf dem Hof.";
        assert_eq!(detect_language(text), "de");
    }

    #[test]
    fn test_case_insensitive_whole_words() {
        // "Delta" and "Ladder" contain "de"/"la" but are not function words.
        assert_eq!(detect_language("Delta Ladder Elastic"), "en");
        assert_eq!(detect_language("LE CHAT EST DANS LA MAISON"), "fr");
    }

    #[test]
    fn test_tie_goes_to_first_declared() {
        // "la" and "de" are both Spanish and French function words.
        let scores = language_scores("la de");
        assert_eq!(scores[0], ("es", 2));
        assert_eq!(scores[1], ("fr", 2));
        assert_eq!(detect_language("la de"), "es");
        // "des" is French and German.
        assert_eq!(detect_language("des"), "fr");
    }

    #[test]
    fn test_deterministic() {
        let text = "Der Zug ist pünktlich. La vida es bella. Le ciel est bleu.";
        let first = detect_language(text);
        for _ in 0..10 {
            assert_eq!(detect_language(text), first);
        }
    }

    #[test]
    fn test_catalog_has_twenty_named_languages() {
        assert!(SUPPORTED_LANGUAGES.len() >= 20);
        for (code, name) in SUPPORTED_LANGUAGES {
            assert_eq!(code.len(), 2);
            assert!(!name.is_empty());
        }
        assert_eq!(language_name("ja"), Some("Japanese"));
        assert_eq!(language_name("xx"), None);
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target(None).unwrap(), TargetLanguage::default());
        assert_eq!(resolve_target(Some("  ")).unwrap().code, "en");
        let es = resolve_target(Some(" ES ")).unwrap();
        assert_eq!(es.code, "es");
        assert_eq!(es.name, "Spanish");
        assert!(!es.is_default());
        assert!(matches!(
            resolve_target(Some("klingon")),
            Err(RagError::Validation(_))
        ));
    }
}
