use std::collections::HashMap;
use std::sync::OnceLock;

/// Process-wide, read-only CEFR lookup table. Bootstrapped once via
/// [`VocabularyService::init`] before any handler is served — no lazy
/// init inside a request path, since that causes first-request latency
/// spikes and init races (spec's "Global registries" redesign note).
pub struct VocabularyService {
    levels: HashMap<String, &'static str>,
}

static VOCABULARY_SERVICE: OnceLock<VocabularyService> = OnceLock::new();

impl VocabularyService {
    fn bootstrap() -> Self {
        let mut levels = HashMap::new();
        for (word, level) in Self::SEED_TABLE {
            levels.insert(word.to_lowercase(), *level);
        }
        Self { levels }
    }

    /// Coarse CEFR seed table. A production deployment would load this
    /// from a curated word list; the shape is what matters here.
    const SEED_TABLE: &'static [(&'static str, &'static str)] = &[
        ("the", "A1"),
        ("go", "A1"),
        ("because", "A2"),
        ("although", "B1"),
        ("consequently", "B2"),
        ("notwithstanding", "C1"),
        ("ubiquitous", "C2"),
    ];

    /// Must be called once, before the server starts accepting
    /// connections. Calling it more than once is a no-op.
    pub fn init() {
        VOCABULARY_SERVICE.get_or_init(Self::bootstrap);
    }

    pub fn get() -> &'static VocabularyService {
        VOCABULARY_SERVICE
            .get()
            .expect("VocabularyService::init must run before first use")
    }

    /// CEFR level for a single lowercase-normalized word, if known.
    pub fn level_of(&self, word: &str) -> Option<&'static str> {
        self.levels.get(&word.to_lowercase()).copied()
    }

    /// Annotates every distinct word in `transcript` with its CEFR level,
    /// skipping words not present in the table.
    pub fn annotate(&self, transcript: &str) -> HashMap<String, &'static str> {
        let mut out = HashMap::new();
        for word in transcript.split_whitespace() {
            let cleaned: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if cleaned.is_empty() {
                continue;
            }
            if let Some(level) = self.level_of(&cleaned) {
                out.insert(cleaned, level);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_finds_known_words_and_skips_unknown() {
        let service = VocabularyService::bootstrap();
        let annotated = service.annotate("The cat went because it was ubiquitous.");
        assert_eq!(annotated.get("the"), Some(&"A1"));
        assert_eq!(annotated.get("because"), Some(&"A2"));
        assert_eq!(annotated.get("ubiquitous"), Some(&"C2"));
        assert!(!annotated.contains_key("cat"));
    }

    #[test]
    fn level_of_is_case_insensitive() {
        let service = VocabularyService::bootstrap();
        assert_eq!(service.level_of("ALTHOUGH"), Some("B1"));
    }
}
