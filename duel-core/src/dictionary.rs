use anyhow::Context;
use dashmap::DashMap;
use duel_types::Language;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::{EngineError, EngineResult};

/// Uppercase words, ordered so random picks are reproducible under a seeded RNG.
pub type WordSet = BTreeSet<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordKind {
    AllowedGuesses,
    Answers,
}

/// Word lists per language. Lookups are case-insensitive: sets hold uppercase words.
pub trait Dictionary: Send + Sync {
    fn allowed_guesses(&self, language: Language) -> EngineResult<Arc<WordSet>>;
    fn answer_words(&self, language: Language) -> EngineResult<Arc<WordSet>>;
}

/// Parse a word list: one word per line, `#` comments and blank lines skipped.
pub fn parse_word_list(word_list: &str) -> WordSet {
    word_list
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|word| word.to_uppercase())
        .collect()
}

/// In-memory dictionary, used for tests and embedded word lists.
#[derive(Debug, Default)]
pub struct StaticDictionary {
    allowed: HashMap<Language, Arc<WordSet>>,
    answers: HashMap<Language, Arc<WordSet>>,
}

impl StaticDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a language. Answer words are always accepted as guesses too.
    pub fn with_language(mut self, language: Language, allowed: &str, answers: &str) -> Self {
        let answers = parse_word_list(answers);
        let mut allowed = parse_word_list(allowed);
        allowed.extend(answers.iter().cloned());

        self.allowed.insert(language, Arc::new(allowed));
        self.answers.insert(language, Arc::new(answers));
        self
    }
}

impl Dictionary for StaticDictionary {
    fn allowed_guesses(&self, language: Language) -> EngineResult<Arc<WordSet>> {
        Ok(self.allowed.get(&language).cloned().unwrap_or_default())
    }

    fn answer_words(&self, language: Language) -> EngineResult<Arc<WordSet>> {
        Ok(self.answers.get(&language).cloned().unwrap_or_default())
    }
}

/// Backing store for [`CachedDictionary`].
pub trait WordSource: Send + Sync {
    fn load(&self, language: Language, kind: WordKind) -> anyhow::Result<WordSet>;
}

/// Reads `<root>/<lang>/allowed.txt` and `<root>/<lang>/answers.txt`.
/// A missing file is an empty list.
#[derive(Debug, Clone)]
pub struct DirectoryWordSource {
    root: PathBuf,
}

impl DirectoryWordSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn read_list(&self, language: Language, file_name: &str) -> anyhow::Result<WordSet> {
        let path = self
            .root
            .join(language.code().to_lowercase())
            .join(file_name);

        if !path.exists() {
            debug!("Word list {} not found, treating as empty", path.display());
            return Ok(WordSet::new());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read word list {}", path.display()))?;
        Ok(parse_word_list(&content))
    }
}

impl WordSource for DirectoryWordSource {
    fn load(&self, language: Language, kind: WordKind) -> anyhow::Result<WordSet> {
        let answers = self.read_list(language, "answers.txt")?;
        let words = match kind {
            WordKind::Answers => answers,
            WordKind::AllowedGuesses => {
                let mut allowed = self.read_list(language, "allowed.txt")?;
                allowed.extend(answers);
                allowed
            }
        };

        info!(
            "Loaded {} {:?} words for {} from {}",
            words.len(),
            kind,
            language,
            self.root.display()
        );
        Ok(words)
    }
}

struct CachedWords {
    words: Arc<WordSet>,
    loaded_at: Instant,
}

/// Caches word sets per (language, kind) for a bounded time.
pub struct CachedDictionary<S> {
    source: S,
    ttl: Duration,
    cache: DashMap<(Language, WordKind), CachedWords>,
}

impl<S: WordSource> CachedDictionary<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: DashMap::new(),
        }
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }

    fn get(&self, language: Language, kind: WordKind) -> EngineResult<Arc<WordSet>> {
        if let Some(entry) = self.cache.get(&(language, kind)) {
            if entry.loaded_at.elapsed() < self.ttl {
                return Ok(entry.words.clone());
            }
        }

        let words = Arc::new(
            self.source
                .load(language, kind)
                .map_err(EngineError::Dictionary)?,
        );
        self.cache.insert(
            (language, kind),
            CachedWords {
                words: words.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(words)
    }
}

impl<S: WordSource> Dictionary for CachedDictionary<S> {
    fn allowed_guesses(&self, language: Language) -> EngineResult<Arc<WordSet>> {
        self.get(language, WordKind::AllowedGuesses)
    }

    fn answer_words(&self, language: Language) -> EngineResult<Arc<WordSet>> {
        self.get(language, WordKind::Answers)
    }
}
