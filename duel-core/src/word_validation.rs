use duel_types::{GameError, Language};
use std::sync::Arc;

use crate::{Dictionary, EngineResult};

pub struct GuessValidator {
    dictionary: Arc<dyn Dictionary>,
    word_length: usize,
}

impl GuessValidator {
    pub fn new(dictionary: Arc<dyn Dictionary>, word_length: usize) -> Self {
        Self {
            dictionary,
            word_length,
        }
    }

    pub fn word_length(&self) -> usize {
        self.word_length
    }

    /// Check a normalized guess against the round's target and language.
    ///
    /// Checks run in order and stop at the first failure: length, characters,
    /// language, then dictionary membership.
    pub fn validate(
        &self,
        guess: &str,
        target_word: &str,
        language: Option<Language>,
    ) -> EngineResult<()> {
        let actual = guess.chars().count();
        let target_length = target_word.chars().count();
        if actual != self.word_length || actual != target_length {
            let expected = if actual != self.word_length {
                self.word_length
            } else {
                target_length
            };
            return Err(GameError::InvalidGuessLength {
                expected: expected as u32,
                actual: actual as u32,
            }
            .into());
        }

        if !is_alphabetic(guess) {
            return Err(GameError::InvalidGuessChars {
                guess: guess.to_string(),
            }
            .into());
        }

        let language = language.ok_or(GameError::InvalidLanguage)?;

        let word = guess.to_ascii_uppercase();
        if !self.dictionary.allowed_guesses(language)?.contains(&word) {
            return Err(GameError::WordNotAllowed { word }.into());
        }

        Ok(())
    }
}

/// Check if word contains only the letters A-Z (either case)
pub fn is_alphabetic(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic())
}

/// Trim and uppercase raw player input.
pub fn normalize_guess(raw: &str) -> String {
    raw.trim().to_uppercase()
}
