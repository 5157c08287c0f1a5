use duel_types::{LetterResult, LetterStatus};
use std::collections::HashMap;

pub struct WordleEvaluator;

impl WordleEvaluator {
    /// Compare a guess with the target word, one result per guessed letter.
    ///
    /// Both words are expected to be validated already: same length, uppercase.
    /// A letter is only reported CORRECT or PRESENT as many times as it occurs
    /// in the target; exact matches claim their occurrences first.
    pub fn evaluate(target: &str, guess: &str) -> Vec<LetterResult> {
        let guess_chars: Vec<char> = guess.chars().collect();
        let target_chars: Vec<char> = target.chars().collect();

        let mut letters: Vec<LetterResult> = guess_chars
            .iter()
            .map(|&ch| LetterResult::new(ch, LetterStatus::Absent))
            .collect();

        // Count frequency of each letter in target for handling duplicates
        let mut remaining: HashMap<char, usize> = HashMap::new();
        for ch in &target_chars {
            *remaining.entry(*ch).or_insert(0) += 1;
        }

        // First pass: mark correct positions
        for (i, &ch) in guess_chars.iter().enumerate() {
            if target_chars.get(i) == Some(&ch) {
                letters[i].status = LetterStatus::Correct;
                if let Some(count) = remaining.get_mut(&ch) {
                    *count -= 1;
                }
            }
        }

        // Second pass: mark present letters while occurrences remain
        for (i, &ch) in guess_chars.iter().enumerate() {
            if letters[i].status == LetterStatus::Correct {
                continue;
            }

            if let Some(count) = remaining.get_mut(&ch).filter(|count| **count > 0) {
                letters[i].status = LetterStatus::Present;
                *count -= 1;
            }
        }

        letters
    }

    pub fn is_solved(letters: &[LetterResult]) -> bool {
        !letters.is_empty()
            && letters
                .iter()
                .all(|l| matches!(l.status, LetterStatus::Correct))
    }
}
