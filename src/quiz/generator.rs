//! Random question generation without repeats
//!
//! Each draw picks a table from the selection and a multiplier in 1..=10,
//! then rejects texts already present in the [`SeenRegistry`]. The registry
//! is owned by whoever builds the generator, so a session gets a fresh one
//! and tests can inject their own.

use super::question::{Question, TableSet, MAX_MULTIPLIER};
use crate::error::QuizError;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// What to do once every question for the selection has been asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatPolicy {
    /// Keep drawing and accept repeats
    #[default]
    AllowRepeats,
    /// Report [`QuizError::QuestionSpaceExhausted`]
    Fail,
}

impl RepeatPolicy {
    pub fn from_allow(allow: bool) -> Self {
        if allow {
            RepeatPolicy::AllowRepeats
        } else {
            RepeatPolicy::Fail
        }
    }
}

/// Set of question texts already handed out
///
/// Guarded by a mutex so concurrent generators sharing one registry never
/// interleave a check-and-insert.
#[derive(Debug, Default)]
pub struct SeenRegistry {
    seen: Mutex<HashSet<String>>,
}

impl SeenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `text`, returning false if it was already present
    pub fn insert_if_new(&self, text: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(text) {
            false
        } else {
            seen.insert(text.to_string());
            true
        }
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(text)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every question of `tables` has been registered
    pub fn is_exhausted(&self, tables: &TableSet) -> bool {
        let seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let asked = tables
            .as_slice()
            .iter()
            .flat_map(|&t| (1..=MAX_MULTIPLIER).map(move |m| Question::new(t, m)))
            .filter(|q| seen.contains(q.text()))
            .count();
        asked >= tables.question_space()
    }
}

/// Draws questions for a table selection, avoiding repeats
pub struct QuestionGenerator<R = StdRng> {
    rng: R,
    registry: Arc<SeenRegistry>,
    policy: RepeatPolicy,
}

impl QuestionGenerator<StdRng> {
    /// Create a generator seeded from the OS
    pub fn new(registry: Arc<SeenRegistry>, policy: RepeatPolicy) -> Self {
        Self::with_rng(StdRng::from_os_rng(), registry, policy)
    }
}

impl<R: Rng> QuestionGenerator<R> {
    /// Create a generator with a specific random source
    pub fn with_rng(rng: R, registry: Arc<SeenRegistry>, policy: RepeatPolicy) -> Self {
        Self {
            rng,
            registry,
            policy,
        }
    }

    /// Draw the next question not yet in the registry
    pub fn generate(&mut self, tables: &TableSet) -> Result<Question, QuizError> {
        loop {
            let question = self.draw(tables)?;
            if self.registry.insert_if_new(question.text()) {
                return Ok(question);
            }

            // Only pay for the exhaustion scan after a collision
            if self.registry.is_exhausted(tables) {
                return match self.policy {
                    RepeatPolicy::AllowRepeats => {
                        tracing::debug!(
                            "All {} questions for tables [{}] asked, allowing repeat {:?}",
                            tables.question_space(),
                            tables,
                            question.text()
                        );
                        Ok(question)
                    }
                    RepeatPolicy::Fail => {
                        Err(QuizError::QuestionSpaceExhausted(tables.question_space()))
                    }
                };
            }
        }
    }

    fn draw(&mut self, tables: &TableSet) -> Result<Question, QuizError> {
        let table = *tables
            .as_slice()
            .choose(&mut self.rng)
            .ok_or(QuizError::EmptySelection)?;
        let multiplier = self.rng.random_range(1..=MAX_MULTIPLIER);
        Ok(Question::new(table, multiplier))
    }
}

/// Produces the full question batch for a new session
pub trait QuestionSource: Send + Sync {
    /// Generate exactly `count` questions for `tables`
    fn generate_batch(&self, tables: &TableSet, count: usize) -> Result<Vec<Question>, QuizError>;
}

/// Random questions with a fresh registry per batch
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomQuestions {
    policy: RepeatPolicy,
}

impl RandomQuestions {
    pub fn new(policy: RepeatPolicy) -> Self {
        Self { policy }
    }
}

impl QuestionSource for RandomQuestions {
    fn generate_batch(&self, tables: &TableSet, count: usize) -> Result<Vec<Question>, QuizError> {
        let registry = Arc::new(SeenRegistry::new());
        let mut generator = QuestionGenerator::new(registry, self.policy);
        (0..count).map(|_| generator.generate(tables)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64, policy: RepeatPolicy) -> QuestionGenerator {
        QuestionGenerator::with_rng(
            StdRng::seed_from_u64(seed),
            Arc::new(SeenRegistry::new()),
            policy,
        )
    }

    #[test]
    fn test_generated_questions_are_well_formed() {
        let tables = TableSet::new([2, 5, 9]).unwrap();
        let mut generator = seeded(7, RepeatPolicy::AllowRepeats);

        for _ in 0..30 {
            let q = generator.generate(&tables).unwrap();
            assert!(tables.contains(q.table()));
            assert!((1..=10).contains(&q.multiplier()));
            assert_eq!(q.answer(), q.table() * q.multiplier());
            assert_eq!(q.text(), format!("{} x {}", q.table(), q.multiplier()));
        }
    }

    #[test]
    fn test_no_repeats_until_exhausted() {
        let tables = TableSet::new([4]).unwrap();
        let mut generator = seeded(42, RepeatPolicy::AllowRepeats);

        let texts: HashSet<String> = (0..10)
            .map(|_| generator.generate(&tables).unwrap().text().to_string())
            .collect();
        assert_eq!(texts.len(), 10);
    }

    #[test]
    fn test_exhaustion_allows_repeats() {
        let tables = TableSet::new([6]).unwrap();
        let mut generator = seeded(1, RepeatPolicy::AllowRepeats);

        for _ in 0..10 {
            generator.generate(&tables).unwrap();
        }
        // Eleventh draw terminates with a repeat instead of spinning forever
        let q = generator.generate(&tables).unwrap();
        assert_eq!(q.table(), 6);
    }

    #[test]
    fn test_exhaustion_fails_when_repeats_disallowed() {
        let tables = TableSet::new([6]).unwrap();
        let mut generator = seeded(1, RepeatPolicy::Fail);

        for _ in 0..10 {
            generator.generate(&tables).unwrap();
        }
        assert_eq!(
            generator.generate(&tables),
            Err(QuizError::QuestionSpaceExhausted(10))
        );
    }

    #[test]
    fn test_shared_registry_spans_generators() {
        let tables = TableSet::new([3]).unwrap();
        let registry = Arc::new(SeenRegistry::new());
        let mut first = QuestionGenerator::with_rng(
            StdRng::seed_from_u64(3),
            registry.clone(),
            RepeatPolicy::Fail,
        );
        let mut second = QuestionGenerator::with_rng(
            StdRng::seed_from_u64(4),
            registry.clone(),
            RepeatPolicy::Fail,
        );

        for _ in 0..5 {
            first.generate(&tables).unwrap();
            second.generate(&tables).unwrap();
        }
        assert_eq!(registry.len(), 10);
        assert!(registry.is_exhausted(&tables));
    }

    #[test]
    fn test_random_batch_has_requested_size() {
        let tables = TableSet::new([1, 2]).unwrap();
        let batch = RandomQuestions::default()
            .generate_batch(&tables, 30)
            .unwrap();
        assert_eq!(batch.len(), 30);

        // The first 20 cover the whole space without repeats
        let distinct: HashSet<&str> = batch[..20].iter().map(Question::text).collect();
        assert_eq!(distinct.len(), 20);
    }
}
