//! A single quiz session
//!
//! The session owns its questions, score and mistakes and is mutated only
//! through its own transitions. It never talks to speech or audio; the
//! engine drives it and turns transitions into effects.

use super::question::{Question, TableSet};
use crate::error::QuizError;
use crate::state::{Outcome, Phase, SessionState};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Identity of a session, used to drop results aimed at a replaced session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final report of a finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub score: usize,
    pub total_questions: usize,
    pub mistakes: Vec<Question>,
}

impl Summary {
    /// "Puntuación: S / N"
    pub fn score_line(&self) -> String {
        format!("Puntuación: {} / {}", self.score, self.total_questions)
    }

    /// One "T x M = A" line per missed question
    pub fn mistake_lines(&self) -> Vec<String> {
        self.mistakes.iter().map(Question::solution).collect()
    }
}

/// Where the session went after `advance`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The next question is now awaiting an answer
    Next(Question),
    /// That was the last question
    Finished(Summary),
}

/// Quiz session state machine
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    tables: TableSet,
    question_count: usize,
    questions: Vec<Question>,
    current_index: usize,
    score: usize,
    /// Indices into `questions`
    mistakes: Vec<usize>,
    state: SessionState,
}

impl Session {
    /// Create a session in the loading state
    pub fn new(tables: TableSet, question_count: usize) -> Result<Self, QuizError> {
        if question_count == 0 {
            return Err(QuizError::InvalidQuestionCount(question_count));
        }
        Ok(Self {
            id: SessionId::new(),
            tables,
            question_count,
            questions: Vec::with_capacity(question_count),
            current_index: 0,
            score: 0,
            mistakes: Vec::new(),
            state: SessionState::Loading,
        })
    }

    /// Install the generated questions and ask the first one
    pub fn begin(&mut self, questions: Vec<Question>) -> Result<&Question, QuizError> {
        self.expect(self.state.is_loading(), "loading")?;
        if questions.len() != self.question_count {
            return Err(QuizError::InvalidQuestionCount(questions.len()));
        }

        self.questions = questions;
        self.current_index = 0;
        self.state = SessionState::Active(Phase::AwaitingAnswer);
        tracing::debug!("Session {} active with {} questions", self.id, self.question_count);

        Ok(&self.questions[0])
    }

    /// Check an answer for the current question
    ///
    /// Text that does not parse as an integer is rejected without
    /// consuming the question.
    pub fn submit_answer(&mut self, text: &str) -> Result<Outcome, QuizError> {
        self.expect(self.state.is_awaiting_answer(), "awaiting answer")?;

        let given: i64 = text
            .trim()
            .parse()
            .map_err(|_| QuizError::InvalidAnswer(text.to_string()))?;

        let question = &self.questions[self.current_index];
        let outcome = if given == i64::from(question.answer()) {
            self.score += 1;
            Outcome::Correct
        } else {
            self.mistakes.push(self.current_index);
            Outcome::Incorrect {
                expected: question.answer(),
            }
        };

        tracing::debug!(
            "Answer {} to {:?}: {:?} (score {}/{})",
            given,
            question.text(),
            outcome,
            self.score,
            self.question_count
        );

        self.state = SessionState::Active(Phase::Feedback(outcome));
        Ok(outcome)
    }

    /// Move past the answered question
    pub fn advance(&mut self) -> Result<Advance, QuizError> {
        self.expect(self.state.is_feedback(), "feedback")?;

        self.current_index += 1;
        if self.current_index < self.question_count {
            self.state = SessionState::Active(Phase::AwaitingAnswer);
            Ok(Advance::Next(self.questions[self.current_index].clone()))
        } else {
            self.state = SessionState::Finished;
            tracing::debug!("Session {} finished", self.id);
            Ok(Advance::Finished(self.build_summary()))
        }
    }

    /// Summary, once finished
    pub fn summary(&self) -> Option<Summary> {
        self.state.is_finished().then(|| self.build_summary())
    }

    fn build_summary(&self) -> Summary {
        Summary {
            score: self.score,
            total_questions: self.question_count,
            mistakes: self.mistakes().cloned().collect(),
        }
    }

    fn expect(&self, ok: bool, expected: &'static str) -> Result<(), QuizError> {
        if ok {
            Ok(())
        } else {
            Err(QuizError::WrongPhase {
                expected,
                actual: self.state.to_string(),
            })
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.current_index == self.question_count
    }

    /// Question currently being asked
    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            SessionState::Active(_) => self.questions.get(self.current_index),
            _ => None,
        }
    }

    /// Missed questions in the order they were answered
    pub fn mistakes(&self) -> impl Iterator<Item = &Question> + '_ {
        self.mistakes.iter().map(|&i| &self.questions[i])
    }

    /// "K/N" with K counted from 1
    pub fn counter(&self) -> String {
        format!(
            "{}/{}",
            (self.current_index + 1).min(self.question_count),
            self.question_count
        )
    }
}
