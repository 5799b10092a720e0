//! State machine for a quiz session
//!
//! Defines the states a session moves through:
//! Loading → Active (AwaitingAnswer ⇄ Feedback, per question) → Finished

use serde::Serialize;

/// Result of checking one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The answer matched
    Correct,
    /// The answer did not match
    Incorrect {
        /// The expected product
        expected: u32,
    },
}

impl Outcome {
    /// Check if the answer was correct
    pub fn is_correct(&self) -> bool {
        matches!(self, Outcome::Correct)
    }

    /// Feedback shown and spoken to the learner
    pub fn feedback_text(&self) -> String {
        match self {
            Outcome::Correct => "¡Correcto!".to_string(),
            Outcome::Incorrect { expected } => {
                format!("Incorrecto. La respuesta es {}.", expected)
            }
        }
    }
}

/// Per-question phase while a session is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Question shown, waiting for a typed or spoken answer
    AwaitingAnswer,

    /// Answer checked, waiting for the learner to move on
    Feedback(Outcome),
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Questions are being generated
    Loading,

    /// Questions are being asked
    Active(Phase),

    /// Every question was answered
    Finished,
}

impl SessionState {
    /// Create a new loading state
    pub fn new() -> Self {
        SessionState::Loading
    }

    /// Check if in loading state
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    /// Check if a question is waiting for an answer
    pub fn is_awaiting_answer(&self) -> bool {
        matches!(self, SessionState::Active(Phase::AwaitingAnswer))
    }

    /// Check if the current question has been answered
    pub fn is_feedback(&self) -> bool {
        matches!(self, SessionState::Active(Phase::Feedback(_)))
    }

    /// Check if in finished state
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Finished)
    }

    /// Outcome of the current question, if answered
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            SessionState::Active(Phase::Feedback(outcome)) => Some(*outcome),
            _ => None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Loading => write!(f, "Loading"),
            SessionState::Active(Phase::AwaitingAnswer) => write!(f, "Awaiting answer"),
            SessionState::Active(Phase::Feedback(Outcome::Correct)) => {
                write!(f, "Feedback (correct)")
            }
            SessionState::Active(Phase::Feedback(Outcome::Incorrect { expected })) => {
                write!(f, "Feedback (incorrect, expected {})", expected)
            }
            SessionState::Finished => write!(f, "Finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_loading() {
        let state = SessionState::new();
        assert!(state.is_loading());
        assert!(!state.is_awaiting_answer());
        assert!(state.outcome().is_none());
    }

    #[test]
    fn test_feedback_state() {
        let state = SessionState::Active(Phase::Feedback(Outcome::Incorrect { expected: 15 }));
        assert!(state.is_feedback());
        assert!(!state.is_awaiting_answer());
        assert_eq!(state.outcome(), Some(Outcome::Incorrect { expected: 15 }));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", SessionState::Loading), "Loading");
        assert_eq!(
            format!("{}", SessionState::Active(Phase::AwaitingAnswer)),
            "Awaiting answer"
        );
        let state = SessionState::Active(Phase::Feedback(Outcome::Incorrect { expected: 21 }));
        assert!(format!("{}", state).contains("expected 21"));
        assert_eq!(format!("{}", SessionState::Finished), "Finished");
    }

    #[test]
    fn test_feedback_text() {
        assert_eq!(Outcome::Correct.feedback_text(), "¡Correcto!");
        assert_eq!(
            Outcome::Incorrect { expected: 15 }.feedback_text(),
            "Incorrecto. La respuesta es 15."
        );
        assert!(Outcome::Correct.is_correct());
    }
}
