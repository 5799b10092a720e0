//! Quiz core: questions, their generation, and the session state machine

pub mod generator;
pub mod question;
pub mod session;

pub use generator::{QuestionGenerator, QuestionSource, RandomQuestions, RepeatPolicy, SeenRegistry};
pub use question::{Question, TableSet};
pub use session::{Advance, Session, SessionId, Summary};
