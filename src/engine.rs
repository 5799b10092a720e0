//! Quiz engine - main event loop orchestration
//!
//! The engine is the only owner of the current [`Session`]. The front-end
//! sends [`EngineCommand`]s and receives [`QuizEvent`]s; slow work
//! (question generation, listening for a spoken answer) runs on background
//! tasks that post their results back into the loop tagged with the id of
//! the session that asked for them. Results for a session that has since
//! been cancelled or replaced are dropped.

use crate::capture::AnswerListener;
use crate::error::QuizError;
use crate::quiz::{Advance, Question, QuestionSource, Session, SessionId, Summary, TableSet};
use crate::speech::{SpeechHandle, VoiceProfile};
use crate::state::Outcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Shown while the question batch is generated
pub const LOADING_TEXT: &str = "Cargando preguntas...";

/// Shown while a voice answer is being captured
pub const LISTENING_TEXT: &str = "Escuchando, hable ahora...";

/// Shown and spoken when a voice answer produced nothing usable
pub const NOT_UNDERSTOOD_TEXT: &str = "No se entendió la respuesta. Intenta de nuevo.";

/// Requests from the front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Replace any current session with a new one
    Start {
        tables: Vec<u32>,
        question_count: usize,
    },
    /// Answer the current question with typed text
    SubmitTyped(String),
    /// Answer the current question by voice
    SubmitVoice,
    /// Move past the answered question
    Advance,
    /// Abandon the current session
    Cancel,
    /// Stop the engine loop
    Shutdown,
}

/// Notifications to the front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEvent {
    /// Questions are being generated
    Loading,
    /// A question is waiting for an answer
    QuestionReady {
        text: String,
        /// "K/N"
        counter: String,
        index: usize,
        total: usize,
    },
    /// The microphone is open
    Listening,
    /// The answer was checked
    Feedback { text: String, outcome: Outcome },
    /// The answer was not a number; the question is still open
    InvalidAnswer { text: String },
    /// A voice answer produced nothing usable; the question was repeated
    NotUnderstood,
    /// The last question was answered
    Finished(Summary),
    /// The session was abandoned
    Cancelled,
    /// A command could not be carried out
    Rejected { message: String },
}

/// Results posted back by background tasks
#[derive(Debug)]
enum Completion {
    QuestionsGenerated {
        session: SessionId,
        result: Result<Vec<Question>, QuizError>,
    },
    VoiceCaptured {
        session: SessionId,
        /// Index of the question that was open when listening started
        question: usize,
        answer: String,
    },
}

/// Collaborators the engine drives
#[derive(Clone)]
pub struct EngineParts {
    pub questions: Arc<dyn QuestionSource>,
    pub speech: SpeechHandle,
    pub listener: Arc<dyn AnswerListener>,
    pub capture_timeout: Duration,
}

/// Cloneable command sender for a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    fn send(&self, command: EngineCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Quiz engine stopped, command dropped");
        }
    }

    pub fn start_session(&self, tables: Vec<u32>, question_count: usize) {
        self.send(EngineCommand::Start {
            tables,
            question_count,
        });
    }

    pub fn submit_typed_answer(&self, text: impl Into<String>) {
        self.send(EngineCommand::SubmitTyped(text.into()));
    }

    pub fn submit_voice_capture(&self) {
        self.send(EngineCommand::SubmitVoice);
    }

    pub fn advance(&self) {
        self.send(EngineCommand::Advance);
    }

    pub fn cancel(&self) {
        self.send(EngineCommand::Cancel);
    }

    pub fn shutdown(&self) {
        self.send(EngineCommand::Shutdown);
    }
}

/// The quiz event loop
pub struct QuizEngine {
    parts: EngineParts,
    session: Option<Session>,
    /// Session whose voice capture is still running, if any
    capturing: Option<SessionId>,
    commands: mpsc::UnboundedReceiver<EngineCommand>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    events: mpsc::UnboundedSender<QuizEvent>,
}

impl QuizEngine {
    /// Create an engine with its command handle and event stream
    pub fn new(parts: EngineParts) -> (Self, EngineHandle, mpsc::UnboundedReceiver<QuizEvent>) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();

        let engine = Self {
            parts,
            session: None,
            capturing: None,
            commands,
            completion_tx,
            completions,
            events,
        };
        (engine, EngineHandle { tx: command_tx }, event_rx)
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Quiz engine started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(EngineCommand::Shutdown) | None => {
                            tracing::debug!("Quiz engine shutting down");
                            break;
                        }
                        Some(command) => self.handle_command(command),
                    }
                }

                // Never closes: the engine holds a sender
                Some(completion) = self.completions.recv() => {
                    self.handle_completion(completion);
                }
            }
        }

        tracing::info!("Quiz engine stopped");
    }

    fn handle_command(&mut self, command: EngineCommand) {
        tracing::debug!("Command: {:?}", command);

        match command {
            EngineCommand::Start {
                tables,
                question_count,
            } => self.start(tables, question_count),
            EngineCommand::SubmitTyped(text) => self.answer(&text),
            EngineCommand::SubmitVoice => self.listen(),
            EngineCommand::Advance => self.advance(),
            EngineCommand::Cancel => self.cancel(),
            EngineCommand::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::QuestionsGenerated { session, result } => {
                if !self.is_current(session) {
                    tracing::debug!("Discarding questions for stale session {}", session);
                    return;
                }
                self.questions_ready(result);
            }
            Completion::VoiceCaptured {
                session,
                question,
                answer,
            } => {
                if self.capturing == Some(session) {
                    self.capturing = None;
                }
                if !self.is_current(session) {
                    tracing::debug!("Discarding voice answer for stale session {}", session);
                    return;
                }
                let open = self.session.as_ref().map(Session::current_index);
                if open != Some(question) {
                    tracing::debug!(
                        "Discarding voice answer for question {} (now at {:?})",
                        question,
                        open
                    );
                    return;
                }
                self.voice_answer(answer);
            }
        }
    }

    fn is_current(&self, id: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id() == id)
    }

    fn emit(&self, event: QuizEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("No front-end listening for quiz events");
        }
    }

    fn reject(&self, error: QuizError) {
        tracing::debug!("Rejected: {}", error);
        self.emit(QuizEvent::Rejected {
            message: error.to_string(),
        });
    }

    fn start(&mut self, tables: Vec<u32>, question_count: usize) {
        // Invalid requests leave any running session alone
        let session = match TableSet::new(tables).and_then(|t| Session::new(t, question_count)) {
            Ok(session) => session,
            Err(e) => return self.reject(e),
        };

        if let Some(old) = self.session.replace(session) {
            tracing::debug!("Session {} replaced", old.id());
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };

        tracing::info!(
            "Starting quiz {}: tables {}, {} questions",
            session.id(),
            session.tables(),
            question_count
        );
        self.emit(QuizEvent::Loading);

        let id = session.id();
        let tables = session.tables().clone();
        let source = self.parts.questions.clone();
        let completion_tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || source.generate_batch(&tables, question_count))
                    .await
                    .unwrap_or_else(|e| Err(QuizError::GenerationFailed(e.to_string())));

            let _ = completion_tx.send(Completion::QuestionsGenerated {
                session: id,
                result,
            });
        });
    }

    fn questions_ready(&mut self, result: Result<Vec<Question>, QuizError>) {
        let begun = result.and_then(|questions| match self.session.as_mut() {
            Some(session) => session.begin(questions).map(|_| ()),
            None => Err(QuizError::NoActiveSession),
        });

        match begun {
            Ok(()) => self.present_question(),
            Err(e) => {
                tracing::warn!("Could not start quiz: {}", e);
                self.session = None;
                self.reject(e);
            }
        }
    }

    /// Announce and speak the current question
    fn present_question(&self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(question) = session.current_question() else {
            return;
        };

        self.emit(QuizEvent::QuestionReady {
            text: question.text().to_string(),
            counter: session.counter(),
            index: session.current_index(),
            total: session.question_count(),
        });
        self.parts
            .speech
            .enqueue(question.text(), VoiceProfile::Default);
    }

    fn answer(&mut self, text: &str) {
        let Some(session) = self.session.as_mut() else {
            return self.reject(QuizError::NoActiveSession);
        };

        match session.submit_answer(text) {
            Ok(outcome) => {
                tracing::debug!("Answer {:?}: {:?}", text, outcome);
                let feedback = outcome.feedback_text();
                let profile = if outcome.is_correct() {
                    VoiceProfile::Happy
                } else {
                    VoiceProfile::Character
                };
                self.parts.speech.enqueue(feedback.clone(), profile);
                self.emit(QuizEvent::Feedback {
                    text: feedback,
                    outcome,
                });
            }
            Err(QuizError::InvalidAnswer(raw)) => {
                tracing::debug!("Not a number: {:?}", raw);
                self.emit(QuizEvent::InvalidAnswer {
                    text: QuizError::InvalidAnswer(raw).to_string(),
                });
            }
            Err(e) => self.reject(e),
        }
    }

    fn listen(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return self.reject(QuizError::NoActiveSession);
        };
        if !session.state().is_awaiting_answer() {
            return self.reject(QuizError::WrongPhase {
                expected: "awaiting answer",
                actual: session.state().to_string(),
            });
        }
        if let Some(running) = self.capturing {
            tracing::debug!("Capture for {} still running, refusing voice request", running);
            return self.reject(QuizError::CaptureInProgress);
        }

        let id = session.id();
        let question = session.current_index();
        self.capturing = Some(id);
        self.emit(QuizEvent::Listening);

        let listener = self.parts.listener.clone();
        let timeout = self.parts.capture_timeout;
        let completion_tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let answer = listener.capture_answer(timeout).await;
            let _ = completion_tx.send(Completion::VoiceCaptured {
                session: id,
                question,
                answer,
            });
        });
    }

    fn voice_answer(&mut self, answer: String) {
        let awaiting = self
            .session
            .as_ref()
            .is_some_and(|s| s.state().is_awaiting_answer());
        if !awaiting {
            tracing::debug!("Question already answered, dropping voice answer {:?}", answer);
            return;
        }

        if answer.is_empty() {
            tracing::debug!("Voice answer not understood");
            self.emit(QuizEvent::NotUnderstood);
            self.parts
                .speech
                .enqueue(NOT_UNDERSTOOD_TEXT, VoiceProfile::Default);
            if let Some(question) = self.session.as_ref().and_then(Session::current_question) {
                self.parts
                    .speech
                    .enqueue(question.text(), VoiceProfile::Default);
            }
            return;
        }

        self.answer(&answer);
    }

    fn advance(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return self.reject(QuizError::NoActiveSession);
        };

        match session.advance() {
            Ok(Advance::Next(_)) => self.present_question(),
            Ok(Advance::Finished(summary)) => {
                tracing::info!(
                    "Quiz {} finished: {}/{}",
                    session.id(),
                    summary.score,
                    summary.total_questions
                );
                self.emit(QuizEvent::Finished(summary));
            }
            Err(e) => self.reject(e),
        }
    }

    fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!("Quiz {} cancelled ({})", session.id(), session.state());
        }
        self.emit(QuizEvent::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{ProfileTable, SilentSynthesizer, SpeechQueue};
    use crate::text::TextProcessor;

    struct Fixed(Vec<(u32, u32)>);

    impl QuestionSource for Fixed {
        fn generate_batch(&self, _tables: &TableSet, count: usize) -> Result<Vec<Question>, QuizError> {
            Ok(self
                .0
                .iter()
                .take(count)
                .map(|&(t, m)| Question::new(t, m))
                .collect())
        }
    }

    struct Deaf;

    #[async_trait::async_trait]
    impl AnswerListener for Deaf {
        async fn capture_answer(&self, _timeout: Duration) -> String {
            String::new()
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    fn engine(questions: Vec<(u32, u32)>) -> (QuizEngine, EngineHandle, mpsc::UnboundedReceiver<QuizEvent>, SpeechQueue) {
        let queue = SpeechQueue::spawn(
            Box::new(SilentSynthesizer),
            ProfileTable::default(),
            TextProcessor::default(),
        );
        let parts = EngineParts {
            questions: Arc::new(Fixed(questions)),
            speech: queue.handle(),
            listener: Arc::new(Deaf),
            capture_timeout: Duration::from_millis(10),
        };
        let (engine, handle, events) = QuizEngine::new(parts);
        (engine, handle, events, queue)
    }

    #[tokio::test]
    async fn test_answer_before_start_is_rejected() {
        let (engine, handle, mut events, queue) = engine(vec![(2, 2)]);
        let task = tokio::spawn(engine.run());

        handle.submit_typed_answer("4");
        assert_eq!(
            events.recv().await,
            Some(QuizEvent::Rejected {
                message: QuizError::NoActiveSession.to_string()
            })
        );

        handle.shutdown();
        task.await.unwrap();
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_short_batch_fails_the_start() {
        let (engine, handle, mut events, queue) = engine(vec![(2, 2)]);
        let task = tokio::spawn(engine.run());

        handle.start_session(vec![2], 3);
        assert_eq!(events.recv().await, Some(QuizEvent::Loading));
        assert!(matches!(events.recv().await, Some(QuizEvent::Rejected { .. })));

        // The failed session is gone
        handle.advance();
        assert_eq!(
            events.recv().await,
            Some(QuizEvent::Rejected {
                message: QuizError::NoActiveSession.to_string()
            })
        );

        handle.shutdown();
        task.await.unwrap();
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_advance_before_answer_is_rejected() {
        let (engine, handle, mut events, queue) = engine(vec![(4, 4), (4, 5)]);
        let task = tokio::spawn(engine.run());

        handle.start_session(vec![4], 2);
        assert_eq!(events.recv().await, Some(QuizEvent::Loading));
        assert!(matches!(
            events.recv().await,
            Some(QuizEvent::QuestionReady { index: 0, .. })
        ));

        handle.advance();
        assert!(matches!(events.recv().await, Some(QuizEvent::Rejected { .. })));

        handle.submit_typed_answer("16");
        assert!(matches!(
            events.recv().await,
            Some(QuizEvent::Feedback {
                outcome: Outcome::Correct,
                ..
            })
        ));

        handle.advance();
        assert_eq!(
            events.recv().await,
            Some(QuizEvent::QuestionReady {
                text: "4 x 5".to_string(),
                counter: "2/2".to_string(),
                index: 1,
                total: 2,
            })
        );

        handle.shutdown();
        task.await.unwrap();
        queue.shutdown().await;
    }
}
