//! Error types for tablas
//!
//! Uses thiserror for ergonomic error definitions. Quiz errors carry the
//! learner-facing wording directly since they are shown inline.

use thiserror::Error;

/// Top-level error type for the tablas application
#[derive(Error, Debug)]
pub enum TablasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Quiz error: {0}")]
    Quiz(#[from] QuizError),

    #[error("Audio capture error: {0}")]
    Audio(#[from] AudioError),

    #[error("Recognition error: {0}")]
    Recognize(#[from] RecognizeError),

    #[error("Speech output error: {0}")]
    Speech(#[from] SpeechError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the quiz session and question generation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuizError {
    #[error("Selecciona al menos una tabla.")]
    EmptySelection,

    #[error("La tabla del {0} no existe (usa 1 a 10).")]
    TableOutOfRange(u32),

    #[error("Número de preguntas no válido: {0}")]
    InvalidQuestionCount(usize),

    #[error("La respuesta no es válida.")]
    InvalidAnswer(String),

    #[error("No hay un quiz activo.")]
    NoActiveSession,

    #[error("Ya se está escuchando una respuesta.")]
    CaptureInProgress,

    #[error("Action not allowed while {actual} (expected {expected})")]
    WrongPhase {
        expected: &'static str,
        actual: String,
    },

    #[error("All {0} questions for the selected tables were already asked")]
    QuestionSpaceExhausted(usize),

    #[error("Question generation failed: {0}")]
    GenerationFailed(String),
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio connection failed: {0}")]
    Connection(String),

    #[error("Audio device not found: '{0}'. List devices with: tablas devices")]
    DeviceNotFound(String),

    #[error("Audio device '{requested}' not found. {available}")]
    DeviceNotFoundWithList { requested: String, available: String },

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("Audio stream did not respond within {0} seconds")]
    Timeout(u32),

    #[error("No audio was captured. Check your microphone.")]
    EmptyRecording,
}

/// Errors related to speech recognition
#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("Model not found: {0}\n  Download a ggml whisper model into the models directory (see `tablas config`).")]
    ModelNotFound(String),

    #[error("Whisper initialization failed: {0}")]
    InitFailed(String),

    #[error("Recognition failed: {0}")]
    InferenceFailed(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),
}

/// Errors related to speech synthesis
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech engine '{0}' not found in PATH. Install espeak-ng or set [speech] command.")]
    EngineNotFound(String),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),
}

/// Result type alias using TablasError
pub type Result<T> = std::result::Result<T, TablasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learner_facing_messages() {
        assert_eq!(
            QuizError::EmptySelection.to_string(),
            "Selecciona al menos una tabla."
        );
        assert_eq!(
            QuizError::InvalidAnswer("abc".to_string()).to_string(),
            "La respuesta no es válida."
        );
    }

    #[test]
    fn test_quiz_error_converts_to_top_level() {
        let err: TablasError = QuizError::NoActiveSession.into();
        assert!(matches!(err, TablasError::Quiz(QuizError::NoActiveSession)));
        assert!(err.to_string().starts_with("Quiz error"));
    }
}
