//! Speech recognition module
//!
//! A loaded [`RecognizerModel`] is shared for the whole program; each voice
//! capture gets its own [`Recognizer`] that is fed audio chunk by chunk.
//! `accept_waveform` returns true once a complete utterance was recognized,
//! after which `result` yields its text. `final_result` flushes whatever is
//! buffered when the caller stops early (timeout or end of stream).
//!
//! Transcripts come back lowercase with punctuation stripped, ready for
//! [`crate::text::normalize`].

pub mod endpoint;
pub mod whisper;

use crate::config::RecognizerConfig;
use crate::error::RecognizeError;
use std::sync::Arc;

/// Streaming recognizer for a single capture
pub trait Recognizer: Send {
    /// Feed mono f32 samples; true once an utterance is complete
    fn accept_waveform(&mut self, samples: &[f32]) -> Result<bool, RecognizeError>;

    /// Text of the utterance completed by the last `accept_waveform`
    fn result(&mut self) -> Result<String, RecognizeError>;

    /// Text of whatever speech is still buffered, empty if none
    fn final_result(&mut self) -> Result<String, RecognizeError>;
}

/// A loaded acoustic model that hands out recognizers
pub trait RecognizerModel: Send + Sync {
    /// Create a recognizer for audio at `sample_rate`
    fn recognizer(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>, RecognizeError>;

    /// Model name for logging
    fn name(&self) -> &str;
}

/// Load the configured model
///
/// Blocking: reads the model file from disk. Call from a blocking context.
pub fn load_model(config: &RecognizerConfig) -> Result<Arc<dyn RecognizerModel>, RecognizeError> {
    tracing::info!(
        "Loading recognizer: model={}, language={}",
        config.model,
        config.language
    );
    Ok(Arc::new(whisper::WhisperModel::load(config)?))
}

/// Lowercase a transcript and strip everything but letters, digits and spaces
///
/// Bracketed non-speech markers such as `[BLANK_AUDIO]` or `(música)` are
/// dropped entirely.
pub fn clean_transcript(raw: &str) -> String {
    let mut depth = 0usize;
    let mut kept = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            c if depth == 0 && c.is_alphanumeric() => kept.push(c),
            _ => kept.push(' '),
        }
    }

    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_transcript() {
        assert_eq!(clean_transcript(" Veintitrés."), "veintitrés");
        assert_eq!(clean_transcript("¡Cuarenta y dos!"), "cuarenta y dos");
        assert_eq!(clean_transcript("  15, "), "15");
        assert_eq!(clean_transcript("[BLANK_AUDIO]"), "");
        assert_eq!(clean_transcript("(música) siete"), "siete");
        assert_eq!(clean_transcript(""), "");
    }
}
