//! Text processing module
//!
//! Provides the text transformations around speech:
//! - Spoken-math rewriting before synthesis (e.g., "3 x 7" → "3 por 7")
//! - Custom word replacements before synthesis
//! - Number-word normalization of recognized transcripts (see [`numbers`])

pub mod numbers;

pub use numbers::{normalize, Normalized};

use regex::Regex;
use std::collections::HashMap;

/// Spoken word for the multiplication glyph
pub const TIMES_WORD: &str = "por";

/// Text processor applied to every utterance before it is synthesized
pub struct TextProcessor {
    /// Matches "<digit> x <digit>" with optional spacing
    times: Option<Regex>,
    /// Custom word replacements (lowercase key → replacement value)
    replacements: HashMap<String, String>,
}

impl TextProcessor {
    /// Create a new text processor with custom replacements
    pub fn new(replacements: &HashMap<String, String>) -> Self {
        let times = match Regex::new(r"(\d)\s*[xX×]\s*(\d)") {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!("Spoken math rewriting disabled: {}", e);
                None
            }
        };

        // Normalize replacement keys to lowercase for case-insensitive matching
        let replacements = replacements
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();

        Self {
            times,
            replacements,
        }
    }

    /// Prepare text for the synthesizer
    pub fn for_speech(&self, text: &str) -> String {
        let mut result = match self.times {
            Some(ref re) => re
                .replace_all(text, format!("${{1}} {} ${{2}}", TIMES_WORD).as_str())
                .into_owned(),
            None => text.to_string(),
        };

        for (word, replacement) in &self.replacements {
            result = replace_phrase_case_insensitive(&result, word, replacement);
        }

        result
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

/// Replace a word/phrase case-insensitively using regex for proper word boundaries
fn replace_phrase_case_insensitive(text: &str, from: &str, to: &str) -> String {
    let escaped = regex::escape(from);
    let pattern = format!(r"(?i)\b{}\b", escaped);

    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(text, to).into_owned(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_glyph_between_digits() {
        let processor = TextProcessor::default();
        assert_eq!(processor.for_speech("3 x 7"), "3 por 7");
        assert_eq!(processor.for_speech("10x10"), "10 por 10");
        assert_eq!(processor.for_speech("¿Cuánto es 4 X 9?"), "¿Cuánto es 4 por 9?");
    }

    #[test]
    fn test_x_outside_math_untouched() {
        let processor = TextProcessor::default();
        assert_eq!(processor.for_speech("xilófono x 3"), "xilófono x 3");
        assert_eq!(
            processor.for_speech("Incorrecto. La respuesta es 15."),
            "Incorrecto. La respuesta es 15."
        );
    }

    #[test]
    fn test_replacements_case_insensitive() {
        let mut replacements = HashMap::new();
        replacements.insert("Quiz".to_string(), "prueba".to_string());
        let processor = TextProcessor::new(&replacements);

        assert_eq!(
            processor.for_speech("Has completado el QUIZ"),
            "Has completado el prueba"
        );
    }
}
