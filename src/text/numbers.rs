//! Spanish number-word normalization
//!
//! Recognized transcripts are noisy, so normalization tries a series of
//! fallbacks, first success wins:
//!
//! 1. Whole text is a number word ("siete", "veintitrés", "cuarenta")
//! 2. "<tens> y <ones>" ("veinte y tres", "cuarenta y dos")
//! 3. First token that is already a numeral ("es 42")
//! 4. Single-word digit strings concatenated ("dos cuatro" → 24)
//! 5. Nothing matched: the raw text is handed back unchanged

use std::fmt;

/// Conjunction joining tens and ones ("treinta y cinco")
const CONJUNCTION: &str = " y ";

/// Outcome of normalizing a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The transcript resolved to an integer
    Number(i64),
    /// Nothing resolved; carries the original text
    Unrecognized(String),
}

impl Normalized {
    /// The resolved integer, if any
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Normalized::Number(n) => Some(*n),
            Normalized::Unrecognized(_) => None,
        }
    }

    /// Candidate answer text for the quiz session
    pub fn into_answer_text(self) -> String {
        match self {
            Normalized::Number(n) => n.to_string(),
            Normalized::Unrecognized(text) => text,
        }
    }
}

impl fmt::Display for Normalized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalized::Number(n) => write!(f, "{}", n),
            Normalized::Unrecognized(text) => write!(f, "{}", text),
        }
    }
}

/// Normalize a spoken transcript into a number
pub fn normalize(raw: &str) -> Normalized {
    let text = raw.trim().to_lowercase();

    if let Some(n) = words_to_int(&text) {
        return Normalized::Number(n);
    }

    if let Some(n) = concatenate_digit_words(&text) {
        return Normalized::Number(n);
    }

    Normalized::Unrecognized(raw.to_string())
}

/// Steps 1-3: exact word, "tens y ones", first numeral token
fn words_to_int(text: &str) -> Option<i64> {
    if let Some(n) = number_word(text) {
        return Some(n);
    }

    if text.contains(CONJUNCTION) {
        let parts: Vec<&str> = text.split(CONJUNCTION).collect();
        if let [tens, ones] = parts.as_slice() {
            if let (Some(tens), Some(ones)) = (number_word(tens.trim()), number_word(ones.trim())) {
                return Some(tens + ones);
            }
        }
    }

    text.split_whitespace()
        .filter(|word| word.chars().all(|c| c.is_ascii_digit()))
        .find_map(|word| word.parse().ok())
}

/// Step 4: concatenate the digit strings of every recognized word
fn concatenate_digit_words(text: &str) -> Option<i64> {
    let digits: String = text.split_whitespace().filter_map(digit_string).collect();

    if digits.is_empty() {
        return None;
    }

    match digits.parse() {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::debug!("Digit string {:?} is not a number: {}", digits, e);
            None
        }
    }
}

/// Number words for 0-29 and the tens through 90, with and without accents
fn number_word(word: &str) -> Option<i64> {
    let value = match word {
        "cero" => 0,
        "uno" | "una" => 1,
        "dos" => 2,
        "tres" => 3,
        "cuatro" => 4,
        "cinco" => 5,
        "seis" => 6,
        "siete" => 7,
        "ocho" => 8,
        "nueve" => 9,
        "diez" => 10,
        "once" => 11,
        "doce" => 12,
        "trece" => 13,
        "catorce" => 14,
        "quince" => 15,
        "dieciséis" | "dieciseis" => 16,
        "diecisiete" => 17,
        "dieciocho" => 18,
        "diecinueve" => 19,
        "veinte" => 20,
        "veintiuno" => 21,
        "veintidós" | "veintidos" => 22,
        "veintitrés" | "veintitres" => 23,
        "veinticuatro" => 24,
        "veinticinco" => 25,
        "veintiséis" | "veintiseis" => 26,
        "veintisiete" => 27,
        "veintiocho" => 28,
        "veintinueve" => 29,
        "treinta" => 30,
        "cuarenta" => 40,
        "cincuenta" => 50,
        "sesenta" => 60,
        "setenta" => 70,
        "ochenta" => 80,
        "noventa" => 90,
        _ => return None,
    };
    Some(value)
}

/// Secondary single-word table used by the digit-string fallback
fn digit_string(word: &str) -> Option<&'static str> {
    let digits = match word {
        "uno" => "1",
        "dos" => "2",
        "tres" => "3",
        "cuatro" => "4",
        "cinco" => "5",
        "seis" => "6",
        "siete" => "7",
        "ocho" => "8",
        "nueve" => "9",
        "diez" => "10",
        "once" => "11",
        "doce" => "12",
        "trece" => "13",
        "catorce" => "14",
        "quince" => "15",
        "dieciséis" => "16",
        "diecisiete" => "17",
        "dieciocho" => "18",
        "diecinueve" => "19",
        "veinte" => "20",
        "treinta" => "30",
        "cuarenta" => "40",
        "cincuenta" => "50",
        "sesenta" => "60",
        "setenta" => "70",
        "ochenta" => "80",
        "noventa" => "90",
        _ => return None,
    };
    Some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_number_words() {
        assert_eq!(normalize("siete"), Normalized::Number(7));
        assert_eq!(normalize("cuarenta"), Normalized::Number(40));
        assert_eq!(normalize("cero"), Normalized::Number(0));
        assert_eq!(normalize("una"), Normalized::Number(1));
    }

    #[test]
    fn test_case_and_whitespace_ignored() {
        assert_eq!(normalize("  Veintitrés "), Normalized::Number(23));
        assert_eq!(normalize("DIECISEIS"), Normalized::Number(16));
    }

    #[test]
    fn test_tens_and_ones() {
        assert_eq!(normalize("veinte y tres"), Normalized::Number(23));
        assert_eq!(normalize("cuarenta y dos"), Normalized::Number(42));
        assert_eq!(normalize("noventa y nueve"), Normalized::Number(99));
    }

    #[test]
    fn test_tens_and_ones_needs_both_halves() {
        // "cuarenta y algo" fails step 2 and falls through to digit words
        assert_eq!(normalize("cuarenta y algo"), Normalized::Number(40));
        assert_eq!(
            normalize("algo y nada"),
            Normalized::Unrecognized("algo y nada".to_string())
        );
    }

    #[test]
    fn test_first_numeral_token_wins() {
        assert_eq!(normalize("es 42"), Normalized::Number(42));
        assert_eq!(normalize("12 o 13"), Normalized::Number(12));
        assert_eq!(normalize("56"), Normalized::Number(56));
    }

    #[test]
    fn test_oversized_numeral_token_is_skipped() {
        assert_eq!(
            normalize("99999999999999999999999 o 42"),
            Normalized::Number(42)
        );
    }

    #[test]
    fn test_digit_string_fallback_concatenates() {
        assert_eq!(normalize("dos cuatro"), Normalized::Number(24));
        assert_eq!(normalize("creo que ocho"), Normalized::Number(8));
        // Concatenation, not arithmetic
        assert_eq!(normalize("treinta seis"), Normalized::Number(306));
    }

    #[test]
    fn test_unrecognized_returns_original_text() {
        assert_eq!(normalize("xyz"), Normalized::Unrecognized("xyz".to_string()));
        assert_eq!(normalize(""), Normalized::Unrecognized(String::new()));
        assert!(normalize("xyz").as_number().is_none());
        assert_eq!(normalize("xyz").into_answer_text(), "xyz");
    }

    #[test]
    fn test_huge_digit_string_is_unrecognized() {
        let raw = "nueve ".repeat(30);
        assert_eq!(normalize(&raw), Normalized::Unrecognized(raw.clone()));
    }

    #[test]
    fn test_answer_text_of_number() {
        assert_eq!(normalize("veinte y uno").into_answer_text(), "21");
        assert_eq!(format!("{}", normalize("ocho")), "8");
    }
}
