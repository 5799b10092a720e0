//! Line-oriented terminal front-end for the quiz
//!
//! Reads one line per action from stdin and prints engine events to stdout:
//! a number answers, `v` answers by voice, an empty line or `n` moves on,
//! `q` leaves the quiz. Between quizzes it asks for the next tables.

use crate::engine::{EngineHandle, QuizEvent, LISTENING_TEXT, LOADING_TEXT, NOT_UNDERSTOOD_TEXT};
use crate::quiz::Summary;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Quiz parameters picked on the command line
#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    pub tables: Vec<u32>,
    pub question_count: usize,
    /// Offer the `v` action
    pub voice_available: bool,
    /// Print the summary as JSON instead of text
    pub json: bool,
}

/// One line of user input during a quiz, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Answer(String),
    Voice,
    Next,
    Quit,
    Ignored,
}

/// Interpret a line; `awaiting` is true while a question is open
fn parse_input(line: &str, awaiting: bool, voice_available: bool) -> Input {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "q" | "salir" => Input::Quit,
        "v" if awaiting && voice_available => Input::Voice,
        "" | "n" if !awaiting => Input::Next,
        "" => Input::Ignored,
        _ if awaiting => Input::Answer(line.to_string()),
        _ => Input::Ignored,
    }
}

/// Answer to the "another quiz?" prompt
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    /// Same tables as the last quiz
    Same,
    Tables(Vec<u32>),
    Quit,
    Invalid,
}

/// Parse a table list such as "2,3,7" or "2 3 7"
fn parse_selection(line: &str) -> Selection {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => return Selection::Same,
        "q" | "salir" => return Selection::Quit,
        _ => {}
    }

    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<u32>, _>>()
        .map_or(Selection::Invalid, Selection::Tables)
}

/// Where the console is between events and input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the question batch
    Loading,
    Awaiting,
    Answered,
    /// Between quizzes, asking for the next tables
    Choosing,
}

const SELECTION_PROMPT: &str = "Tablas para otro quiz (p. ej. 2,3,7; Enter: las mismas; q: salir)";

/// Text printed for an event
fn render(event: &QuizEvent, voice_available: bool) -> Vec<String> {
    match event {
        QuizEvent::Loading => vec![LOADING_TEXT.to_string()],
        QuizEvent::QuestionReady { text, counter, .. } => {
            let hint = if voice_available {
                "Escribe la respuesta (v: responder con voz, q: salir)"
            } else {
                "Escribe la respuesta (q: salir)"
            };
            vec![
                String::new(),
                format!("Pregunta {}", counter),
                format!("  {} = ?", text),
                hint.to_string(),
            ]
        }
        QuizEvent::Listening => vec![LISTENING_TEXT.to_string()],
        QuizEvent::Feedback { text, .. } => vec![
            text.clone(),
            "(Enter: siguiente, q: salir)".to_string(),
        ],
        QuizEvent::InvalidAnswer { text } => vec![text.clone()],
        QuizEvent::NotUnderstood => vec![NOT_UNDERSTOOD_TEXT.to_string()],
        QuizEvent::Finished(summary) => render_summary(summary),
        QuizEvent::Cancelled => vec!["Quiz cancelado.".to_string()],
        QuizEvent::Rejected { message } => vec![message.clone()],
    }
}

fn render_summary(summary: &Summary) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "¡Has completado el quiz!".to_string(),
        summary.score_line(),
    ];
    if !summary.mistakes.is_empty() {
        lines.push(String::new());
        lines.extend(summary.mistake_lines().into_iter().map(|l| format!("  {}", l)));
    }
    lines
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

/// Run quizzes in the terminal until the learner leaves
///
/// After each quiz the learner can pick new tables and play again. JSON
/// mode plays a single quiz. Returns the summary of the last completed
/// quiz, None when none was completed.
pub async fn run(
    handle: EngineHandle,
    mut events: mpsc::UnboundedReceiver<QuizEvent>,
    options: ConsoleOptions,
) -> anyhow::Result<Option<Summary>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Tables of the last quiz that started, and of the one being loaded
    let mut tables = options.tables.clone();
    let mut requested = tables.clone();
    let mut phase = Phase::Loading;
    let mut first_quiz = true;
    let mut last_summary = None;
    // Set when stdin closed mid-quiz: leave once the cancel lands
    let mut closing = false;

    handle.start_session(tables.clone(), options.question_count);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    anyhow::bail!("Quiz engine stopped unexpectedly");
                };

                match &event {
                    QuizEvent::QuestionReady { .. } => {
                        first_quiz = false;
                        tables.clone_from(&requested);
                        phase = Phase::Awaiting;
                    }
                    QuizEvent::Feedback { .. } => phase = Phase::Answered,
                    QuizEvent::Finished(summary) => {
                        last_summary = Some(summary.clone());
                        if options.json {
                            println!("{}", serde_json::to_string_pretty(summary)?);
                            return Ok(last_summary);
                        }
                        phase = Phase::Choosing;
                    }
                    QuizEvent::Cancelled => {
                        if closing {
                            print_lines(&render(&event, options.voice_available));
                            return Ok(last_summary);
                        }
                        phase = Phase::Choosing;
                    }
                    QuizEvent::Rejected { message } if phase == Phase::Loading => {
                        if first_quiz {
                            anyhow::bail!("{}", message);
                        }
                        phase = Phase::Choosing;
                    }
                    _ => {}
                }

                print_lines(&render(&event, options.voice_available));
                if phase == Phase::Choosing {
                    if options.json {
                        return Ok(last_summary);
                    }
                    println!("\n{}", SELECTION_PROMPT);
                }
            }

            line = lines.next_line(), if !closing => {
                let Some(line) = line? else {
                    tracing::debug!("stdin closed");
                    if phase == Phase::Choosing {
                        return Ok(last_summary);
                    }
                    closing = true;
                    handle.cancel();
                    continue;
                };

                if phase == Phase::Choosing {
                    match parse_selection(&line) {
                        Selection::Same => requested.clone_from(&tables),
                        Selection::Tables(picked) => requested = picked,
                        Selection::Quit => return Ok(last_summary),
                        Selection::Invalid => {
                            println!("Escribe números de tabla separados por comas.");
                            continue;
                        }
                    }
                    phase = Phase::Loading;
                    handle.start_session(requested.clone(), options.question_count);
                    continue;
                }

                let input = parse_input(&line, phase == Phase::Awaiting, options.voice_available);
                if phase == Phase::Loading && input != Input::Quit {
                    continue;
                }
                match input {
                    Input::Answer(text) => handle.submit_typed_answer(text),
                    Input::Voice => handle.submit_voice_capture(),
                    Input::Next => handle.advance(),
                    Input::Quit => handle.cancel(),
                    Input::Ignored => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::Question;
    use crate::state::Outcome;

    #[test]
    fn test_parse_input_while_awaiting() {
        assert_eq!(parse_input(" 42 ", true, true), Input::Answer("42".to_string()));
        assert_eq!(parse_input("cuarenta", true, false), Input::Answer("cuarenta".to_string()));
        assert_eq!(parse_input("V", true, true), Input::Voice);
        // Without voice, "v" is just a (bad) answer
        assert_eq!(parse_input("v", true, false), Input::Answer("v".to_string()));
        assert_eq!(parse_input("", true, true), Input::Ignored);
        assert_eq!(parse_input("q", true, true), Input::Quit);
    }

    #[test]
    fn test_parse_input_after_feedback() {
        assert_eq!(parse_input("", false, true), Input::Next);
        assert_eq!(parse_input("n", false, true), Input::Next);
        assert_eq!(parse_input("12", false, true), Input::Ignored);
        assert_eq!(parse_input("salir", false, true), Input::Quit);
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection(""), Selection::Same);
        assert_eq!(parse_selection("2,3,7"), Selection::Tables(vec![2, 3, 7]));
        assert_eq!(parse_selection(" 4 , 8 "), Selection::Tables(vec![4, 8]));
        assert_eq!(parse_selection("5 6"), Selection::Tables(vec![5, 6]));
        assert_eq!(parse_selection("Q"), Selection::Quit);
        assert_eq!(parse_selection("dos"), Selection::Invalid);
        assert_eq!(parse_selection("-1"), Selection::Invalid);
    }

    #[test]
    fn test_render_question_hides_voice_hint() {
        let event = QuizEvent::QuestionReady {
            text: "3 x 5".to_string(),
            counter: "2/10".to_string(),
            index: 1,
            total: 10,
        };
        let lines = render(&event, false);
        assert_eq!(lines[1], "Pregunta 2/10");
        assert_eq!(lines[2], "  3 x 5 = ?");
        assert!(!lines[3].contains("voz"));
        assert!(render(&event, true)[3].contains("voz"));
    }

    #[test]
    fn test_render_summary() {
        let summary = Summary {
            score: 2,
            total_questions: 3,
            mistakes: vec![Question::new(3, 5)],
        };
        let lines = render(&QuizEvent::Finished(summary), false);
        assert!(lines.contains(&"¡Has completado el quiz!".to_string()));
        assert!(lines.contains(&"Puntuación: 2 / 3".to_string()));
        assert!(lines.contains(&"  3 x 5 = 15".to_string()));
    }

    #[test]
    fn test_render_feedback() {
        let event = QuizEvent::Feedback {
            text: Outcome::Incorrect { expected: 15 }.feedback_text(),
            outcome: Outcome::Incorrect { expected: 15 },
        };
        assert_eq!(render(&event, false)[0], "Incorrecto. La respuesta es 15.");
    }
}
