// Command-line interface definitions for tablas
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tablas")]
#[command(author, version, about = "Multiplication tables drill with spoken questions and voice answers")]
#[command(long_about = "
Tablas drills the multiplication tables from 1 to 10.
Each question is shown and read aloud; answer by typing the number or,
when a microphone and a whisper model are available, by saying it.

SETUP:
  1. Install espeak-ng for spoken questions (or run with --mute)
  2. Download a multilingual whisper model (e.g. ggml-base.bin) into the
     models directory shown by `tablas config` for voice answers
  3. Run: tablas quiz --tables 2,3,7

USAGE:
  Type the answer and press Enter, or type v to answer by voice.
  Press Enter to go to the next question, q to quit.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override whisper model (tiny, base, small, medium, large-v3, large-v3-turbo)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Disable voice answers even if a microphone and model are available
    #[arg(long)]
    pub no_voice: bool,

    /// Do not speak questions and feedback
    #[arg(long)]
    pub mute: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a quiz in the terminal (default if no command specified)
    Quiz(QuizArgs),

    /// List audio input devices
    Devices,

    /// Convert spoken Spanish number words to a number
    Normalize {
        /// Words as a recognizer would return them, e.g. "veinte y tres"
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Recognize a spoken answer from an audio file (WAV)
    Listen {
        /// Path to audio file
        file: std::path::PathBuf,
    },

    /// Show current configuration
    Config {
        /// Print the commented default configuration instead
        #[arg(long)]
        default: bool,
    },
}

#[derive(Args, Clone, Debug)]
pub struct QuizArgs {
    /// Tables to practise, comma separated (1 to 10)
    #[arg(
        short,
        long,
        value_delimiter = ',',
        value_parser = clap::value_parser!(u32).range(1..=10),
        default_values_t = all_tables()
    )]
    pub tables: Vec<u32>,

    /// Number of questions (defaults to [quiz] question_count)
    #[arg(short = 'n', long, value_name = "N")]
    pub questions: Option<usize>,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Default for QuizArgs {
    fn default() -> Self {
        Self {
            tables: all_tables(),
            questions: None,
            json: false,
        }
    }
}

fn all_tables() -> Vec<u32> {
    (1..=10).collect()
}
