//! Configuration loading and types for tablas
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/tablas/config.toml)
//! 3. Environment variables (TABLAS_*)
//! 4. CLI arguments (highest priority)

use crate::error::TablasError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Tablas Configuration
#
# Location: ~/.config/tablas/config.toml
# All settings can be overridden via CLI flags

[quiz]
# Number of questions per quiz (the selection screen offers 5, 10, 20 or 30)
question_count = 10

# Seconds to listen for a spoken answer
capture_timeout_secs = 10

# Once every "T x M" for the selected tables has been asked,
# keep drawing (with repeats) instead of failing the quiz
allow_repeats_when_exhausted = true

[audio]
# Audio input device ("default" uses system default)
# List devices with: tablas devices
device = "default"

# Sample rate in Hz (whisper expects 16000)
sample_rate = 16000

# Samples handed to the recognizer per step (4000 = 250ms at 16kHz)
chunk_samples = 4000

[recognizer]
# Whisper model: tiny, base, small, medium, large-v3, large-v3-turbo
# Or an absolute path to a ggml .bin file.
# Voice answers are disabled when the model is missing.
model = "base"

# Spoken language of the learner
language = "es"

# Number of CPU threads for inference (omit for auto-detection)
# threads = 4

# Energy threshold for detecting speech (0.0 = sensitive, 1.0 = aggressive)
speech_threshold = 0.5

# Minimum speech before an utterance counts
min_speech_ms = 100

# Silence after speech that finalizes the utterance
trailing_silence_ms = 700

[speech]
# Speak questions and feedback aloud
enabled = true

# Synthesizer command (espeak-ng compatible flags: -s rate, -a amplitude, -v voice)
command = "espeak-ng"

# Synthesizer voices; slot 0 is the default voice
voices = ["es"]

# Volume level (0.0 to 1.0)
volume = 1.0

# Words rewritten before synthesis (case-insensitive)
# replacements = { "quiz" = "prueba" }

[speech.profiles.default]
rate = 150

[speech.profiles.happy]
rate = 180
voice_slot = 1

[speech.profiles.character]
rate = 140
voice_slot = 0
"#;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub quiz: QuizConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub recognizer: RecognizerConfig,

    #[serde(default)]
    pub speech: SpeechConfig,
}

/// Quiz session defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuizConfig {
    /// Questions per quiz when `--questions` is not given
    #[serde(default = "default_question_count")]
    pub question_count: usize,

    /// How long a spoken answer may take
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_secs: u64,

    /// Allow repeated questions once the table set is exhausted
    #[serde(default = "default_true")]
    pub allow_repeats_when_exhausted: bool,
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// PipeWire/PulseAudio device name, or "default"
    #[serde(default = "default_device")]
    pub device: String,

    /// Sample rate in Hz (whisper expects 16000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Fixed chunk size fed to the recognizer
    #[serde(default = "default_chunk_samples")]
    pub chunk_samples: usize,
}

/// Speech recognition configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecognizerConfig {
    /// Model name: tiny, base, small, medium, large-v3, large-v3-turbo
    /// Can also be an absolute path to a .bin file
    #[serde(default = "default_model")]
    pub model: String,

    /// Language code (es, en, auto, etc.)
    #[serde(default = "default_language")]
    pub language: String,

    /// Number of threads for inference (None = auto-detect)
    #[serde(default)]
    pub threads: Option<usize>,

    /// Energy threshold for speech detection (0.0 - 1.0)
    #[serde(default = "default_speech_threshold")]
    pub speech_threshold: f32,

    /// Minimum speech duration in milliseconds
    #[serde(default = "default_min_speech_ms")]
    pub min_speech_ms: u32,

    /// Trailing silence that ends an utterance, in milliseconds
    #[serde(default = "default_trailing_silence_ms")]
    pub trailing_silence_ms: u32,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeechConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Synthesizer executable
    #[serde(default = "default_speech_command")]
    pub command: String,

    /// Available voices, slot 0 is the fallback voice
    #[serde(default = "default_voices")]
    pub voices: Vec<String>,

    /// Volume level (0.0 to 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Custom word replacements applied before synthesis (case-insensitive)
    #[serde(default)]
    pub replacements: HashMap<String, String>,

    #[serde(default)]
    pub profiles: ProfilesConfig,
}

/// Rate and voice slot for each voice profile
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfilesConfig {
    #[serde(default = "default_profile")]
    pub default: ProfileConfig,

    #[serde(default = "happy_profile")]
    pub happy: ProfileConfig,

    #[serde(default = "character_profile")]
    pub character: ProfileConfig,
}

/// One voice profile entry
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProfileConfig {
    /// Words per minute
    pub rate: u32,

    /// Index into `speech.voices`; missing slots fall back to slot 0
    #[serde(default)]
    pub voice_slot: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_question_count() -> usize {
    10
}

fn default_capture_timeout() -> u64 {
    10
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_chunk_samples() -> usize {
    4000
}

fn default_model() -> String {
    "base".to_string()
}

fn default_language() -> String {
    "es".to_string()
}

fn default_speech_threshold() -> f32 {
    0.5
}

fn default_min_speech_ms() -> u32 {
    100
}

fn default_trailing_silence_ms() -> u32 {
    700
}

fn default_speech_command() -> String {
    "espeak-ng".to_string()
}

fn default_voices() -> Vec<String> {
    vec!["es".to_string()]
}

fn default_volume() -> f32 {
    1.0
}

fn default_profile() -> ProfileConfig {
    ProfileConfig {
        rate: 150,
        voice_slot: None,
    }
}

fn happy_profile() -> ProfileConfig {
    ProfileConfig {
        rate: 180,
        voice_slot: Some(1),
    }
}

fn character_profile() -> ProfileConfig {
    ProfileConfig {
        rate: 140,
        voice_slot: Some(0),
    }
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            question_count: default_question_count(),
            capture_timeout_secs: default_capture_timeout(),
            allow_repeats_when_exhausted: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            chunk_samples: default_chunk_samples(),
        }
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            language: default_language(),
            threads: None,
            speech_threshold: default_speech_threshold(),
            min_speech_ms: default_min_speech_ms(),
            trailing_silence_ms: default_trailing_silence_ms(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_speech_command(),
            voices: default_voices(),
            volume: default_volume(),
            replacements: HashMap::new(),
            profiles: ProfilesConfig::default(),
        }
    }
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            default: default_profile(),
            happy: happy_profile(),
            character: character_profile(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "tablas")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "tablas")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the data directory path (for models)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "tablas")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the models directory path
    pub fn models_dir() -> PathBuf {
        Self::data_dir().join("models")
    }

    /// Ensure the config and models directories exist
    pub fn ensure_directories() -> std::io::Result<()> {
        if let Some(config_dir) = Self::config_dir() {
            std::fs::create_dir_all(&config_dir)?;
            tracing::debug!("Ensured config directory exists: {:?}", config_dir);
        }

        let models_dir = Self::models_dir();
        std::fs::create_dir_all(&models_dir)?;
        tracing::debug!("Ensured models directory exists: {:?}", models_dir);

        Ok(())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, TablasError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| TablasError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| TablasError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    apply_env_overrides(&mut config);
    validate(&config)?;

    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(model) = std::env::var("TABLAS_MODEL") {
        config.recognizer.model = model;
    }
    if let Ok(device) = std::env::var("TABLAS_AUDIO_DEVICE") {
        config.audio.device = device;
    }
    if let Ok(command) = std::env::var("TABLAS_SPEECH_COMMAND") {
        config.speech.command = command;
    }
}

fn validate(config: &Config) -> Result<(), TablasError> {
    if config.quiz.question_count == 0 {
        return Err(TablasError::Config(
            "quiz.question_count must be at least 1".to_string(),
        ));
    }
    if config.audio.chunk_samples == 0 {
        return Err(TablasError::Config(
            "audio.chunk_samples must be at least 1".to_string(),
        ));
    }
    if config.audio.sample_rate == 0 {
        return Err(TablasError::Config(
            "audio.sample_rate must be positive".to_string(),
        ));
    }
    Ok(())
}
