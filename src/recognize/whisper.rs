//! Whisper-based answer recognition
//!
//! Uses whisper.cpp via the whisper-rs crate. Whisper transcribes whole
//! clips, so the recognizer buffers audio and lets the energy endpointer
//! decide when the learner has finished speaking.

use super::endpoint::{Endpoint, Endpointer};
use super::{clean_transcript, Recognizer, RecognizerModel};
use crate::config::{Config, RecognizerConfig};
use crate::error::RecognizeError;
use std::path::PathBuf;
use std::sync::Arc;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Sample rate whisper.cpp expects
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// whisper.cpp rejects clips shorter than one second
const MIN_CLIP_SAMPLES: usize = WHISPER_SAMPLE_RATE as usize;

/// Shared, loaded whisper model
struct WhisperInner {
    /// Whisper context (holds the model)
    ctx: WhisperContext,
    /// Language of the spoken answers
    language: String,
    /// Number of threads to use
    threads: usize,
}

/// Whisper model handing out per-capture recognizers
pub struct WhisperModel {
    inner: Arc<WhisperInner>,
    name: String,
    config: RecognizerConfig,
}

impl WhisperModel {
    /// Load the model named in `config`
    pub fn load(config: &RecognizerConfig) -> Result<Self, RecognizeError> {
        let model_path = resolve_model_path(&config.model)?;

        tracing::info!("Loading whisper model from {:?}", model_path);
        let start = std::time::Instant::now();

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| RecognizeError::ModelNotFound("Invalid path".to_string()))?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| RecognizeError::InitFailed(e.to_string()))?;

        tracing::info!("Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        let threads = config.threads.unwrap_or_else(|| num_cpus::get().min(4));

        Ok(Self {
            inner: Arc::new(WhisperInner {
                ctx,
                language: config.language.clone(),
                threads,
            }),
            name: config.model.clone(),
            config: config.clone(),
        })
    }
}

impl RecognizerModel for WhisperModel {
    fn recognizer(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>, RecognizeError> {
        if sample_rate != WHISPER_SAMPLE_RATE {
            return Err(RecognizeError::AudioFormat(format!(
                "Whisper needs {} Hz audio, got {} Hz",
                WHISPER_SAMPLE_RATE, sample_rate
            )));
        }

        Ok(Box::new(WhisperRecognizer {
            inner: self.inner.clone(),
            endpointer: Endpointer::new(&self.config, sample_rate),
            buffer: Vec::new(),
            completed: None,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Recognizer for one capture
pub struct WhisperRecognizer {
    inner: Arc<WhisperInner>,
    endpointer: Endpointer,
    /// Audio of the utterance in progress
    buffer: Vec<f32>,
    /// Transcript of the last completed utterance
    completed: Option<String>,
}

impl WhisperRecognizer {
    /// Transcribe the buffered utterance and start over
    fn take_utterance(&mut self) -> Result<String, RecognizeError> {
        let samples = std::mem::take(&mut self.buffer);
        let had_speech = self.endpointer.has_speech();
        self.endpointer.reset();

        if !had_speech {
            return Ok(String::new());
        }
        self.inner.transcribe(samples)
    }
}

impl Recognizer for WhisperRecognizer {
    fn accept_waveform(&mut self, samples: &[f32]) -> Result<bool, RecognizeError> {
        let state = self.endpointer.push(samples);
        self.buffer.extend_from_slice(samples);

        if state == Endpoint::Waiting {
            // Only keep a short lead-in so the first syllable is not clipped
            let keep = MIN_CLIP_SAMPLES / 2;
            if self.buffer.len() > keep {
                let excess = self.buffer.len() - keep;
                self.buffer.drain(..excess);
            }
        }

        if state == Endpoint::Ended {
            let text = self.take_utterance()?;
            self.completed = Some(text);
            return Ok(true);
        }
        Ok(false)
    }

    fn result(&mut self) -> Result<String, RecognizeError> {
        Ok(self.completed.take().unwrap_or_default())
    }

    fn final_result(&mut self) -> Result<String, RecognizeError> {
        if let Some(text) = self.completed.take() {
            return Ok(text);
        }
        self.take_utterance()
    }
}

impl WhisperInner {
    fn transcribe(&self, mut samples: Vec<f32>) -> Result<String, RecognizeError> {
        if samples.is_empty() {
            return Err(RecognizeError::AudioFormat("Empty audio buffer".to_string()));
        }

        let duration_secs = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32;
        tracing::debug!(
            "Recognizing {:.2}s of audio ({} samples)",
            duration_secs,
            samples.len()
        );

        if samples.len() < MIN_CLIP_SAMPLES {
            samples.resize(MIN_CLIP_SAMPLES, 0.0);
        }

        let start = std::time::Instant::now();

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| RecognizeError::InferenceFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if self.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.language));
        }

        params.set_translate(false);
        params.set_n_threads(self.threads as i32);

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params.set_suppress_blank(true);
        params.set_suppress_nst(true);

        // Answers are a few words at most
        params.set_single_segment(true);
        params.set_audio_ctx(calculate_audio_ctx(samples.len() as f32 / WHISPER_SAMPLE_RATE as f32));

        state
            .full(params, &samples)
            .map_err(|e| RecognizeError::InferenceFailed(e.to_string()))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(
                segment
                    .to_str()
                    .map_err(|e| RecognizeError::InferenceFailed(e.to_string()))?,
            );
        }

        let result = clean_transcript(&text);

        tracing::info!(
            "Recognized in {:.2}s: {:?}",
            start.elapsed().as_secs_f32(),
            result
        );

        Ok(result)
    }
}

/// Resolve model name to file path
fn resolve_model_path(model: &str) -> Result<PathBuf, RecognizeError> {
    // If it's already an absolute path, use it directly
    let path = PathBuf::from(model);
    if path.is_absolute() && path.exists() {
        return Ok(path);
    }

    let model_filename = model_filename(model).ok_or_else(|| {
        RecognizeError::ModelNotFound(format!(
            "Unknown model: '{}'. Valid models: tiny, base, small, medium, large-v3, large-v3-turbo",
            model
        ))
    })?;

    let candidates = [
        Config::models_dir().join(&model_filename),
        PathBuf::from(&model_filename),
        PathBuf::from("models").join(&model_filename),
    ];

    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let looked_in: Vec<String> = candidates
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect();

    Err(RecognizeError::ModelNotFound(format!(
        "Model '{}' not found. Looked in:\n{}\n\nDownload from: {}",
        model,
        looked_in.join("\n"),
        model_url(&model_filename)
    )))
}

/// ggml file name for a model name, None if the name is unknown
fn model_filename(model: &str) -> Option<String> {
    let name = match model {
        "tiny" => "ggml-tiny.bin",
        "base" => "ggml-base.bin",
        "small" => "ggml-small.bin",
        "medium" => "ggml-medium.bin",
        "large" | "large-v1" => "ggml-large-v1.bin",
        "large-v2" => "ggml-large-v2.bin",
        "large-v3" => "ggml-large-v3.bin",
        "large-v3-turbo" => "ggml-large-v3-turbo.bin",
        // If it looks like a filename, use it as-is
        other if other.ends_with(".bin") => other,
        _ => return None,
    };
    Some(name.to_string())
}

fn model_url(filename: &str) -> String {
    format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        filename
    )
}

/// audio_ctx for short clips: duration_seconds * 50 + 64, capped at the
/// full 30s window
fn calculate_audio_ctx(duration_secs: f32) -> i32 {
    ((duration_secs * 50.0) as i32 + 64).min(1500)
}
