//! Speech output module
//!
//! Every utterance goes through one [`SpeechQueue`]: callers enqueue and
//! return immediately, a single worker speaks items strictly in submission
//! order, each to completion before the next. That keeps a question ahead of
//! any feedback enqueued after it.

pub mod espeak;

use crate::config::{ProfileConfig, SpeechConfig};
use crate::error::SpeechError;
use crate::text::TextProcessor;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Tone used for an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceProfile {
    /// Questions and prompts
    #[default]
    Default,
    /// Praise for a correct answer
    Happy,
    /// Correction after a wrong answer
    Character,
}

/// Concrete synthesizer settings for one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    /// Words per minute
    pub rate: u32,
    /// Synthesizer voice id, None for the engine default
    pub voice: Option<String>,
    /// Volume level (0.0 to 1.0)
    pub volume: f32,
}

/// Profile → rate/voice table resolved against the configured voices
#[derive(Debug, Clone)]
pub struct ProfileTable {
    default: ProfileConfig,
    happy: ProfileConfig,
    character: ProfileConfig,
    voices: Vec<String>,
    volume: f32,
}

impl ProfileTable {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            default: config.profiles.default,
            happy: config.profiles.happy,
            character: config.profiles.character,
            voices: config.voices.clone(),
            volume: config.volume.clamp(0.0, 1.0),
        }
    }

    /// Settings for `profile`; a missing voice slot falls back to slot 0
    pub fn settings(&self, profile: VoiceProfile) -> VoiceSettings {
        let entry = match profile {
            VoiceProfile::Default => self.default,
            VoiceProfile::Happy => self.happy,
            VoiceProfile::Character => self.character,
        };

        let voice = entry
            .voice_slot
            .and_then(|slot| self.voices.get(slot))
            .or_else(|| self.voices.first())
            .cloned();

        VoiceSettings {
            rate: entry.rate,
            voice,
            volume: self.volume,
        }
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::from_config(&SpeechConfig::default())
    }
}

/// Trait for speech synthesizer implementations
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` and return once playback has finished
    async fn speak(&self, text: &str, voice: &VoiceSettings) -> Result<(), SpeechError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Synthesizer that only logs, used with `--mute` or when speech is disabled
pub struct SilentSynthesizer;

#[async_trait::async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn speak(&self, text: &str, _voice: &VoiceSettings) -> Result<(), SpeechError> {
        tracing::debug!("(muted) {}", text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

/// One queued utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub profile: VoiceProfile,
}

/// Cloneable sender side of the queue
#[derive(Debug, Clone)]
pub struct SpeechHandle {
    tx: mpsc::UnboundedSender<SpeechRequest>,
}

impl SpeechHandle {
    /// Queue an utterance; returns immediately
    pub fn enqueue(&self, text: impl Into<String>, profile: VoiceProfile) {
        let request = SpeechRequest {
            text: text.into(),
            profile,
        };
        if self.tx.send(request).is_err() {
            tracing::warn!("Speech worker stopped, dropping utterance");
        }
    }
}

/// Single-worker FIFO speech queue
pub struct SpeechQueue {
    handle: SpeechHandle,
    worker: JoinHandle<()>,
}

impl SpeechQueue {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn(
        synthesizer: Box<dyn SpeechSynthesizer>,
        profiles: ProfileTable,
        processor: TextProcessor,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tracing::debug!("Speech worker using {}", synthesizer.name());
        let worker = tokio::spawn(speech_worker(rx, synthesizer, profiles, processor));
        Self {
            handle: SpeechHandle { tx },
            worker,
        }
    }

    /// A sender for the queue
    pub fn handle(&self) -> SpeechHandle {
        self.handle.clone()
    }

    /// Queue an utterance; returns immediately
    pub fn enqueue(&self, text: impl Into<String>, profile: VoiceProfile) {
        self.handle.enqueue(text, profile);
    }

    /// Finish everything queued, then stop the worker
    ///
    /// The worker only exits once every handle clone has been dropped.
    pub async fn shutdown(self) {
        drop(self.handle);
        if let Err(e) = self.worker.await {
            tracing::error!("Speech worker panicked: {}", e);
        }
    }
}

async fn speech_worker(
    mut rx: mpsc::UnboundedReceiver<SpeechRequest>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    profiles: ProfileTable,
    processor: TextProcessor,
) {
    while let Some(request) = rx.recv().await {
        let text = processor.for_speech(&request.text);
        let voice = profiles.settings(request.profile);
        tracing::debug!("Speaking {:?} ({:?})", text, request.profile);

        if let Err(e) = synthesizer.speak(&text, &voice).await {
            tracing::warn!("Speech failed for {:?}: {}", text, e);
        }
    }
    tracing::debug!("Speech worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records what was spoken; the first utterance is slow so ordering
    /// problems would show up
    struct Recorder {
        spoken: Arc<Mutex<Vec<(String, VoiceSettings)>>>,
    }

    #[async_trait::async_trait]
    impl SpeechSynthesizer for Recorder {
        async fn speak(&self, text: &str, voice: &VoiceSettings) -> Result<(), SpeechError> {
            let first = self.spoken.lock().unwrap().is_empty();
            if first {
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), voice.clone()));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl SpeechSynthesizer for Failing {
        async fn speak(&self, _text: &str, _voice: &VoiceSettings) -> Result<(), SpeechError> {
            Err(SpeechError::EngineNotFound("nothing".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn table(voices: &[&str]) -> ProfileTable {
        let config = SpeechConfig {
            voices: voices.iter().map(|v| v.to_string()).collect(),
            ..SpeechConfig::default()
        };
        ProfileTable::from_config(&config)
    }

    #[test]
    fn test_profile_settings() {
        let profiles = table(&["es", "es-la"]);

        let default = profiles.settings(VoiceProfile::Default);
        assert_eq!(default.rate, 150);
        assert_eq!(default.voice.as_deref(), Some("es"));

        let happy = profiles.settings(VoiceProfile::Happy);
        assert_eq!(happy.rate, 180);
        assert_eq!(happy.voice.as_deref(), Some("es-la"));

        let character = profiles.settings(VoiceProfile::Character);
        assert_eq!(character.rate, 140);
        assert_eq!(character.voice.as_deref(), Some("es"));
    }

    #[test]
    fn test_missing_voice_slot_falls_back_to_first() {
        let profiles = table(&["es"]);
        assert_eq!(
            profiles.settings(VoiceProfile::Happy).voice.as_deref(),
            Some("es")
        );

        let profiles = table(&[]);
        assert_eq!(profiles.settings(VoiceProfile::Happy).voice, None);
    }

    #[tokio::test]
    async fn test_queue_speaks_in_order() {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let queue = SpeechQueue::spawn(
            Box::new(Recorder {
                spoken: spoken.clone(),
            }),
            table(&["es", "es-la"]),
            TextProcessor::default(),
        );

        queue.enqueue("3 x 5", VoiceProfile::Default);
        queue.enqueue("¡Correcto!", VoiceProfile::Happy);
        queue.handle().enqueue("Incorrecto. La respuesta es 15.", VoiceProfile::Character);
        queue.shutdown().await;

        let spoken = spoken.lock().unwrap();
        let texts: Vec<&str> = spoken.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(
            texts,
            vec!["3 por 5", "¡Correcto!", "Incorrecto. La respuesta es 15."]
        );
        assert_eq!(spoken[1].1.rate, 180);
        assert_eq!(spoken[2].1.rate, 140);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_queue() {
        let queue = SpeechQueue::spawn(
            Box::new(Failing),
            ProfileTable::default(),
            TextProcessor::default(),
        );
        queue.enqueue("uno", VoiceProfile::Default);
        queue.enqueue("dos", VoiceProfile::Default);
        // Returns only once both items were attempted
        queue.shutdown().await;
    }
}
