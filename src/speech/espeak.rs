//! espeak-ng based speech output
//!
//! Runs the synthesizer as a child process per utterance and waits for it
//! to exit, so playback is finished when `speak` returns.
//!
//! Requires:
//! - espeak-ng (or a command accepting the same -s/-a/-v flags) in PATH

use super::{SpeechSynthesizer, VoiceSettings};
use crate::error::SpeechError;
use std::process::Stdio;
use tokio::process::Command;

/// espeak-ng command line synthesizer
pub struct EspeakSynthesizer {
    command: String,
}

impl EspeakSynthesizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Command line arguments for one utterance
    fn args(text: &str, voice: &VoiceSettings) -> Vec<String> {
        // espeak amplitude runs 0-200, 100 is normal
        let amplitude = (voice.volume * 100.0).round() as u32;

        let mut args = vec![
            "-s".to_string(),
            voice.rate.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
        ];
        if let Some(ref name) = voice.voice {
            args.push("-v".to_string());
            args.push(name.clone());
        }
        args.push("--".to_string());
        args.push(text.to_string());
        args
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for EspeakSynthesizer {
    async fn speak(&self, text: &str, voice: &VoiceSettings) -> Result<(), SpeechError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let output = Command::new(&self.command)
            .args(Self::args(text, voice))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SpeechError::EngineNotFound(self.command.clone())
                } else {
                    SpeechError::SynthesisFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeechError::SynthesisFailed(format!(
                "{} failed: {}",
                self.command,
                stderr.trim()
            )));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "espeak-ng"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_with_voice() {
        let voice = VoiceSettings {
            rate: 180,
            voice: Some("es-la".to_string()),
            volume: 1.0,
        };
        assert_eq!(
            EspeakSynthesizer::args("¡Correcto!", &voice),
            vec!["-s", "180", "-a", "100", "-v", "es-la", "--", "¡Correcto!"]
        );
    }

    #[test]
    fn test_args_without_voice() {
        let voice = VoiceSettings {
            rate: 150,
            voice: None,
            volume: 0.5,
        };
        assert_eq!(
            EspeakSynthesizer::args("-3", &voice),
            vec!["-s", "150", "-a", "50", "--", "-3"]
        );
    }

    #[tokio::test]
    async fn test_missing_engine_reported() {
        let synth = EspeakSynthesizer::new("tablas-no-such-synthesizer");
        let voice = VoiceSettings {
            rate: 150,
            voice: None,
            volume: 1.0,
        };
        let err = synth.speak("hola", &voice).await.unwrap_err();
        assert!(matches!(err, SpeechError::EngineNotFound(_)));
    }
}
