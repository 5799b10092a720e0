//! Energy-based utterance endpointing
//!
//! Tracks RMS energy over 20ms frames as audio streams in and decides when
//! a spoken answer is over: some speech followed by enough trailing
//! silence. Whisper is not a streaming recognizer, so this stands in for
//! the "utterance accepted" signal.

use crate::config::RecognizerConfig;

const FRAME_MS: u32 = 20;

/// Where the current utterance stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// No speech yet
    Waiting,
    /// Speech seen, utterance still open
    Speaking,
    /// Speech followed by enough silence
    Ended,
}

/// Streaming endpoint detector
#[derive(Debug, Clone)]
pub struct Endpointer {
    /// RMS energy at or above which a frame counts as speech
    threshold: f32,
    frame_size: usize,
    min_speech_frames: usize,
    trailing_silence_frames: usize,
    speech_frames: usize,
    silence_run: usize,
    /// Samples carried over until they fill a frame
    pending: Vec<f32>,
}

impl Endpointer {
    /// Create an endpointer for audio at `sample_rate`
    pub fn new(config: &RecognizerConfig, sample_rate: u32) -> Self {
        let frame_size = ((sample_rate * FRAME_MS) / 1000).max(1) as usize;
        Self {
            threshold: map_threshold_to_energy(config.speech_threshold),
            frame_size,
            min_speech_frames: frames_for(config.min_speech_ms),
            trailing_silence_frames: frames_for(config.trailing_silence_ms),
            speech_frames: 0,
            silence_run: 0,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// Feed samples and report the endpoint state
    pub fn push(&mut self, samples: &[f32]) -> Endpoint {
        self.pending.extend_from_slice(samples);

        let full = self.pending.len() / self.frame_size * self.frame_size;
        for frame in self.pending[..full].chunks(self.frame_size) {
            if calculate_rms(frame) >= self.threshold {
                self.speech_frames += 1;
                self.silence_run = 0;
            } else if self.speech_frames > 0 {
                self.silence_run += 1;
            }
        }
        self.pending.drain(..full);

        self.state()
    }

    pub fn state(&self) -> Endpoint {
        if !self.has_speech() {
            Endpoint::Waiting
        } else if self.silence_run >= self.trailing_silence_frames {
            Endpoint::Ended
        } else {
            Endpoint::Speaking
        }
    }

    /// Whether enough speech was seen to be worth transcribing
    pub fn has_speech(&self) -> bool {
        self.speech_frames > 0 && self.speech_frames >= self.min_speech_frames
    }

    /// Forget everything, ready for the next utterance
    pub fn reset(&mut self) {
        self.speech_frames = 0;
        self.silence_run = 0;
        self.pending.clear();
    }
}

fn frames_for(ms: u32) -> usize {
    (ms / FRAME_MS).max(1) as usize
}

/// Calculate RMS energy of a sample slice
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Map config threshold (0.0-1.0) to energy threshold
///
/// - 0.0 = very sensitive (energy threshold ~0.001, detects quiet whispers)
/// - 0.5 = balanced (energy threshold ~0.01, filters silence)
/// - 1.0 = aggressive (energy threshold ~0.1, requires louder speech)
fn map_threshold_to_energy(config_threshold: f32) -> f32 {
    let t = config_threshold.clamp(0.0, 1.0);
    0.001 * (100.0_f32).powf(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpointer() -> Endpointer {
        let config = RecognizerConfig {
            min_speech_ms: 100,
            trailing_silence_ms: 200,
            ..RecognizerConfig::default()
        };
        Endpointer::new(&config, 16000)
    }

    fn tone(ms: usize) -> Vec<f32> {
        (0..ms * 16)
            .map(|i| 0.3 * (i as f32 * 0.05).sin())
            .collect()
    }

    fn silence(ms: usize) -> Vec<f32> {
        vec![0.0; ms * 16]
    }

    #[test]
    fn test_threshold_mapping() {
        assert!((map_threshold_to_energy(0.0) - 0.001).abs() < 1e-6);
        assert!((map_threshold_to_energy(0.5) - 0.01).abs() < 1e-4);
        assert!((map_threshold_to_energy(1.0) - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_silence_keeps_waiting() {
        let mut ep = endpointer();
        assert_eq!(ep.push(&silence(2000)), Endpoint::Waiting);
        assert!(!ep.has_speech());
    }

    #[test]
    fn test_speech_then_silence_ends() {
        let mut ep = endpointer();
        assert_eq!(ep.push(&tone(300)), Endpoint::Speaking);
        assert_eq!(ep.push(&silence(100)), Endpoint::Speaking);
        assert_eq!(ep.push(&silence(200)), Endpoint::Ended);
        assert!(ep.has_speech());
    }

    #[test]
    fn test_short_blip_is_not_speech() {
        let mut ep = endpointer();
        ep.push(&tone(40));
        assert_eq!(ep.push(&silence(500)), Endpoint::Waiting);
    }

    #[test]
    fn test_partial_frames_carry_over() {
        let mut ep = endpointer();
        // 100ms of tone delivered in 7-sample pieces
        for piece in tone(100).chunks(7) {
            ep.push(piece);
        }
        assert!(ep.has_speech());

        ep.reset();
        assert_eq!(ep.state(), Endpoint::Waiting);
    }
}
