//! Voice answer capture
//!
//! Opens the microphone, streams fixed-size chunks into a recognizer and
//! stops at the first finalized utterance or when the timeout runs out,
//! whichever comes first. On timeout the recognizer is asked for whatever
//! it heard so far. The transcript is normalized before it is returned.
//!
//! Capture never fails loudly: a missing model, a missing device or a
//! stream error all come back as an empty answer, which the quiz reports as
//! "not understood".

use crate::audio::{self, AudioCapture};
use crate::config::AudioConfig;
use crate::error::{AudioError, RecognizeError, TablasError};
use crate::recognize::{Recognizer, RecognizerModel};
use crate::text::normalize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Something that can listen for a spoken answer
#[async_trait::async_trait]
pub trait AnswerListener: Send + Sync {
    /// Listen for up to `timeout`; returns normalized answer text, empty
    /// when nothing usable was heard
    async fn capture_answer(&self, timeout: Duration) -> String;

    /// Whether voice answers can work at all
    fn is_available(&self) -> bool;
}

/// Builds the audio capture for each attempt
pub type CaptureFactory =
    Arc<dyn Fn(&AudioConfig) -> Result<Box<dyn AudioCapture>, AudioError> + Send + Sync>;

/// Microphone + recognizer implementation of [`AnswerListener`]
pub struct VoiceCapture {
    audio: AudioConfig,
    model: Option<Arc<dyn RecognizerModel>>,
    factory: CaptureFactory,
}

impl VoiceCapture {
    /// Capture from the configured cpal device
    pub fn new(audio: AudioConfig, model: Option<Arc<dyn RecognizerModel>>) -> Self {
        Self::with_factory(audio, model, Arc::new(audio::create_capture))
    }

    pub fn with_factory(
        audio: AudioConfig,
        model: Option<Arc<dyn RecognizerModel>>,
        factory: CaptureFactory,
    ) -> Self {
        Self {
            audio,
            model,
            factory,
        }
    }

    /// Listener for when no model could be loaded
    pub fn unavailable(audio: AudioConfig) -> Self {
        Self::new(audio, None)
    }

    async fn try_capture(&self, timeout: Duration) -> Result<String, TablasError> {
        let Some(model) = self.model.clone() else {
            tracing::debug!("No recognizer model, voice capture skipped");
            return Ok(String::new());
        };

        let recognizer = model.recognizer(self.audio.sample_rate)?;
        let mut capture = (self.factory)(&self.audio)?;
        let mut rx = capture.start().await?;
        tracing::debug!("Listening for up to {:?}", timeout);

        let deadline = Instant::now() + timeout;
        let heard = listen(&mut rx, recognizer, self.audio.chunk_samples, deadline).await;

        // Release the device whatever the recognizer did
        drop(rx);
        if let Err(e) = capture.stop().await {
            tracing::warn!("Failed to stop audio capture: {}", e);
        }

        Ok(heard?)
    }
}

#[async_trait::async_trait]
impl AnswerListener for VoiceCapture {
    async fn capture_answer(&self, timeout: Duration) -> String {
        match self.try_capture(timeout).await {
            Ok(transcript) => {
                tracing::debug!("Transcript: {:?}", transcript);
                answer_text(&transcript)
            }
            Err(e) => {
                tracing::warn!("Voice capture failed: {}", e);
                String::new()
            }
        }
    }

    fn is_available(&self) -> bool {
        self.model.is_some()
    }
}

/// Normalized answer text for a transcript, empty stays empty
fn answer_text(transcript: &str) -> String {
    if transcript.trim().is_empty() {
        return String::new();
    }
    normalize(transcript).into_answer_text()
}

/// Stream audio into `recognizer` until an utterance is accepted, the
/// stream ends or `deadline` passes
async fn listen(
    rx: &mut mpsc::Receiver<Vec<f32>>,
    mut recognizer: Box<dyn Recognizer>,
    chunk_samples: usize,
    deadline: Instant,
) -> Result<String, RecognizeError> {
    let mut chunks = ChunkBuffer::new(chunk_samples);

    loop {
        let samples = match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(samples)) => samples,
            Ok(None) => {
                tracing::debug!("Audio stream ended");
                break;
            }
            Err(_) => {
                tracing::debug!("Listening timed out");
                break;
            }
        };

        for chunk in chunks.push(&samples) {
            let (returned, accepted) = run_blocking(recognizer, move |r| {
                r.accept_waveform(&chunk)
            })
            .await?;
            recognizer = returned;

            if accepted {
                let (_, text) = run_blocking(recognizer, |r| r.result()).await?;
                return Ok(text);
            }
        }
    }

    let rest = chunks.take_remainder();
    let (_, text) = run_blocking(recognizer, move |r| finish(r, &rest)).await?;
    Ok(text)
}

/// Feed the final partial chunk, then flush
fn finish(recognizer: &mut dyn Recognizer, rest: &[f32]) -> Result<String, RecognizeError> {
    if !rest.is_empty() && recognizer.accept_waveform(rest)? {
        return recognizer.result();
    }
    recognizer.final_result()
}

/// Run a recognizer step off the async runtime, handing the recognizer back
async fn run_blocking<T, F>(
    mut recognizer: Box<dyn Recognizer>,
    step: F,
) -> Result<(Box<dyn Recognizer>, T), RecognizeError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn Recognizer) -> Result<T, RecognizeError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let value = step(recognizer.as_mut())?;
        Ok((recognizer, value))
    })
    .await
    .map_err(|e| RecognizeError::InferenceFailed(format!("Recognizer task failed: {}", e)))?
}

/// Re-chunks arbitrary sized audio buffers into fixed-size pieces
#[derive(Debug)]
pub struct ChunkBuffer {
    size: usize,
    pending: Vec<f32>,
}

impl ChunkBuffer {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            pending: Vec::with_capacity(size),
        }
    }

    /// Add samples, returning every complete chunk now available
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(samples);

        let mut ready = Vec::new();
        while self.pending.len() >= self.size {
            let rest = self.pending.split_off(self.size);
            ready.push(std::mem::replace(&mut self.pending, rest));
        }
        ready
    }

    /// Samples that never filled a chunk
    pub fn take_remainder(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.pending)
    }
}

/// Load a WAV file as mono f32 samples at `target_rate`
pub fn read_wav(path: &Path, target_rate: u32) -> Result<Vec<f32>, AudioError> {
    use hound::WavReader;

    let reader = WavReader::open(path)
        .map_err(|e| AudioError::Connection(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();

    tracing::debug!(
        "Audio format: {} Hz, {} channel(s), {:?}",
        spec.sample_rate,
        spec.channels,
        spec.sample_format
    );

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .collect(),
    };

    if samples.is_empty() {
        return Err(AudioError::EmptyRecording);
    }

    let mono: Vec<f32> = if spec.channels > 1 {
        samples
            .chunks(spec.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    Ok(audio::resample(&mono, spec.sample_rate, target_rate))
}

/// Run a recorded answer through the recognizer the way a live capture
/// would, returning the raw transcript
pub fn recognize_samples(
    model: &dyn RecognizerModel,
    samples: &[f32],
    sample_rate: u32,
    chunk_samples: usize,
) -> Result<String, RecognizeError> {
    let mut recognizer = model.recognizer(sample_rate)?;
    let mut chunks = ChunkBuffer::new(chunk_samples);

    for chunk in chunks.push(samples) {
        if recognizer.accept_waveform(&chunk)? {
            return recognizer.result();
        }
    }
    finish(recognizer.as_mut(), &chunks.take_remainder())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Accepts once it has seen `accept_after` samples, reporting `text`
    struct ScriptedRecognizer {
        seen: usize,
        accept_after: Option<usize>,
        text: String,
    }

    impl Recognizer for ScriptedRecognizer {
        fn accept_waveform(&mut self, samples: &[f32]) -> Result<bool, RecognizeError> {
            self.seen += samples.len();
            Ok(self.accept_after.is_some_and(|n| self.seen >= n))
        }

        fn result(&mut self) -> Result<String, RecognizeError> {
            Ok(self.text.clone())
        }

        fn final_result(&mut self) -> Result<String, RecognizeError> {
            Ok(format!("final {}", self.seen))
        }
    }

    struct ScriptedModel {
        accept_after: Option<usize>,
        text: &'static str,
    }

    impl RecognizerModel for ScriptedModel {
        fn recognizer(&self, _sample_rate: u32) -> Result<Box<dyn Recognizer>, RecognizeError> {
            Ok(Box::new(ScriptedRecognizer {
                seen: 0,
                accept_after: self.accept_after,
                text: self.text.to_string(),
            }))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Sends a fixed number of buffers, then keeps the stream open
    struct FakeCapture {
        buffers: usize,
        fail_start: bool,
        stopped: Arc<AtomicBool>,
        tx: Option<mpsc::Sender<Vec<f32>>>,
    }

    #[async_trait::async_trait]
    impl AudioCapture for FakeCapture {
        async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, AudioError> {
            if self.fail_start {
                return Err(AudioError::StreamError("boom".to_string()));
            }
            let (tx, rx) = mpsc::channel(64);
            for _ in 0..self.buffers {
                tx.send(vec![0.0; 1000]).await.unwrap();
            }
            self.tx = Some(tx);
            Ok(rx)
        }

        async fn stop(&mut self) -> Result<(), AudioError> {
            self.tx = None;
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn listener(
        model: ScriptedModel,
        buffers: usize,
        fail_start: bool,
    ) -> (VoiceCapture, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let stopped = Arc::new(AtomicBool::new(false));
        let starts = Arc::new(AtomicUsize::new(0));
        let (stopped_in, starts_in) = (stopped.clone(), starts.clone());
        let factory: CaptureFactory = Arc::new(move |_config: &AudioConfig| {
            starts_in.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeCapture {
                buffers,
                fail_start,
                stopped: stopped_in.clone(),
                tx: None,
            }) as Box<dyn AudioCapture>)
        });
        let capture = VoiceCapture::with_factory(AudioConfig::default(), Some(Arc::new(model)), factory);
        (capture, stopped, starts)
    }

    #[test]
    fn test_chunk_buffer() {
        let mut buffer = ChunkBuffer::new(4);
        assert!(buffer.push(&[1.0, 2.0, 3.0]).is_empty());

        let ready = buffer.push(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(ready, vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]);
        assert_eq!(buffer.take_remainder(), vec![9.0]);
        assert!(buffer.take_remainder().is_empty());
    }

    #[test]
    fn test_answer_text_is_normalized() {
        assert_eq!(answer_text("veinte y tres"), "23");
        assert_eq!(answer_text("cuarenta"), "40");
        assert_eq!(answer_text("no sé"), "no sé");
        assert_eq!(answer_text("   "), "");
    }

    #[tokio::test]
    async fn test_stops_at_accepted_utterance() {
        let model = ScriptedModel {
            accept_after: Some(8000),
            text: "veintiuno",
        };
        let (capture, stopped, _) = listener(model, 10, false);

        let answer = capture.capture_answer(Duration::from_secs(5)).await;
        assert_eq!(answer, "21");
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_timeout_requests_final_result() {
        let model = ScriptedModel {
            accept_after: None,
            text: "",
        };
        // 3 x 1000 samples: no full 4000-sample chunk, all left in the remainder
        let (capture, stopped, _) = listener(model, 3, false);

        let answer = capture.capture_answer(Duration::from_millis(50)).await;
        assert_eq!(answer, "3000");
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_start_failure_degrades_to_empty() {
        let model = ScriptedModel {
            accept_after: Some(1),
            text: "siete",
        };
        let (capture, _, starts) = listener(model, 0, true);

        assert_eq!(capture.capture_answer(Duration::from_secs(1)).await, "");
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_model_never_opens_device() {
        let starts = Arc::new(AtomicUsize::new(0));
        let starts_in = starts.clone();
        let factory: CaptureFactory = Arc::new(move |_config: &AudioConfig| {
            starts_in.fetch_add(1, Ordering::SeqCst);
            Err(AudioError::DeviceNotFound("none".to_string()))
        });
        let capture = VoiceCapture::with_factory(AudioConfig::default(), None, factory);

        assert!(!capture.is_available());
        assert_eq!(capture.capture_answer(Duration::from_secs(1)).await, "");
        assert_eq!(starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_recognize_samples_flushes_remainder() {
        let model = ScriptedModel {
            accept_after: None,
            text: "",
        };
        let text = recognize_samples(&model, &vec![0.0; 9000], 16000, 4000).unwrap();
        assert_eq!(text, "final 9000");
    }

    #[test]
    fn test_read_wav_mixes_and_resamples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answer.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 32000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..3200 {
            writer.write_sample(i16::MAX / 2).unwrap();
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();

        let samples = read_wav(&path, 16000).unwrap();
        assert_eq!(samples.len(), 1600);
        assert!((samples[0] - 0.25).abs() < 0.01);
    }
}
