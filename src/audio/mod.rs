//! Audio capture module
//!
//! Provides microphone input using cpal, which works with PipeWire,
//! PulseAudio, and ALSA backends, plus device enumeration used to decide
//! whether voice answers are offered at all.

pub mod cpal_capture;

use crate::config::AudioConfig;
use crate::error::AudioError;
use tokio::sync::mpsc;

/// Trait for audio capture implementations
#[async_trait::async_trait]
pub trait AudioCapture: Send {
    /// Open the device and start streaming
    /// Returns a channel receiver for audio chunks (f32 samples, mono, at the configured rate)
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, AudioError>;

    /// Stop streaming and release the device
    async fn stop(&mut self) -> Result<(), AudioError>;
}

/// Factory function to create audio capture
pub fn create_capture(config: &AudioConfig) -> Result<Box<dyn AudioCapture>, AudioError> {
    Ok(Box::new(cpal_capture::CpalCapture::new(config)?))
}

/// Names of all audio input devices on the default host
pub fn list_microphones() -> Result<Vec<String>, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?;

    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "unknown".to_string()))
        .collect())
}

/// Whether at least one audio input device exists
pub fn has_microphone() -> bool {
    match list_microphones() {
        Ok(devices) => !devices.is_empty(),
        Err(e) => {
            tracing::debug!("Could not enumerate input devices: {}", e);
            false
        }
    }
}

/// Linear interpolation resampling
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let result = resample(&samples, 48000, 16000);
        // 3:1 ratio, 8 samples -> 3
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], 1.0);
    }

    #[test]
    fn test_resample_empty() {
        let samples: Vec<f32> = vec![];
        assert!(resample(&samples, 44100, 16000).is_empty());
    }
}
