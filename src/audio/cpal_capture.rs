//! cpal-based audio capture
//!
//! Uses the cpal crate for cross-platform audio input.
//! Works with PipeWire, PulseAudio, and ALSA backends.
//!
//! Note: cpal::Stream is not Send, so the stream lives in a dedicated
//! thread and we talk to it via channels. The thread reports whether the
//! stream opened before `start` returns, and dropping the capture stops
//! the thread so the device is released on every exit path.

use super::{resample, AudioCapture};
use crate::config::AudioConfig;
use crate::error::AudioError;
use std::thread;
use tokio::sync::{mpsc, oneshot};

/// Commands sent to the audio capture thread
enum CaptureCommand {
    Stop(oneshot::Sender<()>),
}

/// Parameters for building an audio input stream
struct StreamBuildParams {
    tx: mpsc::Sender<Vec<f32>>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
}

/// cpal-based audio capture implementation
pub struct CpalCapture {
    /// Audio configuration
    config: AudioConfig,
    /// Command sender to the capture thread
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    /// Handle to the capture thread
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    /// Create a new cpal audio capture instance
    pub fn new(config: &AudioConfig) -> Result<Self, AudioError> {
        Ok(Self {
            config: config.clone(),
            cmd_tx: None,
            thread_handle: None,
        })
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            // Thread exits when the channel closes, dropping the stream
            drop(cmd_tx);
            tracing::debug!("Audio capture dropped while running, releasing device");
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Find an audio input device by name with flexible matching.
///
/// Matching strategy (in order):
/// 1. Exact match (case-sensitive)
/// 2. Exact match (case-insensitive)
/// 3. Substring match: device name contains the search term (case-insensitive)
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?
        .collect();

    let names: Vec<Option<String>> = devices.iter().map(|d| d.name().ok()).collect();
    let search_lower = device_name.to_lowercase();

    let position = names
        .iter()
        .position(|n| n.as_deref() == Some(device_name))
        .or_else(|| {
            names
                .iter()
                .position(|n| n.as_ref().is_some_and(|n| n.to_lowercase() == search_lower))
        })
        .or_else(|| {
            names.iter().position(|n| {
                n.as_ref()
                    .is_some_and(|n| n.to_lowercase().contains(&search_lower))
            })
        });

    if let Some(index) = position {
        tracing::debug!(
            "Found audio device {:?} (searched for: {})",
            names[index],
            device_name
        );
        return devices
            .into_iter()
            .nth(index)
            .ok_or_else(|| AudioError::DeviceNotFound(device_name.to_string()));
    }

    // No match found - provide helpful error with available devices
    let device_names: Vec<String> = names.into_iter().flatten().collect();
    let available = if device_names.is_empty() {
        "No audio input devices found.".to_string()
    } else {
        format!(
            "Available devices:\n{}",
            device_names
                .iter()
                .map(|n| format!("  - {}", n))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    Err(AudioError::DeviceNotFoundWithList {
        requested: device_name.to_string(),
        available,
    })
}

#[async_trait::async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, AudioError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        // Resolve the device up front so the host is not held across the await below
        let (device, supported_config) = {
            let host = cpal::default_host();

            let device = if self.config.device == "default" {
                host.default_input_device()
                    .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))?
            } else {
                find_audio_device(&host, &self.config.device)?
            };

            let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
            tracing::debug!("Using audio device: {}", device_name);

            let supported_config = device
                .default_input_config()
                .map_err(|e| AudioError::Connection(e.to_string()))?;

            (device, supported_config)
        };

        let source_sample_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let target_sample_rate = self.config.sample_rate;
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_sample_rate,
            source_channels,
            sample_format
        );

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), AudioError>>();

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_fn = |err| tracing::error!("Audio stream error: {}", err);

            let params = StreamBuildParams {
                tx: chunk_tx,
                source_rate: source_sample_rate,
                target_rate: target_sample_rate,
                source_channels,
            };

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => {
                    build_stream::<f32>(&device, &stream_config, params, err_fn)
                }
                cpal::SampleFormat::I16 => {
                    build_stream::<i16>(&device, &stream_config, params, err_fn)
                }
                cpal::SampleFormat::U16 => {
                    build_stream::<u16>(&device, &stream_config, params, err_fn)
                }
                format => Err(AudioError::StreamError(format!(
                    "Unsupported sample format: {:?}",
                    format
                ))),
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));
            tracing::debug!("Audio capture thread started");

            // Runs until a stop command arrives or the sender is dropped
            let response = match cmd_rx.recv() {
                Ok(CaptureCommand::Stop(response_tx)) => Some(response_tx),
                Err(_) => None,
            };

            drop(stream);
            if let Some(response_tx) = response {
                let _ = response_tx.send(());
            }

            tracing::debug!("Audio capture thread stopped");
        });

        self.cmd_tx = Some(cmd_tx);
        self.thread_handle = Some(thread_handle);

        match ready_rx.await {
            Ok(Ok(())) => Ok(chunk_rx),
            Ok(Err(e)) => {
                self.cmd_tx = None;
                Err(e)
            }
            Err(_) => {
                self.cmd_tx = None;
                Err(AudioError::StreamError(
                    "Capture thread exited before the stream opened".to_string(),
                ))
            }
        }
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        let result = if let Some(cmd_tx) = self.cmd_tx.take() {
            let (response_tx, response_rx) = oneshot::channel();

            if cmd_tx.send(CaptureCommand::Stop(response_tx)).is_ok() {
                match tokio::time::timeout(std::time::Duration::from_secs(2), response_rx).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(AudioError::StreamError("Channel closed".to_string())),
                    Err(_) => Err(AudioError::Timeout(2)),
                }
            } else {
                Ok(())
            }
        } else {
            Ok(())
        };

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        tracing::debug!("Audio capture stopped");
        result
    }
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    params: StreamBuildParams,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let StreamBuildParams {
        tx,
        source_rate,
        target_rate,
        source_channels,
    } = params;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Convert to f32 and mix to mono
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                // Receiver may be gone once the answer was accepted
                let _ = tx.try_send(resampled);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok(stream)
}
