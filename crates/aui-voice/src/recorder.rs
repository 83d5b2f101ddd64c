//! Microphone recording using CPAL.
//!
//! A cpal `Stream` is not `Send`, so each recording opens, runs and drops its
//! stream on a blocking worker thread.

use async_trait::async_trait;
use aui_core::{AuiError, AuiResult, PcmAudio, Recorder};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// Sample rate recordings are delivered at.
pub const RECORD_RATE: u32 = 16_000;

/// Upper bound for a single recording.
pub const MAX_RECORDING: Duration = Duration::from_secs(120);

/// Records from the default input device.
#[derive(Debug, Default)]
pub struct CpalRecorder;

impl CpalRecorder {
    pub fn new() -> Self {
        Self
    }

    /// List available input devices
    pub fn list_input_devices() -> AuiResult<Vec<String>> {
        let devices = cpal::default_host()
            .input_devices()
            .map_err(|e| AuiError::Recording(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn capture(max: Duration) -> AuiResult<PcmAudio> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| AuiError::Recording("No input device available".to_string()))?;
        let config = device
            .default_input_config()
            .map_err(|e| AuiError::Recording(e.to_string()))?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let stream_config: StreamConfig = config.clone().into();
        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            channels,
            "recording"
        );

        let captured: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let stream = match config.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix(data, channels);
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&mono);
                },
                move |err| warn!("Audio stream error: {}", err),
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    let mono = downmix(&samples, channels);
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&mono);
                },
                move |err| warn!("Audio stream error: {}", err),
                None,
            ),
            other => {
                return Err(AuiError::Recording(format!(
                    "unsupported sample format {:?} (need F32 or I16)",
                    other
                )))
            }
        }
        .map_err(|e| AuiError::Recording(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AuiError::Recording(e.to_string()))?;
        std::thread::sleep(max);
        drop(stream);

        let samples = std::mem::take(&mut *captured.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(PcmAudio::from_f32(
            &resample(&samples, sample_rate, RECORD_RATE),
            RECORD_RATE,
        ))
    }
}

#[async_trait]
impl Recorder for CpalRecorder {
    async fn record(&self, max: Duration) -> AuiResult<PcmAudio> {
        let max = max.min(MAX_RECORDING);
        tokio::task::spawn_blocking(move || Self::capture(max))
            .await
            .map_err(|e| AuiError::Recording(format!("recording worker failed: {}", e)))?
    }
}

/// Average interleaved channels into mono.
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampling.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}
