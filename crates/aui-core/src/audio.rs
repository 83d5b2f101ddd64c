//! PCM audio buffers exchanged between speech engines and players.
//!
//! The canonical wire format is mono, 16-bit signed little-endian. Producers that
//! emit anything else convert with [`PcmAudio::to_canonical`] before handing the
//! buffer to a player.

use crate::error::{AuiError, AuiResult};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

/// Raw PCM audio with its format description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmAudio {
    /// Interleaved little-endian sample bytes.
    pub data: Vec<u8>,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Channel count (default 1).
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Bytes per sample (default 2).
    #[serde(default = "default_width")]
    pub width: u16,
}

fn default_channels() -> u16 {
    1
}

fn default_width() -> u16 {
    2
}

impl PcmAudio {
    /// Canonical mono s16le buffer.
    pub fn new(data: Vec<u8>, rate: u32) -> Self {
        Self {
            data,
            rate,
            channels: 1,
            width: 2,
        }
    }

    /// Silence of the given length in canonical format.
    pub fn silence(rate: u32, duration: Duration) -> Self {
        let frames = (rate as f64 * duration.as_secs_f64()).round() as usize;
        Self::new(vec![0u8; frames * 2], rate)
    }

    /// Encode normalized f32 samples (-1.0..1.0, mono) to canonical s16le.
    pub fn from_f32(samples: &[f32], rate: u32) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            let i = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
            data.extend_from_slice(&i.to_le_bytes());
        }
        Self::new(data, rate)
    }

    /// Build from already decoded i16 samples (mono).
    pub fn from_i16(samples: &[i16], rate: u32) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            data.extend_from_slice(&s.to_le_bytes());
        }
        Self::new(data, rate)
    }

    /// True for mono 16-bit audio.
    pub fn is_canonical(&self) -> bool {
        self.channels == 1 && self.width == 2
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        let frame_bytes = self.channels as usize * self.width as usize;
        if frame_bytes == 0 {
            return 0;
        }
        self.data.len() / frame_bytes
    }

    /// Playback length at the declared rate.
    pub fn duration(&self) -> Duration {
        if self.rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.rate as f64)
    }

    /// Decode canonical data into i16 samples. Fails for non-canonical buffers.
    pub fn samples_i16(&self) -> AuiResult<Vec<i16>> {
        if !self.is_canonical() {
            return Err(AuiError::Playback(format!(
                "expected mono s16le, got {} channel(s) x {} byte(s)",
                self.channels, self.width
            )));
        }
        Ok(self
            .data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect())
    }

    /// Convert to mono s16le: widths 1 (unsigned 8-bit), 2 and 4 (signed) are
    /// accepted; channels are averaged.
    pub fn to_canonical(&self) -> AuiResult<PcmAudio> {
        if self.is_canonical() {
            return Ok(self.clone());
        }
        if self.channels == 0 {
            return Err(AuiError::Playback("audio declares zero channels".into()));
        }
        let width = self.width as usize;
        let decode = |b: &[u8]| -> AuiResult<i32> {
            match width {
                1 => Ok((b[0] as i32 - 128) << 8),
                2 => Ok(i16::from_le_bytes([b[0], b[1]]) as i32),
                4 => Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]) >> 16),
                w => Err(AuiError::Playback(format!("unsupported sample width: {} bytes", w))),
            }
        };

        let channels = self.channels as usize;
        let mut out = Vec::with_capacity(self.frames());
        for frame in self.data.chunks_exact(channels * width) {
            let mut sum = 0i64;
            for sample in frame.chunks_exact(width) {
                sum += decode(sample)? as i64;
            }
            let mixed = (sum / channels as i64).clamp(i16::MIN as i64, i16::MAX as i64) as i16;
            out.push(mixed);
        }
        Ok(PcmAudio::from_i16(&out, self.rate))
    }

    /// Encode as a 16-bit PCM WAV file in memory.
    pub fn to_wav_bytes(&self) -> AuiResult<Vec<u8>> {
        let canonical = self.to_canonical()?;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: canonical.rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
            for s in canonical.samples_i16()? {
                writer.write_sample(s)?;
            }
            writer.finalize()?;
        }
        Ok(bytes)
    }

    /// Decode a WAV file from memory into canonical PCM.
    pub fn from_wav_bytes(bytes: &[u8]) -> AuiResult<PcmAudio> {
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        Self::from_wav_reader(reader)
    }

    /// Load a WAV file from disk into canonical PCM.
    pub fn from_wav_file(path: impl AsRef<Path>) -> AuiResult<PcmAudio> {
        let reader = hound::WavReader::open(path)?;
        Self::from_wav_reader(reader)
    }

    fn from_wav_reader<R: std::io::Read>(mut reader: hound::WavReader<R>) -> AuiResult<PcmAudio> {
        let spec = reader.spec();
        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => reader.samples::<i16>().collect::<Result<_, _>>()?,
            (hound::SampleFormat::Int, bits) if bits <= 32 => reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        if bits >= 16 {
                            (v >> (bits - 16)) as i16
                        } else {
                            (v << (16 - bits)) as i16
                        }
                    })
                })
                .collect::<Result<_, _>>()?,
            (hound::SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * 32767.0).round() as i16))
                .collect::<Result<_, _>>()?,
            (format, bits) => {
                return Err(AuiError::Playback(format!(
                    "unsupported WAV encoding: {:?} {} bit",
                    format, bits
                )))
            }
        };

        let interleaved = PcmAudio {
            data: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
            rate: spec.sample_rate,
            channels: spec.channels,
            width: 2,
        };
        interleaved.to_canonical()
    }
}
