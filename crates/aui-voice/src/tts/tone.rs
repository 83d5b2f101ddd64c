//! Offline synth-shape engine: one tone burst per word, no network or models.

use async_trait::async_trait;
use aui_core::{
    AuiError, AuiResult, Backend, CancelToken, InitArgs, Lifecycle, PcmAudio, SpeechEngine,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const RATE: u32 = 16_000;
const GAP: Duration = Duration::from_millis(60);
/// Longest prompt rendered; longer text is truncated.
const MAX_WORDS: usize = 64;

/// Renders each word as a short sine burst whose pitch follows the word.
///
/// Useful wherever real speech is unavailable: the prompt rhythm stays audible,
/// so barge-in and menu timing can be tried on any machine.
pub struct ToneTts {
    word_ms: AtomicU32,
}

impl ToneTts {
    pub fn new() -> Self {
        Self {
            word_ms: AtomicU32::new(120),
        }
    }

    fn word_length(&self) -> Duration {
        Duration::from_millis(self.word_ms.load(Ordering::Relaxed) as u64)
    }

    fn pitch(word: &str) -> f32 {
        let sum: u32 = word.chars().map(|c| c as u32).sum();
        330.0 + (sum % 12) as f32 * 40.0
    }

    fn render(&self, text: &str, cancel: &CancelToken) -> Vec<f32> {
        let word_frames = (RATE as f64 * self.word_length().as_secs_f64()) as usize;
        let gap_frames = (RATE as f64 * GAP.as_secs_f64()) as usize;
        let fade = (word_frames / 10).max(1);

        let mut samples = Vec::new();
        for word in text.split_whitespace().take(MAX_WORDS) {
            if cancel.is_cancelled() {
                break;
            }
            let freq = Self::pitch(word);
            for i in 0..word_frames {
                let envelope = (i.min(word_frames - 1 - i) as f32 / fade as f32).min(1.0);
                let phase = i as f32 * freq * std::f32::consts::TAU / RATE as f32;
                samples.push(phase.sin() * 0.25 * envelope);
            }
            samples.extend(std::iter::repeat(0.0).take(gap_frames));
        }
        samples
    }
}

impl Default for ToneTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Lifecycle for ToneTts {
    async fn start(&self) -> AuiResult<()> {
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Backend for ToneTts {
    async fn init(&self, args: &InitArgs) -> AuiResult<()> {
        if let Some(ms) = args.get("word_ms") {
            let ms: u32 = ms
                .parse()
                .map_err(|_| AuiError::Config(format!("word_ms: not a number: {}", ms)))?;
            self.word_ms.store(ms.clamp(10, 2_000), Ordering::Relaxed);
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechEngine for ToneTts {
    async fn synth(&self, text: &str, cancel: &CancelToken) -> AuiResult<PcmAudio> {
        Ok(PcmAudio::from_f32(&self.render(text, cancel), RATE))
    }
}
