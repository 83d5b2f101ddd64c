//! OpenAI-compatible `/audio/speech` engine returning raw 24 kHz PCM.

use async_trait::async_trait;
use aui_core::{
    AuiError, AuiResult, Backend, CancelToken, InitArgs, Lifecycle, PcmAudio, SpeechEngine,
};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Sample rate of `response_format: "pcm"` (mono s16le).
pub const OPENAI_PCM_RATE: u32 = 24_000;

#[derive(Debug, Clone)]
struct Voice {
    model: String,
    voice: String,
    speed: Option<f32>,
}

/// Production TTS backend: OpenAI-compatible API (OpenAI, OpenRouter, local servers).
/// Uses `TTS_API_URL` (e.g. https://api.openai.com/v1) and `TTS_API_KEY`.
pub struct OpenAiTts {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    base_url: String,
    /// Bearer API key.
    api_key: String,
    voice: Mutex<Voice>,
    timeout: Duration,
}

impl OpenAiTts {
    /// Build from environment: TTS_API_URL, TTS_API_KEY (or OPENAI_API_KEY), TTS_MODEL, TTS_VOICE.
    pub fn from_env() -> AuiResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                AuiError::Config("TTS requires TTS_API_KEY or OPENAI_API_KEY".to_string())
            })?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());
        Self::new(base_url, api_key, model, voice)
    }

    /// Create with explicit config (e.g. for tests or non-env wiring).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> AuiResult<Self> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            voice: Mutex::new(Voice {
                model: model.into(),
                voice: voice.into(),
                speed: None,
            }),
            timeout: Duration::from_secs(60),
        })
    }

    fn voice(&self) -> Voice {
        self.voice
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn request_body(text: &str, voice: &Voice) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": voice.model,
            "input": text,
            "voice": voice.voice,
            "response_format": "pcm",
        });
        if let Some(speed) = voice.speed {
            body["speed"] = serde_json::json!(speed);
        }
        body
    }

    /// Blocking request. The blocking client owns an internal runtime, so it is
    /// built and dropped on the worker thread, never on the async scheduler.
    fn fetch(
        url: String,
        api_key: String,
        body: serde_json::Value,
        timeout: Duration,
    ) -> AuiResult<Vec<u8>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuiError::Synthesis(e.to_string()))?;
        let res = client
            .post(&url)
            .bearer_auth(&api_key)
            .json(&body)
            .send()
            .map_err(|e| AuiError::Synthesis(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(AuiError::Synthesis(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().map_err(|e| AuiError::Synthesis(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Lifecycle for OpenAiTts {
    async fn start(&self) -> AuiResult<()> {
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Backend for OpenAiTts {
    /// Overrides: `model`, `voice`, `speed` (0.25 - 4.0).
    async fn init(&self, args: &InitArgs) -> AuiResult<()> {
        let mut voice = self.voice.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = args.get("model") {
            voice.model = model.clone();
        }
        if let Some(name) = args.get("voice") {
            voice.voice = name.clone();
        }
        if let Some(speed) = args.get("speed") {
            let speed: f32 = speed
                .parse()
                .map_err(|_| AuiError::Config(format!("speed: not a number: {}", speed)))?;
            voice.speed = Some(speed.clamp(0.25, 4.0));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechEngine for OpenAiTts {
    async fn synth(&self, text: &str, cancel: &CancelToken) -> AuiResult<PcmAudio> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(PcmAudio::new(Vec::new(), OPENAI_PCM_RATE));
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = Self::request_body(text, &self.voice());
        let api_key = self.api_key.clone();
        let timeout = self.timeout;
        debug!(chars = text.len(), "OpenAiTts: requesting speech");

        let request = tokio::task::spawn_blocking(move || Self::fetch(url, api_key, body, timeout));
        tokio::select! {
            _ = cancel.cancelled() => Ok(PcmAudio::new(Vec::new(), OPENAI_PCM_RATE)),
            joined = request => {
                let bytes = joined
                    .map_err(|e| AuiError::Synthesis(format!("TTS worker failed: {}", e)))??;
                Ok(PcmAudio::new(bytes, OPENAI_PCM_RATE))
            }
        }
    }
}
