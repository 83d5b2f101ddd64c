//! Direct-shape engine driving a local `espeak-ng` process.
//!
//! The process plays through its own audio output; `interrupt` kills it.

use async_trait::async_trait;
use aui_core::{AuiError, AuiResult, Backend, InitArgs, Lifecycle, SpeechEngine, SpeechShape};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
struct Settings {
    bin: String,
    voice: String,
    /// Words per minute.
    rate: u32,
}

/// Direct-shape engine: `espeak-ng` renders straight to the sound card.
///
/// `speak` blocks until the process exits; `interrupt` kills it.
pub struct EspeakTts {
    settings: Mutex<Settings>,
    child: Mutex<Option<Child>>,
    interrupted: AtomicBool,
}

impl EspeakTts {
    pub fn new(bin: impl Into<String>, voice: impl Into<String>, rate: u32) -> Self {
        Self {
            settings: Mutex::new(Settings {
                bin: bin.into(),
                voice: voice.into(),
                rate,
            }),
            child: Mutex::new(None),
            interrupted: AtomicBool::new(false),
        }
    }

    /// Build from environment: AUI_ESPEAK_BIN, AUI_LANG, AUI_TTS_RATE.
    pub fn from_env() -> Self {
        let bin = std::env::var("AUI_ESPEAK_BIN").unwrap_or_else(|_| "espeak-ng".to_string());
        let voice = std::env::var("AUI_LANG").unwrap_or_else(|_| "de".to_string());
        let rate = std::env::var("AUI_TTS_RATE")
            .ok()
            .and_then(|r| r.trim().parse().ok())
            .unwrap_or(160);
        Self::new(bin, voice.trim().to_ascii_lowercase(), rate)
    }

    fn settings(&self) -> Settings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn command(settings: &Settings, text: &str) -> Command {
        let mut cmd = Command::new(&settings.bin);
        cmd.arg("-v")
            .arg(&settings.voice)
            .arg("-s")
            .arg(settings.rate.to_string())
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }

    fn child(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Lifecycle for EspeakTts {
    /// Fails when the binary cannot be run.
    async fn start(&self) -> AuiResult<()> {
        let settings = self.settings();
        let status = tokio::process::Command::new(&settings.bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| AuiError::Synthesis(format!("{}: {}", settings.bin, e)))?;
        if !status.success() {
            return Err(AuiError::Synthesis(format!(
                "{} --version exited with {}",
                settings.bin, status
            )));
        }
        info!(bin = %settings.bin, voice = %settings.voice, "EspeakTts: ready");
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        self.interrupt()
    }
}

#[async_trait]
impl Backend for EspeakTts {
    /// Overrides: `voice`, `rate` (words per minute), `bin`.
    async fn init(&self, args: &InitArgs) -> AuiResult<()> {
        let mut settings = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(voice) = args.get("voice") {
            settings.voice = voice.clone();
        }
        if let Some(rate) = args.get("rate") {
            settings.rate = rate
                .parse::<u32>()
                .map_err(|_| AuiError::Config(format!("rate: not a number: {}", rate)))?
                .clamp(80, 450);
        }
        if let Some(bin) = args.get("bin") {
            settings.bin = bin.clone();
        }
        Ok(())
    }
}

impl SpeechEngine for EspeakTts {
    fn shape(&self) -> SpeechShape {
        SpeechShape::Direct
    }

    fn speak(&self, text: &str) -> AuiResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let settings = self.settings();
        self.interrupted.store(false, Ordering::SeqCst);
        let child = Self::command(&settings, text)
            .spawn()
            .map_err(|e| AuiError::Synthesis(format!("{}: {}", settings.bin, e)))?;
        debug!(pid = child.id(), "EspeakTts: speaking");
        *self.child() = Some(child);

        loop {
            let mut slot = self.child();
            let Some(child) = slot.as_mut() else {
                return Ok(());
            };
            // An interrupt may land between spawn and the child being stored.
            if self.interrupted.load(Ordering::SeqCst) {
                let _ = child.kill();
            }
            match child.try_wait() {
                Ok(Some(status)) => {
                    let child = slot.take();
                    drop(slot);
                    if status.success() || self.interrupted.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    let stderr = child
                        .and_then(|mut c| c.stderr.take())
                        .and_then(|mut s| {
                            let mut out = String::new();
                            std::io::Read::read_to_string(&mut s, &mut out).ok()?;
                            Some(out)
                        })
                        .unwrap_or_default();
                    return Err(AuiError::Synthesis(format!(
                        "{} exited with {}: {}",
                        settings.bin,
                        status,
                        stderr.trim()
                    )));
                }
                Ok(None) => {}
                Err(e) => {
                    slot.take();
                    return Err(AuiError::Synthesis(e.to_string()));
                }
            }
            drop(slot);
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn interrupt(&self) -> AuiResult<()> {
        self.interrupted.store(true, Ordering::SeqCst);
        if let Some(child) = self.child().as_mut() {
            debug!(pid = child.id(), "EspeakTts: interrupted");
            // Already exited is fine.
            let _ = child.kill();
        }
        Ok(())
    }
}
