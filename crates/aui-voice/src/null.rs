//! Headless transport: no devices.
//!
//! Playback sleeps for the buffer's duration (cut short by `stop`), recordings
//! are silence, and digits come from a script injected at start. Used for CI,
//! smoke runs (`AUI_MODE=null`) and demos without a sound card.

use async_trait::async_trait;
use aui_core::{
    Adapter, AdapterIo, AuiError, AuiResult, Backend, CancelToken, DigitBuffer, DtmfSource,
    InitArgs, Lifecycle, PcmAudio, Player, Recorder, DTMF_ALPHABET,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Player that only keeps time.
pub struct NullPlayer {
    current: Mutex<Option<(CancelToken, Duration)>>,
    speed: Mutex<f64>,
}

impl NullPlayer {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            speed: Mutex::new(1.0),
        }
    }

    /// Play faster than real time (`speed` > 1).
    pub fn set_speed(&self, speed: f64) {
        *self.speed.lock().unwrap_or_else(PoisonError::into_inner) = speed.max(0.01);
    }

    fn take_current(&self) -> Option<(CancelToken, Duration)> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Default for NullPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Player for NullPlayer {
    async fn play_pcm(&self, audio: PcmAudio) -> AuiResult<()> {
        if let Some((previous, _)) = self.take_current() {
            previous.cancel();
        }
        let speed = *self.speed.lock().unwrap_or_else(PoisonError::into_inner);
        let length = audio.duration().div_f64(speed);
        debug!(ms = length.as_millis() as u64, "NullPlayer: play");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((CancelToken::new(), length));
        Ok(())
    }

    async fn wait_until_done(&self) -> AuiResult<()> {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some((token, length)) = current {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(length) => token.cancel(),
            }
        }
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        if let Some((token, _)) = self.take_current() {
            token.cancel();
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|(token, _)| !token.is_cancelled())
    }
}

/// Keypad replaying a fixed digit script into the bound session.
#[derive(Default)]
pub struct ScriptedKeypad {
    script: Mutex<String>,
    bound: Mutex<Option<Arc<DigitBuffer>>>,
}

impl ScriptedKeypad {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            bound: Mutex::new(None),
        }
    }

    pub fn set_script(&self, script: impl Into<String>) {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = script.into();
    }

    /// Key in `symbols` now (dropped when no session is bound).
    pub fn press(&self, symbols: &str) -> usize {
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|b| b.push_str(symbols))
            .unwrap_or(0)
    }
}

impl DtmfSource for ScriptedKeypad {
    /// Binding delivers the whole script at once.
    fn bind(&self, buffer: Arc<DigitBuffer>) {
        let script = std::mem::take(
            &mut *self.script.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if !script.is_empty() {
            let accepted = buffer.push_str(&script);
            debug!(accepted, "ScriptedKeypad: script delivered");
        }
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = Some(buffer);
    }

    fn unbind(&self) {
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Recorder returning silence of the requested length.
#[derive(Debug, Clone, Copy)]
pub struct SilentRecorder {
    pub rate: u32,
}

impl Default for SilentRecorder {
    fn default() -> Self {
        Self { rate: 8_000 }
    }
}

#[async_trait]
impl Recorder for SilentRecorder {
    async fn record(&self, max: Duration) -> AuiResult<PcmAudio> {
        Ok(PcmAudio::silence(self.rate, max))
    }
}

/// The headless adapter.
///
/// Init arguments: `digits` (script, default `AUI_NULL_DIGITS`), `speed` (playback
/// speed factor), `hangup_ms` (close the line after this long once started).
pub struct NullAdapter {
    player: Arc<NullPlayer>,
    keypad: Arc<ScriptedKeypad>,
    recorder: Arc<SilentRecorder>,
    hangup_after: Mutex<Option<Duration>>,
    hangup: CancelToken,
    running: AtomicBool,
}

impl NullAdapter {
    pub fn new() -> Self {
        Self {
            player: Arc::new(NullPlayer::new()),
            keypad: Arc::new(ScriptedKeypad::default()),
            recorder: Arc::new(SilentRecorder::default()),
            hangup_after: Mutex::new(None),
            hangup: CancelToken::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Build from environment: AUI_NULL_DIGITS.
    pub fn from_env() -> Self {
        let adapter = Self::new();
        if let Ok(digits) = std::env::var("AUI_NULL_DIGITS") {
            adapter.keypad.set_script(digits.trim());
        }
        adapter
    }

    pub fn keypad(&self) -> Arc<ScriptedKeypad> {
        Arc::clone(&self.keypad)
    }

    pub fn player(&self) -> Arc<NullPlayer> {
        Arc::clone(&self.player)
    }
}

impl Default for NullAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Lifecycle for NullAdapter {
    async fn start(&self) -> AuiResult<()> {
        self.running.store(true, Ordering::SeqCst);
        let hangup_after = *self
            .hangup_after
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(after) = hangup_after {
            let hangup = self.hangup.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                hangup.cancel();
            });
        }
        info!("NullAdapter: started (no devices)");
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        self.running.store(false, Ordering::SeqCst);
        self.player.stop().await?;
        self.keypad.unbind();
        info!("NullAdapter: stopped");
        Ok(())
    }
}

#[async_trait]
impl Backend for NullAdapter {
    async fn init(&self, args: &InitArgs) -> AuiResult<()> {
        if let Some(digits) = args.get("digits") {
            if let Some(bad) = digits
                .chars()
                .find(|c| !DTMF_ALPHABET.contains(c.to_ascii_uppercase()))
            {
                return Err(AuiError::Config(format!(
                    "digits: '{}' is not a DTMF symbol",
                    bad
                )));
            }
            self.keypad.set_script(digits.as_str());
        }
        if let Some(speed) = args.get("speed") {
            let speed: f64 = speed
                .parse()
                .map_err(|_| AuiError::Config(format!("speed: not a number: {}", speed)))?;
            self.player.set_speed(speed);
        }
        if let Some(ms) = args.get("hangup_ms") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| AuiError::Config(format!("hangup_ms: not a number: {}", ms)))?;
            *self
                .hangup_after
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(Duration::from_millis(ms));
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for NullAdapter {
    fn is_busy(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.player.is_busy()
    }

    fn io(&self) -> AdapterIo {
        AdapterIo {
            player: Some(self.player.clone() as Arc<dyn Player>),
            dtmf: Some(self.keypad.clone() as Arc<dyn DtmfSource>),
            recorder: Some(self.recorder.clone() as Arc<dyn Recorder>),
        }
    }

    async fn hangup(&self) {
        self.hangup.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn stop_cuts_playback_short() {
        let player = Arc::new(NullPlayer::new());
        assert_ok!(
            player
                .play_pcm(PcmAudio::silence(8_000, Duration::from_secs(10)))
                .await
        );
        assert!(player.is_busy());

        let waiter = {
            let player = Arc::clone(&player);
            tokio::spawn(async move { player.wait_until_done().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_ok!(player.stop().await);
        assert_ok!(tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap());
        assert!(!player.is_busy());
    }

    #[tokio::test]
    async fn speed_shortens_playback() {
        let player = NullPlayer::new();
        player.set_speed(100.0);
        let started = std::time::Instant::now();
        assert_ok!(
            player
                .play_pcm(PcmAudio::silence(8_000, Duration::from_secs(2)))
                .await
        );
        assert_ok!(player.wait_until_done().await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn script_is_delivered_on_bind() {
        let adapter = NullAdapter::new();
        let mut args = InitArgs::new();
        args.insert("digits".into(), "12#".into());
        assert_ok!(adapter.init(&args).await);

        let buffer = Arc::new(DigitBuffer::new());
        let io = adapter.io();
        assert!(io.missing().is_empty());
        io.dtmf.unwrap().bind(Arc::clone(&buffer));
        assert_eq!(buffer.pending(), "12#");
        assert_eq!(adapter.keypad().press("9"), 1);
        assert_eq!(buffer.pending(), "12#9");
    }

    #[tokio::test]
    async fn invalid_init_args_are_config_errors() {
        let adapter = NullAdapter::new();
        let mut args = InitArgs::new();
        args.insert("digits".into(), "12x".into());
        assert!(matches!(
            assert_err!(adapter.init(&args).await),
            AuiError::Config(_)
        ));

        let mut args = InitArgs::new();
        args.insert("speed".into(), "fast".into());
        assert_err!(adapter.init(&args).await);
    }

    #[tokio::test]
    async fn hangup_fires_after_configured_delay() {
        let adapter = NullAdapter::new();
        let mut args = InitArgs::new();
        args.insert("hangup_ms".into(), "20".into());
        assert_ok!(adapter.init(&args).await);
        assert_ok!(adapter.start().await);
        assert_ok!(tokio::time::timeout(Duration::from_secs(1), adapter.hangup()).await);
        assert_ok!(adapter.stop().await);
    }

    #[tokio::test]
    async fn recorder_returns_silence() {
        let audio = assert_ok!(SilentRecorder::default().record(Duration::from_millis(500)).await);
        assert_eq!(audio.duration(), Duration::from_millis(500));
        assert!(audio.data.iter().all(|b| *b == 0));
    }
}
