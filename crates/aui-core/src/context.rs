//! Session Context: the façade applications use to speak, play, record and read
//! digits.
//!
//! ## Barge-in
//!
//! Every `say`/`play` runs a speech task (synthesis, then playback) and, when
//! interrupt-on-input is enabled, races it against a watcher blocked on the digit
//! buffer. If the watcher wins, the operation token is cancelled, the player (or
//! the direct-shape engine) is told to stop, the speech task gets a bounded grace
//! period before it is aborted, and the consumed digit is put back at the head of
//! the buffer so the next `get_digit` still sees it.
//!
//! Playback is strictly sequential per session: starting an operation cancels the
//! previous one and waits for it to release the playback lane.

use crate::audio::PcmAudio;
use crate::cancel::{CancelToken, OperationHandle, Outcome};
use crate::config::SessionOptions;
use crate::digits::{DigitBuffer, Dtmf};
use crate::error::{AuiError, AuiResult};
use crate::speakable::Speakable;
use crate::traits::{SessionIo, SpeechShape};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Per-call options for `say`/`play`.
#[derive(Debug, Clone)]
pub struct PromptOptions {
    /// Resolve the race before returning.
    pub wait: bool,
    /// Overrides the session default.
    pub cancel_on_input: Option<bool>,
    /// Caller-owned token; a fresh one is created when absent.
    pub token: Option<CancelToken>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            wait: true,
            cancel_on_input: None,
            token: None,
        }
    }
}

impl PromptOptions {
    /// Return an [`OperationHandle`] immediately instead of waiting.
    pub fn background() -> Self {
        Self {
            wait: false,
            ..Self::default()
        }
    }

    pub fn cancel_on_input(mut self, enabled: bool) -> Self {
        self.cancel_on_input = Some(enabled);
        self
    }

    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }
}

enum Source {
    Text(String),
    Audio(PcmAudio),
}

struct Inner {
    io: SessionIo,
    digits: Arc<DigitBuffer>,
    options: SessionOptions,
    speakable: Speakable,
    /// Token of the operation in flight, tagged with its id.
    active: Mutex<Option<(u64, CancelToken)>>,
    next_op: AtomicU64,
    lane: tokio::sync::Mutex<()>,
}

/// Cheaply cloneable handle to one session.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("options", &self.inner.options)
            .field("pending_digits", &self.inner.digits.pending())
            .finish()
    }
}

impl SessionContext {
    /// Build a session over `io`. The transport's keypad is bound to a fresh
    /// digit buffer immediately.
    pub fn new(io: SessionIo, options: SessionOptions) -> Self {
        let digits = Arc::new(DigitBuffer::new());
        io.dtmf.bind(Arc::clone(&digits));
        Self {
            inner: Arc::new(Inner {
                io,
                digits,
                speakable: Speakable::new(options.lang),
                options,
                active: Mutex::new(None),
                next_op: AtomicU64::new(0),
                lane: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    pub fn digits(&self) -> Arc<DigitBuffer> {
        Arc::clone(&self.inner.digits)
    }

    /// Inject symbols as if they had been keyed in. Returns how many were valid.
    pub fn push_digits(&self, symbols: &str) -> usize {
        self.inner.digits.push_str(symbols)
    }

    /// Speak `text` after glyph normalisation.
    pub async fn say(&self, text: &str, opts: PromptOptions) -> AuiResult<OperationHandle> {
        let text = self.inner.speakable.normalize(text);
        debug!(text = %text, wait = opts.wait, "say");
        self.run(Source::Text(text), opts).await
    }

    /// Speak and wait for the race to resolve.
    pub async fn say_wait(&self, text: &str) -> AuiResult<Outcome> {
        self.say(text, PromptOptions::default()).await?.wait().await
    }

    /// Play a pre-built buffer; converted to the canonical format first.
    pub async fn play(&self, audio: PcmAudio, opts: PromptOptions) -> AuiResult<OperationHandle> {
        let audio = audio.to_canonical()?;
        debug!(duration_ms = audio.duration().as_millis() as u64, wait = opts.wait, "play");
        self.run(Source::Audio(audio), opts).await
    }

    /// Play a WAV file.
    pub async fn play_file(
        &self,
        path: impl AsRef<Path>,
        opts: PromptOptions,
    ) -> AuiResult<OperationHandle> {
        let path = path.as_ref().to_path_buf();
        let audio = tokio::task::spawn_blocking(move || PcmAudio::from_wav_file(path))
            .await
            .map_err(|e| AuiError::Playback(format!("wav loader failed: {}", e)))??;
        self.play(audio, opts).await
    }

    /// Record from the transport for at most `max`.
    pub async fn record(&self, max: Duration) -> AuiResult<PcmAudio> {
        self.inner.io.recorder.record(max).await
    }

    /// Stop whatever is playing. Always safe; failures are only logged.
    pub async fn stop_audio(&self) {
        if let Some(token) = self.active_token() {
            token.cancel();
        }
        if let Err(e) = self.inner.io.player.stop().await {
            warn!(error = %e, "player stop failed");
        }
        if let Err(e) = self.inner.io.tts.interrupt() {
            warn!(error = %e, "speech interrupt failed");
        }
    }

    /// Next digit, waiting at most `timeout` (`None` waits forever).
    pub async fn get_digit(&self, timeout: Option<Duration>) -> Option<Dtmf> {
        self.inner.digits.pop(timeout).await.map(|e| e.value)
    }

    /// Speak `prompt` (barge-in per session default), then read one digit.
    pub async fn say_and_get_digit(
        &self,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> AuiResult<Option<Dtmf>> {
        self.say_wait(prompt).await?;
        Ok(self.get_digit(timeout).await)
    }

    /// Yes/no question: `1` is yes, `2` is no, anything else (or silence) is unknown.
    pub async fn confirm(
        &self,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> AuiResult<Option<bool>> {
        let answer = self.say_and_get_digit(prompt, timeout).await?;
        Ok(match answer.map(Dtmf::as_char) {
            Some('1') => Some(true),
            Some('2') => Some(false),
            _ => None,
        })
    }

    /// Collect up to `max` digits. Stops early on `terminator` (not included) or
    /// when no digit arrives within `timeout`.
    pub async fn read_digits(
        &self,
        max: usize,
        timeout: Option<Duration>,
        terminator: Option<char>,
    ) -> String {
        let mut collected = String::new();
        while collected.chars().count() < max {
            let Some(digit) = self.get_digit(timeout).await else {
                break;
            };
            if terminator.is_some_and(|t| digit == t) {
                break;
            }
            collected.push(digit.as_char());
        }
        collected
    }

    /// Detach from the transport and cancel any running operation.
    pub fn close(&self) {
        if let Some(token) = self.active_token() {
            token.cancel();
        }
        self.inner.io.dtmf.unbind();
    }

    fn active_token(&self) -> Option<CancelToken> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, token)| token.clone())
    }

    /// Register `next` as the active operation, cancelling the previous one.
    /// Returns the id to retire it with.
    fn preempt(&self, next: &CancelToken) -> u64 {
        let id = self.inner.next_op.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace((id, next.clone()));
        if let Some((_, previous)) = previous {
            if !previous.is_cancelled() {
                debug!("preempting running playback");
                previous.cancel();
            }
        }
        id
    }

    async fn run(&self, source: Source, opts: PromptOptions) -> AuiResult<OperationHandle> {
        let token = opts.token.unwrap_or_default();
        let cancel_on_input = opts
            .cancel_on_input
            .unwrap_or(self.inner.options.cancel_on_input);
        let id = self.preempt(&token);

        let inner = Arc::clone(&self.inner);
        let op_token = token.clone();
        let operation = async move {
            let outcome = race(Arc::clone(&inner), source, op_token, cancel_on_input).await;
            retire(&inner, id);
            outcome
        };

        if opts.wait {
            let outcome = operation.await?;
            Ok(OperationHandle::ready(token, Ok(outcome)))
        } else {
            Ok(OperationHandle::spawn(token, operation))
        }
    }
}

/// Forget operation `id` if it is still the active one.
fn retire(inner: &Inner, id: u64) {
    let mut active = inner.active.lock().unwrap_or_else(PoisonError::into_inner);
    if active.as_ref().is_some_and(|(current, _)| *current == id) {
        active.take();
    }
}

/// Speech task racing the input watcher and external cancellation.
async fn race(
    inner: Arc<Inner>,
    source: Source,
    token: CancelToken,
    cancel_on_input: bool,
) -> AuiResult<Outcome> {
    let _lane = tokio::select! {
        biased;
        _ = token.cancelled() => return Ok(Outcome::Cancelled { input: None }),
        guard = inner.lane.lock() => guard,
    };

    let mut speech = tokio::spawn(speak(inner.io.clone(), source, token.clone()));
    let watcher = async {
        if cancel_on_input {
            inner.digits.pop(None).await
        } else {
            std::future::pending().await
        }
    };

    tokio::select! {
        biased;
        joined = &mut speech => match joined {
            Ok(Ok(())) if token.is_cancelled() => Ok(Outcome::Cancelled { input: None }),
            Ok(Ok(())) => Ok(Outcome::Completed),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(AuiError::Playback(format!("speech task failed: {}", e))),
        },
        input = watcher => {
            token.cancel();
            halt(&inner, speech).await;
            if let Some(event) = &input {
                debug!(digit = %event.value, "barge-in");
                inner.digits.redeliver(event.clone());
            }
            Ok(Outcome::Cancelled { input })
        }
        _ = token.cancelled() => {
            halt(&inner, speech).await;
            Ok(Outcome::Cancelled { input: None })
        }
    }
}

/// Stop audio output and give the speech task a bounded time to finish.
async fn halt(inner: &Inner, mut speech: JoinHandle<AuiResult<()>>) {
    if let Err(e) = inner.io.player.stop().await {
        warn!(error = %e, "player stop failed during barge-in");
    }
    if let Err(e) = inner.io.tts.interrupt() {
        warn!(error = %e, "speech interrupt failed during barge-in");
    }
    match tokio::time::timeout(inner.options.stop_grace(), &mut speech).await {
        Ok(Ok(Err(e))) => debug!(error = %e, "cancelled speech task ended with error"),
        Ok(_) => {}
        Err(_) => {
            warn!(
                grace_ms = inner.options.stop_grace_ms,
                "speech task outlived stop grace; aborting"
            );
            speech.abort();
        }
    }
}

/// Synthesis (if needed) followed by playback to completion.
async fn speak(io: SessionIo, source: Source, token: CancelToken) -> AuiResult<()> {
    let audio = match source {
        Source::Audio(audio) => audio,
        Source::Text(text) => match io.tts.shape() {
            SpeechShape::Synth => io.tts.synth(&text, &token).await?.to_canonical()?,
            SpeechShape::Direct => {
                if token.is_cancelled() {
                    return Ok(());
                }
                let tts = Arc::clone(&io.tts);
                return tokio::task::spawn_blocking(move || tts.speak(&text))
                    .await
                    .map_err(|e| AuiError::Synthesis(format!("speech worker failed: {}", e)))?;
            }
        },
    };

    if token.is_cancelled() || audio.is_empty() {
        return Ok(());
    }
    io.player.play_pcm(audio).await?;
    io.player.wait_until_done().await
}
