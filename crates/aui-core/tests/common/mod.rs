//! Recording mock backends shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use aui_core::{
    Adapter, AdapterIo, AppMeta, Application, AuiError, AuiResult, Backend, CancelToken,
    DigitBuffer, DtmfSource, Extensions, InitArgs, Lifecycle, PcmAudio, Player, Recorder,
    SessionContext, SessionIo, SessionOptions, SpeechEngine, SpeechShape,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("aui_core=debug")
        .try_init();
}

/// Ordered log of backend calls.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    /// Entries starting with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Plays by sleeping for the buffer's duration; `stop` cuts the sleep short.
pub struct MockPlayer {
    journal: Journal,
    current: Mutex<Option<(CancelToken, Duration)>>,
}

impl MockPlayer {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Player for MockPlayer {
    async fn play_pcm(&self, audio: PcmAudio) -> AuiResult<()> {
        self.journal
            .record(format!("player.play:{}ms", audio.duration().as_millis()));
        let previous = self
            .current
            .lock()
            .unwrap()
            .replace((CancelToken::new(), audio.duration()));
        if let Some((token, _)) = previous {
            token.cancel();
        }
        Ok(())
    }

    async fn wait_until_done(&self) -> AuiResult<()> {
        let current = self.current.lock().unwrap().clone();
        if let Some((token, duration)) = current {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {}
            }
        }
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        self.journal.record("player.stop");
        if let Some((token, _)) = self.current.lock().unwrap().take() {
            token.cancel();
        }
        Ok(())
    }
}

/// Keypad whose presses are injected by the test.
#[derive(Default)]
pub struct MockKeypad {
    bound: Mutex<Option<Arc<DigitBuffer>>>,
}

impl MockKeypad {
    pub fn press(&self, keys: &str) {
        if let Some(buffer) = self.bound.lock().unwrap().as_ref() {
            buffer.push_str(keys);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound.lock().unwrap().is_some()
    }
}

impl DtmfSource for MockKeypad {
    fn bind(&self, buffer: Arc<DigitBuffer>) {
        *self.bound.lock().unwrap() = Some(buffer);
    }

    fn unbind(&self) {
        self.bound.lock().unwrap().take();
    }
}

pub struct MockRecorder;

#[async_trait]
impl Recorder for MockRecorder {
    async fn record(&self, max: Duration) -> AuiResult<PcmAudio> {
        Ok(PcmAudio::silence(8_000, max))
    }
}

pub struct MockAdapter {
    name: String,
    journal: Journal,
    player: Arc<MockPlayer>,
    keypad: Arc<MockKeypad>,
    with_recorder: bool,
    fail_start: bool,
    fail_stop: bool,
}

impl MockAdapter {
    pub fn new(name: &str, journal: Journal) -> Self {
        Self {
            name: name.to_string(),
            player: Arc::new(MockPlayer::new(journal.clone())),
            journal,
            keypad: Arc::new(MockKeypad::default()),
            with_recorder: true,
            fail_start: false,
            fail_stop: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn without_recorder(mut self) -> Self {
        self.with_recorder = false;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn keypad(&self) -> Arc<MockKeypad> {
        Arc::clone(&self.keypad)
    }
}

#[async_trait]
impl Lifecycle for MockAdapter {
    async fn start(&self) -> AuiResult<()> {
        self.journal.record(format!("start:adapter:{}", self.name));
        if self.fail_start {
            return Err(AuiError::Playback("no sound card".into()));
        }
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        self.journal.record(format!("stop:adapter:{}", self.name));
        if self.fail_stop {
            return Err(AuiError::Playback("device wedged".into()));
        }
        Ok(())
    }
}

impl Backend for MockAdapter {}

impl Adapter for MockAdapter {
    fn io(&self) -> AdapterIo {
        AdapterIo {
            player: Some(self.player.clone() as Arc<dyn Player>),
            dtmf: Some(self.keypad.clone() as Arc<dyn DtmfSource>),
            recorder: self
                .with_recorder
                .then(|| Arc::new(MockRecorder) as Arc<dyn Recorder>),
        }
    }
}

/// Synth-shape engine producing silence of a fixed length.
pub struct MockSynth {
    name: String,
    journal: Journal,
    length: Duration,
    fail: bool,
    fail_stop: bool,
}

impl MockSynth {
    pub fn new(name: &str, journal: Journal, length: Duration) -> Self {
        Self {
            name: name.to_string(),
            journal,
            length,
            fail: false,
            fail_stop: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }
}

#[async_trait]
impl Lifecycle for MockSynth {
    async fn start(&self) -> AuiResult<()> {
        self.journal.record(format!("start:tts:{}", self.name));
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        self.journal.record(format!("stop:tts:{}", self.name));
        if self.fail_stop {
            return Err(AuiError::Synthesis("engine hung".into()));
        }
        Ok(())
    }
}

impl Backend for MockSynth {}

#[async_trait]
impl SpeechEngine for MockSynth {
    async fn synth(&self, text: &str, _cancel: &CancelToken) -> AuiResult<PcmAudio> {
        self.journal.record(format!("synth:{}", text));
        if self.fail {
            return Err(AuiError::Synthesis("voice unavailable".into()));
        }
        Ok(PcmAudio::silence(8_000, self.length))
    }
}

/// Direct-shape engine: `speak` blocks until the length elapses or `interrupt`.
pub struct MockDirect {
    journal: Journal,
    length: Duration,
    interrupted: AtomicBool,
}

impl MockDirect {
    pub fn new(journal: Journal, length: Duration) -> Self {
        Self {
            journal,
            length,
            interrupted: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Lifecycle for MockDirect {
    async fn start(&self) -> AuiResult<()> {
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        Ok(())
    }
}

impl Backend for MockDirect {}

impl SpeechEngine for MockDirect {
    fn shape(&self) -> SpeechShape {
        SpeechShape::Direct
    }

    fn speak(&self, text: &str) -> AuiResult<()> {
        self.journal.record(format!("speak:{}", text));
        let step = Duration::from_millis(5);
        let mut spoken = Duration::ZERO;
        while spoken < self.length {
            if self.interrupted.swap(false, Ordering::SeqCst) {
                self.journal.record("speak.interrupted");
                return Ok(());
            }
            std::thread::sleep(step);
            spoken += step;
        }
        Ok(())
    }

    fn interrupt(&self) -> AuiResult<()> {
        self.journal.record("tts.interrupt");
        self.interrupted.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Application that records its lifecycle and keeps the context it was given.
pub struct MockApp {
    name: String,
    journal: Journal,
    fail_stop: bool,
    ctx: Mutex<Option<SessionContext>>,
}

impl MockApp {
    pub fn new(name: &str, journal: Journal) -> Self {
        Self {
            name: name.to_string(),
            journal,
            fail_stop: false,
            ctx: Mutex::new(None),
        }
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }
}

#[async_trait]
impl Lifecycle for MockApp {
    async fn start(&self) -> AuiResult<()> {
        self.journal.record(format!("start:app:{}", self.name));
        let ctx = self.ctx.lock().unwrap().clone();
        if let Some(ctx) = ctx {
            ctx.say_wait("Hallo").await?;
        }
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        self.journal.record(format!("stop:app:{}", self.name));
        if self.fail_stop {
            return Err(AuiError::Config("app refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Application for MockApp {
    fn meta(&self) -> AppMeta {
        AppMeta::new(self.name.clone(), format!("Mock {}", self.name))
    }

    async fn init(&self, ctx: SessionContext) -> AuiResult<()> {
        self.journal.record(format!("init:app:{}", self.name));
        *self.ctx.lock().unwrap() = Some(ctx);
        Ok(())
    }
}

/// Extension groups populated with recording mocks.
pub fn extensions(journal: &Journal) -> Extensions {
    let ext = Extensions::default();

    for name in ["pc", "null", "partial", "sticky", "dead"] {
        let journal = journal.clone();
        ext.adapters.register(name, move |_args: &InitArgs| {
            let adapter = MockAdapter::new(name, journal.clone());
            let adapter = match name {
                "partial" => adapter.without_recorder(),
                "sticky" => adapter.failing_stop(),
                "dead" => adapter.failing_start(),
                _ => adapter,
            };
            Ok(Arc::new(adapter) as Arc<dyn Adapter>)
        });
    }

    for (name, fail_stop) in [("tone", false), ("hung", true)] {
        let journal = journal.clone();
        ext.speech.register(name, move |_args: &InitArgs| {
            let engine = MockSynth::new(name, journal.clone(), Duration::from_millis(20));
            let engine = if fail_stop { engine.failing_stop() } else { engine };
            Ok(Arc::new(engine) as Arc<dyn SpeechEngine>)
        });
    }

    for (name, fail_stop) in [("greeter", false), ("grumpy", true)] {
        let journal = journal.clone();
        ext.apps.register(name, move |_args: &InitArgs| {
            let app = MockApp::new(name, journal.clone());
            let app = if fail_stop { app.failing_stop() } else { app };
            Ok(Arc::new(app) as Arc<dyn Application>)
        });
    }

    ext
}

/// A session wired straight to mocks, without the orchestrator.
pub struct Harness {
    pub journal: Journal,
    pub keypad: Arc<MockKeypad>,
    pub ctx: SessionContext,
}

pub fn session(
    engine: Arc<dyn SpeechEngine>,
    journal: Journal,
    options: SessionOptions,
) -> Harness {
    let adapter = MockAdapter::new("pc", journal.clone());
    let keypad = adapter.keypad();
    let io = SessionIo::assemble(adapter.io(), engine).unwrap();
    Harness {
        journal,
        keypad,
        ctx: SessionContext::new(io, options),
    }
}

pub fn synth_session(length: Duration, options: SessionOptions) -> Harness {
    let journal = Journal::default();
    let engine = Arc::new(MockSynth::new("tone", journal.clone(), length));
    session(engine, journal, options)
}
