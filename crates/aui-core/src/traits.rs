//! Capability contracts implemented by transports, speech engines and applications.
//!
//! Every backend is constructed by name from a [`Registry`](crate::registry::Registry),
//! optionally initialised with string arguments, then started. Transport adapters
//! expose their sub-capabilities through [`AdapterIo`]; parts an adapter cannot
//! provide are `None` and surface as `MissingCapability` when a session is built.

use crate::audio::PcmAudio;
use crate::cancel::CancelToken;
use crate::context::SessionContext;
use crate::digits::DigitBuffer;
use crate::error::{AuiError, AuiResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Named string arguments for the two-phase `init` of a backend.
pub type InitArgs = BTreeMap<String, String>;

/// Start/stop half of every backend.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn start(&self) -> AuiResult<()>;

    async fn stop(&self) -> AuiResult<()>;
}

/// A backend configured by [`InitArgs`] before it is started.
#[async_trait]
pub trait Backend: Lifecycle {
    async fn init(&self, _args: &InitArgs) -> AuiResult<()> {
        Ok(())
    }
}

/// Audio output of a transport.
#[async_trait]
pub trait Player: Send + Sync {
    /// Begin playing canonical PCM. Any previous playback is stopped first.
    async fn play_pcm(&self, audio: PcmAudio) -> AuiResult<()>;

    /// Resolve once the current playback has finished or was stopped.
    async fn wait_until_done(&self) -> AuiResult<()>;

    /// Stop playback immediately. Safe to call with nothing playing.
    async fn stop(&self) -> AuiResult<()>;

    fn is_busy(&self) -> bool {
        false
    }
}

/// Keypad or tone input of a transport. The transport pushes every received
/// symbol into the buffer bound by the active session.
pub trait DtmfSource: Send + Sync {
    fn bind(&self, buffer: Arc<DigitBuffer>);

    fn unbind(&self);
}

/// Audio input of a transport.
#[async_trait]
pub trait Recorder: Send + Sync {
    async fn record(&self, max: Duration) -> AuiResult<PcmAudio>;
}

/// Sub-capabilities offered by an adapter.
#[derive(Clone, Default)]
pub struct AdapterIo {
    pub player: Option<Arc<dyn Player>>,
    pub dtmf: Option<Arc<dyn DtmfSource>>,
    pub recorder: Option<Arc<dyn Recorder>>,
}

impl AdapterIo {
    /// Names of the parts this bundle lacks.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.player.is_none() {
            missing.push("player");
        }
        if self.dtmf.is_none() {
            missing.push("dtmf");
        }
        if self.recorder.is_none() {
            missing.push("recorder");
        }
        missing
    }
}

/// Transport backend (sound card, telephony channel, headless harness).
#[async_trait]
pub trait Adapter: Backend {
    /// True while the transport holds a device or plays audio.
    fn is_busy(&self) -> bool {
        false
    }

    fn io(&self) -> AdapterIo;

    /// Resolves when the far end closes the line (hangup, keyboard quit).
    async fn hangup(&self) {
        std::future::pending::<()>().await
    }
}

/// Complete IO bundle consumed by a [`SessionContext`].
#[derive(Clone)]
pub struct SessionIo {
    pub tts: Arc<dyn SpeechEngine>,
    pub player: Arc<dyn Player>,
    pub dtmf: Arc<dyn DtmfSource>,
    pub recorder: Arc<dyn Recorder>,
}

impl SessionIo {
    /// Combine an adapter's parts with the selected speech engine.
    pub fn assemble(io: AdapterIo, tts: Arc<dyn SpeechEngine>) -> AuiResult<Self> {
        let missing = io.missing();
        if !missing.is_empty() {
            return Err(AuiError::MissingCapability(format!(
                "adapter IO lacks {}",
                missing.join(", ")
            )));
        }
        match (io.player, io.dtmf, io.recorder) {
            (Some(player), Some(dtmf), Some(recorder)) => Ok(Self {
                tts,
                player,
                dtmf,
                recorder,
            }),
            _ => Err(AuiError::MissingCapability("adapter IO".into())),
        }
    }
}

/// Which call shape a speech engine implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechShape {
    /// `synth` returns PCM that the session plays through the adapter's player.
    Synth,
    /// `speak` blocks while the engine renders audio itself; `interrupt` cuts it off.
    Direct,
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechEngine: Backend {
    fn shape(&self) -> SpeechShape {
        SpeechShape::Synth
    }

    async fn synth(&self, _text: &str, _cancel: &CancelToken) -> AuiResult<PcmAudio> {
        Err(AuiError::MissingCapability("speech engine has no synth()".into()))
    }

    /// Blocking render of `text`. Called on a worker thread.
    fn speak(&self, _text: &str) -> AuiResult<()> {
        Err(AuiError::MissingCapability("speech engine has no speak()".into()))
    }

    /// Cut off a running `speak`. Safe to call when idle.
    fn interrupt(&self) -> AuiResult<()> {
        Ok(())
    }
}

/// Self-description of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMeta {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl AppMeta {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: String::new(),
            version: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Voice application driven by a [`SessionContext`].
#[async_trait]
pub trait Application: Lifecycle {
    fn meta(&self) -> AppMeta;

    /// Receive the session context. Called once, before `start`.
    async fn init(&self, ctx: SessionContext) -> AuiResult<()>;

    /// Resolves when the application has finished on its own.
    async fn finished(&self) {
        std::future::pending::<()>().await
    }
}
