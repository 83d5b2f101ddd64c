//! # AUI Core - Voice Session Runtime
//!
//! Speaks prompts, plays audio and reads keypad input over pluggable transports.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Orchestrator                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐         │
//! │  │   Adapter    │  │    Speech    │  │ Application  │         │
//! │  │   Manager    │→ │    Manager   │  │   Manager    │         │
//! │  └──────────────┘  └──────────────┘  └──────────────┘         │
//! │         ↓ io()            ↓ synth/speak       ↑ init(ctx)     │
//! │  ┌────────────────────────────────────────────────────┐       │
//! │  │                 Session Context                    │       │
//! │  │  speech task  ⟷  barge-in watcher  ←  Digit Buffer │       │
//! │  └────────────────────────────────────────────────────┘       │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Backends are published by name into [`registry::ExtensionGroup`]s at startup
//! and constructed through a [`registry::Registry`]; each domain keeps at most
//! one live instance in its [`manager::BackendManager`].

pub mod audio;
pub mod cancel;
pub mod config;
pub mod context;
pub mod digits;
pub mod error;
pub mod manager;
pub mod orchestrator;
pub mod registry;
pub mod speakable;
pub mod traits;

pub use audio::PcmAudio;
pub use cancel::{CancelToken, OperationHandle, Outcome};
pub use config::{AuiConfig, GroupNames, SessionOptions, TransportMode};
pub use context::{PromptOptions, SessionContext};
pub use digits::{DigitBuffer, Dtmf, InputEvent, InputKind, DTMF_ALPHABET};
pub use error::{AuiError, AuiResult};
pub use manager::BackendManager;
pub use orchestrator::Orchestrator;
pub use registry::{ExtensionGroup, Extensions, Registry};
pub use speakable::{Lang, Speakable};
pub use traits::{
    Adapter, AdapterIo, AppMeta, Application, Backend, DtmfSource, InitArgs, Lifecycle, Player,
    Recorder, SessionIo, SpeechEngine, SpeechShape,
};
