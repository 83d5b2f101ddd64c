//! # AUI Voice - Transports and Speech Engines
//!
//! Concrete backends for the `aui-core` session runtime.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       PcAdapter                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐    │
//! │  │  Audio Out   │  │    Keypad    │  │   Audio In   │    │
//! │  │   (rodio)    │  │   (stdin)    │  │    (cpal)    │    │
//! │  └──────────────┘  └──────────────┘  └──────────────┘    │
//! │         ↑ stop() = kill switch                           │
//! └──────────────────────────────────────────────────────────┘
//!   NullAdapter: timed silent playback, scripted digits.
//!   Speech: tone (offline), openai (HTTP, 24 kHz PCM), espeak (process).
//! ```
//!
//! [`catalog::register_defaults`] publishes everything under its well-known name.

pub mod catalog;
pub mod keypad;
pub mod null;
pub mod pc;
pub mod player;
pub mod recorder;
pub mod tts;

pub use catalog::register_defaults;
pub use keypad::StdinKeypad;
pub use null::{NullAdapter, NullPlayer, ScriptedKeypad, SilentRecorder};
pub use pc::PcAdapter;
pub use player::RodioPlayer;
pub use recorder::CpalRecorder;
pub use tts::{EspeakTts, OpenAiTts, ToneTts};
