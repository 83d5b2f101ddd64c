//! Speech engines.
//!
//! - [`ToneTts`]: offline synth-shape engine, one tone burst per word. Always available.
//! - [`OpenAiTts`]: OpenAI-compatible `/audio/speech`, raw 24 kHz PCM.
//! - [`EspeakTts`]: direct-shape engine driving the `espeak-ng` process.

mod espeak;
mod openai;
mod tone;

pub use espeak::EspeakTts;
pub use openai::{OpenAiTts, OPENAI_PCM_RATE};
pub use tone::ToneTts;
