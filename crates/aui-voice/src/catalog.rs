//! Default catalog: publishes the built-in adapters and speech engines into the
//! extension groups under their well-known names.

use crate::null::NullAdapter;
use crate::pc::PcAdapter;
use crate::tts::{EspeakTts, OpenAiTts, ToneTts};
use aui_core::{Adapter, Extensions, InitArgs, SpeechEngine};
use std::sync::Arc;

pub const ADAPTER_PC: &str = "pc";
pub const ADAPTER_NULL: &str = "null";

pub const TTS_TONE: &str = "tone";
pub const TTS_OPENAI: &str = "openai";
pub const TTS_ESPEAK: &str = "espeak";

/// Publish `pc` and `null`.
pub fn register_adapters(extensions: &Extensions) {
    extensions.adapters.register(ADAPTER_PC, |_: &InitArgs| {
        Ok(Arc::new(PcAdapter::new()) as Arc<dyn Adapter>)
    });
    extensions.adapters.register(ADAPTER_NULL, |_: &InitArgs| {
        Ok(Arc::new(NullAdapter::from_env()) as Arc<dyn Adapter>)
    });
}

/// Publish `tone`, `openai` and `espeak`.
pub fn register_speech(extensions: &Extensions) {
    extensions.speech.register(TTS_TONE, |_: &InitArgs| {
        Ok(Arc::new(ToneTts::new()) as Arc<dyn SpeechEngine>)
    });
    extensions.speech.register(TTS_OPENAI, |_: &InitArgs| {
        Ok(Arc::new(OpenAiTts::from_env()?) as Arc<dyn SpeechEngine>)
    });
    extensions.speech.register(TTS_ESPEAK, |_: &InitArgs| {
        Ok(Arc::new(EspeakTts::from_env()) as Arc<dyn SpeechEngine>)
    });
}

/// Publish every built-in transport and speech engine.
pub fn register_defaults(extensions: &Extensions) {
    register_adapters(extensions);
    register_speech(extensions);
}
