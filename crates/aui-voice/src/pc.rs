//! Local PC transport: sound card out, keyboard in, microphone for recordings.

use crate::keypad::StdinKeypad;
use crate::player::RodioPlayer;
use crate::recorder::CpalRecorder;
use async_trait::async_trait;
use aui_core::{
    Adapter, AdapterIo, AuiResult, Backend, DtmfSource, InitArgs, Lifecycle, Player, Recorder,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub struct PcAdapter {
    player: Arc<RodioPlayer>,
    keypad: Arc<StdinKeypad>,
    recorder: Arc<CpalRecorder>,
    keyboard: AtomicBool,
    running: AtomicBool,
}

impl PcAdapter {
    pub fn new() -> Self {
        Self {
            player: Arc::new(RodioPlayer::new()),
            keypad: Arc::new(StdinKeypad::new()),
            recorder: Arc::new(CpalRecorder::new()),
            keyboard: AtomicBool::new(true),
            running: AtomicBool::new(false),
        }
    }
}

impl Default for PcAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Lifecycle for PcAdapter {
    async fn start(&self) -> AuiResult<()> {
        self.player.open()?;
        if self.keyboard.load(Ordering::SeqCst) {
            self.keypad.open();
            info!("PcAdapter: type digits (0-9 * #) and press Enter; 'q' quits");
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> AuiResult<()> {
        self.running.store(false, Ordering::SeqCst);
        self.keypad.close();
        self.keypad.unbind();
        self.player.close();
        info!("PcAdapter: stopped");
        Ok(())
    }
}

#[async_trait]
impl Backend for PcAdapter {
    /// `keyboard=false` leaves stdin alone (digits must then be injected).
    async fn init(&self, args: &InitArgs) -> AuiResult<()> {
        if let Some(flag) = args.get("keyboard") {
            let enabled = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
            if !enabled {
                warn!("PcAdapter: keyboard input disabled");
            }
            self.keyboard.store(enabled, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for PcAdapter {
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
        self.keypad.shared().hangup_token().cancelled().await
    }
}
