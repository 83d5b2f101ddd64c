//! Sound-card playback using Rodio.
//!
//! `rodio::OutputStream` must stay on the thread that opened it, so the stream
//! lives on a dedicated output thread for as long as the player is started; only
//! the `Send` handle crosses back. Each playback gets its own `Sink`, which is the
//! kill-switch: `stop()` clears it immediately.

use async_trait::async_trait;
use aui_core::{AuiError, AuiResult, PcmAudio, Player};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often `wait_until_done` checks the sink.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct OutputDevice {
    handle: OutputStreamHandle,
    shutdown: mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl OutputDevice {
    /// Open the default output device on its own thread.
    fn open() -> AuiResult<Self> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<OutputStreamHandle, String>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("aui-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((_stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_ok() {
                        // Returns once the sender side is dropped.
                        let _ = shutdown_rx.recv();
                    }
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })?;

        let handle = ready_rx
            .recv()
            .map_err(|_| AuiError::Playback("output thread exited before opening a device".into()))?
            .map_err(AuiError::Playback)?;

        Ok(Self {
            handle,
            shutdown: shutdown_tx,
            thread: Some(thread),
        })
    }

    fn close(mut self) {
        let _ = self.shutdown.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("output thread panicked");
            }
        }
    }
}

/// Plays canonical PCM on the default output device.
#[derive(Default)]
pub struct RodioPlayer {
    device: Mutex<Option<OutputDevice>>,
    sink: Mutex<Option<Arc<Sink>>>,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the output device. Idempotent.
    pub fn open(&self) -> AuiResult<()> {
        let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        if device.is_none() {
            *device = Some(OutputDevice::open()?);
            info!("RodioPlayer: output device ready");
        }
        Ok(())
    }

    /// Stop playback and release the output device.
    pub fn close(&self) {
        self.halt();
        let device = self
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(device) = device {
            device.close();
            info!("RodioPlayer: output device closed");
        }
    }

    fn current_sink(&self) -> Option<Arc<Sink>> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn halt(&self) {
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sink) = sink {
            sink.stop();
            debug!("RodioPlayer: playback stopped");
        }
    }
}

#[async_trait]
impl Player for RodioPlayer {
    async fn play_pcm(&self, audio: PcmAudio) -> AuiResult<()> {
        self.halt();
        if !audio.is_canonical() {
            return Err(AuiError::Playback(format!(
                "expected mono s16le, got {} channel(s) x {} byte(s)",
                audio.channels, audio.width
            )));
        }

        let handle = self
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|d| d.handle.clone())
            .ok_or_else(|| AuiError::Playback("output device not open".into()))?;

        let samples = audio.samples_i16()?;
        let sink = Sink::try_new(&handle).map_err(|e| AuiError::Playback(e.to_string()))?;
        sink.append(SamplesBuffer::new(1, audio.rate, samples));
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(sink));
        Ok(())
    }

    async fn wait_until_done(&self) -> AuiResult<()> {
        // `Sink::sleep_until_end` cannot be interrupted, so poll instead.
        let Some(playing) = self.current_sink() else {
            return Ok(());
        };
        loop {
            let still_current = self
                .current_sink()
                .is_some_and(|s| Arc::ptr_eq(&s, &playing));
            if !still_current || playing.empty() {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn stop(&self) -> AuiResult<()> {
        self.halt();
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.current_sink().is_some_and(|s| !s.empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_player_rejects_playback() {
        let player = RodioPlayer::new();
        let err = player
            .play_pcm(PcmAudio::silence(8_000, Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuiError::Playback(_)));
        assert!(!player.is_busy());
    }

    #[tokio::test]
    async fn stop_and_wait_are_safe_when_idle() {
        let player = RodioPlayer::new();
        player.stop().await.unwrap();
        player.wait_until_done().await.unwrap();
        player.close();
    }

    #[tokio::test]
    #[ignore] // Requires a sound card
    async fn plays_and_stops_on_real_device() {
        let player = RodioPlayer::new();
        player.open().unwrap();
        let tone: Vec<f32> = (0..16_000)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 16_000.0).sin() * 0.2)
            .collect();
        player
            .play_pcm(PcmAudio::from_f32(&tone, 16_000))
            .await
            .unwrap();
        assert!(player.is_busy());
        player.stop().await.unwrap();
        player.wait_until_done().await.unwrap();
        player.close();
    }
}
