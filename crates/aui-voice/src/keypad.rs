//! Keyboard keypad: digits typed on stdin become DTMF input.
//!
//! One reader thread per process owns stdin (it blocks in `read_line` and cannot
//! be interrupted). Lines are routed to whichever keypad is currently started; a
//! line consisting of `q` closes the line.

use aui_core::{CancelToken, DigitBuffer, DtmfSource};
use std::io::BufRead;
use std::sync::{Arc, Mutex, Once, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// Keypad state shared with the stdin reader thread.
#[derive(Default)]
pub struct KeypadShared {
    bound: Mutex<Option<Arc<DigitBuffer>>>,
    hangup: CancelToken,
}

impl KeypadShared {
    /// Handle one input line: `q` hangs up, everything else is keyed in.
    pub fn dispatch(&self, line: &str) {
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            info!("keypad: quit requested");
            self.hangup.cancel();
            return;
        }
        let bound = self
            .bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match bound {
            Some(buffer) => {
                let accepted = buffer.push_str(line);
                debug!(line = %line, accepted, "keypad input");
            }
            None => debug!(line = %line, "keypad input without a session; dropped"),
        }
    }

    pub fn hangup_token(&self) -> CancelToken {
        self.hangup.clone()
    }
}

fn route() -> &'static Mutex<Option<Arc<KeypadShared>>> {
    static ROUTE: OnceLock<Mutex<Option<Arc<KeypadShared>>>> = OnceLock::new();
    ROUTE.get_or_init(|| Mutex::new(None))
}

fn ensure_reader_thread() {
    static READER: Once = Once::new();
    READER.call_once(|| {
        let spawned = std::thread::Builder::new()
            .name("aui-keypad".into())
            .spawn(|| {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(error = %e, "keypad: stdin read failed");
                            break;
                        }
                    };
                    let target = route()
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone();
                    if let Some(keypad) = target {
                        keypad.dispatch(&line);
                    }
                }
                debug!("keypad: stdin closed");
            });
        if let Err(e) = spawned {
            warn!(error = %e, "keypad: could not spawn stdin reader");
        }
    });
}

/// DTMF source fed from the terminal.
#[derive(Default)]
pub struct StdinKeypad {
    shared: Arc<KeypadShared>,
}

impl StdinKeypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route stdin to this keypad.
    pub fn open(&self) {
        ensure_reader_thread();
        *route().lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&self.shared));
    }

    /// Stop routing stdin here (if still routed).
    pub fn close(&self) {
        let mut route = route().lock().unwrap_or_else(PoisonError::into_inner);
        if route
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &self.shared))
        {
            route.take();
        }
    }

    pub fn shared(&self) -> &KeypadShared {
        &self.shared
    }
}

impl DtmfSource for StdinKeypad {
    fn bind(&self, buffer: Arc<DigitBuffer>) {
        *self
            .shared
            .bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(buffer);
    }

    fn unbind(&self) {
        self.shared
            .bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
