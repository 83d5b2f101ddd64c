//! DTMF input events and the per-session digit buffer.
//!
//! Transports push raw key or tone symbols from any thread; session tasks pop them
//! asynchronously. Only symbols of the DTMF alphabet are ever stored.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// Symbols accepted as keypad / tone input.
pub const DTMF_ALPHABET: &str = "0123456789*#ABCD";

/// One validated DTMF symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dtmf(char);

impl Dtmf {
    /// Accepts `0-9`, `*`, `#` and `A-D` (lower-case letters are folded).
    pub fn parse(symbol: char) -> Option<Self> {
        let symbol = symbol.to_ascii_uppercase();
        if DTMF_ALPHABET.contains(symbol) {
            Some(Self(symbol))
        } else {
            None
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }

    pub fn is_digit(self) -> bool {
        self.0.is_ascii_digit()
    }
}

impl fmt::Display for Dtmf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<char> for Dtmf {
    type Error = char;

    fn try_from(symbol: char) -> Result<Self, Self::Error> {
        Dtmf::parse(symbol).ok_or(symbol)
    }
}

impl PartialEq<char> for Dtmf {
    fn eq(&self, other: &char) -> bool {
        self.0 == *other
    }
}

/// Kind of input event. Only keypad digits exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Digit,
}

/// An immutable input event produced by a transport or a test harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: InputKind,
    pub value: Dtmf,
}

impl InputEvent {
    pub fn digit(value: Dtmf) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: InputKind::Digit,
            value,
        }
    }
}

/// FIFO of input events shared between the transport and the session.
#[derive(Debug, Default)]
pub struct DigitBuffer {
    queue: Mutex<VecDeque<InputEvent>>,
    notify: Notify,
}

impl DigitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<InputEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a symbol and wake waiters. Symbols outside the alphabet are ignored;
    /// returns whether the symbol was stored.
    pub fn push(&self, symbol: char) -> bool {
        let Some(value) = Dtmf::parse(symbol) else {
            debug!(symbol = ?symbol, "ignoring non-DTMF input");
            return false;
        };
        self.queue().push_back(InputEvent::digit(value));
        self.notify.notify_waiters();
        true
    }

    /// Push every symbol of `symbols`; returns how many were accepted.
    pub fn push_str(&self, symbols: &str) -> usize {
        symbols.chars().filter(|c| self.push(*c)).count()
    }

    /// Put a previously consumed event back at the head of the queue.
    pub fn redeliver(&self, event: InputEvent) {
        self.queue().push_front(event);
        self.notify.notify_waiters();
    }

    /// Remove the oldest event without waiting.
    pub fn try_pop(&self) -> Option<InputEvent> {
        self.queue().pop_front()
    }

    /// Wait for the oldest event. `None` waits forever; on timeout returns `None`.
    ///
    /// Cancel-safe: an event is only removed in the same poll that returns it.
    pub async fn pop(&self, timeout: Option<Duration>) -> Option<InputEvent> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.try_pop() {
                return Some(event);
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return self.try_pop();
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Empty the buffer, returning the pending symbols in arrival order.
    pub fn drain(&self) -> String {
        self.queue().drain(..).map(|e| e.value.as_char()).collect()
    }

    /// Pending symbols in arrival order, without consuming them.
    pub fn pending(&self) -> String {
        self.queue().iter().map(|e| e.value.as_char()).collect()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }
}
