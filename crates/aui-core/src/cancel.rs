//! Cooperative cancellation for prompts and playback.
//!
//! A [`CancelToken`] is a one-way flag shared between an operation, its owner and
//! the barge-in watcher. An [`OperationHandle`] pairs the token with the result of
//! the spawned operation so callers can poll, wait or cancel.

use crate::digits::InputEvent;
use crate::error::{AuiError, AuiResult};
use std::future::Future;
use tokio::task::JoinHandle;

/// Monotonic cancellation flag; `cancel()` is idempotent.
pub use tokio_util::sync::CancellationToken as CancelToken;

/// How a prompt or playback operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Audio ran to completion.
    Completed,
    /// Stopped early. `input` carries the event that barged in, if any; that event
    /// has already been re-delivered to the digit buffer.
    Cancelled { input: Option<InputEvent> },
}

impl Outcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled { .. })
    }
}

enum HandleState<T> {
    Running(JoinHandle<AuiResult<T>>),
    Ready(AuiResult<T>),
}

/// Handle to an in-flight (or already resolved) operation.
pub struct OperationHandle<T = Outcome> {
    token: CancelToken,
    state: HandleState<T>,
}

impl<T: Send + 'static> OperationHandle<T> {
    /// Run `operation` on the runtime, governed by `token`.
    pub fn spawn<F>(token: CancelToken, operation: F) -> Self
    where
        F: Future<Output = AuiResult<T>> + Send + 'static,
    {
        Self {
            token,
            state: HandleState::Running(tokio::spawn(operation)),
        }
    }

    /// Wrap an already available result.
    pub fn ready(token: CancelToken, result: AuiResult<T>) -> Self {
        Self {
            token,
            state: HandleState::Ready(result),
        }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Request cancellation; observed by the operation at its next check point.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Running(task) => task.is_finished(),
            HandleState::Ready(_) => true,
        }
    }

    /// Wait for the operation's result.
    pub async fn wait(self) -> AuiResult<T> {
        match self.state {
            HandleState::Ready(result) => result,
            HandleState::Running(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(AuiError::Playback(format!("operation task failed: {}", e))),
            },
        }
    }
}

impl<T> std::fmt::Debug for OperationHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            HandleState::Running(task) if task.is_finished() => "finished",
            HandleState::Running(_) => "running",
            HandleState::Ready(_) => "ready",
        };
        f.debug_struct("OperationHandle")
            .field("cancelled", &self.token.is_cancelled())
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn token_cancel_is_one_way() {
        let token = CancelToken::new();
        let reader = token.clone();
        assert!(!reader.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(reader.is_cancelled());
    }

    #[tokio::test]
    async fn handle_cancels_running_operation() {
        let token = CancelToken::new();
        let inner = token.clone();
        let handle = OperationHandle::spawn(token, async move {
            tokio::select! {
                _ = inner.cancelled() => Ok(Outcome::Cancelled { input: None }),
                _ = tokio::time::sleep(Duration::from_secs(5)) => Ok(Outcome::Completed),
            }
        });
        assert!(!handle.is_finished());
        handle.cancel();
        assert!(handle.is_cancelled());
        let outcome = handle.wait().await.unwrap();
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn ready_handle_returns_stored_result() {
        let handle: OperationHandle =
            OperationHandle::ready(CancelToken::new(), Ok(Outcome::Completed));
        assert!(handle.is_finished());
        assert_eq!(handle.wait().await.unwrap(), Outcome::Completed);
    }

    #[tokio::test]
    async fn panicking_operation_surfaces_as_error() {
        let device_gone = true;
        let handle: OperationHandle<()> = OperationHandle::spawn(CancelToken::new(), async move {
            if device_gone {
                panic!("device gone");
            }
            Ok(())
        });
        assert!(handle.wait().await.is_err());
    }
}
