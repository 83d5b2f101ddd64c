//! Error types for the AUI runtime

use thiserror::Error;

/// Result type alias for runtime operations
pub type AuiResult<T> = Result<T, AuiError>;

/// Errors surfaced by the session runtime and its backends.
///
/// A digit timeout is not an error: `get_digit` and `DigitBuffer::pop` return `None`.
#[derive(Error, Debug)]
pub enum AuiError {
    #[error(
        "backend '{name}' not found in group '{group}' (available: {})",
        fmt_available(.available)
    )]
    BackendNotFound {
        group: String,
        name: String,
        available: Vec<String>,
    },

    #[error("missing capability: {0}")]
    MissingCapability(String),

    #[error("no session context: adapter and speech engine must both be selected")]
    ContextUnavailable,

    #[error("backend '{backend}' failed to stop: {reason}")]
    StopFailure { backend: String, reason: String },

    #[error("backend '{backend}' failed to start: {reason}")]
    StartFailure { backend: String, reason: String },

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

fn fmt_available(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

impl AuiError {
    /// Wrap any displayable failure raised while a backend was stopping.
    pub fn stop_failure(backend: impl Into<String>, reason: impl ToString) -> Self {
        AuiError::StopFailure {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap any displayable failure raised while a backend was starting.
    pub fn start_failure(backend: impl Into<String>, reason: impl ToString) -> Self {
        AuiError::StartFailure {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_not_found_lists_available_names() {
        let err = AuiError::BackendNotFound {
            group: "aui.adapters".into(),
            name: "bogus".into(),
            available: vec!["null".into(), "pc".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("bogus"));
        assert!(msg.contains("null, pc"));
    }

    #[test]
    fn backend_not_found_with_empty_group() {
        let err = AuiError::BackendNotFound {
            group: "aui.app".into(),
            name: "menu".into(),
            available: vec![],
        };
        assert!(err.to_string().ends_with("(available: none)"));
    }
}
