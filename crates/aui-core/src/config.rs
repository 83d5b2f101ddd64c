//! Runtime configuration loaded from the environment.
//!
//! Read once at startup (after `.env` has been loaded by the binary). There is no
//! hot reload.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | AUI_MODE | pc | Transport mode: `pc`, `null` (headless) or `ari` (rejected). |
//! | AUI_ADAPTER | mode name | Adapter backend name. |
//! | AUI_TTS | tone | Speech-engine backend name. |
//! | AUI_APP | menu | Application name. |
//! | AUI_ADAPTER_GROUP / AUI_TTS_GROUP / AUI_APP_GROUP | aui.adapters / aui.tts_backend / aui.app | Extension group names. |
//! | AUI_CANCEL_ON_INPUT | true | Default barge-in for prompts. |
//! | AUI_LANG | de | Glyph vocabulary (`de`, `en`). |
//! | AUI_STOP_GRACE_MS | 500 | Bound on residual speech after a barge-in. |
//! | AUI_ADAPTER_ARG_* / AUI_TTS_ARG_* | (none) | Init arguments for the selected backends. |

use crate::error::{AuiError, AuiResult};
use crate::speakable::Lang;
use crate::traits::InitArgs;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const ADAPTER_ARG_PREFIX: &str = "AUI_ADAPTER_ARG_";
pub const TTS_ARG_PREFIX: &str = "AUI_TTS_ARG_";

fn default_stop_grace_ms() -> u64 {
    500
}

/// Transport line the process runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Local sound card and keyboard.
    #[default]
    Pc,
    /// No devices; timed silent playback and scripted digits.
    Null,
    /// Asterisk ARI telephony.
    Ari,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportMode::Pc => "pc",
            TransportMode::Null => "null",
            TransportMode::Ari => "ari",
        }
    }
}

impl FromStr for TransportMode {
    type Err = AuiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pc" => Ok(TransportMode::Pc),
            "null" | "headless" => Ok(TransportMode::Null),
            "ari" => Ok(TransportMode::Ari),
            other => Err(AuiError::Config(format!("unknown AUI_MODE '{}'", other))),
        }
    }
}

/// Extension group names used for discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupNames {
    pub adapters: String,
    pub tts: String,
    pub apps: String,
}

impl Default for GroupNames {
    fn default() -> Self {
        Self {
            adapters: "aui.adapters".to_string(),
            tts: "aui.tts_backend".to_string(),
            apps: "aui.app".to_string(),
        }
    }
}

/// Session-level behaviour shared by every prompt of a context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Default barge-in for `say`/`play` when the caller does not override it.
    pub cancel_on_input: bool,
    pub lang: Lang,
    /// How long a cancelled speech task may keep running before it is aborted.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

impl SessionOptions {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cancel_on_input: true,
            lang: Lang::De,
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuiConfig {
    pub mode: TransportMode,
    pub adapter: String,
    pub tts: String,
    pub app: String,
    pub groups: GroupNames,
    pub session: SessionOptions,
    #[serde(default)]
    pub adapter_args: InitArgs,
    #[serde(default)]
    pub tts_args: InitArgs,
}

impl Default for AuiConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Pc,
            adapter: TransportMode::Pc.as_str().to_string(),
            tts: "tone".to_string(),
            app: "menu".to_string(),
            groups: GroupNames::default(),
            session: SessionOptions::default(),
            adapter_args: InitArgs::new(),
            tts_args: InitArgs::new(),
        }
    }
}

impl AuiConfig {
    /// Load from the process environment.
    pub fn from_env() -> AuiResult<Self> {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        Self::from_vars(vars)
    }

    /// Load from an explicit variable list (tests, embedding).
    pub fn from_vars<I, K, V>(vars: I) -> AuiResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: Vec<(String, String)> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |name: &str| env_opt_string(&vars, name);
        let defaults = Self::default();

        let mode = match get("AUI_MODE") {
            Some(m) => m.parse::<TransportMode>()?,
            None => defaults.mode,
        };
        let lang = match get("AUI_LANG") {
            Some(l) => l.parse::<Lang>().map_err(AuiError::Config)?,
            None => defaults.session.lang,
        };
        let stop_grace_ms = get("AUI_STOP_GRACE_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default_stop_grace_ms())
            .clamp(10, 10_000);

        Ok(Self {
            mode,
            adapter: get("AUI_ADAPTER").unwrap_or_else(|| mode.as_str().to_string()),
            tts: get("AUI_TTS").unwrap_or(defaults.tts),
            app: get("AUI_APP").unwrap_or(defaults.app),
            groups: GroupNames {
                adapters: get("AUI_ADAPTER_GROUP").unwrap_or(defaults.groups.adapters),
                tts: get("AUI_TTS_GROUP").unwrap_or(defaults.groups.tts),
                apps: get("AUI_APP_GROUP").unwrap_or(defaults.groups.apps),
            },
            session: SessionOptions {
                cancel_on_input: env_bool(&vars, "AUI_CANCEL_ON_INPUT", true),
                lang,
                stop_grace_ms,
            },
            adapter_args: args_with_prefix(&vars, ADAPTER_ARG_PREFIX),
            tts_args: args_with_prefix(&vars, TTS_ARG_PREFIX),
        })
    }
}

fn lookup<'a>(vars: &'a [(String, String)], name: &str) -> Option<&'a str> {
    vars.iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn env_bool(vars: &[(String, String)], name: &str, default: bool) -> bool {
    match lookup(vars, name).map(str::trim) {
        Some(v) if v.is_empty() => default,
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn env_opt_string(vars: &[(String, String)], name: &str) -> Option<String> {
    lookup(vars, name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collect `PREFIX_KEY=value` pairs as `key -> value` (key lower-cased).
fn args_with_prefix(vars: &[(String, String)], prefix: &str) -> InitArgs {
    vars.iter()
        .filter_map(|(k, v)| {
            let key = k.strip_prefix(prefix)?.trim().to_ascii_lowercase();
            if key.is_empty() {
                None
            } else {
                Some((key, v.trim().to_string()))
            }
        })
        .collect()
}
