//! AUI daemon
//!
//! Loads `.env` and the `AUI_*` configuration, publishes the built-in transports,
//! speech engines and demo applications, selects the configured backends and
//! runs one application until it finishes, the line hangs up or CTRL-C arrives.
//!
//! Exit codes: 0 normal end, 1 fatal error, 2 unusable `AUI_MODE`, 130 CTRL-C.

mod apps;

use anyhow::Context;
use aui_core::{AuiConfig, Extensions, Orchestrator, TransportMode};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_FATAL: u8 = 1;
const EXIT_BAD_MODE: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Finished,
    HungUp,
    Interrupted,
}

impl Ending {
    fn exit_code(self) -> u8 {
        match self {
            Ending::Finished | Ending::HungUp => 0,
            Ending::Interrupted => EXIT_INTERRUPTED,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[aui] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AuiConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::from(EXIT_BAD_MODE);
        }
    };
    if config.mode == TransportMode::Ari {
        tracing::error!("AUI_MODE=ari: the telephony transport is not part of this build");
        return ExitCode::from(EXIT_BAD_MODE);
    }

    tracing::info!(
        mode = config.mode.as_str(),
        adapter = %config.adapter,
        tts = %config.tts,
        app = %config.app,
        "AUI daemon starting"
    );

    match run(&config).await {
        Ok(ending) => {
            tracing::info!(?ending, "AUI daemon stopped");
            ExitCode::from(ending.exit_code())
        }
        Err(e) => {
            tracing::error!(error = ?e, "AUI daemon failed");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn extensions(config: &AuiConfig) -> Extensions {
    let extensions = Extensions::new(&config.groups);
    aui_voice::register_defaults(&extensions);
    apps::register_apps(&extensions);
    extensions
}

async fn run(config: &AuiConfig) -> anyhow::Result<Ending> {
    let orchestrator = Orchestrator::new(&extensions(config), config.session);
    for (domain, names) in orchestrator.list_all() {
        tracing::debug!(domain, available = ?names, "backends discovered");
    }

    if let Err(e) = start(&orchestrator, config).await {
        orchestrator.shutdown().await;
        return Err(e);
    }

    let ending = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("CTRL-C received; shutting down");
            Ending::Interrupted
        }
        _ = orchestrator.wait_app() => Ending::Finished,
        _ = orchestrator.wait_hangup() => {
            tracing::info!("line hung up");
            Ending::HungUp
        }
    };
    orchestrator.shutdown().await;
    Ok(ending)
}

async fn start(orchestrator: &Orchestrator, config: &AuiConfig) -> anyhow::Result<()> {
    orchestrator
        .select_backends_with(
            Some((config.adapter.as_str(), &config.adapter_args)),
            Some((config.tts.as_str(), &config.tts_args)),
        )
        .await
        .context("selecting backends")?;
    orchestrator
        .start_app(&config.app)
        .await
        .with_context(|| format!("starting application '{}'", config.app))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn headless(vars: &[(&str, &str)]) -> AuiConfig {
        let mut all = vec![
            ("AUI_MODE", "null"),
            ("AUI_ADAPTER_ARG_SPEED", "50"),
            ("AUI_TTS_ARG_WORD_MS", "10"),
        ];
        all.extend_from_slice(vars);
        AuiConfig::from_vars(all.iter().map(|(k, v)| (k.to_string(), v.to_string()))).unwrap()
    }

    #[tokio::test]
    async fn headless_menu_runs_to_completion() {
        let config = headless(&[("AUI_ADAPTER_ARG_DIGITS", "0")]);
        let ending = tokio::time::timeout(Duration::from_secs(5), run(&config))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ending, Ending::Finished);
    }

    #[tokio::test]
    async fn hangup_ends_the_session() {
        let config = headless(&[("AUI_APP", "echo"), ("AUI_ADAPTER_ARG_HANGUP_MS", "100")]);
        let ending = tokio::time::timeout(Duration::from_secs(5), run(&config))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ending, Ending::HungUp);
    }

    #[tokio::test]
    async fn unknown_application_is_fatal() {
        let config = headless(&[("AUI_APP", "voicemail")]);
        let err = run(&config).await.unwrap_err();
        assert!(format!("{:#}", err).contains("voicemail"));
    }

    #[tokio::test]
    async fn unknown_speech_engine_is_fatal() {
        let config = headless(&[("AUI_TTS", "festival")]);
        assert!(run(&config).await.is_err());
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Ending::Finished.exit_code(), 0);
        assert_eq!(Ending::HungUp.exit_code(), 0);
        assert_eq!(Ending::Interrupted.exit_code(), 130);
    }
}
