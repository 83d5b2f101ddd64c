//! Orchestrator: composes the adapter, speech-engine and application managers.
//!
//! All backend changes go through one async lock. Adapter swaps happen before
//! speech-engine swaps, the session context is rebuilt whenever both are present,
//! and shutdown runs application → speech engine → adapter.

use crate::config::SessionOptions;
use crate::context::SessionContext;
use crate::error::{AuiError, AuiResult};
use crate::manager::BackendManager;
use crate::registry::{adapter_contract, Extensions, Registry};
use crate::traits::{Adapter, AppMeta, Application, InitArgs, SessionIo, SpeechEngine};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const ADAPTER_DOMAIN: &str = "adapter";
pub const TTS_DOMAIN: &str = "tts";
pub const APP_DOMAIN: &str = "app";

#[derive(Default)]
struct State {
    ctx: Option<SessionContext>,
}

pub struct Orchestrator {
    adapters: BackendManager<dyn Adapter>,
    speech: BackendManager<dyn SpeechEngine>,
    apps: BackendManager<dyn Application>,
    options: SessionOptions,
    state: Mutex<State>,
}

impl Orchestrator {
    pub fn new(extensions: &Extensions, options: SessionOptions) -> Self {
        let adapters =
            Registry::new(Arc::clone(&extensions.adapters)).with_contract(adapter_contract);
        Self {
            adapters: BackendManager::new(ADAPTER_DOMAIN, adapters),
            speech: BackendManager::new(
                TTS_DOMAIN,
                Registry::new(Arc::clone(&extensions.speech)),
            ),
            apps: BackendManager::new(APP_DOMAIN, Registry::new(Arc::clone(&extensions.apps))),
            options,
            state: Mutex::new(State::default()),
        }
    }

    /// Name of the current adapter, if any.
    pub async fn adapter_name(&self) -> Option<String> {
        self.adapters.current_name().await
    }

    /// Name of the current speech engine, if any.
    pub async fn tts_name(&self) -> Option<String> {
        self.speech.current_name().await
    }

    /// Name of the running application, if any.
    pub async fn app_name(&self) -> Option<String> {
        self.apps.current_name().await
    }

    /// Select backends by name with empty init arguments.
    pub async fn select_backends(
        &self,
        adapter: Option<&str>,
        tts: Option<&str>,
    ) -> AuiResult<()> {
        let empty = InitArgs::new();
        self.select_backends_with(adapter.map(|a| (a, &empty)), tts.map(|t| (t, &empty)))
            .await
    }

    /// Swap the adapter, then the speech engine, and rebuild the session context
    /// if both are now present.
    ///
    /// A failing swap is returned after the context has been reconciled: any
    /// swap that touched an instance (even one rolled back) replaces the context.
    pub async fn select_backends_with(
        &self,
        adapter: Option<(&str, &InitArgs)>,
        tts: Option<(&str, &InitArgs)>,
    ) -> AuiResult<()> {
        let mut state = self.state.lock().await;
        let before = (self.adapters.generation().await, self.speech.generation().await);

        let mut swapped = Ok(());
        if let Some((name, args)) = adapter {
            swapped = self.adapters.set_current(name, Some(args)).await.map(drop);
        }
        if let Some((name, args)) = tts.filter(|_| swapped.is_ok()) {
            swapped = self.speech.set_current(name, Some(args)).await.map(drop);
        }

        let after = (self.adapters.generation().await, self.speech.generation().await);
        let rebuilt = self.reconcile(&mut state, before != after).await;
        swapped.and(rebuilt)
    }

    /// Replace the session context after a swap; keep it when nothing changed.
    async fn reconcile(&self, state: &mut State, changed: bool) -> AuiResult<()> {
        if !changed && state.ctx.is_some() {
            debug!("backend selection unchanged; keeping session context");
            return Ok(());
        }

        if let Some(old) = state.ctx.take() {
            old.close();
            if self.apps.current().await.is_some() {
                warn!("session context rebuilt while an application holds the previous one");
            }
        }
        if self.adapters.current().await.is_some() && self.speech.current().await.is_some() {
            state.ctx = Some(self.build_context().await?);
            info!(
                adapter = ?self.adapters.current_name().await,
                tts = ?self.speech.current_name().await,
                "session context ready"
            );
        }
        Ok(())
    }

    async fn build_context(&self) -> AuiResult<SessionContext> {
        let (Some(adapter), Some(tts)) =
            (self.adapters.current().await, self.speech.current().await)
        else {
            return Err(AuiError::ContextUnavailable);
        };
        let io = SessionIo::assemble(adapter.io(), tts)?;
        Ok(SessionContext::new(io, self.options))
    }

    /// Stop the running application (if any), then construct, initialise and
    /// start `name` with the session context.
    pub async fn start_app(&self, name: &str) -> AuiResult<()> {
        let mut state = self.state.lock().await;
        self.apps.stop_current().await;

        let ctx = match &state.ctx {
            Some(ctx) => ctx.clone(),
            None => {
                let ctx = self.build_context().await?;
                state.ctx = Some(ctx.clone());
                ctx
            }
        };

        let app = self.apps.make(name, &InitArgs::new())?;
        app.init(ctx).await?;
        self.apps.install(name, app).await?;
        info!(app = %name.trim(), "application running");
        Ok(())
    }

    /// Stop the running application. Returns whether one was running.
    pub async fn stop_app(&self) -> bool {
        let _state = self.state.lock().await;
        self.apps.stop_current().await
    }

    /// Resolves when the current application finishes on its own; immediately
    /// when none is running.
    pub async fn wait_app(&self) {
        if let Some(app) = self.apps.current().await {
            app.finished().await;
        }
    }

    /// Resolves when the current adapter reports a hangup; never when none is selected.
    pub async fn wait_hangup(&self) {
        match self.adapters.current().await {
            Some(adapter) => adapter.hangup().await,
            None => std::future::pending::<()>().await,
        }
    }

    pub async fn current_context(&self) -> Option<SessionContext> {
        self.state.lock().await.ctx.clone()
    }

    /// Discovered backend names per domain.
    pub fn list_all(&self) -> BTreeMap<&'static str, Vec<String>> {
        BTreeMap::from([
            (ADAPTER_DOMAIN, self.adapters.list(false)),
            (TTS_DOMAIN, self.speech.list(false)),
            (APP_DOMAIN, self.apps.list(false)),
        ])
    }

    pub fn list_apps(&self) -> Vec<AppMeta> {
        self.apps.list_meta()
    }

    /// Application, then speech engine, then adapter. Every step is best-effort;
    /// the session context is cleared last.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        info!("shutting down");
        self.apps.stop_current().await;
        self.speech.stop_current().await;
        self.adapters.stop_current().await;
        if let Some(ctx) = state.ctx.take() {
            ctx.close();
        }
    }
}
