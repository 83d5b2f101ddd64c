//! Backend Manager: owns at most one live instance per domain.
//!
//! One generic design serves the adapter, speech-engine and application domains.
//! The current-instance slot sits behind an async mutex that is held across the
//! whole swap, so a stop/start pair never interleaves with another swap of the
//! same domain.

use crate::error::{AuiError, AuiResult};
use crate::registry::Registry;
use crate::traits::{AppMeta, Application, Backend, InitArgs, Lifecycle};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

struct Slot<T: ?Sized> {
    name: Option<String>,
    instance: Option<Arc<T>>,
    /// Bumped by every swap that stopped or started an instance.
    generation: u64,
}

impl<T: ?Sized> Slot<T> {
    fn take(&mut self) -> Option<(String, Arc<T>)> {
        let name = self.name.take();
        let instance = self.instance.take();
        match (name, instance) {
            (Some(name), Some(instance)) => Some((name, instance)),
            (None, Some(instance)) => Some((String::new(), instance)),
            _ => None,
        }
    }

    fn set(&mut self, name: String, instance: Arc<T>) {
        self.name = Some(name);
        self.instance = Some(instance);
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Manager for one backend domain.
pub struct BackendManager<T: ?Sized> {
    domain: &'static str,
    registry: Registry<T>,
    slot: Mutex<Slot<T>>,
}

impl<T: ?Sized + Lifecycle> BackendManager<T> {
    pub fn new(domain: &'static str, registry: Registry<T>) -> Self {
        Self {
            domain,
            registry,
            slot: Mutex::new(Slot {
                name: None,
                instance: None,
                generation: 0,
            }),
        }
    }

    pub fn domain(&self) -> &'static str {
        self.domain
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    pub fn list(&self, refresh: bool) -> Vec<String> {
        self.registry.list(refresh)
    }

    /// Construct (without starting) a backend of this domain.
    pub fn make(&self, name: &str, args: &InitArgs) -> AuiResult<Arc<T>> {
        self.registry.make(name, args)
    }

    pub async fn current(&self) -> Option<Arc<T>> {
        self.slot.lock().await.instance.clone()
    }

    pub async fn current_name(&self) -> Option<String> {
        self.slot.lock().await.name.clone()
    }

    /// Changes whenever a swap stopped or started an instance, including swaps
    /// that failed and restored the previous one.
    pub async fn generation(&self) -> u64 {
        self.slot.lock().await.generation
    }

    /// Make an already constructed (and initialised) instance current: the
    /// previous instance is stopped, then `instance` is started.
    pub async fn install(&self, name: &str, instance: Arc<T>) -> AuiResult<()> {
        let mut slot = self.slot.lock().await;
        self.replace(&mut slot, normalize_name(name), instance).await
    }

    /// Stop and clear the current instance. Returns whether anything was current.
    ///
    /// A failing `stop()` is logged and absorbed; the slot is cleared regardless.
    pub async fn stop_current(&self) -> bool {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            Some((name, instance)) => {
                slot.generation += 1;
                self.stop_quietly(&name, instance.as_ref()).await;
                info!(domain = self.domain, backend = %name, "backend stopped");
                true
            }
            None => false,
        }
    }

    async fn stop_quietly(&self, name: &str, instance: &T) {
        if let Err(e) = instance.stop().await {
            let failure = AuiError::stop_failure(name, e);
            warn!(domain = self.domain, error = %failure, "stop failed; continuing");
        }
    }

    /// Swap while holding the slot lock.
    async fn replace(&self, slot: &mut Slot<T>, name: String, instance: Arc<T>) -> AuiResult<()> {
        let previous = slot.take();
        slot.generation += 1;
        if let Some((old_name, old)) = &previous {
            debug!(domain = self.domain, from = %old_name, to = %name, "swapping backend");
            self.stop_quietly(old_name, old.as_ref()).await;
        }

        match instance.start().await {
            Ok(()) => {
                info!(domain = self.domain, backend = %name, "backend started");
                slot.set(name, instance);
                Ok(())
            }
            Err(e) => {
                error!(
                    domain = self.domain,
                    backend = %name,
                    error = %e,
                    "backend failed to start"
                );
                if let Some((old_name, old)) = previous {
                    match old.start().await {
                        Ok(()) => {
                            warn!(
                                domain = self.domain,
                                backend = %old_name,
                                "previous backend restored"
                            );
                            slot.set(old_name, old);
                        }
                        Err(restart) => {
                            error!(
                                domain = self.domain,
                                backend = %old_name,
                                error = %restart,
                                "previous backend could not be restarted; none is current"
                            );
                        }
                    }
                }
                Err(AuiError::start_failure(name, e))
            }
        }
    }
}

impl<T: ?Sized + Backend> BackendManager<T> {
    /// Make `name` the current backend. Returns `false` when `name` already is
    /// current (no stop or start happens).
    ///
    /// The new instance is constructed and initialised before the old one is
    /// touched, so an unknown name or a failing `init` leaves the current
    /// instance running. A failing `start` is returned as `StartFailure`; the
    /// previous instance is restarted if possible, otherwise nothing is current.
    pub async fn set_current(&self, name: &str, args: Option<&InitArgs>) -> AuiResult<bool> {
        let key = normalize_name(name);
        let mut slot = self.slot.lock().await;
        if slot.name.as_deref() == Some(key.as_str()) {
            debug!(domain = self.domain, backend = %key, "already current; nothing to do");
            return Ok(false);
        }

        let empty = InitArgs::new();
        let args = args.unwrap_or(&empty);
        let instance = self.registry.make(&key, args)?;
        instance
            .init(args)
            .await
            .map_err(|e| AuiError::start_failure(key.clone(), e))?;

        self.replace(&mut slot, key, instance).await?;
        Ok(true)
    }
}

impl BackendManager<dyn Application> {
    /// Metadata of every discovered application. Applications that fail to
    /// construct are logged and skipped.
    pub fn list_meta(&self) -> Vec<AppMeta> {
        let args = InitArgs::new();
        self.registry
            .list(false)
            .into_iter()
            .filter_map(|name| match self.registry.make(&name, &args) {
                Ok(app) => Some(app.meta()),
                Err(e) => {
                    warn!(
                        domain = self.domain,
                        app = %name,
                        error = %e,
                        "cannot describe application"
                    );
                    None
                }
            })
            .collect()
    }
}
