//! Backend discovery: named factories published in extension groups.
//!
//! An [`ExtensionGroup`] is the namespace backends are published into at startup
//! (see `aui_voice::catalog`). A [`Registry`] discovers a group once, caches the
//! name → factory table and constructs instances on demand. Instances are built
//! but never started here; that is the manager's job.

use crate::config::GroupNames;
use crate::error::{AuiError, AuiResult};
use crate::traits::{Adapter, Application, InitArgs, SpeechEngine};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Constructs a backend from its init arguments.
pub type Factory<T> = Arc<dyn Fn(&InitArgs) -> AuiResult<Arc<T>> + Send + Sync>;

/// Returns the capability names a constructed instance lacks.
pub type ContractCheck<T> = fn(&T) -> Vec<&'static str>;

/// A published backend: name plus loader.
pub struct RegistryEntry<T: ?Sized> {
    pub name: String,
    pub loader: Factory<T>,
}

impl<T: ?Sized> Clone for RegistryEntry<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            loader: Arc::clone(&self.loader),
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Named namespace backends are published into.
pub struct ExtensionGroup<T: ?Sized> {
    name: String,
    entries: RwLock<Vec<RegistryEntry<T>>>,
}

impl<T: ?Sized> ExtensionGroup<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish a factory. A later registration under the same name replaces the earlier one.
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn(&InitArgs) -> AuiResult<Arc<T>> + Send + Sync + 'static,
    {
        let name = normalize_name(name);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|e| e.name != name);
        debug!(group = %self.name, backend = %name, "backend published");
        entries.push(RegistryEntry {
            name,
            loader: Arc::new(factory),
        });
    }

    /// Snapshot of everything currently published.
    pub fn entries(&self) -> Vec<RegistryEntry<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Cached view of one extension group.
pub struct Registry<T: ?Sized> {
    group: Arc<ExtensionGroup<T>>,
    cache: RwLock<Option<BTreeMap<String, Factory<T>>>>,
    contract: Option<ContractCheck<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(group: Arc<ExtensionGroup<T>>) -> Self {
        Self {
            group,
            cache: RwLock::new(None),
            contract: None,
        }
    }

    /// Check every constructed instance with `check`; gaps are logged as warnings.
    pub fn with_contract(mut self, check: ContractCheck<T>) -> Self {
        self.contract = Some(check);
        self
    }

    pub fn group(&self) -> &str {
        self.group.name()
    }

    fn table(&self, refresh: bool) -> BTreeMap<String, Factory<T>> {
        if !refresh {
            if let Some(table) = self
                .cache
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
            {
                return table.clone();
            }
        }

        let table: BTreeMap<String, Factory<T>> = self
            .group
            .entries()
            .into_iter()
            .map(|e| (e.name, e.loader))
            .collect();
        debug!(group = %self.group.name(), count = table.len(), "extension group discovered");
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(table.clone());
        table
    }

    /// Names of all discovered backends, sorted. Discovery is cached unless `refresh`.
    pub fn list(&self, refresh: bool) -> Vec<String> {
        self.table(refresh).into_keys().collect()
    }

    /// Construct (without starting) the backend called `name`.
    pub fn make(&self, name: &str, args: &InitArgs) -> AuiResult<Arc<T>> {
        let key = normalize_name(name);
        let table = self.table(false);
        let factory = table.get(&key).ok_or_else(|| AuiError::BackendNotFound {
            group: self.group.name().to_string(),
            name: name.to_string(),
            available: table.keys().cloned().collect(),
        })?;

        let instance = factory(args)?;
        if let Some(check) = self.contract {
            let missing = check(instance.as_ref());
            if !missing.is_empty() {
                warn!(
                    group = %self.group.name(),
                    backend = %key,
                    missing = ?missing,
                    "backend lacks a capability; those calls fail with MissingCapability"
                );
            }
        }
        Ok(instance)
    }
}

/// Contract check used for adapter registries.
pub fn adapter_contract(adapter: &dyn Adapter) -> Vec<&'static str> {
    adapter.io().missing()
}

/// The three extension groups of a process, populated at startup and handed to
/// the orchestrator by reference.
pub struct Extensions {
    pub adapters: Arc<ExtensionGroup<dyn Adapter>>,
    pub speech: Arc<ExtensionGroup<dyn SpeechEngine>>,
    pub apps: Arc<ExtensionGroup<dyn Application>>,
}

impl Extensions {
    pub fn new(names: &GroupNames) -> Self {
        Self {
            adapters: Arc::new(ExtensionGroup::new(names.adapters.clone())),
            speech: Arc::new(ExtensionGroup::new(names.tts.clone())),
            apps: Arc::new(ExtensionGroup::new(names.apps.clone())),
        }
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::new(&GroupNames::default())
    }
}
