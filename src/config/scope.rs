//! Registered scopes and the handles callers read their config through.

use figment::value::Dict;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::env::EnvOverlay;
use super::format::ConfigFormat;
use super::resolve::{resolve, ScopeInputs};
use super::store::ResolvedStore;
use crate::error::Result;

/// Lifecycle of a scope. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Registered,
    Resolved,
    Dumped,
}

/// Caller-side reference to a scope's typed config.
///
/// Cloned into the registry at bind time and filled once the scope resolves.
pub struct ConfigHandle<T> {
    cell: Arc<OnceLock<T>>,
}

impl<T> ConfigHandle<T> {
    pub fn new() -> Self {
        Self { cell: Arc::new(OnceLock::new()) }
    }

    /// The resolved config, or `None` before resolution.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Identity of the shared cell, equal across clones.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.cell) as *const () as usize
    }

    fn fill(&self, value: T) -> bool {
        self.cell.set(value).is_ok()
    }
}

impl<T> Clone for ConfigHandle<T> {
    fn clone(&self) -> Self {
        Self { cell: Arc::clone(&self.cell) }
    }
}

impl<T> Default for ConfigHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ConfigHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigHandle").field(&self.cell.get()).finish()
    }
}

/// Type-erased view of a scope held by the registry.
pub(crate) trait PendingScope {
    fn name(&self) -> &str;
    fn state(&self) -> ScopeState;
    fn store(&self) -> Option<&ResolvedStore>;
    /// Identity of the target handle, see [`ConfigHandle::id`].
    fn target_id(&self) -> usize;
    /// Format declared for this scope, used when dumping to stdout.
    fn format(&self) -> ConfigFormat;
    fn resolve(&mut self, inputs: ScopeInputs, env: &EnvOverlay) -> Result<()>;
    fn mark_dumped(&mut self);
}

pub(crate) struct ConfigScope<T> {
    name: String,
    defaults: Dict,
    target: ConfigHandle<T>,
    inputs: ScopeInputs,
    store: Option<ResolvedStore>,
    state: ScopeState,
}

impl<T> ConfigScope<T> {
    pub(crate) fn new(name: &str, defaults: Dict, target: ConfigHandle<T>) -> Self {
        Self {
            name: name.to_string(),
            defaults,
            target,
            inputs: ScopeInputs::default(),
            store: None,
            state: ScopeState::Registered,
        }
    }
}

impl<T> PendingScope for ConfigScope<T>
where
    T: Serialize + DeserializeOwned,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ScopeState {
        self.state
    }

    fn store(&self) -> Option<&ResolvedStore> {
        self.store.as_ref()
    }

    fn target_id(&self) -> usize {
        self.target.id()
    }

    fn format(&self) -> ConfigFormat {
        self.inputs.format
    }

    fn resolve(&mut self, inputs: ScopeInputs, env: &EnvOverlay) -> Result<()> {
        if self.state != ScopeState::Registered {
            return Ok(());
        }
        let (store, target) = resolve::<T>(&self.name, &self.defaults, &inputs, env)?;
        self.inputs = inputs;
        self.store = Some(store);
        if !self.target.fill(target) {
            tracing::warn!("Config handle for scope '{}' was already filled", self.name);
        }
        self.state = ScopeState::Resolved;
        Ok(())
    }

    fn mark_dumped(&mut self) {
        self.state = ScopeState::Dumped;
    }
}
