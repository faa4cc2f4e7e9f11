//! Registry store: loaded plugin instances and their metadata.
//!
//! The two maps are kept in lock-step: a name is present in one iff it is
//! present in the other. Writers take both locks, always plugins first.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::metadata::PluginMetadata;
use crate::plugin::Plugin;
use crate::state::PluginState;

/// Storage for registered plugins.
#[derive(Debug, Default)]
pub struct PluginStore {
    /// Plugin name → plugin instance.
    plugins: RwLock<HashMap<String, Arc<dyn Plugin>>>,
    /// Plugin name → metadata.
    metadata: RwLock<HashMap<String, PluginMetadata>>,
    /// Next admission sequence number.
    sequence: AtomicU64,
}

impl PluginStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a plugin with a fresh `LOADED` record.
    ///
    /// Returns `false` without touching either map if the name is taken.
    pub async fn insert(&self, plugin: Arc<dyn Plugin>) -> bool {
        let name = plugin.name().to_string();

        let mut plugins = self.plugins.write().await;
        let mut metadata = self.metadata.write().await;

        if plugins.contains_key(&name) {
            return false;
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        metadata.insert(name.clone(), PluginMetadata::new(plugin.as_ref(), sequence));
        plugins.insert(name, plugin);
        true
    }

    /// Removes a plugin and its record.
    pub async fn remove(&self, name: &str) -> Option<(Arc<dyn Plugin>, PluginMetadata)> {
        let mut plugins = self.plugins.write().await;
        let mut metadata = self.metadata.write().await;

        let plugin = plugins.remove(name)?;
        let meta = metadata.remove(name)?;
        Some((plugin, meta))
    }

    /// Gets a plugin instance by name.
    pub async fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let plugins = self.plugins.read().await;
        plugins.get(name).cloned()
    }

    /// Gets a copy of a plugin's record.
    pub async fn metadata(&self, name: &str) -> Option<PluginMetadata> {
        let metadata = self.metadata.read().await;
        metadata.get(name).cloned()
    }

    /// Gets a plugin's current state.
    pub async fn state(&self, name: &str) -> Option<PluginState> {
        let metadata = self.metadata.read().await;
        metadata.get(name).map(|meta| meta.state)
    }

    /// Applies `f` to a plugin's record and returns the updated copy.
    pub async fn update<F>(&self, name: &str, f: F) -> Option<PluginMetadata>
    where
        F: FnOnce(&mut PluginMetadata),
    {
        let mut metadata = self.metadata.write().await;
        let meta = metadata.get_mut(name)?;
        f(meta);
        Some(meta.clone())
    }

    /// Copies every record, in admission order.
    pub async fn all_metadata(&self) -> Vec<PluginMetadata> {
        let metadata = self.metadata.read().await;
        let mut records: Vec<PluginMetadata> = metadata.values().cloned().collect();
        records.sort_by_key(|meta| meta.sequence);
        records
    }

    /// Copies the metadata map for graph checks.
    pub async fn metadata_map(&self) -> HashMap<String, PluginMetadata> {
        let metadata = self.metadata.read().await;
        metadata.clone()
    }

    /// Checks whether a plugin is registered.
    pub async fn contains(&self, name: &str) -> bool {
        let plugins = self.plugins.read().await;
        plugins.contains_key(name)
    }

    /// Returns plugin count.
    pub async fn count(&self) -> usize {
        let plugins = self.plugins.read().await;
        plugins.len()
    }
}
