//! Per-plugin bookkeeping owned by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plugin::Plugin;
use crate::state::PluginState;

/// Resource consumption reported by an external monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Resident memory in megabytes.
    pub memory_mb: u64,
    /// CPU utilisation in percent.
    pub cpu_percent: f64,
}

/// Registry-owned record for a loaded plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin name, copied at load time.
    pub name: String,
    /// Plugin version, copied at load time.
    pub version: String,
    /// Declared dependencies, copied at load time.
    pub dependencies: Vec<String>,
    /// Current lifecycle state.
    pub state: PluginState,
    /// When the plugin was admitted.
    pub loaded_at: DateTime<Utc>,
    /// When a hook last completed successfully.
    pub last_activity: DateTime<Utc>,
    /// Number of failed hook invocations. Never decreases.
    pub error_count: u64,
    /// Number of successful custom reloads. Never decreases.
    pub restart_count: u64,
    /// Most recent hook failure message.
    pub last_error: Option<String>,
    /// Last usage reported by the external monitor.
    pub resource_usage: Option<ResourceUsage>,
    /// Admission order, used for stable listing.
    #[serde(skip)]
    pub(crate) sequence: u64,
}

impl PluginMetadata {
    /// Creates a fresh record in the `LOADED` state.
    pub(crate) fn new(plugin: &dyn Plugin, sequence: u64) -> Self {
        let now = Utc::now();
        Self {
            name: plugin.name().to_string(),
            version: plugin.version().to_string(),
            dependencies: plugin.dependencies(),
            state: PluginState::Loaded,
            loaded_at: now,
            last_activity: now,
            error_count: 0,
            restart_count: 0,
            last_error: None,
            resource_usage: None,
            sequence,
        }
    }

    /// Records a successful hook completion.
    pub(crate) fn touch(&mut self, state: PluginState) {
        self.state = state;
        self.last_activity = Utc::now();
    }

    /// Records a failed hook invocation.
    pub(crate) fn fail(&mut self, message: &str) {
        self.state = PluginState::Error;
        self.error_count += 1;
        self.last_error = Some(message.to_string());
    }
}
