//! Plugin registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Lifecycle manager settings.
///
/// Every field is optional in the source files; omitted fields take the
/// defaults below. Resource thresholds are advisory: exceeding them is
/// reported, never enforced.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Whether `reload` is permitted at all.
    #[serde(default = "default_true")]
    pub enable_hot_reload: bool,
    /// Whether reported resource usage is compared against the thresholds.
    #[serde(default = "default_true")]
    pub enable_resource_monitoring: bool,
    /// Advisory memory ceiling per plugin, in megabytes.
    pub max_memory_usage_mb: Option<u64>,
    /// Advisory CPU ceiling per plugin, in percent.
    #[validate(range(min = 0.0, max = 100.0))]
    pub max_cpu_usage_percent: Option<f64>,
    /// Whether `load` walks the dependency graph looking for cycles.
    #[serde(default = "default_true")]
    pub enable_circular_dependency_detection: bool,
    /// Time a plugin's stop hook is given before the stop is declared failed.
    #[serde(default = "default_graceful_shutdown_timeout_ms")]
    #[validate(range(min = 1))]
    pub graceful_shutdown_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enable_hot_reload: default_true(),
            enable_resource_monitoring: default_true(),
            max_memory_usage_mb: None,
            max_cpu_usage_percent: None,
            enable_circular_dependency_detection: default_true(),
            graceful_shutdown_timeout_ms: default_graceful_shutdown_timeout_ms(),
        }
    }
}

impl RegistryConfig {
    /// The graceful shutdown timeout as a [`Duration`].
    pub fn graceful_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_shutdown_timeout_ms)
    }

    /// Returns a copy with hot reload switched on or off.
    pub fn with_hot_reload(mut self, enabled: bool) -> Self {
        self.enable_hot_reload = enabled;
        self
    }

    /// Returns a copy with a different graceful shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_shutdown_timeout_ms = u64::try_from(timeout.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_graceful_shutdown_timeout_ms() -> u64 {
    5000
}
