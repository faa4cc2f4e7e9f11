//! Error type for registry operations.
//!
//! Admission failures are raised before any record is created. Hook failures
//! and shutdown timeouts are raised after the record has moved to `ERROR`.
//! Every variant maps onto `pluginhost_core::error::AppError`.

use pluginhost_core::error::AppError;
use thiserror::Error;

use crate::state::{LifecycleOperation, PluginState};

/// Errors surfaced by [`PluginRegistry`](crate::registry::PluginRegistry) operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A plugin with the same name is already registered.
    #[error("Plugin '{name}' is already loaded")]
    AlreadyLoaded {
        /// The duplicate name.
        name: String,
    },

    /// A declared dependency is not registered.
    #[error("Plugin '{plugin}' depends on '{dependency}', which is not loaded")]
    MissingDependency {
        /// The plugin being admitted.
        plugin: String,
        /// The dependency that could not be found.
        dependency: String,
    },

    /// A declared dependency is registered but sitting in the error state.
    #[error("Plugin '{plugin}' depends on '{dependency}', which is in the error state")]
    DependencyInError {
        /// The plugin being admitted.
        plugin: String,
        /// The errored dependency.
        dependency: String,
    },

    /// Admitting the plugin would close a dependency cycle.
    #[error("Circular dependency detected for plugin '{plugin}': {}", cycle.join(" -> "))]
    CircularDependency {
        /// The plugin being admitted.
        plugin: String,
        /// The cycle, starting and ending at the same name.
        cycle: Vec<String>,
    },

    /// No plugin with this name is registered.
    #[error("Plugin '{name}' not found")]
    NotFound {
        /// The unknown name.
        name: String,
    },

    /// The operation is not permitted from the plugin's current state.
    #[error("Cannot {operation} plugin '{name}' while it is {state}")]
    InvalidState {
        /// The plugin name.
        name: String,
        /// The rejected operation.
        operation: LifecycleOperation,
        /// The state the plugin was in.
        state: PluginState,
    },

    /// Hot reload is switched off in configuration.
    #[error("Hot reload is disabled; cannot reload plugin '{name}'")]
    HotReloadDisabled {
        /// The plugin the caller tried to reload.
        name: String,
    },

    /// A plugin hook returned an error or panicked.
    #[error("Plugin '{name}' failed to {operation}: {message}")]
    HookFailed {
        /// The plugin name.
        name: String,
        /// The lifecycle step whose hook failed.
        operation: LifecycleOperation,
        /// The failure reported by the hook.
        message: String,
    },

    /// The stop hook did not settle within the graceful shutdown timeout.
    #[error("Plugin '{name}' did not stop within {timeout_ms}ms")]
    ShutdownTimeout {
        /// The plugin name.
        name: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },
}

impl RegistryError {
    /// Whether this error was raised while admitting a plugin, before any
    /// record was created.
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyLoaded { .. }
                | Self::MissingDependency { .. }
                | Self::DependencyInError { .. }
                | Self::CircularDependency { .. }
        )
    }

    /// Name of the plugin this error concerns.
    pub fn plugin_name(&self) -> &str {
        match self {
            Self::AlreadyLoaded { name }
            | Self::NotFound { name }
            | Self::InvalidState { name, .. }
            | Self::HotReloadDisabled { name }
            | Self::HookFailed { name, .. }
            | Self::ShutdownTimeout { name, .. } => name,
            Self::MissingDependency { plugin, .. }
            | Self::DependencyInError { plugin, .. }
            | Self::CircularDependency { plugin, .. } => plugin,
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match &err {
            RegistryError::AlreadyLoaded { .. } | RegistryError::InvalidState { .. } => {
                AppError::conflict(err.to_string())
            }
            RegistryError::MissingDependency { .. }
            | RegistryError::DependencyInError { .. }
            | RegistryError::CircularDependency { .. } => AppError::validation(err.to_string()),
            RegistryError::NotFound { .. } => AppError::not_found(err.to_string()),
            RegistryError::HotReloadDisabled { .. } => {
                AppError::service_unavailable(err.to_string())
            }
            RegistryError::HookFailed { .. } => AppError::plugin(err.to_string()),
            RegistryError::ShutdownTimeout { .. } => AppError::timeout(err.to_string()),
        }
    }
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
