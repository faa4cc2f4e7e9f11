//! Event definitions with typed payloads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::metadata::ResourceUsage;
use crate::state::{LifecycleOperation, PluginState};

/// The key subscribers register under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A plugin was admitted.
    Loaded,
    /// A plugin was removed.
    Unloaded,
    /// A plugin's state changed.
    StateChanged,
    /// A hot reload completed.
    Reloaded,
    /// A hook failed or timed out.
    Error,
    /// Reported resource usage crossed an advisory threshold.
    ResourceThresholdExceeded,
    /// A caller-defined event, keyed by name.
    Custom(String),
}

impl EventKind {
    /// Returns the string name of this event kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Loaded => "plugin_loaded",
            Self::Unloaded => "plugin_unloaded",
            Self::StateChanged => "state_changed",
            Self::Reloaded => "plugin_reloaded",
            Self::Error => "plugin_error",
            Self::ResourceThresholdExceeded => "resource_threshold_exceeded",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Union of all event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A plugin was admitted.
    Loaded {
        /// Plugin name.
        plugin: String,
        /// Plugin version.
        version: String,
    },
    /// A plugin was removed.
    Unloaded {
        /// Plugin name.
        plugin: String,
    },
    /// A plugin's state changed.
    StateChanged {
        /// Plugin name.
        plugin: String,
        /// State before the transition.
        from: PluginState,
        /// State after the transition.
        to: PluginState,
    },
    /// A hot reload completed.
    Reloaded {
        /// Plugin name.
        plugin: String,
        /// Restart count after the reload.
        restart_count: u64,
        /// Whether the plugin's own reload hook was used.
        custom_hook: bool,
    },
    /// A hook failed or timed out.
    Error {
        /// Plugin name.
        plugin: String,
        /// The step that failed.
        operation: LifecycleOperation,
        /// Failure message.
        message: String,
    },
    /// Reported resource usage crossed an advisory threshold.
    ResourceThresholdExceeded {
        /// Plugin name.
        plugin: String,
        /// The usage that was reported.
        usage: ResourceUsage,
    },
    /// A caller-defined event.
    Custom {
        /// Event name; subscribers match on `EventKind::Custom(name)`.
        name: String,
        /// Arbitrary payload.
        data: Value,
    },
}

impl EventPayload {
    /// The kind subscribers receive this payload under.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Loaded { .. } => EventKind::Loaded,
            Self::Unloaded { .. } => EventKind::Unloaded,
            Self::StateChanged { .. } => EventKind::StateChanged,
            Self::Reloaded { .. } => EventKind::Reloaded,
            Self::Error { .. } => EventKind::Error,
            Self::ResourceThresholdExceeded { .. } => EventKind::ResourceThresholdExceeded,
            Self::Custom { name, .. } => EventKind::Custom(name.clone()),
        }
    }

    /// The plugin this payload concerns, if any.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::Loaded { plugin, .. }
            | Self::Unloaded { plugin }
            | Self::StateChanged { plugin, .. }
            | Self::Reloaded { plugin, .. }
            | Self::Error { plugin, .. }
            | Self::ResourceThresholdExceeded { plugin, .. } => Some(plugin),
            Self::Custom { .. } => None,
        }
    }
}

/// Wrapper for all registry events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub payload: EventPayload,
}

impl RegistryEvent {
    /// Create a new event.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Create a caller-defined event.
    pub fn custom(name: impl Into<String>, data: Value) -> Self {
        Self::new(EventPayload::Custom {
            name: name.into(),
            data,
        })
    }

    /// The kind subscribers receive this event under.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
