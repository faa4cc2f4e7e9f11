//! Lifecycle states and the operations that move a plugin between them.
//!
//! ```text
//! DISCOVERED ──load──▶ LOADED ──initialize──▶ INITIALIZED ──start──▶ STARTED
//!                                                 ▲                    │
//!                                                 │                  stop
//!                                               start                  ▼
//!                                                 └──── STOPPED ◀── STOPPING
//!
//! any failed hook ──▶ ERROR ──reload──▶ INITIALIZED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// The state of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginState {
    /// Known to the host but not yet registered. No registry record carries
    /// this state; it exists for callers that track candidates.
    Discovered,
    /// Registered, initialize hook not yet settled.
    Loaded,
    /// Initialize (or reload) hook succeeded.
    Initialized,
    /// Start hook succeeded.
    Started,
    /// Stop hook in flight.
    Stopping,
    /// Stop hook succeeded.
    Stopped,
    /// The most recent hook failed or timed out.
    Error,
}

impl PluginState {
    /// All states, in lifecycle order.
    pub const ALL: [PluginState; 7] = [
        Self::Discovered,
        Self::Loaded,
        Self::Initialized,
        Self::Started,
        Self::Stopping,
        Self::Stopped,
        Self::Error,
    ];

    /// Returns the canonical upper-case name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "DISCOVERED",
            Self::Loaded => "LOADED",
            Self::Initialized => "INITIALIZED",
            Self::Started => "STARTED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
        }
    }

    /// Whether `start` is permitted from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Initialized | Self::Stopped)
    }

    /// Whether `stop` has any work to do from this state.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Started)
    }

    /// Whether the plugin is unhealthy.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle step, used in errors, events, and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleOperation {
    /// Admission into the registry.
    Load,
    /// The plugin's initialize hook.
    Initialize,
    /// The plugin's start hook.
    Start,
    /// The plugin's stop hook.
    Stop,
    /// Hot reload (custom hook or initialize fallback).
    Reload,
    /// Removal from the registry.
    Unload,
}

impl LifecycleOperation {
    /// Returns the lower-case verb for this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Initialize => "initialize",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reload => "reload",
            Self::Unload => "unload",
        }
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
