//! Prelude for convenient imports when writing plugins.

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

pub use crate::error::{RegistryError, RegistryResult};
pub use crate::events::{EventKind, EventPayload, RegistryEvent};
pub use crate::metadata::{PluginMetadata, ResourceUsage};
pub use crate::plugin::{HookResult, Plugin};
pub use crate::registry::PluginRegistry;
pub use crate::state::PluginState;
pub use pluginhost_core::config::RegistryConfig;
