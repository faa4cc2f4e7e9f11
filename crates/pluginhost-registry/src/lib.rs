//! # pluginhost-registry
//!
//! In-process plugin lifecycle manager. Provides:
//!
//! - Plugin lifecycle management (load, initialize, start, stop, reload, unload)
//! - Dependency validation and cycle detection at admission
//! - Bounded shutdown with cooperative cancellation of slow stop hooks
//! - A typed, fault-isolating event bus for lifecycle observers
//! - Aggregate health reporting

pub mod error;
pub mod events;
pub mod graph;
pub mod health;
pub mod lifecycle;
pub mod metadata;
pub mod plugin;
pub mod prelude;
pub mod registry;
pub mod reload;
pub mod state;
pub mod store;

pub use error::{RegistryError, RegistryResult};
pub use events::{EventBus, EventKind, EventPayload, RegistryEvent};
pub use health::HealthReport;
pub use metadata::{PluginMetadata, ResourceUsage};
pub use plugin::{HookResult, Plugin};
pub use registry::PluginRegistry;
pub use state::{LifecycleOperation, PluginState};
