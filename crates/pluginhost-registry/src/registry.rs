//! Plugin registry: admits plugins, owns their records, and exposes the
//! lifecycle operations.
//!
//! Every operation on a given plugin name runs under that name's async mutex,
//! so at most one lifecycle operation per plugin is in flight; later callers
//! queue behind it. Operations on different names never contend.
//!
//! Start/stop live in [`lifecycle`](crate::lifecycle) and hot reload in
//! [`reload`](crate::reload); both extend this type.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use pluginhost_core::config::RegistryConfig;

use crate::error::{RegistryError, RegistryResult};
use crate::events::{EmitOutcome, EventBus, EventKind, EventPayload, RegistryEvent, SubscriptionId};
use crate::graph;
use crate::health::{self, HealthReport};
use crate::metadata::{PluginMetadata, ResourceUsage};
use crate::plugin::Plugin;
use crate::state::{LifecycleOperation, PluginState};
use crate::store::PluginStore;

/// Supervises the lifecycle of registered plugins.
///
/// Construct one explicitly and share it by reference (or `Arc`); any number
/// of independent registries may coexist.
#[derive(Debug)]
pub struct PluginRegistry {
    /// Registry settings.
    pub(crate) config: RegistryConfig,
    /// Plugin instances and records.
    pub(crate) store: PluginStore,
    /// Lifecycle observers.
    pub(crate) events: EventBus,
    /// Plugin name → operation lock.
    locks: DashMap<String, Arc<Mutex<()>>>,
    /// Stop hooks still running after their timeout elapsed.
    pub(crate) orphaned_stops: Arc<AtomicUsize>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            store: PluginStore::new(),
            events: EventBus::new(),
            locks: DashMap::new(),
            orphaned_stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the registry settings.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Waits for exclusive access to `name`.
    pub(crate) async fn lock(&self, name: &str) -> NameGuard<'_> {
        let lock = self.locks.entry(name.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        NameGuard {
            locks: &self.locks,
            name: name.to_string(),
            guard: Some(guard),
        }
    }

    /// Admits a plugin and runs its initialize hook.
    ///
    /// Admission checks (duplicate name, missing or errored dependencies,
    /// dependency cycles) run before anything is recorded. Once admitted, a
    /// failing initialize hook leaves the record in `ERROR` and returns the
    /// failure; the name stays taken until the plugin is unloaded or
    /// successfully reloaded.
    pub async fn load_plugin(&self, plugin: Arc<dyn Plugin>) -> RegistryResult<()> {
        let name = plugin.name().to_string();
        let _guard = self.lock(&name).await;

        if let Err(e) = self.admit(&name, plugin.as_ref()).await {
            warn!(plugin = %name, error = %e, "Plugin admission rejected");
            return Err(e);
        }

        let inserted = self.store.insert(plugin.clone()).await;
        debug_assert!(inserted, "admission let a duplicate name through");

        info!(
            plugin = %name,
            version = %plugin.version(),
            dependencies = ?plugin.dependencies(),
            "Plugin loaded"
        );
        self.publish(EventPayload::Loaded {
            plugin: name.clone(),
            version: plugin.version().to_string(),
        });

        self.initialize_locked(&name, &plugin).await
    }

    /// Runs the admission checks against the current records.
    async fn admit(&self, name: &str, plugin: &dyn Plugin) -> RegistryResult<()> {
        if self.store.contains(name).await {
            return Err(RegistryError::AlreadyLoaded {
                name: name.to_string(),
            });
        }

        let dependencies = plugin.dependencies();
        let records = self.store.metadata_map().await;

        graph::check_dependencies(name, &dependencies, |dep| {
            records.get(dep).map(|meta| meta.state)
        })?;

        if self.config.enable_circular_dependency_detection {
            let cycle = graph::find_cycle(name, &dependencies, |node| {
                records.get(node).map(|meta| meta.dependencies.clone())
            });
            if let Some(cycle) = cycle {
                return Err(RegistryError::CircularDependency {
                    plugin: name.to_string(),
                    cycle,
                });
            }
        }

        Ok(())
    }

    /// Removes a plugin, stopping it first if it is running.
    ///
    /// A failing stop does not prevent removal: the record is deleted and the
    /// stop error is returned afterwards.
    pub async fn unload_plugin(&self, name: &str) -> RegistryResult<()> {
        let _guard = self.lock(name).await;

        let state = self
            .store
            .state(name)
            .await
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })?;

        let dependents = graph::dependents_of(name, &self.store.all_metadata().await);
        if !dependents.is_empty() {
            warn!(plugin = %name, dependents = ?dependents, "Unloading a plugin other plugins depend on");
        }

        let stopped = if state.is_running() {
            self.stop_locked(name).await
        } else {
            Ok(())
        };
        if let Err(e) = &stopped {
            warn!(plugin = %name, error = %e, "Stop failed during unload; removing anyway");
        }

        self.store.remove(name).await;
        info!(plugin = %name, "Plugin unloaded");
        self.publish(EventPayload::Unloaded {
            plugin: name.to_string(),
        });

        stopped
    }

    /// Stops every running plugin and unloads everything.
    ///
    /// Plugins are handled dependents first, following the recorded
    /// dependency lists; unrelated plugins go in reverse admission order.
    /// Failures are collected rather than aborting the sweep.
    pub async fn shutdown_all(&self) -> Vec<RegistryError> {
        let mut failures = Vec::new();
        let order = graph::shutdown_order(&self.store.all_metadata().await);

        for name in &order {
            match self.stop_plugin(name).await {
                Ok(()) | Err(RegistryError::NotFound { .. }) => {}
                Err(e) => failures.push(e),
            }
        }

        for name in &order {
            match self.unload_plugin(name).await {
                Ok(()) | Err(RegistryError::NotFound { .. }) => {}
                Err(e) => failures.push(e),
            }
        }

        if failures.is_empty() {
            info!(count = order.len(), "All plugins shut down");
        } else {
            error!(
                count = order.len(),
                failures = failures.len(),
                "Plugin shutdown finished with failures"
            );
        }
        failures
    }

    /// Gets a copy of a plugin's record.
    pub async fn get_plugin_metadata(&self, name: &str) -> Option<PluginMetadata> {
        self.store.metadata(name).await
    }

    /// Lists every record in admission order.
    pub async fn get_all_plugins_metadata(&self) -> Vec<PluginMetadata> {
        self.store.all_metadata().await
    }

    /// Lists the records currently in `state`, in admission order.
    pub async fn get_plugins_by_state(&self, state: PluginState) -> Vec<PluginMetadata> {
        self.store
            .all_metadata()
            .await
            .into_iter()
            .filter(|meta| meta.state == state)
            .collect()
    }

    /// Gets a plugin instance by name.
    pub async fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.store.plugin(name).await
    }

    /// Checks whether a plugin is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.store.contains(name).await
    }

    /// Returns plugin count.
    pub async fn count(&self) -> usize {
        self.store.count().await
    }

    /// Names of registered plugins that depend on `name`.
    pub async fn dependents_of(&self, name: &str) -> Vec<String> {
        graph::dependents_of(name, &self.store.all_metadata().await)
    }

    /// Stores resource usage reported by an external monitor.
    ///
    /// Thresholds are advisory: a breach is logged and announced, never
    /// enforced.
    pub async fn record_resource_usage(&self, name: &str, usage: ResourceUsage) -> RegistryResult<()> {
        self.store
            .update(name, |meta| meta.resource_usage = Some(usage))
            .await
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })?;

        if self.config.enable_resource_monitoring && health::exceeds_threshold(&usage, &self.config) {
            warn!(
                plugin = %name,
                memory_mb = usage.memory_mb,
                cpu_percent = usage.cpu_percent,
                "Plugin over advisory resource threshold"
            );
            self.publish(EventPayload::ResourceThresholdExceeded {
                plugin: name.to_string(),
                usage,
            });
        }
        Ok(())
    }

    /// Subscribes a handler to an event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&RegistryEvent) -> Result<(), String> + Send + Sync + 'static,
    {
        self.events.on(kind, handler)
    }

    /// Removes a subscription.
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.events.off(id)
    }

    /// Delivers an event to its subscribers. Handler failures are logged,
    /// never returned.
    pub fn emit(&self, event: &RegistryEvent) -> EmitOutcome {
        self.events.emit(event)
    }

    /// Returns the event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Builds a structured health report.
    pub async fn health_report(&self) -> HealthReport {
        let records = self.store.all_metadata().await;
        HealthReport::build(&records, &self.config, self.orphaned_stop_count())
    }

    /// Renders the health report as text.
    pub async fn generate_health_report(&self) -> String {
        self.health_report().await.to_string()
    }

    /// Stop hooks that outlived their timeout and have not settled yet.
    pub fn orphaned_stop_count(&self) -> usize {
        self.orphaned_stops.load(Ordering::SeqCst)
    }

    /// Emits an event built from `payload`.
    pub(crate) fn publish(&self, payload: EventPayload) {
        self.events.emit(&RegistryEvent::new(payload));
    }

    /// Moves a plugin to `to` without counting it as hook activity.
    pub(crate) async fn enter_state(&self, name: &str, to: PluginState) {
        let mut from = None;
        self.store
            .update(name, |meta| {
                from = Some(meta.state);
                meta.state = to;
            })
            .await;
        self.announce_transition(name, from, to);
    }

    /// Records a successful hook and moves the plugin to `to`.
    pub(crate) async fn complete_hook(&self, name: &str, to: PluginState) {
        let mut from = None;
        self.store
            .update(name, |meta| {
                from = Some(meta.state);
                meta.touch(to);
            })
            .await;
        self.announce_transition(name, from, to);
    }

    /// Records a failed hook: state `ERROR`, error count incremented.
    pub(crate) async fn record_failure(&self, name: &str, operation: LifecycleOperation, message: &str) {
        let mut from = None;
        let updated = self
            .store
            .update(name, |meta| {
                from = Some(meta.state);
                meta.fail(message);
            })
            .await;

        if let Some(meta) = updated {
            error!(
                plugin = %name,
                operation = %operation,
                error_count = meta.error_count,
                error = %message,
                "Plugin hook failed"
            );
        }
        self.announce_transition(name, from, PluginState::Error);
        self.publish(EventPayload::Error {
            plugin: name.to_string(),
            operation,
            message: message.to_string(),
        });
    }

    fn announce_transition(&self, name: &str, from: Option<PluginState>, to: PluginState) {
        let Some(from) = from else {
            return;
        };
        if from == to {
            return;
        }
        debug!(plugin = %name, from = %from, to = %to, "Plugin state changed");
        self.publish(EventPayload::StateChanged {
            plugin: name.to_string(),
            from,
            to,
        });
    }
}

/// Exclusive hold on one plugin name.
///
/// On drop the name's entry leaves the lock table unless another caller is
/// already queued on it.
pub(crate) struct NameGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.name, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
