//! Hot reload: re-prepares a plugin in place without the caller sequencing
//! stop/initialize/start by hand.

use tracing::{info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::events::EventPayload;
use crate::lifecycle::run_hook;
use crate::registry::PluginRegistry;
use crate::state::{LifecycleOperation, PluginState};

impl PluginRegistry {
    /// Reloads a plugin, restoring whether it was running.
    ///
    /// A started plugin is stopped first (under the usual shutdown timeout).
    /// Plugins with a custom reload hook have it invoked and their restart
    /// count incremented; others have their initialize hook re-run without
    /// re-checking dependencies. A plugin that was started is started again.
    ///
    /// Any failing step leaves the plugin in `ERROR` and returns the failure;
    /// the pre-reload state is not restored. Refused outright, with no hook
    /// calls, when hot reload is disabled.
    pub async fn reload_plugin(&self, name: &str) -> RegistryResult<()> {
        if !self.config.enable_hot_reload {
            warn!(plugin = %name, "Reload refused: hot reload is disabled");
            return Err(RegistryError::HotReloadDisabled {
                name: name.to_string(),
            });
        }

        let _guard = self.lock(name).await;
        let (plugin, state) = self.lookup(name).await?;
        let was_started = state.is_running();

        if was_started {
            self.stop_locked(name).await?;
        }

        let custom_hook = plugin.supports_reload();
        if custom_hook {
            if let Err(message) = run_hook(plugin.reload()).await {
                self.record_failure(name, LifecycleOperation::Reload, &message)
                    .await;
                return Err(RegistryError::HookFailed {
                    name: name.to_string(),
                    operation: LifecycleOperation::Reload,
                    message,
                });
            }
            self.store
                .update(name, |meta| meta.restart_count += 1)
                .await;
            self.complete_hook(name, PluginState::Initialized).await;
        } else {
            self.initialize_locked(name, &plugin).await?;
        }

        if was_started {
            self.start_locked(name).await?;
        }

        let restart_count = self
            .store
            .metadata(name)
            .await
            .map(|meta| meta.restart_count)
            .unwrap_or_default();
        info!(plugin = %name, custom_hook, restart_count, "Plugin reloaded");
        self.publish(EventPayload::Reloaded {
            plugin: name.to_string(),
            restart_count,
            custom_hook,
        });
        Ok(())
    }
}
