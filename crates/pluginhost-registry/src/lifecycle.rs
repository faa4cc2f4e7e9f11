//! Lifecycle transitions: initialize, start, and the timed stop race.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::plugin::{HookResult, Plugin};
use crate::registry::PluginRegistry;
use crate::state::{LifecycleOperation, PluginState};

impl PluginRegistry {
    /// Starts a plugin that is `INITIALIZED` or `STOPPED`.
    pub async fn start_plugin(&self, name: &str) -> RegistryResult<()> {
        let _guard = self.lock(name).await;
        self.start_locked(name).await
    }

    /// Stops a `STARTED` plugin, giving its stop hook at most the graceful
    /// shutdown timeout.
    ///
    /// Calling this on a plugin in any other state is a no-op.
    pub async fn stop_plugin(&self, name: &str) -> RegistryResult<()> {
        let _guard = self.lock(name).await;
        self.stop_locked(name).await
    }

    /// Runs the initialize hook. The caller must hold the plugin's lock.
    pub(crate) async fn initialize_locked(&self, name: &str, plugin: &Arc<dyn Plugin>) -> RegistryResult<()> {
        match run_hook(plugin.initialize()).await {
            Ok(()) => {
                self.complete_hook(name, PluginState::Initialized).await;
                info!(plugin = %name, "Plugin initialized");
                Ok(())
            }
            Err(message) => {
                self.record_failure(name, LifecycleOperation::Initialize, &message)
                    .await;
                Err(RegistryError::HookFailed {
                    name: name.to_string(),
                    operation: LifecycleOperation::Initialize,
                    message,
                })
            }
        }
    }

    /// Runs the start hook. The caller must hold the plugin's lock.
    pub(crate) async fn start_locked(&self, name: &str) -> RegistryResult<()> {
        let (plugin, state) = self.lookup(name).await?;

        if !state.can_start() {
            return Err(RegistryError::InvalidState {
                name: name.to_string(),
                operation: LifecycleOperation::Start,
                state,
            });
        }

        match run_hook(plugin.start()).await {
            Ok(()) => {
                self.complete_hook(name, PluginState::Started).await;
                info!(plugin = %name, "Plugin started");
                Ok(())
            }
            Err(message) => {
                self.record_failure(name, LifecycleOperation::Start, &message)
                    .await;
                Err(RegistryError::HookFailed {
                    name: name.to_string(),
                    operation: LifecycleOperation::Start,
                    message,
                })
            }
        }
    }

    /// Runs the stop hook against the shutdown timer. The caller must hold
    /// the plugin's lock.
    ///
    /// The hook runs on its own task. If the timer fires first the hook's
    /// cancellation token is triggered, the plugin moves to `ERROR`, and the
    /// task is left to finish on its own as an orphaned stop.
    pub(crate) async fn stop_locked(&self, name: &str) -> RegistryResult<()> {
        let (plugin, state) = self.lookup(name).await?;

        if !state.is_running() {
            debug!(plugin = %name, state = %state, "Plugin not started; stop is a no-op");
            return Ok(());
        }

        self.enter_state(name, PluginState::Stopping).await;

        let cancel = CancellationToken::new();
        let mut hook = tokio::spawn({
            let cancel = cancel.clone();
            async move { plugin.stop(cancel).await }
        });

        let timeout = self.config.graceful_shutdown_timeout();
        let message = match tokio::time::timeout(timeout, &mut hook).await {
            Ok(Ok(Ok(()))) => {
                self.complete_hook(name, PluginState::Stopped).await;
                info!(plugin = %name, "Plugin stopped");
                return Ok(());
            }
            Ok(Ok(Err(message))) => message,
            Ok(Err(join_error)) => format!("stop hook aborted: {join_error}"),
            Err(_) => {
                cancel.cancel();
                self.track_orphaned_stop(name, hook);

                let err = RegistryError::ShutdownTimeout {
                    name: name.to_string(),
                    timeout_ms: self.config.graceful_shutdown_timeout_ms,
                };
                self.record_failure(name, LifecycleOperation::Stop, &err.to_string())
                    .await;
                return Err(err);
            }
        };

        self.record_failure(name, LifecycleOperation::Stop, &message)
            .await;
        Err(RegistryError::HookFailed {
            name: name.to_string(),
            operation: LifecycleOperation::Stop,
            message,
        })
    }

    /// Counts a stop hook that lost the race and logs when it finally settles.
    fn track_orphaned_stop(&self, name: &str, hook: JoinHandle<HookResult>) {
        let orphans = self.orphaned_stops.clone();
        let in_flight = orphans.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(plugin = %name, in_flight, "Stop hook timed out; cancellation requested");

        let name = name.to_string();
        tokio::spawn(async move {
            let outcome = hook.await;
            orphans.fetch_sub(1, Ordering::SeqCst);
            match outcome {
                Ok(Ok(())) => info!(plugin = %name, "Orphaned stop hook completed"),
                Ok(Err(e)) => warn!(plugin = %name, error = %e, "Orphaned stop hook failed"),
                Err(e) => warn!(plugin = %name, error = %e, "Orphaned stop hook aborted"),
            }
        });
    }

    /// Fetches the instance and current state of a registered plugin.
    pub(crate) async fn lookup(&self, name: &str) -> RegistryResult<(Arc<dyn Plugin>, PluginState)> {
        let not_found = || RegistryError::NotFound {
            name: name.to_string(),
        };
        let plugin = self.store.plugin(name).await.ok_or_else(not_found)?;
        let state = self.store.state(name).await.ok_or_else(not_found)?;
        Ok((plugin, state))
    }
}

/// Awaits a plugin hook, turning a panic into a hook failure.
pub(crate) async fn run_hook<F>(hook: F) -> HookResult
where
    F: Future<Output = HookResult>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(format!("hook panicked: {}", panic_message(panic.as_ref()))),
    }
}

/// Extracts the message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
