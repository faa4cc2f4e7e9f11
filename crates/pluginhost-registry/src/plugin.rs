//! The capability contract every registered plugin implements.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Outcome of a plugin hook. Failures are opaque messages.
pub type HookResult = Result<(), String>;

/// Trait that all plugins must implement.
///
/// Identity (`name`, `version`, `dependencies`) is read once, when the plugin
/// is loaded. Hooks are awaited by the registry before it advances the
/// plugin's state; a hook that returns `Err` or panics moves the plugin to
/// `ERROR`.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Unique name across the registry.
    fn name(&self) -> &str;

    /// Informational version string.
    fn version(&self) -> &str;

    /// Names of plugins that must already be loaded before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Prepares internal resources. Called once per load, and again on a
    /// reload when [`supports_reload`](Self::supports_reload) is `false`.
    async fn initialize(&self) -> HookResult;

    /// Begins active operation.
    async fn start(&self) -> HookResult;

    /// Releases resources.
    ///
    /// Raced against the graceful shutdown timeout. When the timeout wins,
    /// `cancel` is triggered; the hook keeps running until it returns, so
    /// long-running implementations should watch the token.
    async fn stop(&self, cancel: CancellationToken) -> HookResult;

    /// Whether [`reload`](Self::reload) is implemented.
    fn supports_reload(&self) -> bool {
        false
    }

    /// Custom hot-reload hook, used only when
    /// [`supports_reload`](Self::supports_reload) returns `true`.
    async fn reload(&self) -> HookResult {
        Ok(())
    }
}
