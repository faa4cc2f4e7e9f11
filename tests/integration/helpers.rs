//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pluginhost_registry::prelude::*;

/// How a mock plugin's stop hook behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBehavior {
    /// Returns `Ok` immediately.
    Succeed,
    /// Returns `Err` immediately.
    Fail,
    /// Never settles and ignores cancellation.
    Hang,
    /// Settles only once its cancellation token fires.
    HangUntilCancelled,
}

/// Hook invocation counters.
#[derive(Debug, Default)]
pub struct Calls {
    pub initialize: AtomicUsize,
    pub start: AtomicUsize,
    pub stop: AtomicUsize,
    pub reload: AtomicUsize,
}

impl Calls {
    pub fn initialize(&self) -> usize {
        self.initialize.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> usize {
        self.start.load(Ordering::SeqCst)
    }

    pub fn stop(&self) -> usize {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn reload(&self) -> usize {
        self.reload.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.initialize() + self.start() + self.stop() + self.reload()
    }
}

/// Scriptable plugin used across the integration suites.
#[derive(Debug)]
pub struct MockPlugin {
    name: String,
    dependencies: Vec<String>,
    custom_reload: bool,
    start_delay: Duration,
    pub calls: Calls,
    pub fail_initialize: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_reload: AtomicBool,
    pub panic_on_start: AtomicBool,
    pub stop_behavior: Mutex<StopBehavior>,
    /// Set when a stop hook observed its cancellation token.
    pub stop_cancelled: Arc<AtomicBool>,
    /// Shared log of stop invocations, in order.
    pub stop_log: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockPlugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dependencies: Vec::new(),
            custom_reload: false,
            start_delay: Duration::ZERO,
            calls: Calls::default(),
            fail_initialize: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            fail_reload: AtomicBool::new(false),
            panic_on_start: AtomicBool::new(false),
            stop_behavior: Mutex::new(StopBehavior::Succeed),
            stop_cancelled: Arc::new(AtomicBool::new(false)),
            stop_log: None,
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_custom_reload(mut self) -> Self {
        self.custom_reload = true;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_stop(self, behavior: StopBehavior) -> Self {
        self.set_stop(behavior);
        self
    }

    pub fn with_stop_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.stop_log = Some(log);
        self
    }

    pub fn failing_initialize(self) -> Self {
        self.fail_initialize.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_stop(&self, behavior: StopBehavior) {
        *self.stop_behavior.lock().unwrap() = behavior;
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn initialize(&self) -> HookResult {
        self.calls.initialize.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err("initialize failed".to_string());
        }
        Ok(())
    }

    async fn start(&self) -> HookResult {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if self.panic_on_start.load(Ordering::SeqCst) {
            panic!("start exploded");
        }
        if self.fail_start.load(Ordering::SeqCst) {
            return Err("start failed".to_string());
        }
        Ok(())
    }

    async fn stop(&self, cancel: CancellationToken) -> HookResult {
        self.calls.stop.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.stop_log {
            log.lock().unwrap().push(self.name.clone());
        }

        let behavior = *self.stop_behavior.lock().unwrap();
        match behavior {
            StopBehavior::Succeed => Ok(()),
            StopBehavior::Fail => Err("stop failed".to_string()),
            StopBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            StopBehavior::HangUntilCancelled => {
                cancel.cancelled().await;
                self.stop_cancelled.store(true, Ordering::SeqCst);
                Err("stop cancelled".to_string())
            }
        }
    }

    fn supports_reload(&self) -> bool {
        self.custom_reload
    }

    async fn reload(&self) -> HookResult {
        self.calls.reload.fetch_add(1, Ordering::SeqCst);
        if self.fail_reload.load(Ordering::SeqCst) {
            return Err("reload failed".to_string());
        }
        Ok(())
    }
}

/// Registry with default settings.
pub fn registry() -> PluginRegistry {
    PluginRegistry::new(RegistryConfig::default())
}

/// Registry with a short shutdown timeout.
pub fn registry_with_timeout(timeout: Duration) -> PluginRegistry {
    PluginRegistry::new(RegistryConfig::default().with_shutdown_timeout(timeout))
}

/// Current state of a registered plugin.
pub async fn state_of(registry: &PluginRegistry, name: &str) -> Option<PluginState> {
    registry.get_plugin_metadata(name).await.map(|meta| meta.state)
}

/// Polls `check` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
