//! Built-in heartbeat plugin: logs a beat at a fixed interval while started.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use pluginhost_registry::{HookResult, Plugin};

/// Ticker state while the plugin is started.
#[derive(Debug)]
struct Ticker {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Emits a periodic liveness beat.
#[derive(Debug)]
pub struct HeartbeatPlugin {
    interval: Duration,
    beats: Arc<AtomicU64>,
    ticker: Mutex<Option<Ticker>>,
}

impl HeartbeatPlugin {
    /// Creates a heartbeat that beats every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            beats: Arc::new(AtomicU64::new(0)),
            ticker: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Plugin for HeartbeatPlugin {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn initialize(&self) -> HookResult {
        if self.interval.is_zero() {
            return Err("heartbeat interval must be non-zero".to_string());
        }
        self.beats.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn start(&self) -> HookResult {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            return Err("heartbeat already running".to_string());
        }

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let beats = self.beats.clone();
        let mut interval = tokio::time::interval(self.interval);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let beat = beats.fetch_add(1, Ordering::SeqCst) + 1;
                        debug!(beat, "heartbeat");
                    }
                }
            }
        });

        *ticker = Some(Ticker { shutdown, task });
        Ok(())
    }

    async fn stop(&self, cancel: CancellationToken) -> HookResult {
        let Some(ticker) = self.ticker.lock().await.take() else {
            return Ok(());
        };

        ticker.shutdown.cancel();
        tokio::select! {
            joined = ticker.task => joined.map_err(|e| format!("heartbeat task failed: {e}")),
            _ = cancel.cancelled() => Err("heartbeat stop cancelled".to_string()),
        }
    }

    fn supports_reload(&self) -> bool {
        true
    }

    async fn reload(&self) -> HookResult {
        let previous = self.beats.swap(0, Ordering::SeqCst);
        info!(previous_beats = previous, "Heartbeat counter reset");
        Ok(())
    }
}
