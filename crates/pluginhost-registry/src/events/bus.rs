//! Event bus: observers subscribe by event kind and are invoked
//! synchronously, in subscription order, on every emit.
//!
//! Each handler is isolated: an `Err` return or a panic is logged and the
//! remaining handlers still run. Nothing is propagated to the emitter.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use super::definitions::{EventKind, RegistryEvent};
use crate::lifecycle::panic_message;

/// Trait for event observers.
///
/// Implemented for every `Fn(&RegistryEvent) -> Result<(), String>` closure.
pub trait EventHandler: Send + Sync {
    /// Handles one event.
    fn handle(&self, event: &RegistryEvent) -> Result<(), String>;
}

impl<F> EventHandler for F
where
    F: Fn(&RegistryEvent) -> Result<(), String> + Send + Sync,
{
    fn handle(&self, event: &RegistryEvent) -> Result<(), String> {
        self(event)
    }
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Entry in the subscription table.
struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

/// Result of delivering one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOutcome {
    /// Handlers that were invoked.
    pub invoked: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// Synchronous publish/subscribe bus.
pub struct EventBus {
    /// Event kind → handlers in subscription order.
    handlers: RwLock<HashMap<EventKind, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends a closure handler for `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&RegistryEvent) -> Result<(), String> + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(handler))
    }

    /// Appends a shared handler for `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers
            .entry(kind.clone())
            .or_default()
            .push(Subscription { id, handler });

        debug!(event = %kind, subscription = id.0, "Event handler subscribed");
        id
    }

    /// Removes a handler. Returns `false` if the id is unknown.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);

        let mut removed = false;
        for entries in handlers.values_mut() {
            let before = entries.len();
            entries.retain(|s| s.id != id);
            removed |= entries.len() != before;
        }
        handlers.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Delivers `event` to every handler subscribed to its kind.
    pub fn emit(&self, event: &RegistryEvent) -> EmitOutcome {
        let kind = event.kind();

        // Snapshot so handlers may subscribe or unsubscribe while running.
        let targets: Vec<Arc<dyn EventHandler>> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers
                .get(&kind)
                .map(|entries| entries.iter().map(|s| s.handler.clone()).collect())
                .unwrap_or_default()
        };

        let mut outcome = EmitOutcome::default();
        for handler in targets {
            outcome.invoked += 1;
            let result = catch_unwind(AssertUnwindSafe(|| handler.handle(event)));
            let failure = match result {
                Ok(Ok(())) => continue,
                Ok(Err(message)) => message,
                Err(panic) => format!("handler panicked: {}", panic_message(panic.as_ref())),
            };
            outcome.failed += 1;
            warn!(event = %kind, event_id = %event.id, error = %failure, "Event handler failed");
        }

        if outcome.invoked > 0 {
            debug!(
                event = %kind,
                invoked = outcome.invoked,
                failed = outcome.failed,
                "Event dispatched"
            );
        }
        outcome
    }

    /// Returns the number of handlers subscribed to `kind`.
    pub fn handler_count(&self, kind: &EventKind) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(kind).map(Vec::len).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let total: usize = handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("kinds", &handlers.len())
            .field("handlers", &total)
            .finish()
    }
}
