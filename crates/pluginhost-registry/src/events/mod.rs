//! Event system: typed lifecycle events and the synchronous bus that
//! delivers them to observers.

pub mod bus;
pub mod definitions;

pub use bus::{EmitOutcome, EventBus, EventHandler, SubscriptionId};
pub use definitions::{EventKind, EventPayload, RegistryEvent};
