//! Application Layer
//!
//! Message reconciliation and the engine consumers talk to.

pub mod engine;
pub mod reconciler;

pub use engine::{BookSyncEngine, SubscriptionPort};
pub use reconciler::{FeedMessageReconciler, Reconciled, SharedRegistry};
