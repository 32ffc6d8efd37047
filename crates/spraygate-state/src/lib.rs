//! Canonical system state: the single-writer [`StateStore`] and the
//! [`BroadcastHub`] that fans snapshots out to subscribers.

pub mod hub;
pub mod store;

pub use hub::BroadcastHub;
pub use store::StateStore;
