//! Serial-link ownership for the gateway.
//!
//! * [`serial`] – opens the port, frames inbound bytes into newline-terminated
//!   telegrams, and serializes outbound writes through a [`LinkHandle`].
//! * [`locator`] – resolves a connectable device path from USB vendor-ID
//!   matching with fallback path probing.
//! * [`supervisor`] – the reconnect policy/state machine applied when the
//!   link drops.

pub mod locator;
pub mod serial;
pub mod supervisor;

pub use locator::DeviceLocator;
pub use serial::{LinkEvent, LinkHandle, SerialLink};
pub use supervisor::{LinkHealth, ReconnectPolicy, ReconnectSupervisor, SupervisorAction};
