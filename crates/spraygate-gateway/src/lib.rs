//! Operator-facing half of the gateway.
//!
//! * [`command`] – the typed operator command set decoded from subscriber
//!   messages.
//! * [`gateway`] – validates each command against the current configuration
//!   and encodes it into serialized controller writes.
//! * [`server`] – the WebSocket subscriber server bridging the broadcast hub
//!   and the single processing loop.

pub mod command;
pub mod gateway;
pub mod server;

pub use command::{MoveDirection, OperatorCommand, SwitchState};
pub use gateway::CommandGateway;
pub use server::{ServerRequest, SubscriberServer};
