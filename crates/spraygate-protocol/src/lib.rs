//! The controller's line-oriented wire protocol.
//!
//! Both directions are plain ASCII, newline-terminated:
//!
//! * [`telegram::parse_line`] turns one inbound line into a typed
//!   [`TelegramEvent`][spraygate_types::TelegramEvent]; a pure, total
//!   function.
//! * [`wire::OutboundLine`] encodes one outbound command line via `Display`.

pub mod telegram;
pub mod wire;

pub use telegram::parse_line;
pub use wire::OutboundLine;
