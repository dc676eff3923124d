//! Fabricated SIP <-> gRPC gateway traffic.
//!
//! The dashboard has no real gateway behind it: `exchange` builds the messages
//! a call would produce and feeds them to the trace store, and `protocol_log`
//! prints them to the console in a readable form.

pub mod exchange;
pub mod protocol_log;

pub use exchange::GatewayExchange;
pub use protocol_log::log_protocol_message;
