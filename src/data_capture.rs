//! Capture subsystem: frame synthesis and the pcap container on disk.
//!
//! - `types`: directions, payloads, ports and synthesized frames.
//! - `frame`: builds Ethernet/IPv4/UDP-or-TCP shaped frames around a payload.
//! - `pcap`: writes (and reads back) the capture container.

pub mod frame;
pub mod pcap;
pub mod types;

pub use frame::synthesize;
pub use pcap::{read_capture, CaptureFile, CapturedRecord, GlobalHeader};
pub use types::{Direction, Frame, Payload, PortSpec, Transport};
