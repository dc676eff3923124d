//! Common data types used across the data_capture subsystem.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error_handling::types::FrameError;

/// Logical hop a synthesized frame represents.
///
/// This is the conceptual direction through the gateway, not the direction
/// of any real socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Caller towards the SIP side of the gateway.
    ClientToSip,
    /// SIP side forwarding to the gRPC backend.
    SipToGrpc,
    /// gRPC backend answering the SIP side.
    GrpcToSip,
    /// SIP side answering the caller.
    SipToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToSip => "client_to_sip",
            Direction::SipToGrpc => "sip_to_grpc",
            Direction::GrpcToSip => "grpc_to_sip",
            Direction::SipToClient => "sip_to_client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client_to_sip" => Ok(Direction::ClientToSip),
            "sip_to_grpc" => Ok(Direction::SipToGrpc),
            "grpc_to_sip" => Ok(Direction::GrpcToSip),
            "sip_to_client" => Ok(Direction::SipToClient),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Transport header shape wrapped around a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    /// Only a `UDP` label selects UDP framing; everything else is TCP-shaped.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("udp") {
            Transport::Udp
        } else {
            Transport::Tcp
        }
    }

    pub fn header_len(&self) -> usize {
        match self {
            Transport::Udp => 8,
            Transport::Tcp => 20,
        }
    }

    pub fn ip_protocol(&self) -> u8 {
        match self {
            Transport::Udp => 17,
            Transport::Tcp => 6,
        }
    }
}

/// Message body carried by a synthesized frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Encoded as UTF-8.
    Text(String),
    /// Encoded as compact JSON text.
    Structured(serde_json::Value),
    /// Written as-is.
    Raw(Vec<u8>),
}

impl Payload {
    /// Any other value enters through its textual representation.
    pub fn display<T: fmt::Display>(value: T) -> Self {
        Payload::Text(value.to_string())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        match self {
            Payload::Text(s) => Ok(s.as_bytes().to_vec()),
            Payload::Structured(v) => Ok(serde_json::to_vec(v)?),
            Payload::Raw(b) => Ok(b.clone()),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::String(s) => Payload::Text(s),
            other => Payload::Structured(other),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Raw(b)
    }
}

/// A port exactly as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    Number(i64),
    /// Fractional or beyond the `i64` range; truncated towards zero.
    Float(f64),
    Text(String),
    /// Anything else JSON can hold; never a usable port.
    Other(serde_json::Value),
}

impl PortSpec {
    pub fn to_number(&self) -> Option<i64> {
        match self {
            PortSpec::Number(n) => Some(*n),
            PortSpec::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            PortSpec::Float(_) => None,
            PortSpec::Text(s) => s.trim().parse().ok(),
            PortSpec::Other(_) => None,
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Number(n) => write!(f, "{}", n),
            PortSpec::Float(n) => write!(f, "{}", n),
            PortSpec::Text(s) => write!(f, "{:?}", s),
            PortSpec::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<u16> for PortSpec {
    fn from(p: u16) -> Self {
        PortSpec::Number(p.into())
    }
}

impl From<i64> for PortSpec {
    fn from(p: i64) -> Self {
        PortSpec::Number(p)
    }
}

impl From<&str> for PortSpec {
    fn from(s: &str) -> Self {
        PortSpec::Text(s.to_string())
    }
}

/// Synthesized link+network+transport frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Complete frame bytes as written to the capture file.
    pub bytes: Vec<u8>,
    /// Length of the payload portion at the end of `bytes`.
    pub payload_len: usize,
    /// Source port actually encoded.
    pub src_port: u16,
    /// Destination port actually encoded.
    pub dst_port: u16,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.bytes.len() - self.payload_len..]
    }
}
