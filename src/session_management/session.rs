use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data_capture::{CaptureFile, Direction, Payload, PortSpec};
use crate::session_management::SessionStatus;

pub const DEFAULT_ADDR: &str = "127.0.0.1";
pub const DEFAULT_SRC_PORT: u16 = 5060;
pub const DEFAULT_DST_PORT: u16 = 50051;

/// One logical protocol event to be recorded.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    pub direction: Direction,
    /// Free-form label; `UDP` selects UDP framing, anything else TCP.
    pub protocol: String,
    pub payload: Payload,
    pub src_addr: String,
    pub dst_addr: String,
    pub src_port: PortSpec,
    pub dst_port: PortSpec,
}

impl PacketEvent {
    pub fn new<P: Into<Payload>>(direction: Direction, protocol: &str, payload: P) -> Self {
        Self {
            direction,
            protocol: protocol.to_string(),
            payload: payload.into(),
            src_addr: DEFAULT_ADDR.to_string(),
            dst_addr: DEFAULT_ADDR.to_string(),
            src_port: DEFAULT_SRC_PORT.into(),
            dst_port: DEFAULT_DST_PORT.into(),
        }
    }

    pub fn source<S: Into<PortSpec>>(mut self, addr: &str, port: S) -> Self {
        self.src_addr = addr.to_string();
        self.src_port = port.into();
        self
    }

    pub fn destination<S: Into<PortSpec>>(mut self, addr: &str, port: S) -> Self {
        self.dst_addr = addr.to_string();
        self.dst_port = port.into();
        self
    }
}

/// In-memory summary of one recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub protocol: String,
    pub src_addr: String,
    pub dst_addr: String,
    pub src_port: u16,
    pub dst_port: u16,
    /// Payload bytes written into the frame body.
    pub size_bytes: usize,
}

/// Per-direction packet tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionCounts {
    pub sip_to_grpc: usize,
    pub grpc_to_sip: usize,
    pub client: usize,
}

impl DirectionCounts {
    pub fn tally(packets: &[PacketRecord]) -> Self {
        packets.iter().fold(Self::default(), |mut c, p| {
            match p.direction {
                Direction::SipToGrpc => c.sip_to_grpc += 1,
                Direction::GrpcToSip => c.grpc_to_sip += 1,
                Direction::ClientToSip | Direction::SipToClient => c.client += 1,
            }
            c
        })
    }
}

/// Read-only snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub file_path: PathBuf,
    pub start_time: DateTime<Utc>,
    pub active: bool,
    pub packet_count: usize,
    /// Seconds since start.
    pub duration: f64,
}

/// Figures reported when a session is stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub file_path: PathBuf,
    /// Seconds between start and stop.
    pub duration: f64,
    pub packet_count: usize,
    pub sip_to_grpc_count: usize,
    pub grpc_to_sip_count: usize,
    pub client_packets: usize,
}

/// A trace recording bound to one capture file.
#[derive(Debug)]
pub struct TraceSession {
    pub id: Uuid,
    pub file: CaptureFile,
    pub start_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub packets: Vec<PacketRecord>,
}

impl TraceSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn file_path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn info(&self, now: DateTime<Utc>) -> SessionInfo {
        SessionInfo {
            id: self.id,
            file_path: self.file_path(),
            start_time: self.start_time,
            active: self.is_active(),
            packet_count: self.packets.len(),
            duration: self.elapsed_secs(now),
        }
    }

    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        let counts = DirectionCounts::tally(&self.packets);
        SessionSummary {
            id: self.id,
            file_path: self.file_path(),
            duration: self.elapsed_secs(now),
            packet_count: self.packets.len(),
            sip_to_grpc_count: counts.sip_to_grpc,
            grpc_to_sip_count: counts.grpc_to_sip,
            client_packets: counts.client,
        }
    }
}
