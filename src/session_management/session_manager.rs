use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{Local, Utc};
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::data_capture::frame;
use crate::data_capture::{CaptureFile, Transport};
use crate::error_handling::types::TraceError;
use crate::session_management::session::{
    PacketEvent, PacketRecord, SessionInfo, SessionSummary, TraceSession, DEFAULT_DST_PORT,
    DEFAULT_SRC_PORT,
};
use crate::session_management::SessionStatus;

/// Pick the session an operation targets: an explicit id wins, otherwise the
/// default session. The result is not checked for existence.
pub fn resolve(explicit: Option<Uuid>, default: Option<Uuid>) -> Option<Uuid> {
    explicit.or(default)
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<Uuid, TraceSession>,
    /// Creation order.
    order: Vec<Uuid>,
    default_id: Option<Uuid>,
}

impl Registry {
    fn lookup(&self, explicit: Option<Uuid>) -> Option<&TraceSession> {
        resolve(explicit, self.default_id).and_then(|id| self.sessions.get(&id))
    }

    fn lookup_mut(&mut self, explicit: Option<Uuid>) -> Option<&mut TraceSession> {
        let id = resolve(explicit, self.default_id)?;
        self.sessions.get_mut(&id)
    }
}

/// The structure owning every trace session of the process.
///
/// All operations run under one lock, held for the whole operation including
/// the capture file I/O, so the in-memory packet order of a session always
/// matches the record order in its file.
///
/// # Fields Overview
///
/// - `logs_dir`: directory capture files are created in (created on demand)
/// - `registry`: sessions by id, their creation order, and the default id
pub struct TraceStore {
    logs_dir: PathBuf,
    registry: Mutex<Registry>,
}

impl TraceStore {
    pub fn new<P: AsRef<Path>>(logs_dir: P) -> Self {
        let logs_dir = std::path::absolute(logs_dir.as_ref())
            .unwrap_or_else(|_| logs_dir.as_ref().to_path_buf());
        Self {
            logs_dir,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Poisoned lock: keep serving with the last state.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new session and make it the default one.
    ///
    /// The previous default session, if any, keeps recording when addressed
    /// explicitly; it only stops being the default.
    pub fn start(&self) -> Result<Uuid, TraceError> {
        let mut reg = self.lock();

        std::fs::create_dir_all(&self.logs_dir).map_err(|e| {
            error!(
                "Failed to create logs directory {}: {}",
                self.logs_dir.display(),
                e
            );
            TraceError::LogsDirectory(self.logs_dir.clone(), e)
        })?;

        let id = Uuid::new_v4();
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let path = self
            .logs_dir
            .join(format!("sip_grpc_trace_{}_{}.pcap", stamp, &id.to_string()[..8]));

        let mut session = TraceSession {
            id,
            file: CaptureFile::open(&path),
            start_time: Utc::now(),
            status: SessionStatus::Created,
            packets: Vec::new(),
        };
        session.file.write_header().map_err(|e| {
            error!("Failed to create trace file {}: {}", path.display(), e);
            TraceError::from(e)
        })?;
        session.status = SessionStatus::Active;

        reg.sessions.insert(id, session);
        reg.order.push(id);
        reg.default_id = Some(id);

        info!(
            "Protocol trace started\n   Trace ID:  {}\n   PCAP file: {}\n   Time:      {}\n   \
             All SIP and gRPC messages will be captured to this file.",
            id,
            path.display(),
            stamp
        );
        Ok(id)
    }

    /// Record one event into the resolved session.
    ///
    /// Returns `None` when no session resolves or it is no longer active;
    /// recording without a session is allowed and does nothing.
    pub fn record(&self, event: &PacketEvent, trace_id: Option<Uuid>) -> Option<PacketRecord> {
        let mut reg = self.lock();
        let session = match reg.lookup_mut(trace_id) {
            Some(s) if s.is_active() => s,
            Some(s) => {
                debug!("[{}] Trace is not active, packet dropped", s.id);
                return None;
            }
            None => {
                debug!("No active trace found for packet addition");
                return None;
            }
        };

        let (src_port, dst_port) = match (event.src_port.to_number(), event.dst_port.to_number()) {
            (Some(s), Some(d)) => (s, d),
            _ => {
                warn!(
                    "[{}] Invalid port values: src={}, dst={}. Using defaults.",
                    session.id, event.src_port, event.dst_port
                );
                (DEFAULT_SRC_PORT.into(), DEFAULT_DST_PORT.into())
            }
        };

        let now = Utc::now();
        let frame = frame::synthesize(
            event.direction,
            Transport::from_label(&event.protocol),
            &event.payload,
            &event.src_addr,
            &event.dst_addr,
            src_port,
            dst_port,
        );

        match session.file.append_record(&frame.bytes, now) {
            Ok(()) => debug!(
                "[{}] Added packet: {} {} {} bytes",
                session.id,
                event.direction,
                event.protocol,
                frame.len()
            ),
            // The event is kept in memory even when the file could not take it.
            Err(e) => error!("[{}] Failed to write packet to trace file: {}", session.id, e),
        }

        let record = PacketRecord {
            timestamp: now,
            direction: event.direction,
            protocol: event.protocol.clone(),
            src_addr: event.src_addr.clone(),
            dst_addr: event.dst_addr.clone(),
            src_port: frame.src_port,
            dst_port: frame.dst_port,
            size_bytes: frame.payload_len,
        };
        session.packets.push(record.clone());
        Some(record)
    }

    /// Stop the resolved session and report its figures.
    ///
    /// Unknown and already stopped sessions yield `None`.
    pub fn stop(&self, trace_id: Option<Uuid>) -> Option<SessionSummary> {
        let mut reg = self.lock();
        let default_id = reg.default_id;
        let session = reg.lookup_mut(trace_id)?;
        if !session.is_active() {
            debug!("[{}] Trace already stopped", session.id);
            return None;
        }

        session.status = SessionStatus::Stopped;
        let summary = session.summary(Utc::now());
        if default_id == Some(summary.id) {
            reg.default_id = None;
        }

        info!(
            "Protocol trace stopped\n   Trace ID:      {}\n   PCAP file:     {}\n   \
             Duration:      {:.2} seconds\n   Total packets: {}\n   \
             SIP -> gRPC:   {} packets\n   gRPC -> SIP:   {} packets\n   \
             Client <-> SIP: {} packets",
            summary.id,
            summary.file_path.display(),
            summary.duration,
            summary.packet_count,
            summary.sip_to_grpc_count,
            summary.grpc_to_sip_count,
            summary.client_packets
        );
        Some(summary)
    }

    pub fn describe(&self, trace_id: Option<Uuid>) -> Option<SessionInfo> {
        let reg = self.lock();
        reg.lookup(trace_id).map(|s| s.info(Utc::now()))
    }

    /// Every known session, in creation order.
    pub fn list_all(&self) -> Vec<SessionInfo> {
        let reg = self.lock();
        let now = Utc::now();
        reg.order
            .iter()
            .filter_map(|id| reg.sessions.get(id))
            .map(|s| s.info(now))
            .collect()
    }

    pub fn default_session(&self) -> Option<Uuid> {
        self.lock().default_id
    }

    /// Snapshot of a session's packet records.
    pub fn packets(&self, trace_id: Option<Uuid>) -> Option<Vec<PacketRecord>> {
        let reg = self.lock();
        reg.lookup(trace_id).map(|s| s.packets.clone())
    }

    /// Capture file of an existing session, for download.
    pub fn capture_path(&self, trace_id: Uuid) -> Option<PathBuf> {
        let reg = self.lock();
        reg.sessions.get(&trace_id).map(|s| s.file_path())
    }
}
