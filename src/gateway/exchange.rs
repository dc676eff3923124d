//! One simulated audio round trip through the gateway.
//!
//! A call produces four hops: the caller's SIP INVITE, the gRPC stream request
//! it turns into, the gRPC response, and the SIP 200 OK back to the caller.
//! The audio is looped back unchanged, so only short previews appear in the
//! fabricated messages.

use chrono::Utc;
use log::debug;
use serde_json::json;
use uuid::Uuid;

use crate::configuration::{Config, GrpcConfig, SipConfig};
use crate::data_capture::{Direction, Payload};
use crate::gateway::protocol_log::log_protocol_message;
use crate::session_management::session::{PacketEvent, PacketRecord};
use crate::session_management::session_manager::TraceStore;

/// Port the caller is pretended to send from.
pub const CLIENT_PORT: u16 = 12345;
const PREVIEW_CHARS: usize = 30;

/// A fabricated message and the label it is logged under.
#[derive(Debug, Clone)]
pub struct ExchangeMessage {
    pub label: &'static str,
    pub event: PacketEvent,
}

pub struct GatewayExchange {
    sip: SipConfig,
    grpc: GrpcConfig,
    client_ip: String,
}

/// First characters of the audio, as shown in fabricated messages.
pub fn preview(audio: &str) -> String {
    let head: String = audio.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", head)
}

impl GatewayExchange {
    pub fn new(config: &Config, client_ip: &str) -> Self {
        Self {
            sip: config.sip.clone(),
            grpc: config.grpc.clone(),
            client_ip: client_ip.to_string(),
        }
    }

    fn sip_message(&self, start_line: &str, to_tag: &str, audio: &str) -> String {
        format!(
            "{start_line}\n\
             Via: SIP/2.0/UDP {client}:{client_port}\n\
             From: <sip:client@{client}>;tag=123\n\
             To: <sip:grpc@{sip_host}>{to_tag}\n\
             Call-ID: {call_id}@{client}\n\
             CSeq: 1 INVITE\n\
             Content-Type: audio/webm\n\
             Content-Length: {len}\n\
             \n\
             {preview}",
            client = self.client_ip,
            client_port = CLIENT_PORT,
            sip_host = self.sip.host,
            call_id = Uuid::new_v4(),
            len = audio.len(),
            preview = preview(audio),
        )
    }

    /// The four hops of one call, in order.
    pub fn messages(&self, audio: &str) -> Vec<ExchangeMessage> {
        let audio_preview = if audio.is_empty() {
            serde_json::Value::Null
        } else {
            json!(preview(audio))
        };

        let invite = self.sip_message(
            &format!("INVITE sip:grpc@{}:{} SIP/2.0", self.sip.host, self.sip.port),
            "",
            audio,
        );
        let request = json!({
            "method": format!("/{}/StreamAudio", self.grpc.service),
            "headers": {"content-type": "application/grpc"},
            "payload": {
                "audio_data": audio_preview,
                "encoding": "webm",
                "call_id": Uuid::new_v4().to_string(),
            }
        });
        let response = json!({
            "status": "OK",
            "headers": {"content-type": "application/grpc"},
            "payload": {
                "audio_data": audio_preview,
                "encoding": "webm",
            }
        });
        let ok = self.sip_message("SIP/2.0 200 OK", ";tag=456", audio);

        vec![
            ExchangeMessage {
                label: "SIP INVITE",
                event: PacketEvent::new(Direction::ClientToSip, "UDP", invite)
                    .source(&self.client_ip, CLIENT_PORT)
                    .destination(&self.sip.host, self.sip.port),
            },
            ExchangeMessage {
                label: "gRPC Request",
                event: PacketEvent::new(Direction::SipToGrpc, "TCP", Payload::Structured(request))
                    .source(&self.sip.host, self.sip.port)
                    .destination(&self.grpc.host, self.grpc.port),
            },
            ExchangeMessage {
                label: "gRPC Response",
                event: PacketEvent::new(Direction::GrpcToSip, "TCP", Payload::Structured(response))
                    .source(&self.grpc.host, self.grpc.port)
                    .destination(&self.sip.host, self.sip.port),
            },
            ExchangeMessage {
                label: "SIP 200 OK",
                event: PacketEvent::new(Direction::SipToClient, "UDP", ok)
                    .source(&self.sip.host, self.sip.port)
                    .destination(&self.client_ip, CLIENT_PORT),
            },
        ]
    }

    /// Sample messages printed when a trace starts, so the console shows every
    /// banner before real traffic arrives. They are logged, never recorded.
    pub fn sample_messages(&self) -> Vec<ExchangeMessage> {
        let client = &self.client_ip;
        let sip = &self.sip;
        let invite = format!(
            "INVITE sip:test@{host}:{port} SIP/2.0\n\
             Via: SIP/2.0/UDP {client}:{client_port}\n\
             From: <sip:test@{client}>;tag=123\n\
             To: <sip:test@{host}>\n\
             Call-ID: test-call@{client}\n\
             CSeq: 1 INVITE\n\
             Content-Type: text/plain\n\
             Content-Length: 4\n\
             \n\
             Test",
            host = sip.host,
            port = sip.port,
            client_port = CLIENT_PORT,
        );
        let ok = format!(
            "SIP/2.0 200 OK\n\
             Via: SIP/2.0/UDP {client}:{client_port}\n\
             From: <sip:test@{client}>;tag=123\n\
             To: <sip:test@{host}>;tag=456\n\
             Call-ID: test-call@{client}\n\
             CSeq: 1 INVITE\n\
             Content-Type: text/plain\n\
             Content-Length: 13\n\
             \n\
             Test response",
            host = sip.host,
            client_port = CLIENT_PORT,
        );
        let request = json!({
            "method": "/example.Test/TestCall",
            "headers": {"content-type": "application/grpc"},
            "payload": {
                "message": "Test gRPC message for protocol logging",
                "timestamp": Utc::now().timestamp_millis() as f64 / 1000.0,
            }
        });
        let response = json!({"status": "OK", "message": "Test response message"});

        vec![
            ExchangeMessage {
                label: "SIP INVITE (Test)",
                event: PacketEvent::new(Direction::ClientToSip, "UDP", invite),
            },
            ExchangeMessage {
                label: "gRPC Request (Test)",
                event: PacketEvent::new(Direction::SipToGrpc, "TCP", Payload::Structured(request)),
            },
            ExchangeMessage {
                label: "gRPC Response (Test)",
                event: PacketEvent::new(Direction::GrpcToSip, "TCP", Payload::Structured(response)),
            },
            ExchangeMessage {
                label: "SIP 200 OK (Test)",
                event: PacketEvent::new(Direction::SipToClient, "UDP", ok),
            },
        ]
    }

    pub fn log_samples(&self) {
        for m in self.sample_messages() {
            log_protocol_message(m.event.direction, m.label, &m.event.payload);
        }
    }

    /// Log and record one call. Nothing is fabricated when there is no
    /// session to record into.
    pub fn run(&self, store: &TraceStore, audio: &str, trace_id: Option<Uuid>) -> Vec<PacketRecord> {
        if trace_id.is_none() && store.default_session().is_none() {
            debug!("No trace to record the exchange into");
            return Vec::new();
        }
        self.messages(audio)
            .into_iter()
            .filter_map(|m| {
                log_protocol_message(m.event.direction, m.label, &m.event.payload);
                store.record(&m.event, trace_id)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::read_capture;
    use tempfile::TempDir;

    fn exchange() -> GatewayExchange {
        let mut config = Config::default();
        config.sip.host = "10.0.0.1".into();
        config.grpc.host = "10.0.0.2".into();
        GatewayExchange::new(&config, "192.168.1.50")
    }

    #[test]
    fn preview_truncates_on_chars() {
        assert_eq!(preview("abc"), "abc...");
        let long = "é".repeat(40);
        assert_eq!(preview(&long), format!("{}...", "é".repeat(30)));
    }

    #[test]
    fn four_hops_in_order() {
        let msgs = exchange().messages("AAAA");
        let dirs: Vec<_> = msgs.iter().map(|m| m.event.direction).collect();
        assert_eq!(
            dirs,
            vec![
                Direction::ClientToSip,
                Direction::SipToGrpc,
                Direction::GrpcToSip,
                Direction::SipToClient
            ]
        );
        let invite = match &msgs[0].event.payload {
            Payload::Text(t) => t.clone(),
            other => panic!("unexpected payload {:?}", other),
        };
        assert!(invite.starts_with("INVITE sip:grpc@10.0.0.1:5060 SIP/2.0\n"));
        assert!(invite.contains("Content-Length: 4\n"));
        assert!(invite.ends_with("\n\nAAAA..."));
        assert_eq!(msgs[0].event.src_addr, "192.168.1.50");
        assert_eq!(msgs[1].event.dst_addr, "10.0.0.2");
        match &msgs[1].event.payload {
            Payload::Structured(v) => {
                assert_eq!(v["method"], "/gateway.AudioService/StreamAudio");
                assert_eq!(v["payload"]["audio_data"], "AAAA...");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn empty_audio_has_null_preview() {
        let msgs = exchange().messages("");
        match &msgs[2].event.payload {
            Payload::Structured(v) => assert!(v["payload"]["audio_data"].is_null()),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn samples_cover_every_direction_without_recording() {
        let dir = TempDir::new().unwrap();
        let store = TraceStore::new(dir.path());
        let id = store.start().unwrap();

        let ex = exchange();
        let samples = ex.sample_messages();
        let labels: Vec<_> = samples.iter().map(|m| m.label).collect();
        assert_eq!(
            labels,
            vec![
                "SIP INVITE (Test)",
                "gRPC Request (Test)",
                "gRPC Response (Test)",
                "SIP 200 OK (Test)"
            ]
        );
        match &samples[0].event.payload {
            Payload::Text(t) => {
                assert!(t.starts_with("INVITE sip:test@10.0.0.1:5060 SIP/2.0\n"));
                assert!(t.contains("Call-ID: test-call@192.168.1.50\n"));
                assert!(t.ends_with("\n\nTest"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(samples[3].event.direction, Direction::SipToClient);

        ex.log_samples();
        assert!(store.packets(Some(id)).unwrap().is_empty());
    }

    #[test]
    fn run_records_into_default_session() {
        let dir = TempDir::new().unwrap();
        let store = TraceStore::new(dir.path());
        assert!(exchange().run(&store, "AAAA", None).is_empty());

        let id = store.start().unwrap();
        let records = exchange().run(&store, "AAAA", None);
        assert_eq!(records.len(), 4);
        let summary = store.stop(Some(id)).unwrap();
        assert_eq!(summary.client_packets, 2);
        assert_eq!(summary.sip_to_grpc_count, 1);
        assert_eq!(summary.grpc_to_sip_count, 1);

        let (_, recs) = read_capture(store.capture_path(id).unwrap()).unwrap();
        assert_eq!(recs.len(), 4);
        // UDP INVITE: ethernet + ipv4 + udp header before the text.
        assert_eq!(&recs[0].data[42..49], b"INVITE ");
    }
}
