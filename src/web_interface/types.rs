use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data_capture::{Payload, PortSpec};
use crate::session_management::session::{PacketRecord, SessionInfo, SessionSummary};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// API error payload
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub status: String,
    pub message: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: message.into(),
        }
    }
}

/// Body naming a trace; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct TraceRequest {
    pub trace_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub status: String,
    pub trace_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub status: String,
    pub trace_info: SessionSummary,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub status: String,
    pub traces: Vec<SessionInfo>,
    pub active_trace_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub tracing_active: bool,
    pub active_trace: Option<SessionInfo>,
}

/// One protocol event posted by a client.
#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub direction: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub payload: Option<Payload>,
    pub src_addr: Option<String>,
    pub dst_addr: Option<String>,
    pub src_port: Option<PortSpec>,
    pub dst_port: Option<PortSpec>,
    pub trace_id: Option<String>,
}

fn default_protocol() -> String {
    String::from("UDP")
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub status: String,
    pub packet: PacketRecord,
}

#[derive(Debug, Deserialize)]
pub struct AudioRequest {
    pub audio: Option<String>,
    pub trace_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AudioResponse {
    pub status: String,
    pub audio: String,
    pub trace_id: Option<Uuid>,
    pub trace_active: bool,
}

/// Parse an optional trace id from a request body. Blank means "not given".
pub fn parse_trace_id(raw: Option<&str>) -> Result<Option<Uuid>, uuid::Error> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Uuid::parse_str(s).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trace_id_parsing() {
        assert_eq!(parse_trace_id(None).unwrap(), None);
        assert_eq!(parse_trace_id(Some("  ")).unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(parse_trace_id(Some(&id.to_string())).unwrap(), Some(id));
        assert!(parse_trace_id(Some("nope")).is_err());
    }

    #[test]
    fn record_request_defaults() {
        let req: RecordRequest = serde_json::from_value(json!({
            "direction": "sip_to_grpc",
            "payload": {"a": 1},
            "src_port": "abc"
        }))
        .unwrap();
        assert_eq!(req.protocol, "UDP");
        assert_eq!(req.payload, Some(Payload::Structured(json!({"a": 1}))));
        assert_eq!(req.src_port, Some(PortSpec::Text("abc".into())));
        assert!(req.dst_port.is_none());
    }
}
