use chrono::{DateTime, Local};
use log::info;

use crate::data_capture::{Direction, Payload};

const RULE_WIDTH: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

fn banner(direction: Direction) -> &'static str {
    match direction {
        Direction::ClientToSip => "v  CLIENT TO SIP",
        Direction::SipToGrpc => "-> SIP TO GRPC",
        Direction::GrpcToSip => "<- GRPC TO SIP",
        Direction::SipToClient => "^  SIP TO CLIENT",
    }
}

/// Render a protocol message between a timestamped direction banner and a
/// closing rule. Structured payloads are pretty-printed, raw bytes are shown
/// lossily as UTF-8.
pub fn format_protocol_message(
    direction: Direction,
    label: &str,
    payload: &Payload,
    at: DateTime<Local>,
) -> String {
    let body = match payload {
        Payload::Text(s) => s.clone(),
        Payload::Structured(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
        Payload::Raw(b) => String::from_utf8_lossy(b).into_owned(),
    };
    let rule = "-".repeat(RULE_WIDTH);
    format!(
        "\n{}\n{} - {} - {}\n{}\n{}\n{}",
        "=".repeat(RULE_WIDTH),
        banner(direction),
        label,
        at.format(TIMESTAMP_FORMAT),
        rule,
        body,
        rule
    )
}

pub fn log_protocol_message(direction: Direction, label: &str, payload: &Payload) {
    info!(
        target: "protocol",
        "{}",
        format_protocol_message(direction, label, payload, Local::now())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
    }

    #[test]
    fn banner_and_pretty_json() {
        let out = format_protocol_message(
            Direction::SipToGrpc,
            "gRPC Request",
            &Payload::from(json!({"method": "/x/Y"})),
            at(),
        );
        assert!(out.contains("-> SIP TO GRPC - gRPC Request - 2024-03-01 12:30:05,000\n"));
        assert!(out.contains("{\n  \"method\": \"/x/Y\"\n}"));
        assert!(out.contains(&"=".repeat(80)));
    }

    #[test]
    fn text_is_verbatim_and_closed_by_a_rule() {
        let out = format_protocol_message(
            Direction::SipToClient,
            "SIP 200 OK",
            &"SIP/2.0 200 OK".into(),
            at(),
        );
        assert!(out.ends_with(&format!("\nSIP/2.0 200 OK\n{}", "-".repeat(80))));
        assert!(out.contains("^  SIP TO CLIENT - SIP 200 OK - 2024-03-01"));
        assert_eq!(out.matches(&"-".repeat(80)).count(), 2);
    }
}
