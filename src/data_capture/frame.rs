//! Frame synthesis for visualizing gateway hops.
//!
//! Frames are shaped like Ethernet + IPv4 + UDP/TCP so capture viewers will
//! dissect them, but they are not real traffic: checksums are zero and the
//! link addresses only tell the SIP side apart from the gRPC side.
//!
//! Layout: <https://wiki.wireshark.org/Ethernet>, RFC 791, RFC 768, RFC 793.

use log::{debug, error};

use crate::error_handling::types::FrameError;

use super::types::{Direction, Frame, Payload, Transport};

pub const SIP_SIDE_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
pub const GRPC_SIDE_MAC: [u8; 6] = [0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb];
const ETHERTYPE_IPV4: [u8; 2] = [0x08, 0x00];

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV4_HEADER_LEN: usize = 20;
const TTL: u8 = 64;

pub const LOCALHOST: [u8; 4] = [127, 0, 0, 1];
const FALLBACK_SRC_PORT: u16 = 5060;
const FALLBACK_DST_PORT: u16 = 50051;
pub const FALLBACK_PAYLOAD: &[u8] = b"ERROR: Failed to create proper packet";

/// Build a frame for one logical hop. Never fails; any internal fault yields
/// the fallback frame instead.
pub fn synthesize(
    direction: Direction,
    transport: Transport,
    payload: &Payload,
    src_addr: &str,
    dst_addr: &str,
    src_port: i64,
    dst_port: i64,
) -> Frame {
    match try_synthesize(
        direction, transport, payload, src_addr, dst_addr, src_port, dst_port,
    ) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Error creating {} frame: {}", direction, e);
            fallback_frame()
        }
    }
}

fn try_synthesize(
    direction: Direction,
    transport: Transport,
    payload: &Payload,
    src_addr: &str,
    dst_addr: &str,
    src_port: i64,
    dst_port: i64,
) -> Result<Frame, FrameError> {
    let data = payload.to_bytes()?;

    let ip_total = IPV4_HEADER_LEN + transport.header_len() + data.len();
    let ip_total = u16::try_from(ip_total).map_err(|_| FrameError::PayloadTooLarge(data.len()))?;

    let (src_ip, dst_ip) = match (parse_addr(src_addr), parse_addr(dst_addr)) {
        (Some(s), Some(d)) => (s, d),
        _ => {
            debug!(
                "Address conversion issue ({} -> {}), using localhost",
                src_addr, dst_addr
            );
            (LOCALHOST, LOCALHOST)
        }
    };

    let src_port = clamp_port(src_port);
    let dst_port = clamp_port(dst_port);

    let mut bytes = Vec::with_capacity(ETHERNET_HEADER_LEN + ip_total as usize);
    push_ethernet(&mut bytes, direction);
    push_ipv4(&mut bytes, ip_total, transport.ip_protocol(), src_ip, dst_ip);
    match transport {
        Transport::Udp => {
            // Fits, since the IPv4 total length already did.
            let udp_len = (transport.header_len() + data.len()) as u16;
            push_udp(&mut bytes, src_port, dst_port, udp_len);
        }
        Transport::Tcp => push_tcp(&mut bytes, src_port, dst_port),
    }
    bytes.extend_from_slice(&data);

    Ok(Frame {
        bytes,
        payload_len: data.len(),
        src_port,
        dst_port,
    })
}

/// Minimal well-formed frame carrying a diagnostic payload.
pub fn fallback_frame() -> Frame {
    let mut bytes = Vec::with_capacity(ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + 8 + FALLBACK_PAYLOAD.len());
    bytes.extend_from_slice(&SIP_SIDE_MAC);
    bytes.extend_from_slice(&GRPC_SIDE_MAC);
    bytes.extend_from_slice(&ETHERTYPE_IPV4);
    push_ipv4(&mut bytes, 0, Transport::Udp.ip_protocol(), LOCALHOST, LOCALHOST);
    push_udp(&mut bytes, FALLBACK_SRC_PORT, FALLBACK_DST_PORT, 8);
    bytes.extend_from_slice(FALLBACK_PAYLOAD);
    Frame {
        bytes,
        payload_len: FALLBACK_PAYLOAD.len(),
        src_port: FALLBACK_SRC_PORT,
        dst_port: FALLBACK_DST_PORT,
    }
}

/// Dotted quad to octets. `localhost` is accepted as 127.0.0.1.
pub fn parse_addr(addr: &str) -> Option<[u8; 4]> {
    if addr == "localhost" {
        return Some(LOCALHOST);
    }
    let parts: Vec<&str> = addr.split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut out = [0u8; 4];
    for (o, p) in out.iter_mut().zip(parts) {
        *o = p.trim().parse().ok()?;
    }
    Some(out)
}

pub fn clamp_port(port: i64) -> u16 {
    port.clamp(1, u16::MAX as i64) as u16
}

fn push_ethernet(buf: &mut Vec<u8>, direction: Direction) {
    let (src, dst) = match direction {
        Direction::SipToGrpc => (SIP_SIDE_MAC, GRPC_SIDE_MAC),
        _ => (GRPC_SIDE_MAC, SIP_SIDE_MAC),
    };
    buf.extend_from_slice(&src);
    buf.extend_from_slice(&dst);
    buf.extend_from_slice(&ETHERTYPE_IPV4);
}

fn push_ipv4(buf: &mut Vec<u8>, total_len: u16, protocol: u8, src: [u8; 4], dst: [u8; 4]) {
    let mut h = [0u8; IPV4_HEADER_LEN];
    h[0] = 0x45; // v4, 5 words
    h[2..4].copy_from_slice(&total_len.to_be_bytes());
    h[8] = TTL;
    h[9] = protocol;
    h[12..16].copy_from_slice(&src);
    h[16..20].copy_from_slice(&dst);
    buf.extend_from_slice(&h);
}

fn push_udp(buf: &mut Vec<u8>, src_port: u16, dst_port: u16, len: u16) {
    buf.extend_from_slice(&src_port.to_be_bytes());
    buf.extend_from_slice(&dst_port.to_be_bytes());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&[0, 0]);
}

fn push_tcp(buf: &mut Vec<u8>, src_port: u16, dst_port: u16) {
    let mut h = [0u8; 20];
    h[0..2].copy_from_slice(&src_port.to_be_bytes());
    h[2..4].copy_from_slice(&dst_port.to_be_bytes());
    h[12] = 5 << 4;
    h[13] = 0x18; // PSH|ACK
    buf.extend_from_slice(&h);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IP: usize = ETHERNET_HEADER_LEN;

    fn be16(b: &[u8], off: usize) -> u16 {
        u16::from_be_bytes([b[off], b[off + 1]])
    }

    #[test]
    fn udp_frame_layout() {
        let f = synthesize(
            Direction::ClientToSip,
            Transport::Udp,
            &Payload::from("INVITE"),
            "10.0.0.7",
            "192.168.1.2",
            12345,
            5060,
        );
        let b = &f.bytes;
        assert_eq!(b.len(), 14 + 20 + 8 + 6);
        assert_eq!(&b[0..6], &GRPC_SIDE_MAC);
        assert_eq!(&b[6..12], &SIP_SIDE_MAC);
        assert_eq!(&b[12..14], &[0x08, 0x00]);
        assert_eq!(b[IP], 0x45);
        assert_eq!(be16(b, IP + 2), 20 + 8 + 6);
        assert_eq!(b[IP + 8], 64);
        assert_eq!(b[IP + 9], 17);
        assert_eq!(&b[IP + 12..IP + 16], &[10, 0, 0, 7]);
        assert_eq!(&b[IP + 16..IP + 20], &[192, 168, 1, 2]);
        let udp = IP + 20;
        assert_eq!(be16(b, udp), 12345);
        assert_eq!(be16(b, udp + 2), 5060);
        assert_eq!(be16(b, udp + 4), 8 + 6);
        assert_eq!(be16(b, udp + 6), 0);
        assert_eq!(f.payload(), b"INVITE");
    }

    #[test]
    fn tcp_frame_layout() {
        let f = synthesize(
            Direction::SipToGrpc,
            Transport::Tcp,
            &Payload::from(json!({"a": 1})),
            "localhost",
            "127.0.0.2",
            5060,
            50051,
        );
        let b = &f.bytes;
        assert_eq!(&b[0..6], &SIP_SIDE_MAC);
        assert_eq!(&b[6..12], &GRPC_SIDE_MAC);
        assert_eq!(b[IP + 9], 6);
        assert_eq!(be16(b, IP + 2) as usize, 20 + 20 + 7);
        assert_eq!(&b[IP + 12..IP + 16], &LOCALHOST);
        let tcp = IP + 20;
        assert_eq!(be16(b, tcp), 5060);
        assert_eq!(be16(b, tcp + 2), 50051);
        assert_eq!(b[tcp + 12], 0x50);
        assert_eq!(b[tcp + 13], 0x18);
        assert_eq!(f.payload(), br#"{"a":1}"#);
        assert_eq!(f.payload_len, 7);
    }

    #[test]
    fn bad_address_falls_back_for_both() {
        for bad in ["999.1.1.1", "1.2.3", "a.b.c.d", "", "1.2.3.4.5", "-1.0.0.1"] {
            let f = synthesize(
                Direction::GrpcToSip,
                Transport::Udp,
                &Payload::from("x"),
                bad,
                "10.1.1.1",
                1,
                2,
            );
            assert_eq!(&f.bytes[IP + 12..IP + 16], &LOCALHOST, "{bad}");
            assert_eq!(&f.bytes[IP + 16..IP + 20], &LOCALHOST, "{bad}");
        }
    }

    #[test]
    fn ports_are_clamped() {
        let f = synthesize(
            Direction::SipToClient,
            Transport::Udp,
            &Payload::from(""),
            "1.1.1.1",
            "2.2.2.2",
            0,
            70000,
        );
        assert_eq!((f.src_port, f.dst_port), (1, 65535));
        assert_eq!(be16(&f.bytes, IP + 20), 1);
        assert_eq!(be16(&f.bytes, IP + 22), 65535);
        assert_eq!(clamp_port(-5), 1);
    }

    #[test]
    fn oversized_payload_yields_fallback_frame() {
        let big = Payload::Raw(vec![b'x'; 70_000]);
        let f = synthesize(Direction::SipToGrpc, Transport::Tcp, &big, "1.1.1.1", "2.2.2.2", 1, 2);
        assert_eq!(f, fallback_frame());
        assert_eq!(f.payload(), FALLBACK_PAYLOAD);
        assert_eq!(f.bytes[IP + 9], 17);
    }

    #[test]
    fn address_parsing() {
        assert_eq!(parse_addr("localhost"), Some(LOCALHOST));
        assert_eq!(parse_addr("0.0.0.0"), Some([0, 0, 0, 0]));
        assert_eq!(parse_addr("255.255.255.255"), Some([255; 4]));
        assert_eq!(parse_addr("256.0.0.0"), None);
        assert_eq!(parse_addr("example.com"), None);
    }
}
