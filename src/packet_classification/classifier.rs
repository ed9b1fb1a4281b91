use std::net::{IpAddr, SocketAddr};

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use log::trace;

use super::types::{CapturedPacket, ClassifiedEvent, Direction, Endpoint, LinkType, Transport};

const REQUEST_METHODS: [&[u8]; 7] = [
    b"GET ",
    b"POST ",
    b"PUT ",
    b"DELETE ",
    b"HEAD ",
    b"OPTIONS ",
    b"PATCH ",
];
const RESPONSE_PREFIX: &[u8] = b"HTTP/1.";

/// Stateless packet → [`ClassifiedEvent`] mapping.
///
/// Packets without an IP layer or without a TCP/UDP layer are skipped
/// (`None`); classification never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketClassifier;

impl PacketClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, packet: &CapturedPacket) -> Option<ClassifiedEvent> {
        let sliced = match packet.link_type {
            LinkType::Ethernet => SlicedPacket::from_ethernet(&packet.data),
            LinkType::RawIp => SlicedPacket::from_ip(&packet.data),
        };
        let sliced = match sliced {
            Ok(sliced) => sliced,
            Err(e) => {
                trace!("Skipping undecodable packet: {}", e);
                return None;
            }
        };

        let (src_ip, dst_ip): (IpAddr, IpAddr) = match &sliced.net {
            Some(NetSlice::Ipv4(ip)) => (
                ip.header().source_addr().into(),
                ip.header().destination_addr().into(),
            ),
            Some(NetSlice::Ipv6(ip)) => (
                ip.header().source_addr().into(),
                ip.header().destination_addr().into(),
            ),
            _ => return None,
        };

        let (transport, src_port, dst_port, payload) = match &sliced.transport {
            Some(TransportSlice::Tcp(tcp)) => (
                Transport::Tcp,
                tcp.source_port(),
                tcp.destination_port(),
                tcp.payload(),
            ),
            Some(TransportSlice::Udp(udp)) => (
                Transport::Udp,
                udp.source_port(),
                udp.destination_port(),
                udp.payload(),
            ),
            _ => return None,
        };

        let source = SocketAddr::new(src_ip, src_port);
        let target = SocketAddr::new(dst_ip, dst_port);
        let (direction, is_http) = detect_direction(payload);
        let protocol = if is_http {
            "http".to_string()
        } else {
            transport.as_str().to_string()
        };

        Some(ClassifiedEvent {
            key: correlation_key(transport, source, target),
            direction,
            protocol,
            transport,
            source,
            target,
            timestamp: packet.timestamp,
            payload: String::from_utf8_lossy(payload).into_owned(),
        })
    }
}

/// Order-independent flow key: `tcp:<lower endpoint>-<higher endpoint>`.
pub fn correlation_key(transport: Transport, a: Endpoint, b: Endpoint) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}-{}", transport, low, high)
}

/// Returns the direction of a payload and whether it looked like HTTP.
///
/// Anything that does not start with a known request method is a response.
fn detect_direction(payload: &[u8]) -> (Direction, bool) {
    if REQUEST_METHODS.iter().any(|m| payload.starts_with(m)) {
        (Direction::Request, true)
    } else if payload.starts_with(RESPONSE_PREFIX) {
        (Direction::Response, true)
    } else {
        (Direction::Response, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use etherparse::PacketBuilder;

    const CLIENT_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x05];
    const SERVER_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x09];

    fn tcp_frame(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, payload: &[u8]) -> CapturedPacket {
        let builder = PacketBuilder::ethernet2(CLIENT_MAC, SERVER_MAC)
            .ipv4(src, dst, 64)
            .tcp(sport, dport, 1, 65535);
        let mut data = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut data, payload).unwrap();
        CapturedPacket::new(Utc::now(), LinkType::Ethernet, data)
    }

    #[test]
    fn test_request_and_response_share_key() {
        let classifier = PacketClassifier::new();
        let req = tcp_frame([10, 0, 0, 5], 51000, [10, 0, 0, 9], 80, b"GET / HTTP/1.1\r\n\r\n");
        let resp = tcp_frame([10, 0, 0, 9], 80, [10, 0, 0, 5], 51000, b"HTTP/1.1 200 OK\r\n\r\n");

        let req = classifier.classify(&req).unwrap();
        let resp = classifier.classify(&resp).unwrap();

        assert_eq!(req.key, resp.key);
        assert_eq!(req.key, "tcp:10.0.0.5:51000-10.0.0.9:80");
        assert_eq!(req.direction, Direction::Request);
        assert_eq!(resp.direction, Direction::Response);
        assert_eq!(req.protocol, "http");
        assert_eq!(resp.protocol, "http");
        assert_eq!(req.source.to_string(), "10.0.0.5:51000");
        assert_eq!(req.target.to_string(), "10.0.0.9:80");
        assert_eq!(req.payload, "GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn test_every_http_method_is_a_request() {
        let classifier = PacketClassifier::new();
        for method in ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"] {
            let payload = format!("{} /items HTTP/1.1\r\n", method);
            let pkt = tcp_frame([10, 0, 0, 5], 40000, [10, 0, 0, 9], 8080, payload.as_bytes());
            let event = classifier.classify(&pkt).unwrap();
            assert_eq!(event.direction, Direction::Request, "{}", method);
        }

        // the method token must be followed by a space
        let pkt = tcp_frame([10, 0, 0, 5], 40000, [10, 0, 0, 9], 8080, b"GETTING started");
        assert_eq!(classifier.classify(&pkt).unwrap().direction, Direction::Response);
    }

    #[test]
    fn test_unrecognised_payload_defaults_to_response() {
        let classifier = PacketClassifier::new();
        let pkt = tcp_frame([10, 0, 0, 5], 40000, [10, 0, 0, 9], 6379, b"*1\r\n$4\r\nPING\r\n");
        let event = classifier.classify(&pkt).unwrap();
        assert_eq!(event.direction, Direction::Response);
        assert_eq!(event.protocol, "tcp");
    }

    #[test]
    fn test_empty_payload_is_valid() {
        let classifier = PacketClassifier::new();
        let pkt = tcp_frame([10, 0, 0, 5], 40000, [10, 0, 0, 9], 80, b"");
        let event = classifier.classify(&pkt).unwrap();
        assert!(!event.has_payload());
        assert_eq!(event.direction, Direction::Response);
    }

    #[test]
    fn test_raw_ip_udp() {
        let classifier = PacketClassifier::new();
        let builder = PacketBuilder::ipv4([192, 168, 1, 2], [192, 168, 1, 1], 64).udp(5353, 53);
        let payload = b"\x12\x34query";
        let mut data = Vec::new();
        builder.write(&mut data, payload).unwrap();

        let event = classifier
            .classify(&CapturedPacket::new(Utc::now(), LinkType::RawIp, data))
            .unwrap();
        assert_eq!(event.transport, Transport::Udp);
        assert_eq!(event.protocol, "udp");
        assert_eq!(event.key, "udp:192.168.1.1:53-192.168.1.2:5353");
    }

    #[test]
    fn test_http_over_ipv6() {
        let classifier = PacketClassifier::new();
        let mut client = [0u8; 16];
        client[15] = 1;
        let mut server = [0u8; 16];
        server[15] = 2;
        let builder = PacketBuilder::ipv6(client, server, 64).tcp(50000, 80, 1, 1024);
        let mut data = Vec::new();
        builder.write(&mut data, b"POST /upload HTTP/1.1\r\n").unwrap();

        let event = classifier
            .classify(&CapturedPacket::new(Utc::now(), LinkType::RawIp, data))
            .unwrap();
        assert_eq!(event.direction, Direction::Request);
        assert_eq!(event.source.to_string(), "[::1]:50000");
        assert_eq!(event.key, "tcp:[::1]:50000-[::2]:80");
    }

    #[test]
    fn test_non_ip_and_garbage_are_skipped() {
        let classifier = PacketClassifier::new();
        assert!(classifier
            .classify(&CapturedPacket::new(Utc::now(), LinkType::Ethernet, vec![0u8; 3]))
            .is_none());

        let mut arp = Vec::new();
        arp.extend_from_slice(&SERVER_MAC);
        arp.extend_from_slice(&CLIENT_MAC);
        arp.extend_from_slice(&[0x08, 0x06]);
        arp.extend_from_slice(&[0u8; 28]);
        assert!(classifier
            .classify(&CapturedPacket::new(Utc::now(), LinkType::Ethernet, arp))
            .is_none());
    }

    #[test]
    fn test_icmp_is_skipped() {
        let classifier = PacketClassifier::new();
        let builder = PacketBuilder::ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64).icmpv4_echo_request(7, 1);
        let mut data = Vec::new();
        builder.write(&mut data, b"ping").unwrap();
        assert!(classifier
            .classify(&CapturedPacket::new(Utc::now(), LinkType::RawIp, data))
            .is_none());
    }

    #[test]
    fn test_correlation_key_is_symmetric() {
        let a: Endpoint = "10.1.1.1:443".parse().unwrap();
        let b: Endpoint = "10.1.1.2:60000".parse().unwrap();
        assert_eq!(correlation_key(Transport::Tcp, a, b), correlation_key(Transport::Tcp, b, a));
        assert_ne!(correlation_key(Transport::Tcp, a, b), correlation_key(Transport::Udp, a, b));
    }
}
