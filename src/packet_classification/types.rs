use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One side of a flow, rendered as `ip:port` (`[ip]:port` for IPv6).
pub type Endpoint = SocketAddr;

/// Framing of the bytes handed over by a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    /// Ethernet II frame.
    Ethernet,
    /// Bare IPv4/IPv6 packet without a link header.
    RawIp,
}

/// A packet as delivered by a capture source.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPacket {
    pub timestamp: DateTime<Utc>,
    pub link_type: LinkType,
    pub data: Vec<u8>,
}

impl CapturedPacket {
    pub fn new(timestamp: DateTime<Utc>, link_type: LinkType, data: Vec<u8>) -> Self {
        Self {
            timestamp,
            link_type,
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a packet that carried network and transport layers.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    /// Identical for both directions of one exchange.
    pub key: String,
    pub direction: Direction,
    /// `http` when the payload is recognised as HTTP, else the transport name.
    pub protocol: String,
    pub transport: Transport,
    pub source: Endpoint,
    pub target: Endpoint,
    pub timestamp: DateTime<Utc>,
    /// Application payload, lossily decoded. Empty when the segment carried none.
    pub payload: String,
}

impl ClassifiedEvent {
    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}
