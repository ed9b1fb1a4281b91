//! Packet classification and ingest.
//!
//! Raw captured packets are turned into [`types::ClassifiedEvent`]s by the
//! stateless [`classifier::PacketClassifier`] and fed into the connection
//! registry by [`packet_processor::PacketProcessor`].

pub mod classifier;
pub mod packet_processor;
pub mod types;

pub use classifier::{correlation_key, PacketClassifier};
pub use packet_processor::{PacketProcessor, ProcessOutcome};
pub use types::{CapturedPacket, ClassifiedEvent, Direction, Endpoint, LinkType, Transport};
