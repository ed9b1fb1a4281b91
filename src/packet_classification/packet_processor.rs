use std::sync::Arc;

use log::{debug, info, trace};
use tokio::sync::mpsc;

use super::classifier::PacketClassifier;
use super::types::{CapturedPacket, ClassifiedEvent, Direction};
use crate::connection_tracking::{ConnectionRegistry, HalfConnectionKind};

/// Feeds classified packets into a [`ConnectionRegistry`].
///
/// Each capture worker owns one processor and one registry; the registry
/// handle is shared with the query API.
pub struct PacketProcessor {
    classifier: PacketClassifier,
    registry: Arc<ConnectionRegistry>,
}

/// Outcome of handing one packet to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Not classifiable or no payload.
    Skipped,
    /// Recorded, counterpart still missing.
    Recorded,
    /// This packet completed an exchange.
    Completed,
}

impl PacketProcessor {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            classifier: PacketClassifier::new(),
            registry,
        }
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub fn process_packet(&self, packet: &CapturedPacket) -> ProcessOutcome {
        match self.classifier.classify(packet) {
            Some(event) if event.has_payload() => self.process_event(event),
            Some(event) => {
                trace!("[{}] segment without payload ignored", event.key);
                ProcessOutcome::Skipped
            }
            None => ProcessOutcome::Skipped,
        }
    }

    pub fn process_event(&self, event: ClassifiedEvent) -> ProcessOutcome {
        let source = event.source.to_string();
        let target = event.target.to_string();

        let completed = match event.direction {
            Direction::Request => {
                let completed = self.registry.add_request(
                    &event.key,
                    &event.protocol,
                    &source,
                    &target,
                    event.timestamp,
                    event.payload,
                );
                if !completed {
                    self.registry
                        .track_half_connection(&event.key, HalfConnectionKind::Request);
                    debug!("[{}] tracked request-only half-connection", event.key);
                }
                completed
            }
            Direction::Response => {
                let completed = self.registry.record_unpaired_response(
                    &event.key,
                    &event.protocol,
                    &source,
                    &target,
                    event.timestamp,
                    event.payload,
                );
                if !completed {
                    debug!("[{}] tracked response-only half-connection", event.key);
                }
                completed
            }
        };

        if completed {
            ProcessOutcome::Completed
        } else {
            ProcessOutcome::Recorded
        }
    }

    /// Drains `receiver` until every sender is dropped.
    pub async fn run(self, mut receiver: mpsc::Receiver<CapturedPacket>) {
        info!("Packet processor started");
        let mut processed: u64 = 0;
        let mut completed: u64 = 0;
        while let Some(packet) = receiver.recv().await {
            processed += 1;
            if self.process_packet(&packet) == ProcessOutcome::Completed {
                completed += 1;
            }
        }
        info!(
            "Packet processor stopped after {} packets ({} exchanges completed)",
            processed, completed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_tracking::ConnectionStatus;
    use crate::packet_classification::types::LinkType;
    use chrono::Utc;
    use etherparse::PacketBuilder;

    fn frame(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, payload: &[u8]) -> CapturedPacket {
        let builder = PacketBuilder::ipv4(src, dst, 64).tcp(sport, dport, 1, 65535);
        let mut data = Vec::new();
        builder.write(&mut data, payload).unwrap();
        CapturedPacket::new(Utc::now(), LinkType::RawIp, data)
    }

    fn request() -> CapturedPacket {
        frame([10, 0, 0, 5], 51000, [10, 0, 0, 9], 80, b"GET / HTTP/1.1\r\n\r\n")
    }

    fn response() -> CapturedPacket {
        frame([10, 0, 0, 9], 80, [10, 0, 0, 5], 51000, b"HTTP/1.1 200 OK\r\n\r\n")
    }

    #[test]
    fn test_request_then_response() {
        let registry = Arc::new(ConnectionRegistry::new());
        let processor = PacketProcessor::new(registry.clone());

        assert_eq!(processor.process_packet(&request()), ProcessOutcome::Recorded);
        assert_eq!(registry.half_connections().len(), 1);
        assert_eq!(processor.process_packet(&response()), ProcessOutcome::Completed);

        let complete = registry.get_connections(false);
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].id, "tcp:10.0.0.5:51000-10.0.0.9:80");
        assert_eq!(complete[0].protocol, "http");
        assert!(registry.half_connections().is_empty());
    }

    #[test]
    fn test_response_then_request() {
        let registry = Arc::new(ConnectionRegistry::new());
        let processor = PacketProcessor::new(registry.clone());

        assert_eq!(processor.process_packet(&response()), ProcessOutcome::Recorded);
        let pending = registry.get_connections(true);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, ConnectionStatus::ResponseOnly);
        assert_eq!(pending[0].source, "10.0.0.9:80");

        assert_eq!(processor.process_packet(&request()), ProcessOutcome::Completed);
        let complete = registry.get_connections(false);
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].source, "10.0.0.5:51000");
        assert_eq!(complete[0].target, "10.0.0.9:80");
    }

    #[test]
    fn test_skips() {
        let registry = Arc::new(ConnectionRegistry::new());
        let processor = PacketProcessor::new(registry.clone());

        let garbage = CapturedPacket::new(Utc::now(), LinkType::RawIp, vec![0x45, 0x00]);
        assert_eq!(processor.process_packet(&garbage), ProcessOutcome::Skipped);
        let ack = frame([10, 0, 0, 5], 51000, [10, 0, 0, 9], 80, b"");
        assert_eq!(processor.process_packet(&ack), ProcessOutcome::Skipped);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        let registry = Arc::new(ConnectionRegistry::new());
        let processor = PacketProcessor::new(registry.clone());
        let (tx, rx) = mpsc::channel(8);

        let worker = tokio::spawn(processor.run(rx));
        tx.send(request()).await.unwrap();
        tx.send(response()).await.unwrap();
        drop(tx);
        worker.await.unwrap();

        assert_eq!(registry.stats().complete, 1);
    }
}
