use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, trace};

use super::types::{
    Connection, ConnectionStatus, HalfConnection, HalfConnectionKind, RegistryStats,
};

/// Concurrency-safe store pairing requests with responses.
///
/// Every entry follows one of two paths, `∅ → RequestOnly → Complete` or
/// `∅ → ResponseOnly → Complete`. All mutations run their check-then-act
/// sequence under the same write lock, so for one key exactly one call observes
/// the transition to `Complete` and returns `true`. Queries take the read lock
/// and clone entries out, so callers never see a partially updated connection.
///
/// A registry is owned by the worker that feeds it and shared by `Arc` with the
/// query API; there is no process-wide instance.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    connections: HashMap<String, Connection>,
    half_connections: HashMap<String, HalfConnection>,
}

impl RegistryState {
    fn add_request(
        &mut self,
        key: &str,
        protocol: &str,
        source: &str,
        target: &str,
        timestamp: DateTime<Utc>,
        payload: String,
    ) -> bool {
        let Some(conn) = self.connections.get_mut(key) else {
            self.connections.insert(
                key.to_string(),
                Connection {
                    id: key.to_string(),
                    protocol: protocol.to_string(),
                    source: source.to_string(),
                    target: target.to_string(),
                    timestamp,
                    request: Some(payload),
                    response: None,
                    status: ConnectionStatus::RequestOnly,
                },
            );
            trace!("[{}] request-only entry created", key);
            return false;
        };

        match conn.status {
            ConnectionStatus::Complete => {
                trace!("[{}] request ignored, exchange already complete", key);
                false
            }
            ConnectionStatus::RequestOnly => {
                conn.request = Some(payload);
                trace!("[{}] duplicate request, payload replaced", key);
                false
            }
            ConnectionStatus::ResponseOnly => {
                // The request defines the orientation of the exchange.
                conn.request = Some(payload);
                conn.protocol = protocol.to_string();
                conn.source = source.to_string();
                conn.target = target.to_string();
                conn.status = ConnectionStatus::Complete;
                self.half_connections.remove(key);
                debug!("[{}] exchange completed by request", key);
                true
            }
        }
    }

    fn add_response(&mut self, key: &str, payload: String) -> bool {
        let Some(conn) = self.connections.get_mut(key) else {
            return false;
        };

        match conn.status {
            ConnectionStatus::Complete => {
                trace!("[{}] response ignored, exchange already complete", key);
                false
            }
            ConnectionStatus::ResponseOnly => {
                conn.response = Some(payload);
                trace!("[{}] duplicate response, payload replaced", key);
                false
            }
            ConnectionStatus::RequestOnly => {
                conn.response = Some(payload);
                conn.status = ConnectionStatus::Complete;
                self.half_connections.remove(key);
                debug!("[{}] exchange completed by response", key);
                true
            }
        }
    }

    fn track_half_connection(&mut self, key: &str, kind: HalfConnectionKind) {
        let (timestamp, data) = match self.connections.get(key) {
            Some(conn) if conn.is_complete() => return,
            Some(conn) => {
                let data = match kind {
                    HalfConnectionKind::Request => conn.request.clone(),
                    HalfConnectionKind::Response => conn.response.clone(),
                };
                (conn.timestamp, data)
            }
            None => (Utc::now(), None),
        };

        self.half_connections.insert(
            key.to_string(),
            HalfConnection {
                connection_id: key.to_string(),
                kind,
                timestamp,
                data,
            },
        );
    }

    fn add_response_only(
        &mut self,
        key: &str,
        protocol: &str,
        source: &str,
        target: &str,
        timestamp: DateTime<Utc>,
        payload: String,
    ) {
        if let Some(existing) = self.connections.get(key) {
            if existing.is_complete() {
                debug!("[{}] response-only write skipped, exchange already complete", key);
                return;
            }
            if existing.status == ConnectionStatus::RequestOnly {
                debug!("[{}] response-only write replaces a request-only entry", key);
            }
        }

        self.connections.insert(
            key.to_string(),
            Connection {
                id: key.to_string(),
                protocol: protocol.to_string(),
                source: source.to_string(),
                target: target.to_string(),
                timestamp,
                request: None,
                response: Some(payload),
                status: ConnectionStatus::ResponseOnly,
            },
        );
        if let Some(half) = self.half_connections.get_mut(key) {
            if half.kind == HalfConnectionKind::Response && half.data.is_none() {
                half.timestamp = timestamp;
                half.data = self.connections.get(key).and_then(|c| c.response.clone());
            }
        }
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        // A panicking writer cannot leave a torn entry behind: every mutation
        // replaces fields of a single entry before returning.
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a request side.
    ///
    /// Creates a `RequestOnly` entry on a miss, completes a `ResponseOnly`
    /// entry (returning `true`), and replaces the payload of a duplicate
    /// request. Entries already `Complete` are left untouched.
    pub fn add_request(
        &self,
        key: &str,
        protocol: &str,
        source: &str,
        target: &str,
        timestamp: DateTime<Utc>,
        payload: String,
    ) -> bool {
        self.write()
            .add_request(key, protocol, source, target, timestamp, payload)
    }

    /// Attempts to pair a response with an existing entry.
    ///
    /// Never creates an entry: a miss returns `false` and materialising the
    /// response-only record is left to [`add_response_only`](Self::add_response_only).
    pub fn add_response(&self, key: &str, payload: String) -> bool {
        self.write().add_response(key, payload)
    }

    /// Notes that one side of `key` arrived without its counterpart.
    pub fn track_half_connection(&self, key: &str, kind: HalfConnectionKind) {
        self.write().track_half_connection(key, kind)
    }

    /// Creates or overwrites a `ResponseOnly` entry at `key`.
    ///
    /// Last writer wins against a concurrent `add_request`, except that a
    /// `Complete` entry is never replaced.
    pub fn add_response_only(
        &self,
        key: &str,
        protocol: &str,
        source: &str,
        target: &str,
        timestamp: DateTime<Utc>,
        payload: String,
    ) {
        self.write()
            .add_response_only(key, protocol, source, target, timestamp, payload)
    }

    /// Pairing attempt plus half-connection materialisation as a single
    /// atomic step. Returns `true` when the response completed an exchange.
    pub fn record_unpaired_response(
        &self,
        key: &str,
        protocol: &str,
        source: &str,
        target: &str,
        timestamp: DateTime<Utc>,
        payload: String,
    ) -> bool {
        let mut state = self.write();
        if state.add_response(key, payload.clone()) {
            return true;
        }
        if state.connections.get(key).is_some_and(Connection::is_complete) {
            return false;
        }
        state.track_half_connection(key, HalfConnectionKind::Response);
        state.add_response_only(key, protocol, source, target, timestamp, payload);
        false
    }

    /// Lists connections ordered by timestamp.
    ///
    /// With `include_half = false` only `Complete` entries are returned. With
    /// `true` every entry is returned, its status re-derived from which payloads
    /// are present.
    pub fn get_connections(&self, include_half: bool) -> Vec<Connection> {
        let state = self.read();
        let mut connections: Vec<Connection> = if include_half {
            state
                .connections
                .values()
                .map(|c| {
                    let mut c = c.clone();
                    c.status = c.derived_status();
                    c
                })
                .collect()
        } else {
            state
                .connections
                .values()
                .filter(|c| c.is_complete() && c.request.is_some() && c.response.is_some())
                .cloned()
                .collect()
        };
        connections.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        connections
    }

    pub fn get_connection(&self, key: &str) -> Option<Connection> {
        self.read().connections.get(key).cloned()
    }

    /// Half-connection observations whose exchange is still unpaired.
    pub fn half_connections(&self) -> Vec<HalfConnection> {
        let mut halves: Vec<HalfConnection> =
            self.read().half_connections.values().cloned().collect();
        halves.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        halves
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.read();
        let mut stats = RegistryStats {
            half_connections: state.half_connections.len(),
            ..Default::default()
        };
        for conn in state.connections.values() {
            match conn.status {
                ConnectionStatus::RequestOnly => stats.request_only += 1,
                ConnectionStatus::ResponseOnly => stats.response_only += 1,
                ConnectionStatus::Complete => stats.complete += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.read().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
