//! Connection registry for the two-player session server
//!
//! This module tracks the server-side view of each peer:
//! - Connection lifecycle keyed by the peer's `(address, port)`
//! - Liveness timestamps refreshed by every datagram the peer sends
//! - Capacity enforcement and join ordering for GAME_START
//! - The latest clamped state snapshot reported by each player
//!
//! The registry is plain data. Locking and timing decisions belong to the
//! session manager and the network layer that own it.

use log::info;
use shared::GameStateSnapshot;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A registered peer and its liveness state
#[derive(Debug, Clone)]
pub struct PlayerConnection {
    /// Network address for sending responses; also the registry key
    pub addr: SocketAddr,
    /// Player id supplied in CONNECT ("P1" or "P2")
    pub player_id: String,
    /// Display name supplied in CONNECT
    pub player_name: String,
    /// Host flag as claimed by the client
    pub is_host: bool,
    /// Last time we received any packet from this peer
    pub last_heartbeat: Instant,
    /// Set once the peer has been included in a GAME_START
    pub ready: bool,
    join_order: u64,
}

impl PlayerConnection {
    /// Creates a connection that counts as alive at `now`
    pub fn new(
        addr: SocketAddr,
        player_id: impl Into<String>,
        player_name: impl Into<String>,
        is_host: bool,
        now: Instant,
    ) -> Self {
        Self {
            addr,
            player_id: player_id.into(),
            player_name: player_name.into(),
            is_host,
            last_heartbeat: now,
            ready: false,
            join_order: 0,
        }
    }

    pub fn refresh(&mut self, now: Instant) {
        self.last_heartbeat = self.last_heartbeat.max(now);
    }

    /// Returns true if the peer has been silent for longer than `timeout`
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat) > timeout
    }
}

/// Result of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new connection was created
    Registered,
    /// The address was already registered; its liveness was refreshed
    AlreadyRegistered,
    /// The registry is at capacity
    Full,
    /// Another address already holds this player id
    DuplicateId,
}

/// Owns every live connection and the per-player snapshots
///
/// Connections are keyed by socket address so a peer is identified by where its
/// datagrams come from, not by the id it claims. Snapshots are keyed by player id
/// and are dropped together with the owning connection.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: HashMap<SocketAddr, PlayerConnection>,
    snapshots: HashMap<String, GameStateSnapshot>,
    next_join_order: u64,
    max_players: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry admitting at most `max_players` connections
    pub fn new(max_players: usize) -> Self {
        Self {
            connections: HashMap::new(),
            snapshots: HashMap::new(),
            next_join_order: 0,
            max_players,
        }
    }

    /// Attempts to register a peer
    ///
    /// A repeated CONNECT from an already-registered address only refreshes it, so a
    /// client retrying after a lost CONNECT_ACCEPTED is not counted twice.
    pub fn register(
        &mut self,
        addr: SocketAddr,
        player_id: &str,
        player_name: &str,
        is_host: bool,
        now: Instant,
    ) -> Registration {
        if let Some(existing) = self.connections.get_mut(&addr) {
            existing.refresh(now);
            return Registration::AlreadyRegistered;
        }

        if self.connections.len() >= self.max_players {
            return Registration::Full;
        }

        if self.find_by_player_id(player_id).is_some() {
            return Registration::DuplicateId;
        }

        let mut connection = PlayerConnection::new(addr, player_id, player_name, is_host, now);
        connection.join_order = self.next_join_order;
        self.next_join_order += 1;

        info!("Player {} ({}) connected from {}", player_id, player_name, addr);
        self.connections.insert(addr, connection);
        Registration::Registered
    }

    /// Removes a connection and its snapshot
    ///
    /// Returns the removed connection, or None if the address was unknown.
    pub fn remove(&mut self, addr: &SocketAddr) -> Option<PlayerConnection> {
        let connection = self.connections.remove(addr)?;
        self.snapshots.remove(&connection.player_id);
        info!("Player {} at {} removed", connection.player_id, addr);
        Some(connection)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&PlayerConnection> {
        self.connections.get(addr)
    }

    pub fn find_by_player_id(&self, player_id: &str) -> Option<&PlayerConnection> {
        self.connections
            .values()
            .find(|connection| connection.player_id == player_id)
    }

    /// Marks the peer at `addr` alive. Returns false for unknown addresses.
    pub fn refresh(&mut self, addr: &SocketAddr, now: Instant) -> bool {
        match self.connections.get_mut(addr) {
            Some(connection) => {
                connection.refresh(now);
                true
            }
            None => false,
        }
    }

    /// Replaces the stored snapshot for `player_id`
    pub fn store_snapshot(&mut self, player_id: &str, snapshot: GameStateSnapshot) {
        self.snapshots.insert(player_id.to_string(), snapshot);
    }

    pub fn snapshot(&self, player_id: &str) -> Option<&GameStateSnapshot> {
        self.snapshots.get(player_id)
    }

    /// Removes and returns every connection silent for longer than `timeout`
    ///
    /// Snapshots of evicted players are dropped as well. The result is ordered by
    /// join order so announcements are deterministic.
    pub fn evict_expired(&mut self, now: Instant, timeout: Duration) -> Vec<PlayerConnection> {
        let expired: Vec<SocketAddr> = self
            .connections
            .values()
            .filter(|connection| connection.is_timed_out(now, timeout))
            .map(|connection| connection.addr)
            .collect();

        let mut evicted: Vec<PlayerConnection> =
            expired.iter().filter_map(|addr| self.remove(addr)).collect();
        evicted.sort_by_key(|connection| connection.join_order);
        evicted
    }

    /// Addresses of every connection, in join order
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.ordered().into_iter().map(|connection| connection.addr).collect()
    }

    /// Addresses of every connection except `exclude`, in join order
    pub fn addrs_except(&self, exclude: &SocketAddr) -> Vec<SocketAddr> {
        self.ordered()
            .into_iter()
            .filter(|connection| connection.addr != *exclude)
            .map(|connection| connection.addr)
            .collect()
    }

    /// Player ids of every connection, in join order
    pub fn player_ids(&self) -> Vec<String> {
        self.ordered()
            .into_iter()
            .map(|connection| connection.player_id.clone())
            .collect()
    }

    pub fn mark_all_ready(&mut self) {
        for connection in self.connections.values_mut() {
            connection.ready = true;
        }
    }

    /// Returns the number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.max_players
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    fn ordered(&self) -> Vec<&PlayerConnection> {
        let mut connections: Vec<&PlayerConnection> = self.connections.values().collect();
        connections.sort_by_key(|connection| connection.join_order);
        connections
    }
}
