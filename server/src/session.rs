//! Server-side session handling: routes each decoded packet to its handler and
//! turns the outcome into outgoing [`GameMessage`]s.
//!
//! Handlers never touch the socket. They return what should be sent and the network
//! layer delivers it, which keeps every rule here testable without I/O.

use crate::registry::{ConnectionRegistry, Registration};
use log::{debug, info, warn};
use shared::{timestamp_millis, GameConfig, GameStateSnapshot, InputBits, Packet, PlayerState};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Messages sent from the session logic to the network sender task
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        recipients: Vec<SocketAddr>,
    },
}

pub struct SessionManager {
    registry: ConnectionRegistry,
    heartbeat_timeout: Duration,
}

impl SessionManager {
    pub fn new(max_players: usize, heartbeat_timeout: Duration) -> Self {
        Self {
            registry: ConnectionRegistry::new(max_players),
            heartbeat_timeout,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Latest clamped state reported by `player_id`
    pub fn snapshot(&self, player_id: &str) -> Option<&GameStateSnapshot> {
        self.registry.snapshot(player_id)
    }

    /// Dispatches one packet received from `addr`.
    ///
    /// CONNECT is the only packet accepted from unknown addresses; anything else from
    /// them is dropped. Every accepted packet refreshes the sender's liveness.
    pub fn handle_packet(
        &mut self,
        packet: Packet,
        addr: SocketAddr,
        now: Instant,
    ) -> Vec<GameMessage> {
        if let Packet::Connect {
            player_id,
            player_name,
            is_host,
        } = packet
        {
            return self.handle_connect(addr, &player_id, &player_name, is_host, now);
        }

        if !self.registry.refresh(&addr, now) {
            warn!(
                "Dropping {} from unregistered address {}",
                packet.packet_type(),
                addr
            );
            return Vec::new();
        }

        match packet {
            Packet::Input {
                player_id,
                frame_number,
                input_bits,
            } => self.handle_input(&player_id, frame_number, input_bits),
            Packet::StateUpdate { player_id, state } => {
                self.handle_state_update(addr, &player_id, &state)
            }
            Packet::GameConfig(config) => self.handle_game_config(config),
            Packet::Disconnect { player_id } => self.handle_disconnect(addr, &player_id),
            Packet::Heartbeat { player_id } => {
                debug!("Heartbeat from {} at {}", player_id, addr);
                Vec::new()
            }
            Packet::PauseGame { player_id } => {
                info!("Player {} paused the game", player_id);
                self.relay_to_all(Packet::PauseGame { player_id })
            }
            Packet::ResumeGame { player_id } => {
                info!("Player {} resumed the game", player_id);
                self.relay_to_all(Packet::ResumeGame { player_id })
            }
            packet @ (Packet::Rematch { .. }
            | Packet::NextRound { .. }
            | Packet::WaitingForHost { .. }) => self.relay_to_peers(packet, addr),
            other => {
                warn!(
                    "Unexpected {} packet from client at {}",
                    other.packet_type(),
                    addr
                );
                Vec::new()
            }
        }
    }

    /// Registers a peer, answering with CONNECT_ACCEPTED or CONNECT_REJECTED.
    /// Reaching capacity broadcasts GAME_START to everyone.
    pub fn handle_connect(
        &mut self,
        addr: SocketAddr,
        player_id: &str,
        player_name: &str,
        is_host: bool,
        now: Instant,
    ) -> Vec<GameMessage> {
        info!(
            "Connect request from {} as {} ({}, host: {})",
            addr, player_id, player_name, is_host
        );

        let reject = |reason: String| {
            warn!("Rejecting {} from {}: {}", player_id, addr, reason);
            vec![GameMessage::SendPacket {
                packet: Packet::ConnectRejected { reason },
                addr,
            }]
        };

        match self
            .registry
            .register(addr, player_id, player_name, is_host, now)
        {
            Registration::Full => return reject("Server full".to_string()),
            Registration::DuplicateId => {
                return reject(format!("Player id {} already connected", player_id))
            }
            Registration::AlreadyRegistered => {
                let assigned_id = self
                    .registry
                    .get(&addr)
                    .map(|connection| connection.player_id.clone())
                    .unwrap_or_else(|| player_id.to_string());
                return vec![GameMessage::SendPacket {
                    packet: Packet::ConnectAccepted { assigned_id },
                    addr,
                }];
            }
            Registration::Registered => {}
        }

        let mut messages = vec![GameMessage::SendPacket {
            packet: Packet::ConnectAccepted {
                assigned_id: player_id.to_string(),
            },
            addr,
        }];

        if self.registry.len() == self.registry.max_players() {
            let player_ids = self.registry.player_ids();
            info!("Session full, starting game with {:?}", player_ids);
            self.registry.mark_all_ready();
            messages.extend(self.relay_to_all(Packet::GameStart { player_ids }));
        }

        messages
    }

    /// Relays an input to every connection, the sender included.
    pub fn handle_input(
        &mut self,
        player_id: &str,
        frame_number: i64,
        input_bits: InputBits,
    ) -> Vec<GameMessage> {
        debug!("Input {} frame {}: {}", player_id, frame_number, input_bits);
        self.relay_to_all(Packet::InputBroadcast {
            player_id: player_id.to_string(),
            frame_number,
            input_bits,
        })
    }

    /// Stores the clamped state as the sender's latest snapshot. Nothing is sent.
    ///
    /// Updates naming an id other than the one registered at `addr` are dropped, so a
    /// snapshot always belongs to a live connection.
    pub fn handle_state_update(
        &mut self,
        addr: SocketAddr,
        player_id: &str,
        state: &PlayerState,
    ) -> Vec<GameMessage> {
        match self.registry.get(&addr) {
            Some(connection) if connection.player_id == player_id => {}
            Some(connection) => {
                warn!(
                    "Dropping state update for {} from {}, registered as {}",
                    player_id, addr, connection.player_id
                );
                return Vec::new();
            }
            None => return Vec::new(),
        }

        let snapshot = GameStateSnapshot::from_update(state, timestamp_millis());
        if snapshot.state != *state {
            debug!("Clamped state update from {}: {:?}", player_id, snapshot.state);
        }
        self.registry.store_snapshot(player_id, snapshot);
        Vec::new()
    }

    /// Relays the host's selection verbatim. The sender's role is not checked.
    pub fn handle_game_config(&mut self, config: GameConfig) -> Vec<GameMessage> {
        info!(
            "Game config {} vs {} on {}",
            config.p1_character, config.p2_character, config.map_file
        );
        self.relay_to_all(Packet::GameConfig(config))
    }

    /// Removes the sender and tells the remaining peers.
    pub fn handle_disconnect(&mut self, addr: SocketAddr, player_id: &str) -> Vec<GameMessage> {
        let Some(connection) = self.registry.remove(&addr) else {
            return Vec::new();
        };

        if connection.player_id != player_id {
            warn!(
                "Disconnect from {} names {} but the address belongs to {}",
                addr, player_id, connection.player_id
            );
        }

        self.relay_to_all(Packet::PlayerDisconnected {
            player_id: connection.player_id,
        })
    }

    /// Evicts every connection silent past the heartbeat timeout and announces each
    /// eviction to whoever is left.
    pub fn sweep(&mut self, now: Instant) -> Vec<GameMessage> {
        let evicted = self.registry.evict_expired(now, self.heartbeat_timeout);

        let mut messages = Vec::new();
        for connection in evicted {
            warn!(
                "Player {} at {} timed out",
                connection.player_id, connection.addr
            );
            messages.extend(self.relay_to_all(Packet::PlayerDisconnected {
                player_id: connection.player_id,
            }));
        }
        messages
    }

    fn relay_to_all(&self, packet: Packet) -> Vec<GameMessage> {
        broadcast(packet, self.registry.addrs())
    }

    fn relay_to_peers(&self, packet: Packet, sender: SocketAddr) -> Vec<GameMessage> {
        debug!("Relaying {} from {}", packet.packet_type(), sender);
        broadcast(packet, self.registry.addrs_except(&sender))
    }
}

fn broadcast(packet: Packet, recipients: Vec<SocketAddr>) -> Vec<GameMessage> {
    if recipients.is_empty() {
        return Vec::new();
    }
    vec![GameMessage::BroadcastPacket { packet, recipients }]
}
