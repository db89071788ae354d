//! Client session state machine.
//!
//! [`Session`] owns the lifecycle of one player's connection and decides which
//! received packets are meaningful in the current state. It does no I/O: the network
//! client feeds it packets and acts on the [`ClientEvent`]s it returns.

use crate::error::ClientError;
use crate::events::ClientEvent;
use log::{debug, info, warn};
use shared::{is_host_id, Packet};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Host only: both players are in and the host owes a GAME_CONFIG.
    ConfiguringGame,
    /// Non-host only: waiting for the host's GAME_CONFIG.
    AwaitingConfig,
    InGame,
    Paused,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::ConfiguringGame => "configuring game",
            SessionState::AwaitingConfig => "awaiting config",
            SessionState::InGame => "in game",
            SessionState::Paused => "paused",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub struct Session {
    player_id: String,
    player_name: String,
    is_host: bool,
    state: SessionState,
    frame_number: i64,
    connect_started: Option<Instant>,
}

impl Session {
    /// The host role follows from the player id.
    pub fn new(player_id: impl Into<String>, player_name: impl Into<String>) -> Self {
        let player_id = player_id.into();
        Self {
            is_host: is_host_id(&player_id),
            player_id,
            player_name: player_name.into(),
            state: SessionState::Disconnected,
            frame_number: 0,
            connect_started: None,
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once the server has accepted us, in any later state.
    pub fn is_connected(&self) -> bool {
        !matches!(
            self.state,
            SessionState::Disconnected | SessionState::Connecting
        )
    }

    /// Frame number of the last INPUT sent.
    pub fn frame_number(&self) -> i64 {
        self.frame_number
    }

    /// Next frame number for an outgoing INPUT. The first is 1.
    pub fn next_frame(&mut self) -> i64 {
        self.frame_number += 1;
        self.frame_number
    }

    /// Enters `Connecting` and returns the CONNECT packet to send.
    pub fn begin_connect(&mut self, now: Instant) -> Result<Packet, ClientError> {
        if self.state != SessionState::Disconnected {
            return Err(ClientError::AlreadyConnected);
        }

        self.state = SessionState::Connecting;
        self.connect_started = Some(now);
        Ok(Packet::Connect {
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            is_host: self.is_host,
        })
    }

    /// True if a CONNECT has gone unanswered for longer than `timeout`.
    pub fn connect_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        match (self.state, self.connect_started) {
            (SessionState::Connecting, Some(started)) => {
                now.saturating_duration_since(started) >= timeout
            }
            _ => false,
        }
    }

    /// Back to `Disconnected`. The frame counter keeps counting across reconnects.
    pub fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.connect_started = None;
    }

    pub fn authorize_host_only(&self, operation: &'static str) -> Result<(), ClientError> {
        if self.is_host {
            Ok(())
        } else {
            warn!("Ignoring {}: only the host may send it", operation);
            Err(ClientError::HostOnly(operation))
        }
    }

    pub fn authorize_non_host_only(&self, operation: &'static str) -> Result<(), ClientError> {
        if self.is_host {
            warn!("Ignoring {}: the host may not send it", operation);
            Err(ClientError::NonHostOnly(operation))
        } else {
            Ok(())
        }
    }

    /// Fails with `InvalidState` unless the session is currently in `required`.
    pub fn require_state(
        &self,
        operation: &'static str,
        required: SessionState,
    ) -> Result<(), ClientError> {
        if self.state == required {
            Ok(())
        } else {
            warn!("Ignoring {} while {}", operation, self.state);
            Err(ClientError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    pub fn require_connected(&self) -> Result<(), ClientError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    /// Applies a packet received from the server and returns the event the game
    /// should see, if any.
    pub fn apply(&mut self, packet: Packet) -> Option<ClientEvent> {
        match self.state {
            SessionState::Disconnected => {
                debug!("Dropping {} received while disconnected", packet.packet_type());
                return None;
            }
            SessionState::Connecting => return self.apply_while_connecting(packet),
            _ => {}
        }

        match packet {
            Packet::ConnectAccepted { .. } => {
                debug!("Duplicate CONNECT_ACCEPTED ignored");
                None
            }
            Packet::ConnectRejected { reason } => {
                warn!("Late CONNECT_REJECTED ignored: {}", reason);
                None
            }
            Packet::GameStart { player_ids } => {
                if self.state != SessionState::Connected {
                    debug!("GAME_START ignored while {}", self.state);
                    return None;
                }
                info!("Game starting with players {:?}", player_ids);
                self.state = if self.is_host {
                    SessionState::ConfiguringGame
                } else {
                    SessionState::AwaitingConfig
                };
                Some(ClientEvent::GameStart { player_ids })
            }
            Packet::GameConfig(config) => {
                if !matches!(
                    self.state,
                    SessionState::ConfiguringGame | SessionState::AwaitingConfig
                ) {
                    debug!("GAME_CONFIG ignored while {}", self.state);
                    return None;
                }
                info!(
                    "Game config: {} vs {} on {}",
                    config.p1_character, config.p2_character, config.map_file
                );
                self.state = SessionState::InGame;
                Some(ClientEvent::GameConfig(config))
            }
            Packet::InputBroadcast {
                player_id,
                frame_number,
                input_bits,
            } => Some(ClientEvent::InputReceived {
                player_id,
                frame_number,
                input_bits,
            }),
            Packet::PlayerDisconnected { player_id } => {
                info!("Player {} left the session", player_id);
                self.state = SessionState::Connected;
                Some(ClientEvent::PlayerDisconnected { player_id })
            }
            Packet::PauseGame { player_id } => {
                if self.state != SessionState::InGame {
                    debug!("PAUSE_GAME ignored while {}", self.state);
                    return None;
                }
                self.state = SessionState::Paused;
                Some(ClientEvent::PauseGame {
                    paused_by: player_id,
                })
            }
            Packet::ResumeGame { .. } => {
                if self.state != SessionState::Paused {
                    debug!("RESUME_GAME ignored while {}", self.state);
                    return None;
                }
                self.state = SessionState::InGame;
                Some(ClientEvent::ResumeGame)
            }
            Packet::Rematch { .. } if !self.is_host => Some(ClientEvent::RematchRequest),
            Packet::NextRound {
                round,
                p1_wins,
                p2_wins,
                ..
            } if !self.is_host => Some(ClientEvent::NextRound {
                round,
                p1_wins,
                p2_wins,
            }),
            Packet::WaitingForHost { .. } if self.is_host => Some(ClientEvent::WaitingForHost),
            other => {
                warn!("Unexpected {} from server", other.packet_type());
                None
            }
        }
    }

    fn apply_while_connecting(&mut self, packet: Packet) -> Option<ClientEvent> {
        match packet {
            Packet::ConnectAccepted { assigned_id } => {
                if assigned_id != self.player_id {
                    warn!(
                        "Server assigned id {} but we asked for {}",
                        assigned_id, self.player_id
                    );
                }
                info!("Connected as {}", self.player_id);
                self.state = SessionState::Connected;
                self.connect_started = None;
                Some(ClientEvent::Connected)
            }
            Packet::ConnectRejected { reason } => {
                warn!("Connection rejected: {}", reason);
                self.reset();
                Some(ClientEvent::Disconnected { reason })
            }
            other => {
                debug!("Dropping {} received before acceptance", other.packet_type());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GameConfig, InputBits};

    fn connected(player_id: &str) -> Session {
        let mut session = Session::new(player_id, "Tester");
        session.begin_connect(Instant::now()).unwrap();
        session.apply(Packet::ConnectAccepted {
            assigned_id: player_id.to_string(),
        });
        session
    }

    fn in_game(player_id: &str) -> Session {
        let mut session = connected(player_id);
        session.apply(Packet::GameStart {
            player_ids: vec!["P1".to_string(), "P2".to_string()],
        });
        session.apply(Packet::GameConfig(GameConfig::new("RYU", "KEN", "map1")));
        session
    }

    #[test]
    fn test_host_role_from_player_id() {
        assert!(Session::new("P1", "Alice").is_host());
        assert!(!Session::new("P2", "Bob").is_host());
    }

    #[test]
    fn test_begin_connect_builds_connect_packet() {
        let mut session = Session::new("P1", "Alice");
        let packet = session.begin_connect(Instant::now()).unwrap();

        assert_eq!(
            packet,
            Packet::Connect {
                player_id: "P1".to_string(),
                player_name: "Alice".to_string(),
                is_host: true,
            }
        );
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn test_begin_connect_twice_fails() {
        let mut session = Session::new("P1", "Alice");
        session.begin_connect(Instant::now()).unwrap();
        assert!(matches!(
            session.begin_connect(Instant::now()),
            Err(ClientError::AlreadyConnected)
        ));
    }

    #[test]
    fn test_accept_enters_connected() {
        let mut session = Session::new("P2", "Bob");
        session.begin_connect(Instant::now()).unwrap();

        let event = session.apply(Packet::ConnectAccepted {
            assigned_id: "P2".to_string(),
        });

        assert_eq!(event, Some(ClientEvent::Connected));
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.is_connected());
    }

    #[test]
    fn test_reject_returns_to_disconnected_and_allows_retry() {
        let mut session = Session::new("P2", "Bob");
        session.begin_connect(Instant::now()).unwrap();

        let event = session.apply(Packet::ConnectRejected {
            reason: "Server full".to_string(),
        });

        assert_eq!(
            event,
            Some(ClientEvent::Disconnected {
                reason: "Server full".to_string()
            })
        );
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.begin_connect(Instant::now()).is_ok());
    }

    #[test]
    fn test_packets_before_accept_are_dropped() {
        let mut session = Session::new("P2", "Bob");
        session.begin_connect(Instant::now()).unwrap();

        let event = session.apply(Packet::GameStart {
            player_ids: vec!["P1".to_string(), "P2".to_string()],
        });

        assert_eq!(event, None);
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn test_packets_while_disconnected_are_dropped() {
        let mut session = Session::new("P2", "Bob");
        let event = session.apply(Packet::ConnectAccepted {
            assigned_id: "P2".to_string(),
        });
        assert_eq!(event, None);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_game_start_splits_by_role() {
        let ids = vec!["P1".to_string(), "P2".to_string()];

        let mut host = connected("P1");
        let event = host.apply(Packet::GameStart {
            player_ids: ids.clone(),
        });
        assert_eq!(
            event,
            Some(ClientEvent::GameStart {
                player_ids: ids.clone()
            })
        );
        assert_eq!(host.state(), SessionState::ConfiguringGame);

        let mut peer = connected("P2");
        peer.apply(Packet::GameStart { player_ids: ids });
        assert_eq!(peer.state(), SessionState::AwaitingConfig);
    }

    #[test]
    fn test_game_config_enters_in_game() {
        let session = in_game("P2");
        assert_eq!(session.state(), SessionState::InGame);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut session = in_game("P1");

        let event = session.apply(Packet::PauseGame {
            player_id: "P2".to_string(),
        });
        assert_eq!(
            event,
            Some(ClientEvent::PauseGame {
                paused_by: "P2".to_string()
            })
        );
        assert_eq!(session.state(), SessionState::Paused);

        // A second pause is ignored
        let event = session.apply(Packet::PauseGame {
            player_id: "P1".to_string(),
        });
        assert_eq!(event, None);

        let event = session.apply(Packet::ResumeGame {
            player_id: "P2".to_string(),
        });
        assert_eq!(event, Some(ClientEvent::ResumeGame));
        assert_eq!(session.state(), SessionState::InGame);
    }

    #[test]
    fn test_game_config_outside_lobby_is_ignored() {
        let config = GameConfig::new("RYU", "KEN", "map2");

        let mut paused = in_game("P2");
        paused.apply(Packet::PauseGame {
            player_id: "P1".to_string(),
        });
        assert_eq!(paused.apply(Packet::GameConfig(config.clone())), None);
        assert_eq!(paused.state(), SessionState::Paused);

        let mut lobby = connected("P2");
        assert_eq!(lobby.apply(Packet::GameConfig(config.clone())), None);
        assert_eq!(lobby.state(), SessionState::Connected);

        let mut fighting = in_game("P1");
        assert_eq!(fighting.apply(Packet::GameConfig(config)), None);
        assert_eq!(fighting.state(), SessionState::InGame);
    }

    #[test]
    fn test_resume_outside_pause_is_ignored() {
        let mut session = in_game("P1");
        let event = session.apply(Packet::ResumeGame {
            player_id: "P2".to_string(),
        });
        assert_eq!(event, None);
        assert_eq!(session.state(), SessionState::InGame);
    }

    #[test]
    fn test_input_broadcast_becomes_event() {
        let mut session = in_game("P2");
        let event = session.apply(Packet::InputBroadcast {
            player_id: "P1".to_string(),
            frame_number: 1,
            input_bits: InputBits::LEFT | InputBits::LIGHT_PUNCH,
        });

        assert_eq!(
            event,
            Some(ClientEvent::InputReceived {
                player_id: "P1".to_string(),
                frame_number: 1,
                input_bits: InputBits::LEFT | InputBits::LIGHT_PUNCH,
            })
        );
    }

    #[test]
    fn test_peer_disconnect_returns_to_connected() {
        let mut session = in_game("P1");
        let event = session.apply(Packet::PlayerDisconnected {
            player_id: "P2".to_string(),
        });

        assert_eq!(
            event,
            Some(ClientEvent::PlayerDisconnected {
                player_id: "P2".to_string()
            })
        );
        assert_eq!(session.state(), SessionState::Connected);

        // A returning peer triggers a fresh GAME_START
        let event = session.apply(Packet::GameStart {
            player_ids: vec!["P1".to_string(), "P2".to_string()],
        });
        assert!(event.is_some());
        assert_eq!(session.state(), SessionState::ConfiguringGame);
    }

    #[test]
    fn test_match_flow_messages_respect_roles() {
        let mut host = in_game("P1");
        let mut peer = in_game("P2");

        let rematch = Packet::Rematch {
            player_id: "P1".to_string(),
        };
        assert_eq!(peer.apply(rematch.clone()), Some(ClientEvent::RematchRequest));
        assert_eq!(host.apply(rematch), None);

        let next_round = Packet::NextRound {
            player_id: "P1".to_string(),
            round: 3,
            p1_wins: 1,
            p2_wins: 1,
        };
        assert_eq!(
            peer.apply(next_round.clone()),
            Some(ClientEvent::NextRound {
                round: 3,
                p1_wins: 1,
                p2_wins: 1
            })
        );
        assert_eq!(host.apply(next_round), None);

        let waiting = Packet::WaitingForHost {
            player_id: "P2".to_string(),
        };
        assert_eq!(host.apply(waiting.clone()), Some(ClientEvent::WaitingForHost));
        assert_eq!(peer.apply(waiting), None);
    }

    #[test]
    fn test_authorization() {
        let host = Session::new("P1", "Alice");
        let peer = Session::new("P2", "Bob");

        assert!(host.authorize_host_only("send_game_config").is_ok());
        assert!(matches!(
            peer.authorize_host_only("send_game_config"),
            Err(ClientError::HostOnly("send_game_config"))
        ));
        assert!(peer.authorize_non_host_only("send_waiting_for_host").is_ok());
        assert!(matches!(
            host.authorize_non_host_only("send_waiting_for_host"),
            Err(ClientError::NonHostOnly(_))
        ));
    }

    #[test]
    fn test_require_state() {
        let session = connected("P1");
        assert!(session.require_state("pause", SessionState::Connected).is_ok());

        match session.require_state("pause", SessionState::InGame) {
            Err(ClientError::InvalidState { operation, state }) => {
                assert_eq!(operation, "pause");
                assert_eq!(state, SessionState::Connected);
            }
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_connect_timeout() {
        let mut session = Session::new("P1", "Alice");
        let start = Instant::now();
        let timeout = Duration::from_millis(5000);

        assert!(!session.connect_timed_out(start, timeout));
        session.begin_connect(start).unwrap();
        assert!(!session.connect_timed_out(start + Duration::from_millis(4999), timeout));
        assert!(session.connect_timed_out(start + Duration::from_millis(5000), timeout));

        session.apply(Packet::ConnectAccepted {
            assigned_id: "P1".to_string(),
        });
        assert!(!session.connect_timed_out(start + Duration::from_secs(60), timeout));
    }

    #[test]
    fn test_frame_numbers_survive_reset() {
        let mut session = connected("P1");
        assert_eq!(session.next_frame(), 1);
        assert_eq!(session.next_frame(), 2);

        session.reset();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.frame_number(), 2);
        assert_eq!(session.next_frame(), 3);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::InGame.to_string(), "in game");
        assert_eq!(SessionState::AwaitingConfig.to_string(), "awaiting config");
    }
}
