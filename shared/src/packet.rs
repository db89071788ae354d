//! Packet model for the session protocol.

use crate::{GameConfig, InputBits, PlayerState};
use std::fmt;

/// One-byte tag that leads every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 0x01,
    ConnectAccepted = 0x02,
    ConnectRejected = 0x03,
    Disconnect = 0x04,
    Input = 0x10,
    InputBroadcast = 0x11,
    StateUpdate = 0x20,
    GameStart = 0x30,
    Heartbeat = 0x40,
    PlayerDisconnected = 0x50,
    GameConfig = 0x60,
    PauseGame = 0x70,
    ResumeGame = 0x71,
    Rematch = 0x80,
    WaitingForHost = 0x81,
    NextRound = 0x82,
}

impl PacketType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        let packet_type = match tag {
            0x01 => PacketType::Connect,
            0x02 => PacketType::ConnectAccepted,
            0x03 => PacketType::ConnectRejected,
            0x04 => PacketType::Disconnect,
            0x10 => PacketType::Input,
            0x11 => PacketType::InputBroadcast,
            0x20 => PacketType::StateUpdate,
            0x30 => PacketType::GameStart,
            0x40 => PacketType::Heartbeat,
            0x50 => PacketType::PlayerDisconnected,
            0x60 => PacketType::GameConfig,
            0x70 => PacketType::PauseGame,
            0x71 => PacketType::ResumeGame,
            0x80 => PacketType::Rematch,
            0x81 => PacketType::WaitingForHost,
            0x82 => PacketType::NextRound,
            _ => return None,
        };
        Some(packet_type)
    }

    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketType::Connect => "CONNECT",
            PacketType::ConnectAccepted => "CONNECT_ACCEPTED",
            PacketType::ConnectRejected => "CONNECT_REJECTED",
            PacketType::Disconnect => "DISCONNECT",
            PacketType::Input => "INPUT",
            PacketType::InputBroadcast => "INPUT_BROADCAST",
            PacketType::StateUpdate => "STATE_UPDATE",
            PacketType::GameStart => "GAME_START",
            PacketType::Heartbeat => "HEARTBEAT",
            PacketType::PlayerDisconnected => "PLAYER_DISCONNECTED",
            PacketType::GameConfig => "GAME_CONFIG",
            PacketType::PauseGame => "PAUSE_GAME",
            PacketType::ResumeGame => "RESUME_GAME",
            PacketType::Rematch => "REMATCH",
            PacketType::WaitingForHost => "WAITING_FOR_HOST",
            PacketType::NextRound => "NEXT_ROUND",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    // Connection management
    Connect {
        player_id: String,
        player_name: String,
        is_host: bool,
    },
    ConnectAccepted {
        assigned_id: String,
    },
    ConnectRejected {
        reason: String,
    },
    Disconnect {
        player_id: String,
    },
    Heartbeat {
        player_id: String,
    },
    PlayerDisconnected {
        player_id: String,
    },

    // Gameplay traffic
    Input {
        player_id: String,
        frame_number: i64,
        input_bits: InputBits,
    },
    InputBroadcast {
        player_id: String,
        frame_number: i64,
        input_bits: InputBits,
    },
    StateUpdate {
        player_id: String,
        state: PlayerState,
    },

    // Session control
    GameStart {
        player_ids: Vec<String>,
    },
    GameConfig(GameConfig),
    PauseGame {
        player_id: String,
    },
    ResumeGame {
        player_id: String,
    },
    Rematch {
        player_id: String,
    },
    WaitingForHost {
        player_id: String,
    },
    NextRound {
        player_id: String,
        round: i32,
        p1_wins: i32,
        p2_wins: i32,
    },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect { .. } => PacketType::Connect,
            Packet::ConnectAccepted { .. } => PacketType::ConnectAccepted,
            Packet::ConnectRejected { .. } => PacketType::ConnectRejected,
            Packet::Disconnect { .. } => PacketType::Disconnect,
            Packet::Heartbeat { .. } => PacketType::Heartbeat,
            Packet::PlayerDisconnected { .. } => PacketType::PlayerDisconnected,
            Packet::Input { .. } => PacketType::Input,
            Packet::InputBroadcast { .. } => PacketType::InputBroadcast,
            Packet::StateUpdate { .. } => PacketType::StateUpdate,
            Packet::GameStart { .. } => PacketType::GameStart,
            Packet::GameConfig(_) => PacketType::GameConfig,
            Packet::PauseGame { .. } => PacketType::PauseGame,
            Packet::ResumeGame { .. } => PacketType::ResumeGame,
            Packet::Rematch { .. } => PacketType::Rematch,
            Packet::WaitingForHost { .. } => PacketType::WaitingForHost,
            Packet::NextRound { .. } => PacketType::NextRound,
        }
    }
}
