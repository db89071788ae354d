//! Protocol types shared by the fighting-game server and client.
//!
//! Everything that crosses the wire lives here: the [`Packet`] model, the binary
//! [`codec`], the [`InputBits`] flag set and the per-player [`PlayerState`] carried by
//! STATE_UPDATE. The protocol constants below are the defaults both sides agree on.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod codec;
pub mod packet;
pub mod shutdown;

pub use codec::{decode, encode, DecodeError, EncodeError};
pub use packet::{Packet, PacketType};
pub use shutdown::{Shutdown, ShutdownHandle};

pub const DEFAULT_PORT: u16 = 5555;
pub const MAX_PACKET_SIZE: usize = 1024;
pub const MAX_PLAYERS: usize = 2;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(1000);
pub const INPUT_SEND_INTERVAL: Duration = Duration::from_millis(16);
pub const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Player id that owns the host role.
pub const HOST_PLAYER_ID: &str = "P1";

pub const STAGE_WIDTH: f32 = 1280.0;
pub const STAGE_HEIGHT: f32 = 720.0;
pub const MAX_HEALTH: i32 = 100;

/// Returns true when `player_id` is the host's id.
pub fn is_host_id(player_id: &str) -> bool {
    player_id == HOST_PLAYER_ID
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn timestamp_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    (millis.min(u64::MAX as u128)) as u64
}

/// Button and direction flags packed into the 16-bit input field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InputBits(u16);

impl InputBits {
    pub const NONE: InputBits = InputBits(0);
    pub const LEFT: InputBits = InputBits(1 << 0);
    pub const RIGHT: InputBits = InputBits(1 << 1);
    pub const UP: InputBits = InputBits(1 << 2);
    pub const DOWN: InputBits = InputBits(1 << 3);
    pub const LIGHT_PUNCH: InputBits = InputBits(1 << 4);
    pub const HEAVY_PUNCH: InputBits = InputBits(1 << 5);
    pub const LIGHT_KICK: InputBits = InputBits(1 << 6);
    pub const HEAVY_KICK: InputBits = InputBits(1 << 7);
    pub const BLOCK: InputBits = InputBits(1 << 8);

    const NAMED: [(InputBits, &'static str); 9] = [
        (Self::LEFT, "LEFT"),
        (Self::RIGHT, "RIGHT"),
        (Self::UP, "UP"),
        (Self::DOWN, "DOWN"),
        (Self::LIGHT_PUNCH, "LIGHT_PUNCH"),
        (Self::HEAVY_PUNCH, "HEAVY_PUNCH"),
        (Self::LIGHT_KICK, "LIGHT_KICK"),
        (Self::HEAVY_KICK, "HEAVY_KICK"),
        (Self::BLOCK, "BLOCK"),
    ];

    /// Wraps raw wire bits. Unknown high bits are preserved untouched.
    pub const fn from_bits(bits: u16) -> Self {
        InputBits(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: InputBits) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for InputBits {
    type Output = InputBits;

    fn bitor(self, rhs: InputBits) -> InputBits {
        InputBits(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for InputBits {
    fn bitor_assign(&mut self, rhs: InputBits) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for InputBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        if first {
            write!(f, "{:#06x}", self.0)?;
        }
        Ok(())
    }
}

/// Character and stage selection chosen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub p1_character: String,
    pub p2_character: String,
    pub map_file: String,
}

impl GameConfig {
    pub fn new(
        p1_character: impl Into<String>,
        p2_character: impl Into<String>,
        map_file: impl Into<String>,
    ) -> Self {
        Self {
            p1_character: p1_character.into(),
            p2_character: p2_character.into(),
            map_file: map_file.into(),
        }
    }
}

/// Fighter state carried by a STATE_UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub health: i32,
    pub animation_type: String,
    pub frame_index: i32,
}

impl PlayerState {
    pub fn new(
        x: f32,
        y: f32,
        health: i32,
        animation_type: impl Into<String>,
        frame_index: i32,
    ) -> Self {
        Self {
            x,
            y,
            health,
            animation_type: animation_type.into(),
            frame_index,
        }
    }

    /// Returns a copy with position, health and frame index forced into the stage bounds.
    /// Non-finite coordinates collapse to 0.
    pub fn clamped(&self) -> Self {
        Self {
            x: clamp_coordinate(self.x, STAGE_WIDTH),
            y: clamp_coordinate(self.y, STAGE_HEIGHT),
            health: self.health.clamp(0, MAX_HEALTH),
            animation_type: self.animation_type.clone(),
            frame_index: self.frame_index.max(0),
        }
    }
}

fn clamp_coordinate(value: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, max)
    } else {
        0.0
    }
}

/// The server's latest record of one player's state.
#[derive(Debug, Clone, PartialEq)]
pub struct GameStateSnapshot {
    pub state: PlayerState,
    /// Receipt time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl GameStateSnapshot {
    /// Builds a snapshot from a received state, clamping it on the way in.
    pub fn from_update(state: &PlayerState, timestamp: u64) -> Self {
        Self {
            state: state.clamped(),
            timestamp,
        }
    }
}
