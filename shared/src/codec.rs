//! Binary codec for session packets.
//!
//! Every datagram is `[type:u8][fields...]`. Integers and floats are fixed-width
//! big-endian, booleans are one byte, and strings are a `u16` byte length followed by
//! UTF-8. Encoding refuses anything that would not fit in [`MAX_PACKET_SIZE`]; decoding
//! never panics on hostile input and reports why a datagram was rejected so the
//! receive loop can log and drop it.

use crate::packet::{Packet, PacketType};
use crate::{GameConfig, InputBits, PlayerState, MAX_PACKET_SIZE};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("string of {0} bytes exceeds the u16 length prefix")]
    StringTooLong(usize),
    #[error("{0} list entries cannot be counted in an i32")]
    TooManyEntries(usize),
    #[error("encoded packet is {0} bytes, over the datagram limit")]
    PacketTooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown packet type {0:#04x}")]
    UnknownType(u8),
    #[error("truncated packet: needed {needed} more bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("invalid list count {0}")]
    InvalidCount(i32),
}

/// Serializes a packet into a freshly allocated datagram.
pub fn encode(packet: &Packet) -> Result<Vec<u8>, EncodeError> {
    let mut writer = PacketWriter::new(packet.packet_type());

    match packet {
        Packet::Connect {
            player_id,
            player_name,
            is_host,
        } => {
            writer.put_str(player_id)?;
            writer.put_str(player_name)?;
            writer.put_bool(*is_host);
        }
        Packet::ConnectAccepted { assigned_id } => writer.put_str(assigned_id)?,
        Packet::ConnectRejected { reason } => writer.put_str(reason)?,
        Packet::Disconnect { player_id }
        | Packet::Heartbeat { player_id }
        | Packet::PlayerDisconnected { player_id }
        | Packet::PauseGame { player_id }
        | Packet::ResumeGame { player_id }
        | Packet::Rematch { player_id }
        | Packet::WaitingForHost { player_id } => writer.put_str(player_id)?,
        Packet::Input {
            player_id,
            frame_number,
            input_bits,
        }
        | Packet::InputBroadcast {
            player_id,
            frame_number,
            input_bits,
        } => {
            writer.put_str(player_id)?;
            writer.put_i64(*frame_number);
            writer.put_u16(input_bits.bits());
        }
        Packet::StateUpdate { player_id, state } => {
            writer.put_str(player_id)?;
            writer.put_f32(state.x);
            writer.put_f32(state.y);
            writer.put_i32(state.health);
            writer.put_str(&state.animation_type)?;
            writer.put_i32(state.frame_index);
        }
        Packet::GameStart { player_ids } => {
            let count = i32::try_from(player_ids.len())
                .map_err(|_| EncodeError::TooManyEntries(player_ids.len()))?;
            writer.put_i32(count);
            for player_id in player_ids {
                writer.put_str(player_id)?;
            }
        }
        Packet::GameConfig(config) => {
            writer.put_str(&config.p1_character)?;
            writer.put_str(&config.p2_character)?;
            writer.put_str(&config.map_file)?;
        }
        Packet::NextRound {
            player_id,
            round,
            p1_wins,
            p2_wins,
        } => {
            writer.put_str(player_id)?;
            writer.put_i32(*round);
            writer.put_i32(*p1_wins);
            writer.put_i32(*p2_wins);
        }
    }

    writer.finish()
}

/// Parses one datagram. Trailing bytes after the last field are ignored.
pub fn decode(data: &[u8]) -> Result<Packet, DecodeError> {
    let (&tag, body) = data.split_first().ok_or(DecodeError::Empty)?;
    let packet_type = PacketType::from_tag(tag).ok_or(DecodeError::UnknownType(tag))?;
    let mut reader = PacketReader::new(body);

    let packet = match packet_type {
        PacketType::Connect => Packet::Connect {
            player_id: reader.get_str()?,
            player_name: reader.get_str()?,
            is_host: reader.get_bool()?,
        },
        PacketType::ConnectAccepted => Packet::ConnectAccepted {
            assigned_id: reader.get_str()?,
        },
        PacketType::ConnectRejected => Packet::ConnectRejected {
            reason: reader.get_str()?,
        },
        PacketType::Disconnect => Packet::Disconnect {
            player_id: reader.get_str()?,
        },
        PacketType::Heartbeat => Packet::Heartbeat {
            player_id: reader.get_str()?,
        },
        PacketType::PlayerDisconnected => Packet::PlayerDisconnected {
            player_id: reader.get_str()?,
        },
        PacketType::PauseGame => Packet::PauseGame {
            player_id: reader.get_str()?,
        },
        PacketType::ResumeGame => Packet::ResumeGame {
            player_id: reader.get_str()?,
        },
        PacketType::Rematch => Packet::Rematch {
            player_id: reader.get_str()?,
        },
        PacketType::WaitingForHost => Packet::WaitingForHost {
            player_id: reader.get_str()?,
        },
        PacketType::Input => Packet::Input {
            player_id: reader.get_str()?,
            frame_number: reader.get_i64()?,
            input_bits: InputBits::from_bits(reader.get_u16()?),
        },
        PacketType::InputBroadcast => Packet::InputBroadcast {
            player_id: reader.get_str()?,
            frame_number: reader.get_i64()?,
            input_bits: InputBits::from_bits(reader.get_u16()?),
        },
        PacketType::StateUpdate => Packet::StateUpdate {
            player_id: reader.get_str()?,
            state: PlayerState {
                x: reader.get_f32()?,
                y: reader.get_f32()?,
                health: reader.get_i32()?,
                animation_type: reader.get_str()?,
                frame_index: reader.get_i32()?,
            },
        },
        PacketType::GameStart => {
            let count = reader.get_i32()?;
            if count < 0 {
                return Err(DecodeError::InvalidCount(count));
            }
            // Each id needs at least its two-byte prefix, so cap the allocation.
            let capacity = (count as usize).min(reader.remaining() / 2);
            let mut player_ids = Vec::with_capacity(capacity);
            for _ in 0..count {
                player_ids.push(reader.get_str()?);
            }
            Packet::GameStart { player_ids }
        }
        PacketType::GameConfig => Packet::GameConfig(GameConfig {
            p1_character: reader.get_str()?,
            p2_character: reader.get_str()?,
            map_file: reader.get_str()?,
        }),
        PacketType::NextRound => Packet::NextRound {
            player_id: reader.get_str()?,
            round: reader.get_i32()?,
            p1_wins: reader.get_i32()?,
            p2_wins: reader.get_i32()?,
        },
    };

    Ok(packet)
}

struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    fn new(packet_type: PacketType) -> Self {
        let mut buffer = Vec::with_capacity(64);
        buffer.push(packet_type.tag());
        Self { buffer }
    }

    fn put_bool(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    fn put_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn put_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn put_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn put_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn put_str(&mut self, value: &str) -> Result<(), EncodeError> {
        let len =
            u16::try_from(value.len()).map_err(|_| EncodeError::StringTooLong(value.len()))?;
        self.put_u16(len);
        self.buffer.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, EncodeError> {
        if self.buffer.len() > MAX_PACKET_SIZE {
            return Err(EncodeError::PacketTooLarge(self.buffer.len()));
        }
        Ok(self.buffer)
    }
}

struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.take_slice(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn get_bool(&mut self) -> Result<bool, DecodeError> {
        let [byte] = self.take::<1>()?;
        Ok(byte != 0)
    }

    fn get_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    fn get_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    fn get_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    fn get_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_be_bytes(self.take()?))
    }

    fn get_str(&mut self) -> Result<String, DecodeError> {
        let len = self.get_u16()? as usize;
        let bytes = self.take_slice(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packets() -> Vec<Packet> {
        vec![
            Packet::Connect {
                player_id: "P1".to_string(),
                player_name: "Alice".to_string(),
                is_host: true,
            },
            Packet::ConnectAccepted {
                assigned_id: "P2".to_string(),
            },
            Packet::ConnectRejected {
                reason: "Server full".to_string(),
            },
            Packet::Disconnect {
                player_id: "P2".to_string(),
            },
            Packet::Input {
                player_id: "P1".to_string(),
                frame_number: 1,
                input_bits: InputBits::LEFT | InputBits::LIGHT_PUNCH,
            },
            Packet::InputBroadcast {
                player_id: "P2".to_string(),
                frame_number: i64::MAX,
                input_bits: InputBits::BLOCK,
            },
            Packet::StateUpdate {
                player_id: "P1".to_string(),
                state: PlayerState::new(120.5, 300.0, 87, "light_punch", 4),
            },
            Packet::GameStart {
                player_ids: vec!["P1".to_string(), "P2".to_string()],
            },
            Packet::Heartbeat {
                player_id: "P2".to_string(),
            },
            Packet::PlayerDisconnected {
                player_id: "P2".to_string(),
            },
            Packet::GameConfig(GameConfig::new("RYU", "KEN", "map1")),
            Packet::PauseGame {
                player_id: "P2".to_string(),
            },
            Packet::ResumeGame {
                player_id: "P1".to_string(),
            },
            Packet::Rematch {
                player_id: "P1".to_string(),
            },
            Packet::WaitingForHost {
                player_id: "P2".to_string(),
            },
            Packet::NextRound {
                player_id: "P1".to_string(),
                round: 3,
                p1_wins: 1,
                p2_wins: 1,
            },
        ]
    }

    #[test]
    fn test_roundtrip_every_packet_type() {
        for packet in sample_packets() {
            let bytes = encode(&packet).unwrap();
            assert_eq!(bytes[0], packet.packet_type().tag());
            assert_eq!(decode(&bytes).unwrap(), packet);
        }
    }

    #[test]
    fn test_connect_wire_layout() {
        let packet = Packet::Connect {
            player_id: "P1".to_string(),
            player_name: "Al".to_string(),
            is_host: true,
        };
        let bytes = encode(&packet).unwrap();
        assert_eq!(
            bytes,
            vec![0x01, 0x00, 0x02, b'P', b'1', 0x00, 0x02, b'A', b'l', 0x01]
        );
    }

    #[test]
    fn test_input_is_big_endian() {
        let packet = Packet::Input {
            player_id: "P2".to_string(),
            frame_number: 0x0102,
            input_bits: InputBits::BLOCK | InputBits::LEFT,
        };
        let bytes = encode(&packet).unwrap();
        assert_eq!(
            bytes,
            vec![
                0x10, 0x00, 0x02, b'P', b'2', // tag + id
                0, 0, 0, 0, 0, 0, 0x01, 0x02, // frame
                0x01, 0x01, // bits
            ]
        );
    }

    #[test]
    fn test_game_start_count_prefix() {
        let packet = Packet::GameStart {
            player_ids: vec!["P1".to_string(), "P2".to_string()],
        };
        let bytes = encode(&packet).unwrap();
        assert_eq!(&bytes[..5], &[0x30, 0, 0, 0, 2]);
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(decode(&[0x99, 0x00]), Err(DecodeError::UnknownType(0x99)));
    }

    #[test]
    fn test_empty_datagram() {
        assert_eq!(decode(&[]), Err(DecodeError::Empty));
    }

    #[test]
    fn test_truncated_packets() {
        for packet in sample_packets() {
            let bytes = encode(&packet).unwrap();
            let cut = &bytes[..bytes.len() - 1];
            assert!(
                matches!(decode(cut), Err(DecodeError::Truncated { .. })),
                "{} should fail when truncated",
                packet.packet_type()
            );
        }
    }

    #[test]
    fn test_string_length_beyond_payload() {
        // Claims a 10-byte id but carries 2.
        let bytes = [0x04, 0x00, 0x0A, b'P', b'2'];
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::Truncated {
                needed: 10,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes = [0x40, 0x00, 0x02, 0xFF, 0xFE];
        assert_eq!(decode(&bytes), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_negative_game_start_count() {
        let bytes = [0x30, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode(&bytes), Err(DecodeError::InvalidCount(-1)));
    }

    #[test]
    fn test_huge_game_start_count_is_truncated_not_allocated() {
        let bytes = [0x30, 0x7F, 0xFF, 0xFF, 0xFF, 0x00, 0x00];
        assert!(matches!(decode(&bytes), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = encode(&Packet::Heartbeat {
            player_id: "P1".to_string(),
        })
        .unwrap();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(
            decode(&bytes).unwrap(),
            Packet::Heartbeat {
                player_id: "P1".to_string()
            }
        );
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let packet = Packet::ConnectRejected {
            reason: "x".repeat(MAX_PACKET_SIZE),
        };
        assert_eq!(
            encode(&packet),
            Err(EncodeError::PacketTooLarge(MAX_PACKET_SIZE + 3))
        );
    }

    #[test]
    fn test_string_too_long_for_prefix() {
        let packet = Packet::Heartbeat {
            player_id: "x".repeat(u16::MAX as usize + 1),
        };
        assert_eq!(
            encode(&packet),
            Err(EncodeError::StringTooLong(u16::MAX as usize + 1))
        );
    }

    #[test]
    fn test_nonzero_bool_byte_is_true() {
        let bytes = [0x01, 0x00, 0x00, 0x00, 0x00, 0x07];
        match decode(&bytes).unwrap() {
            Packet::Connect { is_host, .. } => assert!(is_host),
            other => panic!("Unexpected packet {:?}", other),
        }
    }
}
