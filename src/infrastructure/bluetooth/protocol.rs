//! GiiKER Cube Protocol
//!
//! This module contains the frame definitions for notifications sent by
//! the cube. Every device-specific constant lives here; nothing outside this
//! module sees raw bytes.
//!
//! # Framing
//!
//! Each notification carries exactly one frame. On the wire every byte `i` is
//! XOR-ed with [`XOR_KEY`]`[i]`. After removing the key, the last byte is the
//! wrapping 8-bit sum of all preceding bytes and the first byte names the
//! frame type.

use crate::domain::cube::Cubies;
use crate::domain::models::{BatteryStatus, Face, Frame, Move, MoveEvent, StateSnapshot, Turn};
use thiserror::Error;
use tracing::{debug, trace};

/// Per-device obfuscation key (the GiiKER key table).
pub const XOR_KEY: [u8; 36] = [
    176, 81, 104, 224, 86, 137, 237, 119, 38, 26, 193, 161, 210, 126, 150, 81, 93, 13, 236, 249,
    89, 235, 88, 24, 113, 81, 214, 131, 130, 199, 2, 169, 39, 165, 171, 41,
];

/// Frame type header bytes
pub mod header {
    pub const MOVE: u8 = 0xA5;
    pub const SNAPSHOT: u8 = 0xA7;
    pub const BATTERY: u8 = 0xB5;
}

pub const MOVE_FRAME_LEN: usize = 9;
pub const SNAPSHOT_FRAME_LEN: usize = 20;
pub const BATTERY_FRAME_LEN: usize = 4;

/// Length of the packed cubie state inside a snapshot frame.
pub const STATE_BLOCK_LEN: usize = 16;

/// Corner slots in device order, as indices of our slot numbering
/// (DFR, URF, UFL, DLF, DRB, UBR, ULB, DBL).
const DEVICE_CORNERS: [u8; 8] = [4, 0, 1, 5, 7, 3, 2, 6];

/// Edge slots in device order
/// (DF, FR, UF, FL, DR, UR, UL, DL, DB, BR, UB, BL).
const DEVICE_EDGES: [u8; 12] = [5, 8, 1, 9, 4, 0, 2, 6, 7, 11, 3, 10];

/// Face nibble of a move code
const DEVICE_FACES: [(u8, Face); 6] = [
    (1, Face::B),
    (2, Face::D),
    (3, Face::L),
    (4, Face::U),
    (5, Face::R),
    (6, Face::F),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected frame length: {0}")]
    BadLength(usize),
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumFailed { expected: u8, actual: u8 },
    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),
    #[error("unknown move code: {0:#04x}")]
    UnknownMove(u8),
    #[error("malformed state block")]
    MalformedSnapshot,
}

fn obfuscate(bytes: &mut [u8]) {
    for (byte, key) in bytes.iter_mut().zip(XOR_KEY.iter()) {
        *byte ^= key;
    }
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Decode one notification payload into a typed frame.
///
/// # Move frame (9 bytes)
///
/// ```text
/// [0]    : 0xA5
/// [1-2]  : Sequence number (u16 little-endian)
/// [3]    : Move code: face nibble (B=1 D=2 L=3 U=4 R=5 F=6),
///          turn nibble (1 = clockwise, 2 = half turn, 3 = counter-clockwise)
/// [4-7]  : Milliseconds since previous move (u32 little-endian)
/// [8]    : Checksum
/// ```
///
/// # Snapshot frame (20 bytes)
///
/// ```text
/// [0]    : 0xA7
/// [1-2]  : Sequence number of the last move included, 0 if none
/// [3-18] : State block
///          [0-3]   corner pieces, one nibble each, 1-based
///          [4-7]   corner twists, one nibble each (3 or 0 = oriented)
///          [8-13]  edge pieces, one nibble each, 1-based
///          [14-15] edge flips, one bit each, MSB first
/// [19]   : Checksum
/// ```
///
/// # Battery frame (4 bytes)
///
/// ```text
/// [0]    : 0xB5
/// [1]    : Level in percent
/// [2]    : Charging (non-zero = charging)
/// [3]    : Checksum
/// ```
pub fn decode(raw: &[u8]) -> Result<Frame, DecodeError> {
    let length = raw.len();
    if ![MOVE_FRAME_LEN, SNAPSHOT_FRAME_LEN, BATTERY_FRAME_LEN].contains(&length) {
        debug!("Unexpected frame length: {}", length);
        return Err(DecodeError::BadLength(length));
    }

    let mut bytes = raw.to_vec();
    obfuscate(&mut bytes);
    trace!("Deobfuscated frame: {:02X?}", &bytes);

    let (body, sum) = bytes.split_at(length - 1);
    let expected = checksum(body);
    if expected != sum[0] {
        return Err(DecodeError::ChecksumFailed {
            expected,
            actual: sum[0],
        });
    }

    let (kind, expected_len) = match body[0] {
        header::MOVE => (header::MOVE, MOVE_FRAME_LEN),
        header::SNAPSHOT => (header::SNAPSHOT, SNAPSHOT_FRAME_LEN),
        header::BATTERY => (header::BATTERY, BATTERY_FRAME_LEN),
        other => return Err(DecodeError::UnknownFrameType(other)),
    };
    if expected_len != length {
        return Err(DecodeError::BadLength(length));
    }

    match kind {
        header::MOVE => {
            let sequence = u16::from_le_bytes([body[1], body[2]]);
            let mv = decode_move(body[3])?;
            let timestamp_offset_ms = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
            Ok(Frame::Move(MoveEvent {
                mv,
                sequence,
                timestamp_offset_ms,
            }))
        }
        header::SNAPSHOT => {
            let sequence = match u16::from_le_bytes([body[1], body[2]]) {
                0 => None,
                seq => Some(seq),
            };
            let cubies = decode_state_block(&body[3..3 + STATE_BLOCK_LEN])?;
            Ok(Frame::Snapshot(StateSnapshot { sequence, cubies }))
        }
        _ => Ok(Frame::Battery(BatteryStatus {
            level: body[1],
            charging: body[2] != 0,
        })),
    }
}

/// Build the wire bytes for a frame. Exact inverse of [`decode`].
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut bytes = match frame {
        Frame::Move(event) => {
            let mut bytes = vec![header::MOVE];
            bytes.extend_from_slice(&event.sequence.to_le_bytes());
            bytes.push(encode_move(event.mv));
            bytes.extend_from_slice(&event.timestamp_offset_ms.to_le_bytes());
            bytes
        }
        Frame::Snapshot(snapshot) => {
            let mut bytes = vec![header::SNAPSHOT];
            bytes.extend_from_slice(&snapshot.sequence.unwrap_or(0).to_le_bytes());
            bytes.extend_from_slice(&encode_state_block(&snapshot.cubies));
            bytes
        }
        Frame::Battery(battery) => vec![header::BATTERY, battery.level, battery.charging as u8],
    };
    bytes.push(checksum(&bytes));
    obfuscate(&mut bytes);
    bytes
}

pub fn decode_move(code: u8) -> Result<Move, DecodeError> {
    let face = DEVICE_FACES
        .iter()
        .find(|(nibble, _)| *nibble == code >> 4)
        .map(|(_, face)| *face);
    let turn = Turn::ALL
        .into_iter()
        .find(|turn| turn.count() == code & 0x0F);
    match (face, turn) {
        (Some(face), Some(turn)) => Ok(Move::new(face, turn)),
        _ => Err(DecodeError::UnknownMove(code)),
    }
}

pub fn encode_move(mv: Move) -> u8 {
    let nibble = DEVICE_FACES
        .iter()
        .find(|(_, face)| *face == mv.face)
        .map(|(nibble, _)| *nibble)
        .unwrap_or_default();
    nibble << 4 | mv.turn.count()
}

fn nibbles(bytes: &[u8]) -> impl Iterator<Item = u8> + '_ {
    bytes.iter().flat_map(|b| [b >> 4, b & 0x0F])
}

fn device_index(table: &[u8], slot: u8) -> u8 {
    table.iter().position(|s| *s == slot).unwrap_or_default() as u8
}

fn decode_state_block(block: &[u8]) -> Result<Cubies, DecodeError> {
    let mut cubies = Cubies::SOLVED;

    for (i, (piece, twist)) in nibbles(&block[0..4]).zip(nibbles(&block[4..8])).enumerate() {
        if !(1..=8).contains(&piece) || twist > 3 {
            return Err(DecodeError::MalformedSnapshot);
        }
        let slot = DEVICE_CORNERS[i] as usize;
        cubies.corner_perm[slot] = DEVICE_CORNERS[piece as usize - 1];
        cubies.corner_orient[slot] = twist % 3;
    }

    let flip_bits = u16::from_be_bytes([block[14], block[15]]);
    for (i, piece) in nibbles(&block[8..14]).enumerate() {
        if !(1..=12).contains(&piece) {
            return Err(DecodeError::MalformedSnapshot);
        }
        let slot = DEVICE_EDGES[i] as usize;
        cubies.edge_perm[slot] = DEVICE_EDGES[piece as usize - 1];
        cubies.edge_orient[slot] = (flip_bits >> (15 - i) & 1) as u8;
    }

    Ok(cubies)
}

fn encode_state_block(cubies: &Cubies) -> [u8; STATE_BLOCK_LEN] {
    let mut corner_nibbles = [0u8; 16];
    for (i, slot) in DEVICE_CORNERS.iter().enumerate() {
        let slot = *slot as usize;
        corner_nibbles[i] = device_index(&DEVICE_CORNERS, cubies.corner_perm[slot]) + 1;
        // Oriented corners are reported as 3
        corner_nibbles[8 + i] = match cubies.corner_orient[slot] {
            0 => 3,
            twist => twist,
        };
    }

    let mut edge_nibbles = [0u8; 12];
    let mut flip_bits = 0u16;
    for (i, slot) in DEVICE_EDGES.iter().enumerate() {
        let slot = *slot as usize;
        edge_nibbles[i] = device_index(&DEVICE_EDGES, cubies.edge_perm[slot]) + 1;
        flip_bits |= ((cubies.edge_orient[slot] & 1) as u16) << (15 - i);
    }

    let mut block = [0u8; STATE_BLOCK_LEN];
    for (i, pair) in corner_nibbles.chunks(2).enumerate() {
        block[i] = pair[0] << 4 | pair[1];
    }
    for (i, pair) in edge_nibbles.chunks(2).enumerate() {
        block[8 + i] = pair[0] << 4 | pair[1];
    }
    block[14..16].copy_from_slice(&flip_bits.to_be_bytes());
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cube::CubeState;
    use crate::domain::models::parse_sequence;

    /// Solved cube, sequence 5, as sent by the device.
    fn solved_snapshot_bytes() -> Vec<u8> {
        encode(&Frame::Snapshot(StateSnapshot {
            sequence: Some(5),
            cubies: Cubies::SOLVED,
        }))
    }

    #[test]
    fn test_solved_state_block_matches_device_layout() {
        let block = encode_state_block(&Cubies::SOLVED);
        assert_eq!(
            block,
            [
                0x12, 0x34, 0x56, 0x78, 0x33, 0x33, 0x33, 0x33, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC,
                0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_move_frame_reference_vector() {
        // U, sequence 5, 120 ms after the previous move
        let plain: [u8; 9] = [0xA5, 0x05, 0x00, 0x41, 0x78, 0x00, 0x00, 0x00, 0x63];
        let mut wire = plain;
        for (byte, key) in wire.iter_mut().zip(XOR_KEY.iter()) {
            *byte ^= key;
        }

        let frame = decode(&wire).unwrap();
        assert_eq!(
            frame,
            Frame::Move(MoveEvent {
                mv: Move::new(Face::U, Turn::Clockwise),
                sequence: 5,
                timestamp_offset_ms: 120,
            })
        );
        assert_eq!(encode(&frame), wire.to_vec());
    }

    #[test]
    fn test_move_codes() {
        assert_eq!(decode_move(0x41), Ok(Move::new(Face::U, Turn::Clockwise)));
        assert_eq!(decode_move(0x13), Ok(Move::new(Face::B, Turn::CounterClockwise)));
        assert_eq!(decode_move(0x62), Ok(Move::new(Face::F, Turn::Double)));
        assert_eq!(decode_move(0x70), Err(DecodeError::UnknownMove(0x70)));
        assert_eq!(decode_move(0x44), Err(DecodeError::UnknownMove(0x44)));
        assert_eq!(decode_move(0x00), Err(DecodeError::UnknownMove(0x00)));
        for mv in Move::all() {
            assert_eq!(decode_move(encode_move(mv)), Ok(mv));
        }
    }

    #[test]
    fn test_snapshot_of_scrambled_cube() {
        let mut cube = CubeState::new();
        cube.apply_moves(parse_sequence("R U F' D2 L B' U R2").unwrap());
        let frame = Frame::Snapshot(StateSnapshot {
            sequence: None,
            cubies: *cube.cubies(),
        });
        let wire = encode(&frame);
        assert_eq!(wire.len(), SNAPSHOT_FRAME_LEN);
        assert_eq!(decode(&wire), Ok(frame));
    }

    #[test]
    fn test_battery_frame() {
        let frame = Frame::Battery(BatteryStatus {
            level: 87,
            charging: true,
        });
        let wire = encode(&frame);
        assert_eq!(wire.len(), BATTERY_FRAME_LEN);
        assert_eq!(decode(&wire), Ok(frame));
    }

    #[test]
    fn test_bad_length() {
        assert_eq!(decode(&[]), Err(DecodeError::BadLength(0)));
        assert_eq!(decode(&[0u8; 16]), Err(DecodeError::BadLength(16)));

        // A valid battery payload stretched to move frame length
        let mut plain = vec![header::BATTERY, 50, 0, 0, 0, 0, 0, 0];
        plain.push(checksum(&plain));
        obfuscate(&mut plain);
        assert_eq!(decode(&plain), Err(DecodeError::BadLength(9)));
    }

    #[test]
    fn test_corrupted_snapshot_fails_checksum() {
        let mut wire = solved_snapshot_bytes();
        assert!(decode(&wire).is_ok());
        wire[7] ^= 0x04;
        assert!(matches!(
            decode(&wire),
            Err(DecodeError::ChecksumFailed { .. })
        ));
    }

    #[test]
    fn test_unknown_frame_type() {
        let mut plain = vec![0x42, 1, 2];
        plain.push(checksum(&plain));
        obfuscate(&mut plain);
        assert_eq!(decode(&plain), Err(DecodeError::UnknownFrameType(0x42)));
    }

    #[test]
    fn test_malformed_state_block() {
        let mut plain = vec![header::SNAPSHOT, 0, 0];
        let mut block = encode_state_block(&Cubies::SOLVED);
        block[0] = 0x02; // corner piece 0
        plain.extend_from_slice(&block);
        plain.push(checksum(&plain));
        obfuscate(&mut plain);
        assert_eq!(decode(&plain), Err(DecodeError::MalformedSnapshot));
    }
}
