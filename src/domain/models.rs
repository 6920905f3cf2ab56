use crate::domain::cube::Cubies;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the six outer faces of the cube.
///
/// The declaration order is the facelet order used by [`crate::domain::cube::Facelets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Face {
    U,
    R,
    F,
    D,
    L,
    B,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::U, Face::R, Face::F, Face::D, Face::L, Face::B];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Faces on the same axis turn around the same line through the cube
    /// (U/D = 0, R/L = 1, F/B = 2).
    pub fn axis(self) -> u8 {
        match self {
            Face::U | Face::D => 0,
            Face::R | Face::L => 1,
            Face::F | Face::B => 2,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Face::U => 'U',
            Face::R => 'R',
            Face::F => 'F',
            Face::D => 'D',
            Face::L => 'L',
            Face::B => 'B',
        }
    }

    pub fn from_letter(letter: char) -> Option<Face> {
        match letter.to_ascii_uppercase() {
            'U' => Some(Face::U),
            'R' => Some(Face::R),
            'F' => Some(Face::F),
            'D' => Some(Face::D),
            'L' => Some(Face::L),
            'B' => Some(Face::B),
            _ => None,
        }
    }
}

/// Quarter turns applied clockwise, as seen looking at the face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Turn {
    Clockwise = 1,
    Double = 2,
    CounterClockwise = 3,
}

impl Turn {
    pub const ALL: [Turn; 3] = [Turn::Clockwise, Turn::Double, Turn::CounterClockwise];

    pub fn count(self) -> u8 {
        self as u8
    }

    /// Normalize a number of clockwise quarter turns. Returns `None` for a
    /// multiple of four, which leaves the face where it started.
    pub fn from_quarters(quarters: u8) -> Option<Turn> {
        match quarters % 4 {
            1 => Some(Turn::Clockwise),
            2 => Some(Turn::Double),
            3 => Some(Turn::CounterClockwise),
            _ => None,
        }
    }

    pub fn inverse(self) -> Turn {
        match self {
            Turn::Clockwise => Turn::CounterClockwise,
            Turn::Double => Turn::Double,
            Turn::CounterClockwise => Turn::Clockwise,
        }
    }
}

/// A canonical face turn. Every physical or virtual action reduces to exactly
/// one of the 18 values of this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub face: Face,
    pub turn: Turn,
}

impl Move {
    pub const fn new(face: Face, turn: Turn) -> Self {
        Self { face, turn }
    }

    /// All 18 moves, grouped by face.
    pub fn all() -> impl Iterator<Item = Move> {
        Face::ALL
            .into_iter()
            .flat_map(|face| Turn::ALL.into_iter().map(move |turn| Move::new(face, turn)))
    }

    pub fn inverse(self) -> Move {
        Move::new(self.face, self.turn.inverse())
    }

    /// Index into the 18-entry move table.
    pub fn table_index(self) -> usize {
        self.face.index() * 3 + (self.turn.count() as usize - 1)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.turn {
            Turn::Clockwise => "",
            Turn::Double => "2",
            Turn::CounterClockwise => "'",
        };
        write!(f, "{}{}", self.face.letter(), suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid move notation: {0:?}")]
pub struct ParseMoveError(pub String);

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseMoveError(s.to_string());
        let mut chars = s.trim().chars();
        let face = chars
            .next()
            .filter(|c| c.is_ascii_uppercase())
            .and_then(Face::from_letter)
            .ok_or_else(invalid)?;
        let turn = match chars.as_str() {
            "" => Turn::Clockwise,
            "'" => Turn::CounterClockwise,
            // A half turn has no direction
            "2" | "2'" => Turn::Double,
            _ => return Err(invalid()),
        };
        Ok(Move::new(face, turn))
    }
}

/// Parse whitespace separated Singmaster notation, e.g. `"R U R' U'"`.
pub fn parse_sequence(text: &str) -> Result<Vec<Move>, ParseMoveError> {
    text.split_whitespace().map(str::parse).collect()
}

pub fn format_sequence(moves: &[Move]) -> String {
    moves
        .iter()
        .map(Move::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sticker colors in the standard western color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Red,
    Green,
    Yellow,
    Orange,
    Blue,
}

impl Color {
    /// Color of the center sticker of `face`.
    pub fn of_face(face: Face) -> Color {
        match face {
            Face::U => Color::White,
            Face::R => Color::Red,
            Face::F => Color::Green,
            Face::D => Color::Yellow,
            Face::L => Color::Orange,
            Face::B => Color::Blue,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Color::White => 'W',
            Color::Red => 'R',
            Color::Green => 'G',
            Color::Yellow => 'Y',
            Color::Orange => 'O',
            Color::Blue => 'B',
        }
    }
}

/// Where an applied move came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveSource {
    Device,
    Virtual,
}

/// Reconciler state as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    AwaitingSnapshot,
    Degraded,
}

/// A turn reported by the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveEvent {
    pub mv: Move,
    pub sequence: u16,
    /// Milliseconds since the previous reported move.
    pub timestamp_offset_ms: u32,
}

/// The full cubie state read back from the cube.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Sequence number of the last move included in this state, if the device
    /// sent one.
    pub sequence: Option<u16>,
    pub cubies: Cubies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    pub level: u8,
    pub charging: bool,
}

/// One decoded notification. Constructed by the codec and consumed right away
/// by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Move(MoveEvent),
    Snapshot(StateSnapshot),
    Battery(BatteryStatus),
}

/// Events published by the sequencing path to the transport and UI layers.
#[derive(Debug, Clone, PartialEq)]
pub enum CubeEvent {
    MoveApplied {
        mv: Move,
        source: MoveSource,
        sequence: Option<u16>,
    },
    /// The cube reached the solved state as the result of a move.
    Solved,
    StatusChanged(SyncStatus),
    /// Ask the transport to read the full state from the device.
    SnapshotRequested,
    Battery(BatteryStatus),
    /// A scramble was generated. Applied right away when no device is
    /// connected, otherwise guided step by step.
    Scrambled(Vec<Move>),
    ScrambleProgress {
        completed: usize,
        total: usize,
        next: crate::domain::scramble::GuideStep,
    },
}
