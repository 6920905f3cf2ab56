//! Cubie model of the 3x3x3 cube
//!
//! The state is kept as permutation and orientation arrays for the 8 corners
//! and 12 edges. Centers never move, so the sticker view is derived from these
//! arrays through a fixed layout table.

use crate::domain::models::{Color, Face, Move, StateSnapshot};
use crate::domain::move_table::permutation_delta;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("corner and edge permutation parities differ")]
    InvalidParity,
    #[error("orientation sum is not reachable by legal moves")]
    InvalidOrientationSum,
    #[error("cubie arrays are not a permutation")]
    InvalidPermutation,
    #[error("a connected device owns the cube state")]
    DeviceAuthoritative,
}

/// Permutation and orientation arrays in "replaced by" form: slot `i` holds
/// piece `corner_perm[i]`, twisted clockwise `corner_orient[i]` times.
///
/// The same type describes move deltas, since a move is the state it produces
/// from the solved cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cubies {
    pub corner_perm: [u8; 8],
    pub corner_orient: [u8; 8],
    pub edge_perm: [u8; 12],
    pub edge_orient: [u8; 12],
}

impl Default for Cubies {
    fn default() -> Self {
        Self::SOLVED
    }
}

impl Cubies {
    pub const SOLVED: Cubies = Cubies {
        corner_perm: [0, 1, 2, 3, 4, 5, 6, 7],
        corner_orient: [0; 8],
        edge_perm: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        edge_orient: [0; 12],
    };

    /// The state reached by applying `delta` to `self`.
    pub fn then(&self, delta: &Cubies) -> Cubies {
        let mut out = Cubies::SOLVED;
        for slot in 0..8 {
            let from = delta.corner_perm[slot] as usize;
            out.corner_perm[slot] = self.corner_perm[from];
            out.corner_orient[slot] = (self.corner_orient[from] + delta.corner_orient[slot]) % 3;
        }
        for slot in 0..12 {
            let from = delta.edge_perm[slot] as usize;
            out.edge_perm[slot] = self.edge_perm[from];
            out.edge_orient[slot] = (self.edge_orient[from] + delta.edge_orient[slot]) % 2;
        }
        out
    }

    pub fn corner_parity(&self) -> u8 {
        parity(&self.corner_perm)
    }

    pub fn edge_parity(&self) -> u8 {
        parity(&self.edge_perm)
    }

    /// Check that the arrays describe a state reachable by legal moves.
    pub fn validate(&self) -> Result<(), StateError> {
        if !is_permutation(&self.corner_perm) || !is_permutation(&self.edge_perm) {
            return Err(StateError::InvalidPermutation);
        }
        if self.corner_orient.iter().any(|o| *o > 2) || self.edge_orient.iter().any(|o| *o > 1) {
            return Err(StateError::InvalidPermutation);
        }
        if self.corner_parity() != self.edge_parity() {
            return Err(StateError::InvalidParity);
        }
        let twist: u32 = self.corner_orient.iter().map(|o| *o as u32).sum();
        let flip: u32 = self.edge_orient.iter().map(|o| *o as u32).sum();
        if twist % 3 != 0 || flip % 2 != 0 {
            return Err(StateError::InvalidOrientationSum);
        }
        Ok(())
    }
}

fn is_permutation(perm: &[u8]) -> bool {
    let mut seen = [false; 12];
    perm.iter().all(|p| {
        let p = *p as usize;
        p < perm.len() && !std::mem::replace(&mut seen[p], true)
    })
}

fn parity(perm: &[u8]) -> u8 {
    let mut inversions = 0;
    for i in 0..perm.len() {
        for j in i + 1..perm.len() {
            if perm[i] > perm[j] {
                inversions += 1;
            }
        }
    }
    inversions % 2
}

/// Sticker positions of each corner slot, starting with its U/D sticker and
/// continuing clockwise.
const CORNER_FACELETS: [[(Face, usize); 3]; 8] = [
    [(Face::U, 8), (Face::R, 0), (Face::F, 2)],
    [(Face::U, 6), (Face::F, 0), (Face::L, 2)],
    [(Face::U, 0), (Face::L, 0), (Face::B, 2)],
    [(Face::U, 2), (Face::B, 0), (Face::R, 2)],
    [(Face::D, 2), (Face::F, 8), (Face::R, 6)],
    [(Face::D, 0), (Face::L, 8), (Face::F, 6)],
    [(Face::D, 6), (Face::B, 8), (Face::L, 6)],
    [(Face::D, 8), (Face::R, 8), (Face::B, 6)],
];

/// Sticker positions of each edge slot, reference sticker first.
const EDGE_FACELETS: [[(Face, usize); 2]; 12] = [
    [(Face::U, 5), (Face::R, 1)],
    [(Face::U, 7), (Face::F, 1)],
    [(Face::U, 3), (Face::L, 1)],
    [(Face::U, 1), (Face::B, 1)],
    [(Face::D, 5), (Face::R, 7)],
    [(Face::D, 1), (Face::F, 7)],
    [(Face::D, 3), (Face::L, 7)],
    [(Face::D, 7), (Face::B, 7)],
    [(Face::F, 5), (Face::R, 3)],
    [(Face::F, 3), (Face::L, 5)],
    [(Face::B, 5), (Face::L, 3)],
    [(Face::B, 3), (Face::R, 5)],
];

/// Sticker colors for the six faces, in [`Face`] order. Stickers are numbered
/// row by row as seen looking straight at the face:
///
/// ```text
/// 0 1 2
/// 3 4 5
/// 6 7 8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facelets([[Color; 9]; 6]);

impl Facelets {
    pub fn solved() -> Self {
        let mut grid = [[Color::White; 9]; 6];
        for face in Face::ALL {
            grid[face.index()] = [Color::of_face(face); 9];
        }
        Self(grid)
    }

    pub fn face(&self, face: Face) -> &[Color; 9] {
        &self.0[face.index()]
    }

    pub fn count(&self, color: Color) -> usize {
        self.0.iter().flatten().filter(|c| **c == color).count()
    }

    /// Number of stickers that differ from `other`.
    pub fn diff(&self, other: &Facelets) -> usize {
        self.0
            .iter()
            .flatten()
            .zip(other.0.iter().flatten())
            .filter(|(a, b)| a != b)
            .count()
    }

    fn row(&self, face: Face, row: usize) -> String {
        self.face(face)[row * 3..row * 3 + 3]
            .iter()
            .map(|c| c.symbol())
            .collect()
    }
}

/// Unfolded net: U on top, L F R B in the middle band, D below.
impl fmt::Display for Facelets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..3 {
            writeln!(f, "    {}", self.row(Face::U, row))?;
        }
        for row in 0..3 {
            writeln!(
                f,
                "{} {} {} {}",
                self.row(Face::L, row),
                self.row(Face::F, row),
                self.row(Face::R, row),
                self.row(Face::B, row)
            )?;
        }
        for row in 0..3 {
            writeln!(f, "    {}", self.row(Face::D, row))?;
        }
        Ok(())
    }
}

/// The locally tracked cube.
///
/// Not synchronized: callers serialize mutations through a single owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CubeState {
    cubies: Cubies,
}

impl CubeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cubies(&self) -> &Cubies {
        &self.cubies
    }

    pub fn apply_move(&mut self, mv: Move) {
        self.cubies = self.cubies.then(permutation_delta(mv));
    }

    pub fn apply_moves<I: IntoIterator<Item = Move>>(&mut self, moves: I) {
        for mv in moves {
            self.apply_move(mv);
        }
    }

    pub fn is_solved(&self) -> bool {
        self.cubies == Cubies::SOLVED
    }

    pub fn reset(&mut self) {
        self.cubies = Cubies::SOLVED;
    }

    /// Replace the state with a snapshot read from the device. The current
    /// state is kept when the snapshot is not a legal cube.
    pub fn load_snapshot(&mut self, snapshot: &StateSnapshot) -> Result<(), StateError> {
        snapshot.cubies.validate()?;
        self.cubies = snapshot.cubies;
        Ok(())
    }

    pub fn facelets(&self) -> Facelets {
        let mut grid = Facelets::solved();
        for slot in 0..8 {
            let piece = self.cubies.corner_perm[slot] as usize;
            let twist = self.cubies.corner_orient[slot] as usize;
            for n in 0..3 {
                let (face, index) = CORNER_FACELETS[slot][(n + twist) % 3];
                grid.0[face.index()][index] = Color::of_face(CORNER_FACELETS[piece][n].0);
            }
        }
        for slot in 0..12 {
            let piece = self.cubies.edge_perm[slot] as usize;
            let flip = self.cubies.edge_orient[slot] as usize;
            for n in 0..2 {
                let (face, index) = EDGE_FACELETS[slot][(n + flip) % 2];
                grid.0[face.index()][index] = Color::of_face(EDGE_FACELETS[piece][n].0);
            }
        }
        grid
    }

    /// Number of stickers in which the two cubes differ.
    pub fn facelet_diff(&self, other: &CubeState) -> usize {
        self.facelets().diff(&other.facelets())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{parse_sequence, Turn};
    use proptest::prelude::*;

    fn scrambled(text: &str) -> CubeState {
        let mut cube = CubeState::new();
        cube.apply_moves(parse_sequence(text).unwrap());
        cube
    }

    #[test]
    fn test_new_cube_is_solved() {
        let cube = CubeState::new();
        assert!(cube.is_solved());
        assert_eq!(cube.facelets(), Facelets::solved());
    }

    #[test]
    fn test_move_then_inverse_restores_solved_grid() {
        let mut cube = CubeState::new();
        cube.apply_move(Move::new(Face::U, Turn::Clockwise));
        assert!(!cube.is_solved());
        cube.apply_move(Move::new(Face::U, Turn::CounterClockwise));
        assert!(cube.is_solved());
        assert_eq!(cube.facelets(), Facelets::solved());
    }

    #[test]
    fn test_u_turn_moves_back_row_to_right() {
        let cube = scrambled("U");
        let facelets = cube.facelets();
        assert_eq!(facelets.face(Face::R)[..3], [Color::Blue; 3]);
        assert_eq!(facelets.face(Face::F)[..3], [Color::Red; 3]);
        assert_eq!(facelets.face(Face::L)[..3], [Color::Green; 3]);
        assert_eq!(facelets.face(Face::B)[..3], [Color::Orange; 3]);
        assert_eq!(*facelets.face(Face::U), [Color::White; 9]);
        assert_eq!(facelets.face(Face::R)[3..], [Color::Red; 6]);
    }

    #[test]
    fn test_r_turn_moves_front_column_up() {
        let facelets = scrambled("R").facelets();
        let up = facelets.face(Face::U);
        assert_eq!([up[2], up[5], up[8]], [Color::Green; 3]);
        let back = facelets.face(Face::B);
        assert_eq!([back[0], back[3], back[6]], [Color::White; 3]);
        let down = facelets.face(Face::D);
        assert_eq!([down[2], down[5], down[8]], [Color::Blue; 3]);
        assert_eq!(*facelets.face(Face::R), [Color::Red; 9]);
    }

    #[test]
    fn test_sexy_move_has_order_six() {
        let mut cube = CubeState::new();
        let sexy = parse_sequence("R U R' U'").unwrap();
        for i in 1..=6 {
            cube.apply_moves(sexy.iter().copied());
            assert_eq!(cube.is_solved(), i == 6);
        }
    }

    #[test]
    fn test_ru_has_order_105() {
        let mut cube = CubeState::new();
        let ru = parse_sequence("R U").unwrap();
        for i in 1..=105 {
            cube.apply_moves(ru.iter().copied());
            assert_eq!(cube.is_solved(), i == 105, "iteration {}", i);
        }
    }

    #[test]
    fn test_superflip_flips_every_edge() {
        let cube = scrambled("U R2 F B R B2 R U2 L B2 R U' D' R2 F R' L B2 U2 F2");
        assert!(cube.cubies().edge_orient.iter().all(|o| *o == 1));
        assert_eq!(cube.cubies().edge_perm, Cubies::SOLVED.edge_perm);
        assert_eq!(cube.cubies().corner_perm, Cubies::SOLVED.corner_perm);
    }

    #[test]
    fn test_load_snapshot_accepts_reachable_state() {
        let source = scrambled("F R U' L2 B D'");
        let mut cube = CubeState::new();
        let snapshot = StateSnapshot {
            sequence: None,
            cubies: *source.cubies(),
        };
        cube.load_snapshot(&snapshot).unwrap();
        assert_eq!(cube, source);
    }

    #[test]
    fn test_load_snapshot_rejects_single_swap() {
        let mut cube = scrambled("R U");
        let before = cube.clone();
        let mut cubies = Cubies::SOLVED;
        cubies.corner_perm.swap(0, 1);
        let result = cube.load_snapshot(&StateSnapshot { sequence: None, cubies });
        assert_eq!(result, Err(StateError::InvalidParity));
        assert_eq!(cube, before);
    }

    #[test]
    fn test_load_snapshot_rejects_twisted_corner() {
        let mut cube = CubeState::new();
        let mut cubies = Cubies::SOLVED;
        cubies.corner_orient[3] = 1;
        let result = cube.load_snapshot(&StateSnapshot { sequence: None, cubies });
        assert_eq!(result, Err(StateError::InvalidOrientationSum));

        let mut cubies = Cubies::SOLVED;
        cubies.edge_orient[7] = 1;
        let result = cube.load_snapshot(&StateSnapshot { sequence: None, cubies });
        assert_eq!(result, Err(StateError::InvalidOrientationSum));
        assert!(cube.is_solved());
    }

    #[test]
    fn test_load_snapshot_rejects_duplicate_pieces() {
        let mut cube = CubeState::new();
        let mut cubies = Cubies::SOLVED;
        cubies.edge_perm[0] = 1;
        let result = cube.load_snapshot(&StateSnapshot { sequence: None, cubies });
        assert_eq!(result, Err(StateError::InvalidPermutation));
    }

    #[test]
    fn test_facelet_diff() {
        let solved = CubeState::new();
        assert_eq!(solved.facelet_diff(&solved), 0);
        // The turned face stays green, only the ring of 12 side stickers changes
        assert_eq!(solved.facelet_diff(&scrambled("F")), 12);
    }

    #[test]
    fn test_reset() {
        let mut cube = scrambled("L D B' U2");
        cube.reset();
        assert!(cube.is_solved());
    }

    #[test]
    fn test_net_rendering() {
        let net = Facelets::solved().to_string();
        let lines: Vec<&str> = net.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "    WWW");
        assert_eq!(lines[4], "OOO GGG RRR BBB");
        assert_eq!(lines[8], "    YYY");
    }

    fn any_move() -> impl Strategy<Value = Move> {
        (0usize..18).prop_map(|i| Move::all().nth(i).unwrap())
    }

    proptest! {
        #[test]
        fn inverse_sequence_returns_to_solved(moves in prop::collection::vec(any_move(), 0..60)) {
            let mut cube = CubeState::new();
            cube.apply_moves(moves.iter().copied());
            cube.apply_moves(moves.iter().rev().map(|m| m.inverse()));
            prop_assert!(cube.is_solved());
        }

        #[test]
        fn moves_preserve_cube_invariants(moves in prop::collection::vec(any_move(), 1..60)) {
            let mut cube = CubeState::new();
            cube.apply_moves(moves);
            prop_assert_eq!(cube.cubies().corner_parity(), cube.cubies().edge_parity());
            prop_assert!(cube.cubies().validate().is_ok());
            let facelets = cube.facelets();
            for face in Face::ALL {
                prop_assert_eq!(facelets.count(Color::of_face(face)), 9);
                prop_assert_eq!(facelets.face(face)[4], Color::of_face(face));
            }
        }
    }
}
