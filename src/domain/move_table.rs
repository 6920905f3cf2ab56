//! Face turn mechanics
//!
//! Every face turn is described here as data: the 4-cycle of corner slots and
//! the 4-cycle of edge slots it moves, together with the orientation change
//! each piece picks up. [`CubeState`](crate::domain::cube::CubeState) only
//! composes these deltas and never branches on the face.
//!
//! ```text
//! corners: URF=0 UFL=1 ULB=2 UBR=3 DFR=4 DLF=5 DBL=6 DRB=7
//! edges:   UR=0 UF=1 UL=2 UB=3 DR=4 DF=5 DL=6 DB=7 FR=8 FL=9 BL=10 BR=11
//! ```

use crate::domain::cube::Cubies;
use crate::domain::models::{Face, Move, Turn};
use std::sync::OnceLock;

/// A clockwise quarter turn of one face.
///
/// The piece in `corners[k]` moves to `corners[k + 1]` (cyclically) and the
/// piece arriving at `corners[k]` is twisted by `twists[k]`. Edges likewise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuarterTurn {
    pub corners: [u8; 4],
    pub twists: [u8; 4],
    pub edges: [u8; 4],
    pub flips: [u8; 4],
}

/// Indexed by [`Face::index`].
pub const QUARTER_TURNS: [QuarterTurn; 6] = [
    // U
    QuarterTurn {
        corners: [0, 1, 2, 3],
        twists: [0, 0, 0, 0],
        edges: [0, 1, 2, 3],
        flips: [0, 0, 0, 0],
    },
    // R
    QuarterTurn {
        corners: [4, 0, 3, 7],
        twists: [1, 2, 1, 2],
        edges: [8, 0, 11, 4],
        flips: [0, 0, 0, 0],
    },
    // F
    QuarterTurn {
        corners: [1, 0, 4, 5],
        twists: [2, 1, 2, 1],
        edges: [9, 1, 8, 5],
        flips: [1, 1, 1, 1],
    },
    // D
    QuarterTurn {
        corners: [5, 4, 7, 6],
        twists: [0, 0, 0, 0],
        edges: [5, 4, 7, 6],
        flips: [0, 0, 0, 0],
    },
    // L
    QuarterTurn {
        corners: [2, 1, 5, 6],
        twists: [2, 1, 2, 1],
        edges: [10, 2, 9, 6],
        flips: [0, 0, 0, 0],
    },
    // B
    QuarterTurn {
        corners: [3, 2, 6, 7],
        twists: [2, 1, 2, 1],
        edges: [11, 3, 10, 7],
        flips: [1, 1, 1, 1],
    },
];

impl QuarterTurn {
    pub fn of(face: Face) -> &'static QuarterTurn {
        &QUARTER_TURNS[face.index()]
    }

    /// Expand the cycles into full "replaced by" arrays.
    pub fn to_delta(&self) -> Cubies {
        let mut delta = Cubies::SOLVED;
        for k in 0..4 {
            let next = (k + 1) % 4;
            delta.corner_perm[self.corners[next] as usize] = self.corners[k];
            delta.corner_orient[self.corners[k] as usize] = self.twists[k];
            delta.edge_perm[self.edges[next] as usize] = self.edges[k];
            delta.edge_orient[self.edges[k] as usize] = self.flips[k];
        }
        delta
    }
}

/// The 18 precomputed move deltas.
pub struct MoveTable {
    entries: [Cubies; 18],
}

impl MoveTable {
    /// Shared immutable table, built on first use.
    pub fn global() -> &'static MoveTable {
        static TABLE: OnceLock<MoveTable> = OnceLock::new();
        TABLE.get_or_init(MoveTable::build)
    }

    fn build() -> Self {
        let mut entries = [Cubies::SOLVED; 18];
        for face in Face::ALL {
            let quarter = QuarterTurn::of(face).to_delta();
            let double = quarter.then(&quarter);
            let triple = double.then(&quarter);
            entries[Move::new(face, Turn::Clockwise).table_index()] = quarter;
            entries[Move::new(face, Turn::Double).table_index()] = double;
            entries[Move::new(face, Turn::CounterClockwise).table_index()] = triple;
        }
        Self { entries }
    }

    pub fn delta(&self, mv: Move) -> &Cubies {
        &self.entries[mv.table_index()]
    }
}

/// Permutation and orientation delta induced by `mv`.
pub fn permutation_delta(mv: Move) -> &'static Cubies {
    MoveTable::global().delta(mv)
}
