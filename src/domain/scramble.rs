//! Scramble generation and guided scrambling
//!
//! [`ScrambleGenerator`] draws fair random sequences. [`ScrambleGuide`]
//! follows a user performing such a sequence on a physical cube and tells
//! them what to do next.

use crate::domain::models::{Face, Move, Turn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct ScrambleGenerator<R: Rng = StdRng> {
    rng: R,
}

impl ScrambleGenerator<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests and reproducible scrambles.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for ScrambleGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> ScrambleGenerator<R> {
    /// Draw `length` moves uniformly from the 18 face turns.
    ///
    /// A candidate is redrawn when it turns the same face as the previous
    /// move, or when the previous two moves share an axis and the candidate
    /// is on that axis too (`U D U`).
    pub fn generate(&mut self, length: usize) -> Vec<Move> {
        let mut moves: Vec<Move> = Vec::with_capacity(length);
        while moves.len() < length {
            let candidate = self.draw();
            let last = moves.last().copied();
            let before_last = moves.len().checked_sub(2).map(|i| moves[i]);

            if let Some(last) = last {
                if candidate.face == last.face {
                    continue;
                }
                if let Some(before_last) = before_last {
                    let axis = last.face.axis();
                    if before_last.face.axis() == axis && candidate.face.axis() == axis {
                        continue;
                    }
                }
            }
            moves.push(candidate);
        }
        moves
    }

    fn draw(&mut self) -> Move {
        let index = self.rng.gen_range(0..18);
        Move::new(Face::ALL[index / 3], Turn::ALL[index % 3])
    }
}

/// What the user should do next while following a scramble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideStep {
    /// Perform this turn to finish the current step.
    Expect(Move),
    /// A wrong move was made; perform this turn to take it back.
    Undo(Move),
    Complete,
}

/// Tracks a scramble being performed on a physical cube.
///
/// Turns on the expected face accumulate, so `U U` completes an expected
/// `U2` and `U'` followed by `U2` completes an expected `U`. Any other turn
/// goes on an error stack that must be undone, last mistake first.
#[derive(Debug, Clone)]
pub struct ScrambleGuide {
    sequence: Vec<Move>,
    completed: usize,
    // clockwise quarter turns already made on the expected face
    partial: u8,
    errors: Vec<Move>,
}

impl ScrambleGuide {
    pub fn new(sequence: Vec<Move>) -> Self {
        Self {
            sequence,
            completed: 0,
            partial: 0,
            errors: Vec::new(),
        }
    }

    pub fn sequence(&self) -> &[Move] {
        &self.sequence
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.sequence.len() && self.errors.is_empty()
    }

    /// Number of wrong moves still to be undone.
    pub fn pending_errors(&self) -> usize {
        self.errors.len()
    }

    pub fn next_step(&self) -> GuideStep {
        if let Some(wrong) = self.errors.last() {
            return GuideStep::Undo(wrong.inverse());
        }
        match self.sequence.get(self.completed) {
            Some(expected) => {
                let remaining = expected.turn.count() + 4 - self.partial;
                match Turn::from_quarters(remaining) {
                    Some(turn) => GuideStep::Expect(Move::new(expected.face, turn)),
                    None => GuideStep::Expect(*expected),
                }
            }
            None => GuideStep::Complete,
        }
    }

    /// Record a move performed on the cube.
    pub fn record(&mut self, mv: Move) -> GuideStep {
        if let Some(top) = self.errors.last_mut() {
            if top.face == mv.face {
                match Turn::from_quarters(top.turn.count() + mv.turn.count()) {
                    Some(turn) => top.turn = turn,
                    None => {
                        self.errors.pop();
                    }
                }
            } else {
                self.errors.push(mv);
            }
            return self.next_step();
        }

        match self.sequence.get(self.completed) {
            Some(expected) if expected.face == mv.face => {
                self.partial = (self.partial + mv.turn.count()) % 4;
                if self.partial == expected.turn.count() {
                    self.completed += 1;
                    self.partial = 0;
                }
            }
            _ => self.errors.push(mv),
        }
        self.next_step()
    }
}
