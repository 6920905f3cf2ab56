use crate::domain::models::{parse_sequence, Face, Move, ParseMoveError, Turn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("'{0}' is move notation and cannot be rebound")]
    Notation(char),
    #[error("whitespace cannot be bound")]
    Whitespace,
}

/// Keyboard shortcuts for virtual moves, stored as key -> Singmaster text.
///
/// Singmaster notation always wins over a binding, so `R` typed alone is the
/// same turn as `R` inside a sequence. Entries that fail to parse are skipped
/// when resolving, so a hand-edited settings file cannot break the keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyBindings {
    bindings: BTreeMap<String, String>,
}

impl Default for KeyBindings {
    /// Lowercase face letters turn clockwise, digits 1-6 make half turns of
    /// U D L R F B.
    fn default() -> Self {
        let mut bindings = BTreeMap::new();
        for face in Face::ALL {
            let key = face.letter().to_ascii_lowercase();
            bindings.insert(key.to_string(), Move::new(face, Turn::Clockwise).to_string());
        }
        let doubles = [Face::U, Face::D, Face::L, Face::R, Face::F, Face::B];
        for (digit, face) in ('1'..='6').zip(doubles) {
            bindings.insert(digit.to_string(), Move::new(face, Turn::Double).to_string());
        }
        Self { bindings }
    }
}

fn is_notation(key: char) -> bool {
    key.to_string().parse::<Move>().is_ok()
}

impl KeyBindings {
    pub fn resolve(&self, key: char) -> Option<Move> {
        if is_notation(key) {
            return None;
        }
        self.bindings.get(&key.to_string())?.parse().ok()
    }

    /// Turn a line of keyboard input into moves: Singmaster notation first,
    /// then a single bound key.
    pub fn resolve_input(&self, text: &str) -> Result<Vec<Move>, ParseMoveError> {
        let text = text.trim();
        let notation = parse_sequence(text);
        if notation.is_ok() {
            return notation;
        }
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(key), None) => self
                .resolve(key)
                .map(|mv| vec![mv])
                .ok_or_else(|| ParseMoveError(key.to_string())),
            _ => notation,
        }
    }

    pub fn bind(&mut self, key: char, mv: Move) -> Result<(), BindError> {
        if key.is_whitespace() {
            return Err(BindError::Whitespace);
        }
        if is_notation(key) {
            return Err(BindError::Notation(key));
        }
        self.bindings.insert(key.to_string(), mv.to_string());
        Ok(())
    }
}
