//! Value layer for the stringlang analyzer: character sets, finite
//! automata over `char` ranges, and the string-operation abstraction.
//!
//! Everything here is a plain value. Transformations return new automata
//! instead of mutating shared state, so the analysis layer can cache and
//! share results freely.

pub mod automaton;
pub mod charset;
pub mod ops;
pub mod stock;

pub use automaton::{Automaton, StateId, Transition};
pub use charset::CharSet;
pub use ops::{BinaryOperation, UnaryOperation};

/// Successor of `c` in `char` space, skipping the surrogate gap.
pub fn char_succ(c: char) -> Option<char> {
    match c {
        char::MAX => None,
        '\u{D7FF}' => Some('\u{E000}'),
        _ => char::from_u32(c as u32 + 1),
    }
}

/// Predecessor of `c` in `char` space, skipping the surrogate gap.
pub fn char_pred(c: char) -> Option<char> {
    match c {
        '\u{0}' => None,
        '\u{E000}' => Some('\u{D7FF}'),
        _ => char::from_u32(c as u32 - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_succ_skips_surrogates() {
        assert_eq!(char_succ('a'), Some('b'));
        assert_eq!(char_succ('\u{D7FF}'), Some('\u{E000}'));
        assert_eq!(char_succ(char::MAX), None);
    }

    #[test]
    fn test_char_pred_skips_surrogates() {
        assert_eq!(char_pred('b'), Some('a'));
        assert_eq!(char_pred('\u{E000}'), Some('\u{D7FF}'));
        assert_eq!(char_pred('\u{0}'), None);
    }

    #[test]
    fn test_succ_pred_roundtrip() {
        for c in ['\u{0}', 'a', '\u{D7FE}', '\u{D7FF}', '\u{E000}', '\u{10FFFE}'] {
            if let Some(n) = char_succ(c) {
                assert_eq!(char_pred(n), Some(c));
            }
        }
    }
}
