//! String operations as automaton transformers.
//!
//! Each operation supplies three things: an automaton-level transfer that
//! soundly over-approximates the runtime operation, a character-set transfer
//! used by the grammar layer, and a priority used when cycles of operations
//! have to be broken. Higher priority means the operation distorts the
//! language more and is cut first.

use crate::automaton::{Automaton, StateId};
use crate::charset::CharSet;
use std::fmt;

/// A one-argument string operation.
pub trait UnaryOperation: fmt::Debug + fmt::Display {
    /// Language of possible results, given the language of the argument.
    fn apply(&self, a: &Automaton) -> Automaton;

    /// Characters possibly occurring in results, given those of the argument.
    fn charset_transfer(&self, cs: &CharSet) -> CharSet;

    fn priority(&self) -> u32;
}

/// A two-argument string operation.
pub trait BinaryOperation: fmt::Debug + fmt::Display {
    fn apply(&self, a: &Automaton, b: &Automaton) -> Automaton;

    fn charset_transfer(&self, a: &CharSet, b: &CharSet) -> CharSet;

    fn priority(&self) -> u32;
}

/// Rebuilds `a` with every transition's range pushed through `f`.
fn map_transitions(a: &Automaton, f: impl Fn(&CharSet) -> CharSet) -> Automaton {
    let mut out = Automaton::new();
    for _ in 1..a.state_count() {
        out.add_state();
    }
    out.set_initial(a.initial());
    for s in a.state_ids() {
        out.set_accept(s, a.is_accept(s));
        for t in a.transitions(s) {
            let mapped = f(&CharSet::from_intervals([(t.min, t.max)]));
            for iv in mapped.intervals() {
                out.add_transition(s, iv.min, iv.max, t.dest);
            }
        }
    }
    out
}

/// Reversal of the argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reverse;

impl UnaryOperation for Reverse {
    fn apply(&self, a: &Automaton) -> Automaton {
        let mut out = Automaton::new();
        let offset = 1;
        for _ in 0..a.state_count() {
            out.add_state();
        }
        for s in a.state_ids() {
            for t in a.transitions(s) {
                out.add_transition(StateId(t.dest.0 + offset), t.min, t.max, StateId(s.0 + offset));
            }
        }
        out.set_accept(StateId(a.initial().0 + offset), true);
        let eps: Vec<_> = a
            .accept_states()
            .into_iter()
            .map(|s| (StateId(0), StateId(s.0 + offset)))
            .collect();
        out.add_epsilons(&eps);
        out
    }

    fn charset_transfer(&self, cs: &CharSet) -> CharSet {
        cs.clone()
    }

    fn priority(&self) -> u32 {
        1
    }
}

impl fmt::Display for Reverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reverse")
    }
}

/// Uppercasing of every character of the argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToUpperCase;

impl UnaryOperation for ToUpperCase {
    fn apply(&self, a: &Automaton) -> Automaton {
        map_transitions(a, CharSet::to_upper_case)
    }

    fn charset_transfer(&self, cs: &CharSet) -> CharSet {
        cs.to_upper_case()
    }

    fn priority(&self) -> u32 {
        2
    }
}

impl fmt::Display for ToUpperCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "to_upper_case")
    }
}

/// Lowercasing of every character of the argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToLowerCase;

impl UnaryOperation for ToLowerCase {
    fn apply(&self, a: &Automaton) -> Automaton {
        map_transitions(a, CharSet::to_lower_case)
    }

    fn charset_transfer(&self, cs: &CharSet) -> CharSet {
        cs.to_lower_case()
    }

    fn priority(&self) -> u32 {
        2
    }
}

impl fmt::Display for ToLowerCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "to_lower_case")
    }
}

/// Replacement of every occurrence of one character by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharReplace {
    pub from: char,
    pub to: char,
}

impl UnaryOperation for CharReplace {
    fn apply(&self, a: &Automaton) -> Automaton {
        map_transitions(a, |cs| self.charset_transfer(cs))
    }

    fn charset_transfer(&self, cs: &CharSet) -> CharSet {
        if cs.contains(self.from) {
            cs.remove(self.from).add(self.to)
        } else {
            cs.clone()
        }
    }

    fn priority(&self) -> u32 {
        3
    }
}

impl fmt::Display for CharReplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replace[{:?},{:?}]", self.from, self.to)
    }
}

/// All prefixes of strings of the argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix;

impl UnaryOperation for Prefix {
    fn apply(&self, a: &Automaton) -> Automaton {
        let mut out = a.clone();
        out.clear_info();
        let reach = out.reachable_states();
        let co = out.co_reachable_states();
        for &i in reach.intersection(&co) {
            out.set_accept(StateId(i), true);
        }
        out
    }

    fn charset_transfer(&self, cs: &CharSet) -> CharSet {
        cs.clone()
    }

    fn priority(&self) -> u32 {
        4
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prefix")
    }
}

/// All suffixes of strings of the argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Postfix;

impl UnaryOperation for Postfix {
    fn apply(&self, a: &Automaton) -> Automaton {
        let mut out = a.clone();
        out.clear_info();
        let reach = out.reachable_states();
        let fresh = out.add_state();
        out.set_initial(fresh);
        let eps: Vec<_> = reach.iter().map(|&i| (fresh, StateId(i))).collect();
        out.add_epsilons(&eps);
        out
    }

    fn charset_transfer(&self, cs: &CharSet) -> CharSet {
        cs.clone()
    }

    fn priority(&self) -> u32 {
        4
    }
}

impl fmt::Display for Postfix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "postfix")
    }
}

/// Insertion of the second argument at an arbitrary position in the first.
///
/// The split point is not tracked across the insertion, so the result is the
/// larger language prefix(a) · b · postfix(a).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insert;

impl BinaryOperation for Insert {
    fn apply(&self, a: &Automaton, b: &Automaton) -> Automaton {
        let mut out = a.clone();
        out.clear_info();
        let b_off = out.splice(b);
        let a2_off = out.splice(a);
        let b_initial = StateId(b.initial().0 + b_off);
        let mut eps = Vec::new();
        for s in a.state_ids() {
            eps.push((s, b_initial));
        }
        for s in a.accept_states() {
            out.set_accept(s, false);
        }
        for s in b.accept_states() {
            let bs = StateId(s.0 + b_off);
            out.set_accept(bs, false);
            for t in a.state_ids() {
                eps.push((bs, StateId(t.0 + a2_off)));
            }
        }
        out.add_epsilons(&eps);
        out
    }

    fn charset_transfer(&self, a: &CharSet, b: &CharSet) -> CharSet {
        a.union(b)
    }

    fn priority(&self) -> u32 {
        8
    }
}

impl fmt::Display for Insert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insert")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock;

    #[test]
    fn test_reverse() {
        let a = Reverse.apply(&stock::constant("ab"));
        assert!(a.accepts("ba"));
        assert!(!a.accepts("ab"));
        let u = Reverse.apply(&stock::constant("xy").union(&stock::constant("z")));
        assert!(u.accepts("yx"));
        assert!(u.accepts("z"));
    }

    #[test]
    fn test_reverse_of_empty() {
        assert!(Reverse.apply(&stock::empty()).is_empty());
    }

    #[test]
    fn test_case_ops() {
        let up = ToUpperCase.apply(&stock::constant("abC"));
        assert!(up.accepts("ABC"));
        assert!(!up.accepts("abC"));
        let low = ToLowerCase.apply(&stock::constant("AbC"));
        assert!(low.accepts("abc"));
        assert!(!low.accepts("AbC"));
    }

    #[test]
    fn test_case_op_on_any_string() {
        let up = ToUpperCase.apply(&stock::any_string());
        assert!(up.accepts("mixedCASE"));
    }

    #[test]
    fn test_char_replace() {
        let op = CharReplace { from: 'a', to: 'b' };
        let r = op.apply(&stock::constant("aba"));
        assert!(r.accepts("bbb"));
        assert!(!r.accepts("aba"));
        let untouched = op.apply(&stock::constant("xyz"));
        assert!(untouched.accepts("xyz"));
    }

    #[test]
    fn test_char_replace_charset() {
        let op = CharReplace { from: 'a', to: 'b' };
        let cs = CharSet::new().add('a').add('c');
        let out = op.charset_transfer(&cs);
        assert!(!out.contains('a'));
        assert!(out.contains('b') && out.contains('c'));
        let cs2 = CharSet::new().add('x');
        assert_eq!(op.charset_transfer(&cs2), cs2);
    }

    #[test]
    fn test_prefix() {
        let p = Prefix.apply(&stock::constant("abc"));
        for ok in ["", "a", "ab", "abc"] {
            assert!(p.accepts(ok), "{ok:?}");
        }
        assert!(!p.accepts("b"));
        assert!(!p.accepts("abcd"));
    }

    #[test]
    fn test_prefix_of_empty_is_empty() {
        assert!(Prefix.apply(&stock::empty()).is_empty());
    }

    #[test]
    fn test_postfix() {
        let p = Postfix.apply(&stock::constant("abc"));
        for ok in ["", "c", "bc", "abc"] {
            assert!(p.accepts(ok), "{ok:?}");
        }
        assert!(!p.accepts("ab"));
    }

    #[test]
    fn test_postfix_of_empty_is_empty() {
        assert!(Postfix.apply(&stock::empty()).is_empty());
    }

    #[test]
    fn test_insert() {
        let r = Insert.apply(&stock::constant("ad"), &stock::constant("bc"));
        assert!(r.accepts("abcd"));
        assert!(r.accepts("bcad"));
        assert!(r.accepts("adbc"));
        assert!(!r.accepts("ad"));
        assert!(!r.accepts("bc"));
    }

    #[test]
    fn test_insert_into_empty_is_empty() {
        let r = Insert.apply(&stock::empty(), &stock::constant("x"));
        assert!(r.is_empty());
    }

    #[test]
    fn test_insert_charset_is_union() {
        let a = CharSet::new().add('a');
        let b = CharSet::new().add('b');
        let u = Insert.charset_transfer(&a, &b);
        assert!(u.contains('a') && u.contains('b'));
    }

    #[test]
    fn test_priorities_order_distortion() {
        assert!(Reverse.priority() < ToUpperCase.priority());
        assert!(ToUpperCase.priority() < CharReplace { from: 'a', to: 'b' }.priority());
        assert!(CharReplace { from: 'a', to: 'b' }.priority() < Prefix.priority());
        assert!(Prefix.priority() < Insert.priority());
    }
}
