//! Finite automata over `char` ranges.
//!
//! States live in an arena indexed by [`StateId`]; transitions are inclusive
//! character ranges. The representation is epsilon-free: [`Automaton::add_epsilons`]
//! eliminates a batch of epsilon edges by closure, which is how every splicing
//! construction here (and in the operation library) finishes up.
//!
//! Membership is decided by subset simulation, so automata never need to be
//! determinized or minimized.

use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Index of a state within one automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub usize);

/// A transition on the inclusive character range `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Transition {
    pub min: char,
    pub max: char,
    pub dest: StateId,
}

#[derive(Debug, Clone, Default)]
struct State {
    accept: bool,
    transitions: SmallVec<[Transition; 4]>,
}

/// A nondeterministic finite automaton.
#[derive(Debug, Clone)]
pub struct Automaton {
    states: Vec<State>,
    initial: StateId,
    info: Option<String>,
}

impl Default for Automaton {
    fn default() -> Self {
        Automaton::new()
    }
}

impl Automaton {
    /// A one-state automaton accepting nothing.
    pub fn new() -> Self {
        Automaton {
            states: vec![State::default()],
            initial: StateId(0),
            info: None,
        }
    }

    /// Language tag attached by the stock constructors, if any.
    ///
    /// Two automata carrying the same tag are known to define the same
    /// language; derived automata carry no tag.
    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    pub fn set_info(&mut self, info: impl Into<String>) {
        self.info = Some(info.into());
    }

    pub fn clear_info(&mut self) {
        self.info = None;
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.set_info(info);
        self
    }

    pub fn initial(&self) -> StateId {
        self.initial
    }

    pub fn set_initial(&mut self, s: StateId) {
        self.initial = s;
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state_ids(&self) -> impl Iterator<Item = StateId> {
        (0..self.states.len()).map(StateId)
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.push(State::default());
        StateId(self.states.len() - 1)
    }

    pub fn add_transition(&mut self, from: StateId, min: char, max: char, dest: StateId) {
        let (min, max) = if max < min { (max, min) } else { (min, max) };
        self.states[from.0].transitions.push(Transition { min, max, dest });
    }

    pub fn set_accept(&mut self, s: StateId, accept: bool) {
        self.states[s.0].accept = accept;
    }

    pub fn is_accept(&self, s: StateId) -> bool {
        self.states[s.0].accept
    }

    pub fn transitions(&self, s: StateId) -> &[Transition] {
        &self.states[s.0].transitions
    }

    pub fn accept_states(&self) -> Vec<StateId> {
        self.state_ids().filter(|s| self.is_accept(*s)).collect()
    }

    /// Copies all states of `other` into this automaton.
    ///
    /// Returns the index offset: state `s` of `other` becomes
    /// `StateId(s.0 + offset)` here. Accept flags are preserved; the caller
    /// wires the copy up with epsilon edges.
    pub fn splice(&mut self, other: &Automaton) -> usize {
        let offset = self.states.len();
        for st in &other.states {
            let mut ns = st.clone();
            for t in &mut ns.transitions {
                t.dest = StateId(t.dest.0 + offset);
            }
            self.states.push(ns);
        }
        offset
    }

    /// Adds a batch of epsilon edges and eliminates them again.
    ///
    /// For every pair `(p, q)`, `p` inherits the transitions and acceptance
    /// of every state epsilon-reachable through the pair relation. The
    /// automaton stays epsilon-free.
    pub fn add_epsilons(&mut self, pairs: &[(StateId, StateId)]) {
        if pairs.is_empty() {
            return;
        }
        let n = self.states.len();
        let mut reach: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for &(p, q) in pairs {
            if p != q {
                reach[p.0].insert(q.0);
            }
        }
        // transitive closure of the epsilon relation
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..n {
                let mut add: Vec<usize> = Vec::new();
                for &j in &reach[i] {
                    for &k in &reach[j] {
                        if k != i && !reach[i].contains(&k) {
                            add.push(k);
                        }
                    }
                }
                if !add.is_empty() {
                    reach[i].extend(add);
                    changed = true;
                }
            }
        }
        let snapshot = self.states.clone();
        for i in 0..n {
            for &j in &reach[i] {
                if snapshot[j].accept {
                    self.states[i].accept = true;
                }
                let trans = snapshot[j].transitions.clone();
                self.states[i].transitions.extend(trans);
            }
        }
        for st in &mut self.states {
            st.transitions.sort();
            st.transitions.dedup();
        }
    }

    /// Subset-simulation membership test.
    pub fn accepts(&self, s: &str) -> bool {
        let mut current: BTreeSet<usize> = BTreeSet::new();
        current.insert(self.initial.0);
        for c in s.chars() {
            let mut next = BTreeSet::new();
            for &i in &current {
                for t in &self.states[i].transitions {
                    if t.min <= c && c <= t.max {
                        next.insert(t.dest.0);
                    }
                }
            }
            if next.is_empty() {
                return false;
            }
            current = next;
        }
        current.iter().any(|&i| self.states[i].accept)
    }

    /// True if the language is empty.
    pub fn is_empty(&self) -> bool {
        let reach = self.reachable_states();
        !reach.iter().any(|&i| self.states[i].accept)
    }

    /// True if the language is exactly the empty string.
    pub fn is_empty_string_language(&self) -> bool {
        if !self.states[self.initial.0].accept {
            return false;
        }
        let reach = self.reachable_states();
        let co = self.co_reachable_states();
        for &i in &reach {
            for t in &self.states[i].transitions {
                if co.contains(&t.dest.0) {
                    return false;
                }
            }
        }
        true
    }

    /// Character ranges of transitions lying on some accepting path.
    pub fn live_transition_intervals(&self) -> Vec<(char, char)> {
        let reach = self.reachable_states();
        let co = self.co_reachable_states();
        let mut out = Vec::new();
        for &i in &reach {
            for t in &self.states[i].transitions {
                if co.contains(&t.dest.0) {
                    out.push((t.min, t.max));
                }
            }
        }
        out
    }

    pub(crate) fn reachable_states(&self) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![self.initial.0];
        while let Some(i) = stack.pop() {
            if seen.insert(i) {
                for t in &self.states[i].transitions {
                    stack.push(t.dest.0);
                }
            }
        }
        seen
    }

    pub(crate) fn co_reachable_states(&self) -> BTreeSet<usize> {
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); self.states.len()];
        for (i, st) in self.states.iter().enumerate() {
            for t in &st.transitions {
                preds[t.dest.0].push(i);
            }
        }
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = (0..self.states.len())
            .filter(|&i| self.states[i].accept)
            .collect();
        while let Some(i) = stack.pop() {
            if seen.insert(i) {
                for &p in &preds[i] {
                    stack.push(p);
                }
            }
        }
        seen
    }

    /// Concatenation of this language with another.
    pub fn concat(&self, other: &Automaton) -> Automaton {
        let mut out = self.clone();
        out.info = None;
        let offset = out.splice(other);
        let other_initial = StateId(other.initial.0 + offset);
        let mut eps = Vec::new();
        for s in self.accept_states() {
            out.set_accept(s, false);
            eps.push((s, other_initial));
        }
        out.add_epsilons(&eps);
        out
    }

    /// Union of this language with another.
    pub fn union(&self, other: &Automaton) -> Automaton {
        let mut out = Automaton::new();
        let o1 = out.splice(self);
        let o2 = out.splice(other);
        out.add_epsilons(&[
            (StateId(0), StateId(self.initial.0 + o1)),
            (StateId(0), StateId(other.initial.0 + o2)),
        ]);
        out
    }

    /// Kleene star of this language.
    pub fn star(&self) -> Automaton {
        let mut out = Automaton::new();
        out.set_accept(StateId(0), true);
        let offset = out.splice(self);
        let mut eps = vec![(StateId(0), StateId(self.initial.0 + offset))];
        for s in self.accept_states() {
            eps.push((StateId(s.0 + offset), StateId(0)));
        }
        out.add_epsilons(&eps);
        out
    }

    /// This language or the empty string.
    pub fn optional(&self) -> Automaton {
        let mut out = Automaton::new();
        out.set_accept(StateId(0), true);
        let offset = out.splice(self);
        out.add_epsilons(&[(StateId(0), StateId(self.initial.0 + offset))]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock;
    use proptest::prelude::*;

    #[test]
    fn test_new_accepts_nothing() {
        let a = Automaton::new();
        assert!(a.is_empty());
        assert!(!a.accepts(""));
        assert!(!a.accepts("x"));
    }

    #[test]
    fn test_concat() {
        let a = stock::constant("ab").concat(&stock::constant("cd"));
        assert!(a.accepts("abcd"));
        assert!(!a.accepts("ab"));
        assert!(!a.accepts("cdab"));
        assert!(a.info().is_none());
    }

    #[test]
    fn test_union() {
        let a = stock::constant("x").union(&stock::constant("y"));
        assert!(a.accepts("x"));
        assert!(a.accepts("y"));
        assert!(!a.accepts("xy"));
        assert!(!a.accepts(""));
    }

    #[test]
    fn test_star() {
        let a = stock::constant("ab").star();
        assert!(a.accepts(""));
        assert!(a.accepts("ab"));
        assert!(a.accepts("ababab"));
        assert!(!a.accepts("aba"));
    }

    #[test]
    fn test_optional() {
        let a = stock::constant("q").optional();
        assert!(a.accepts(""));
        assert!(a.accepts("q"));
        assert!(!a.accepts("qq"));
    }

    #[test]
    fn test_add_epsilons_chain() {
        // three states, epsilon chain 0 -> 1 -> 2, 'a' loop on 2
        let mut a = Automaton::new();
        let s1 = a.add_state();
        let s2 = a.add_state();
        a.add_transition(s2, 'a', 'a', s2);
        a.set_accept(s2, true);
        a.add_epsilons(&[(StateId(0), s1), (s1, s2)]);
        assert!(a.accepts(""));
        assert!(a.accepts("aaa"));
        assert!(!a.accepts("b"));
    }

    #[test]
    fn test_is_empty_string_language() {
        assert!(stock::empty_string().is_empty_string_language());
        assert!(!stock::constant("a").is_empty_string_language());
        assert!(!stock::empty().is_empty_string_language());
        assert!(!stock::any_string().is_empty_string_language());
        // accepts "" and "a": not the empty-string language
        let a = stock::constant("a").optional();
        assert!(!a.is_empty_string_language());
    }

    #[test]
    fn test_empty_concat_absorbs() {
        let a = stock::empty().concat(&stock::constant("x"));
        assert!(a.is_empty());
    }

    proptest! {
        #[test]
        fn prop_concat_membership(s1 in "[a-c]{0,4}", s2 in "[a-c]{0,4}") {
            let a = stock::constant(&s1).concat(&stock::constant(&s2));
            let concatenated = format!("{s1}{s2}");
            prop_assert!(a.accepts(&concatenated));
        }

        #[test]
        fn prop_star_membership(s in "[a-b]{1,3}", n in 0usize..4) {
            let a = stock::constant(&s).star();
            prop_assert!(a.accepts(&s.repeat(n)));
        }

        #[test]
        fn prop_union_membership(s1 in "[a-c]{0,3}", s2 in "[d-f]{1,3}") {
            let a = stock::constant(&s1).union(&stock::constant(&s2));
            prop_assert!(a.accepts(&s1));
            prop_assert!(a.accepts(&s2));
        }
    }
}
