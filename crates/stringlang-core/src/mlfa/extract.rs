//! Automaton extraction from an MLFA.
//!
//! Each state pair `(s, f)` denotes the language spelled along paths
//! from `s` to `f`. Extraction resolves the language valued labels on
//! those paths recursively and flattens the result into an ordinary
//! automaton. Results are memoized per pair, so shared subgrammars are
//! flattened once; a pair whose language depends on itself through an
//! operation cannot be ranked and is rejected.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use stringlang_automata::{Automaton, StateId};
use tracing::trace;

use crate::error::AnalysisError;
use crate::grammar::strongly_connected;

use super::{Mlfa, MlfaStateId, MlfaStatePair, MlfaTransition};

/// Extracts ordinary automata from an MLFA, one state pair at a time.
///
/// Owns the MLFA and a memo table keyed by state pair; repeated
/// queries for the same pair return the same shared automaton.
pub struct Extractor {
    mlfa: Mlfa,
    /// Component index per MLFA state.
    comp_of: Vec<usize>,
    /// Per component, every state reachable from its members.
    closure: Vec<IndexSet<usize>>,
    memo: IndexMap<MlfaStatePair, Rc<Automaton>>,
    in_progress: IndexSet<MlfaStatePair>,
}

impl Extractor {
    /// Takes ownership of the MLFA and precomputes, per state, the set
    /// of states reachable from it.
    pub fn new(mlfa: Mlfa) -> Self {
        let succs: Vec<Vec<usize>> = (0..mlfa.state_count())
            .map(|i| {
                mlfa.transitions(MlfaStateId(i))
                    .iter()
                    .map(|&(_, to)| to.0)
                    .collect()
            })
            .collect();
        let (comps, comp_of) = strongly_connected(&succs);
        // Components come out innermost first, so every successor
        // component's closure is already complete when its callers ask.
        let mut closure: Vec<IndexSet<usize>> = Vec::with_capacity(comps.len());
        for (c, members) in comps.iter().enumerate() {
            let mut states: IndexSet<usize> = members.iter().copied().collect();
            for &m in members {
                for &w in &succs[m] {
                    if comp_of[w] != c {
                        states.extend(closure[comp_of[w]].iter().copied());
                    }
                }
            }
            closure.push(states);
        }
        Extractor {
            mlfa,
            comp_of,
            closure,
            memo: IndexMap::new(),
            in_progress: IndexSet::new(),
        }
    }

    pub fn mlfa(&self) -> &Mlfa {
        &self.mlfa
    }

    /// The language between `pair.start` and `pair.end`.
    ///
    /// The returned automaton is shared with the memo table and must
    /// not be mutated. Re-entering a pair that is still being resolved
    /// means the MLFA has no rank order and yields
    /// [`AnalysisError::NonRankable`].
    pub fn extract(&mut self, pair: MlfaStatePair) -> Result<Rc<Automaton>, AnalysisError> {
        if let Some(a) = self.memo.get(&pair) {
            return Ok(Rc::clone(a));
        }
        if !self.in_progress.insert(pair) {
            return Err(AnalysisError::NonRankable);
        }
        let result = self.flatten(pair);
        self.in_progress.swap_remove(&pair);
        let a = result?;
        self.memo.insert(pair, Rc::clone(&a));
        Ok(a)
    }

    /// States lying on some path from `s` to `f`. Empty when `f` is
    /// unreachable; otherwise contains both endpoints.
    fn on_path(&self, s: MlfaStateId, f: MlfaStateId) -> Vec<usize> {
        self.closure[self.comp_of[s.0]]
            .iter()
            .copied()
            .filter(|&q| self.closure[self.comp_of[q]].contains(&f.0))
            .collect()
    }

    fn flatten(&mut self, pair: MlfaStatePair) -> Result<Rc<Automaton>, AnalysisError> {
        let MlfaStatePair { start, end } = pair;
        let reachable = self.on_path(start, end);
        trace!(
            start = start.0,
            end = end.0,
            states = reachable.len(),
            "extracting state pair"
        );
        if reachable.is_empty() {
            // end not reachable at all
            return Ok(Rc::new(Automaton::new()));
        }

        // A lone automaton or identity edge straight from start to end
        // needs no flattening; the resolved language is shared as is.
        let single_state = start == end && reachable.len() == 1;
        let single_hop = start != end && reachable.len() == 2;
        if (single_state || single_hop) && self.mlfa.transitions(start).len() == 1 {
            let (t, dest) = &self.mlfa.transitions(start)[0];
            if *dest == end {
                match t {
                    MlfaTransition::Automaton { lang } => return Ok(Rc::clone(lang)),
                    MlfaTransition::Identity { pair } => {
                        let inner = *pair;
                        return self.extract(inner);
                    }
                    _ => {}
                }
            }
        }

        let mut a = Automaton::new();
        let mut statemap: IndexMap<usize, StateId> = IndexMap::new();
        for (i, &q) in reachable.iter().enumerate() {
            let ss = if i == 0 { a.initial() } else { a.add_state() };
            statemap.insert(q, ss);
        }
        a.set_initial(statemap[&start.0]);
        a.set_accept(statemap[&end.0], true);

        let mut epsilons: Vec<(StateId, StateId)> = Vec::new();
        for &q in &reachable {
            let qq = statemap[&q];
            let edges = self.mlfa.transitions(MlfaStateId(q)).to_vec();
            for (t, dest) in edges {
                let Some(&pp) = statemap.get(&dest.0) else {
                    continue;
                };
                let sub = match t {
                    MlfaTransition::Epsilon => {
                        epsilons.push((qq, pp));
                        continue;
                    }
                    MlfaTransition::Automaton { lang } => (*lang).clone(),
                    MlfaTransition::Identity { pair } => (*self.extract(pair)?).clone(),
                    MlfaTransition::Unary { op, pair } => {
                        let arg = self.extract(pair)?;
                        op.op().apply(&arg)
                    }
                    MlfaTransition::Binary { op, left, right } => {
                        let l = self.extract(left)?;
                        let r = self.extract(right)?;
                        op.op().apply(&l, &r)
                    }
                };
                // splice the edge language in, demote its accept
                // states, and stitch with epsilons
                let offset = a.splice(&sub);
                epsilons.push((qq, StateId(sub.initial().0 + offset)));
                for acc in sub.accept_states() {
                    let rr = StateId(acc.0 + offset);
                    a.set_accept(rr, false);
                    epsilons.push((rr, pp));
                }
            }
        }
        a.add_epsilons(&epsilons);
        Ok(Rc::new(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{OpId, UnaryOpHandle};
    use stringlang_automata::ops::Reverse;
    use stringlang_automata::stock;

    fn lang(s: &str) -> Rc<Automaton> {
        Rc::new(stock::constant(s))
    }

    #[test]
    fn single_automaton_edge_shares_the_language() {
        let mut m = Mlfa::default();
        let s0 = m.add_state();
        let s1 = m.add_state();
        let ab = lang("ab");
        m.add_transition(s0, MlfaTransition::Automaton { lang: Rc::clone(&ab) }, s1);

        let mut ex = Extractor::new(m);
        let a = ex
            .extract(MlfaStatePair { start: s0, end: s1 })
            .unwrap();
        assert!(Rc::ptr_eq(&a, &ab));
        assert!(a.accepts("ab"));
        assert!(!a.accepts("a"));
    }

    #[test]
    fn repeated_extraction_is_memoized() {
        let mut m = Mlfa::default();
        let s0 = m.add_state();
        let s1 = m.add_state();
        let s2 = m.add_state();
        m.add_transition(s0, MlfaTransition::Epsilon, s1);
        m.add_transition(s1, MlfaTransition::Automaton { lang: lang("x") }, s2);

        let mut ex = Extractor::new(m);
        let p = MlfaStatePair { start: s0, end: s2 };
        let first = ex.extract(p).unwrap();
        let second = ex.extract(p).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(first.accepts("x"));
        assert!(!first.accepts(""));
    }

    #[test]
    fn identity_edge_resolves_one_level_down() {
        let mut m = Mlfa::default();
        let s0 = m.add_state();
        let s1 = m.add_state();
        let s2 = m.add_state();
        let s3 = m.add_state();
        m.add_transition(s2, MlfaTransition::Automaton { lang: lang("y") }, s3);
        m.add_transition(
            s0,
            MlfaTransition::Identity {
                pair: MlfaStatePair { start: s2, end: s3 },
            },
            s1,
        );

        let mut ex = Extractor::new(m);
        let a = ex
            .extract(MlfaStatePair { start: s0, end: s1 })
            .unwrap();
        assert!(a.accepts("y"));
        assert!(!a.accepts(""));
    }

    #[test]
    fn branching_edges_form_the_union() {
        let mut m = Mlfa::default();
        let s0 = m.add_state();
        let s1 = m.add_state();
        let s2 = m.add_state();
        m.add_transition(s0, MlfaTransition::Automaton { lang: lang("a") }, s1);
        m.add_transition(s1, MlfaTransition::Automaton { lang: lang("b") }, s2);
        m.add_transition(s0, MlfaTransition::Automaton { lang: lang("c") }, s2);

        let mut ex = Extractor::new(m);
        let a = ex
            .extract(MlfaStatePair { start: s0, end: s2 })
            .unwrap();
        assert!(a.accepts("ab"));
        assert!(a.accepts("c"));
        assert!(!a.accepts("a"));
        assert!(!a.accepts("cb"));
    }

    #[test]
    fn loops_inside_the_scope_are_preserved() {
        let mut m = Mlfa::default();
        let s0 = m.add_state();
        let s1 = m.add_state();
        let s2 = m.add_state();
        m.add_transition(s0, MlfaTransition::Automaton { lang: lang("a") }, s1);
        m.add_transition(s1, MlfaTransition::Epsilon, s2);
        m.add_transition(s2, MlfaTransition::Automaton { lang: lang("b") }, s2);

        let mut ex = Extractor::new(m);
        let a = ex
            .extract(MlfaStatePair { start: s0, end: s2 })
            .unwrap();
        assert!(a.accepts("a"));
        assert!(a.accepts("ab"));
        assert!(a.accepts("abbb"));
        assert!(!a.accepts(""));
        assert!(!a.accepts("b"));
        assert!(!a.accepts("ba"));
    }

    #[test]
    fn unary_edge_applies_the_operation() {
        let mut m = Mlfa::default();
        let s0 = m.add_state();
        let s1 = m.add_state();
        let s2 = m.add_state();
        let s3 = m.add_state();
        m.add_transition(s2, MlfaTransition::Automaton { lang: lang("ab") }, s3);
        m.add_transition(
            s0,
            MlfaTransition::Unary {
                op: UnaryOpHandle::new(OpId(0), Rc::new(Reverse)),
                pair: MlfaStatePair { start: s2, end: s3 },
            },
            s1,
        );

        let mut ex = Extractor::new(m);
        let a = ex
            .extract(MlfaStatePair { start: s0, end: s1 })
            .unwrap();
        assert!(a.accepts("ba"));
        assert!(!a.accepts("ab"));
    }

    #[test]
    fn unreachable_end_state_is_the_empty_language() {
        let mut m = Mlfa::default();
        let s0 = m.add_state();
        let s1 = m.add_state();

        let mut ex = Extractor::new(m);
        let a = ex
            .extract(MlfaStatePair { start: s0, end: s1 })
            .unwrap();
        assert!(a.is_empty());
    }

    #[test]
    fn self_referential_identity_is_non_rankable() {
        let mut m = Mlfa::default();
        let s0 = m.add_state();
        let s1 = m.add_state();
        let p = MlfaStatePair { start: s0, end: s1 };
        m.add_transition(s0, MlfaTransition::Identity { pair: p }, s1);

        let mut ex = Extractor::new(m);
        assert!(matches!(ex.extract(p), Err(AnalysisError::NonRankable)));
    }
}
