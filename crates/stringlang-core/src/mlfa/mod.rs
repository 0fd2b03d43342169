//! Multi level finite automaton.
//!
//! An MLFA is a finite automaton whose transition labels are themselves
//! language valued: a fixed regular language, the language between two
//! other states (identity), or a string operation applied to such
//! languages. A strongly regular grammar lowers to an MLFA directly,
//! and ordinary automata are then extracted per state pair on demand.

mod extract;

pub use extract::Extractor;

use std::fmt;
use std::rc::Rc;

use stringlang_automata::{stock, Automaton};

use crate::error::AnalysisError;
use crate::grammar::{CompId, Components, Grammar, NtId, Production, Recursion};
use crate::program::{BinaryOpHandle, UnaryOpHandle};

/// Index of a state in its [`Mlfa`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MlfaStateId(pub usize);

/// Start and end state addressing one language in the MLFA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MlfaStatePair {
    pub start: MlfaStateId,
    pub end: MlfaStateId,
}

/// Label of an MLFA transition.
#[derive(Debug, Clone)]
pub enum MlfaTransition {
    Epsilon,
    Automaton {
        lang: Rc<Automaton>,
    },
    /// The language between two states one level down.
    Identity { pair: MlfaStatePair },
    Unary {
        op: UnaryOpHandle,
        pair: MlfaStatePair,
    },
    Binary {
        op: BinaryOpHandle,
        left: MlfaStatePair,
        right: MlfaStatePair,
    },
}

#[derive(Debug, Default)]
pub struct Mlfa {
    edges: Vec<Vec<(MlfaTransition, MlfaStateId)>>,
}

impl Mlfa {
    fn add_state(&mut self) -> MlfaStateId {
        let id = MlfaStateId(self.edges.len());
        self.edges.push(Vec::new());
        id
    }

    fn add_transition(&mut self, from: MlfaStateId, t: MlfaTransition, to: MlfaStateId) {
        self.edges[from.0].push((t, to));
    }

    pub fn state_count(&self) -> usize {
        self.edges.len()
    }

    pub fn transitions(&self, s: MlfaStateId) -> &[(MlfaTransition, MlfaStateId)] {
        &self.edges[s.0]
    }
}

impl fmt::Display for MlfaStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

impl fmt::Display for MlfaStatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.start, self.end)
    }
}

impl fmt::Display for MlfaTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlfaTransition::Epsilon => write!(f, "\"\""),
            MlfaTransition::Automaton { lang } => write!(f, "{{{}}}", stock::name(lang)),
            MlfaTransition::Identity { pair } => write!(f, "{pair}"),
            MlfaTransition::Unary { op, pair } => write!(f, "{op}{pair}"),
            MlfaTransition::Binary { op, left, right } => write!(f, "{op}({left},{right})"),
        }
    }
}

/// One line per transition, `S0--label-->S1`.
impl fmt::Display for Mlfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, edges) in self.edges.iter().enumerate() {
            for (t, dest) in edges {
                writeln!(f, "{}--{}-->{}", MlfaStateId(i), t, dest)?;
            }
        }
        Ok(())
    }
}

/// Lowers a strongly regular grammar to an MLFA.
///
/// Only components reachable from the queried nonterminals are
/// converted. Returns the MLFA and one state pair per query, aligned
/// with `queries`; extracting a pair yields the nonterminal's language.
/// A component still recursing on both sides is reported as
/// [`AnalysisError::NotStronglyRegular`].
pub fn build_mlfa(
    g: &Grammar,
    comps: &Components,
    queries: &[NtId],
) -> Result<(Mlfa, Vec<MlfaStatePair>), AnalysisError> {
    let mut builder = Builder {
        g,
        comps,
        mlfa: Mlfa::default(),
        comp_state: vec![None; comps.len()],
        nt_state: vec![None; g.nonterminal_count()],
    };
    let mut pairs = Vec::with_capacity(queries.len());
    for &q in queries {
        builder.convert(comps.comp_of(q))?;
        pairs.push(builder.state_pair(q));
    }
    Ok((builder.mlfa, pairs))
}

struct Builder<'a> {
    g: &'a Grammar,
    comps: &'a Components,
    mlfa: Mlfa,
    comp_state: Vec<Option<MlfaStateId>>,
    nt_state: Vec<Option<MlfaStateId>>,
}

impl Builder<'_> {
    fn nt_state(&self, a: NtId) -> MlfaStateId {
        match self.nt_state[a.0] {
            Some(s) => s,
            None => unreachable!("nonterminal used before its component was converted"),
        }
    }

    fn comp_state(&self, c: CompId) -> MlfaStateId {
        match self.comp_state[c.0] {
            Some(s) => s,
            None => unreachable!("component used before it was converted"),
        }
    }

    /// The automaton between this pair accepts the nonterminal's
    /// language; left recursive components run end to start.
    fn state_pair(&self, a: NtId) -> MlfaStatePair {
        let c = self.comps.comp_of(a);
        let cs = self.comp_state(c);
        let s = self.nt_state(a);
        if self.comps.component(c).recursion() == Recursion::Left {
            MlfaStatePair { start: cs, end: s }
        } else {
            MlfaStatePair { start: s, end: cs }
        }
    }

    fn convert(&mut self, c: CompId) -> Result<(), AnalysisError> {
        if self.comp_state[c.0].is_some() {
            return Ok(());
        }
        let rec = self.comps.component(c).recursion();
        if rec == Recursion::Both {
            return Err(AnalysisError::NotStronglyRegular);
        }
        let cs = self.mlfa.add_state();
        self.comp_state[c.0] = Some(cs);
        let members = self.comps.component(c).members().to_vec();
        for &a in &members {
            self.nt_state[a.0] = Some(self.mlfa.add_state());
        }

        let g = self.g;
        for &a in &members {
            let sa = self.nt_state(a);
            for p in g.productions(a) {
                if rec == Recursion::Left {
                    self.convert_left(c, cs, sa, p)?;
                } else {
                    self.convert_right(c, cs, sa, p)?;
                }
            }
        }
        Ok(())
    }

    fn convert_right(
        &mut self,
        c: CompId,
        cs: MlfaStateId,
        sa: MlfaStateId,
        p: &Production,
    ) -> Result<(), AnalysisError> {
        match p {
            Production::Unit { b } => {
                if self.comps.comp_of(*b) == c {
                    let sb = self.nt_state(*b);
                    self.mlfa.add_transition(sa, MlfaTransition::Epsilon, sb);
                } else {
                    self.convert(self.comps.comp_of(*b))?;
                    let pair = self.state_pair(*b);
                    self.mlfa
                        .add_transition(sa, MlfaTransition::Identity { pair }, cs);
                }
            }
            Production::Pair { b, c: second } => {
                if self.comps.comp_of(*second) == c {
                    self.convert(self.comps.comp_of(*b))?;
                    let pair = self.state_pair(*b);
                    let ss = self.nt_state(*second);
                    self.mlfa
                        .add_transition(sa, MlfaTransition::Identity { pair }, ss);
                } else {
                    let r = self.mlfa.add_state();
                    self.convert(self.comps.comp_of(*b))?;
                    self.convert(self.comps.comp_of(*second))?;
                    let left = self.state_pair(*b);
                    let right = self.state_pair(*second);
                    self.mlfa
                        .add_transition(sa, MlfaTransition::Identity { pair: left }, r);
                    self.mlfa
                        .add_transition(r, MlfaTransition::Identity { pair: right }, cs);
                }
            }
            Production::Automaton { lang } => {
                self.mlfa.add_transition(
                    sa,
                    MlfaTransition::Automaton {
                        lang: Rc::clone(lang),
                    },
                    cs,
                );
            }
            Production::Epsilon => {
                self.mlfa.add_transition(sa, MlfaTransition::Epsilon, cs);
            }
            Production::Unary { op, b } => {
                self.convert(self.comps.comp_of(*b))?;
                let pair = self.state_pair(*b);
                self.mlfa.add_transition(
                    sa,
                    MlfaTransition::Unary {
                        op: op.clone(),
                        pair,
                    },
                    cs,
                );
            }
            Production::Binary { op, b, c: second } => {
                self.convert(self.comps.comp_of(*b))?;
                self.convert(self.comps.comp_of(*second))?;
                let left = self.state_pair(*b);
                let right = self.state_pair(*second);
                self.mlfa.add_transition(
                    sa,
                    MlfaTransition::Binary {
                        op: op.clone(),
                        left,
                        right,
                    },
                    cs,
                );
            }
        }
        Ok(())
    }

    fn convert_left(
        &mut self,
        c: CompId,
        cs: MlfaStateId,
        sa: MlfaStateId,
        p: &Production,
    ) -> Result<(), AnalysisError> {
        match p {
            Production::Unit { b } => {
                if self.comps.comp_of(*b) == c {
                    let sb = self.nt_state(*b);
                    self.mlfa.add_transition(sb, MlfaTransition::Epsilon, sa);
                } else {
                    self.convert(self.comps.comp_of(*b))?;
                    let pair = self.state_pair(*b);
                    self.mlfa
                        .add_transition(cs, MlfaTransition::Identity { pair }, sa);
                }
            }
            Production::Pair { b, c: second } => {
                if self.comps.comp_of(*b) == c {
                    self.convert(self.comps.comp_of(*second))?;
                    let pair = self.state_pair(*second);
                    let sb = self.nt_state(*b);
                    self.mlfa
                        .add_transition(sb, MlfaTransition::Identity { pair }, sa);
                } else {
                    let r = self.mlfa.add_state();
                    self.convert(self.comps.comp_of(*b))?;
                    self.convert(self.comps.comp_of(*second))?;
                    let left = self.state_pair(*b);
                    let right = self.state_pair(*second);
                    self.mlfa
                        .add_transition(cs, MlfaTransition::Identity { pair: left }, r);
                    self.mlfa
                        .add_transition(r, MlfaTransition::Identity { pair: right }, sa);
                }
            }
            Production::Automaton { lang } => {
                self.mlfa.add_transition(
                    cs,
                    MlfaTransition::Automaton {
                        lang: Rc::clone(lang),
                    },
                    sa,
                );
            }
            Production::Epsilon => {
                self.mlfa.add_transition(cs, MlfaTransition::Epsilon, sa);
            }
            Production::Unary { op, b } => {
                self.convert(self.comps.comp_of(*b))?;
                let pair = self.state_pair(*b);
                self.mlfa.add_transition(
                    cs,
                    MlfaTransition::Unary {
                        op: op.clone(),
                        pair,
                    },
                    sa,
                );
            }
            Production::Binary { op, b, c: second } => {
                self.convert(self.comps.comp_of(*b))?;
                self.convert(self.comps.comp_of(*second))?;
                let left = self.state_pair(*b);
                let right = self.state_pair(*second);
                self.mlfa.add_transition(
                    cs,
                    MlfaTransition::Binary {
                        op: op.clone(),
                        left,
                        right,
                    },
                    sa,
                );
            }
        }
        Ok(())
    }
}
