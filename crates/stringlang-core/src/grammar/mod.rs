//! Context-free grammar over string languages.
//!
//! Each flow graph node becomes a nonterminal whose productions mirror
//! the node's kind. The grammar then goes through two approximation
//! passes, operation-cycle cutting and right-linearization of
//! two-sided recursion, after which it can be lowered to an MLFA.

mod components;
mod cycles;
mod regular;

pub use components::{CompId, Components, Recursion};
pub(crate) use components::strongly_connected;
pub use cycles::{approximate_operation_cycles, count_operation_cycles};
pub use regular::approximate_non_regular;

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use stringlang_automata::{stock, Automaton, CharSet};

use crate::flow::{FlowGraph, NodeId, NodeKind};
use crate::program::{BinaryOpHandle, UnaryOpHandle};

/// Index of a nonterminal in its [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NtId(pub usize);

/// One production of a nonterminal.
#[derive(Debug, Clone)]
pub enum Production {
    /// A → B
    Unit { b: NtId },
    /// A → B C
    Pair { b: NtId, c: NtId },
    /// A → some regular language
    Automaton { lang: Rc<Automaton> },
    /// A → ε
    Epsilon,
    /// A → op(B)
    Unary { op: UnaryOpHandle, b: NtId },
    /// A → op(B, C)
    Binary {
        op: BinaryOpHandle,
        b: NtId,
        c: NtId,
    },
}

impl Production {
    /// Nonterminals referenced on the right-hand side.
    pub fn referenced(&self) -> impl Iterator<Item = NtId> {
        let (x, y) = match *self {
            Production::Unit { b } | Production::Unary { b, .. } => (Some(b), None),
            Production::Pair { b, c } | Production::Binary { b, c, .. } => (Some(b), Some(c)),
            Production::Automaton { .. } | Production::Epsilon => (None, None),
        };
        x.into_iter().chain(y)
    }
}

#[derive(Debug, Default)]
pub struct Grammar {
    productions: Vec<Vec<Production>>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_nonterminal(&mut self) -> NtId {
        let id = NtId(self.productions.len());
        self.productions.push(Vec::new());
        id
    }

    pub fn nonterminal_count(&self) -> usize {
        self.productions.len()
    }

    pub fn nt_ids(&self) -> impl Iterator<Item = NtId> {
        (0..self.productions.len()).map(NtId)
    }

    pub fn productions(&self, a: NtId) -> &[Production] {
        &self.productions[a.0]
    }

    pub fn add_unit(&mut self, a: NtId, b: NtId) {
        // A → A is vacuous
        if a != b {
            self.productions[a.0].push(Production::Unit { b });
        }
    }

    pub fn add_pair(&mut self, a: NtId, b: NtId, c: NtId) {
        self.productions[a.0].push(Production::Pair { b, c });
    }

    /// Adds a regular language production. An empty language is not
    /// recorded at all, leaving the empty set expressed by absence.
    pub fn add_automaton(&mut self, a: NtId, lang: Rc<Automaton>) {
        if !lang.is_empty() {
            self.productions[a.0].push(Production::Automaton { lang });
        }
    }

    pub fn add_epsilon(&mut self, a: NtId) {
        self.productions[a.0].push(Production::Epsilon);
    }

    pub fn add_unary(&mut self, a: NtId, op: UnaryOpHandle, b: NtId) {
        self.productions[a.0].push(Production::Unary { op, b });
    }

    pub fn add_binary(&mut self, a: NtId, op: BinaryOpHandle, b: NtId, c: NtId) {
        self.productions[a.0].push(Production::Binary { op, b, c });
    }

    /// Builds the grammar for a simplified flow graph.
    ///
    /// Returns the grammar and the map from live nodes to their
    /// nonterminals.
    pub fn from_flow_graph(g: &FlowGraph) -> (Grammar, IndexMap<NodeId, NtId>) {
        let mut grammar = Grammar::new();
        let mut nts: IndexMap<NodeId, NtId> = IndexMap::new();
        for n in g.node_ids() {
            nts.insert(n, grammar.add_nonterminal());
        }
        for n in g.node_ids() {
            let a = nts[&n];
            match g.kind(n) {
                NodeKind::Assignment { arg } => {
                    for d in arg.defs() {
                        grammar.add_unit(a, nts[&d]);
                    }
                }
                NodeKind::Concatenation { left, right } => {
                    for dl in left.defs() {
                        for dr in right.defs() {
                            grammar.add_pair(a, nts[&dl], nts[&dr]);
                        }
                    }
                }
                NodeKind::Initialization { lang } => {
                    grammar.add_automaton(a, Rc::clone(lang));
                }
                NodeKind::Unary { op, arg } => {
                    for d in arg.defs() {
                        grammar.add_unary(a, op.clone(), nts[&d]);
                    }
                }
                NodeKind::Binary { op, left, right } => {
                    for dl in left.defs() {
                        for dr in right.defs() {
                            grammar.add_binary(a, op.clone(), nts[&dl], nts[&dr]);
                        }
                    }
                }
            }
        }
        (grammar, nts)
    }

    /// Conservative character set per nonterminal.
    ///
    /// Components are processed innermost first, so references out of a
    /// component read already converged sets, and each component runs
    /// its own little fixpoint.
    pub fn charsets(&self, comps: &Components) -> Vec<CharSet> {
        let mut sets = vec![CharSet::new(); self.nonterminal_count()];
        for comp in comps.iter() {
            let mut queue: VecDeque<NtId> = comp.members().iter().copied().collect();
            let mut queued: IndexSet<NtId> = comp.members().iter().copied().collect();
            while let Some(a) = queue.pop_front() {
                queued.swap_remove(&a);
                let mut cs = CharSet::new();
                for p in self.productions(a) {
                    cs = cs.union(&self.charset_transfer(p, &sets));
                }
                if cs != sets[a.0] {
                    sets[a.0] = cs;
                    for &b in comp.members() {
                        if self.productions(b).iter().any(|p| p.referenced().any(|r| r == a))
                            && queued.insert(b)
                        {
                            queue.push_back(b);
                        }
                    }
                }
            }
        }
        sets
    }

    fn charset_transfer(&self, p: &Production, sets: &[CharSet]) -> CharSet {
        match p {
            Production::Unit { b } => sets[b.0].clone(),
            Production::Pair { b, c } => sets[b.0].union(&sets[c.0]),
            Production::Automaton { lang } => CharSet::of_automaton(lang),
            Production::Epsilon => CharSet::new(),
            Production::Unary { op, b } => op.op().charset_transfer(&sets[b.0]),
            Production::Binary { op, b, c } => {
                op.op().charset_transfer(&sets[b.0], &sets[c.0])
            }
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in self.nt_ids() {
            for p in self.productions(a) {
                write!(f, "x{} -> ", a.0)?;
                match p {
                    Production::Unit { b } => writeln!(f, "x{}", b.0)?,
                    Production::Pair { b, c } => writeln!(f, "x{} x{}", b.0, c.0)?,
                    Production::Automaton { lang } => writeln!(f, "{}", stock::name(lang))?,
                    Production::Epsilon => writeln!(f, "\"\"")?,
                    Production::Unary { op, b } => writeln!(f, "{}(x{})", op, b.0)?,
                    Production::Binary { op, b, c } => {
                        writeln!(f, "{}(x{}, x{})", op, b.0, c.0)?
                    }
                }
            }
        }
        Ok(())
    }
}
