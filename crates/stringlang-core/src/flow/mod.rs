//! Flow graph of string value definitions.
//!
//! Nodes represent definitions: a variable binding, an expression, or a
//! known language. Each node carries argument slots recording which
//! definitions may flow into it, so edges point from definitions to uses.
//! The graph is built from a program in two steps, node creation and edge
//! wiring, then simplified before grammar construction.

mod build;
mod connect;
mod simplify;

pub use simplify::simplify;

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use stringlang_automata::{stock, Automaton};

use crate::dataflow::{AliasAnalysis, ReachingDefinitions};
use crate::program::{BinaryOpHandle, Program, StmtId, UnaryOpHandle};

/// Index of a node in its [`FlowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An argument slot of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Arg,
    Left,
    Right,
}

/// A specific argument slot of a specific node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UseRef {
    pub node: NodeId,
    pub slot: Slot,
}

/// The set of definitions flowing into one argument slot.
#[derive(Debug, Clone, Default)]
pub struct Use {
    defs: IndexSet<NodeId>,
}

impl Use {
    pub fn defs(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.defs.iter().copied()
    }

    pub fn def_count(&self) -> usize {
        self.defs.len()
    }

    pub fn contains(&self, n: NodeId) -> bool {
        self.defs.contains(&n)
    }
}

/// What a node computes from its argument slots.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Passes its single argument through.
    Assignment { arg: Use },
    /// Concatenates its two arguments.
    Concatenation { left: Use, right: Use },
    /// A known language with no arguments.
    Initialization { lang: Rc<Automaton> },
    /// Applies a unary string operation to its argument.
    Unary { op: UnaryOpHandle, arg: Use },
    /// Applies a binary string operation to its arguments.
    Binary {
        op: BinaryOpHandle,
        left: Use,
        right: Use,
    },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    uses: IndexSet<UseRef>,
    alive: bool,
}

/// A flow graph under construction or simplification.
#[derive(Debug, Default)]
pub struct FlowGraph {
    nodes: Vec<NodeData>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            uses: IndexSet::new(),
            alive: true,
        });
        id
    }

    pub fn add_assignment(&mut self) -> NodeId {
        self.add_node(NodeKind::Assignment { arg: Use::default() })
    }

    pub fn add_concatenation(&mut self) -> NodeId {
        self.add_node(NodeKind::Concatenation {
            left: Use::default(),
            right: Use::default(),
        })
    }

    pub fn add_initialization(&mut self, lang: Rc<Automaton>) -> NodeId {
        self.add_node(NodeKind::Initialization { lang })
    }

    pub fn add_unary(&mut self, op: UnaryOpHandle) -> NodeId {
        self.add_node(NodeKind::Unary {
            op,
            arg: Use::default(),
        })
    }

    pub fn add_binary(&mut self, op: BinaryOpHandle) -> NodeId {
        self.add_node(NodeKind::Binary {
            op,
            left: Use::default(),
            right: Use::default(),
        })
    }

    pub fn kind(&self, n: NodeId) -> &NodeKind {
        &self.nodes[n.0].kind
    }

    pub fn is_alive(&self, n: NodeId) -> bool {
        self.nodes[n.0].alive
    }

    /// Live nodes, in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, d)| d.alive)
            .map(|(i, _)| NodeId(i))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|d| d.alive).count()
    }

    pub fn edge_count(&self) -> usize {
        self.node_ids()
            .map(|n| {
                self.slots(n)
                    .iter()
                    .map(|&slot| self.use_of(UseRef { node: n, slot }).def_count())
                    .sum::<usize>()
            })
            .sum()
    }

    /// The argument slots the node's kind carries.
    pub fn slots(&self, n: NodeId) -> &'static [Slot] {
        match self.kind(n) {
            NodeKind::Assignment { .. } | NodeKind::Unary { .. } => &[Slot::Arg],
            NodeKind::Concatenation { .. } | NodeKind::Binary { .. } => {
                &[Slot::Left, Slot::Right]
            }
            NodeKind::Initialization { .. } => &[],
        }
    }

    pub fn use_of(&self, u: UseRef) -> &Use {
        match (&self.nodes[u.node.0].kind, u.slot) {
            (NodeKind::Assignment { arg }, Slot::Arg) => arg,
            (NodeKind::Unary { arg, .. }, Slot::Arg) => arg,
            (NodeKind::Concatenation { left, .. }, Slot::Left) => left,
            (NodeKind::Concatenation { right, .. }, Slot::Right) => right,
            (NodeKind::Binary { left, .. }, Slot::Left) => left,
            (NodeKind::Binary { right, .. }, Slot::Right) => right,
            _ => unreachable!("slot {:?} not present on node", u.slot),
        }
    }

    fn use_of_mut(&mut self, u: UseRef) -> &mut Use {
        match (&mut self.nodes[u.node.0].kind, u.slot) {
            (NodeKind::Assignment { arg }, Slot::Arg) => arg,
            (NodeKind::Unary { arg, .. }, Slot::Arg) => arg,
            (NodeKind::Concatenation { left, .. }, Slot::Left) => left,
            (NodeKind::Concatenation { right, .. }, Slot::Right) => right,
            (NodeKind::Binary { left, .. }, Slot::Left) => left,
            (NodeKind::Binary { right, .. }, Slot::Right) => right,
            _ => unreachable!("slot {:?} not present on node", u.slot),
        }
    }

    /// Slots of other nodes this node flows into.
    pub fn uses_of(&self, n: NodeId) -> impl Iterator<Item = UseRef> + '_ {
        self.nodes[n.0].uses.iter().copied()
    }

    /// Records possible flow from a definition into a slot.
    pub fn add_def(&mut self, u: UseRef, def: NodeId) {
        self.use_of_mut(u).defs.insert(def);
        self.nodes[def.0].uses.insert(u);
    }

    pub fn remove_def(&mut self, u: UseRef, def: NodeId) {
        self.use_of_mut(u).defs.swap_remove(&def);
        self.nodes[def.0].uses.swap_remove(&u);
    }

    /// Makes every slot currently fed by `from` be fed by `to` instead.
    pub(crate) fn redirect_uses(&mut self, from: NodeId, to: NodeId) {
        let uses = std::mem::take(&mut self.nodes[from.0].uses);
        for u in uses {
            let defs = &mut self.use_of_mut(u).defs;
            defs.swap_remove(&from);
            defs.insert(to);
            self.nodes[to.0].uses.insert(u);
        }
    }

    /// Moves all definitions of one slot into another.
    pub(crate) fn move_defs(&mut self, from: UseRef, to: UseRef) {
        let defs = std::mem::take(&mut self.use_of_mut(from).defs);
        for d in defs {
            self.nodes[d.0].uses.swap_remove(&from);
            self.add_def(to, d);
        }
    }

    /// Detaches a node from all edges and drops it from the graph.
    pub(crate) fn remove_node(&mut self, n: NodeId) {
        let uses = std::mem::take(&mut self.nodes[n.0].uses);
        for u in uses {
            if u.node != n {
                self.use_of_mut(u).defs.swap_remove(&n);
            }
        }
        for &slot in self.slots(n) {
            let defs = std::mem::take(&mut self.use_of_mut(UseRef { node: n, slot }).defs);
            for d in defs {
                if d != n {
                    self.nodes[d.0].uses.swap_remove(&UseRef { node: n, slot });
                }
            }
        }
        self.nodes[n.0].alive = false;
    }

    /// Graphviz rendering of the live nodes.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph FlowGraph {\n");
        for n in self.node_ids() {
            match self.kind(n) {
                NodeKind::Assignment { arg } => {
                    out.push_str(&format!("  n{} [label=\"\",shape=circle]\n", n.0));
                    for d in arg.defs() {
                        out.push_str(&format!("  n{} -> n{}\n", d.0, n.0));
                    }
                }
                NodeKind::Concatenation { left, right } => {
                    out.push_str(&format!(
                        "  n{} [label=\"concat|<arg1>|<arg2>\",shape=record]\n",
                        n.0
                    ));
                    for d in left.defs() {
                        out.push_str(&format!("  n{} -> n{}:arg1\n", d.0, n.0));
                    }
                    for d in right.defs() {
                        out.push_str(&format!("  n{} -> n{}:arg2\n", d.0, n.0));
                    }
                }
                NodeKind::Initialization { lang } => {
                    out.push_str(&format!(
                        "  n{} [label=\"{}\"]\n",
                        n.0,
                        dot_escape(&stock::name(lang))
                    ));
                }
                NodeKind::Unary { op, arg } => {
                    out.push_str(&format!(
                        "  n{} [label=\"{}|<arg>\",shape=record]\n",
                        n.0, op
                    ));
                    for d in arg.defs() {
                        out.push_str(&format!("  n{} -> n{}:arg\n", d.0, n.0));
                    }
                }
                NodeKind::Binary { op, left, right } => {
                    out.push_str(&format!(
                        "  n{} [label=\"{}|<arg1>|<arg2>\",shape=record]\n",
                        n.0, op
                    ));
                    for d in left.defs() {
                        out.push_str(&format!("  n{} -> n{}:arg1\n", d.0, n.0));
                    }
                    for d in right.defs() {
                        out.push_str(&format!("  n{} -> n{}:arg2\n", d.0, n.0));
                    }
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

fn dot_escape(s: &str) -> String {
    let mut out = String::new();
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}

/// Builds the flow graph for a program.
///
/// Returns the graph and the map from each statement to the node holding
/// the value of its primary definition.
pub fn build_flow_graph(
    program: &Program,
    alias: &AliasAnalysis,
    reaching: &ReachingDefinitions,
) -> (FlowGraph, IndexMap<StmtId, NodeId>) {
    let mut translation = build::translate(program, alias);
    connect::connect(program, alias, reaching, &mut translation);
    (translation.graph, translation.stmt_nodes)
}
