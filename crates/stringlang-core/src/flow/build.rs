//! Node creation for the flow graph.

use std::rc::Rc;

use indexmap::IndexMap;
use stringlang_automata::{stock, Automaton};

use crate::dataflow::AliasAnalysis;
use crate::program::{Program, StmtId, StmtKind, VarId};

use super::{FlowGraph, NodeId};

/// The flow graph together with its statement-to-node bookkeeping.
pub(crate) struct Translation {
    pub(crate) graph: FlowGraph,
    /// Per statement, the node created for each variable it may define.
    pub(crate) node_map: IndexMap<StmtId, IndexMap<VarId, NodeId>>,
    /// Per statement, the node holding its primary definition.
    pub(crate) stmt_nodes: IndexMap<StmtId, NodeId>,
}

/// Creates one node per variable possibly defined at each statement.
///
/// Mutation statements define not just their target but every alias of
/// it, so a single statement can fan out into several nodes. Edges are
/// wired separately by the connector.
pub(crate) fn translate(program: &Program, alias: &AliasAnalysis) -> Translation {
    let mut graph = FlowGraph::new();
    let mut node_map = IndexMap::new();
    let mut stmt_nodes = IndexMap::new();
    let any = Rc::new(stock::any_string());
    let none = Rc::new(Automaton::new());

    for m in program.method_ids() {
        for &s in &program.method(m).statements {
            let mut vars: IndexMap<VarId, NodeId> = IndexMap::new();
            for v in alias.defined_vars(program, s, false) {
                let n = match program.stmt(s).kind {
                    StmtKind::TextInit { ref lang, .. } => {
                        graph.add_initialization(Rc::clone(lang))
                    }
                    StmtKind::TextAssign { .. }
                    | StmtKind::BufferInit { .. }
                    | StmtKind::BufferAssign { .. }
                    | StmtKind::ArrayAssign { .. }
                    | StmtKind::ArrayFromArray { .. }
                    | StmtKind::ArrayWriteText { .. }
                    | StmtKind::ArrayWriteArray { .. }
                    | StmtKind::Call { .. }
                    | StmtKind::Entry { .. } => graph.add_assignment(),
                    StmtKind::TextConcat { .. }
                    | StmtKind::BufferAppend { .. }
                    | StmtKind::BufferPrepend { .. } => graph.add_concatenation(),
                    StmtKind::BufferUnary { ref op, .. } => graph.add_unary(op.clone()),
                    StmtKind::BufferBinary { ref op, .. } => graph.add_binary(op.clone()),
                    StmtKind::BufferCorrupt { .. } | StmtKind::ArrayCorrupt { .. } => {
                        graph.add_initialization(Rc::clone(&any))
                    }
                    StmtKind::ArrayNew { .. } => graph.add_initialization(Rc::clone(&none)),
                    StmtKind::TextFromBuffer { from, .. }
                    | StmtKind::TextFromArray { from, .. } => {
                        if alias.info_before(s).is_corrupt(from) {
                            graph.add_initialization(Rc::clone(&any))
                        } else {
                            graph.add_assignment()
                        }
                    }
                    StmtKind::Return { .. } | StmtKind::Nop => continue,
                };
                vars.insert(v, n);
            }
            if let Some(primary) = program.stmt(s).kind.primary_def() {
                if let Some(&n) = vars.get(&primary) {
                    stmt_nodes.insert(s, n);
                }
            }
            node_map.insert(s, vars);
        }
    }

    Translation {
        graph,
        node_map,
        stmt_nodes,
    }
}
