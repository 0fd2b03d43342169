//! Edge wiring for the flow graph.

use crate::dataflow::{AliasAnalysis, ReachingDefinitions};
use crate::program::{Program, StmtId, StmtKind, VarId};

use super::build::{self, Translation};
use super::{NodeId, NodeKind, Slot, UseRef};

/// Wires definition edges into the nodes created by [`translate`].
///
/// Each node's argument slots receive, per relevant variable, the nodes
/// of all definitions reaching the statement. Call and entry statements
/// additionally bridge values across method boundaries: arguments flow
/// into parameters, shadow variables carry mutated arguments back to the
/// call site, and a parameter's unmutated value seeds its shadow.
///
/// [`translate`]: build::translate
pub(crate) fn connect(
    program: &Program,
    alias: &AliasAnalysis,
    reaching: &ReachingDefinitions,
    translation: &mut Translation,
) {
    let link = |translation: &mut Translation, u: UseRef, s: StmtId, v: VarId| {
        for ds in reaching.reaching_defs(s, v) {
            let def = translation.node_map[&ds][&v];
            translation.graph.add_def(u, def);
        }
    };

    for m in program.method_ids() {
        for &s in &program.method(m).statements {
            let vars: Vec<(VarId, NodeId)> = translation.node_map[&s]
                .iter()
                .map(|(&v, &n)| (v, n))
                .collect();
            for (v, n) in vars {
                let arg = UseRef {
                    node: n,
                    slot: Slot::Arg,
                };
                let left = UseRef {
                    node: n,
                    slot: Slot::Left,
                };
                let right = UseRef {
                    node: n,
                    slot: Slot::Right,
                };
                match program.stmt(s).kind {
                    StmtKind::TextAssign { from, .. }
                    | StmtKind::BufferInit { from, .. }
                    | StmtKind::BufferAssign { from, .. }
                    | StmtKind::ArrayAssign { from, .. }
                    | StmtKind::ArrayFromArray { from, .. } => {
                        link(translation, arg, s, from);
                    }
                    StmtKind::ArrayWriteText { from, .. }
                    | StmtKind::ArrayWriteArray { from, .. } => {
                        link(translation, arg, s, v);
                        link(translation, arg, s, from);
                    }
                    StmtKind::TextConcat {
                        left: l, right: r, ..
                    } => {
                        link(translation, left, s, l);
                        link(translation, right, s, r);
                    }
                    StmtKind::BufferAppend { from, .. } => {
                        link(translation, left, s, v);
                        link(translation, right, s, from);
                    }
                    StmtKind::BufferPrepend { from, .. } => {
                        link(translation, left, s, from);
                        link(translation, right, s, v);
                    }
                    StmtKind::BufferUnary { .. } => {
                        link(translation, arg, s, v);
                    }
                    StmtKind::BufferBinary { from, .. } => {
                        link(translation, left, s, v);
                        link(translation, right, s, from);
                    }
                    StmtKind::TextFromBuffer { from, .. }
                    | StmtKind::TextFromArray { from, .. } => {
                        if matches!(translation.graph.kind(n), NodeKind::Assignment { .. }) {
                            link(translation, arg, s, from);
                        }
                    }
                    StmtKind::Call {
                        result,
                        target,
                        ref args,
                    } => {
                        if v == result {
                            for &r in &program.method(target).returns {
                                if let StmtKind::Return { result: rv } = program.stmt(r).kind {
                                    link(translation, arg, r, rv);
                                }
                            }
                        } else {
                            let aliases: Vec<VarId> =
                                alias.info_before(s).aliases_for(v).collect();
                            for (i, &a) in args.iter().enumerate() {
                                if !aliases.contains(&a) {
                                    continue;
                                }
                                if let Some(shadow) = program.method(target).shadows[i] {
                                    for &r in &program.method(target).returns {
                                        link(translation, arg, r, shadow);
                                    }
                                }
                            }
                        }
                    }
                    StmtKind::Entry { ref params } => {
                        for (i, &p) in params.iter().enumerate() {
                            if v == p {
                                for &c in &program.method(m).call_sites {
                                    if let StmtKind::Call { ref args, .. } =
                                        program.stmt(c).kind
                                    {
                                        link(translation, arg, c, args[i]);
                                    }
                                }
                            }
                            if program.method(m).shadows[i] == Some(v) {
                                let param_node = translation.node_map[&s][&p];
                                translation.graph.add_def(arg, param_node);
                            }
                        }
                    }
                    StmtKind::TextInit { .. }
                    | StmtKind::BufferCorrupt { .. }
                    | StmtKind::ArrayNew { .. }
                    | StmtKind::ArrayCorrupt { .. }
                    | StmtKind::Return { .. }
                    | StmtKind::Nop => {}
                }
            }
        }
    }
}
