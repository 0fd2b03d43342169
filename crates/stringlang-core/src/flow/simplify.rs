//! Flow graph simplification.
//!
//! Merges nodes that provably denote the same language and shortcuts
//! trivial pass-through structure. Shrinking the graph here directly
//! shrinks the grammar and the automata extracted from it later.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};

use crate::program::OpId;

use super::{FlowGraph, NodeId, NodeKind, Slot, UseRef};

/// Structural signature of a node. Two live nodes with equal keys accept
/// the same language and can be merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Assignment(Vec<NodeId>),
    Concatenation(Vec<NodeId>, Vec<NodeId>),
    Initialization(String),
    Unary(OpId, Vec<NodeId>),
    Binary(OpId, Vec<NodeId>, Vec<NodeId>),
}

fn node_key(g: &FlowGraph, n: NodeId) -> Option<NodeKey> {
    let defs_of = |slot: Slot| {
        let mut defs: Vec<NodeId> = g.use_of(UseRef { node: n, slot }).defs().collect();
        defs.sort_unstable();
        defs
    };
    match g.kind(n) {
        NodeKind::Assignment { .. } => Some(NodeKey::Assignment(defs_of(Slot::Arg))),
        NodeKind::Concatenation { .. } => Some(NodeKey::Concatenation(
            defs_of(Slot::Left),
            defs_of(Slot::Right),
        )),
        // Languages are only compared when both carry a description.
        NodeKind::Initialization { lang } => lang
            .info()
            .map(|info| NodeKey::Initialization(info.to_string())),
        NodeKind::Unary { op, .. } => Some(NodeKey::Unary(op.id(), defs_of(Slot::Arg))),
        NodeKind::Binary { op, .. } => Some(NodeKey::Binary(
            op.id(),
            defs_of(Slot::Left),
            defs_of(Slot::Right),
        )),
    }
}

/// Simplifies the graph in place until no rule applies.
///
/// Rules, applied from a worklist until fixpoint:
/// equal-key nodes merge; an assignment whose argument has a single
/// other definition is shortcut to it; a concatenation whose left side
/// is exactly the empty string becomes an assignment of its right side.
///
/// Returns the mapping from every node alive on entry to the live node
/// that now represents it.
pub fn simplify(g: &mut FlowGraph) -> IndexMap<NodeId, NodeId> {
    let old_nodes: Vec<NodeId> = g.node_ids().collect();
    let mut replaced: IndexMap<NodeId, NodeId> = IndexMap::new();
    let mut queue: VecDeque<NodeId> = old_nodes.iter().copied().collect();
    let mut queued: IndexSet<NodeId> = old_nodes.iter().copied().collect();
    let mut by_key: IndexMap<NodeKey, NodeId> = IndexMap::new();
    let mut key_of: IndexMap<NodeId, NodeKey> = IndexMap::new();

    let unregister = |by_key: &mut IndexMap<NodeKey, NodeId>,
                      key_of: &mut IndexMap<NodeId, NodeKey>,
                      n: NodeId| {
        if let Some(k) = key_of.swap_remove(&n) {
            if by_key.get(&k) == Some(&n) {
                by_key.swap_remove(&k);
            }
        }
    };

    while let Some(n) = queue.pop_front() {
        queued.swap_remove(&n);
        if !g.is_alive(n) {
            continue;
        }
        let key = node_key(g, n);

        let mut target = None;
        if let Some(k) = &key {
            if let Some(&other) = by_key.get(k) {
                if other != n {
                    // Same shape, same defs: merge n into the registered node.
                    g.redirect_uses(n, other);
                    for &slot in g.slots(n) {
                        g.move_defs(UseRef { node: n, slot }, UseRef { node: other, slot });
                    }
                    target = Some(other);
                }
            }
        }
        if target.is_none() {
            target = collapse(g, n);
        }

        if let Some(nn) = target {
            let users: Vec<NodeId> = g.uses_of(nn).map(|u| u.node).collect();
            for user in users {
                unregister(&mut by_key, &mut key_of, user);
                if queued.insert(user) {
                    queue.push_back(user);
                }
            }
            // The replacement's own shape may have changed too.
            unregister(&mut by_key, &mut key_of, nn);
            if queued.insert(nn) {
                queue.push_back(nn);
            }
            unregister(&mut by_key, &mut key_of, n);
            replaced.insert(n, nn);
            g.remove_node(n);
        } else if let Some(k) = key {
            unregister(&mut by_key, &mut key_of, n);
            by_key.insert(k.clone(), n);
            key_of.insert(n, k);
        }
    }

    let mut mapping = IndexMap::new();
    for n in old_nodes {
        let mut cur = n;
        while let Some(&next) = replaced.get(&cur) {
            cur = next;
        }
        mapping.insert(n, cur);
    }
    mapping
}

/// Shortcut rules for a single node. Returns its replacement, with all
/// edges already rewired, or `None` if the node stays.
fn collapse(g: &mut FlowGraph, n: NodeId) -> Option<NodeId> {
    match g.kind(n) {
        NodeKind::Assignment { .. } => {
            let arg = UseRef {
                node: n,
                slot: Slot::Arg,
            };
            if g.use_of(arg).contains(n) {
                g.remove_def(arg, n);
            }
            let defs: Vec<NodeId> = g.use_of(arg).defs().collect();
            if defs.len() == 1 && defs[0] != n {
                let def = defs[0];
                g.remove_def(arg, def);
                g.redirect_uses(n, def);
                return Some(def);
            }
            None
        }
        NodeKind::Concatenation { .. } => {
            let left = UseRef {
                node: n,
                slot: Slot::Left,
            };
            let defs: Vec<NodeId> = g.use_of(left).defs().collect();
            if defs.len() == 1 {
                let ld = defs[0];
                let empty_left = matches!(
                    g.kind(ld),
                    NodeKind::Initialization { lang } if lang.is_empty_string_language()
                );
                if empty_left {
                    let a = g.add_assignment();
                    g.remove_def(left, ld);
                    g.redirect_uses(n, a);
                    g.move_defs(
                        UseRef {
                            node: n,
                            slot: Slot::Right,
                        },
                        UseRef {
                            node: a,
                            slot: Slot::Arg,
                        },
                    );
                    return Some(a);
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use proptest::prelude::*;
    use stringlang_automata::stock;

    use super::*;

    #[test]
    fn equal_constant_nodes_merge() {
        let mut g = FlowGraph::new();
        let a = g.add_initialization(Rc::new(stock::constant("x")));
        let b = g.add_initialization(Rc::new(stock::constant("x")));
        let c = g.add_concatenation();
        g.add_def(
            UseRef {
                node: c,
                slot: Slot::Left,
            },
            a,
        );
        g.add_def(
            UseRef {
                node: c,
                slot: Slot::Right,
            },
            b,
        );

        let map = simplify(&mut g);

        assert_eq!(
            map[&a], map[&b],
            "identical constants should collapse to one node"
        );
        let survivor = map[&a];
        let left: Vec<NodeId> = g
            .use_of(UseRef {
                node: map[&c],
                slot: Slot::Left,
            })
            .defs()
            .collect();
        let right: Vec<NodeId> = g
            .use_of(UseRef {
                node: map[&c],
                slot: Slot::Right,
            })
            .defs()
            .collect();
        assert_eq!(left, vec![survivor]);
        assert_eq!(right, vec![survivor]);
    }

    #[test]
    fn assignment_chains_shortcut_to_their_source() {
        let mut g = FlowGraph::new();
        let init = g.add_initialization(Rc::new(stock::constant("v")));
        let a1 = g.add_assignment();
        let a2 = g.add_assignment();
        g.add_def(
            UseRef {
                node: a1,
                slot: Slot::Arg,
            },
            init,
        );
        g.add_def(
            UseRef {
                node: a2,
                slot: Slot::Arg,
            },
            a1,
        );

        let map = simplify(&mut g);

        assert_eq!(map[&a1], map[&init]);
        assert_eq!(map[&a2], map[&init]);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn self_loop_assignments_disappear() {
        let mut g = FlowGraph::new();
        let init = g.add_initialization(Rc::new(stock::constant("v")));
        let a = g.add_assignment();
        g.add_def(
            UseRef {
                node: a,
                slot: Slot::Arg,
            },
            init,
        );
        g.add_def(
            UseRef {
                node: a,
                slot: Slot::Arg,
            },
            a,
        );

        let map = simplify(&mut g);

        assert_eq!(map[&a], map[&init]);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn empty_left_concatenation_becomes_its_right_side() {
        let mut g = FlowGraph::new();
        let empty = g.add_initialization(Rc::new(stock::empty_string()));
        let value = g.add_initialization(Rc::new(stock::constant("v")));
        let concat = g.add_concatenation();
        g.add_def(
            UseRef {
                node: concat,
                slot: Slot::Left,
            },
            empty,
        );
        g.add_def(
            UseRef {
                node: concat,
                slot: Slot::Right,
            },
            value,
        );
        let user = g.add_assignment();
        g.add_def(
            UseRef {
                node: user,
                slot: Slot::Arg,
            },
            concat,
        );

        let map = simplify(&mut g);

        assert_eq!(
            map[&concat],
            map[&value],
            "concat with empty left should shortcut to the value"
        );
        assert_eq!(map[&user], map[&value]);
    }

    #[test]
    fn simplification_is_idempotent() {
        let mut g = FlowGraph::new();
        let x = g.add_initialization(Rc::new(stock::constant("x")));
        let y = g.add_initialization(Rc::new(stock::constant("y")));
        let a = g.add_assignment();
        g.add_def(
            UseRef {
                node: a,
                slot: Slot::Arg,
            },
            x,
        );
        g.add_def(
            UseRef {
                node: a,
                slot: Slot::Arg,
            },
            y,
        );
        simplify(&mut g);
        let nodes_before = g.node_count();
        let edges_before = g.edge_count();

        let map = simplify(&mut g);

        assert_eq!(g.node_count(), nodes_before);
        assert_eq!(g.edge_count(), edges_before);
        for (from, to) in &map {
            assert_eq!(from, to, "second pass should change nothing");
        }
    }

    /// Node specs: kind selector, two def picks, constant pick. Def
    /// picks index into the whole node list, so cycles are generated.
    fn build_graph(specs: &[(u8, u8, u8, u8)]) -> FlowGraph {
        let texts = ["", "a", "b"];
        let mut g = FlowGraph::new();
        let nodes: Vec<NodeId> = specs
            .iter()
            .map(|&(kind, _, _, which)| match kind % 3 {
                0 => g.add_initialization(Rc::new(stock::constant(
                    texts[which as usize % texts.len()],
                ))),
                1 => g.add_assignment(),
                _ => g.add_concatenation(),
            })
            .collect();
        for (i, &(kind, d1, d2, _)) in specs.iter().enumerate() {
            let pick = |d: u8| nodes[d as usize % nodes.len()];
            let n = nodes[i];
            match kind % 3 {
                1 => g.add_def(
                    UseRef {
                        node: n,
                        slot: Slot::Arg,
                    },
                    pick(d1),
                ),
                2 => {
                    g.add_def(
                        UseRef {
                            node: n,
                            slot: Slot::Left,
                        },
                        pick(d1),
                    );
                    g.add_def(
                        UseRef {
                            node: n,
                            slot: Slot::Right,
                        },
                        pick(d2),
                    );
                }
                _ => {}
            }
        }
        g
    }

    proptest! {
        #[test]
        fn prop_simplify_is_idempotent(
            specs in proptest::collection::vec(any::<(u8, u8, u8, u8)>(), 1..12),
        ) {
            let mut g = build_graph(&specs);
            simplify(&mut g);
            let nodes = g.node_count();
            let edges = g.edge_count();

            let map = simplify(&mut g);

            prop_assert_eq!(g.node_count(), nodes);
            prop_assert_eq!(g.edge_count(), edges);
            for (from, to) in &map {
                prop_assert_eq!(from, to);
            }
        }

        #[test]
        fn prop_mapping_lands_on_live_nodes(
            specs in proptest::collection::vec(any::<(u8, u8, u8, u8)>(), 1..12),
        ) {
            let mut g = build_graph(&specs);
            let before: Vec<NodeId> = g.node_ids().collect();

            let map = simplify(&mut g);

            for n in before {
                let live = map[&n];
                prop_assert!(g.is_alive(live));
            }
        }
    }
}
