//! Right linearization of two sided recursion.
//!
//! Components recursing on both sides describe context-free languages
//! the automaton construction cannot handle. Following Mohri and
//! Nederhof, every member A of such a component gets a primed partner
//! A' carrying the continuation of the derivation, and A's productions
//! are rewritten so all recursion runs rightward. The result is a
//! conservative regular superset of the original language.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use super::{Components, Grammar, NtId, Production, Recursion};

/// Rewrites every component with both sided recursion into right
/// recursive form.
///
/// `keep_epsilon` names the nonterminals whose languages are read off
/// directly, typically the query points; their primed partners, and
/// those of nonterminals referenced from outside their component, can
/// end a derivation and therefore produce the empty string.
///
/// Returns the updated component partition, with primed and helper
/// nonterminals registered in their component, and the number of
/// components rewritten.
pub fn approximate_non_regular(
    g: &mut Grammar,
    keep_epsilon: &IndexSet<NtId>,
) -> (Components, usize) {
    let mut comps = Components::compute(g);

    let mut need_epsilon = vec![false; g.nonterminal_count()];
    for &a in keep_epsilon {
        need_epsilon[a.0] = true;
    }
    for a in g.nt_ids() {
        for p in g.productions(a) {
            for b in p.referenced() {
                if comps.comp_of(b) != comps.comp_of(a) {
                    need_epsilon[b.0] = true;
                }
            }
        }
    }

    let mut rewritten = 0usize;
    for c in comps.comp_ids().collect::<Vec<_>>() {
        if comps.component(c).recursion() != Recursion::Both {
            continue;
        }
        rewritten += 1;
        let members: Vec<NtId> = comps.component(c).members().to_vec();
        let in_comp: IndexSet<NtId> = members.iter().copied().collect();

        let mut primed: IndexMap<NtId, NtId> = IndexMap::new();
        for &a in &members {
            let ap = g.add_nonterminal();
            comps.add_member(c, ap);
            if need_epsilon[a.0] {
                g.add_epsilon(ap);
            }
            primed.insert(a, ap);
        }

        for &a in &members {
            let ap = primed[&a];
            let old = std::mem::take(&mut g.productions[a.0]);
            for p in old {
                match p {
                    Production::Unit { b } => {
                        if in_comp.contains(&b) {
                            g.add_unit(a, b);
                            g.add_unit(primed[&b], ap);
                        } else {
                            g.add_pair(a, b, ap);
                        }
                    }
                    Production::Pair { b, c: second } => {
                        match (in_comp.contains(&b), in_comp.contains(&second)) {
                            (true, true) => {
                                g.add_unit(a, b);
                                g.add_unit(primed[&b], second);
                                g.add_unit(primed[&second], ap);
                            }
                            (true, false) => {
                                g.add_unit(a, b);
                                g.add_pair(primed[&b], second, ap);
                            }
                            (false, true) => {
                                g.add_pair(a, b, second);
                                g.add_unit(primed[&second], ap);
                            }
                            (false, false) => {
                                let r = g.add_nonterminal();
                                comps.add_member(c, r);
                                g.add_pair(a, r, ap);
                                g.add_pair(r, b, second);
                            }
                        }
                    }
                    Production::Automaton { lang } => {
                        let r = g.add_nonterminal();
                        comps.add_member(c, r);
                        g.add_pair(a, r, ap);
                        g.add_automaton(r, lang);
                    }
                    Production::Epsilon => g.add_epsilon(a),
                    Production::Unary { op, b } => {
                        let r = g.add_nonterminal();
                        comps.add_member(c, r);
                        g.add_pair(a, r, ap);
                        g.add_unary(r, op, b);
                    }
                    Production::Binary { op, b, c: second } => {
                        let r = g.add_nonterminal();
                        comps.add_member(c, r);
                        g.add_pair(a, r, ap);
                        g.add_binary(r, op, b, second);
                    }
                }
            }
        }
        comps.set_recursion(c, Recursion::Right);
    }

    if rewritten > 0 {
        debug!(rewritten, "linearized two sided recursion");
    }
    (comps, rewritten)
}
