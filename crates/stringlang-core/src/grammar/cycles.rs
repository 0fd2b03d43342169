//! Operation cycle approximation.
//!
//! A production applying a string operation to a symbol of its own
//! component feeds the operation its own output, which the later
//! automaton construction cannot express. Such productions are replaced
//! by regular over-approximations until none remain.

use std::rc::Rc;

use tracing::debug;

use crate::error::AnalysisError;

use super::{CompId, Components, Grammar, NtId, Production};

fn is_operation_cycle(p: &Production, comps: &Components, own: CompId) -> bool {
    match *p {
        Production::Unary { b, .. } => comps.comp_of(b) == own,
        Production::Binary { b, c, .. } => {
            comps.comp_of(b) == own || comps.comp_of(c) == own
        }
        _ => false,
    }
}

/// Number of operation cycle productions currently in the grammar.
pub fn count_operation_cycles(g: &Grammar) -> usize {
    let comps = Components::compute(g);
    g.nt_ids()
        .map(|a| {
            let own = comps.comp_of(a);
            g.productions(a)
                .iter()
                .filter(|p| is_operation_cycle(p, &comps, own))
                .count()
        })
        .sum()
}

fn cycle_key(g: &Grammar, site: (NtId, usize)) -> (u32, usize) {
    match &g.productions(site.0)[site.1] {
        Production::Unary { op, .. } => (op.op().priority(), op.id().0),
        Production::Binary { op, .. } => (op.op().priority(), op.id().0),
        _ => (0, 0),
    }
}

/// Cuts operation cycles until none remain.
///
/// Each round recomputes components and character sets, then replaces in
/// every cyclic component the one cycle whose operation ranks highest by
/// priority and registration order. The replacement language is zero or
/// more characters from the operation's charset transfer, a total and
/// cycle free over-approximation. Rounds repeat while some component
/// held more than one cycle; `max_rounds` bounds the loop.
///
/// Returns the number of productions replaced.
pub fn approximate_operation_cycles(
    g: &mut Grammar,
    max_rounds: usize,
) -> Result<usize, AnalysisError> {
    let mut cut = 0usize;
    for round in 0..max_rounds {
        let comps = Components::compute(g);
        let sets = g.charsets(&comps);
        let mut more = false;

        for c in comps.comp_ids() {
            let mut found: Vec<(NtId, usize)> = Vec::new();
            for &a in comps.component(c).members() {
                for (i, p) in g.productions(a).iter().enumerate() {
                    if is_operation_cycle(p, &comps, c) {
                        found.push((a, i));
                    }
                }
            }
            let first = match found.first() {
                Some(&site) => site,
                None => continue,
            };
            if found.len() > 1 {
                more = true;
            }
            let mut best = first;
            let mut best_key = cycle_key(g, best);
            for &site in &found[1..] {
                let key = cycle_key(g, site);
                if key > best_key {
                    best = site;
                    best_key = key;
                }
            }

            let (a, i) = best;
            let lang = match &g.productions(a)[i] {
                Production::Unary { op, b } => {
                    op.op().charset_transfer(&sets[b.0]).to_automaton()
                }
                Production::Binary { op, b, c } => op
                    .op()
                    .charset_transfer(&sets[b.0], &sets[c.0])
                    .to_automaton(),
                _ => unreachable!("cycle sites are operation productions"),
            };
            debug!(nonterminal = a.0, round, "cutting operation cycle");
            g.productions[a.0][i] = Production::Automaton {
                lang: Rc::new(lang),
            };
            cut += 1;
        }

        if !more {
            debug!(cut, rounds = round + 1, "operation cycles eliminated");
            return Ok(cut);
        }
    }
    Err(AnalysisError::ApproximationDiverged(max_rounds))
}
