//! Reaching definitions over the alias-widened definition sets.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};

use crate::dataflow::{AliasAnalysis, Liveness};
use crate::program::{Program, StmtId, VarId};

/// For each statement and variable, the definitions visible just before it.
///
/// Each definition is walked forward from its statement until a strict
/// redefinition kills it or the variable dies. Possible writes through
/// maybe-aliases are definitions but do not kill, so both the old and the
/// new value stay visible past them.
pub struct ReachingDefinitions {
    defs: IndexMap<(StmtId, VarId), IndexSet<StmtId>>,
}

impl ReachingDefinitions {
    pub fn compute(program: &Program, liveness: &Liveness, alias: &AliasAnalysis) -> Self {
        let mut defs: IndexMap<(StmtId, VarId), IndexSet<StmtId>> = IndexMap::new();
        for m in program.method_ids() {
            for &s in &program.method(m).statements {
                for v in alias.defined_vars(program, s, false) {
                    let mut queue: VecDeque<StmtId> =
                        program.stmt(s).succs.iter().copied().collect();
                    let mut seen: IndexSet<StmtId> = IndexSet::new();
                    while let Some(ss) = queue.pop_front() {
                        if !seen.insert(ss) {
                            continue;
                        }
                        defs.entry((ss, v)).or_default().insert(s);
                        if !alias.defined_vars(program, ss, true).contains(&v)
                            && liveness.live_after(ss).contains(&v)
                        {
                            queue.extend(program.stmt(ss).succs.iter().copied());
                        }
                    }
                }
            }
        }
        ReachingDefinitions { defs }
    }

    /// Definitions of `v` reaching the point just before `s`.
    pub fn reaching_defs(&self, s: StmtId, v: VarId) -> impl Iterator<Item = StmtId> + '_ {
        self.defs.get(&(s, v)).into_iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramBuilder;
    use stringlang_automata::stock;

    #[test]
    fn later_definition_shadows_earlier() {
        let mut b = ProgramBuilder::new();
        let m = b.method("main", &[]).unwrap();
        let x = b.text_var();
        let y = b.text_var();
        let d1 = b.text_init(m, x, stock::constant("a")).unwrap();
        let d2 = b.text_init(m, x, stock::constant("b")).unwrap();
        let use_x = b.text_assign(m, y, x).unwrap();
        let r = b.ret(m, y).unwrap();
        b.add_flow(b.entry_of(m), d1).unwrap();
        b.add_flow(d1, d2).unwrap();
        b.add_flow(d2, use_x).unwrap();
        b.add_flow(use_x, r).unwrap();
        let p = b.build();

        let live = Liveness::compute(&p);
        let aa = AliasAnalysis::compute(&p, &live);
        let rd = ReachingDefinitions::compute(&p, &live, &aa);
        let reaching: Vec<StmtId> = rd.reaching_defs(use_x, x).collect();
        assert_eq!(reaching, vec![d2]);
    }

    #[test]
    fn both_branch_definitions_reach_the_join() {
        let mut b = ProgramBuilder::new();
        let m = b.method("main", &[]).unwrap();
        let x = b.text_var();
        let y = b.text_var();
        let d1 = b.text_init(m, x, stock::constant("a")).unwrap();
        let d2 = b.text_init(m, x, stock::constant("b")).unwrap();
        let join = b.nop(m);
        let use_x = b.text_assign(m, y, x).unwrap();
        let r = b.ret(m, y).unwrap();
        b.add_flow(b.entry_of(m), d1).unwrap();
        b.add_flow(b.entry_of(m), d2).unwrap();
        b.add_flow(d1, join).unwrap();
        b.add_flow(d2, join).unwrap();
        b.add_flow(join, use_x).unwrap();
        b.add_flow(use_x, r).unwrap();
        let p = b.build();

        let live = Liveness::compute(&p);
        let aa = AliasAnalysis::compute(&p, &live);
        let rd = ReachingDefinitions::compute(&p, &live, &aa);
        let reaching: IndexSet<StmtId> = rd.reaching_defs(use_x, x).collect();
        assert!(reaching.contains(&d1));
        assert!(reaching.contains(&d2));
    }

    #[test]
    fn maybe_writes_do_not_kill() {
        let mut b = ProgramBuilder::new();
        let p1 = b.buffer_var();
        let p2 = b.buffer_var();
        let f = b.method("f", &[p1, p2]).unwrap();
        let s = b.text_var();
        let out = b.text_var();
        let i = b.text_init(f, s, stock::constant("x")).unwrap();
        let app = b.buffer_append(f, p1, s).unwrap();
        let conv = b.text_from_buffer(f, out, p2).unwrap();
        let r = b.ret(f, out).unwrap();
        let entry = b.entry_of(f);
        b.add_flow(entry, i).unwrap();
        b.add_flow(i, app).unwrap();
        b.add_flow(app, conv).unwrap();
        b.add_flow(conv, r).unwrap();
        let p = b.build();

        let live = Liveness::compute(&p);
        let aa = AliasAnalysis::compute(&p, &live);
        let rd = ReachingDefinitions::compute(&p, &live, &aa);
        // p2 may or may not have been hit by the append, so both the
        // entry value and the appended value reach the read
        let reaching: IndexSet<StmtId> = rd.reaching_defs(conv, p2).collect();
        assert!(reaching.contains(&entry));
        assert!(reaching.contains(&app));
    }
}
