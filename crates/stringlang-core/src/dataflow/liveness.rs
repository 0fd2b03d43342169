//! Backward liveness of text, buffer, and array variables.

use indexmap::IndexSet;

use crate::dataflow::WorkList;
use crate::program::{plain_defs, plain_uses, Program, StmtId, VarId};

/// Live variable sets, one per statement.
///
/// A variable is live after a statement if some path from there reaches a
/// use before any redefinition. Statements that mutate a value in place
/// count as uses of the mutated variable, so buffers and arrays stay live
/// across their whole build-up.
pub struct Liveness {
    live_after: Vec<IndexSet<VarId>>,
}

impl Liveness {
    /// Runs the analysis to fixpoint.
    pub fn compute(program: &Program) -> Self {
        let mut live_after: Vec<IndexSet<VarId>> = vec![IndexSet::new(); program.stmt_count()];
        let mut worklist = WorkList::seed_all(program);
        while let Some(s) = worklist.pop() {
            let mut live = live_after[s.0].clone();
            for v in plain_defs(program, s) {
                live.swap_remove(&v);
            }
            for v in plain_uses(program, s) {
                live.insert(v);
            }
            for &p in &program.stmt(s).preds {
                let before = &mut live_after[p.0];
                let len = before.len();
                before.extend(live.iter().copied());
                if before.len() != len {
                    worklist.push(p);
                }
            }
        }
        Liveness { live_after }
    }

    /// Variables live just after the given statement.
    pub fn live_after(&self, s: StmtId) -> &IndexSet<VarId> {
        &self.live_after[s.0]
    }
}
