//! Dataflow analyses over the program representation.
//!
//! Three passes run before flow graph construction: backward liveness,
//! a forward may-alias analysis that also tracks corruption, and a
//! reaching definitions pass built on top of both. Later phases query
//! their per-statement results.

pub mod alias;
pub mod liveness;
pub mod reaching;

pub use alias::{AliasAnalysis, AliasInfo};
pub use liveness::Liveness;
pub use reaching::ReachingDefinitions;

use std::collections::VecDeque;

use indexmap::IndexSet;

use crate::program::{Program, StmtId};

/// FIFO worklist over statements, deduplicating pending entries.
pub(crate) struct WorkList {
    queue: VecDeque<StmtId>,
    queued: IndexSet<StmtId>,
}

impl WorkList {
    /// Starts with every statement of the program pending.
    pub(crate) fn seed_all(program: &Program) -> Self {
        let queue: VecDeque<StmtId> = program.stmt_ids().collect();
        let queued = program.stmt_ids().collect();
        WorkList { queue, queued }
    }

    pub(crate) fn push(&mut self, s: StmtId) {
        if self.queued.insert(s) {
            self.queue.push_back(s);
        }
    }

    pub(crate) fn pop(&mut self) -> Option<StmtId> {
        let s = self.queue.pop_front()?;
        self.queued.swap_remove(&s);
        Some(s)
    }
}
