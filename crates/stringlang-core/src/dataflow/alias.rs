//! Forward may-alias analysis with corruption tracking.
//!
//! For every program point the analysis knows which variable pairs may
//! refer to the same mutable value, which of those pairs are only
//! possible rather than certain, and which variables have escaped to
//! unanalyzed code. All sets are filtered by liveness so dead variables
//! never widen later phases.

use indexmap::{IndexMap, IndexSet};

use crate::dataflow::{Liveness, WorkList};
use crate::program::{Program, StmtId, StmtKind, VarId};

/// Alias information for one program point.
#[derive(Debug, Clone)]
pub struct AliasInfo {
    aliases: IndexMap<VarId, IndexSet<VarId>>,
    maybe: IndexMap<VarId, IndexSet<VarId>>,
    corrupted: IndexSet<VarId>,
    live: IndexSet<VarId>,
}

impl AliasInfo {
    fn new(live: IndexSet<VarId>) -> Self {
        AliasInfo {
            aliases: IndexMap::new(),
            maybe: IndexMap::new(),
            corrupted: IndexSet::new(),
            live,
        }
    }

    /// Variables possibly aliased with `v`, including `v` itself once it
    /// has been defined.
    pub fn aliases_for(&self, v: VarId) -> impl Iterator<Item = VarId> + '_ {
        self.aliases.get(&v).into_iter().flatten().copied()
    }

    /// Variables that may or may not be aliased with `v`.
    pub fn maybe_for(&self, v: VarId) -> impl Iterator<Item = VarId> + '_ {
        self.maybe.get(&v).into_iter().flatten().copied()
    }

    pub fn are_aliased(&self, v1: VarId, v2: VarId) -> bool {
        self.aliases.get(&v1).is_some_and(|s| s.contains(&v2))
    }

    /// Whether `v` may hold a value that escaped to unanalyzed code.
    pub fn is_corrupt(&self, v: VarId) -> bool {
        self.corrupted.contains(&v)
    }

    fn ensure_entries(&mut self, v: VarId) {
        self.aliases.entry(v).or_default();
        self.maybe.entry(v).or_default();
    }

    fn add_alias(&mut self, v1: VarId, v2: VarId) -> bool {
        self.ensure_entries(v1);
        self.ensure_entries(v2);
        let mut changed = self.aliases[&v1].insert(v2);
        changed |= self.aliases[&v2].insert(v1);
        changed
    }

    fn add_maybe(&mut self, v1: VarId, v2: VarId) -> bool {
        self.ensure_entries(v1);
        self.ensure_entries(v2);
        let mut changed = self.maybe[&v1].insert(v2);
        changed |= self.maybe[&v2].insert(v1);
        changed
    }

    fn live_subset(&self, vars: Option<&IndexSet<VarId>>) -> IndexSet<VarId> {
        vars.into_iter()
            .flatten()
            .copied()
            .filter(|v| self.live.contains(v))
            .collect()
    }

    /// Joins `other` into this point unchanged.
    fn merge_identity(&mut self, other: &AliasInfo) -> bool {
        self.merge_keys(other, None)
    }

    /// Joins `other` while killing every alias of `a`, then aliases `a`
    /// with itself. Used when `a` is bound to a fresh value.
    fn merge_filter(&mut self, other: &AliasInfo, a: VarId) -> bool {
        let mut changed = self.merge_keys(other, Some(a));
        if other.live.contains(&a) {
            self.ensure_entries(a);
            changed |= self.aliases[&a].insert(a);
        }
        changed
    }

    fn merge_keys(&mut self, other: &AliasInfo, filter: Option<VarId>) -> bool {
        let mut changed = false;
        for (&v1, oal) in &other.aliases {
            if !other.live.contains(&v1) || filter == Some(v1) {
                continue;
            }
            let mut al = other.live_subset(Some(oal));
            let mut ml = other.live_subset(other.maybe.get(&v1));
            if let Some(a) = filter {
                al.swap_remove(&a);
                ml.swap_remove(&a);
            }
            if !self.aliases.contains_key(&v1) {
                self.aliases.insert(v1, al);
                self.maybe.insert(v1, ml);
                changed = true;
            } else {
                let ar = &mut self.aliases[&v1];
                // a variable aliased on one branch only becomes a maybe
                let diff1: Vec<VarId> = al
                    .iter()
                    .filter(|v| !ar.contains(*v) && other.live.contains(*v))
                    .copied()
                    .collect();
                let diff2: Vec<VarId> = ar
                    .iter()
                    .filter(|v| !al.contains(*v) && other.live.contains(*v))
                    .copied()
                    .collect();
                for v in al {
                    changed |= ar.insert(v);
                }
                let mr = self.maybe.entry(v1).or_default();
                for v in diff1.into_iter().chain(diff2).chain(ml) {
                    changed |= mr.insert(v);
                }
            }
        }
        for &v in &other.corrupted {
            if other.live.contains(&v) && filter != Some(v) {
                changed |= self.corrupted.insert(v);
            }
        }
        changed
    }

    /// Aliases `a` with everything aliased with `b` in `other`.
    fn merge_assign(&mut self, other: &AliasInfo, a: VarId, b: VarId) -> bool {
        let mut changed = false;
        if other.live.contains(&a) && other.aliases.contains_key(&b) {
            let ba = other.live_subset(other.aliases.get(&b));
            let bm = other.live_subset(other.maybe.get(&b));
            self.ensure_entries(a);
            for &v in &ba {
                changed |= self.aliases[&a].insert(v);
            }
            for &v in &bm {
                changed |= self.maybe[&a].insert(v);
            }
            for &bav in &ba {
                self.ensure_entries(bav);
                changed |= self.aliases[&bav].insert(a);
                if bm.contains(&bav) {
                    changed |= self.maybe[&bav].insert(a);
                }
            }
            if other.corrupted.contains(&b) {
                changed |= self.corrupted.insert(a);
            }
        }
        changed
    }

    /// Marks everything aliased with `a` in `other` as corrupted.
    fn merge_corrupt(&mut self, other: &AliasInfo, a: VarId) -> bool {
        let mut changed = false;
        if other.live.contains(&a) {
            changed |= self.corrupted.insert(a);
        }
        for v in other.aliases_for(a) {
            if other.live.contains(&v) {
                changed |= self.corrupted.insert(v);
            }
        }
        changed
    }
}

/// Per-statement alias information, computed to fixpoint.
pub struct AliasAnalysis {
    info: Vec<AliasInfo>,
}

impl AliasAnalysis {
    pub fn compute(program: &Program, liveness: &Liveness) -> Self {
        let mut info: Vec<AliasInfo> = program
            .stmt_ids()
            .map(|s| AliasInfo::new(liveness.live_after(s).clone()))
            .collect();
        let mut worklist = WorkList::seed_all(program);
        while let Some(s) = worklist.pop() {
            let before = info[s.0].clone();
            for &ss in &program.stmt(s).succs {
                if transfer_into(program, s, &before, &mut info[ss.0]) {
                    worklist.push(ss);
                }
            }
        }
        AliasAnalysis { info }
    }

    /// Alias information just before the given statement.
    pub fn info_before(&self, s: StmtId) -> &AliasInfo {
        &self.info[s.0]
    }

    /// Variables the statement may write, widened through aliasing.
    ///
    /// In strict mode only certain writes count: maybe-aliases are
    /// dropped, and array writes define nothing since the written cell is
    /// unknown. Strict definitions kill reaching definitions; non-strict
    /// ones create flow graph nodes.
    pub fn defined_vars(&self, program: &Program, s: StmtId, strict: bool) -> IndexSet<VarId> {
        let before = self.info_before(s);
        let alias_op = |to: VarId| {
            let mut vars: IndexSet<VarId> = IndexSet::new();
            vars.insert(to);
            vars.extend(before.aliases_for(to));
            if strict {
                for v in before.maybe_for(to) {
                    vars.swap_remove(&v);
                }
            }
            vars
        };
        match &program.stmt(s).kind {
            StmtKind::BufferAppend { to, .. }
            | StmtKind::BufferPrepend { to, .. }
            | StmtKind::BufferUnary { to, .. }
            | StmtKind::BufferBinary { to, .. }
            | StmtKind::BufferCorrupt { to }
            | StmtKind::ArrayCorrupt { to } => alias_op(*to),
            StmtKind::ArrayWriteText { to, .. } | StmtKind::ArrayWriteArray { to, .. } => {
                if strict {
                    IndexSet::new()
                } else {
                    alias_op(*to)
                }
            }
            StmtKind::Call { result, args, .. } => {
                let mut vars: IndexSet<VarId> = IndexSet::new();
                vars.insert(*result);
                for &arg in args {
                    let mut add: IndexSet<VarId> = before.aliases_for(arg).collect();
                    if strict {
                        for v in before.maybe_for(arg) {
                            add.swap_remove(&v);
                        }
                    }
                    vars.extend(add);
                }
                vars
            }
            StmtKind::Entry { params } => {
                let m = program.stmt(s).method;
                let mut vars: IndexSet<VarId> = params.iter().copied().collect();
                vars.extend(program.method(m).shadows.iter().flatten().copied());
                vars
            }
            StmtKind::TextInit { to, .. }
            | StmtKind::TextAssign { to, .. }
            | StmtKind::TextConcat { to, .. }
            | StmtKind::TextFromBuffer { to, .. }
            | StmtKind::TextFromArray { to, .. }
            | StmtKind::BufferInit { to, .. }
            | StmtKind::BufferAssign { to, .. }
            | StmtKind::ArrayNew { to }
            | StmtKind::ArrayAssign { to, .. }
            | StmtKind::ArrayFromArray { to, .. } => [*to].into_iter().collect(),
            StmtKind::Return { .. } | StmtKind::Nop => IndexSet::new(),
        }
    }
}

fn transfer_into(program: &Program, s: StmtId, before: &AliasInfo, after: &mut AliasInfo) -> bool {
    match &program.stmt(s).kind {
        StmtKind::BufferAssign { to, from }
        | StmtKind::ArrayAssign { to, from }
        | StmtKind::ArrayFromArray { to, from } => {
            let mut changed = after.merge_filter(before, *to);
            changed |= after.merge_assign(before, *to, *from);
            changed
        }
        StmtKind::BufferCorrupt { to } | StmtKind::ArrayCorrupt { to } => {
            let mut changed = after.merge_identity(before);
            changed |= after.merge_corrupt(before, *to);
            changed
        }
        StmtKind::BufferInit { to, .. } | StmtKind::ArrayNew { to } => {
            after.merge_filter(before, *to)
        }
        StmtKind::ArrayWriteText { to, from } | StmtKind::ArrayWriteArray { to, from } => {
            let mut changed = after.merge_identity(before);
            changed |= after.merge_assign(before, *to, *from);
            changed
        }
        StmtKind::Call { result, .. } => after.merge_filter(before, *result),
        StmtKind::Entry { params } => {
            let m = program.stmt(s).method;
            let shadows = &program.method(m).shadows;
            let mut changed = false;
            for (i, &pi) in params.iter().enumerate() {
                changed |= after.add_alias(pi, pi);
                if let Some(shadow) = shadows[i] {
                    for (j, &pj) in params.iter().enumerate() {
                        if program.var_kind(pi) == program.var_kind(pj) {
                            changed |= after.add_alias(pi, pj);
                            changed |= after.add_alias(shadow, pj);
                            if i != j {
                                changed |= after.add_maybe(pi, pj);
                                changed |= after.add_maybe(shadow, pj);
                            }
                        }
                    }
                }
            }
            changed
        }
        StmtKind::Return { .. } => false,
        StmtKind::TextInit { .. }
        | StmtKind::TextAssign { .. }
        | StmtKind::TextConcat { .. }
        | StmtKind::TextFromBuffer { .. }
        | StmtKind::TextFromArray { .. }
        | StmtKind::BufferAppend { .. }
        | StmtKind::BufferPrepend { .. }
        | StmtKind::BufferUnary { .. }
        | StmtKind::BufferBinary { .. }
        | StmtKind::Nop => after.merge_identity(before),
    }
}
