//! Definition and use sets of statements, ignoring aliasing.
//!
//! These are the sets liveness works on. The alias analysis widens the
//! definition sets of mutating statements with the aliases of the mutated
//! variable; that widened form lives in [`crate::dataflow::alias`].

use smallvec::SmallVec;

use crate::program::{Program, StmtId, StmtKind, VarId};

/// Variables a statement definitely or possibly writes, aliasing aside.
pub(crate) fn plain_defs(program: &Program, s: StmtId) -> SmallVec<[VarId; 4]> {
    match &program.stmt(s).kind {
        StmtKind::TextInit { to, .. }
        | StmtKind::TextAssign { to, .. }
        | StmtKind::TextConcat { to, .. }
        | StmtKind::TextFromBuffer { to, .. }
        | StmtKind::TextFromArray { to, .. }
        | StmtKind::BufferInit { to, .. }
        | StmtKind::BufferAssign { to, .. }
        | StmtKind::BufferAppend { to, .. }
        | StmtKind::BufferPrepend { to, .. }
        | StmtKind::BufferUnary { to, .. }
        | StmtKind::BufferBinary { to, .. }
        | StmtKind::BufferCorrupt { to }
        | StmtKind::ArrayNew { to }
        | StmtKind::ArrayAssign { to, .. }
        | StmtKind::ArrayFromArray { to, .. }
        | StmtKind::ArrayWriteText { to, .. }
        | StmtKind::ArrayWriteArray { to, .. }
        | StmtKind::ArrayCorrupt { to } => smallvec::smallvec![*to],
        StmtKind::Call { result, .. } => smallvec::smallvec![*result],
        StmtKind::Entry { params } => params.iter().copied().collect(),
        StmtKind::Return { .. } | StmtKind::Nop => SmallVec::new(),
    }
}

/// Variables a statement reads, aliasing aside.
pub(crate) fn plain_uses(program: &Program, s: StmtId) -> SmallVec<[VarId; 4]> {
    match &program.stmt(s).kind {
        StmtKind::TextAssign { from, .. }
        | StmtKind::TextFromBuffer { from, .. }
        | StmtKind::TextFromArray { from, .. }
        | StmtKind::BufferInit { from, .. }
        | StmtKind::BufferAssign { from, .. }
        | StmtKind::ArrayAssign { from, .. }
        | StmtKind::ArrayFromArray { from, .. } => smallvec::smallvec![*from],
        StmtKind::TextConcat { left, right, .. } => smallvec::smallvec![*left, *right],
        StmtKind::BufferAppend { to, from }
        | StmtKind::BufferPrepend { to, from }
        | StmtKind::BufferBinary { to, from, .. }
        | StmtKind::ArrayWriteText { to, from }
        | StmtKind::ArrayWriteArray { to, from } => smallvec::smallvec![*to, *from],
        StmtKind::BufferUnary { to, .. } => smallvec::smallvec![*to],
        StmtKind::Call { args, .. } => args.iter().copied().collect(),
        StmtKind::Return { result } => {
            let mut vars: SmallVec<[VarId; 4]> = smallvec::smallvec![*result];
            let m = program.stmt(s).method;
            vars.extend(program.method(m).shadows.iter().flatten().copied());
            vars
        }
        StmtKind::TextInit { .. }
        | StmtKind::BufferCorrupt { .. }
        | StmtKind::ArrayNew { .. }
        | StmtKind::ArrayCorrupt { .. }
        | StmtKind::Entry { .. }
        | StmtKind::Nop => SmallVec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ProgramBuilder, VarKind};

    #[test]
    fn return_keeps_shadows_in_use() {
        let mut b = ProgramBuilder::new();
        let buf = b.buffer_var();
        let f = b.method("f", &[buf]).unwrap();
        let r = b.text_var();
        let ret = b.ret(f, r).unwrap();
        let p = b.build();
        let shadow = p.method(f).shadows[0].unwrap();
        let uses = plain_uses(&p, ret);
        assert!(uses.contains(&r));
        assert!(uses.contains(&shadow));
    }

    #[test]
    fn entry_defines_all_params() {
        let mut b = ProgramBuilder::new();
        let s = b.var(VarKind::Text);
        let a = b.var(VarKind::TextArray);
        let f = b.method("f", &[s, a]).unwrap();
        let p = b.build();
        let defs = plain_defs(&p, p.method(f).entry);
        assert_eq!(defs.as_slice(), &[s, a]);
    }

    #[test]
    fn concat_uses_both_operands() {
        let mut b = ProgramBuilder::new();
        let m = b.method("main", &[]).unwrap();
        let (x, y, z) = (b.text_var(), b.text_var(), b.text_var());
        let c = b.text_concat(m, z, x, y).unwrap();
        let p = b.build();
        assert_eq!(plain_defs(&p, c).as_slice(), &[z]);
        assert_eq!(plain_uses(&p, c).as_slice(), &[x, y]);
    }
}
