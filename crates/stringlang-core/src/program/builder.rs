//! Construction of [`Program`] values.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use stringlang_automata::{stock, Automaton, BinaryOperation, UnaryOperation};

use crate::error::BuildError;
use crate::program::{
    BinaryOpHandle, Method, MethodId, OpId, Program, Statement, StmtId, StmtKind, UnaryOpHandle,
    VarId, VarKind,
};

/// What a [`Resolver`] knows about a call to unanalyzed code.
pub enum ResolverAnswer {
    /// The call returns a text value from this language.
    Language(Automaton),
    /// The call returns exactly the value of this text argument.
    SameAs(VarId),
    /// Nothing is known; the result and all mutable arguments escape.
    Unknown,
}

/// Supplies languages for calls whose targets are outside the program.
///
/// Resolvers are consulted in registration order; the first answer other
/// than [`ResolverAnswer::Unknown`] wins.
pub trait Resolver {
    fn resolve_call(&self, target: &str, args: &[VarId]) -> ResolverAnswer;
}

/// Builds a [`Program`] statement by statement.
///
/// Variables are created first, then methods, then statements inside
/// methods. Control flow edges are added explicitly with
/// [`add_flow`](ProgramBuilder::add_flow); the entry statement of a method
/// has no implicit edge to the rest of the body.
#[derive(Default)]
pub struct ProgramBuilder {
    vars: Vec<VarKind>,
    methods: Vec<Method>,
    statements: Vec<Statement>,
    method_names: IndexMap<String, MethodId>,
    resolvers: Vec<Box<dyn Resolver>>,
    hotspots: IndexSet<StmtId>,
    next_op: usize,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh variable of the given kind.
    pub fn var(&mut self, kind: VarKind) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(kind);
        id
    }

    pub fn text_var(&mut self) -> VarId {
        self.var(VarKind::Text)
    }

    pub fn buffer_var(&mut self) -> VarId {
        self.var(VarKind::Buffer)
    }

    pub fn array_var(&mut self) -> VarId {
        self.var(VarKind::TextArray)
    }

    /// Declares a method and creates its entry statement.
    ///
    /// A shadow variable is allocated for every parameter of mutable kind.
    pub fn method(&mut self, name: &str, params: &[VarId]) -> Result<MethodId, BuildError> {
        if self.method_names.contains_key(name) {
            return Err(BuildError::DuplicateMethod(name.to_string()));
        }
        let id = MethodId(self.methods.len());
        let shadows: SmallVec<[Option<VarId>; 4]> = params
            .iter()
            .map(|&p| {
                let kind = self.vars[p.0];
                kind.is_mutable().then(|| self.var(kind))
            })
            .collect();
        let entry = StmtId(self.statements.len());
        self.statements.push(Statement {
            kind: StmtKind::Entry {
                params: params.iter().copied().collect(),
            },
            method: id,
            succs: SmallVec::new(),
            preds: SmallVec::new(),
        });
        self.methods.push(Method {
            name: name.to_string(),
            params: params.iter().copied().collect(),
            shadows,
            entry,
            statements: vec![entry],
            returns: Vec::new(),
            call_sites: Vec::new(),
        });
        self.method_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Looks up a previously declared method by name.
    pub fn method_named(&self, name: &str) -> Result<MethodId, BuildError> {
        self.method_names
            .get(name)
            .copied()
            .ok_or_else(|| BuildError::UnboundMethod(name.to_string()))
    }

    /// The entry statement of a method.
    pub fn entry_of(&self, m: MethodId) -> StmtId {
        self.methods[m.0].entry
    }

    /// Registers a unary operation, assigning its cycle tiebreak number.
    pub fn register_unary(&mut self, op: impl UnaryOperation + 'static) -> UnaryOpHandle {
        let id = OpId(self.next_op);
        self.next_op += 1;
        UnaryOpHandle::new(id, Rc::new(op))
    }

    /// Registers a binary operation, assigning its cycle tiebreak number.
    pub fn register_binary(&mut self, op: impl BinaryOperation + 'static) -> BinaryOpHandle {
        let id = OpId(self.next_op);
        self.next_op += 1;
        BinaryOpHandle::new(id, Rc::new(op))
    }

    pub fn text_init(
        &mut self,
        m: MethodId,
        to: VarId,
        lang: impl Into<Rc<Automaton>>,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Text)?;
        Ok(self.add_stmt(m, StmtKind::TextInit { to, lang: lang.into() }))
    }

    pub fn text_assign(&mut self, m: MethodId, to: VarId, from: VarId) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Text)?;
        self.expect_kind(from, VarKind::Text)?;
        Ok(self.add_stmt(m, StmtKind::TextAssign { to, from }))
    }

    pub fn text_concat(
        &mut self,
        m: MethodId,
        to: VarId,
        left: VarId,
        right: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Text)?;
        self.expect_kind(left, VarKind::Text)?;
        self.expect_kind(right, VarKind::Text)?;
        Ok(self.add_stmt(m, StmtKind::TextConcat { to, left, right }))
    }

    pub fn text_from_buffer(
        &mut self,
        m: MethodId,
        to: VarId,
        from: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Text)?;
        self.expect_kind(from, VarKind::Buffer)?;
        Ok(self.add_stmt(m, StmtKind::TextFromBuffer { to, from }))
    }

    pub fn text_from_array(
        &mut self,
        m: MethodId,
        to: VarId,
        from: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Text)?;
        self.expect_kind(from, VarKind::TextArray)?;
        Ok(self.add_stmt(m, StmtKind::TextFromArray { to, from }))
    }

    pub fn buffer_init(&mut self, m: MethodId, to: VarId, from: VarId) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Buffer)?;
        self.expect_kind(from, VarKind::Text)?;
        Ok(self.add_stmt(m, StmtKind::BufferInit { to, from }))
    }

    pub fn buffer_assign(
        &mut self,
        m: MethodId,
        to: VarId,
        from: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Buffer)?;
        self.expect_kind(from, VarKind::Buffer)?;
        Ok(self.add_stmt(m, StmtKind::BufferAssign { to, from }))
    }

    pub fn buffer_append(
        &mut self,
        m: MethodId,
        to: VarId,
        from: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Buffer)?;
        self.expect_kind(from, VarKind::Text)?;
        Ok(self.add_stmt(m, StmtKind::BufferAppend { to, from }))
    }

    pub fn buffer_prepend(
        &mut self,
        m: MethodId,
        to: VarId,
        from: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Buffer)?;
        self.expect_kind(from, VarKind::Text)?;
        Ok(self.add_stmt(m, StmtKind::BufferPrepend { to, from }))
    }

    pub fn buffer_unary(
        &mut self,
        m: MethodId,
        to: VarId,
        op: &UnaryOpHandle,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Buffer)?;
        Ok(self.add_stmt(m, StmtKind::BufferUnary { to, op: op.clone() }))
    }

    pub fn buffer_binary(
        &mut self,
        m: MethodId,
        to: VarId,
        op: &BinaryOpHandle,
        from: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Buffer)?;
        self.expect_kind(from, VarKind::Text)?;
        Ok(self.add_stmt(
            m,
            StmtKind::BufferBinary {
                to,
                op: op.clone(),
                from,
            },
        ))
    }

    pub fn buffer_corrupt(&mut self, m: MethodId, to: VarId) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::Buffer)?;
        Ok(self.add_stmt(m, StmtKind::BufferCorrupt { to }))
    }

    pub fn array_new(&mut self, m: MethodId, to: VarId) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::TextArray)?;
        Ok(self.add_stmt(m, StmtKind::ArrayNew { to }))
    }

    pub fn array_assign(&mut self, m: MethodId, to: VarId, from: VarId) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::TextArray)?;
        self.expect_kind(from, VarKind::TextArray)?;
        Ok(self.add_stmt(m, StmtKind::ArrayAssign { to, from }))
    }

    pub fn array_from_array(
        &mut self,
        m: MethodId,
        to: VarId,
        from: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::TextArray)?;
        self.expect_kind(from, VarKind::TextArray)?;
        Ok(self.add_stmt(m, StmtKind::ArrayFromArray { to, from }))
    }

    pub fn array_write_text(
        &mut self,
        m: MethodId,
        to: VarId,
        from: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::TextArray)?;
        self.expect_kind(from, VarKind::Text)?;
        Ok(self.add_stmt(m, StmtKind::ArrayWriteText { to, from }))
    }

    pub fn array_write_array(
        &mut self,
        m: MethodId,
        to: VarId,
        from: VarId,
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::TextArray)?;
        self.expect_kind(from, VarKind::TextArray)?;
        Ok(self.add_stmt(m, StmtKind::ArrayWriteArray { to, from }))
    }

    pub fn array_corrupt(&mut self, m: MethodId, to: VarId) -> Result<StmtId, BuildError> {
        self.expect_kind(to, VarKind::TextArray)?;
        Ok(self.add_stmt(m, StmtKind::ArrayCorrupt { to }))
    }

    /// Adds a call to an analyzed method.
    ///
    /// Argument kinds must match the parameter kinds of the target, and
    /// `result` receives the text value of the target's returns.
    pub fn call(
        &mut self,
        m: MethodId,
        result: VarId,
        target: MethodId,
        args: &[VarId],
    ) -> Result<StmtId, BuildError> {
        self.expect_kind(result, VarKind::Text)?;
        let expected = self.methods[target.0].params.len();
        if args.len() != expected {
            return Err(BuildError::ArityMismatch {
                method: self.methods[target.0].name.clone(),
                expected,
                got: args.len(),
            });
        }
        for (i, &a) in args.iter().enumerate() {
            let want = self.vars[self.methods[target.0].params[i].0];
            self.expect_kind(a, want)?;
        }
        Ok(self.add_stmt(
            m,
            StmtKind::Call {
                result,
                target,
                args: args.iter().copied().collect(),
            },
        ))
    }

    pub fn ret(&mut self, m: MethodId, result: VarId) -> Result<StmtId, BuildError> {
        self.expect_kind(result, VarKind::Text)?;
        Ok(self.add_stmt(m, StmtKind::Return { result }))
    }

    pub fn nop(&mut self, m: MethodId) -> StmtId {
        self.add_stmt(m, StmtKind::Nop)
    }

    /// Adds a control flow edge between two statements of the same method.
    pub fn add_flow(&mut self, from: StmtId, to: StmtId) -> Result<(), BuildError> {
        let mf = self.statements[from.0].method;
        let mt = self.statements[to.0].method;
        if mf != mt {
            return Err(BuildError::ForeignStatement {
                method: self.methods[mf.0].name.clone(),
                in_method: self.methods[mt.0].name.clone(),
            });
        }
        self.statements[from.0].succs.push(to);
        self.statements[to.0].preds.push(from);
        Ok(())
    }

    /// Marks a statement as a hotspot whose possible values should be
    /// reported by the analysis.
    pub fn mark_hotspot(&mut self, s: StmtId) -> Result<(), BuildError> {
        match self.statements[s.0].kind.primary_def() {
            Some(v) if self.vars[v.0] == VarKind::Text => {
                self.hotspots.insert(s);
                Ok(())
            }
            _ => Err(BuildError::NoPrimaryDefinition),
        }
    }

    /// Registers a resolver for calls to unanalyzed code.
    pub fn register_resolver(&mut self, r: impl Resolver + 'static) {
        self.resolvers.push(Box::new(r));
    }

    /// Adds a call to a method outside the program.
    ///
    /// Registered resolvers are asked, in order, what the call returns.
    /// Independently of the answer, every argument of mutable kind is
    /// treated as escaping and is corrupted. Returns the first and last
    /// statement ids of the emitted chain, which are connected internally;
    /// callers wire flow to the first and from the last.
    pub fn external_call(
        &mut self,
        m: MethodId,
        result: VarId,
        name: &str,
        args: &[VarId],
    ) -> Result<(StmtId, StmtId), BuildError> {
        let mut answer = ResolverAnswer::Unknown;
        for r in &self.resolvers {
            match r.resolve_call(name, args) {
                ResolverAnswer::Unknown => continue,
                a => {
                    answer = a;
                    break;
                }
            }
        }
        if let ResolverAnswer::SameAs(v) = answer {
            self.expect_kind(v, VarKind::Text)?;
        }
        let mut chain: Vec<StmtId> = Vec::new();
        for &a in args {
            match self.vars[a.0] {
                VarKind::Buffer => chain.push(self.add_stmt(m, StmtKind::BufferCorrupt { to: a })),
                VarKind::TextArray => {
                    chain.push(self.add_stmt(m, StmtKind::ArrayCorrupt { to: a }))
                }
                VarKind::Text | VarKind::Irrelevant => {}
            }
        }
        let result_stmt = match (self.vars[result.0], answer) {
            (VarKind::Text, ResolverAnswer::Language(lang)) => self.add_stmt(
                m,
                StmtKind::TextInit {
                    to: result,
                    lang: Rc::new(lang),
                },
            ),
            (VarKind::Text, ResolverAnswer::SameAs(v)) => {
                self.add_stmt(m, StmtKind::TextAssign { to: result, from: v })
            }
            (VarKind::Text, ResolverAnswer::Unknown) => self.add_stmt(
                m,
                StmtKind::TextInit {
                    to: result,
                    lang: Rc::new(stock::any_string()),
                },
            ),
            (VarKind::Buffer, _) => self.add_stmt(m, StmtKind::BufferCorrupt { to: result }),
            (VarKind::TextArray, _) => self.add_stmt(m, StmtKind::ArrayCorrupt { to: result }),
            (VarKind::Irrelevant, _) => self.add_stmt(m, StmtKind::Nop),
        };
        chain.push(result_stmt);
        for w in chain.windows(2) {
            self.add_flow(w[0], w[1])?;
        }
        Ok((chain[0], chain[chain.len() - 1]))
    }

    /// Finishes construction.
    pub fn build(self) -> Program {
        Program {
            vars: self.vars,
            methods: self.methods,
            statements: self.statements,
            hotspots: self.hotspots,
        }
    }

    fn expect_kind(&self, v: VarId, expected: VarKind) -> Result<(), BuildError> {
        let got = self.vars[v.0];
        if got == expected {
            Ok(())
        } else {
            Err(BuildError::KindMismatch { expected, got })
        }
    }

    fn add_stmt(&mut self, m: MethodId, kind: StmtKind) -> StmtId {
        let id = StmtId(self.statements.len());
        if let StmtKind::Call { target, .. } = kind {
            self.methods[target.0].call_sites.push(id);
        }
        if let StmtKind::Return { .. } = kind {
            self.methods[m.0].returns.push(id);
        }
        self.statements.push(Statement {
            kind,
            method: m,
            succs: SmallVec::new(),
            preds: SmallVec::new(),
        });
        self.methods[m.0].statements.push(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_checked() {
        let mut b = ProgramBuilder::new();
        let m = b.method("main", &[]).unwrap();
        let s = b.text_var();
        let buf = b.buffer_var();
        assert!(b.text_assign(m, s, buf).is_err());
        assert!(b.buffer_append(m, buf, s).is_ok());
    }

    #[test]
    fn duplicate_methods_are_rejected() {
        let mut b = ProgramBuilder::new();
        b.method("f", &[]).unwrap();
        assert_eq!(
            b.method("f", &[]),
            Err(BuildError::DuplicateMethod("f".to_string()))
        );
    }

    #[test]
    fn call_checks_arity() {
        let mut b = ProgramBuilder::new();
        let p = b.text_var();
        let f = b.method("f", &[p]).unwrap();
        let main = b.method("main", &[]).unwrap();
        let r = b.text_var();
        let err = b.call(main, r, f, &[]).unwrap_err();
        assert!(matches!(err, BuildError::ArityMismatch { expected: 1, got: 0, .. }));
    }

    #[test]
    fn mutable_params_get_shadows() {
        let mut b = ProgramBuilder::new();
        let s = b.text_var();
        let buf = b.buffer_var();
        let f = b.method("f", &[s, buf]).unwrap();
        let p = b.build();
        let shadows = &p.method(f).shadows;
        assert_eq!(shadows[0], None);
        assert!(shadows[1].is_some());
        assert_eq!(p.var_kind(shadows[1].unwrap()), VarKind::Buffer);
    }

    #[test]
    fn hotspot_requires_text_definition() {
        let mut b = ProgramBuilder::new();
        let m = b.method("main", &[]).unwrap();
        let buf = b.buffer_var();
        let corrupt = b.buffer_corrupt(m, buf).unwrap();
        assert_eq!(b.mark_hotspot(corrupt), Err(BuildError::NoPrimaryDefinition));
        let noop = b.nop(m);
        assert_eq!(b.mark_hotspot(noop), Err(BuildError::NoPrimaryDefinition));
    }

    #[test]
    fn flow_stays_inside_a_method() {
        let mut b = ProgramBuilder::new();
        let f = b.method("f", &[]).unwrap();
        let g = b.method("g", &[]).unwrap();
        let a = b.nop(f);
        let c = b.nop(g);
        assert!(b.add_flow(a, c).is_err());
    }

    struct Stub;

    impl Resolver for Stub {
        fn resolve_call(&self, target: &str, _args: &[VarId]) -> ResolverAnswer {
            if target == "known" {
                ResolverAnswer::Language(stock::constant("ok"))
            } else {
                ResolverAnswer::Unknown
            }
        }
    }

    #[test]
    fn external_calls_consult_resolvers() {
        let mut b = ProgramBuilder::new();
        b.register_resolver(Stub);
        let m = b.method("main", &[]).unwrap();
        let r = b.text_var();
        let (first, last) = b.external_call(m, r, "known", &[]).unwrap();
        assert_eq!(first, last);
        let p = b.build();
        match &p.stmt(first).kind {
            StmtKind::TextInit { to, lang } => {
                assert_eq!(*to, r);
                assert!(lang.accepts("ok"));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn unknown_external_calls_corrupt_mutable_args() {
        let mut b = ProgramBuilder::new();
        let m = b.method("main", &[]).unwrap();
        let buf = b.buffer_var();
        let r = b.text_var();
        let (first, last) = b.external_call(m, r, "mystery", &[buf]).unwrap();
        let p = b.build();
        assert!(matches!(p.stmt(first).kind, StmtKind::BufferCorrupt { to } if to == buf));
        match &p.stmt(last).kind {
            StmtKind::TextInit { lang, .. } => assert!(lang.accepts("anything at all")),
            other => panic!("unexpected statement {other:?}"),
        }
        assert_eq!(p.stmt(first).succs.as_slice(), &[last]);
    }
}
