//! Intermediate representation of the analyzed program.
//!
//! A [`Program`] is a set of methods, each holding a list of statements
//! connected by intra-method control flow edges. Statements operate on
//! variables of three relevant kinds: immutable text values, mutable text
//! buffers, and flattened text arrays. Everything else is `Irrelevant`.
//!
//! Programs are built through [`ProgramBuilder`] and are immutable once
//! built; the analysis phases only ever read them.

mod builder;
mod defs_uses;

pub use builder::{ProgramBuilder, Resolver, ResolverAnswer};
pub(crate) use defs_uses::{plain_defs, plain_uses};

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;
use stringlang_automata::{stock, Automaton, BinaryOperation, UnaryOperation};

/// Index of a variable in its [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Index of a statement in its [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub usize);

/// Index of a method in its [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub usize);

/// The kind of value a variable holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// An immutable text value.
    Text,
    /// A mutable text buffer.
    Buffer,
    /// An array of text values, flattened to one cell.
    TextArray,
    /// Anything the analysis does not track.
    Irrelevant,
}

impl VarKind {
    /// Whether values of this kind can be mutated through aliases.
    pub fn is_mutable(self) -> bool {
        matches!(self, VarKind::Buffer | VarKind::TextArray)
    }
}

/// Registration number of a string operation within a program.
///
/// Each registration of an operation through the builder gets a fresh id,
/// in construction order. Ids order the tiebreak when several operation
/// cycles share the worst priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub usize);

/// A registered unary string operation.
///
/// Handles compare and hash by registration id, so the same registration
/// used on two statements is recognized as the same operation while two
/// registrations of equal operations stay distinct.
#[derive(Debug, Clone)]
pub struct UnaryOpHandle {
    id: OpId,
    op: Rc<dyn UnaryOperation>,
}

impl UnaryOpHandle {
    pub(crate) fn new(id: OpId, op: Rc<dyn UnaryOperation>) -> Self {
        UnaryOpHandle { id, op }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn op(&self) -> &dyn UnaryOperation {
        &*self.op
    }
}

impl PartialEq for UnaryOpHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for UnaryOpHandle {}

impl std::hash::Hash for UnaryOpHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for UnaryOpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.op, f)
    }
}

/// A registered binary string operation; see [`UnaryOpHandle`].
#[derive(Debug, Clone)]
pub struct BinaryOpHandle {
    id: OpId,
    op: Rc<dyn BinaryOperation>,
}

impl BinaryOpHandle {
    pub(crate) fn new(id: OpId, op: Rc<dyn BinaryOperation>) -> Self {
        BinaryOpHandle { id, op }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn op(&self) -> &dyn BinaryOperation {
        &*self.op
    }
}

impl PartialEq for BinaryOpHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BinaryOpHandle {}

impl std::hash::Hash for BinaryOpHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for BinaryOpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.op, f)
    }
}

/// The operation a statement performs.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `to = <language>`: text constant or known language.
    TextInit { to: VarId, lang: Rc<Automaton> },
    /// `to = from` between text variables.
    TextAssign { to: VarId, from: VarId },
    /// `to = left . right` text concatenation.
    TextConcat { to: VarId, left: VarId, right: VarId },
    /// `to = contents of buffer from`.
    TextFromBuffer { to: VarId, from: VarId },
    /// `to = element read out of array from`.
    TextFromArray { to: VarId, from: VarId },
    /// `to = fresh buffer holding text from`.
    BufferInit { to: VarId, from: VarId },
    /// `to = from` between buffer variables.
    BufferAssign { to: VarId, from: VarId },
    /// Append text `from` to buffer `to`.
    BufferAppend { to: VarId, from: VarId },
    /// Prepend text `from` to buffer `to`.
    BufferPrepend { to: VarId, from: VarId },
    /// Apply a unary operation to buffer `to` in place.
    BufferUnary { to: VarId, op: UnaryOpHandle },
    /// Apply a binary operation to buffer `to` and text `from` in place.
    BufferBinary {
        to: VarId,
        op: BinaryOpHandle,
        from: VarId,
    },
    /// Buffer `to` escapes to unanalyzed code.
    BufferCorrupt { to: VarId },
    /// `to = fresh empty array`.
    ArrayNew { to: VarId },
    /// `to = from` between array variables.
    ArrayAssign { to: VarId, from: VarId },
    /// `to = element array read out of array from`.
    ArrayFromArray { to: VarId, from: VarId },
    /// Write text `from` into some cell of array `to`.
    ArrayWriteText { to: VarId, from: VarId },
    /// Write array `from` into some cell of array `to`.
    ArrayWriteArray { to: VarId, from: VarId },
    /// Array `to` escapes to unanalyzed code.
    ArrayCorrupt { to: VarId },
    /// Call an analyzed method, binding its returned text to `result`.
    Call {
        result: VarId,
        target: MethodId,
        args: SmallVec<[VarId; 4]>,
    },
    /// Method entry point; defines the parameters.
    Entry { params: SmallVec<[VarId; 4]> },
    /// Return the text value of `result` to all call sites.
    Return { result: VarId },
    /// No effect; a join point for control flow.
    Nop,
}

impl StmtKind {
    /// The variable this statement primarily defines, if any.
    pub fn primary_def(&self) -> Option<VarId> {
        match *self {
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
            | StmtKind::ArrayCorrupt { to } => Some(to),
            StmtKind::Call { result, .. } => Some(result),
            StmtKind::Entry { .. } | StmtKind::Return { .. } | StmtKind::Nop => None,
        }
    }
}

/// A statement in a method body, with its control flow edges.
#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StmtKind,
    pub method: MethodId,
    pub succs: SmallVec<[StmtId; 2]>,
    pub preds: SmallVec<[StmtId; 2]>,
}

/// A method: an entry statement, a body, and its call sites.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub params: SmallVec<[VarId; 4]>,
    /// Shadow variable per parameter, present for mutable parameter kinds.
    ///
    /// A shadow stands for the values the caller's argument may hold after
    /// the call, accounting for mutations done inside the method.
    pub shadows: SmallVec<[Option<VarId>; 4]>,
    pub entry: StmtId,
    pub statements: Vec<StmtId>,
    pub returns: Vec<StmtId>,
    pub call_sites: Vec<StmtId>,
}

/// An immutable program ready for analysis.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) vars: Vec<VarKind>,
    pub(crate) methods: Vec<Method>,
    pub(crate) statements: Vec<Statement>,
    pub(crate) hotspots: IndexSet<StmtId>,
}

impl Program {
    pub fn var_kind(&self, v: VarId) -> VarKind {
        self.vars[v.0]
    }

    /// Statements marked for value reporting, in marking order.
    pub fn hotspots(&self) -> impl Iterator<Item = StmtId> + '_ {
        self.hotspots.iter().copied()
    }

    pub fn is_hotspot(&self, s: StmtId) -> bool {
        self.hotspots.contains(&s)
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn method(&self, m: MethodId) -> &Method {
        &self.methods[m.0]
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn stmt(&self, s: StmtId) -> &Statement {
        &self.statements[s.0]
    }

    pub fn stmt_count(&self) -> usize {
        self.statements.len()
    }

    pub fn stmt_ids(&self) -> impl Iterator<Item = StmtId> {
        (0..self.statements.len()).map(StmtId)
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len()).map(MethodId)
    }

    /// A short printable name for a variable, prefixed by its kind.
    pub fn var_name(&self, v: VarId) -> String {
        let prefix = match self.var_kind(v) {
            VarKind::Text => "s",
            VarKind::Buffer => "b",
            VarKind::TextArray => "a",
            VarKind::Irrelevant => "n",
        };
        format!("{}{}", prefix, v.0)
    }

    /// Renders a statement for diagnostics and DOT output.
    pub fn stmt_to_string(&self, s: StmtId) -> String {
        let n = |v: VarId| self.var_name(v);
        match &self.stmt(s).kind {
            StmtKind::TextInit { to, lang } => format!("{} = {}", n(*to), stock::name(lang)),
            StmtKind::TextAssign { to, from } => format!("{} = {}", n(*to), n(*from)),
            StmtKind::TextConcat { to, left, right } => {
                format!("{} = {} + {}", n(*to), n(*left), n(*right))
            }
            StmtKind::TextFromBuffer { to, from } => format!("{} = {}.text", n(*to), n(*from)),
            StmtKind::TextFromArray { to, from } => format!("{} = {}[]", n(*to), n(*from)),
            StmtKind::BufferInit { to, from } => format!("{} = buffer {}", n(*to), n(*from)),
            StmtKind::BufferAssign { to, from } => format!("{} = {}", n(*to), n(*from)),
            StmtKind::BufferAppend { to, from } => format!("{}.append({})", n(*to), n(*from)),
            StmtKind::BufferPrepend { to, from } => format!("{}.prepend({})", n(*to), n(*from)),
            StmtKind::BufferUnary { to, op } => format!("{}.{}()", n(*to), op),
            StmtKind::BufferBinary { to, op, from } => {
                format!("{}.{}({})", n(*to), op, n(*from))
            }
            StmtKind::BufferCorrupt { to } => format!("corrupt {}", n(*to)),
            StmtKind::ArrayNew { to } => format!("{} = []", n(*to)),
            StmtKind::ArrayAssign { to, from } => format!("{} = {}", n(*to), n(*from)),
            StmtKind::ArrayFromArray { to, from } => format!("{} = {}[]", n(*to), n(*from)),
            StmtKind::ArrayWriteText { to, from } => format!("{}[] = {}", n(*to), n(*from)),
            StmtKind::ArrayWriteArray { to, from } => format!("{}[] = {}", n(*to), n(*from)),
            StmtKind::ArrayCorrupt { to } => format!("corrupt {}", n(*to)),
            StmtKind::Call {
                result,
                target,
                args,
            } => {
                let args = args.iter().map(|&a| n(a)).collect::<Vec<_>>().join(", ");
                format!("{} = {}({})", n(*result), self.method(*target).name, args)
            }
            StmtKind::Entry { params } => {
                let m = &self.methods[self.stmt(s).method.0];
                let params = params.iter().map(|&p| n(p)).collect::<Vec<_>>().join(", ");
                format!("enter {}({})", m.name, params)
            }
            StmtKind::Return { result } => format!("return {}", n(*result)),
            StmtKind::Nop => "nop".to_string(),
        }
    }
}
