//! Error types for program construction and analysis queries.

use thiserror::Error;

use crate::program::{StmtId, VarKind};

/// Errors raised while building a [`Program`](crate::program::Program).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("method `{0}` is declared twice")]
    DuplicateMethod(String),

    #[error("method `{0}` is not declared")]
    UnboundMethod(String),

    #[error("call passes {got} arguments to `{method}`, which takes {expected}")]
    ArityMismatch {
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("variable has kind {got:?} where {expected:?} is required")]
    KindMismatch { expected: VarKind, got: VarKind },

    #[error("statement does not produce a text value and cannot be marked")]
    NoPrimaryDefinition,

    #[error("statement belongs to method `{in_method}`, not `{method}`")]
    ForeignStatement { method: String, in_method: String },
}

/// Errors raised while running the analysis or querying its results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("statement {0:?} was not marked as a hotspot before analysis")]
    NotAHotspot(StmtId),

    #[error("marked statement {0:?} has no flow graph node")]
    MissingMapping(StmtId),

    #[error("operation cycle approximation did not converge after {0} rounds")]
    ApproximationDiverged(usize),

    #[error("grammar is not strongly regular after approximation")]
    NotStronglyRegular,

    #[error("automaton extraction entered a cyclic state pair dependency")]
    NonRankable,
}
