//! Static string analysis.
//!
//! Computes, for every marked program point, a finite automaton that
//! over-approximates the set of string values that can occur there at
//! runtime. Programs are described statement by statement through
//! [`ProgramBuilder`]; [`StringAnalysis::run`] then chains liveness,
//! alias and reaching definitions analyses, a definition/use flow
//! graph, a context free grammar, grammar approximation until strongly
//! regular, and automaton extraction from a multi level automaton.
//!
//! ```
//! use stringlang_core::{ProgramBuilder, StringAnalysis};
//! use stringlang_core::automata::stock;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut b = ProgramBuilder::new();
//! let x = b.text_var();
//! let y = b.text_var();
//! let z = b.text_var();
//! let m = b.method("main", &[])?;
//! let t1 = b.text_init(m, x, stock::constant("Hello, "))?;
//! let t2 = b.text_init(m, y, stock::constant("world!"))?;
//! let t3 = b.text_concat(m, z, x, y)?;
//! let entry = b.entry_of(m);
//! b.add_flow(entry, t1)?;
//! b.add_flow(t1, t2)?;
//! b.add_flow(t2, t3)?;
//! b.mark_hotspot(t3)?;
//! let program = b.build();
//!
//! let mut analysis = StringAnalysis::run(&program)?;
//! let values = analysis.automaton_for(t3)?;
//! assert!(values.accepts("Hello, world!"));
//! assert!(!values.accepts("Hello!"));
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod dataflow;
pub mod error;
pub mod flow;
pub mod grammar;
pub mod mlfa;
pub mod program;

pub use stringlang_automata as automata;

pub use analysis::{AnalysisStats, AnalyzerOptions, PrimitiveKind, StringAnalysis};
pub use error::{AnalysisError, BuildError};
pub use program::{Program, ProgramBuilder, Resolver, ResolverAnswer, StmtId, VarId, VarKind};
