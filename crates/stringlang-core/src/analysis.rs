//! Whole program analysis driver.
//!
//! Chains the phases end to end: dataflow analyses over the statement
//! graph, flow graph construction and simplification, lowering to a
//! context free grammar, approximation until strongly regular, MLFA
//! construction, and finally per hotspot automaton extraction. The
//! result object answers queries for any statement that was marked
//! before building the program.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use stringlang_automata::{stock, Automaton};
use tracing::debug;

use crate::dataflow::{AliasAnalysis, Liveness, ReachingDefinitions};
use crate::error::AnalysisError;
use crate::flow::{build_flow_graph, simplify, FlowGraph};
use crate::grammar::{approximate_non_regular, approximate_operation_cycles, Grammar, NtId};
use crate::mlfa::{build_mlfa, Extractor, Mlfa, MlfaStatePair};
use crate::program::{Program, StmtId};

/// Default bound on operation cycle approximation rounds.
pub const DEFAULT_MAX_CYCLE_ROUNDS: usize = 10_000;

/// Tunables for [`StringAnalysis::run_with_options`].
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Bound on operation cycle approximation rounds; exceeding it
    /// reports [`AnalysisError::ApproximationDiverged`].
    pub max_cycle_rounds: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            max_cycle_rounds: DEFAULT_MAX_CYCLE_ROUNDS,
        }
    }
}

/// Counters describing what the pipeline did to one program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    pub nodes_before_simplify: usize,
    pub edges_before_simplify: usize,
    pub nodes_after_simplify: usize,
    pub edges_after_simplify: usize,
    pub operation_cycles_cut: usize,
    pub components_rewritten: usize,
}

/// Builtin value kinds whose runtime string forms are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Char,
    Integer,
    Float,
    Null,
}

impl PrimitiveKind {
    /// The language of strings a value of this kind can print as.
    pub fn automaton(self) -> Automaton {
        match self {
            PrimitiveKind::Boolean => stock::boolean_string(),
            PrimitiveKind::Char => stock::any_char(),
            PrimitiveKind::Integer => stock::integer_string(),
            PrimitiveKind::Float => stock::float_string(),
            PrimitiveKind::Null => stock::constant("null"),
        }
    }
}

/// A completed analysis of one program.
///
/// Holds the simplified flow graph, the approximated grammar, and the
/// MLFA; hotspot queries extract their automaton on first use and are
/// memoized after that.
pub struct StringAnalysis {
    graph: FlowGraph,
    grammar: Grammar,
    hotspot_pairs: IndexMap<StmtId, MlfaStatePair>,
    extractor: Extractor,
    stats: AnalysisStats,
}

impl StringAnalysis {
    /// Runs the full pipeline with default options.
    pub fn run(program: &Program) -> Result<Self, AnalysisError> {
        Self::run_with_options(program, AnalyzerOptions::default())
    }

    pub fn run_with_options(
        program: &Program,
        options: AnalyzerOptions,
    ) -> Result<Self, AnalysisError> {
        debug!("computing liveness");
        let liveness = Liveness::compute(program);
        debug!("computing aliases");
        let alias = AliasAnalysis::compute(program, &liveness);
        debug!("computing reaching definitions");
        let reaching = ReachingDefinitions::compute(program, &liveness, &alias);

        let (mut graph, stmt_nodes) = build_flow_graph(program, &alias, &reaching);
        let mut stats = AnalysisStats {
            nodes_before_simplify: graph.node_count(),
            edges_before_simplify: graph.edge_count(),
            ..AnalysisStats::default()
        };
        debug!(
            nodes = stats.nodes_before_simplify,
            edges = stats.edges_before_simplify,
            "flow graph built"
        );

        let node_map = simplify(&mut graph);
        stats.nodes_after_simplify = graph.node_count();
        stats.edges_after_simplify = graph.edge_count();
        debug!(
            nodes = stats.nodes_after_simplify,
            edges = stats.edges_after_simplify,
            "flow graph simplified"
        );

        let (mut grammar, nts) = Grammar::from_flow_graph(&graph);
        stats.operation_cycles_cut =
            approximate_operation_cycles(&mut grammar, options.max_cycle_rounds)?;
        debug!(
            cut = stats.operation_cycles_cut,
            "operation cycles approximated"
        );

        let mut hotspot_nts: IndexMap<StmtId, NtId> = IndexMap::new();
        for s in program.hotspots() {
            let nt = stmt_nodes
                .get(&s)
                .and_then(|n| node_map.get(n))
                .and_then(|n| nts.get(n))
                .copied()
                .ok_or(AnalysisError::MissingMapping(s))?;
            hotspot_nts.insert(s, nt);
        }

        let keep: IndexSet<NtId> = hotspot_nts.values().copied().collect();
        let (comps, rewritten) = approximate_non_regular(&mut grammar, &keep);
        stats.components_rewritten = rewritten;
        debug!(rewritten, "recursion linearized");

        let queries: Vec<NtId> = hotspot_nts.values().copied().collect();
        let (mlfa, pairs) = build_mlfa(&grammar, &comps, &queries)?;
        debug!(states = mlfa.state_count(), "mlfa built");

        let hotspot_pairs = hotspot_nts.keys().copied().zip(pairs).collect();
        Ok(StringAnalysis {
            graph,
            grammar,
            hotspot_pairs,
            extractor: Extractor::new(mlfa),
            stats,
        })
    }

    /// The language of possible runtime values at a marked statement.
    ///
    /// The automaton is shared with the internal memo table and must
    /// not be mutated. Asking about a statement that was never marked
    /// with [`ProgramBuilder::mark_hotspot`](crate::program::ProgramBuilder::mark_hotspot)
    /// is an error.
    pub fn automaton_for(&mut self, s: StmtId) -> Result<Rc<Automaton>, AnalysisError> {
        let pair = self
            .hotspot_pairs
            .get(&s)
            .copied()
            .ok_or(AnalysisError::NotAHotspot(s))?;
        self.extractor.extract(pair)
    }

    pub fn stats(&self) -> AnalysisStats {
        self.stats
    }

    /// The simplified flow graph, e.g. for [`FlowGraph::to_dot`].
    pub fn flow_graph(&self) -> &FlowGraph {
        &self.graph
    }

    /// The grammar after both approximation phases.
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn mlfa(&self) -> &Mlfa {
        self.extractor.mlfa()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramBuilder;

    fn marked_concat() -> (Program, StmtId) {
        let mut b = ProgramBuilder::new();
        let x = b.text_var();
        let y = b.text_var();
        let z = b.text_var();
        let m = b.method("main", &[]).unwrap();
        let t1 = b.text_init(m, x, stock::constant("a")).unwrap();
        let t2 = b.text_init(m, y, stock::constant("b")).unwrap();
        let t3 = b.text_concat(m, z, x, y).unwrap();
        let entry = b.entry_of(m);
        b.add_flow(entry, t1).unwrap();
        b.add_flow(t1, t2).unwrap();
        b.add_flow(t2, t3).unwrap();
        b.mark_hotspot(t3).unwrap();
        (b.build(), t3)
    }

    #[test]
    fn concatenation_of_constants_is_exact() {
        let (p, spot) = marked_concat();
        let mut analysis = StringAnalysis::run(&p).unwrap();
        let a = analysis.automaton_for(spot).unwrap();
        assert!(a.accepts("ab"));
        assert!(!a.accepts("a"));
        assert!(!a.accepts("ba"));
        assert!(!a.accepts(""));
    }

    #[test]
    fn querying_an_unmarked_statement_is_rejected() {
        let (p, spot) = marked_concat();
        let mut analysis = StringAnalysis::run(&p).unwrap();
        let unmarked = StmtId(spot.0 - 1);
        assert!(matches!(
            analysis.automaton_for(unmarked),
            Err(AnalysisError::NotAHotspot(_))
        ));
    }

    #[test]
    fn repeated_queries_share_the_result() {
        let (p, spot) = marked_concat();
        let mut analysis = StringAnalysis::run(&p).unwrap();
        let first = analysis.automaton_for(spot).unwrap();
        let second = analysis.automaton_for(spot).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn stats_reflect_simplification() {
        let mut b = ProgramBuilder::new();
        let x = b.text_var();
        let y = b.text_var();
        let z = b.text_var();
        let m = b.method("main", &[]).unwrap();
        let t1 = b.text_init(m, x, stock::constant("k")).unwrap();
        let t2 = b.text_init(m, y, stock::constant("k")).unwrap();
        let t3 = b.text_concat(m, z, x, y).unwrap();
        let entry = b.entry_of(m);
        b.add_flow(entry, t1).unwrap();
        b.add_flow(t1, t2).unwrap();
        b.add_flow(t2, t3).unwrap();
        b.mark_hotspot(t3).unwrap();
        let p = b.build();

        let mut analysis = StringAnalysis::run(&p).unwrap();
        let stats = analysis.stats();
        assert!(stats.nodes_after_simplify < stats.nodes_before_simplify);
        assert_eq!(stats.operation_cycles_cut, 0);
        assert_eq!(stats.components_rewritten, 0);
        let a = analysis.automaton_for(t3).unwrap();
        assert!(a.accepts("kk"));
        assert!(!a.accepts("k"));
    }

    #[test]
    fn primitive_kinds_have_their_stock_languages() {
        assert!(PrimitiveKind::Boolean.automaton().accepts("true"));
        assert!(PrimitiveKind::Boolean.automaton().accepts("false"));
        assert!(!PrimitiveKind::Boolean.automaton().accepts("maybe"));
        assert!(PrimitiveKind::Integer.automaton().accepts("-42"));
        assert!(PrimitiveKind::Float.automaton().accepts("3.14"));
        assert!(PrimitiveKind::Char.automaton().accepts("x"));
        assert!(!PrimitiveKind::Char.automaton().accepts("xy"));
        assert!(PrimitiveKind::Null.automaton().accepts("null"));
    }
}
