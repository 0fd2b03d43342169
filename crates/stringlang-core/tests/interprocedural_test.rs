//! Value flow across method boundaries and into unanalyzed code.

use stringlang_automata::stock;
use stringlang_core::{ProgramBuilder, Resolver, ResolverAnswer, StringAnalysis, VarId};

#[test]
fn call_result_collects_every_return() {
    let mut b = ProgramBuilder::new();
    let ra = b.text_var();
    let rb = b.text_var();
    let ov = b.text_var();
    let f = b.method("f", &[]).unwrap();
    let ta = b.text_init(f, ra, stock::constant("a")).unwrap();
    let r1 = b.ret(f, ra).unwrap();
    let tb = b.text_init(f, rb, stock::constant("b")).unwrap();
    let r2 = b.ret(f, rb).unwrap();
    let fe = b.entry_of(f);
    b.add_flow(fe, ta).unwrap();
    b.add_flow(ta, r1).unwrap();
    b.add_flow(fe, tb).unwrap();
    b.add_flow(tb, r2).unwrap();

    let m = b.method("main", &[]).unwrap();
    let co = b.call(m, ov, f, &[]).unwrap();
    let me = b.entry_of(m);
    b.add_flow(me, co).unwrap();
    b.mark_hotspot(co).unwrap();
    let p = b.build();

    let mut analysis = StringAnalysis::run(&p).unwrap();
    let a = analysis.automaton_for(co).unwrap();
    assert!(a.accepts("a"));
    assert!(a.accepts("b"));
    assert!(!a.accepts(""));
    assert!(!a.accepts("ab"));
}

#[test]
fn buffer_argument_mutated_by_the_callee_flows_back() {
    let mut b = ProgramBuilder::new();
    let x = b.text_var();
    let z = b.text_var();
    let rr = b.text_var();
    let rv = b.text_var();
    let o = b.text_var();
    let b1 = b.buffer_var();
    let pp = b.buffer_var();

    let f = b.method("append_z", &[pp]).unwrap();
    let tz = b.text_init(f, z, stock::constant("z")).unwrap();
    let tap = b.buffer_append(f, pp, z).unwrap();
    let trr = b.text_init(f, rr, stock::empty_string()).unwrap();
    let r = b.ret(f, rr).unwrap();
    let fe = b.entry_of(f);
    b.add_flow(fe, tz).unwrap();
    b.add_flow(tz, tap).unwrap();
    b.add_flow(tap, trr).unwrap();
    b.add_flow(trr, r).unwrap();

    let m = b.method("main", &[]).unwrap();
    let tx = b.text_init(m, x, stock::constant("x")).unwrap();
    let tb = b.buffer_init(m, b1, x).unwrap();
    let co = b.call(m, rv, f, &[b1]).unwrap();
    let tout = b.text_from_buffer(m, o, b1).unwrap();
    let me = b.entry_of(m);
    b.add_flow(me, tx).unwrap();
    b.add_flow(tx, tb).unwrap();
    b.add_flow(tb, co).unwrap();
    b.add_flow(co, tout).unwrap();
    b.mark_hotspot(tout).unwrap();
    b.mark_hotspot(co).unwrap();
    let p = b.build();

    let mut analysis = StringAnalysis::run(&p).unwrap();

    let buffer_after = analysis.automaton_for(tout).unwrap();
    assert!(buffer_after.accepts("xz"), "the callee appended to it");
    assert!(!buffer_after.accepts("x"), "the append always runs");
    assert!(!buffer_after.accepts("z"));

    let returned = analysis.automaton_for(co).unwrap();
    assert!(returned.accepts(""));
    assert!(!returned.accepts("xz"));
}

struct Greeter;

impl Resolver for Greeter {
    fn resolve_call(&self, target: &str, _args: &[VarId]) -> ResolverAnswer {
        match target {
            "greet" => ResolverAnswer::Language(stock::constant("hello")),
            _ => ResolverAnswer::Unknown,
        }
    }
}

struct Fallback;

impl Resolver for Fallback {
    fn resolve_call(&self, target: &str, args: &[VarId]) -> ResolverAnswer {
        match target {
            "greet" => ResolverAnswer::Language(stock::constant("goodbye")),
            "identity" => ResolverAnswer::SameAs(args[0]),
            _ => ResolverAnswer::Unknown,
        }
    }
}

#[test]
fn first_resolver_with_an_answer_wins() {
    let mut b = ProgramBuilder::new();
    b.register_resolver(Greeter);
    b.register_resolver(Fallback);
    let r = b.text_var();
    let m = b.method("main", &[]).unwrap();
    let (first, last) = b.external_call(m, r, "greet", &[]).unwrap();
    let entry = b.entry_of(m);
    b.add_flow(entry, first).unwrap();
    b.mark_hotspot(last).unwrap();
    let p = b.build();

    let mut analysis = StringAnalysis::run(&p).unwrap();
    let a = analysis.automaton_for(last).unwrap();
    assert!(a.accepts("hello"));
    assert!(!a.accepts("goodbye"), "later resolvers are not consulted");
    assert!(!a.accepts(""));
}

#[test]
fn same_as_answer_pipes_the_argument_through() {
    let mut b = ProgramBuilder::new();
    b.register_resolver(Fallback);
    let s = b.text_var();
    let r = b.text_var();
    let m = b.method("main", &[]).unwrap();
    let ts = b.text_init(m, s, stock::constant("secret")).unwrap();
    let (first, last) = b.external_call(m, r, "identity", &[s]).unwrap();
    let entry = b.entry_of(m);
    b.add_flow(entry, ts).unwrap();
    b.add_flow(ts, first).unwrap();
    b.mark_hotspot(last).unwrap();
    let p = b.build();

    let mut analysis = StringAnalysis::run(&p).unwrap();
    let a = analysis.automaton_for(last).unwrap();
    assert!(a.accepts("secret"));
    assert!(!a.accepts(""));
    assert!(!a.accepts("hello"));
}

#[test]
fn unresolved_external_call_returns_any_string() {
    let mut b = ProgramBuilder::new();
    b.register_resolver(Greeter);
    let r = b.text_var();
    let m = b.method("main", &[]).unwrap();
    let (first, last) = b.external_call(m, r, "mystery", &[]).unwrap();
    let entry = b.entry_of(m);
    b.add_flow(entry, first).unwrap();
    b.mark_hotspot(last).unwrap();
    let p = b.build();

    let mut analysis = StringAnalysis::run(&p).unwrap();
    let a = analysis.automaton_for(last).unwrap();
    assert!(a.accepts(""));
    assert!(a.accepts("anything at all"));
}

#[test]
fn external_call_corrupts_mutable_arguments() {
    let mut b = ProgramBuilder::new();
    let x = b.text_var();
    let r = b.text_var();
    let o = b.text_var();
    let buf = b.buffer_var();
    let m = b.method("main", &[]).unwrap();
    let tx = b.text_init(m, x, stock::constant("x")).unwrap();
    let tb = b.buffer_init(m, buf, x).unwrap();
    let (first, last) = b.external_call(m, r, "mystery", &[buf]).unwrap();
    let tout = b.text_from_buffer(m, o, buf).unwrap();
    let entry = b.entry_of(m);
    b.add_flow(entry, tx).unwrap();
    b.add_flow(tx, tb).unwrap();
    b.add_flow(tb, first).unwrap();
    b.add_flow(last, tout).unwrap();
    b.mark_hotspot(tout).unwrap();
    let p = b.build();

    let mut analysis = StringAnalysis::run(&p).unwrap();
    let a = analysis.automaton_for(tout).unwrap();
    assert!(a.accepts("x"), "the unmutated value stays possible");
    assert!(a.accepts("overwritten by the callee"));
    assert!(a.accepts(""));
}
