//! Stock automata: ready-made languages used by initialization statements,
//! external-call resolution and the primitive-type queries.
//!
//! Each constructor tags its result with an `info` label; the flow-graph
//! simplifier relies on equal labels meaning equal languages.

use crate::automaton::Automaton;

/// The empty language.
pub fn empty() -> Automaton {
    Automaton::new().with_info("<no string>")
}

/// The language containing only the empty string.
pub fn empty_string() -> Automaton {
    let mut a = Automaton::new();
    let s = a.initial();
    a.set_accept(s, true);
    a.with_info("\"\"")
}

/// The language of all strings.
pub fn any_string() -> Automaton {
    let mut a = Automaton::new();
    let s = a.initial();
    a.set_accept(s, true);
    a.add_transition(s, '\u{0}', char::MAX, s);
    a.with_info("<any string>")
}

/// The language of all one-character strings.
pub fn any_char() -> Automaton {
    let mut a = Automaton::new();
    let s0 = a.initial();
    let s1 = a.add_state();
    a.add_transition(s0, '\u{0}', char::MAX, s1);
    a.set_accept(s1, true);
    a.with_info("<char>")
}

/// The language containing exactly `s`.
pub fn constant(s: &str) -> Automaton {
    let mut a = Automaton::new();
    let mut cur = a.initial();
    for c in s.chars() {
        let next = a.add_state();
        a.add_transition(cur, c, c, next);
        cur = next;
    }
    a.set_accept(cur, true);
    a.with_info(escape_string(s))
}

/// The language of one-character strings in `min..=max`.
pub fn char_range(min: char, max: char) -> Automaton {
    let mut a = Automaton::new();
    let s0 = a.initial();
    let s1 = a.add_state();
    a.add_transition(s0, min, max, s1);
    a.set_accept(s1, true);
    a
}

/// The language containing the one-character string `c`.
pub fn single_char(c: char) -> Automaton {
    char_range(c, c)
}

/// String values of booleans.
pub fn boolean_string() -> Automaton {
    constant("true").union(&constant("false")).with_info("\"true\"|\"false\"")
}

/// String values of integral numbers: `0` or an optional minus sign
/// followed by a nonzero leading digit.
pub fn integer_string() -> Automaton {
    let t0 = char_range('1', '9').concat(&char_range('0', '9').star());
    single_char('0')
        .union(&single_char('-').optional().concat(&t0))
        .with_info("<int>")
}

/// String values of floating-point numbers, including the `Infinity` and
/// `NaN` spellings.
pub fn float_string() -> Automaton {
    let t0 = char_range('1', '9').concat(&char_range('0', '9').star());
    let mantissa = t0.concat(&single_char('.')).concat(&t0);
    let exponent = single_char('E').concat(&integer_string()).optional();
    let magnitude = mantissa.concat(&exponent).union(&constant("Infinity"));
    let signed = single_char('-').optional().concat(&magnitude);
    signed.union(&constant("NaN")).with_info("<float>")
}

/// Printable name for an automaton, from its `info` tag.
pub fn name(a: &Automaton) -> String {
    a.info().unwrap_or("<???>").to_string()
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if (' '..='\u{7e}').contains(&c) {
            out.push(c);
        } else {
            out.push_str(&format!("\\u{:04x}", c as u32));
        }
    }
    out.push('"');
    out
}
