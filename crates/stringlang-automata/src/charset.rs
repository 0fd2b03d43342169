//! Interval-based character sets.
//!
//! Used by the grammar layer to approximate the set of characters that can
//! occur in the language of a nonterminal, and by operations to describe how
//! they map characters.

use crate::automaton::Automaton;
use crate::char_succ;
use smallvec::SmallVec;
use std::fmt;

/// An inclusive character interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub min: char,
    pub max: char,
}

impl Interval {
    pub fn new(min: char, max: char) -> Self {
        if max < min {
            Interval { min: max, max: min }
        } else {
            Interval { min, max }
        }
    }

    pub fn single(c: char) -> Self {
        Interval { min: c, max: c }
    }

    pub fn contains(&self, c: char) -> bool {
        self.min <= c && c <= self.max
    }
}

/// A set of characters, kept as sorted, disjoint, non-adjacent intervals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharSet {
    intervals: SmallVec<[Interval; 4]>,
}

impl CharSet {
    /// The empty character set.
    pub fn new() -> Self {
        CharSet::default()
    }

    /// The set of all characters.
    pub fn any() -> Self {
        let mut cs = CharSet::new();
        cs.intervals.push(Interval::new('\u{0}', char::MAX));
        cs
    }

    /// The characters occurring in strings of the given language.
    ///
    /// Only transitions that lie on some accepting path contribute.
    pub fn of_automaton(a: &Automaton) -> Self {
        let mut cs = CharSet::new();
        for iv in a.live_transition_intervals() {
            cs.intervals.push(Interval::new(iv.0, iv.1));
        }
        cs.normalize();
        cs
    }

    pub fn from_intervals<I: IntoIterator<Item = (char, char)>>(intervals: I) -> Self {
        let mut cs = CharSet::new();
        for (min, max) in intervals {
            cs.intervals.push(Interval::new(min, max));
        }
        cs.normalize();
        cs
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_total(&self) -> bool {
        self.intervals.len() == 1
            && self.intervals[0].min == '\u{0}'
            && self.intervals[0].max == char::MAX
    }

    pub fn contains(&self, c: char) -> bool {
        self.intervals.iter().any(|iv| iv.contains(c))
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// This set plus the single character `c`.
    pub fn add(&self, c: char) -> CharSet {
        let mut b = self.clone();
        b.intervals.push(Interval::single(c));
        b.normalize();
        b
    }

    /// This set minus the single character `c`.
    pub fn remove(&self, c: char) -> CharSet {
        let mut b = CharSet::new();
        for iv in &self.intervals {
            if iv.contains(c) {
                if iv.min < c {
                    if let Some(p) = crate::char_pred(c) {
                        b.intervals.push(Interval::new(iv.min, p));
                    }
                }
                if c < iv.max {
                    if let Some(s) = char_succ(c) {
                        b.intervals.push(Interval::new(s, iv.max));
                    }
                }
            } else {
                b.intervals.push(*iv);
            }
        }
        b.normalize();
        b
    }

    /// Union of this set and another.
    pub fn union(&self, other: &CharSet) -> CharSet {
        let mut b = self.clone();
        b.intervals.extend_from_slice(&other.intervals);
        b.normalize();
        b
    }

    /// Union of many sets.
    pub fn union_all<'a, I: IntoIterator<Item = &'a CharSet>>(sets: I) -> CharSet {
        let mut b = CharSet::new();
        for s in sets {
            b.intervals.extend_from_slice(&s.intervals);
        }
        b.normalize();
        b
    }

    /// Lowercase image of this set. Total sets map to themselves.
    pub fn to_lower_case(&self) -> CharSet {
        self.map_chars(|c, out| {
            for l in c.to_lowercase() {
                out.push(Interval::single(l));
            }
        })
    }

    /// Uppercase image of this set. Total sets map to themselves.
    pub fn to_upper_case(&self) -> CharSet {
        self.map_chars(|c, out| {
            for u in c.to_uppercase() {
                out.push(Interval::single(u));
            }
        })
    }

    fn map_chars(&self, f: impl Fn(char, &mut SmallVec<[Interval; 4]>)) -> CharSet {
        if self.is_total() {
            return self.clone();
        }
        let mut b = CharSet::new();
        for iv in &self.intervals {
            for c in iv.min..=iv.max {
                f(c, &mut b.intervals);
            }
        }
        b.normalize();
        b
    }

    /// Automaton accepting zero or more characters from this set.
    pub fn to_automaton(&self) -> Automaton {
        let mut a = Automaton::new();
        let s = a.initial();
        a.set_accept(s, true);
        for iv in &self.intervals {
            a.add_transition(s, iv.min, iv.max, s);
        }
        a
    }

    /// Sorts intervals and merges overlapping or adjacent ones.
    fn normalize(&mut self) {
        if self.intervals.is_empty() {
            return;
        }
        self.intervals.sort();
        let mut merged: SmallVec<[Interval; 4]> = SmallVec::new();
        let mut cur = self.intervals[0];
        for iv in self.intervals.iter().skip(1) {
            let adjacent = char_succ(cur.max).map_or(false, |s| s >= iv.min);
            if iv.min <= cur.max || adjacent {
                if iv.max > cur.max {
                    cur.max = iv.max;
                }
            } else {
                merged.push(cur);
                cur = *iv;
            }
        }
        merged.push(cur);
        self.intervals = merged;
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, iv) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if iv.min == iv.max {
                write_char(f, iv.min)?;
            } else {
                write_char(f, iv.min)?;
                write!(f, "-")?;
                write_char(f, iv.max)?;
            }
        }
        Ok(())
    }
}

fn write_char(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    if ('\u{21}'..='\u{7e}').contains(&c) && c != '-' {
        write!(f, "'{c}'")
    } else {
        write!(f, "'\\u{{{:x}}}'", c as u32)
    }
}
