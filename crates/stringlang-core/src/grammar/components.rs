//! Strongly connected components of the nonterminal graph.

use super::{Grammar, NtId, Production};

/// Iterative Tarjan over an adjacency list.
///
/// Returns the components, each a list of vertex indices, ordered so
/// that every edge leaving a component points into an earlier one, plus
/// the component index of every vertex.
pub(crate) fn strongly_connected(succs: &[Vec<usize>]) -> (Vec<Vec<usize>>, Vec<usize>) {
    let n = succs.len();
    let mut index = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut comps: Vec<Vec<usize>> = Vec::new();
    let mut comp_of = vec![0usize; n];

    for root in 0..n {
        if index[root] != usize::MAX {
            continue;
        }
        index[root] = next_index;
        low[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(top) = frames.len().checked_sub(1) {
            let (v, i) = frames[top];
            if i < succs[v].len() {
                frames[top].1 += 1;
                let w = succs[v][i];
                if index[w] == usize::MAX {
                    index[w] = next_index;
                    low[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] && index[w] < low[v] {
                    low[v] = index[w];
                }
            } else {
                frames.pop();
                if let Some(&(p, _)) = frames.last() {
                    if low[v] < low[p] {
                        low[p] = low[v];
                    }
                }
                if low[v] == index[v] {
                    let c = comps.len();
                    let mut members = Vec::new();
                    loop {
                        let w = match stack.pop() {
                            Some(w) => w,
                            None => break,
                        };
                        on_stack[w] = false;
                        comp_of[w] = c;
                        members.push(w);
                        if w == v {
                            break;
                        }
                    }
                    comps.push(members);
                }
            }
        }
    }
    (comps, comp_of)
}

/// Index of a component in its [`Components`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompId(pub usize);

/// Sides on which a component's pair productions recurse into the
/// component itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recursion {
    #[default]
    None,
    Right,
    Left,
    Both,
}

impl Recursion {
    pub fn with_left(self) -> Recursion {
        match self {
            Recursion::None | Recursion::Left => Recursion::Left,
            Recursion::Right | Recursion::Both => Recursion::Both,
        }
    }

    pub fn with_right(self) -> Recursion {
        match self {
            Recursion::None | Recursion::Right => Recursion::Right,
            Recursion::Left | Recursion::Both => Recursion::Both,
        }
    }

    pub fn has_left(self) -> bool {
        matches!(self, Recursion::Left | Recursion::Both)
    }

    pub fn has_right(self) -> bool {
        matches!(self, Recursion::Right | Recursion::Both)
    }
}

#[derive(Debug)]
pub struct ComponentData {
    members: Vec<NtId>,
    recursion: Recursion,
}

impl ComponentData {
    pub fn members(&self) -> &[NtId] {
        &self.members
    }

    pub fn recursion(&self) -> Recursion {
        self.recursion
    }

    pub fn contains(&self, a: NtId) -> bool {
        self.members.contains(&a)
    }
}

/// Component partition of a grammar.
///
/// Components are stored innermost first: every nonterminal referenced
/// from a component either belongs to it or to an earlier component.
#[derive(Debug)]
pub struct Components {
    comps: Vec<ComponentData>,
    comp_of: Vec<CompId>,
}

impl Components {
    /// Runs Tarjan's algorithm over the nonterminal successor graph and
    /// tags each component with its recursion directions.
    pub fn compute(g: &Grammar) -> Components {
        let n = g.nonterminal_count();
        let succs: Vec<Vec<usize>> = (0..n)
            .map(|a| {
                g.productions(NtId(a))
                    .iter()
                    .flat_map(|p| p.referenced())
                    .map(|b| b.0)
                    .collect()
            })
            .collect();

        let (raw_comps, raw_comp_of) = strongly_connected(&succs);
        let comps = raw_comps
            .into_iter()
            .map(|members| ComponentData {
                members: members.into_iter().map(NtId).collect(),
                recursion: Recursion::None,
            })
            .collect();
        let comp_of = raw_comp_of.into_iter().map(CompId).collect();

        let mut result = Components { comps, comp_of };
        for c in result.comp_ids().collect::<Vec<_>>() {
            let mut rec = Recursion::None;
            for &a in result.component(c).members() {
                for p in g.productions(a) {
                    if let Production::Pair { b, c: second } = *p {
                        if result.comp_of(b) == c {
                            rec = rec.with_left();
                        }
                        if result.comp_of(second) == c {
                            rec = rec.with_right();
                        }
                    }
                }
            }
            result.comps[c.0].recursion = rec;
        }
        result
    }

    pub fn len(&self) -> usize {
        self.comps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comps.is_empty()
    }

    /// Components innermost first.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentData> {
        self.comps.iter()
    }

    pub fn comp_ids(&self) -> impl Iterator<Item = CompId> {
        (0..self.comps.len()).map(CompId)
    }

    pub fn component(&self, c: CompId) -> &ComponentData {
        &self.comps[c.0]
    }

    pub fn comp_of(&self, a: NtId) -> CompId {
        self.comp_of[a.0]
    }

    /// Registers a nonterminal created after the partition was computed
    /// as a member of an existing component.
    pub(crate) fn add_member(&mut self, c: CompId, a: NtId) {
        if self.comp_of.len() <= a.0 {
            self.comp_of.resize(a.0 + 1, c);
        }
        self.comp_of[a.0] = c;
        self.comps[c.0].members.push(a);
    }

    pub(crate) fn set_recursion(&mut self, c: CompId, r: Recursion) {
        self.comps[c.0].recursion = r;
    }
}
